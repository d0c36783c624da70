//! Capabilities injected into every [`Snap`](crate::Snap) by the driver.
//!
//! - [`ErrorLog`]: where handlers report errors
//! - [`TimeoutControl`]: pushes the deadline of the task handling the request
//!
//! Closures of the right shape implement both traits, so tests and small
//! integrations can pass `|msg: &[u8]| ...` and `|secs: u64| ...` directly.

use tracing::error;

#[cfg_attr(test, mockall::automock)]
pub trait ErrorLog: Send + Sync {
    fn log_error(&self, message: &[u8]);
}

#[cfg_attr(test, mockall::automock)]
pub trait TimeoutControl: Send + Sync {
    /// Moves the deadline of the current request task `secs` seconds into the future.
    fn reset_timeout(&self, secs: u64);
}

impl<F> ErrorLog for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn log_error(&self, message: &[u8]) {
        (self)(message);
    }
}

impl<F> TimeoutControl for F
where
    F: Fn(u64) + Send + Sync,
{
    fn reset_timeout(&self, secs: u64) {
        (self)(secs);
    }
}

/// Forwards handler errors to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLog;

impl ErrorLog for TracingErrorLog {
    fn log_error(&self, message: &[u8]) {
        error!(message = %String::from_utf8_lossy(message), "handler error");
    }
}

/// Ignores timeout resets, for drivers that do not enforce a deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTimeout;

impl TimeoutControl for NoopTimeout {
    fn reset_timeout(&self, _secs: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn closures_are_capabilities() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |msg: &[u8]| seen.lock().unwrap().push(msg.to_vec())
        };
        let log: Arc<dyn ErrorLog> = Arc::new(sink);
        log.log_error(b"boom");
        assert_eq!(*seen.lock().unwrap(), vec![b"boom".to_vec()]);

        let last = Arc::new(AtomicU64::new(0));
        let reset = {
            let last = Arc::clone(&last);
            move |secs: u64| last.store(secs, Ordering::SeqCst)
        };
        let timeout: Arc<dyn TimeoutControl> = Arc::new(reset);
        timeout.reset_timeout(30);
        assert_eq!(last.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn defaults_do_not_panic() {
        TracingErrorLog.log_error(b"\xffnot utf8");
        NoopTimeout.reset_timeout(1);
    }
}
