//! Running a handler against a request.
//!
//! [`run_snap`] and [`eval_snap`] are the entry points integrators call once per
//! request; [`Driver`] carries the same capabilities as configuration so they do not
//! have to be passed every time.
//!
//! # Example
//!
//! ```
//! use http::{Method, StatusCode, Uri};
//! use micro_snap::{dir, get, handler_fn, Driver, Outcome};
//! use micro_snap_http::protocol::Request;
//! use futures::FutureExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hello = get(dir("hello", handler_fn(|snap| {
//!     async move {
//!         snap.write_text("hello world");
//!         Ok(Outcome::Value(()))
//!     }
//!     .boxed()
//! })));
//!
//! let driver = Driver::builder().build();
//!
//! let request = Request::new(Method::GET, Uri::from_static("/hello"));
//! let (_, response) = driver.run(&hello, request).await.unwrap();
//! assert_eq!(response.status(), StatusCode::OK);
//!
//! let request = Request::new(Method::GET, Uri::from_static("/other"));
//! let (_, response) = driver.run(&hello, request).await.unwrap();
//! assert_eq!(response.status(), StatusCode::NOT_FOUND);
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use micro_snap_http::protocol::{Request, Response};
use tokio::time::Instant;
use tracing::debug;

use crate::body::DrainPolicy;
use crate::capability::{ErrorLog, NoopTimeout, TimeoutControl, TracingErrorLog};
use crate::{Handler, Outcome, Snap, SnapError};

/// Runs `handler` against `request` and returns the request as the handler left it,
/// together with the final response.
///
/// A handler that declines yields the canned `404` response; one that finishes early
/// yields exactly the response it finished with.
pub async fn run_snap<H>(
    handler: &H,
    error_log: Arc<dyn ErrorLog>,
    timeout: Arc<dyn TimeoutControl>,
    request: Request,
) -> Result<(Request, Response), SnapError>
where
    H: Handler + ?Sized,
{
    Driver { error_log, timeout, drain: DrainPolicy::default() }.run(handler, request).await
}

/// Runs `handler` against `request` and returns the value it produced.
///
/// Declining fails with [`SnapError::NoHandler`], finishing early with
/// [`SnapError::NoValue`].
pub async fn eval_snap<H>(
    handler: &H,
    error_log: Arc<dyn ErrorLog>,
    timeout: Arc<dyn TimeoutControl>,
    request: Request,
) -> Result<H::Output, SnapError>
where
    H: Handler + ?Sized,
{
    Driver { error_log, timeout, drain: DrainPolicy::default() }.eval(handler, request).await
}

pub struct DriverBuilder {
    error_log: Option<Arc<dyn ErrorLog>>,
    timeout: Option<Arc<dyn TimeoutControl>>,
    drain: DrainPolicy,
}

impl DriverBuilder {
    fn new() -> Self {
        Self { error_log: None, timeout: None, drain: DrainPolicy::default() }
    }

    pub fn error_log(mut self, error_log: impl ErrorLog + 'static) -> Self {
        self.error_log = Some(Arc::new(error_log));
        self
    }

    pub fn timeout_control(mut self, timeout: impl TimeoutControl + 'static) -> Self {
        self.timeout = Some(Arc::new(timeout));
        self
    }

    pub fn drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    /// Builds the driver; capabilities not set default to [`TracingErrorLog`] and
    /// [`NoopTimeout`].
    pub fn build(self) -> Driver {
        Driver {
            error_log: self.error_log.unwrap_or_else(|| Arc::new(TracingErrorLog)),
            timeout: self.timeout.unwrap_or_else(|| Arc::new(NoopTimeout)),
            drain: self.drain,
        }
    }
}

#[derive(Clone)]
pub struct Driver {
    error_log: Arc<dyn ErrorLog>,
    timeout: Arc<dyn TimeoutControl>,
    drain: DrainPolicy,
}

impl Driver {
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    fn snap(&self, request: Request) -> Snap {
        Snap::new(request, Arc::clone(&self.error_log), Arc::clone(&self.timeout)).with_drain_policy(self.drain)
    }

    pub async fn run<H>(&self, handler: &H, request: Request) -> Result<(Request, Response), SnapError>
    where
        H: Handler + ?Sized,
    {
        debug!(method = %request.method(), path = request.uri().path(), "dispatch request");
        let mut snap = self.snap(request);
        let outcome = handler.call(&mut snap).await?;
        let (request, response) = snap.into_parts();
        let response = match outcome {
            Outcome::Value(_) => response,
            Outcome::Terminated(response) => response,
            Outcome::Declined => {
                debug!(path = request.uri().path(), "no handler accepted the request");
                Response::not_found()
            }
        };
        Ok((request, response))
    }

    pub async fn eval<H>(&self, handler: &H, request: Request) -> Result<H::Output, SnapError>
    where
        H: Handler + ?Sized,
    {
        let mut snap = self.snap(request);
        match handler.call(&mut snap).await? {
            Outcome::Value(v) => Ok(v),
            Outcome::Declined => Err(SnapError::NoHandler),
            Outcome::Terminated(_) => Err(SnapError::NoValue),
        }
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").field("drain", &self.drain).finish_non_exhaustive()
    }
}

/// A resettable deadline for a request task.
///
/// Pass a clone to the driver as its [`TimeoutControl`] and wrap the request task in
/// [`Deadline::run`]; every `reset_timeout(secs)` moves the deadline to `secs` seconds
/// from now.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Arc<Mutex<Instant>>,
}

impl Deadline {
    /// A deadline `secs` seconds from now.
    pub fn after(secs: u64) -> Self {
        Self { at: Arc::new(Mutex::new(Instant::now() + Duration::from_secs(secs))) }
    }

    pub fn instant(&self) -> Instant {
        *self.at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self, secs: u64) {
        *self.at.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now() + Duration::from_secs(secs);
    }

    /// Drives `fut` to completion unless the deadline passes first, in which case `fut`
    /// is dropped and [`SnapError::DeadlineExceeded`] is returned.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, SnapError> {
        tokio::pin!(fut);
        loop {
            let at = self.instant();
            tokio::select! {
                biased;
                output = &mut fut => return Ok(output),
                () = tokio::time::sleep_until(at) => {
                    if self.instant() <= Instant::now() {
                        debug!("request deadline exceeded");
                        return Err(SnapError::DeadlineExceeded);
                    }
                    // pushed back while sleeping
                }
            }
        }
    }
}

impl TimeoutControl for Deadline {
    fn reset_timeout(&self, secs: u64) {
        self.reset(secs);
    }
}
