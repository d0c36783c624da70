//! Single-consumption access to the request body.
//!
//! The body of a request can be read once. [`Snap::run_request_body`] takes it out
//! of the request's [`BodyCell`](micro_snap_http::protocol::BodyCell), hands it to a
//! consumer, and afterwards drains whatever the consumer left unread so the
//! connection stays usable for the next request. Draining runs under a liveness
//! watchdog configured by [`DrainPolicy`]: a peer that stops sending is cut off
//! instead of holding the task forever.
//!
//! After any attempt to read the body, every later attempt sees an empty body, or a
//! failing one if the connection turned out to be gone.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http_body_util::BodyExt;
use micro_snap_http::protocol::{BodyError, RequestBody};
use tracing::{debug, info, warn};

use crate::capability::TimeoutControl;
use crate::{Snap, SnapError};

/// How unread request bytes are drained once a body consumer is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    /// The longest a single read may wait for data.
    pub chunk_timeout: Duration,
    /// Consecutive reads that may time out before the peer is considered too slow.
    pub max_stalls: u32,
    /// Seconds the request deadline is pushed ahead of every read.
    pub timeout_floor: u64,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self { chunk_timeout: Duration::from_secs(1), max_stalls: 5, timeout_floor: 5 }
    }
}

impl DrainPolicy {
    #[must_use]
    pub fn with_chunk_timeout(mut self, chunk_timeout: Duration) -> Self {
        self.chunk_timeout = chunk_timeout;
        self
    }

    #[must_use]
    pub fn with_max_stalls(mut self, max_stalls: u32) -> Self {
        self.max_stalls = max_stalls;
        self
    }

    #[must_use]
    pub fn with_timeout_floor(mut self, timeout_floor: u64) -> Self {
        self.timeout_floor = timeout_floor;
        self
    }
}

impl Snap {
    /// Runs `consumer` over the request body.
    ///
    /// The body is taken out of the request before `consumer` runs, so any later call
    /// sees an empty body. Once `consumer` returns, unread bytes are drained under the
    /// watchdog. A connection-terminated error from either step poisons the body; any
    /// other consumer error is returned after draining.
    pub async fn run_request_body<T, F>(&mut self, consumer: F) -> Result<T, SnapError>
    where
        F: for<'a> FnOnce(&'a mut RequestBody) -> BoxFuture<'a, Result<T, SnapError>> + Send,
        T: Send,
    {
        let timeout = self.timeout_action();
        let policy = self.drain_policy();
        let cell = self.request().body_cell().clone();

        let mut body = cell.take().await;
        let consumed = consumer(&mut body).await;

        match consumed {
            Err(SnapError::Body { source }) if source.is_connection_terminated() => {
                cell.poison(poison_reason(&source)).await;
                Err(source.into())
            }
            consumed => match drain(&mut body, timeout.as_ref(), policy).await {
                Ok(_) => {
                    cell.set_empty().await;
                    consumed
                }
                Err(e) => {
                    if let Err(original) = &consumed {
                        debug!(cause = %original, "request body drain failed after consumer error");
                    }
                    cell.poison(poison_reason(&e)).await;
                    Err(e.into())
                }
            },
        }
    }

    /// Reads the whole request body, failing with too-many-bytes when it is longer than
    /// `max` bytes.
    pub async fn read_request_body(&mut self, max: u64) -> Result<Bytes, SnapError> {
        self.run_request_body(move |body| {
            async move { Ok::<_, SnapError>(body.limit(max).collect().await?.to_bytes()) }.boxed()
        })
        .await
    }

    /// Reads the whole request body, however long it is.
    pub async fn read_request_body_unbounded(&mut self) -> Result<Bytes, SnapError> {
        self.run_request_body(|body| async move { Ok::<_, SnapError>(body.read_to_end().await?) }.boxed()).await
    }

    /// Fails the request as if its connection had been dropped; the body is poisoned.
    pub async fn terminate_connection<T, S: ToString>(&mut self, reason: S) -> Result<T, SnapError> {
        let e = BodyError::connection_terminated(reason);
        warn!(cause = %e, "terminating connection");
        self.request().body_cell().poison(poison_reason(&e)).await;
        Err(e.into())
    }
}

/// The reason later reads of a body poisoned by `e` fail with.
fn poison_reason(e: &BodyError) -> String {
    match e {
        BodyError::ConnectionTerminated { reason } => reason.clone(),
        other => other.to_string(),
    }
}

/// Skips `body` to end of stream, returning the number of bytes skipped.
///
/// Any failure, including a peer too slow to keep up, is reported as a terminated
/// connection.
async fn drain(body: &mut RequestBody, timeout: &dyn TimeoutControl, policy: DrainPolicy) -> Result<u64, BodyError> {
    let mut skipped: u64 = 0;
    let mut stalls: u32 = 0;
    loop {
        timeout.reset_timeout(policy.timeout_floor);
        match tokio::time::timeout(policy.chunk_timeout, body.frame()).await {
            Ok(None) => break,
            Ok(Some(Ok(frame))) => {
                stalls = 0;
                if let Some(data) = frame.data_ref() {
                    skipped += data.len() as u64;
                }
            }
            Ok(Some(Err(e))) if e.is_connection_terminated() => return Err(e),
            Ok(Some(Err(e))) => return Err(BodyError::connection_terminated(e)),
            Err(_) => {
                stalls += 1;
                if stalls >= policy.max_stalls {
                    warn!(stalls = stalls, skipped = skipped, "request body too slow, giving up");
                    return Err(BodyError::connection_terminated("request body too slow"));
                }
            }
        }
    }
    if skipped > 0 {
        info!(size = skipped, "skip request body");
    }
    Ok(skipped)
}
