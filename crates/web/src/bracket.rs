//! Acquire / use / release around a handler step.
//!
//! [`bracket_snap`] guarantees that a resource acquired for a request is released
//! exactly once, whichever way the step using it ends: with a value, a decline, an
//! early response, an error, a panic, or because the request task itself was dropped.

use std::future::Future;
use std::marker::PhantomData;
use std::panic::{resume_unwind, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, warn};

use crate::{Snap, SnapError, SnapResult};

/// Runs `use_resource` on the resource produced by `acquire`, then `release`s it.
///
/// - `acquire` runs on its own task, so dropping the bracket while acquiring does not
///   abandon the acquisition; the resource is released in the background instead.
/// - `release` runs exactly once if `acquire` succeeded, on its own task as well.
///   If the bracket is dropped while `use_resource` runs, release happens in the
///   background.
/// - A release error replaces the result of `use_resource`. A panic in
///   `use_resource` is resumed once the resource has been released.
/// - If `acquire` fails, `release` never runs.
pub async fn bracket_snap<R, T, A, Rel, RelFut, U>(
    snap: &mut Snap,
    acquire: A,
    release: Rel,
    use_resource: U,
) -> SnapResult<T>
where
    A: Future<Output = Result<R, SnapError>> + Send + 'static,
    R: Send + 'static,
    Rel: FnOnce(R) -> RelFut + Send + 'static,
    RelFut: Future<Output = Result<(), SnapError>> + Send + 'static,
    U: for<'a> FnOnce(&'a mut Snap, &'a mut R) -> BoxFuture<'a, SnapResult<T>> + Send,
    T: Send,
{
    let mut guard = ReleaseGuard { acquiring: None, resource: None, release: Some(release), _phantom: PhantomData };

    let acquired = guard.acquiring.insert(tokio::spawn(acquire)).await;
    guard.acquiring = None;
    let resource = match acquired {
        Ok(Ok(resource)) => resource,
        Ok(Err(e)) => {
            guard.disarm();
            return Err(e);
        }
        Err(join_error) => {
            guard.disarm();
            return Err(rethrow(join_error));
        }
    };

    let used = {
        let resource = guard.resource.insert(resource);
        AssertUnwindSafe(use_resource(snap, resource)).catch_unwind().await
    };

    let released = match guard.disarm() {
        Some((resource, release)) => tokio::spawn(release(resource)).await.unwrap_or_else(|e| Err(rethrow(e))),
        None => Ok(()),
    };

    match used {
        Ok(result) => {
            released?;
            result
        }
        Err(panic) => {
            if let Err(e) = released {
                error!(cause = %e, "resource release failed while unwinding");
            }
            resume_unwind(panic)
        }
    }
}

/// Resumes a panic that happened on a spawned task, or reports a cancelled one.
fn rethrow(join_error: JoinError) -> SnapError {
    match join_error.try_into_panic() {
        Ok(panic) => resume_unwind(panic),
        Err(cancelled) => SnapError::custom(cancelled),
    }
}

/// Owns whatever still has to be released if the bracket is dropped early.
struct ReleaseGuard<R, Rel, RelFut>
where
    R: Send + 'static,
    Rel: FnOnce(R) -> RelFut + Send + 'static,
    RelFut: Future<Output = Result<(), SnapError>> + Send + 'static,
{
    acquiring: Option<JoinHandle<Result<R, SnapError>>>,
    resource: Option<R>,
    release: Option<Rel>,
    _phantom: PhantomData<fn() -> RelFut>,
}

impl<R, Rel, RelFut> ReleaseGuard<R, Rel, RelFut>
where
    R: Send + 'static,
    Rel: FnOnce(R) -> RelFut + Send + 'static,
    RelFut: Future<Output = Result<(), SnapError>> + Send + 'static,
{
    /// Hands the resource and its release over to the caller; dropping the guard
    /// afterwards does nothing.
    fn disarm(&mut self) -> Option<(R, Rel)> {
        self.acquiring = None;
        match (self.resource.take(), self.release.take()) {
            (Some(resource), Some(release)) => Some((resource, release)),
            _ => None,
        }
    }
}

impl<R, Rel, RelFut> Drop for ReleaseGuard<R, Rel, RelFut>
where
    R: Send + 'static,
    Rel: FnOnce(R) -> RelFut + Send + 'static,
    RelFut: Future<Output = Result<(), SnapError>> + Send + 'static,
{
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        let resource = self.resource.take();
        let acquiring = self.acquiring.take();

        let Ok(runtime) = Handle::try_current() else {
            warn!("bracket dropped outside of a runtime, resource is not released");
            return;
        };

        runtime.spawn(async move {
            let resource = match (resource, acquiring) {
                (Some(resource), _) => resource,
                (None, Some(acquiring)) => match acquiring.await {
                    Ok(Ok(resource)) => resource,
                    _ => return,
                },
                (None, None) => return,
            };
            if let Err(e) = release(resource).await {
                warn!(cause = %e, "background resource release failed");
            }
        });
    }
}
