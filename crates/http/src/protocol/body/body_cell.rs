use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::protocol::body::RequestBody;

/// The per-request holder of the not-yet-read request body.
///
/// Cloning a `BodyCell` yields another handle to the same holder, so every copy of a
/// request observes the same body state: once one copy takes the body, all of them
/// see the empty (or failed) source.
#[derive(Clone)]
pub struct BodyCell {
    inner: Arc<Mutex<RequestBody>>,
}

impl From<RequestBody> for BodyCell {
    fn from(body: RequestBody) -> Self {
        Self::new(body)
    }
}

impl Default for BodyCell {
    fn default() -> Self {
        Self::new(RequestBody::empty())
    }
}

impl BodyCell {
    pub fn new(body: RequestBody) -> Self {
        Self { inner: Arc::new(Mutex::new(body)) }
    }

    /// Takes the current body out, leaving the empty source behind.
    pub async fn take(&self) -> RequestBody {
        let mut guard = self.inner.lock().await;
        std::mem::take(&mut *guard)
    }

    /// Puts `body` in the cell, returning what was there.
    pub async fn replace(&self, body: RequestBody) -> RequestBody {
        let mut guard = self.inner.lock().await;
        std::mem::replace(&mut *guard, body)
    }

    /// Marks the body as consumed.
    pub async fn set_empty(&self) {
        self.replace(RequestBody::empty()).await;
    }

    /// Marks the connection behind the body as gone; every later read fails.
    pub async fn poison<S: ToString>(&self, reason: S) {
        self.replace(RequestBody::failed(reason)).await;
    }

    /// Returns true if the body has been consumed.
    pub async fn is_spent(&self) -> bool {
        self.inner.lock().await.is_spent()
    }

    /// Returns true if the body has been poisoned.
    pub async fn is_failed(&self) -> bool {
        self.inner.lock().await.is_failed()
    }

    /// Returns true if both handles point at the same holder.
    pub fn same_cell(&self, other: &BodyCell) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for BodyCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyCell").finish_non_exhaustive()
    }
}
