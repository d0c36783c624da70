//! Handlers that carry extra context around the state cell.
//!
//! A [`SnapContext`] is anything that owns access to a [`Snap`]; [`SnapContext::lift`]
//! runs an ordinary [`Handler`] from inside it, keeping its outcome. [`with_env`]
//! builds such a context from a shared environment value, for handlers that need
//! configuration or connection pools next to the request.
//!
//! ```
//! use futures::FutureExt;
//! use micro_snap::{dir, outcome, unit, with_env, Outcome, SnapContext};
//!
//! struct Config {
//!     greeting: String,
//! }
//!
//! let greet = with_env(Config { greeting: "hi".into() }, |mut ctx| {
//!     async move {
//!         let greeting = ctx.env().greeting.clone();
//!         outcome!(ctx.lift(&dir("greet", unit(()))).await?);
//!         ctx.snap_mut().write_text(greeting);
//!         Ok(Outcome::Value(()))
//!     }
//!     .boxed()
//! });
//! ```

use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{Handler, Snap, SnapResult};

pub trait SnapContext: Send {
    fn snap(&self) -> &Snap;

    fn snap_mut(&mut self) -> &mut Snap;

    /// Runs `handler` against the state cell of this context.
    fn lift<'a, H>(&'a mut self, handler: &'a H) -> BoxFuture<'a, SnapResult<H::Output>>
    where
        H: Handler + ?Sized,
    {
        handler.call(self.snap_mut())
    }
}

impl SnapContext for Snap {
    fn snap(&self) -> &Snap {
        self
    }

    fn snap_mut(&mut self) -> &mut Snap {
        self
    }
}

/// The state cell together with a borrowed environment.
pub struct WithEnv<'a, E> {
    env: &'a E,
    snap: &'a mut Snap,
}

impl<'a, E> WithEnv<'a, E> {
    pub fn new(env: &'a E, snap: &'a mut Snap) -> Self {
        Self { env, snap }
    }

    pub fn env(&self) -> &'a E {
        self.env
    }
}

impl<E: Sync> SnapContext for WithEnv<'_, E> {
    fn snap(&self) -> &Snap {
        self.snap
    }

    fn snap_mut(&mut self) -> &mut Snap {
        self.snap
    }
}

/// A handler running `f` with `env` in reach; the environment is shared by every
/// request the handler serves.
pub fn with_env<E, F, T>(env: E, f: F) -> EnvHandler<E, F, T>
where
    E: Send + Sync,
    F: for<'a> Fn(WithEnv<'a, E>) -> BoxFuture<'a, SnapResult<T>> + Send + Sync,
    T: Send,
{
    EnvHandler { env, f, _phantom: PhantomData }
}

pub struct EnvHandler<E, F, T> {
    env: E,
    f: F,
    _phantom: PhantomData<fn() -> T>,
}

impl<E, F, T> EnvHandler<E, F, T> {
    pub fn env(&self) -> &E {
        &self.env
    }
}

#[async_trait]
impl<E, F, T> Handler for EnvHandler<E, F, T>
where
    E: Send + Sync,
    F: for<'a> Fn(WithEnv<'a, E>) -> BoxFuture<'a, SnapResult<T>> + Send + Sync,
    T: Send,
{
    type Output = T;

    async fn call(&self, snap: &mut Snap) -> SnapResult<T> {
        (self.f)(WithEnv::new(&self.env, snap)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap::tests::snap_for;
    use crate::{decline, dir, handler_fn, terminate, unit, HandlerExt, Outcome};
    use futures::FutureExt;
    use http::StatusCode;
    use micro_snap_http::protocol::Response;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn lift_on_snap_is_the_handler_itself() {
        let mut snap = snap_for("/a/b");
        let outcome = snap.lift(&dir("a", unit(3))).await.unwrap();
        assert_eq!(outcome.value(), Some(3));
        assert!(snap.lift(&dir("x", unit(3))).await.unwrap().is_declined());
    }

    #[tokio::test]
    async fn env_is_shared_between_requests() {
        let handler = with_env(AtomicUsize::new(0), |ctx| {
            async move {
                let seen = ctx.env().fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Value(seen))
            }
            .boxed()
        });

        let mut snap = snap_for("/");
        assert_eq!(handler.call(&mut snap).await.unwrap().value(), Some(0));
        let mut snap = snap_for("/");
        assert_eq!(handler.call(&mut snap).await.unwrap().value(), Some(1));
        assert_eq!(handler.env().load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lifted_outcomes_pass_through() {
        let handler = with_env("prefix", |mut ctx| {
            async move {
                let prefix = *ctx.env();
                let n = crate::outcome!(ctx.lift(&unit(1)).await?);
                let gone = decline::<()>().or(terminate(|| Response::default().with_status(StatusCode::GONE)));
                crate::outcome!(ctx.lift(&gone).await?);
                ctx.snap_mut().write_text(format!("{prefix}{n}"));
                Ok(Outcome::Value(n))
            }
            .boxed()
        });

        let mut snap = snap_for("/");
        let outcome = handler.call(&mut snap).await.unwrap();
        assert_eq!(outcome.into_response().map(|r| r.status()), Some(StatusCode::GONE));
    }

    #[tokio::test]
    async fn lifted_handlers_see_the_same_state() {
        let handler = with_env(String::from("x-env"), |mut ctx| {
            async move {
                ctx.snap_mut().write_text("before ");
                let writer = handler_fn(|snap| {
                    async move {
                        snap.write_text("inside");
                        Ok(Outcome::Value(()))
                    }
                    .boxed()
                });
                ctx.lift(&writer).await?;
                Ok(Outcome::Value(ctx.snap().response().status()))
            }
            .boxed()
        });

        let mut snap = snap_for("/");
        let status = handler.call(&mut snap).await.unwrap().value();
        assert_eq!(status, Some(StatusCode::OK));
        let body = snap.response_mut().take_body().into_bytes().await.unwrap();
        assert_eq!(body, "before inside");
    }
}
