//! Handler computations and the combinators that sequence and alternate them.
//!
//! A [`Handler`] runs against the per-request [`Snap`] and ends in one of three
//! [`Outcome`]s: a value, a decline, or a final response. Combinators are plain
//! structs implementing [`Handler`], built through the free functions in this module
//! and the [`HandlerExt`] methods:
//!
//! - [`HandlerExt::and_then`] feeds a value into the next handler
//! - [`HandlerExt::or`] and [`first_of`] try alternatives until one does not decline
//! - [`terminate`] and [`finish_with`](crate::finish_with) end handling early
//! - [`catch_finish_with`] turns an early response back into a value
//!
//! Handler values are reusable across requests and shared between tasks, hence the
//! `Send + Sync` bound.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use micro_snap_http::protocol::Response;

use crate::{outcome, Outcome, Snap, SnapResult};

#[async_trait]
pub trait Handler: Send + Sync {
    type Output: Send;

    async fn call(&self, snap: &mut Snap) -> SnapResult<Self::Output>;
}

pub type BoxHandler<T> = Box<dyn Handler<Output = T>>;

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<Self::Output> {
        (**self).call(snap).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<Self::Output> {
        (**self).call(snap).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for &H {
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<Self::Output> {
        (**self).call(snap).await
    }
}

/// Adapts an async closure over the state cell into a [`Handler`].
///
/// ```
/// use futures::FutureExt;
/// use micro_snap::{handler_fn, Outcome};
///
/// let hello = handler_fn(|snap| {
///     async move {
///         snap.write_text("hello");
///         Ok(Outcome::Value(()))
///     }
///     .boxed()
/// });
/// ```
pub fn handler_fn<F, T>(f: F) -> HandlerFn<F, T>
where
    F: for<'a> Fn(&'a mut Snap) -> BoxFuture<'a, SnapResult<T>> + Send + Sync,
    T: Send,
{
    HandlerFn { f, _phantom: PhantomData }
}

pub struct HandlerFn<F, T> {
    f: F,
    _phantom: PhantomData<fn() -> T>,
}

#[async_trait]
impl<F, T> Handler for HandlerFn<F, T>
where
    F: for<'a> Fn(&'a mut Snap) -> BoxFuture<'a, SnapResult<T>> + Send + Sync,
    T: Send,
{
    type Output = T;

    async fn call(&self, snap: &mut Snap) -> SnapResult<T> {
        (self.f)(snap).await
    }
}

/// A handler that always declines.
pub fn decline<T: Send>() -> Decline<T> {
    Decline(PhantomData)
}

pub struct Decline<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T: Send> Handler for Decline<T> {
    type Output = T;

    async fn call(&self, _snap: &mut Snap) -> SnapResult<T> {
        Ok(Outcome::Declined)
    }
}

/// A handler that produces a copy of `value` without touching the state.
pub fn unit<T: Clone + Send + Sync>(value: T) -> Unit<T> {
    Unit(value)
}

pub struct Unit<T>(T);

#[async_trait]
impl<T: Clone + Send + Sync> Handler for Unit<T> {
    type Output = T;

    async fn call(&self, _snap: &mut Snap) -> SnapResult<T> {
        Ok(Outcome::Value(self.0.clone()))
    }
}

/// A handler that finishes with the response built by `make_response`.
pub fn terminate<T, F>(make_response: F) -> Terminate<F, T>
where
    F: Fn() -> Response + Send + Sync,
    T: Send,
{
    Terminate { make_response, _phantom: PhantomData }
}

pub struct Terminate<F, T> {
    make_response: F,
    _phantom: PhantomData<fn() -> T>,
}

#[async_trait]
impl<F, T> Handler for Terminate<F, T>
where
    F: Fn() -> Response + Send + Sync,
    T: Send,
{
    type Output = T;

    async fn call(&self, _snap: &mut Snap) -> SnapResult<T> {
        Ok(Outcome::Terminated((self.make_response)()))
    }
}

/// Tries each handler in order until one does not decline; declines if all do.
pub fn first_of<T: Send>(handlers: Vec<BoxHandler<T>>) -> FirstOf<T> {
    FirstOf { handlers }
}

pub struct FirstOf<T> {
    handlers: Vec<BoxHandler<T>>,
}

#[async_trait]
impl<T: Send> Handler for FirstOf<T> {
    type Output = T;

    async fn call(&self, snap: &mut Snap) -> SnapResult<T> {
        for handler in &self.handlers {
            match handler.call(snap).await? {
                Outcome::Declined => continue,
                other => return Ok(other),
            }
        }
        Ok(Outcome::Declined)
    }
}

/// Runs `handler`, turning an early response into `Err(response)`.
pub fn catch_finish_with<H: Handler>(handler: H) -> CatchFinishWith<H> {
    CatchFinishWith(handler)
}

pub struct CatchFinishWith<H>(H);

#[async_trait]
impl<H: Handler> Handler for CatchFinishWith<H> {
    type Output = Result<H::Output, Response>;

    async fn call(&self, snap: &mut Snap) -> SnapResult<Self::Output> {
        Ok(match self.0.call(snap).await? {
            Outcome::Value(v) => Outcome::Value(Ok(v)),
            Outcome::Terminated(response) => Outcome::Value(Err(response)),
            Outcome::Declined => Outcome::Declined,
        })
    }
}

pub struct AndThen<H, F> {
    handler: H,
    f: F,
}

#[async_trait]
impl<H, F, H2> Handler for AndThen<H, F>
where
    H: Handler,
    F: Fn(H::Output) -> H2 + Send + Sync,
    H2: Handler,
{
    type Output = H2::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<H2::Output> {
        let value = outcome!(self.handler.call(snap).await?);
        let next = (self.f)(value);
        next.call(snap).await
    }
}

pub struct Then<H, H2> {
    first: H,
    second: H2,
}

#[async_trait]
impl<H: Handler, H2: Handler> Handler for Then<H, H2> {
    type Output = H2::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<H2::Output> {
        outcome!(self.first.call(snap).await?);
        self.second.call(snap).await
    }
}

pub struct Map<H, F> {
    handler: H,
    f: F,
}

#[async_trait]
impl<H, F, U> Handler for Map<H, F>
where
    H: Handler,
    F: Fn(H::Output) -> U + Send + Sync,
    U: Send,
{
    type Output = U;

    async fn call(&self, snap: &mut Snap) -> SnapResult<U> {
        Ok(self.handler.call(snap).await?.map(&self.f))
    }
}

pub struct Or<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<A, B> Handler for Or<A, B>
where
    A: Handler,
    B: Handler<Output = A::Output>,
{
    type Output = A::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<A::Output> {
        match self.first.call(snap).await? {
            Outcome::Declined => self.second.call(snap).await,
            other => Ok(other),
        }
    }
}

pub trait HandlerExt: Handler + Sized {
    /// Runs `f` on the value this handler produces and then runs the handler it returns.
    fn and_then<F, H2>(self, f: F) -> AndThen<Self, F>
    where
        F: Fn(Self::Output) -> H2 + Send + Sync,
        H2: Handler,
    {
        AndThen { handler: self, f }
    }

    /// Runs `next` after this handler, discarding this handler's value.
    fn then<H2: Handler>(self, next: H2) -> Then<Self, H2> {
        Then { first: self, second: next }
    }

    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Output) -> U + Send + Sync,
        U: Send,
    {
        Map { handler: self, f }
    }

    /// Runs `other` when this handler declines.
    ///
    /// `other` sees the state as this handler left it; changes made before declining
    /// are kept unless they were scoped with [`local_request`](crate::local_request).
    fn or<B: Handler<Output = Self::Output>>(self, other: B) -> Or<Self, B> {
        Or { first: self, second: other }
    }

    fn catch_finish_with(self) -> CatchFinishWith<Self> {
        CatchFinishWith(self)
    }

    fn boxed(self) -> BoxHandler<Self::Output>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<H: Handler> HandlerExt for H {}
