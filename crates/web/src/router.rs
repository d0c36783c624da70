//! Routing combinators: handlers that decline unless the request matches, and run
//! their inner handler against a request whose path has been advanced.
//!
//! Paths are matched against the request's remaining path
//! ([`Request::path_info`]). A successful match of `n` bytes moves those bytes, plus
//! the following `/`, onto the context path, so nested combinators see only what is
//! left:
//!
//! ```text
//!   context "/"          path_info "users/42/posts"
//!   dir("users", ..)  => context "/users/"     path_info "42/posts"
//!   path_arg(|id| ..) => context "/users/42/"  path_info "posts"
//! ```
//!
//! Every path change is scoped as by [`local_request`]: once the inner handler
//! produces a value or declines, the request is put back as it was.

use std::marker::PhantomData;

use async_trait::async_trait;
use http::Method;
use micro_snap_http::protocol::Request;
use tracing::trace;

use crate::readable::Readable;
use crate::{pass, Handler, Outcome, Snap, SnapResult};

/// Runs `handler` only for requests whose method is `method`.
pub fn method<H: Handler>(method: Method, handler: H) -> MethodRoute<H> {
    MethodRoute { methods: vec![method], handler }
}

/// Runs `handler` only for requests whose method is one of `methods`.
pub fn methods<H, I>(methods: I, handler: H) -> MethodRoute<H>
where
    H: Handler,
    I: IntoIterator<Item = Method>,
{
    MethodRoute { methods: methods.into_iter().collect(), handler }
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[inline]
        pub fn $method<H: Handler>(handler: H) -> MethodRoute<H> {
            method(Method::$upper_case_method, handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(patch, PATCH);

pub struct MethodRoute<H> {
    methods: Vec<Method>,
    handler: H,
}

#[async_trait]
impl<H: Handler> Handler for MethodRoute<H> {
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<H::Output> {
        if !self.methods.contains(snap.request().method()) {
            return pass();
        }
        self.handler.call(snap).await
    }
}

/// Runs `handler` against a request changed by `transform`.
///
/// The request as it was before is put back when `handler` produces a value or
/// declines. When it finishes early or fails, the changed request stays in place.
pub fn local_request<F, H>(transform: F, handler: H) -> LocalRequest<F, H>
where
    F: Fn(&mut Request) + Send + Sync,
    H: Handler,
{
    LocalRequest { transform, handler }
}

pub struct LocalRequest<F, H> {
    transform: F,
    handler: H,
}

#[async_trait]
impl<F, H> Handler for LocalRequest<F, H>
where
    F: Fn(&mut Request) + Send + Sync,
    H: Handler,
{
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<H::Output> {
        scoped(snap, &self.transform, &self.handler).await
    }
}

async fn scoped<F, H>(snap: &mut Snap, transform: F, handler: &H) -> SnapResult<H::Output>
where
    F: FnOnce(&mut Request),
    H: Handler + ?Sized,
{
    let saved = snap.request().clone();
    snap.modify_request(transform);
    let result = handler.call(snap).await;
    if matches!(result, Ok(Outcome::Value(_) | Outcome::Declined)) {
        snap.put_request(saved);
    }
    result
}

/// Moves the first `n` bytes of the remaining path, and a `/` right after them,
/// onto the context path. `n` must fall on a char boundary.
fn advance_path(request: &mut Request, n: usize) {
    if n == 0 {
        return;
    }
    let path_info = request.path_info();
    let (matched, rest) = path_info.split_at_checked(n).unwrap_or((path_info, ""));
    let rest = rest.strip_prefix('/').unwrap_or(rest).to_owned();
    let context_path = format!("{}{}/", request.context_path(), matched);
    request.set_context_path(context_path);
    request.set_path_info(rest);
}

/// Runs `handler` when `compare(literal, path_info)` holds, with the path advanced
/// past `literal.len()` bytes.
pub fn path_with<C, H>(compare: C, literal: impl Into<String>, handler: H) -> PathWith<C, H>
where
    C: Fn(&str, &str) -> bool + Send + Sync,
    H: Handler,
{
    PathWith { compare, literal: literal.into(), handler }
}

pub struct PathWith<C, H> {
    compare: C,
    literal: String,
    handler: H,
}

#[async_trait]
impl<C, H> Handler for PathWith<C, H>
where
    C: Fn(&str, &str) -> bool + Send + Sync,
    H: Handler,
{
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<H::Output> {
        let n = self.literal.len();
        let path_info = snap.request().path_info();
        if !(self.compare)(&self.literal, path_info) || !path_info.is_char_boundary(n) {
            return pass();
        }
        trace!(literal = %self.literal, path_info, "path matched");
        scoped(snap, |request| advance_path(request, n), &self.handler).await
    }
}

/// True when the first segment of `path_info` is exactly `literal`.
fn is_dir(literal: &str, path_info: &str) -> bool {
    path_info.split('/').next() == Some(literal)
}

fn is_exact(literal: &str, path_info: &str) -> bool {
    literal == path_info
}

pub type LiteralPath<H> = PathWith<fn(&str, &str) -> bool, H>;

/// Runs `handler` when the remaining path starts with the segment `segment`.
///
/// `dir("foo", ..)` matches `foo` and `foo/bar`, but neither `foobar` nor `bar/foo`.
/// A segment never contains `/`, so `dir("a/b", ..)` matches nothing.
pub fn dir<H: Handler>(segment: impl Into<String>, handler: H) -> LiteralPath<H> {
    path_with(is_dir as fn(&str, &str) -> bool, segment, handler)
}

/// Runs `handler` when the remaining path is exactly `literal`.
pub fn path<H: Handler>(literal: impl Into<String>, handler: H) -> LiteralPath<H> {
    path_with(is_exact as fn(&str, &str) -> bool, literal, handler)
}

/// Runs `handler` only when the whole path has been matched.
pub fn if_top<H: Handler>(handler: H) -> LiteralPath<H> {
    path("", handler)
}

/// Reads the first segment of the remaining path as a `T`, and runs the handler
/// `make_handler` builds from it with the path advanced past the segment.
///
/// A segment that cannot be read as a `T` fails the request with a conversion error
/// instead of declining.
pub fn path_arg<T, F, H>(make_handler: F) -> PathArg<T, F>
where
    T: Readable + Send,
    F: Fn(T) -> H + Send + Sync,
    H: Handler,
{
    PathArg { make_handler, _phantom: PhantomData }
}

pub struct PathArg<T, F> {
    make_handler: F,
    _phantom: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T, F, H> Handler for PathArg<T, F>
where
    T: Readable + Send,
    F: Fn(T) -> H + Send + Sync,
    H: Handler,
{
    type Output = H::Output;

    async fn call(&self, snap: &mut Snap) -> SnapResult<H::Output> {
        let (value, n) = {
            let path_info = snap.request().path_info();
            let segment = path_info.split('/').next().unwrap_or_default();
            (T::from_bytes(segment.as_bytes())?, segment.len())
        };
        let handler = (self.make_handler)(value);
        scoped(snap, |request| advance_path(request, n), &handler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap::tests::snap_for;
    use crate::{handler_fn, HandlerExt, SnapError};
    use futures::FutureExt;
    use micro_snap_http::protocol::Response;

    /// Reports (context path, path info) as seen by the inner handler.
    fn where_am_i() -> impl Handler<Output = (String, String)> {
        handler_fn(|snap| {
            let seen = (snap.request().context_path().to_string(), snap.request().path_info().to_string());
            async move { Ok(Outcome::Value(seen)) }.boxed()
        })
    }

    async fn run<H: Handler>(handler: &H, uri: &'static str) -> Result<Outcome<H::Output>, SnapError> {
        let mut snap = snap_for(uri);
        handler.call(&mut snap).await
    }

    #[tokio::test]
    async fn dir_matches_whole_segments() {
        let handler = dir("foo", where_am_i());

        let seen = run(&handler, "/foo").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/foo/".to_string(), String::new()));

        let seen = run(&handler, "/foo/bar").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/foo/".to_string(), "bar".to_string()));

        assert!(run(&handler, "/foobar").await.unwrap().is_declined());
        assert!(run(&handler, "/bar/foo").await.unwrap().is_declined());
    }

    #[tokio::test]
    async fn nested_dirs_accumulate_context() {
        let handler = dir("a", dir("b", where_am_i()));
        let seen = run(&handler, "/a/b/c/d").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/a/b/".to_string(), "c/d".to_string()));

        let multi = dir("a/b", where_am_i());
        assert!(run(&multi, "/a/b/c").await.unwrap().is_declined());
        assert!(run(&multi, "/a/b").await.unwrap().is_declined());
    }

    #[tokio::test]
    async fn custom_comparator_keeps_unmatched_path() {
        let prefix = |literal: &str, path_info: &str| path_info.starts_with(literal);

        let handler = path_with(prefix, "ab", where_am_i());
        let seen = run(&handler, "/abc/d").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/ab/".to_string(), "c/d".to_string()));

        let anything = path_with(|_: &str, _: &str| true, "a", where_am_i());
        assert!(run(&anything, "/%C3%A9x").await.unwrap().is_declined());

        let accented = path_with(prefix, "é", where_am_i());
        let seen = run(&accented, "/%C3%A9/x").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/é/".to_string(), "x".to_string()));
    }

    #[tokio::test]
    async fn path_requires_exact_match() {
        let handler = path("foo/bar", where_am_i());
        let seen = run(&handler, "/foo/bar").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/foo/bar/".to_string(), String::new()));
        assert!(run(&handler, "/foo/bar/baz").await.unwrap().is_declined());
        assert!(run(&handler, "/foo").await.unwrap().is_declined());
    }

    #[tokio::test]
    async fn if_top_only_matches_empty_path() {
        let handler = if_top(where_am_i());
        let seen = run(&handler, "/").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/".to_string(), String::new()));
        assert!(run(&handler, "/x").await.unwrap().is_declined());

        let nested = dir("x", if_top(where_am_i()));
        assert!(run(&nested, "/x").await.unwrap().is_value());
        assert!(run(&nested, "/x/y").await.unwrap().is_declined());
    }

    #[tokio::test]
    async fn method_filters() {
        let only_get = get(where_am_i());
        assert!(run(&only_get, "/").await.unwrap().is_value());

        let only_post = post(where_am_i());
        assert!(run(&only_post, "/").await.unwrap().is_declined());

        let either = methods([Method::POST, Method::GET], where_am_i());
        assert!(run(&either, "/").await.unwrap().is_value());
    }

    #[tokio::test]
    async fn path_arg_reads_the_segment() {
        let handler = dir("users", path_arg(|id: u64| where_am_i().map(move |seen| (id, seen))));
        let (id, seen) = run(&handler, "/users/42/posts").await.unwrap().value().unwrap();
        assert_eq!(id, 42);
        assert_eq!(seen, ("/users/42/".to_string(), "posts".to_string()));
    }

    #[tokio::test]
    async fn path_arg_parse_failure_is_a_fault() {
        let handler = path_arg(|id: u64| crate::unit(id));
        let err = run(&handler, "/abc").await.unwrap_err();
        assert!(err.is_conversion());

        let text = path_arg(|name: String| crate::unit(name));
        assert_eq!(run(&text, "/hello%20there/x").await.unwrap().value().unwrap(), "hello there");
    }

    #[tokio::test]
    async fn local_request_restores_on_value_and_decline() {
        let mut snap = snap_for("/orig");

        let rewrite = |r: &mut Request| r.set_path_info("rewritten");
        let mutate_then = |declines: bool| {
            handler_fn(move |snap| {
                snap.request_mut().set_context_path("/mutated/");
                async move { if declines { pass() } else { Ok(Outcome::Value(())) } }.boxed()
            })
        };

        local_request(rewrite, mutate_then(false)).call(&mut snap).await.unwrap();
        assert_eq!(snap.request().path_info(), "orig");
        assert_eq!(snap.request().context_path(), "/");

        local_request(rewrite, mutate_then(true)).call(&mut snap).await.unwrap();
        assert_eq!(snap.request().path_info(), "orig");
        assert_eq!(snap.request().context_path(), "/");
    }

    #[tokio::test]
    async fn local_request_keeps_changes_on_termination_and_fault() {
        let rewrite = |r: &mut Request| r.set_path_info("rewritten");

        let mut snap = snap_for("/orig");
        let finish = crate::terminate::<(), _>(Response::default);
        assert!(local_request(rewrite, finish).call(&mut snap).await.unwrap().is_terminated());
        assert_eq!(snap.request().path_info(), "rewritten");

        let mut snap = snap_for("/orig");
        let fail = handler_fn(|_snap| async { Err::<Outcome<()>, _>(SnapError::custom("boom")) }.boxed());
        assert!(local_request(rewrite, fail).call(&mut snap).await.is_err());
        assert_eq!(snap.request().path_info(), "rewritten");
    }

    #[tokio::test]
    async fn declined_route_leaves_path_for_the_next_alternative() {
        let handler = dir("a", path("x", where_am_i())).or(dir("a", where_am_i()));
        let seen = run(&handler, "/a/y").await.unwrap().value().unwrap();
        assert_eq!(seen, ("/a/".to_string(), "y".to_string()));
    }
}
