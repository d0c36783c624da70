//! Snap-style handler combinators for async HTTP services.
//!
//! Every request is served by a [`Handler`] running against a [`Snap`], the
//! per-request state cell holding the request and the response being built. A
//! handler ends in one of three ways, captured by [`Outcome`]:
//!
//! - `Value(v)`: it produced `v` and the next step may run
//! - `Declined`: it does not apply, so an alternative may be tried
//! - `Terminated(response)`: `response` is final and the rest is skipped
//!
//! Faults travel separately as [`SnapError`]. Routing ([`dir`], [`path`],
//! [`method`], [`path_arg`]), alternation ([`HandlerExt::or`], [`first_of`]) and
//! sequencing ([`HandlerExt::and_then`]) are combinators over handlers. The request
//! body can be consumed once, and whatever a consumer leaves unread is drained under
//! a watchdog ([`DrainPolicy`]). Resources are scoped to a step with
//! [`bracket_snap`]. [`run_snap`] and [`Driver`] run a handler and produce the final
//! response.
//!
//! # Example
//!
//! ```
//! use futures::FutureExt;
//! use http::{Method, StatusCode, Uri};
//! use micro_snap::{dir, get, handler_fn, path_arg, Driver, Outcome};
//! use micro_snap_http::protocol::Request;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let users = get(dir("users", path_arg(|id: u64| {
//!     handler_fn(move |snap| {
//!         async move {
//!             snap.write_text(format!("user {id}"));
//!             Ok(Outcome::Value(()))
//!         }
//!         .boxed()
//!     })
//! })));
//!
//! let driver = Driver::builder().build();
//! let (_, response) = driver.run(&users, Request::new(Method::GET, Uri::from_static("/users/7"))).await.unwrap();
//! assert_eq!(response.status(), StatusCode::OK);
//! # }
//! ```

mod body;
mod bracket;
mod capability;
mod driver;
mod error;
mod handler;
mod lift;
mod outcome;
mod readable;
mod router;
mod snap;

pub use micro_snap_http;

pub use body::DrainPolicy;
pub use bracket::bracket_snap;
pub use capability::{ErrorLog, NoopTimeout, TimeoutControl, TracingErrorLog};
pub use driver::{eval_snap, run_snap, Deadline, Driver, DriverBuilder};
pub use error::{ConversionError, SnapError};
pub use handler::{
    catch_finish_with, decline, first_of, handler_fn, terminate, unit, AndThen, BoxHandler, CatchFinishWith,
    Decline, FirstOf, Handler, HandlerExt, HandlerFn, Map, Or, Terminate, Then, Unit,
};
pub use lift::{with_env, EnvHandler, SnapContext, WithEnv};
pub use outcome::{finish_with, pass, Outcome, SnapResult};
pub use readable::Readable;
pub use router::{
    delete, dir, get, head, if_top, local_request, method, methods, options, patch, path, path_arg, path_with, post,
    put, LiteralPath, LocalRequest, MethodRoute, PathArg, PathWith,
};
pub use snap::Snap;
