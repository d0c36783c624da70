//! Request and response values consumed by the handler core.
//!
//! # Architecture
//!
//! - **Requests** ([`request`]): [`Request`] carries the head of an inbound request
//!   together with the routing state (context path, remaining path), the parsed query
//!   parameters and cookies, and the shared body cell
//!
//! - **Responses** ([`response`]): [`Response`] is the response under construction,
//!   rendered into an `http::Response` once handling is done
//!
//! - **Body Streaming** ([`body`]): one-shot request bodies and response body producers
//!   - [`RequestBody`]: consumer side implementing `http_body::Body`
//!   - [`BodyCell`]: the holder that enforces single consumption
//!   - [`ResponseBody`]: in-memory, streamed or file-backed response bodies
//!
//! - **Cookies** ([`cookie`]): parsing of `Cookie` and rendering of `Set-Cookie`
//!
//! - **Error Handling** ([`error`]): [`BodyError`]
//!
//! Wire parsing and serialization are not part of this crate; transports hand over
//! `http::Request` values and take back `http::Response` values.

pub mod body;
pub use body::BodyCell;
pub use body::LimitedBody;
pub use body::RequestBody;
pub use body::ResponseBody;
pub use body::SendFile;

pub mod cookie;
pub use cookie::Cookie;

pub mod request;
pub use request::Request;

pub mod response;
pub use response::Response;

mod error;
pub use error::BodyError;
