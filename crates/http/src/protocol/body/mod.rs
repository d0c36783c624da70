//! Request and response body primitives.
//!
//! This module provides the stream-processing building blocks the handler core drives:
//!
//! - [`RequestBody`]: the readable side of a request body, implementing `http_body::Body`
//! - [`BodyCell`]: the per-request, one-shot holder of the unread [`RequestBody`]
//! - [`LimitedBody`]: a byte counting limiter over any body
//! - [`ResponseBody`]: the body-producing side of a response, including the send-file mode
//!
//! # Design Goals
//!
//! 1. **Single consumption**
//!    - A request body can be taken out of its [`BodyCell`] once; every later reader
//!      sees an empty or a failed source
//!    - Copies of a request share the same cell
//!
//! 2. **Protocol correctness**
//!    - Unread bytes can be skipped up to end of stream so the connection stays usable
//!    - A body whose connection is gone stays failed
//!
//! 3. **Composability**
//!    - Everything is an `http_body::Body`, so `http-body-util` combinators apply
//!    - Response bodies can be chained with [`ResponseBody::append`]

mod body_cell;
mod limited;
mod req_body;
mod resp_body;

pub use body_cell::BodyCell;
pub use limited::LimitedBody;
pub use req_body::RequestBody;
pub use resp_body::ResponseBody;
pub use resp_body::SendFile;
