//! The request and response data model of micro-snap.
//!
//! This crate provides the values the handler core in `micro-snap` reads and writes:
//!
//! - [`Request`](protocol::Request): an inbound request with its routing state and
//!   a shared, one-shot body
//! - [`Response`](protocol::Response): the response under construction
//! - [`RequestBody`](protocol::RequestBody) and [`ResponseBody`](protocol::ResponseBody):
//!   streaming bodies implementing `http_body::Body`
//! - [`Cookie`](protocol::Cookie): request and response cookies
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use micro_snap_http::protocol::{Request, Response};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let request = Request::from(
//!     http::Request::builder()
//!         .method(Method::POST)
//!         .uri("/users/42?verbose=true")
//!         .body("{\"name\":\"snap\"}")
//!         .unwrap(),
//! );
//! assert_eq!(request.path_info(), "users/42");
//! assert_eq!(request.param("verbose"), Some("true"));
//!
//! let mut body = request.body_cell().take().await;
//! let bytes = body.read_to_end().await.unwrap();
//! assert_eq!(&bytes[..], b"{\"name\":\"snap\"}");
//!
//! let response = Response::not_found().into_http();
//! assert_eq!(response.status(), 404);
//! # }
//! ```

pub mod protocol;

mod utils;
pub use utils::percent_decode;
