//! The per-request state cell handlers run against.
//!
//! A [`Snap`] owns the current request, the response under construction and the two
//! capabilities injected by the driver. Handlers get it as `&mut Snap` and read or
//! replace its parts in place; nothing done through these accessors declines or
//! finishes handling by itself.

use std::any::type_name;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{AsHeaderName, LOCATION};
use http::{HeaderName, HeaderValue, StatusCode};
use mime::Mime;
use micro_snap_http::protocol::{Cookie, Request, Response, ResponseBody};
use serde::de::DeserializeOwned;

use crate::body::DrainPolicy;
use crate::capability::{ErrorLog, TimeoutControl};
use crate::readable::Readable;
use crate::{ConversionError, Outcome, SnapError, SnapResult};

pub struct Snap {
    request: Request,
    response: Response,
    error_log: Arc<dyn ErrorLog>,
    timeout: Arc<dyn TimeoutControl>,
    drain: DrainPolicy,
}

impl fmt::Debug for Snap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snap")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("drain", &self.drain)
            .finish_non_exhaustive()
    }
}

impl Snap {
    /// A fresh state cell: `request`, an empty `200 OK` response speaking the request's
    /// protocol version, and the default drain policy.
    pub fn new(request: Request, error_log: Arc<dyn ErrorLog>, timeout: Arc<dyn TimeoutControl>) -> Self {
        let response = Response::new(request.version());
        Self { request, response, error_log, timeout, drain: DrainPolicy::default() }
    }

    #[must_use]
    pub fn with_drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Replaces the current request, returning the previous one.
    pub fn put_request(&mut self, request: Request) -> Request {
        std::mem::replace(&mut self.request, request)
    }

    pub fn modify_request<F: FnOnce(&mut Request)>(&mut self, f: F) {
        f(&mut self.request);
    }

    pub fn with_request<R, F: FnOnce(&Request) -> R>(&self, f: F) -> R {
        f(&self.request)
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Replaces the response under construction, returning the previous one.
    pub fn put_response(&mut self, response: Response) -> Response {
        std::mem::replace(&mut self.response, response)
    }

    pub fn modify_response<F: FnOnce(&mut Response)>(&mut self, f: F) {
        f(&mut self.response);
    }

    pub fn with_response<R, F: FnOnce(&Response) -> R>(&self, f: F) -> R {
        f(&self.response)
    }

    /// Sends `message` to the injected error log.
    pub fn log_error(&self, message: impl AsRef<[u8]>) {
        self.error_log.log_error(message.as_ref());
    }

    pub fn error_log(&self) -> Arc<dyn ErrorLog> {
        Arc::clone(&self.error_log)
    }

    /// The injected deadline reset capability.
    pub fn timeout_action(&self) -> Arc<dyn TimeoutControl> {
        Arc::clone(&self.timeout)
    }

    /// Pushes the deadline of the request task `secs` seconds into the future.
    pub fn set_timeout(&self, secs: u64) {
        self.timeout.reset_timeout(secs);
    }

    pub fn drain_policy(&self) -> DrainPolicy {
        self.drain
    }

    pub fn write_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.response.append_body(bytes.into());
    }

    pub fn write_text(&mut self, text: impl Into<String>) {
        self.response.append_body(text.into());
    }

    /// Chains `body` after whatever has been written so far.
    pub fn add_to_output(&mut self, body: ResponseBody) {
        self.response.append_body(body);
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn set_content_type(&mut self, content_type: &Mime) {
        self.response.set_content_type(content_type);
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.set_header(name, value);
    }

    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.add_header(name, value);
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.response.set_content_length(length);
    }

    pub fn add_response_cookie(&mut self, cookie: Cookie) {
        self.response.add_cookie(cookie);
    }

    pub fn expire_cookie(&mut self, name: &str) {
        self.response.expire_cookie(name);
    }

    pub fn send_file(&mut self, path: impl Into<PathBuf>) {
        self.response.send_file(path, None);
    }

    /// Sends bytes `range.start..range.end` of the file at `path`.
    pub fn send_file_partial(&mut self, path: impl Into<PathBuf>, range: Range<u64>) {
        self.response.send_file(path, Some(range));
    }

    /// Finishes handling with a `302 Found` redirect to `location`.
    pub fn redirect<T>(&mut self, location: &str) -> SnapResult<T> {
        self.redirect_with_status(location, StatusCode::FOUND)
    }

    /// Finishes handling with a redirect to `location`.
    ///
    /// The response under construction keeps its headers and cookies; its body is
    /// dropped.
    pub fn redirect_with_status<T>(&mut self, location: &str, status: StatusCode) -> SnapResult<T> {
        let location = HeaderValue::from_str(location).map_err(SnapError::custom)?;
        let mut response = self.put_response(Response::new(self.request.version()));
        response.set_header(LOCATION, location);
        response.set_status(status);
        response.set_body(ResponseBody::empty());
        response.set_content_length(0);
        Ok(Outcome::Terminated(response))
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.request.header(name)
    }

    /// The first value of the query parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.param(name)
    }

    /// All values of the query parameter `name`.
    pub fn params(&self, name: &str) -> &[String] {
        self.request.params().get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Reads the first value of the parameter `name`; declines when it is absent.
    pub fn read_param<T: Readable>(&self, name: &str) -> SnapResult<T> {
        match self.param(name) {
            Some(value) => Ok(Outcome::Value(T::from_bytes(value.as_bytes())?)),
            None => Ok(Outcome::Declined),
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.request.cookie(name)
    }

    /// Reads the request cookie `name`; declines when it is absent.
    pub fn read_cookie<T: Readable>(&self, name: &str) -> SnapResult<T> {
        match self.cookie(name) {
            Some(cookie) => Ok(Outcome::Value(T::from_bytes(cookie.value().as_bytes())?)),
            None => Ok(Outcome::Declined),
        }
    }

    /// Deserializes the query string into `T`.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, SnapError> {
        let query = self.request.query().unwrap_or_default();
        serde_urlencoded::from_str(query)
            .map_err(|e| ConversionError::new(query.as_bytes(), type_name::<T>(), e).into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capability::{NoopTimeout, TracingErrorLog};
    use http::header::{CONTENT_LENGTH, COOKIE, SET_COOKIE};
    use http::{Method, Uri};
    use serde::Deserialize;

    pub(crate) fn snap_for(uri: &'static str) -> Snap {
        Snap::new(Request::new(Method::GET, Uri::from_static(uri)), Arc::new(TracingErrorLog), Arc::new(NoopTimeout))
    }

    #[test]
    fn fresh_snap_has_ok_response() {
        let snap = snap_for("/");
        assert_eq!(snap.response().status(), StatusCode::OK);
        assert_eq!(snap.drain_policy(), DrainPolicy::default());
    }

    #[test]
    fn put_and_modify_request() {
        let mut snap = snap_for("/a");
        snap.modify_request(|r| r.set_path_info("b"));
        assert_eq!(snap.with_request(|r| r.path_info().to_string()), "b");

        let previous = snap.put_request(Request::new(Method::POST, Uri::from_static("/c")));
        assert_eq!(previous.path_info(), "b");
        assert_eq!(snap.request().method(), Method::POST);
    }

    #[test]
    fn log_error_goes_to_the_sink() {
        let mut log = crate::capability::MockErrorLog::new();
        log.expect_log_error().withf(|msg: &[u8]| msg == b"broken").times(1).return_const(());
        let snap = Snap::new(Request::new(Method::GET, Uri::from_static("/")), Arc::new(log), Arc::new(NoopTimeout));
        snap.log_error("broken");
    }

    #[test]
    fn set_timeout_calls_the_capability() {
        let mut timeout = crate::capability::MockTimeoutControl::new();
        timeout.expect_reset_timeout().with(mockall::predicate::eq(42)).times(1).return_const(());
        let snap =
            Snap::new(Request::new(Method::GET, Uri::from_static("/")), Arc::new(TracingErrorLog), Arc::new(timeout));
        snap.set_timeout(42);
        snap.timeout_action();
    }

    #[tokio::test]
    async fn writers_accumulate_output() {
        let mut snap = snap_for("/");
        snap.write_text("hello");
        snap.write_bytes(Bytes::from_static(b", "));
        snap.add_to_output(ResponseBody::from("world"));
        snap.set_status(StatusCode::ACCEPTED);
        snap.set_content_type(&mime::TEXT_PLAIN);
        snap.add_response_cookie(Cookie::new("seen", "1"));

        let (_, response) = snap.into_parts();
        let response = response.into_http();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get(SET_COOKIE).unwrap(), "seen=1");
        assert_eq!(response.into_body().into_bytes().await.unwrap(), Bytes::from_static(b"hello, world"));
    }

    #[tokio::test]
    async fn redirect_finishes_with_location() {
        let mut snap = snap_for("/old");
        snap.write_text("discarded");
        snap.set_header(HeaderName::from_static("x-kept"), HeaderValue::from_static("yes"));

        let outcome: Outcome<()> = snap.redirect("/new").unwrap();
        let response = outcome.into_response().unwrap().into_http();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/new");
        assert_eq!(response.headers().get("x-kept").unwrap(), "yes");
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "0");
        assert!(response.into_body().into_bytes().await.unwrap().is_empty());

        assert!(snap.redirect::<()>("bad\nlocation").is_err());
    }

    #[test]
    fn read_cookie_declines_when_absent() {
        let request = Request::new(Method::GET, Uri::from_static("/"))
            .with_header(COOKIE, HeaderValue::from_static("count=12; name=x"));
        let snap = Snap::new(request, Arc::new(TracingErrorLog), Arc::new(NoopTimeout));

        assert_eq!(snap.read_cookie::<u32>("count").unwrap().value(), Some(12));
        assert!(snap.read_cookie::<u32>("missing").unwrap().is_declined());
        assert!(snap.read_cookie::<u32>("name").unwrap_err().is_conversion());
    }

    #[test]
    fn params_and_query() {
        #[derive(Debug, Deserialize)]
        struct Paging {
            page: u32,
            size: Option<u32>,
        }

        let snap = snap_for("/list?page=3&tag=a&tag=b");
        assert_eq!(snap.param("page"), Some("3"));
        assert_eq!(snap.params("tag"), ["a".to_string(), "b".to_string()]);
        assert!(snap.params("none").is_empty());
        assert_eq!(snap.read_param::<u32>("page").unwrap().value(), Some(3));
        assert!(snap.read_param::<u32>("missing").unwrap().is_declined());

        let paging: Paging = snap.query().unwrap();
        assert_eq!(paging.page, 3);
        assert_eq!(paging.size, None);

        let bad = snap_for("/list?page=x");
        assert!(bad.query::<Paging>().unwrap_err().is_conversion());
    }
}
