//! The response under construction.
//!
//! [`Response`] keeps the pieces a handler builds up separately (status, headers,
//! cookies, an explicit content length and the body) and renders them into an
//! `http::Response` once handling is done, see [`Response::into_http`].

use std::borrow::Cow;
use std::ops::Range;
use std::path::PathBuf;

use bytes::Bytes;
use http::header::{AsHeaderName, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use mime::Mime;
use tracing::warn;

use crate::protocol::body::ResponseBody;
use crate::protocol::cookie::Cookie;

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    reason: Option<Cow<'static, str>>,
    version: Version,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    content_length: Option<u64>,
    body: ResponseBody,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(Version::HTTP_11)
    }
}

impl Response {
    /// An empty `200 OK` response.
    pub fn new(version: Version) -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            version,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            content_length: None,
            body: ResponseBody::empty(),
        }
    }

    /// The canned response for a request no handler accepted: status 404, body `404`.
    pub fn not_found() -> Self {
        let mut response = Self::new(Version::HTTP_11);
        response.set_status(StatusCode::NOT_FOUND);
        response.set_content_length(3);
        response.set_body(Bytes::from_static(b"404"));
        response
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<ResponseBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// The reason phrase: the one set explicitly, otherwise the canonical one for the status.
    pub fn reason(&self) -> &str {
        match &self.reason {
            Some(reason) => reason,
            None => self.status.canonical_reason().unwrap_or(""),
        }
    }

    pub fn set_reason(&mut self, reason: impl Into<Cow<'static, str>>) {
        self.reason = Some(reason.into());
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Sets `name` to `value`, replacing every existing value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Adds `value` to `name`, keeping existing values.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn set_content_type(&mut self, content_type: &Mime) {
        match HeaderValue::from_str(content_type.as_ref()) {
            Ok(value) => self.set_header(CONTENT_TYPE, value),
            Err(_) => warn!(content_type = %content_type, "invalid content type, skipped"),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    pub fn clear_content_length(&mut self) {
        self.content_length = None;
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Adds a cookie, replacing any cookie already set with the same name.
    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.retain(|c| c.name() != cookie.name());
        self.cookies.push(cookie);
    }

    /// Tells the client to drop the cookie `name`.
    pub fn expire_cookie(&mut self, name: &str) {
        self.add_cookie(Cookie::expired(name));
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<ResponseBody>) {
        self.body = body.into();
    }

    /// Chains `body` after the current body.
    pub fn append_body(&mut self, body: impl Into<ResponseBody>) {
        let current = std::mem::take(&mut self.body);
        self.body = current.append(body.into());
    }

    pub fn take_body(&mut self) -> ResponseBody {
        std::mem::take(&mut self.body)
    }

    /// Sends the file at `path` (or the `range` of it) as the body.
    ///
    /// The content length is set when a range is given, and cleared otherwise.
    pub fn send_file(&mut self, path: impl Into<PathBuf>, range: Option<Range<u64>>) {
        let body = ResponseBody::file(path, range);
        match body.send_file().and_then(|f| f.range_len()) {
            Some(len) => self.set_content_length(len),
            None => self.clear_content_length(),
        }
        self.body = body;
    }

    /// Renders the response into an `http::Response`.
    ///
    /// The explicit content length becomes a `Content-Length` header and every cookie
    /// becomes a `Set-Cookie` header. Cookies that are not valid header values are
    /// dropped with a warning.
    pub fn into_http(self) -> http::Response<ResponseBody> {
        let mut headers = self.headers;
        if let Some(length) = self.content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        for cookie in &self.cookies {
            match HeaderValue::try_from(cookie.to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(_) => warn!(cookie = cookie.name(), "invalid cookie, skipped"),
            }
        }

        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = headers;
        response
    }
}

impl<B> From<http::Response<B>> for Response
where
    B: Into<ResponseBody>,
{
    fn from(response: http::Response<B>) -> Self {
        let (parts, body) = response.into_parts();
        let content_length =
            parts.headers.get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<u64>().ok());
        let mut headers = parts.headers;
        headers.remove(CONTENT_LENGTH);
        Self {
            status: parts.status,
            reason: None,
            version: parts.version,
            headers,
            cookies: Vec::new(),
            content_length,
            body: body.into(),
        }
    }
}
