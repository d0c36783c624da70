//! The inbound request as seen by handlers.
//!
//! [`Request`] wraps the parts of an `http::Request` and adds the routing state
//! handlers work with: the context path already matched, the remaining path still to
//! be matched, the parsed query parameters and cookies, and the shared [`BodyCell`].

use std::collections::HashMap;

use http::header::{AsHeaderName, COOKIE};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};

use crate::protocol::body::{BodyCell, RequestBody};
use crate::protocol::cookie::{parse_cookie_header, Cookie};
use crate::utils::percent_decode;

/// An inbound HTTP request.
///
/// Cloning a request is cheap enough to do on every scoped modification; the clone
/// shares the body cell with the original, so a body consumed through one copy is
/// consumed for all of them.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    params: HashMap<String, Vec<String>>,
    context_path: String,
    path_info: String,
    body: BodyCell,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::from_head(method, uri, Version::HTTP_11, HeaderMap::new(), RequestBody::empty())
    }

    pub fn from_parts(parts: Parts, body: impl Into<RequestBody>) -> Self {
        Self::from_head(parts.method, parts.uri, parts.version, parts.headers, body.into())
    }

    fn from_head(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: RequestBody) -> Self {
        let cookies = parse_cookies(&headers);
        let mut request = Self {
            method,
            uri: Uri::default(),
            version,
            headers,
            cookies,
            params: HashMap::new(),
            context_path: "/".to_string(),
            path_info: String::new(),
            body: BodyCell::new(body),
        };
        request.set_uri(uri);
        request
    }

    /// Replaces the body cell with a fresh one holding `body`.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = BodyCell::new(body.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self.cookies = parse_cookies(&self.headers);
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the first value of the header `name`.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name() == name)
    }

    /// The query parameters; each name maps to all of its values in order.
    pub fn params(&self) -> &HashMap<String, Vec<String>> {
        &self.params
    }

    /// Returns the first value of the parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn set_param(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.params.insert(name.into(), values);
    }

    pub fn remove_param(&mut self, name: &str) -> Option<Vec<String>> {
        self.params.remove(name)
    }

    /// The part of the path matched so far, always starting and ending with `/`.
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn set_context_path(&mut self, context_path: impl Into<String>) {
        self.context_path = context_path.into();
    }

    /// The part of the path not matched yet, percent-decoded and without a leading `/`.
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn set_path_info(&mut self, path_info: impl Into<String>) {
        self.path_info = path_info.into();
    }

    /// The shared holder of the unread request body.
    pub fn body_cell(&self) -> &BodyCell {
        &self.body
    }

    fn set_uri(&mut self, uri: Uri) {
        self.path_info = percent_decode(uri.path().trim_start_matches('/')).into_owned();
        self.context_path = "/".to_string();
        self.params = uri.query().map(parse_params).unwrap_or_default();
        self.uri = uri;
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<RequestBody>,
{
    fn from(request: http::Request<B>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }
}

fn parse_cookies(headers: &HeaderMap) -> Vec<Cookie> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_cookie_header)
        .collect()
}

fn parse_params(query: &str) -> HashMap<String, Vec<String>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    let mut params: HashMap<String, Vec<String>> = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        params.entry(name).or_default().push(value);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn get(uri: &'static str) -> Request {
        Request::new(Method::GET, Uri::from_static(uri))
    }

    #[test]
    fn path_info_drops_leading_slash_and_decodes() {
        let request = get("/foo/b%20r");
        assert_eq!(request.context_path(), "/");
        assert_eq!(request.path_info(), "foo/b r");

        assert_eq!(get("/").path_info(), "");
    }

    #[test]
    fn query_params_are_multi_valued() {
        let request = get("/search?q=rust&tag=a&tag=b&empty=");
        assert_eq!(request.param("q"), Some("rust"));
        assert_eq!(request.params()["tag"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(request.param("empty"), Some(""));
        assert_eq!(request.param("missing"), None);
    }

    #[test]
    fn cookies_are_parsed_from_headers() {
        let request = get("/").with_header(COOKIE, HeaderValue::from_static("a=1; b=2"));
        assert_eq!(request.cookie("b").map(Cookie::value), Some("2"));
        assert_eq!(request.cookies().len(), 2);
    }

    #[test]
    fn from_http_request() {
        let http_request = http::Request::builder()
            .method(Method::POST)
            .uri("/upload?x=1")
            .version(Version::HTTP_10)
            .body(Bytes::from_static(b"data"))
            .unwrap();
        let request = Request::from(http_request);
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.version(), Version::HTTP_10);
        assert_eq!(request.path_info(), "upload");
        assert_eq!(request.param("x"), Some("1"));
    }

    #[tokio::test]
    async fn clones_share_the_body() {
        let request = get("/").with_body("payload");
        let copy = request.clone();
        assert!(request.body_cell().same_cell(copy.body_cell()));

        let mut body = copy.body_cell().take().await;
        assert_eq!(body.read_to_end().await.unwrap(), Bytes::from_static(b"payload"));
        assert!(request.body_cell().is_spent().await);
    }
}
