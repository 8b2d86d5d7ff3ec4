//! The incoming side of the facade: parsing the request head with
//! [`httparse`] and the accessors middleware reads from.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::{Accepts, Cookies, Headers, Method, RequestBody, StatusCode};
use crate::error::{Error, HttpError, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur while parsing an HTTP/1.1 request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("request body exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },
}

/// Path parameters captured by the [`Router`](crate::router::Router).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// An incoming request.
///
/// The shape is fixed at construction. Derived views (the URL, cookies, the
/// `Accept` preferences) are computed on first use and cached.
///
/// # Examples
///
/// ```
/// use weft::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: example.com\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name").as_deref(), Some("world"));
/// assert_eq!(request.origin(), "http://example.com");
/// ```
#[derive(Debug)]
pub struct Request {
    id: u64,
    method: Method,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    target: Option<String>,
    headers: Headers,
    secure: bool,
    trust_proxy: bool,
    url: OnceLock<std::result::Result<Url, url::ParseError>>,
    path: Option<String>,
    params: Params,
    cookies: OnceLock<Cookies>,
    accepts: OnceLock<Accepts>,
    body: RequestBody,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    fn new(method: Method, version: u8, target: Option<String>, headers: Headers) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            method,
            version,
            target,
            headers,
            secure: false,
            trust_proxy: false,
            url: OnceLock::new(),
            path: None,
            params: Params::new(),
            cookies: OnceLock::new(),
            accepts: OnceLock::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Parses a request head from a byte slice.
    ///
    /// Returns the request and the byte offset at which the body begins in
    /// `buf` (immediately after the `\r\n\r\n` header terminator). The body
    /// itself is left to the caller.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: more data is needed to complete the head.
    /// - [`RequestError::Parse`]: the data is malformed.
    /// - [`RequestError::MissingField`]: method, path, or version is absent.
    pub fn parse(buf: &[u8]) -> std::result::Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req.method {
            Some(method) => method.parse().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };
        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.append(header.name, value);
            }
        }

        Ok((
            Self::new(method, version, Some(target.to_owned()), header_map),
            body_offset,
        ))
    }

    /// A process-unique identifier, for keying per-request state kept
    /// outside the request.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The raw request target as received, e.g. `/search?q=rust`.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// The first value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.get_all(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// `true` when the request arrived over a secure transport.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    pub fn set_trust_proxy(&mut self, trust: bool) {
        self.trust_proxy = trust;
    }

    // First entry of a comma-separated forwarding header, honored only when
    // proxies are trusted.
    fn forwarded(&self, name: &str) -> Option<&str> {
        if !self.trust_proxy {
            return None;
        }
        let value = self.headers.get(name)?.split(',').next()?.trim();
        (!value.is_empty()).then_some(value)
    }

    /// `http` or `https`.
    pub fn protocol(&self) -> &str {
        if self.secure {
            return "https";
        }
        match self.forwarded("x-forwarded-proto") {
            Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        }
    }

    /// The host the client addressed, falling back to `localhost`.
    pub fn host(&self) -> &str {
        self.forwarded("x-forwarded-host")
            .or_else(|| self.headers.get("host"))
            .unwrap_or("localhost")
    }

    /// Scheme and host, e.g. `https://example.com`.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol(), self.host())
    }

    /// The full request URL, parsed on first use.
    ///
    /// # Errors
    ///
    /// [`Error::MissingTarget`] when the request has no target,
    /// [`Error::Url`] when the target does not form a valid URL.
    pub fn url(&self) -> Result<&Url> {
        let target = self.target.as_deref().ok_or(Error::MissingTarget)?;
        let parsed = self.url.get_or_init(|| {
            if !target.starts_with('/') {
                return Url::parse(target);
            }
            let mut url = self.base_url()?;
            let (path, query) = match target.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (target, None),
            };
            url.set_path(path);
            url.set_query(query);
            Ok(url)
        });
        parsed.as_ref().map_err(|err| Error::Url(*err))
    }

    // The origin as a URL with nothing but scheme and host. A host header
    // that carries a path, query or credentials, or does not parse at all,
    // falls back to `localhost`.
    fn base_url(&self) -> std::result::Result<Url, url::ParseError> {
        let origin = Url::parse(&self.origin()).ok().filter(|url| {
            url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
                && url.username().is_empty()
                && url.password().is_none()
        });
        match origin {
            Some(url) => Ok(url),
            None => Url::parse(&format!("{}://localhost", self.protocol())),
        }
    }

    /// The logical path.
    ///
    /// Defaults to the path of [`url`](Self::url), or `/` when there is no
    /// usable URL. [`mount`](crate::middleware::mount) overrides it with the
    /// part below the mount prefix for the middleware it wraps.
    pub fn path(&self) -> &str {
        if let Some(path) = &self.path {
            return path;
        }
        match self.url() {
            Ok(url) => url.path(),
            Err(_) => "/",
        }
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = Some(path.into());
    }

    /// The raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.url().ok()?.query()
    }

    /// The first value of query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url()
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn cookies(&self) -> &Cookies {
        self.cookies
            .get_or_init(|| Cookies::parse(self.headers.get_all("cookie")))
    }

    pub fn accepts(&self) -> &Accepts {
        self.accepts
            .get_or_init(|| Accepts::parse(self.headers.get("accept")))
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// The `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<RequestBody>) {
        self.body = body.into();
    }

    /// Takes the body out of the request, e.g. to pipe it elsewhere.
    pub fn take_body(&mut self) -> RequestBody {
        std::mem::take(&mut self.body)
    }

    /// Reads the whole body.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        Ok(self.body.bytes().await?)
    }

    /// Reads the whole body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// A body that is not valid UTF-8 is a `400 Bad Request`.
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|err| {
            HttpError::new(StatusCode::BadRequest)
                .message("Request body is not valid UTF-8")
                .with_source(err)
                .into()
        })
    }

    /// Reads the whole body and decodes it as JSON.
    ///
    /// # Errors
    ///
    /// A body that does not decode into `T` is a `400 Bad Request`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            HttpError::new(StatusCode::BadRequest)
                .message("Invalid JSON body")
                .with_source(err)
                .into()
        })
    }
}

/// Builds a [`Request`] without going through the wire parser.
///
/// ```
/// use weft::{Method, Request};
///
/// let req = Request::builder()
///     .method(Method::Post)
///     .target("/users")
///     .header("Host", "api.example.com")
///     .body("{}")
///     .build();
/// assert_eq!(req.path(), "/users");
/// assert_eq!(req.origin(), "http://api.example.com");
/// ```
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    version: Option<u8>,
    target: Option<String>,
    headers: Headers,
    secure: bool,
    trust_proxy: bool,
    body: RequestBody,
}

impl RequestBuilder {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn version(mut self, minor: u8) -> Self {
        self.version = Some(minor);
        self
    }

    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        let mut req = Request::new(
            self.method.unwrap_or(Method::Get),
            self.version.unwrap_or(1),
            self.target,
            self.headers,
        );
        req.secure = self.secure;
        req.trust_proxy = self.trust_proxy;
        req.body = self.body;
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method().as_str(), "GET");
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.header("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn parse_query_string() {
        let raw = b"GET /search?q=rust+lang&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust+lang&page=2"));
        assert_eq!(req.query_param("q").as_deref(), Some("rust lang"));
        assert_eq!(req.query_param("page").as_deref(), Some("2"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_http11_default() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(req.is_keep_alive());
    }

    #[test]
    fn connection_close() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn content_length() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(&raw[body_offset..], b"hello");
    }

    #[test]
    fn ids_are_unique() {
        let a = Request::builder().build();
        let b = Request::builder().build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_first_wins() {
        let req = Request::builder()
            .header("X-Tag", "one")
            .header("x-tag", "two")
            .build();
        assert_eq!(req.header("x-TAG"), Some("one"));
        assert_eq!(req.header_all("X-Tag").collect::<Vec<_>>(), ["one", "two"]);
        assert!(req.has_header("x-tag"));
    }

    #[test]
    fn origin_from_transport() {
        let req = Request::builder()
            .target("/")
            .header("Host", "example.com")
            .secure(true)
            .build();
        assert_eq!(req.origin(), "https://example.com");
    }

    #[test]
    fn forwarded_headers_need_trust() {
        let untrusted = Request::builder()
            .target("/")
            .header("Host", "internal:8080")
            .header("X-Forwarded-Proto", "https")
            .header("X-Forwarded-Host", "example.com")
            .build();
        assert_eq!(untrusted.origin(), "http://internal:8080");

        let trusted = Request::builder()
            .target("/")
            .header("Host", "internal:8080")
            .header("X-Forwarded-Proto", "https, http")
            .header("X-Forwarded-Host", "example.com")
            .trust_proxy(true)
            .build();
        assert_eq!(trusted.origin(), "https://example.com");
    }

    #[test]
    fn host_falls_back_to_localhost() {
        let req = Request::builder().target("/a").build();
        assert_eq!(req.url().unwrap().as_str(), "http://localhost/a");
    }

    #[test]
    fn host_cannot_reach_into_the_path() {
        let req = Request::builder()
            .target("/public?page=2")
            .header("Host", "example.com/admin")
            .build();
        assert_eq!(req.path(), "/public");
        assert_eq!(req.query(), Some("page=2"));
        assert_eq!(req.url().unwrap().host_str(), Some("localhost"));

        let req = Request::builder()
            .target("/x")
            .header("Host", "h?q")
            .build();
        assert_eq!(req.path(), "/x");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn unparsable_host_keeps_the_path() {
        let req = Request::builder()
            .target("/secret")
            .header("Host", "bad host")
            .build();
        assert_eq!(req.url().unwrap().as_str(), "http://localhost/secret");
        assert_eq!(req.path(), "/secret");
    }

    #[test]
    fn valid_host_with_port_is_kept() {
        let req = Request::builder()
            .target("/a/b")
            .header("Host", "example.com:8080")
            .build();
        assert_eq!(req.url().unwrap().as_str(), "http://example.com:8080/a/b");
    }

    #[test]
    fn url_without_target_faults() {
        let req = Request::builder().build();
        assert!(matches!(req.url(), Err(Error::MissingTarget)));
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn absolute_form_target() {
        let req = Request::builder()
            .target("http://example.com/x?y=1")
            .build();
        assert_eq!(req.path(), "/x");
        assert_eq!(req.query(), Some("y=1"));
    }

    #[test]
    fn path_override() {
        let mut req = Request::builder().target("/blog/posts").build();
        req.set_path("/posts");
        assert_eq!(req.path(), "/posts");
        assert_eq!(req.url().unwrap().path(), "/blog/posts");
    }

    #[test]
    fn cookies_are_parsed_lazily() {
        let req = Request::builder()
            .header("Cookie", "session=abc; theme=dark")
            .build();
        assert_eq!(req.cookies().get("theme"), Some("dark"));
        assert_eq!(req.cookies().len(), 2);
    }

    #[tokio::test]
    async fn text_and_json_bodies() {
        let mut req = Request::builder().body(r#"{"name":"ferris"}"#).build();
        assert_eq!(req.text().await.unwrap(), r#"{"name":"ferris"}"#);

        let value: serde_json::Value = req.json().await.unwrap();
        assert_eq!(value["name"], "ferris");
    }

    #[tokio::test]
    async fn bad_json_is_a_client_error() {
        let mut req = Request::builder().body("{not json").build();
        let err = req.json::<serde_json::Value>().await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BadRequest);
    }
}
