//! The outgoing side of the facade.
//!
//! A [`Response`] is plain data while the middleware chain runs; nothing
//! reaches the wire until [`respond`](crate::server::respond) writes it.

use std::io;
use std::time::SystemTime;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use tokio::io::AsyncRead;

use super::{Body, Cookie, Headers, Request, StatusCode};
use crate::error::Result;
use crate::html;

/// Where [`Response::redirect`] sends the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    To(String),
    /// The `Referer` of the request, or the given fallback (`/` if `None`).
    Back(Option<String>),
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Redirect::To(location.into())
    }

    pub fn back() -> Self {
        Redirect::Back(None)
    }

    pub fn back_or(fallback: impl Into<String>) -> Self {
        Redirect::Back(Some(fallback.into()))
    }
}

/// Headers describing the entity; dropped when a fault replaces the body.
pub(crate) const ENTITY_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "content-encoding",
    "content-language",
    "content-disposition",
    "content-range",
    "etag",
    "last-modified",
];

/// An outgoing response.
///
/// Starts as `404 Not Found` with no body. Setting a body promotes the
/// status to `200 OK` unless a status was set explicitly.
///
/// # Examples
///
/// ```
/// use weft::{Response, StatusCode};
///
/// let mut res = Response::new();
/// assert_eq!(res.status(), StatusCode::NotFound);
///
/// res.set_text("hello");
/// assert_eq!(res.status(), StatusCode::Ok);
/// assert_eq!(res.content_length(), Some(5));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    explicit_status: bool,
    headers: Headers,
    body: Body,
    headers_sent: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::NotFound,
            explicit_status: false,
            headers: Headers::new(),
            body: Body::Empty,
            headers_sent: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.explicit_status = true;
    }

    /// `true` once [`set_status`](Self::set_status) has been called.
    pub fn is_status_explicit(&self) -> bool {
        self.explicit_status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn remove_header(&mut self, name: &str) -> bool {
        self.headers.remove(name)
    }

    /// `true` once the status line and headers are on the wire; from then on
    /// they can no longer change.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub(crate) fn mark_headers_sent(&mut self) {
        self.headers_sent = true;
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
        if !self.explicit_status {
            self.status = StatusCode::Ok;
        }
    }

    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.set_body(Body::Text(text.into()));
    }

    pub fn set_html(&mut self, html: crate::template::Html) {
        self.set_body(Body::Html(html));
    }

    pub fn set_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.set_body(Body::Bytes(bytes.into()));
    }

    pub fn set_stream<S>(&mut self, stream: S)
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        self.set_body(Body::Stream(Box::pin(stream)));
    }

    /// Pipes `reader` into the response, e.g. the readable half of a duplex
    /// transform.
    pub fn set_reader<R>(&mut self, reader: R)
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        self.set_body(Body::Reader(Box::new(reader)));
    }

    /// Serializes `value` as the body with an `application/json` type.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result {
        let json = serde_json::to_string(value)?;
        self.set_content_type("application/json");
        self.set_text(json);
        Ok(())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.headers.set("Content-Type", content_type);
    }

    /// The length of the body in bytes.
    ///
    /// An explicit `Content-Length` header wins. Otherwise text and byte
    /// bodies know their size; templates and streams do not.
    pub fn content_length(&self) -> Option<usize> {
        if let Some(length) = self.headers.get("content-length") {
            return length.trim().parse().ok();
        }
        self.body.len()
    }

    pub fn set_content_length(&mut self, length: usize) {
        self.headers.set("Content-Length", length.to_string());
    }

    /// Sets the `ETag`, wrapping it in quotes unless it already is a quoted
    /// or weak tag.
    pub fn set_etag(&mut self, etag: &str) {
        let value = if etag.starts_with('"') || etag.starts_with("W/\"") {
            etag.to_owned()
        } else {
            format!("\"{}\"", etag.replace('"', "\\\""))
        };
        self.headers.set("ETag", value);
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get("etag")
    }

    pub fn set_last_modified(&mut self, at: SystemTime) {
        self.headers.set("Last-Modified", httpdate::fmt_http_date(at));
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        httpdate::parse_http_date(self.headers.get("last-modified")?).ok()
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.headers.append("Set-Cookie", cookie.to_string());
    }

    /// Redirects the client.
    ///
    /// Sets `Location`, moves to `302 Found` unless the status already is a
    /// redirect, and writes a short body: a link if the client accepts HTML,
    /// plain text otherwise.
    pub fn redirect(&mut self, req: &Request, to: Redirect) {
        let location = match to {
            Redirect::To(location) => location,
            Redirect::Back(fallback) => match req.header("referer") {
                Some(referer) => referer.to_owned(),
                None => fallback.unwrap_or_else(|| "/".to_owned()),
            },
        };
        self.headers.set("Location", location.as_str());

        if !self.status.is_redirection() {
            self.set_status(StatusCode::Found);
        }

        if req.accepts().html() {
            let link = html!(
                "Redirecting to <a href=\"",
                location.as_str(),
                "\">",
                location.as_str(),
                "</a>."
            );
            self.set_html(link);
        } else {
            self.set_text(format!("Redirecting to {location}."));
        }
    }

    /// Drops the body and entity headers ahead of writing a fault.
    pub(crate) fn clear_entity(&mut self) {
        for name in ENTITY_HEADERS {
            self.headers.remove(name);
        }
        self.body = Body::Empty;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::SameSite;

    #[test]
    fn defaults_to_not_found() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::NotFound);
        assert!(!res.is_status_explicit());
        assert!(res.body().is_empty());
    }

    #[test]
    fn body_promotes_to_ok() {
        let mut res = Response::new();
        res.set_text("hi");
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[test]
    fn explicit_status_survives_body() {
        let mut res = Response::new();
        res.set_status(StatusCode::Created);
        res.set_text("made");
        assert_eq!(res.status(), StatusCode::Created);

        let mut res = Response::new();
        res.set_status(StatusCode::NotFound);
        res.set_text("nothing here");
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[test]
    fn content_length_prefers_header() {
        let mut res = Response::new();
        res.set_text("hello");
        assert_eq!(res.content_length(), Some(5));

        res.set_content_length(3);
        assert_eq!(res.content_length(), Some(3));

        res.remove_header("content-length");
        res.set_stream(futures::stream::empty());
        assert_eq!(res.content_length(), None);
    }

    #[test]
    fn etag_is_quoted_once() {
        let mut res = Response::new();
        res.set_etag("abc");
        assert_eq!(res.etag(), Some("\"abc\""));

        res.set_etag("\"abc\"");
        assert_eq!(res.etag(), Some("\"abc\""));

        res.set_etag("W/\"abc\"");
        assert_eq!(res.etag(), Some("W/\"abc\""));

        res.set_etag("a\"b");
        assert_eq!(res.etag(), Some("\"a\\\"b\""));
    }

    #[test]
    fn last_modified_round_trips_at_second_precision() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut res = Response::new();
        res.set_last_modified(at);
        assert_eq!(res.header("last-modified"), Some("Tue, 14 Nov 2023 22:13:20 GMT"));
        assert_eq!(res.last_modified(), Some(at));
    }

    #[test]
    fn json_sets_type() {
        let mut res = Response::new();
        res.set_json(&serde_json::json!({ "ok": true })).unwrap();
        assert_eq!(res.content_type(), Some("application/json"));
        assert!(matches!(res.body(), Body::Text(t) if t == r#"{"ok":true}"#));
    }

    #[test]
    fn cookies_append() {
        let mut res = Response::new();
        res.set_cookie(&Cookie::new("a", "1"));
        res.set_cookie(&Cookie::new("b", "2").same_site(SameSite::Lax));
        assert_eq!(res.headers().get_all("set-cookie").count(), 2);
    }

    #[test]
    fn redirect_with_html_body() {
        let req = Request::builder()
            .target("/")
            .header("Accept", "text/html")
            .build();
        let mut res = Response::new();
        res.redirect(&req, Redirect::to("/login?next=<x>"));

        assert_eq!(res.status(), StatusCode::Found);
        assert_eq!(res.header("location"), Some("/login?next=<x>"));
        let Body::Html(body) = res.body() else {
            panic!("expected an HTML body, got {:?}", res.body());
        };
        assert_eq!(
            body.render().unwrap(),
            "Redirecting to <a href=\"/login?next=&lt;x&gt;\">/login?next=&lt;x&gt;</a>."
        );
    }

    #[test]
    fn redirect_with_text_body() {
        let req = Request::builder()
            .target("/")
            .header("Accept", "application/json")
            .build();
        let mut res = Response::new();
        res.redirect(&req, Redirect::to("/home"));
        assert!(matches!(res.body(), Body::Text(t) if t == "Redirecting to /home."));
    }

    #[test]
    fn redirect_keeps_an_existing_redirect_status() {
        let req = Request::builder().target("/").build();
        let mut res = Response::new();
        res.set_status(StatusCode::MovedPermanently);
        res.redirect(&req, Redirect::to("/new"));
        assert_eq!(res.status(), StatusCode::MovedPermanently);
    }

    #[test]
    fn redirect_back_uses_referer_then_fallback() {
        let with_referer = Request::builder()
            .target("/")
            .header("Referer", "/previous")
            .build();
        let mut res = Response::new();
        res.redirect(&with_referer, Redirect::back_or("/fallback"));
        assert_eq!(res.header("location"), Some("/previous"));

        let without = Request::builder().target("/").build();
        let mut res = Response::new();
        res.redirect(&without, Redirect::back_or("/fallback"));
        assert_eq!(res.header("location"), Some("/fallback"));

        let mut res = Response::new();
        res.redirect(&without, Redirect::back());
        assert_eq!(res.header("location"), Some("/"));
    }

    #[test]
    fn clear_entity_keeps_other_headers() {
        let mut res = Response::new();
        res.set_header("X-Request-Id", "7");
        res.set_content_type("text/html");
        res.set_etag("v1");
        res.set_text("partial");
        res.clear_entity();

        assert!(res.body().is_empty());
        assert!(!res.has_header("content-type"));
        assert!(!res.has_header("etag"));
        assert_eq!(res.header("x-request-id"), Some("7"));
    }
}
