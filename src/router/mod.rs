//! Request routing — map URL patterns and HTTP methods to middleware.
//!
//! [`Router`] is itself a [`Middleware`]: it picks the first route whose method
//! and pattern match the request and hands over to that route's middleware.
//! Requests no route matches fall through to the router's `next`. Three
//! pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params              |
//! |----------------------|----------------------------|------------------------------|
//! | `/users`             | `/users`                   | *(none)*                     |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                  |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"` |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so `/users/` and
//! `/users` are treated as equivalent.
//!
//! Patterns are matched against the logical path ([`Request::path`]), so a
//! router placed under [`mount`](crate::middleware::mount) routes on the path
//! below the mount prefix.
//!
//! Routes are matched in registration order; the first route whose method and pattern both
//! match wins. There is no ranking by specificity. A `HEAD` request is served by a `GET`
//! route when no `HEAD` route matches first.

use std::sync::Arc;

use crate::error::Result;
use crate::http::request::Params;
use crate::middleware::{BoxFuture, Middleware, Next, SharedMiddleware};
use crate::{Method, Request, Response};

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    // Matches one exact path string, e.g. `/users`.
    Exact(String),
    // Matches a fixed number of segments where some may be named captures, e.g. `/users/:id`.
    Parameterized { segments: Vec<Segment> },
    // Matches the prefix itself and anything below it, e.g. `/files/*`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

impl Pattern {
    /// Parse a route pattern string into a `Pattern`.
    ///
    /// The pattern is classified as follows (checked in order):
    ///
    /// 1. Ends with `/*` → [`Pattern::Wildcard`] — matches any path below the prefix.
    /// 2. Contains `:` → [`Pattern::Parameterized`] — one or more named captures.
    /// 3. Otherwise → [`Pattern::Exact`] — literal path match.
    ///
    /// A trailing slash (other than on the root `/`) is stripped before classification so
    /// that `/users/` and `/users` compile to identical patterns.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if let Some(p) = s.strip_prefix(':') {
                        Segment::Parameter(p.to_string())
                    } else {
                        Segment::Static(s.to_string())
                    }
                })
                .collect();

            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    // Try to match `path` against this pattern, returning extracted [`Params`] on success.
    fn matches(&self, path: &str) -> Option<Params> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(Params::new),
            Pattern::Parameterized { segments } => {
                let mut params = Params::new();
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

                if segments.len() != path_segments.len() {
                    return None;
                }

                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) => {
                            if s != path_seg {
                                return None;
                            }
                        }
                        Segment::Parameter(name) => {
                            params.insert(name.as_str(), path_seg);
                        }
                    }
                }

                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = Params::new();
                params.insert("wildcard", suffix);
                Some(params)
            }
        }
    }
}

// A single registered route binding a method + pattern to a middleware.
struct Route {
    method: Method,
    pattern: Pattern,
    handler: SharedMiddleware,
}

impl Route {
    // Returns `Some(params)` when both the HTTP method and path pattern match, `None` otherwise.
    fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        let method_ok =
            &self.method == method || (*method == Method::Head && self.method == Method::Get);
        if method_ok {
            self.pattern.matches(path)
        } else {
            None
        }
    }
}

/// Method and path routing as a middleware.
///
/// The matched route's middleware receives the router's own `next`, so it
/// can still pass a request on to whatever follows the router.
///
/// # Examples
///
/// ```rust
/// use weft::middleware::from_fn;
/// use weft::Router;
///
/// let mut router = Router::new();
///
/// router.get("/ping", from_fn(|_req, res, _next| Box::pin(async move {
///     res.set_text("pong");
///     Ok(())
/// })));
///
/// router.get("/users/:id", from_fn(|req, res, _next| Box::pin(async move {
///     let id = req.param("id").unwrap_or("unknown").to_owned();
///     res.set_text(id);
///     Ok(())
/// })));
///
/// assert_eq!(router.len(), 2);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register `handler` for `method` requests matching `pattern`.
    pub fn route(&mut self, method: Method, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(pattern),
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a handler for `GET` (and `HEAD`) requests matching `pattern`.
    pub fn get(&mut self, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.route(Method::Put, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.route(Method::Delete, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.route(Method::Options, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl Middleware) -> &mut Self {
        self.route(Method::Patch, pattern, handler)
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    // First route matching the request, with the params it captured.
    fn find(&self, method: &Method, path: &str) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .find_map(|route| route.matches(method, path).map(|params| (route, params)))
    }
}

impl Middleware for Router {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let Some((route, params)) = self.find(req.method(), req.path()) else {
                tracing::trace!(method = %req.method(), path = %req.path(), "no route matched");
                return next.run(req, res).await;
            };
            req.set_params(params);
            route.handler.call(req, res, next).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;
    use crate::middleware::{compose, from_fn, mount};

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn respond_with(status: StatusCode) -> impl Middleware {
        from_fn(move |_req, res, _next| {
            Box::pin(async move {
                res.set_status(status);
                Ok(())
            })
        })
    }

    async fn dispatch(router: &dyn Middleware, method: &str, path: &str) -> Response {
        let mut req = make_request(method, path);
        let mut res = Response::new();
        router
            .call(&mut req, &mut res, Next::terminal())
            .await
            .unwrap();
        res
    }

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_root() {
        assert!(matches!(Pattern::parse("/"), Pattern::Exact(s) if s == "/"));
    }

    #[test]
    fn pattern_parse_exact() {
        assert!(matches!(Pattern::parse("/users"), Pattern::Exact(s) if s == "/users"));
    }

    #[test]
    fn pattern_parse_trailing_slash_stripped() {
        assert!(matches!(Pattern::parse("/users/"), Pattern::Exact(s) if s == "/users"));
    }

    #[test]
    fn pattern_parse_parameterized_multi() {
        let pat = Pattern::parse("/users/:id/posts/:post_id");
        match pat {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 4);
                assert!(matches!(&segments[0], Segment::Static(s) if s == "users"));
                assert!(matches!(&segments[1], Segment::Parameter(s) if s == "id"));
                assert!(matches!(&segments[3], Segment::Parameter(s) if s == "post_id"));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn pattern_parse_wildcard() {
        assert!(matches!(
            Pattern::parse("/files/*"),
            Pattern::Wildcard(s) if s == "/files"
        ));
    }

    // ── Pattern::matches ──────────────────────────────────────────────────────

    #[test]
    fn pattern_exact_match() {
        let pat = Pattern::parse("/users");
        assert!(pat.matches("/users").is_some());
        assert!(pat.matches("/users/").is_some());
        assert!(pat.matches("/posts").is_none());
    }

    #[test]
    fn pattern_exact_match_root() {
        let pat = Pattern::parse("/");
        assert!(pat.matches("/").is_some());
        assert!(pat.matches("/other").is_none());
    }

    #[test]
    fn pattern_param_extracts_values() {
        let pat = Pattern::parse("/users/:id/posts/:post_id");
        let params = pat.matches("/users/7/posts/99").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
    }

    #[test]
    fn pattern_param_wrong_shape() {
        let pat = Pattern::parse("/users/:id");
        assert!(pat.matches("/users").is_none());
        assert!(pat.matches("/users/42/extra").is_none());
        assert!(pat.matches("/posts/42").is_none());
    }

    #[test]
    fn pattern_wildcard() {
        let pat = Pattern::parse("/files/*");
        let params = pat.matches("/files/docs/readme.txt").unwrap();
        assert_eq!(params.get("wildcard"), Some("/docs/readme.txt"));
        assert!(pat.matches("/files").is_some());
        assert!(pat.matches("/filesystem").is_none());
        assert!(pat.matches("/other/readme.txt").is_none());
    }

    // ── Router ────────────────────────────────────────────────────────────────

    #[test]
    fn router_len_increments_on_add() {
        let mut router = Router::new();
        assert!(router.is_empty());
        router
            .get("/a", respond_with(StatusCode::Ok))
            .post("/b", respond_with(StatusCode::Ok));
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn unmatched_requests_fall_through() {
        let mut router = Router::new();
        router.get("/hello", respond_with(StatusCode::Ok));
        let chain = compose([
            Arc::new(router) as SharedMiddleware,
            Arc::new(respond_with(StatusCode::ImATeapot)),
        ]);

        assert_eq!(dispatch(&chain, "GET", "/world").await.status(), StatusCode::ImATeapot);
        assert_eq!(dispatch(&chain, "POST", "/hello").await.status(), StatusCode::ImATeapot);
        assert_eq!(dispatch(&chain, "GET", "/hello").await.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router
            .get("/users/:id", respond_with(StatusCode::Ok))
            .get("/users/me", respond_with(StatusCode::Accepted));

        assert_eq!(dispatch(&router, "GET", "/users/me").await.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn route_receives_params() {
        let mut router = Router::new();
        router.get(
            "/users/:id",
            from_fn(|req, res, _next| {
                Box::pin(async move {
                    let id = req.param("id").unwrap_or("").to_owned();
                    res.set_text(id);
                    Ok(())
                })
            }),
        );

        let res = dispatch(&router, "GET", "/users/42").await;
        assert!(matches!(res.body(), crate::Body::Text(t) if t == "42"));
    }

    #[tokio::test]
    async fn head_uses_get_routes() {
        let mut router = Router::new();
        router.get("/page", respond_with(StatusCode::Ok));
        assert_eq!(dispatch(&router, "HEAD", "/page").await.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn method_variants_registered() {
        let mut router = Router::new();
        router
            .put("/r", respond_with(StatusCode::Ok))
            .delete("/r", respond_with(StatusCode::NoContent))
            .patch("/r", respond_with(StatusCode::Accepted))
            .options("/r", respond_with(StatusCode::Created));
        assert_eq!(router.len(), 4);
        assert_eq!(dispatch(&router, "PUT", "/r").await.status(), StatusCode::Ok);
        assert_eq!(dispatch(&router, "DELETE", "/r").await.status(), StatusCode::NoContent);
        assert_eq!(dispatch(&router, "PATCH", "/r").await.status(), StatusCode::Accepted);
        assert_eq!(dispatch(&router, "OPTIONS", "/r").await.status(), StatusCode::Created);
    }

    #[tokio::test]
    async fn routes_on_the_mounted_path() {
        let mut router = Router::new();
        router.get("/posts/:slug", respond_with(StatusCode::Ok));
        let app = mount("/blog", router);

        assert_eq!(dispatch(&app, "GET", "/blog/posts/hello").await.status(), StatusCode::Ok);
        assert_eq!(dispatch(&app, "GET", "/posts/hello").await.status(), StatusCode::NotFound);
    }
}
