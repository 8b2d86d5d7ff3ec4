//! Scoping middleware to a path prefix.

use super::{BoxFuture, Continuation, Middleware, Next};
use crate::error::Result;
use crate::http::{Request, Response};

/// A middleware that only runs below a path prefix. Built by [`mount`].
pub struct Mount<M> {
    prefix: String,
    inner: M,
}

/// Runs `inner` only for requests whose logical path lies under `prefix`.
///
/// While `inner` runs, [`Request::path`] is the part of the path below the
/// prefix, always starting with `/`. Middleware downstream of `inner` (reached
/// through its `next`) and everything outside the mount see the full path.
///
/// A prefix without a trailing slash matches itself and anything below it:
/// `/blog` matches `/blog` and `/blog/post`, but not `/blogroll`. A prefix with
/// a trailing slash requires it: `/blog/` matches `/blog/` and `/blog/post`,
/// but not `/blog`.
pub fn mount<M: Middleware>(prefix: impl Into<String>, inner: M) -> Mount<M> {
    Mount {
        prefix: prefix.into(),
        inner,
    }
}

impl<M> Mount<M> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The path `inner` sees for `path`, or `None` if it is outside the mount.
    pub fn subpath(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if self.prefix.ends_with('/') {
            return Some(format!("/{rest}"));
        }
        if rest.is_empty() {
            Some("/".to_owned())
        } else if rest.starts_with('/') {
            Some(rest.to_owned())
        } else {
            None
        }
    }
}

// Puts the full path back while the outer chain runs, then returns to the
// subpath for the rest of the mounted middleware's post-phase.
struct Remount<'c, 'x> {
    outer: &'c mut Next<'x>,
    original: &'c str,
    sub: &'c str,
}

impl Continuation for Remount<'_, '_> {
    fn resume<'s>(&'s mut self, req: &'s mut Request, res: &'s mut Response) -> BoxFuture<'s, Result> {
        Box::pin(async move {
            req.set_path(self.original);
            let result = self.outer.run(req, res).await;
            req.set_path(self.sub);
            result
        })
    }
}

impl<M: Middleware> Middleware for Mount<M> {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let Some(sub) = self.subpath(req.path()) else {
                return next.run(req, res).await;
            };
            let original = req.path().to_owned();
            tracing::trace!(prefix = %self.prefix, path = %original, sub = %sub, "entering mount");

            req.set_path(sub.as_str());
            let result = {
                let inner_next = Next::new(Remount {
                    outer: &mut next,
                    original: &original,
                    sub: &sub,
                });
                self.inner.call(req, res, inner_next).await
            };
            req.set_path(original);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::middleware::{SharedMiddleware, compose, from_fn};

    #[test]
    fn boundary_table() {
        let cases = [
            ("/foo", "/foo", Some("/")),
            ("/foo", "/foo/", Some("/")),
            ("/foo", "/foo/bar", Some("/bar")),
            ("/foo", "/foobar", None),
            ("/foo", "/fo", None),
            ("/foo", "/", None),
            ("/foo/", "/foo", None),
            ("/foo/", "/foo/", Some("/")),
            ("/foo/", "/foo/bar", Some("/bar")),
            ("/foo/", "/foobar", None),
            ("/a/b", "/a/b/c/d", Some("/c/d")),
        ];

        for (prefix, path, expected) in cases {
            let m = mount(prefix, compose(Vec::<SharedMiddleware>::new()));
            assert_eq!(
                m.subpath(path).as_deref(),
                expected,
                "prefix {prefix:?} path {path:?}"
            );
        }
    }

    type Seen = Arc<Mutex<Vec<String>>>;

    // Records the path it sees before and after `next`.
    fn observer(seen: &Seen, label: &'static str) -> SharedMiddleware {
        let seen = Arc::clone(seen);
        Arc::new(from_fn(move |req, res, mut next| {
            let seen = Arc::clone(&seen);
            Box::pin(async move {
                seen.lock().unwrap().push(format!("{label}-pre {}", req.path()));
                next.run(req, res).await?;
                seen.lock().unwrap().push(format!("{label}-post {}", req.path()));
                Ok(())
            })
        }))
    }

    async fn run(chain: &dyn Middleware, target: &str) -> Request {
        let mut req = Request::builder().target(target).build();
        let mut res = Response::new();
        chain
            .call(&mut req, &mut res, Next::terminal())
            .await
            .unwrap();
        req
    }

    #[tokio::test]
    async fn each_position_sees_its_own_path() {
        let seen = Seen::default();
        let chain = compose([
            observer(&seen, "before"),
            Arc::new(mount("/blog", observer(&seen, "inside"))) as SharedMiddleware,
            observer(&seen, "after"),
        ]);

        let req = run(&chain, "/blog/posts/1").await;
        assert_eq!(
            *seen.lock().unwrap(),
            [
                "before-pre /blog/posts/1",
                "inside-pre /posts/1",
                "after-pre /blog/posts/1",
                "after-post /blog/posts/1",
                "inside-post /posts/1",
                "before-post /blog/posts/1",
            ]
        );
        assert_eq!(req.path(), "/blog/posts/1");
    }

    #[tokio::test]
    async fn unmatched_paths_skip_the_inner_middleware() {
        let seen = Seen::default();
        let chain = compose([
            Arc::new(mount("/blog", observer(&seen, "inside"))) as SharedMiddleware,
            observer(&seen, "after"),
        ]);

        run(&chain, "/blogroll").await;
        assert_eq!(
            *seen.lock().unwrap(),
            ["after-pre /blogroll", "after-post /blogroll"]
        );
    }

    #[tokio::test]
    async fn nested_mounts_strip_in_turn() {
        let seen = Seen::default();
        let inner = mount("/v1", observer(&seen, "v1"));
        let chain = compose([
            Arc::new(mount("/api", inner)) as SharedMiddleware,
            observer(&seen, "tail"),
        ]);

        run(&chain, "/api/v1/users").await;
        assert_eq!(
            *seen.lock().unwrap(),
            [
                "v1-pre /users",
                "tail-pre /api/v1/users",
                "tail-post /api/v1/users",
                "v1-post /users",
            ]
        );
    }

    #[tokio::test]
    async fn path_is_restored_when_the_inner_middleware_fails() {
        let failing = from_fn(|_req, _res, _next| {
            Box::pin(async { Err(crate::StatusCode::Forbidden.into()) })
        });
        let chain = mount("/admin", failing);

        let mut req = Request::builder().target("/admin/users").build();
        let mut res = Response::new();
        let err = chain
            .call(&mut req, &mut res, Next::terminal())
            .await
            .unwrap_err();
        assert_eq!(err.status(), crate::StatusCode::Forbidden);
        assert_eq!(req.path(), "/admin/users");
    }
}
