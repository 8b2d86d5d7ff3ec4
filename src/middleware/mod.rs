//! Middleware pipeline — composable before/after request logic.
//!
//! A middleware receives the request, the response, and a [`Next`] continue
//! callback. Code before `next.run(..)` runs on the way down the chain, code
//! after it runs on the way back up:
//!
//! ```text
//! compose([A, B, C]):   A-pre → B-pre → C-pre → C-post → B-post → A-post
//! ```
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — the continue callback; each chain position gets its own, and
//!   running it twice fails with [`Error::NextCalledTwice`].
//! - [`from_fn`] — adapts a closure into a [`Middleware`].
//! - [`compose`] — turns an ordered list into a single [`Middleware`].
//! - [`mount`] — scopes a middleware to a path prefix.
//! - [`Logger`] — built-in request/response logger.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::http::{Request, Response};

mod mount;

pub use mount::{Mount, mount};

/// A boxed, `Send` future borrowing from the request for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased, reference-counted middleware.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// The core trait for all middleware.
///
/// Implementations may:
///
/// - **Pass through** — `next.run(req, res).await`.
/// - **Short-circuit** — set a body and return without calling `next`;
///   downstream middleware never runs, upstream post-phases still do.
/// - **Decorate** — call `next`, then adjust the response on the way back.
///
/// Returning `Err` unwinds the chain up to the first middleware that handles
/// it, or to the app, which turns it into a response.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        (**self).call(req, res, next)
    }
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        (**self).call(req, res, next)
    }
}

/// Whatever runs when a [`Next`] is invoked: the rest of a chain, the
/// path-restoring wrapper of a mount, or nothing at all.
pub(crate) trait Continuation: Send {
    fn resume<'s>(&'s mut self, req: &'s mut Request, res: &'s mut Response)
    -> BoxFuture<'s, Result>;
}

/// The continue callback handed to a middleware.
///
/// `Next` can be run at most once. A second call returns
/// [`Error::NextCalledTwice`] and does not touch the downstream chain.
pub struct Next<'a> {
    inner: Box<dyn Continuation + 'a>,
    called: bool,
}

struct Terminal;

impl Continuation for Terminal {
    fn resume<'s>(&'s mut self, _: &'s mut Request, _: &'s mut Response) -> BoxFuture<'s, Result> {
        Box::pin(async { Ok(()) })
    }
}

impl<'a> Next<'a> {
    pub(crate) fn new(inner: impl Continuation + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            called: false,
        }
    }

    /// A continue callback that does nothing; the end of every app chain.
    pub fn terminal() -> Self {
        Self::new(Terminal)
    }

    /// Hands control to the downstream chain and waits for it to unwind.
    ///
    /// # Errors
    ///
    /// Propagates downstream faults, and returns
    /// [`Error::NextCalledTwice`] if this callback already ran.
    pub fn run<'s>(&'s mut self, req: &'s mut Request, res: &'s mut Response) -> BoxFuture<'s, Result> {
        if self.called {
            return Box::pin(async { Err(Error::NextCalledTwice) });
        }
        self.called = true;
        self.inner.resume(req, res)
    }

    /// `true` once [`run`](Self::run) has been invoked.
    pub fn is_called(&self) -> bool {
        self.called
    }
}

// The remainder of a composed chain. `outer` is the continue callback the
// composed middleware itself was given.
struct Chain<'c, 'x> {
    rest: &'c [SharedMiddleware],
    outer: &'c mut Next<'x>,
}

impl Continuation for Chain<'_, '_> {
    fn resume<'s>(&'s mut self, req: &'s mut Request, res: &'s mut Response) -> BoxFuture<'s, Result> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                let next = Next::new(Chain {
                    rest: tail,
                    outer: &mut *self.outer,
                });
                head.call(req, res, next)
            }
            None => self.outer.run(req, res),
        }
    }
}

/// An ordered list of middleware behaving as one.
///
/// Built by [`compose`]. Composition does no work up front; each invocation
/// walks the list lazily, wiring every position's [`Next`] to the one after
/// it and the last to the caller's `next`.
#[derive(Clone, Default)]
pub struct Compose {
    stack: Vec<SharedMiddleware>,
}

impl Compose {
    /// Appends `middleware` to the end of the list.
    pub fn push(&mut self, middleware: impl Middleware) {
        self.stack.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Middleware for Compose {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let Some((head, tail)) = self.stack.split_first() else {
                return next.run(req, res).await;
            };
            let first = Next::new(Chain {
                rest: tail,
                outer: &mut next,
            });
            head.call(req, res, first).await
        })
    }
}

/// Composes `middleware` into a single [`Middleware`] that runs them in
/// order.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use weft::middleware::{compose, from_fn, Middleware, Next, SharedMiddleware};
/// use weft::{Request, Response};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let outer: SharedMiddleware = Arc::new(from_fn(|req, res, mut next| {
///     Box::pin(async move {
///         res.set_text("outer");
///         next.run(req, res).await
///     })
/// }));
/// let chain = compose([outer]);
///
/// let mut req = Request::builder().target("/").build();
/// let mut res = Response::new();
/// chain.call(&mut req, &mut res, Next::terminal()).await.unwrap();
/// assert_eq!(res.status().as_u16(), 200);
/// # }
/// ```
pub fn compose<I>(middleware: I) -> Compose
where
    I: IntoIterator,
    I::Item: Into<SharedMiddleware>,
{
    Compose {
        stack: middleware.into_iter().map(Into::into).collect(),
    }
}

/// A [`Middleware`] backed by a closure. Built by [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Adapts a closure into a [`Middleware`].
///
/// The closure returns a boxed future so it may borrow the request and
/// response across `.await`s:
///
/// ```rust
/// use weft::middleware::from_fn;
///
/// let hello = from_fn(|_req, res, _next| Box::pin(async move {
///     res.set_text("hello");
///     Ok(())
/// }));
/// # let _ = hello;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result>
        + Send
        + Sync
        + 'static,
{
    FnMiddleware { f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        (self.f)(req, res, next)
    }
}

/// Built-in middleware that logs each request's method, path, status, and
/// duration.
///
/// Emits one `tracing::info!` line after the downstream chain unwinds:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
///
/// Faults are logged at `warn` and passed on unchanged.
pub struct Logger;

impl Middleware for Logger {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        mut next: Next<'a>,
    ) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().clone();
            let path = req.path().to_owned();

            let result = next.run(req, res).await;

            let duration = start.elapsed();
            match &result {
                Ok(()) => {
                    tracing::info!("{} {} - {} ({:?})", method, path, res.status().as_u16(), duration)
                }
                Err(err) => tracing::warn!(
                    status = err.status().as_u16(),
                    error = %err,
                    "{} {} - failed ({:?})",
                    method,
                    path,
                    duration
                ),
            }

            result
        })
    }
}
