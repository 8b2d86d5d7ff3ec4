//! The application: an ordered middleware list plus the fault boundary.
//!
//! ```rust,no_run
//! use weft::middleware::{from_fn, Logger};
//! use weft::{html, App};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::new()
//!         .with(Logger)
//!         .with(from_fn(|_req, res, _next| Box::pin(async move {
//!             res.set_html(html!("<h1>Hello</h1>"));
//!             Ok(())
//!         })));
//!
//!     app.listen("127.0.0.1:8080").await?;
//!     Ok(())
//! }
//! ```

use std::error::Error as StdError;
use std::fmt::Write as _;

use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::Error;
use crate::http::{Request, Response};
use crate::middleware::{Compose, Middleware, Next};
use crate::server::{Server, ServerError};

/// Middleware run in registration order for every request.
#[derive(Clone, Default)]
pub struct App {
    stack: Compose,
    config: Config,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            stack: Compose::default(),
            config,
        }
    }

    /// Appends `middleware` to the chain.
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.stack.push(middleware);
        self
    }

    /// Appends `middleware` to the chain in place.
    pub fn push(&mut self, middleware: impl Middleware) -> &mut Self {
        self.stack.push(middleware);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs the chain for one request and settles the response.
    ///
    /// Faults never escape: they become the response status and a plain
    /// text body, unless the head was already sent, in which case they are
    /// only logged.
    pub async fn handle(&self, req: &mut Request, res: &mut Response) {
        if let Err(err) = self.stack.call(req, res, Next::terminal()).await {
            self.fault(req, res, err);
        }
    }

    fn fault(&self, req: &Request, res: &mut Response, err: Error) {
        let status = err.status();

        if status.as_u16() >= 500 {
            error!(method = %req.method(), path = %req.path(), status = status.as_u16(), error = %err, "request failed");
        } else {
            debug!(method = %req.method(), path = %req.path(), status = status.as_u16(), error = %err, "request rejected");
        }

        if res.headers_sent() {
            warn!(error = %err, "fault after headers were sent, response cut short");
            return;
        }

        let mut body = match err.as_http() {
            Some(http) => http.public_message().to_owned(),
            None => status.canonical_reason().to_owned(),
        };
        if self.config.development {
            append_details(&mut body, &err);
        }

        res.clear_entity();
        res.set_status(status);
        res.set_text(body);
    }

    /// Binds `addr` and serves this app until the listener fails.
    pub async fn listen(self, addr: impl AsRef<str>) -> Result<(), ServerError> {
        Server::bind(addr).await?.run(self).await
    }
}

// Development-only detail: the private message of a protocol fault, or the
// display of any other fault, followed by its source chain.
fn append_details(body: &mut String, err: &Error) {
    let mut source = match err.as_http() {
        Some(http) => {
            if let Some(private) = http.private_message() {
                let _ = write!(body, "\n{private}");
            }
            http.source()
        }
        None => {
            let _ = write!(body, "\n{err}");
            err.source()
        }
    };
    while let Some(cause) = source {
        let _ = write!(body, "\ncaused by: {cause}");
        source = cause.source();
    }
}
