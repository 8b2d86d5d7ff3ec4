//! # weft
//!
//! A small async HTTP/1.1 framework built around two ideas: middleware that
//! wraps the rest of the chain (`before → next → after`), and HTML templates
//! that stream to the client while their slow parts are still being computed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use weft::middleware::{from_fn, Logger};
//! use weft::template::Value;
//! use weft::{html, App, Router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.get("/", from_fn(|_req, res, _next| Box::pin(async move {
//!         let greeting = Value::pending(async { "streamed" });
//!         res.set_html(html!("<h1>Hello, ", greeting, "!</h1>"));
//!         Ok(())
//!     })));
//!
//!     App::new()
//!         .with(Logger)
//!         .with(router)
//!         .listen("127.0.0.1:8080")
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod template;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use config::Config;
pub use error::{Error, HttpError, Result, TemplateError};
pub use http::{Body, Headers, Method, Redirect, Request, Response, StatusCode};
pub use middleware::{Middleware, Next, compose, from_fn, mount};
pub use router::Router;
pub use server::{Server, ServerError};
pub use template::{Html, Value, unsafe_html};
