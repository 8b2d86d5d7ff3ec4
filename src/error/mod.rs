//! Fault types raised while a request travels through the middleware chain.
//!
//! Every fallible step of request processing returns [`Error`]. The dispatch
//! loop in [`App`](crate::app::App) is the single place where an `Error` is
//! turned into a response status and body.
//!
//! ## Taxonomy
//!
//! | Kind              | Variant(s)                                   | Status          |
//! |-------------------|----------------------------------------------|-----------------|
//! | Protocol fault    | [`Error::Http`]                              | carried status  |
//! | Programming fault | [`Error::NextCalledTwice`], [`Error::Template`], [`Error::MissingTarget`] | 500 |
//! | Unexpected fault  | everything else                              | 500             |

use std::fmt;

use thiserror::Error;

use crate::http::StatusCode;

/// Boxed error type accepted as the source of an [`HttpError`] or as
/// [`Error::Other`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used by middleware and handlers.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// The error type threaded through middleware, the router, and the app.
#[derive(Debug, Error)]
pub enum Error {
    /// A deliberate HTTP outcome raised by middleware (404, 401, 422, ...).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A middleware invoked its continue callback a second time.
    #[error("next() called multiple times")]
    NextCalledTwice,

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The request carried no target, so no URL can be derived from it.
    #[error("request has no target path")]
    MissingTarget,

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Wraps any error as an unexpected fault.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// Returns the status this fault maps to.
    ///
    /// Protocol faults carry their own status; everything else is a
    /// `500 Internal Server Error`.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(err) => err.status(),
            _ => StatusCode::InternalServerError,
        }
    }

    /// Returns the protocol fault inside this error, if any.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

/// A protocol fault: an explicit status, a message safe to show the client,
/// and an optional private diagnostic that is only revealed in development.
///
/// # Examples
///
/// ```
/// use weft::{HttpError, StatusCode};
///
/// let err = HttpError::new(StatusCode::NotFound)
///     .message("No such user")
///     .private("user 42 missing from the users table");
///
/// assert_eq!(err.status(), StatusCode::NotFound);
/// assert_eq!(err.public_message(), "No such user");
/// assert_eq!(err.private_message(), Some("user 42 missing from the users table"));
/// ```
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: Option<String>,
    private: Option<String>,
    source: Option<BoxError>,
}

impl HttpError {
    /// Creates a fault whose public message is the status' canonical reason.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            private: None,
            source: None,
        }
    }

    /// Sets the public message sent to the client.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the private diagnostic message.
    #[must_use]
    pub fn private(mut self, private: impl Into<String>) -> Self {
        self.private = Some(private.into());
        self
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.status.canonical_reason())
    }

    pub fn private_message(&self) -> Option<&str> {
        self.private.as_deref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status.as_u16(), self.public_message())
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

impl From<StatusCode> for Error {
    fn from(status: StatusCode) -> Self {
        Self::Http(HttpError::new(status))
    }
}

/// Faults raised while building or synchronously rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `literals.len()` must be exactly `values.len() + 1`.
    #[error("template has {literals} literal segments for {values} values")]
    Arity { literals: usize, values: usize },

    /// Synchronous rendering met a pending value that has not resolved yet.
    #[error("cannot render an unresolved pending value synchronously")]
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_fault_keeps_status() {
        let err: Error = HttpError::new(StatusCode::Forbidden).into();
        assert_eq!(err.status(), StatusCode::Forbidden);
        assert!(err.as_http().is_some());
    }

    #[test]
    fn other_faults_are_500() {
        assert_eq!(
            Error::NextCalledTwice.status(),
            StatusCode::InternalServerError
        );
        assert_eq!(
            Error::other("boom").status(),
            StatusCode::InternalServerError
        );
    }

    #[test]
    fn public_message_defaults_to_reason() {
        let err = HttpError::new(StatusCode::NotFound);
        assert_eq!(err.public_message(), "Not Found");
        assert_eq!(err.to_string(), "404: Not Found");
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error as _;
        let io = std::io::Error::other("disk gone");
        let err = HttpError::new(StatusCode::BadGateway).with_source(io);
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk gone".into()));
    }
}
