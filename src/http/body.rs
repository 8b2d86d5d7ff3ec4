//! Request and response bodies.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;

use crate::template::Html;

/// A stream of body bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Anything readable that can be piped into a response, e.g. one half of a
/// duplex transform.
pub type BodyReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// The body of an incoming request.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Buffered(Bytes),
    Stream(ByteStream),
}

impl RequestBody {
    /// Reads the whole body into memory.
    ///
    /// A streamed body is collected once and kept buffered, so later reads
    /// see the same bytes.
    pub async fn bytes(&mut self) -> io::Result<Bytes> {
        match self {
            RequestBody::Empty => Ok(Bytes::new()),
            RequestBody::Buffered(bytes) => Ok(bytes.clone()),
            RequestBody::Stream(stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                let bytes = buf.freeze();
                *self = RequestBody::Buffered(bytes.clone());
                Ok(bytes)
            }
        }
    }

    /// Turns the body into a stream of chunks, leaving nothing behind.
    pub fn into_stream(self) -> ByteStream {
        match self {
            RequestBody::Empty => Box::pin(futures::stream::empty()),
            RequestBody::Buffered(bytes) => Box::pin(futures::stream::iter([Ok(bytes)])),
            RequestBody::Stream(stream) => stream,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Buffered(bytes) => bytes.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Buffered(bytes)
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        RequestBody::Buffered(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Buffered(Bytes::from(text))
    }
}

/// The body of an outgoing response. Its shape decides how it goes on the
/// wire; see [`respond`](crate::server::respond).
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Html(Html),
    Stream(ByteStream),
    Reader(BodyReader),
}

impl Body {
    /// The size in bytes, when known before writing.
    pub fn len(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Text(text) => Some(text.len()),
            Body::Bytes(bytes) => Some(bytes.len()),
            Body::Html(_) | Body::Stream(_) | Body::Reader(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Html(html) => f.debug_tuple("Html").field(html).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
            Body::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(bytes))
    }
}

impl From<Html> for Body {
    fn from(html: Html) -> Self {
        Body::Html(html)
    }
}

impl From<ByteStream> for Body {
    fn from(stream: ByteStream) -> Self {
        Body::Stream(stream)
    }
}
