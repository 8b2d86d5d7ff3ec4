//! Writing a settled [`Response`] to the connection.

use std::fmt::Write as _;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::SystemTime;

use bytes::{Buf, BufMut, BytesMut};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::{Body, Method, Request, Response, StatusCode};

// How the body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    None,
    Length,
    Chunked,
    Close,
}

/// Writes `res` to `sink` as the answer to `req`.
///
/// By body shape:
///
/// - text: `text/plain; charset=utf-8` unless a type is set, with a length.
/// - template: `text/html; charset=utf-8` unless a type is set, streamed
///   through [`write_html`](crate::template::write_html) with `write_buffer`
///   as the flush threshold.
/// - bytes: `application/octet-stream` unless a type is set, with a length.
/// - stream or reader: piped through as it is produced.
/// - empty: a zero length.
///
/// Bodies of unknown length are chunked on HTTP/1.1 and delimited by closing
/// the connection on HTTP/1.0. An explicit `Content-Length` header always
/// wins. A `HEAD` request gets the head only.
///
/// Returns whether the connection may carry another request.
pub async fn respond<W>(
    sink: &mut W,
    req: &Request,
    res: &mut Response,
    write_buffer: usize,
) -> io::Result<bool>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut keep_alive = req.is_keep_alive();
    let head_only = *req.method() == Method::Head;
    let status = res.status();
    let mut body = res.take_body();

    if status.is_empty_body() {
        body = Body::Empty;
    } else {
        let default_type = match &body {
            Body::Text(_) => Some("text/plain; charset=utf-8"),
            Body::Html(_) => Some("text/html; charset=utf-8"),
            Body::Bytes(_) => Some("application/octet-stream"),
            _ => None,
        };
        if let Some(content_type) = default_type {
            if !res.has_header("content-type") {
                res.set_content_type(content_type);
            }
        }
    }

    let length = match res.header("content-length") {
        Some(explicit) => explicit.trim().parse::<usize>().ok(),
        None => body.len(),
    };
    let framing = if status.is_empty_body() {
        res.remove_header("content-length");
        Framing::None
    } else if let Some(length) = length {
        res.set_content_length(length);
        Framing::Length
    } else if req.version() >= 1 {
        res.remove_header("content-length");
        res.set_header("Transfer-Encoding", "chunked");
        Framing::Chunked
    } else {
        res.remove_header("content-length");
        keep_alive = false;
        Framing::Close
    };

    if !res.has_header("date") {
        res.set_header("Date", httpdate::fmt_http_date(SystemTime::now()));
    }
    res.set_header("Connection", if keep_alive { "keep-alive" } else { "close" });

    sink.write_all(&encode_head(req.version(), status, res)).await?;
    res.mark_headers_sent();

    if head_only || framing == Framing::None {
        sink.flush().await?;
        return Ok(keep_alive);
    }

    if framing == Framing::Chunked {
        let mut chunked = ChunkedWriter::new(sink);
        write_body(&mut chunked, body, write_buffer).await?;
        chunked.finish().await?;
    } else {
        write_body(sink, body, write_buffer).await?;
        sink.flush().await?;
    }

    Ok(keep_alive)
}

async fn write_body<W>(sink: &mut W, body: Body, write_buffer: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    match body {
        Body::Empty => Ok(()),
        Body::Text(text) => sink.write_all(text.as_bytes()).await,
        Body::Bytes(bytes) => sink.write_all(&bytes).await,
        Body::Html(html) => html.write_to(sink, write_buffer).await,
        Body::Stream(mut stream) => {
            while let Some(chunk) = stream.next().await {
                sink.write_all(&chunk?).await?;
            }
            Ok(())
        }
        Body::Reader(mut reader) => tokio::io::copy(&mut reader, sink).await.map(drop),
    }
}

fn encode_head(version: u8, status: StatusCode, res: &Response) -> BytesMut {
    let mut head = String::with_capacity(128 + res.headers().len() * 64);

    // Writing to a String cannot fail.
    let _ = write!(
        head,
        "HTTP/1.{} {} {}\r\n",
        version.min(1),
        status.as_u16(),
        status.canonical_reason()
    );
    for (name, value) in res.headers().iter() {
        let _ = write!(head, "{name}: {value}\r\n");
    }
    head.push_str("\r\n");

    let mut buf = BytesMut::with_capacity(head.len());
    buf.put(head.as_bytes());
    buf
}

/// Encodes a plain-text response that closes the connection; used for
/// requests that never reach the app.
pub(crate) fn plain_response(status: StatusCode, message: &str) -> BytesMut {
    let mut res = Response::new();
    res.set_status(status);
    res.set_content_type("text/plain; charset=utf-8");
    res.set_content_length(message.len());
    res.set_header("Date", httpdate::fmt_http_date(SystemTime::now()));
    res.set_header("Connection", "close");

    let mut buf = encode_head(1, status, &res);
    buf.put(message.as_bytes());
    buf
}

/// Frames everything written through it as HTTP/1.1 chunks.
///
/// Each write becomes one chunk: `{len:X}\r\n{data}\r\n`. [`finish`] writes
/// the terminating zero-length chunk. The wrapped sink is never shut down.
///
/// [`finish`]: ChunkedWriter::finish
pub struct ChunkedWriter<'w, W: ?Sized> {
    inner: &'w mut W,
    pending: BytesMut,
}

impl<'w, W> ChunkedWriter<'w, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    pub fn new(inner: &'w mut W) -> Self {
        Self {
            inner,
            pending: BytesMut::new(),
        }
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pending.has_remaining() {
            let n = ready!(Pin::new(&mut *self.inner).poll_write(cx, &self.pending))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending.advance(n);
        }
        Poll::Ready(Ok(()))
    }

    /// Writes the last chunk and flushes.
    pub async fn finish(mut self) -> io::Result<()> {
        self.pending.put(&b"0\r\n\r\n"[..]);
        self.flush().await
    }
}

impl<W> AsyncWrite for ChunkedWriter<'_, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        ready!(self.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let frame = &mut self.pending;
        frame.reserve(buf.len() + 12);
        frame.put(format!("{:X}\r\n", buf.len()).as_bytes());
        frame.put(buf);
        frame.put(&b"\r\n"[..]);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain(cx))?;
        Pin::new(&mut *self.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
