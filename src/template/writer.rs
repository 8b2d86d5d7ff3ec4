//! Streaming a template into an async sink.

use std::io;

use bytes::BytesMut;
use futures::future::BoxFuture;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{Chunk, Chunks, Html};

/// Writes `html` into `sink` chunk by chunk without building the whole
/// document in memory.
///
/// - Text accumulates in a buffer and is written (and the sink flushed) once
///   at least `threshold` bytes are pending. A threshold of `0` writes every
///   chunk as it is produced.
/// - Before waiting on a pending value, everything buffered so far is written
///   and flushed, so the client sees the document up to the stall.
/// - Pending values are awaited strictly in document order.
/// - Backpressure comes from the sink: writes suspend until it is ready
///   again, and no buffered byte is lost or repeated.
///
/// The sink is flushed but never shut down; ending the stream is the caller's
/// job. A failed write stops the traversal and is returned as is.
pub async fn write_html<W>(html: &Html, sink: &mut W, threshold: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut out = Buffered {
        sink,
        buf: BytesMut::with_capacity(threshold.max(64)),
        threshold,
    };
    write_chunks(&mut out, html.chunks()).await?;
    out.flush().await
}

struct Buffered<'s, W: ?Sized> {
    sink: &'s mut W,
    buf: BytesMut,
    threshold: usize,
}

impl<W> Buffered<'_, W>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    async fn push(&mut self, text: &str) -> io::Result<()> {
        self.buf.extend_from_slice(text.as_bytes());
        if self.buf.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let pending = self.buf.split();
            self.sink.write_all(&pending).await?;
        }
        self.sink.flush().await
    }
}

// Resolved pending values are owned by the awaiting frame, so nesting through
// them recurses; plain nesting is flattened by `Chunks` itself.
fn write_chunks<'a, 's, W>(
    out: &'a mut Buffered<'s, W>,
    chunks: Chunks<'a>,
) -> BoxFuture<'a, io::Result<()>>
where
    W: AsyncWrite + Unpin + Send + ?Sized + 'a,
    's: 'a,
{
    Box::pin(async move {
        for chunk in chunks {
            match chunk {
                Chunk::Text(text) => out.push(&text).await?,
                Chunk::Pending { pending, indent } => {
                    out.flush().await?;
                    let value = pending.resolve().await;
                    write_chunks(&mut *out, value.chunks_at(indent)).await?;
                }
            }
        }
        Ok(())
    })
}
