//! Consumers of a streamed response body.

use std::future::Future;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Receives body chunks in transport order.
///
/// Any `AsyncWrite` (a `tokio::fs::File`, a `Vec<u8>`) is a sink.
pub trait ChunkSink: Send {
    fn receive(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

impl<W> ChunkSink for W
where
    W: AsyncWrite + Unpin + Send,
{
    fn receive(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        async move { self.write_all(chunk).await }
    }
}
