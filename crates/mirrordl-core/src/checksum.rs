//! SHA-256 of downloaded data, either of a file on disk or computed while
//! the body streams through a sink.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::io::AsyncWrite;

const BUF_SIZE: usize = 64 * 1024;

fn hash_reader(hasher: &mut Sha256, path: &Path) -> Result<u64> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = vec![0u8; BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok(total)
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hash_reader(&mut hasher, path)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Writer adapter that hashes every byte the inner writer accepts.
///
/// Being an `AsyncWrite`, it can be handed to `Fetcher::get` as the sink.
pub struct HashingSink<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W> HashingSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Feed the existing contents of `path` first; used when appending to a
    /// partial download so the final digest covers the whole file.
    pub fn seed_from_path(&mut self, path: &Path) -> Result<u64> {
        let n = hash_reader(&mut self.hasher, path)?;
        self.written += n;
        Ok(n)
    }

    /// Bytes hashed so far, seed included.
    pub fn bytes_hashed(&self) -> u64 {
        self.written
    }

    /// Lowercase hex digest of everything hashed so far.
    pub fn hex_digest(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for HashingSink<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.hasher.update(&buf[..n]);
                this.written += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
