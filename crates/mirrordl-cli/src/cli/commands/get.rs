//! Get command: stream a resource into a file, optionally resuming and
//! verifying its SHA-256.

use anyhow::{bail, Context, Result};
use mirrordl_core::checksum::HashingSink;
use mirrordl_core::{DownloadRequest, Fetcher};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

pub async fn run_get(
    fetcher: &Fetcher,
    request: &DownloadRequest,
    output: &Path,
    resume: bool,
    sha256: Option<&str>,
) -> Result<()> {
    let offset = if resume { existing_len(output).await } else { None };

    let mut sink = open_sink(output, offset).await?;
    let outcome = fetcher.get(request, offset, &mut sink).await;
    let mut sink = match outcome {
        Ok(()) => sink,
        Err(e) if offset.is_some() && e.is_no_resume() => {
            tracing::warn!(
                "{}: server cannot resume, restarting from zero ({})",
                output.display(),
                e
            );
            drop(sink);
            let mut fresh = open_sink(output, None).await?;
            fetcher.get(request, None, &mut fresh).await?;
            fresh
        }
        Err(e) => return Err(e.into()),
    };
    sink.flush().await?;

    let digest = sink.hex_digest();
    tracing::info!(
        "{}: {} bytes, sha256 {}",
        output.display(),
        sink.bytes_hashed(),
        digest
    );
    if let Some(expected) = sha256 {
        if !digest.eq_ignore_ascii_case(expected.trim()) {
            bail!(
                "checksum mismatch for {}: expected {}, got {}",
                output.display(),
                expected,
                digest
            );
        }
    }
    println!("{}  {}", digest, output.display());
    Ok(())
}

/// Length of a non-empty existing file.
async fn existing_len(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Append to the partial file (hash seeded with its contents) or start a new one.
async fn open_sink(path: &Path, offset: Option<u64>) -> Result<HashingSink<File>> {
    match offset {
        Some(_) => {
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("open {}", path.display()))?;
            let mut sink = HashingSink::new(file);
            sink.seed_from_path(path)?;
            Ok(sink)
        }
        None => {
            let file = File::create(path)
                .await
                .with_context(|| format!("create {}", path.display()))?;
            Ok(HashingSink::new(file))
        }
    }
}
