//! Post command: send a JSON document as-is.

use anyhow::Result;
use mirrordl_core::{Fetcher, ProxyConfig};

pub async fn run_post(fetcher: &Fetcher, url: &str, json: &str, proxy: Option<&ProxyConfig>) -> Result<()> {
    fetcher.post(url, json, proxy).await?;
    tracing::info!("posted {} bytes to {}", json.len(), url);
    Ok(())
}
