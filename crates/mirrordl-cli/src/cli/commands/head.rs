//! Head command: print what a HEAD request reports.

use anyhow::Result;
use mirrordl_core::{DownloadRequest, Fetcher, HeadInfo};

pub async fn run_head(fetcher: &Fetcher, request: &DownloadRequest, etag: Option<&str>) -> Result<()> {
    match fetcher.head(request, etag).await {
        Some(info) => print!("{}", describe(&info)),
        None => println!("no information from any mirror"),
    }
    Ok(())
}

fn describe(info: &HeadInfo) -> String {
    let mut out = format!("changed: {}\n", info.changed);
    if let Some(etag) = &info.etag {
        out.push_str(&format!("etag: {}\n", etag));
    }
    if let Some(len) = info.content_length {
        out.push_str(&format!("content-length: {}\n", len));
    }
    if let Some(lm) = info.last_modified {
        out.push_str(&format!("last-modified: {}\n", lm.to_rfc2822()));
    }
    out
}
