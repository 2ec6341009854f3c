//! HTTP HEAD metadata.
//!
//! A HEAD check only reads response headers: `ETag` to decide whether a cached
//! index changed, `Content-Length` and `Last-Modified` for the caller's
//! bookkeeping.

mod parse;

pub(crate) use parse::{parse_headers, ResponseHeaders};

use chrono::{DateTime, Utc};

/// Outcome of a HEAD check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    /// False only when the caller's etag is byte-for-byte the server's etag.
    pub changed: bool,
    pub etag: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl HeadInfo {
    /// Build from parsed headers and the etag the caller saw last time.
    ///
    /// A server that sends no etag is treated as changed.
    pub(crate) fn from_headers(headers: ResponseHeaders, known_etag: Option<&str>) -> Self {
        let changed = match (known_etag, headers.etag.as_deref()) {
            (Some(known), Some(current)) => known.as_bytes() != current.as_bytes(),
            _ => true,
        };
        Self {
            changed,
            etag: headers.etag,
            content_length: headers.content_length,
            last_modified: headers.last_modified,
        }
    }
}
