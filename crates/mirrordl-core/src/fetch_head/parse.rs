//! Parse HTTP response header lines collected by libcurl.

use chrono::{DateTime, Utc};

/// Headers of the final response that the fetcher cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

/// Status code from an `HTTP/x.y NNN reason` line.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Parse collected header lines.
///
/// A proxy `CONNECT` or `100 Continue` produces extra header blocks; every
/// status line starts a new block so only the last response is reported.
pub(crate) fn parse_headers(lines: &[String]) -> ResponseHeaders {
    let mut out = ResponseHeaders::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = parse_status_line(line) {
            out = ResponseHeaders {
                status: Some(code),
                ..ResponseHeaders::default()
            };
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                out.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("etag") {
                out.etag = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("last-modified") {
                out.last_modified = DateTime::parse_from_rfc2822(value)
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
            } else if name.eq_ignore_ascii_case("location") {
                out.location = Some(value.to_string());
            }
        }
    }

    out
}
