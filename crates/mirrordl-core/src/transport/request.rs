//! Per-request options, re-applied on every use of the shared handle.

use curl::easy::{Easy, List};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Method {
    Head,
    Get,
    Post(Vec<u8>),
}

#[derive(Debug, Clone)]
pub(crate) struct RequestSpec {
    pub method: Method,
    pub url: String,
    /// Complete header lines, e.g. `Range: bytes=100-`.
    pub headers: Vec<String>,
    pub connect_timeout: Duration,
    /// A `Range` header is present; only `206` is acceptable.
    pub range_requested: bool,
}

impl RequestSpec {
    pub(crate) fn new(method: Method, url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            connect_timeout,
            range_requested: false,
        }
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(format!("{}: {}", name, value));
        self
    }

    pub(crate) fn authorization(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.header("Authorization", v),
            None => self,
        }
    }

    /// Ask for everything from `offset` on.
    pub(crate) fn range_from(mut self, offset: Option<u64>) -> Self {
        if let Some(off) = offset {
            self = self.header("Range", &format!("bytes={}-", off));
            self.range_requested = true;
        }
        self
    }

    /// Apply to the handle. Every option a previous request may have set is overwritten.
    pub(crate) fn apply(&self, easy: &mut Easy) -> Result<(), curl::Error> {
        easy.url(&self.url)?;
        match &self.method {
            Method::Head => {
                easy.get(true)?;
                easy.nobody(true)?;
            }
            Method::Get => {
                easy.nobody(false)?;
                easy.get(true)?;
            }
            Method::Post(body) => {
                easy.nobody(false)?;
                easy.post(true)?;
                easy.post_fields_copy(body)?;
            }
        }
        easy.connect_timeout(self.connect_timeout)?;

        let mut list = List::new();
        for line in &self.headers {
            list.append(line)?;
        }
        // Always set, possibly empty, so headers never leak into the next request.
        easy.http_headers(list)?;
        Ok(())
    }
}
