//! Blocking transfers on the shared handle: HEAD, streamed GET, POST.

use std::cell::{Cell, RefCell};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::{RequestSpec, TransportClient};
use crate::error::DownloadError;
use crate::fetch_head::{parse_headers, ResponseHeaders};

impl TransportClient {
    /// Metadata-only request. Returns the final response's headers.
    pub(crate) fn head(
        &mut self,
        spec: &RequestSpec,
        abort: &AtomicBool,
    ) -> Result<ResponseHeaders, DownloadError> {
        spec.apply(&mut self.easy)?;
        let mut lines: Vec<String> = Vec::new();
        let performed = {
            let mut transfer = self.easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))?;
            transfer.perform()
        };
        let headers = parse_headers(&lines);
        self.finish(performed, &headers, spec.range_requested)?;
        Ok(headers)
    }

    /// POST the prepared body; the response body is read and dropped.
    pub(crate) fn post(
        &mut self,
        spec: &RequestSpec,
        abort: &AtomicBool,
    ) -> Result<u32, DownloadError> {
        spec.apply(&mut self.easy)?;
        let mut lines: Vec<String> = Vec::new();
        let performed = {
            let mut transfer = self.easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|data| Ok(data.len()))?;
            transfer.progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))?;
            transfer.perform()
        };
        let headers = parse_headers(&lines);
        self.finish(performed, &headers, false)
    }

    /// GET and push the body into `tx` in pieces of at most `chunk_size` bytes.
    ///
    /// The status is checked before the first byte is forwarded, so a rejected
    /// response (non-2xx, redirect, or non-206 for a range request) sends nothing.
    /// Blocks on `tx` when the receiver lags; a dropped receiver or a raised
    /// `abort` flag ends the transfer.
    pub(crate) fn stream(
        &mut self,
        spec: &RequestSpec,
        chunk_size: usize,
        tx: &mpsc::Sender<Vec<u8>>,
        abort: &AtomicBool,
    ) -> Result<u32, DownloadError> {
        spec.apply(&mut self.easy)?;
        let chunk_size = chunk_size.max(1);
        let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let accepted = Cell::new(false);
        let rejected: Cell<Option<DownloadError>> = Cell::new(None);
        let receiver_gone = Cell::new(false);

        let performed = {
            let mut transfer = self.easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.borrow_mut().push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                if !accepted.get() {
                    let headers = parse_headers(&lines.borrow());
                    let status = headers.status.unwrap_or(0);
                    if let Err(e) = check_status(status, headers.location, spec.range_requested) {
                        rejected.set(Some(e));
                        return Ok(0);
                    }
                    accepted.set(true);
                }
                for piece in data.chunks(chunk_size) {
                    if tx.blocking_send(piece.to_vec()).is_err() {
                        receiver_gone.set(true);
                        return Ok(0);
                    }
                }
                Ok(data.len())
            })?;
            // Polled about once a second even while the server sends nothing.
            transfer.progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))?;
            transfer.perform()
        };

        if let Some(e) = rejected.take() {
            return Err(e);
        }
        if receiver_gone.get() {
            return Err(DownloadError::Aborted);
        }
        let headers = parse_headers(&lines.into_inner());
        self.finish(performed, &headers, spec.range_requested)
    }

    /// Turn the perform result and final status into the request outcome.
    fn finish(
        &mut self,
        performed: Result<(), curl::Error>,
        headers: &ResponseHeaders,
        range_requested: bool,
    ) -> Result<u32, DownloadError> {
        if let Err(e) = performed {
            if e.is_aborted_by_callback() {
                return Err(DownloadError::Aborted);
            }
            // fail_on_error: the status is still readable and says more than code 22.
            if !e.is_http_returned_error() {
                return Err(DownloadError::Curl(e));
            }
        }
        let status = self.easy.response_code()?;
        check_status(status, headers.location.clone(), range_requested)?;
        Ok(status)
    }
}

/// Accept 2xx (only 206 when a range was requested); surface everything else.
pub(crate) fn check_status(
    status: u32,
    location: Option<String>,
    range_requested: bool,
) -> Result<(), DownloadError> {
    match status {
        200..=299 if range_requested && status != 206 => Err(DownloadError::NoResume { status }),
        200..=299 => Ok(()),
        300..=399 => Err(DownloadError::Redirect { status, location }),
        _ => Err(DownloadError::Http { status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_get_accepts_2xx() {
        assert!(check_status(200, None, false).is_ok());
        assert!(check_status(204, None, false).is_ok());
    }

    #[test]
    fn range_request_needs_206() {
        assert!(check_status(206, None, true).is_ok());
        assert!(matches!(
            check_status(200, None, true),
            Err(DownloadError::NoResume { status: 200 })
        ));
    }

    #[test]
    fn redirects_and_errors_surface() {
        match check_status(302, Some("https://x.example/".into()), true) {
            Err(DownloadError::Redirect { status, location }) => {
                assert_eq!(status, 302);
                assert_eq!(location.as_deref(), Some("https://x.example/"));
            }
            other => panic!("expected redirect, got {:?}", other),
        }
        assert!(matches!(
            check_status(416, None, true),
            Err(DownloadError::Http { status: 416 })
        ));
        assert!(matches!(
            check_status(404, None, false),
            Err(DownloadError::Http { status: 404 })
        ));
    }
}
