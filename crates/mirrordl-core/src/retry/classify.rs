//! Map a failed mirror attempt to a retry `ErrorKind`.

use crate::error::DownloadError;
use crate::retry::policy::ErrorKind;

/// Classify a download error for the chooser's round-retry decision.
///
/// Conditions the caller must handle (no resume, sink failure, abort) and
/// redirects are never retryable. An aggregate is judged by its last attempt.
pub fn classify(e: &DownloadError) -> ErrorKind {
    match e {
        DownloadError::Curl(ce) if ce.is_operation_timedout() => ErrorKind::Timeout,
        DownloadError::Curl(ce) if lost_connection(ce) => ErrorKind::Connection,
        DownloadError::Http { status: 429 | 503 } => ErrorKind::Throttled,
        DownloadError::Http {
            status: status @ 500..=599,
        } => ErrorKind::Http5xx(*status as u16),
        DownloadError::AllMirrorsFailed { failures } => failures
            .last()
            .map(|f| classify(&f.error))
            .unwrap_or(ErrorKind::Other),
        _ => ErrorKind::Other,
    }
}

/// The mirror could not be reached or dropped the transfer midway.
fn lost_connection(e: &curl::Error) -> bool {
    [
        e.is_couldnt_connect(),
        e.is_couldnt_resolve_host(),
        e.is_couldnt_resolve_proxy(),
        e.is_read_error(),
        e.is_recv_error(),
        e.is_send_error(),
        e.is_got_nothing(),
        e.is_partial_file(),
    ]
    .contains(&true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u32) -> ErrorKind {
        classify(&DownloadError::Http { status })
    }

    fn curl(code: u32) -> ErrorKind {
        classify(&DownloadError::Curl(curl::Error::new(code)))
    }

    #[test]
    fn overloaded_mirrors_are_throttled() {
        assert_eq!(http(429), ErrorKind::Throttled);
        assert_eq!(http(503), ErrorKind::Throttled);
    }

    #[test]
    fn server_errors_are_retryable() {
        assert_eq!(http(500), ErrorKind::Http5xx(500));
        assert_eq!(http(502), ErrorKind::Http5xx(502));
        assert!(http(504).is_retryable());
    }

    #[test]
    fn client_errors_are_final() {
        assert_eq!(http(404), ErrorKind::Other);
        assert_eq!(http(403), ErrorKind::Other);
        assert_eq!(http(416), ErrorKind::Other);
    }

    #[test]
    fn caller_conditions_are_not_retryable() {
        assert_eq!(
            classify(&DownloadError::NoResume { status: 200 }),
            ErrorKind::Other
        );
        assert_eq!(classify(&DownloadError::Aborted), ErrorKind::Other);
        assert_eq!(
            classify(&DownloadError::Redirect {
                status: 301,
                location: None
            }),
            ErrorKind::Other
        );
    }

    #[test]
    fn curl_timeout_connect_and_truncation() {
        // CURLE_OPERATION_TIMEDOUT = 28, CURLE_COULDNT_CONNECT = 7, CURLE_PARTIAL_FILE = 18
        assert_eq!(curl(28), ErrorKind::Timeout);
        assert_eq!(curl(7), ErrorKind::Connection);
        assert_eq!(curl(18), ErrorKind::Connection);
        // CURLE_SSL_CACERT_BADFILE = 77
        assert_eq!(curl(77), ErrorKind::Other);
    }

    #[test]
    fn aggregate_follows_last_attempt() {
        use crate::error::MirrorFailure;
        let err = DownloadError::AllMirrorsFailed {
            failures: vec![
                MirrorFailure {
                    url: "https://a.example/x".into(),
                    error: DownloadError::Http { status: 404 },
                },
                MirrorFailure {
                    url: "https://b.example/x".into(),
                    error: DownloadError::Http { status: 503 },
                },
            ],
        };
        assert_eq!(classify(&err), ErrorKind::Throttled);
    }
}
