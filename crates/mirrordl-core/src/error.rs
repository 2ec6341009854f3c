//! Error type shared by the fetcher, the transport and mirror choosers.

use std::fmt;
use std::io;
use thiserror::Error;

/// One failed attempt recorded by a chooser before it gave up.
#[derive(Debug)]
pub struct MirrorFailure {
    /// Resolved URL of the attempt.
    pub url: String,
    pub error: DownloadError,
}

impl fmt::Display for MirrorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download request has no mirrors")]
    NoMirrors,

    /// Every mirror was filtered out before any attempt (e.g. only onion
    /// mirrors and no proxy to reach them).
    #[error("no usable mirror for this request")]
    NoUsableMirrors,

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Network-level fault reported by libcurl (DNS, connect, TLS, reset, timeout).
    #[error("transfer failed: {0}")]
    Curl(#[from] curl::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}")]
    Http { status: u32 },

    /// Server answered with a redirect; redirects are never followed.
    #[error("HTTP {status} redirect to {}", .location.as_deref().unwrap_or("<none>"))]
    Redirect {
        status: u32,
        location: Option<String>,
    },

    /// A resume offset was requested but the server did not answer
    /// `206 Partial Content`. The caller must discard held bytes and restart at zero.
    #[error("server did not honor the range request (HTTP {status})")]
    NoResume { status: u32 },

    #[error("serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The chunk sink refused a chunk.
    #[error("sink: {0}")]
    Sink(#[source] io::Error),

    /// The receiving side went away mid-transfer.
    #[error("transfer aborted")]
    Aborted,

    /// The blocking transfer task panicked or was cancelled by the runtime.
    #[error("transfer worker failed: {0}")]
    Worker(String),

    #[error("all mirrors failed ({} attempts), last: {}", .failures.len(), last_failure(.failures))]
    AllMirrorsFailed { failures: Vec<MirrorFailure> },
}

fn last_failure(failures: &[MirrorFailure]) -> String {
    failures
        .last()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl DownloadError {
    /// True for the resume-not-honored condition, also when it ended a chooser run.
    pub fn is_no_resume(&self) -> bool {
        match self {
            DownloadError::NoResume { .. } => true,
            DownloadError::AllMirrorsFailed { failures } => {
                failures.iter().any(|f| f.error.is_no_resume())
            }
            _ => false,
        }
    }

    /// Errors after which trying another mirror cannot help: the caller has to act.
    pub fn ends_fan_out(&self) -> bool {
        matches!(
            self,
            DownloadError::NoResume { .. }
                | DownloadError::Sink(_)
                | DownloadError::Aborted
                | DownloadError::Worker(_)
        )
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u32> {
        match self {
            DownloadError::Http { status }
            | DownloadError::Redirect { status, .. }
            | DownloadError::NoResume { status } => Some(*status),
            _ => None,
        }
    }
}
