//! Mirror choosers: which mirror to try, in what order, and when to give up.
//!
//! The fetcher knows nothing about ordering or retries; it hands the chooser
//! a request and an attempt function and gets back the first success or an
//! aggregated failure.

use std::future::Future;

use url::Url;

use crate::error::{DownloadError, MirrorFailure};
use crate::mirror::Mirror;
use crate::request::DownloadRequest;
use crate::retry::{classify, ErrorKind, RetryDecision, RetryPolicy};

pub trait MirrorChooser: Send + Sync {
    /// Run `attempt(mirror, resolved_url)` against candidates until one succeeds.
    fn mirror_request<T, F, Fut>(
        &self,
        request: &DownloadRequest,
        attempt: F,
    ) -> impl Future<Output = Result<T, DownloadError>> + Send
    where
        T: Send,
        F: FnMut(Mirror, Url) -> Fut + Send,
        Fut: Future<Output = Result<T, DownloadError>> + Send;
}

/// Tries mirrors in request order, repeating whole rounds with backoff while
/// every failure looks transient.
///
/// Onion mirrors are skipped when the request carries no proxy, since they
/// cannot be reached without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialMirrorChooser {
    policy: RetryPolicy,
}

impl SequentialMirrorChooser {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Mirrors this chooser will try for `request`, in order.
    pub fn candidates(&self, request: &DownloadRequest) -> Vec<Mirror> {
        let mut mirrors: Vec<Mirror> = request
            .mirrors()
            .iter()
            .filter(|m| request.proxy().is_some() || !m.is_onion())
            .cloned()
            .collect();
        if let Some(first) = request.try_first_mirror() {
            if let Some(pos) = mirrors.iter().position(|m| m.base_url() == first.base_url()) {
                let preferred = mirrors.remove(pos);
                mirrors.insert(0, preferred);
            }
        }
        mirrors
    }
}

impl MirrorChooser for SequentialMirrorChooser {
    fn mirror_request<T, F, Fut>(
        &self,
        request: &DownloadRequest,
        mut attempt: F,
    ) -> impl Future<Output = Result<T, DownloadError>> + Send
    where
        T: Send,
        F: FnMut(Mirror, Url) -> Fut + Send,
        Fut: Future<Output = Result<T, DownloadError>> + Send,
    {
        async move {
            let candidates = self.candidates(request);
            if candidates.is_empty() {
                return Err(DownloadError::NoUsableMirrors);
            }

            let mut failures: Vec<MirrorFailure> = Vec::new();
            let mut round = 1u32;
            loop {
                let mut all_transient = true;
                for mirror in &candidates {
                    let url = match mirror.url_for(request.path()) {
                        Ok(u) => u,
                        Err(error) => {
                            all_transient = false;
                            failures.push(MirrorFailure {
                                url: format!("{}{}", mirror, request.path()),
                                error,
                            });
                            continue;
                        }
                    };
                    let shown = url.to_string();
                    match attempt(mirror.clone(), url).await {
                        Ok(value) => return Ok(value),
                        Err(e) if e.ends_fan_out() => return Err(e),
                        Err(e) => {
                            tracing::warn!("mirror attempt {} failed: {}", shown, e);
                            all_transient &= classify(&e).is_retryable();
                            failures.push(MirrorFailure { url: shown, error: e });
                        }
                    }
                }

                let kind = match failures.last() {
                    Some(last) if all_transient => classify(&last.error),
                    _ => ErrorKind::Other,
                };
                match self.policy.decide(round, kind) {
                    RetryDecision::NoRetry => {
                        return Err(DownloadError::AllMirrorsFailed { failures });
                    }
                    RetryDecision::RetryAfter(delay) => {
                        tracing::debug!(
                            "round {} over {} mirrors failed, retrying in {:?}",
                            round,
                            candidates.len(),
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        round += 1;
                    }
                }
            }
        }
    }
}
