//! The shared libcurl easy handle and the proxy it was built with.
//!
//! One easy handle owns libcurl's connection cache, so it is kept across
//! requests and only rebuilt when the effective proxy changes. All transfers
//! are blocking; callers run them on the tokio blocking pool.

mod request;
mod transfer;

pub(crate) use request::{Method, RequestSpec};

use crate::proxy::ProxyConfig;
use curl::easy::Easy;

/// Live easy handle plus the proxy it was constructed with.
pub(crate) struct TransportClient {
    easy: Easy,
    proxy: Option<ProxyConfig>,
    user_agent: String,
}

impl TransportClient {
    pub(crate) fn new(proxy: Option<ProxyConfig>, user_agent: &str) -> Result<Self, curl::Error> {
        let easy = build_easy(proxy.as_ref(), user_agent)?;
        Ok(Self {
            easy,
            proxy,
            user_agent: user_agent.to_string(),
        })
    }

    pub(crate) fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Rebuild the handle when `proxy` differs from the recorded one.
    /// Returns whether a rebuild happened.
    pub(crate) fn sync_proxy(&mut self, proxy: Option<ProxyConfig>) -> Result<bool, curl::Error> {
        if self.proxy == proxy {
            return Ok(false);
        }
        // Build first so a failed setopt leaves the old (handle, proxy) pair intact.
        let easy = build_easy(proxy.as_ref(), &self.user_agent)?;
        tracing::info!(
            "transport client rebuilt: proxy {} -> {}",
            describe(self.proxy.as_ref()),
            describe(proxy.as_ref())
        );
        self.easy = easy;
        self.proxy = proxy;
        Ok(true)
    }
}

fn describe(proxy: Option<&ProxyConfig>) -> String {
    proxy
        .map(ProxyConfig::curl_url)
        .unwrap_or_else(|| "none".to_string())
}

/// Options fixed for the lifetime of a handle.
fn build_easy(proxy: Option<&ProxyConfig>, user_agent: &str) -> Result<Easy, curl::Error> {
    let mut easy = Easy::new();
    // Redirects are surfaced; a followed redirect could drop the Range header.
    easy.follow_location(false)?;
    easy.fail_on_error(true)?;
    easy.useragent(user_agent)?;
    // The progress callback polls the per-attempt abort flag.
    easy.progress(true)?;
    match proxy {
        Some(p) => easy.proxy(&p.curl_url())?,
        // Empty string disables proxying, including http_proxy & co from the environment.
        None => easy.proxy("")?,
    }
    Ok(easy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_proxy_rebuilds_only_on_change() {
        let tor = ProxyConfig::socks5("127.0.0.1", 9050);
        let mut client = TransportClient::new(None, "test-agent").unwrap();
        assert!(client.proxy().is_none());

        assert!(!client.sync_proxy(None).unwrap());
        assert!(client.sync_proxy(Some(tor.clone())).unwrap());
        assert_eq!(client.proxy(), Some(&tor));
        assert!(!client.sync_proxy(Some(tor.clone())).unwrap());
        assert!(!client.sync_proxy(Some(tor)).unwrap());
        assert!(client.sync_proxy(None).unwrap());
        assert!(client.proxy().is_none());
    }
}
