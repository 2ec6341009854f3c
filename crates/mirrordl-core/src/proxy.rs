//! Forward-proxy configuration and the per-mirror override policy.

use crate::error::DownloadError;
use crate::mirror::Mirror;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    /// SOCKS5 with proxy-side name resolution (required for `.onion` hosts).
    Socks5,
}

/// A forward proxy requested by the caller (e.g. a local Tor SOCKS port).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ProxyKind::Http,
            host: host.into(),
            port,
        }
    }

    pub fn socks5(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ProxyKind::Socks5,
            host: host.into(),
            port,
        }
    }

    /// Proxy string in the form libcurl expects.
    pub fn curl_url(&self) -> String {
        let scheme = match self.kind {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5h",
        };
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.curl_url())
    }
}

impl FromStr for ProxyConfig {
    type Err = DownloadError;

    /// Accepts `http://host:port`, `socks5://host:port` and `socks5h://host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |source| DownloadError::InvalidUrl {
            url: s.to_string(),
            source,
        };
        let parsed = url::Url::parse(s).map_err(invalid)?;
        let kind = match parsed.scheme() {
            "http" => ProxyKind::Http,
            "socks5" | "socks5h" => ProxyKind::Socks5,
            _ => return Err(invalid(url::ParseError::InvalidDomainCharacter)),
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid(url::ParseError::EmptyHost))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed
            .port_or_known_default()
            .or(match kind {
                ProxyKind::Socks5 => Some(1080),
                ProxyKind::Http => None,
            })
            .ok_or_else(|| invalid(url::ParseError::InvalidPort))?;
        Ok(Self { kind, host, port })
    }
}

/// Proxy actually applied to an attempt.
///
/// Local mirrors are never sent through a configured proxy; everything else
/// (including a missing mirror, as for POST) uses the configured proxy as-is.
pub fn effective_proxy(configured: Option<&ProxyConfig>, mirror: Option<&Mirror>) -> Option<ProxyConfig> {
    match (configured, mirror) {
        (Some(_), Some(m)) if m.is_local() => None,
        (configured, _) => configured.cloned(),
    }
}
