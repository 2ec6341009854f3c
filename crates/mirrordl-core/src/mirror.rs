//! Mirror endpoints and their transport class.
//!
//! A mirror is a base URL hosting the same logical repository as its peers.
//! Two predicates drive request policy: onion mirrors get longer connect
//! timeouts, local mirrors are never proxied.

use crate::error::DownloadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// How a mirror is reached; selects the connect-timeout tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportClass {
    Standard,
    /// Routed over an anonymity overlay; connection setup is slow.
    Onion,
}

/// One candidate endpoint for a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    base_url: Url,
    location: Option<String>,
}

impl Mirror {
    /// Parse a mirror base URL. The URL must carry a host.
    pub fn new(base_url: &str) -> Result<Self, DownloadError> {
        let parsed = Url::parse(base_url).map_err(|source| DownloadError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        if parsed.host().is_none() {
            return Err(DownloadError::InvalidUrl {
                url: base_url.to_string(),
                source: url::ParseError::EmptyHost,
            });
        }
        Ok(Self {
            base_url: parsed,
            location: None,
        })
    }

    /// Attach a location hint (usually an ISO country code).
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_onion(&self) -> bool {
        matches!(self.base_url.host(), Some(Host::Domain(d)) if d.trim_end_matches('.').ends_with(".onion"))
    }

    /// Same-host or private-network endpoint; forward proxies must not be used for it.
    pub fn is_local(&self) -> bool {
        match self.base_url.host() {
            Some(Host::Domain(d)) => d.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => is_local_v4(ip),
            Some(Host::Ipv6(ip)) => is_local_v6(ip),
            None => false,
        }
    }

    pub fn transport_class(&self) -> TransportClass {
        if self.is_onion() {
            TransportClass::Onion
        } else {
            TransportClass::Standard
        }
    }

    /// Resolve a repository-relative path against this mirror.
    pub fn url_for(&self, path: &str) -> Result<Url, DownloadError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let relative = path.trim_start_matches('/');
        base.join(relative)
            .map_err(|source| DownloadError::InvalidUrl {
                url: format!("{}{}", base, relative),
                source,
            })
    }
}

fn is_local_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

fn is_local_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_local_v4(v4);
    }
    let first = ip.segments()[0];
    // fc00::/7 unique-local, fe80::/10 link-local
    (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
