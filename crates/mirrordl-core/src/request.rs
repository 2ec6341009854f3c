//! The caller's description of one download: where, what, and how to authenticate.

use crate::error::DownloadError;
use crate::mirror::Mirror;
use crate::proxy::ProxyConfig;
use base64::{engine::general_purpose, Engine as _};

/// A resource to fetch from any of several equivalent mirrors.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    mirrors: Vec<Mirror>,
    path: String,
    username: Option<String>,
    password: Option<String>,
    proxy: Option<ProxyConfig>,
    try_first_mirror: Option<Mirror>,
}

impl DownloadRequest {
    /// Build a request for `path`. Fails when `mirrors` is empty.
    pub fn new(mirrors: Vec<Mirror>, path: impl Into<String>) -> Result<Self, DownloadError> {
        if mirrors.is_empty() {
            return Err(DownloadError::NoMirrors);
        }
        Ok(Self {
            mirrors,
            path: path.into(),
            username: None,
            password: None,
            proxy: None,
            try_first_mirror: None,
        })
    }

    pub fn with_credentials(
        mut self,
        username: Option<impl Into<String>>,
        password: Option<impl Into<String>>,
    ) -> Self {
        self.username = username.map(Into::into);
        self.password = password.map(Into::into);
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Hint for the chooser: try this mirror before the others.
    pub fn with_try_first_mirror(mut self, mirror: Mirror) -> Self {
        self.try_first_mirror = Some(mirror);
        self
    }

    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn try_first_mirror(&self) -> Option<&Mirror> {
        self.try_first_mirror.as_ref()
    }

    /// `Authorization` header value, only when both username and password are set.
    pub fn basic_auth_header(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                let token = general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
                Some(format!("Basic {}", token))
            }
            _ => None,
        }
    }
}
