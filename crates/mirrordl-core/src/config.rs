use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mirror::TransportClass;
use crate::proxy::ProxyConfig;

/// Default ceiling for one chunk handed to a sink.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Retry policy parameters for the mirror chooser (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of rounds over all mirrors (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Connect timeouts for one transport class, per operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectTimeouts {
    pub head_secs: u64,
    pub get_secs: u64,
    /// Only the standard tier's value is used: POST targets a fixed URL, never a mirror.
    #[serde(default = "default_post_secs")]
    pub post_secs: u64,
}

fn default_post_secs() -> u64 {
    5
}

impl ConnectTimeouts {
    pub fn head(&self) -> Duration {
        Duration::from_secs(self.head_secs)
    }

    pub fn get(&self) -> Duration {
        Duration::from_secs(self.get_secs)
    }

    pub fn post(&self) -> Duration {
        Duration::from_secs(self.post_secs)
    }
}

/// Connect-timeout tiers keyed by transport class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutTiers {
    pub standard: ConnectTimeouts,
    pub onion: ConnectTimeouts,
}

impl Default for TimeoutTiers {
    fn default() -> Self {
        Self {
            standard: ConnectTimeouts {
                head_secs: 5,
                get_secs: 5,
                post_secs: default_post_secs(),
            },
            onion: ConnectTimeouts {
                head_secs: 10,
                get_secs: 20,
                post_secs: 20,
            },
        }
    }
}

impl TimeoutTiers {
    pub fn for_class(&self, class: TransportClass) -> &ConnectTimeouts {
        match class {
            TransportClass::Standard => &self.standard,
            TransportClass::Onion => &self.onion,
        }
    }
}

/// Global configuration loaded from `~/.config/mirrordl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrordlConfig {
    /// User-Agent sent with every request (None = `mirrordl/<version>`).
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Default forward proxy for requests that do not name one.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// Largest chunk handed to a sink, in bytes.
    pub chunk_size: usize,
    /// Chunks buffered between the transfer thread and the caller.
    pub channel_depth: usize,
    #[serde(default)]
    pub connect_timeouts: TimeoutTiers,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for MirrordlConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            proxy: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            channel_depth: 4,
            connect_timeouts: TimeoutTiers::default(),
            retry: None,
        }
    }
}

impl MirrordlConfig {
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| concat!("mirrordl/", env!("CARGO_PKG_VERSION")).to_string())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mirrordl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MirrordlConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<MirrordlConfig> {
    if !path.exists() {
        let default_cfg = MirrordlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: MirrordlConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyKind;

    #[test]
    fn default_config_values() {
        let cfg = MirrordlConfig::default();
        assert_eq!(cfg.chunk_size, 8192);
        assert_eq!(cfg.channel_depth, 4);
        assert!(cfg.proxy.is_none());
        assert_eq!(cfg.connect_timeouts.onion.head(), Duration::from_secs(10));
        assert_eq!(cfg.connect_timeouts.onion.get(), Duration::from_secs(20));
        assert!(cfg.user_agent().starts_with("mirrordl/"));
    }

    #[test]
    fn tiers_follow_transport_class() {
        let tiers = TimeoutTiers::default();
        assert_eq!(tiers.for_class(TransportClass::Onion).get_secs, 20);
        assert_eq!(tiers.for_class(TransportClass::Standard).head_secs, 5);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = MirrordlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MirrordlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.chunk_size, cfg.chunk_size);
        assert_eq!(parsed.connect_timeouts, cfg.connect_timeouts);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            user_agent = "F-Droid 1.20"
            chunk_size = 4096
            channel_depth = 2

            [proxy]
            kind = "socks5"
            host = "127.0.0.1"
            port = 9050

            [connect_timeouts.standard]
            head_secs = 3
            get_secs = 4

            [connect_timeouts.onion]
            head_secs = 30
            get_secs = 60

            [retry]
            max_attempts = 2
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: MirrordlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.user_agent(), "F-Droid 1.20");
        assert_eq!(cfg.chunk_size, 4096);
        let proxy = cfg.proxy.as_ref().unwrap();
        assert_eq!(proxy.kind, ProxyKind::Socks5);
        assert_eq!(proxy.port, 9050);
        assert_eq!(cfg.connect_timeouts.standard.get_secs, 4);
        assert_eq!(cfg.connect_timeouts.onion.get_secs, 60);
        assert_eq!(cfg.connect_timeouts.standard.post(), Duration::from_secs(5));
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 2);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_timeouts_use_defaults() {
        let cfg: MirrordlConfig = toml::from_str("chunk_size = 1024\nchannel_depth = 1\n").unwrap();
        assert_eq!(cfg.connect_timeouts, TimeoutTiers::default());
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        let again = load_or_init_at(&path).unwrap();
        assert_eq!(again.channel_depth, cfg.channel_depth);
    }
}
