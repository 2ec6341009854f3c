//! CLI for the mirrordl download client.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mirrordl_core::config::{self, MirrordlConfig};
use mirrordl_core::{DownloadRequest, Fetcher, Mirror, ProxyConfig};
use std::path::PathBuf;

use commands::{run_get, run_head, run_post};

/// Top-level CLI for mirrordl.
#[derive(Debug, Parser)]
#[command(name = "mirrordl")]
#[command(about = "mirrordl: resumable downloads from a set of mirrors", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Mirror base URL; repeat to list several, tried in order.
    #[arg(long = "mirror", value_name = "URL", global = true)]
    pub mirrors: Vec<String>,

    /// Forward proxy (http://host:port or socks5://host:port). Overrides config.toml.
    #[arg(long, value_name = "URL", global = true)]
    pub proxy: Option<ProxyConfig>,

    /// Basic auth user name.
    #[arg(long, global = true, requires = "password")]
    pub user: Option<String>,

    /// Basic auth password.
    #[arg(long, global = true, requires = "user")]
    pub password: Option<String>,

    /// Use this config file instead of the XDG default.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Probe a resource's metadata without downloading it.
    Head {
        /// Path relative to each mirror base URL.
        path: String,

        /// ETag from a previous check; reports whether the resource changed.
        #[arg(long)]
        etag: Option<String>,
    },

    /// Download a resource to a file.
    Get {
        /// Path relative to each mirror base URL.
        path: String,

        /// Output file.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Continue from the current length of the output file.
        #[arg(long)]
        resume: bool,

        /// Expected SHA-256 (hex) of the complete file.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// POST a JSON document to a URL.
    Post {
        url: String,

        /// JSON body, sent as-is.
        json: String,
    },
}

impl GlobalArgs {
    fn load_config(&self) -> Result<MirrordlConfig> {
        match &self.config {
            Some(path) => config::load_or_init_at(path),
            None => config::load_or_init(),
        }
    }

    /// Command-line proxy, else the configured one.
    fn proxy(&self, cfg: &MirrordlConfig) -> Option<ProxyConfig> {
        self.proxy.clone().or_else(|| cfg.proxy.clone())
    }

    fn request(&self, path: &str, cfg: &MirrordlConfig) -> Result<DownloadRequest> {
        let mirrors = self
            .mirrors
            .iter()
            .map(|m| Mirror::new(m).with_context(|| format!("mirror {}", m)))
            .collect::<Result<Vec<_>>>()?;
        let request = DownloadRequest::new(mirrors, path)
            .context("at least one --mirror is required")?
            .with_credentials(self.user.clone(), self.password.clone())
            .with_proxy(self.proxy(cfg));
        Ok(request)
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = cli.global.load_config()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let fetcher = Fetcher::from_config(&cfg)?;

        match &cli.command {
            CliCommand::Head { path, etag } => {
                let request = cli.global.request(path, &cfg)?;
                run_head(&fetcher, &request, etag.as_deref()).await?;
            }
            CliCommand::Get {
                path,
                output,
                resume,
                sha256,
            } => {
                let request = cli.global.request(path, &cfg)?;
                run_get(&fetcher, &request, output, *resume, sha256.as_deref()).await?;
            }
            CliCommand::Post { url, json } => {
                let proxy = cli.global.proxy(&cfg);
                run_post(&fetcher, url, json, proxy.as_ref()).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
