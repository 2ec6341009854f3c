pub mod config;
pub mod logging;

pub mod checksum;
pub mod chooser;
pub mod error;
pub mod fetch_head;
pub mod fetcher;
pub mod mirror;
pub mod proxy;
pub mod request;
pub mod retry;
pub mod sink;
mod transport;

pub use chooser::{MirrorChooser, SequentialMirrorChooser};
pub use config::MirrordlConfig;
pub use error::{DownloadError, MirrorFailure};
pub use fetch_head::HeadInfo;
pub use fetcher::Fetcher;
pub use mirror::{Mirror, TransportClass};
pub use proxy::{effective_proxy, ProxyConfig, ProxyKind};
pub use request::DownloadRequest;
pub use sink::ChunkSink;
