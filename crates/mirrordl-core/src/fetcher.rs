//! Request orchestration over mirrors: HEAD checks, resumable streamed GETs,
//! buffered GETs and fire-and-forget JSON POSTs.
//!
//! Every attempt resolves its effective proxy first, re-syncs the shared
//! transport client when that proxy changed, then runs the transfer on the
//! blocking pool while holding the client. Requests through one fetcher are
//! therefore serialized; two attempts can never disagree about which proxy
//! the live handle uses.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use url::Url;

use crate::chooser::{MirrorChooser, SequentialMirrorChooser};
use crate::config::{MirrordlConfig, TimeoutTiers};
use crate::error::DownloadError;
use crate::fetch_head::HeadInfo;
use crate::mirror::{Mirror, TransportClass};
use crate::proxy::{effective_proxy, ProxyConfig};
use crate::request::DownloadRequest;
use crate::retry::RetryPolicy;
use crate::sink::ChunkSink;
use crate::transport::{Method, RequestSpec, TransportClient};

const JSON_CONTENT_TYPE: &str = "application/json; utf-8";

pub struct Fetcher<C = SequentialMirrorChooser> {
    chooser: C,
    client: Arc<Mutex<TransportClient>>,
    recreations: Arc<AtomicU64>,
    timeouts: TimeoutTiers,
    chunk_size: usize,
    channel_depth: usize,
}

impl Fetcher<SequentialMirrorChooser> {
    /// Fetcher with the sequential chooser, its retry policy taken from `cfg`.
    pub fn from_config(cfg: &MirrordlConfig) -> Result<Self, DownloadError> {
        let policy = cfg
            .retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default();
        Self::new(SequentialMirrorChooser::new(policy), cfg)
    }
}

impl<C: MirrorChooser> Fetcher<C> {
    /// The transport client starts without a proxy.
    pub fn new(chooser: C, cfg: &MirrordlConfig) -> Result<Self, DownloadError> {
        let client = TransportClient::new(None, &cfg.user_agent())?;
        Ok(Self {
            chooser,
            client: Arc::new(Mutex::new(client)),
            recreations: Arc::new(AtomicU64::new(0)),
            timeouts: cfg.connect_timeouts,
            chunk_size: cfg.chunk_size.max(1),
            channel_depth: cfg.channel_depth.max(1),
        })
    }

    pub fn chooser(&self) -> &C {
        &self.chooser
    }

    /// How many times the transport client was rebuilt because the proxy changed.
    pub fn client_recreations(&self) -> u64 {
        self.recreations.load(Ordering::Relaxed)
    }

    /// Proxy the live transport client was built with.
    pub async fn current_proxy(&self) -> Option<ProxyConfig> {
        self.client.lock().await.proxy().cloned()
    }

    /// Probe metadata. Any failure, on every mirror, yields `None`.
    pub async fn head(&self, request: &DownloadRequest, known_etag: Option<&str>) -> Option<HeadInfo> {
        let auth = request.basic_auth_header();
        let result = self
            .chooser
            .mirror_request(request, |mirror, url| {
                let auth = auth.clone();
                async move {
                    let spec = self.head_spec(&mirror, &url, auth.as_deref());
                    tracing::debug!("HEAD {}", url);
                    self.run(request.proxy(), Some(&mirror), move |client, abort| {
                        client.head(&spec, abort)
                    })
                    .await
                }
            })
            .await;

        match result {
            Ok(headers) => Some(HeadInfo::from_headers(headers, known_etag)),
            Err(e) => {
                tracing::debug!("HEAD {} gave no information: {}", request.path(), e);
                None
            }
        }
    }

    /// Stream the resource into `sink`, starting at `resume_from` when given.
    ///
    /// With a resume offset the server must answer `206`; anything else fails
    /// with [`DownloadError::NoResume`] before a byte reaches the sink. If an
    /// attempt dies after delivering data, the next mirror is asked for the
    /// remainder only.
    pub async fn get<S: ChunkSink>(
        &self,
        request: &DownloadRequest,
        resume_from: Option<u64>,
        sink: &mut S,
    ) -> Result<(), DownloadError> {
        let auth = request.basic_auth_header();
        let sink = Mutex::new(sink);
        let delivered = AtomicU64::new(0);

        self.chooser
            .mirror_request(request, |mirror, url| {
                let auth = auth.clone();
                let sink = &sink;
                let delivered = &delivered;
                async move {
                    let already = delivered.load(Ordering::Relaxed);
                    let offset = match (resume_from, already) {
                        (None, 0) => None,
                        (start, n) => Some(start.unwrap_or(0) + n),
                    };
                    let spec = self.get_spec(&mirror, &url, auth.as_deref(), offset);
                    tracing::debug!("GET {} from offset {}", url, offset.unwrap_or(0));
                    let mut sink = sink.lock().await;
                    self.stream_into(request.proxy(), &mirror, spec, &mut **sink, delivered)
                        .await
                }
            })
            .await
    }

    /// Whole body in memory. Only for small documents.
    pub async fn get_bytes(&self, request: &DownloadRequest) -> Result<Vec<u8>, DownloadError> {
        let mut buf: Vec<u8> = Vec::new();
        self.get(request, None, &mut buf).await?;
        Ok(buf)
    }

    /// POST raw JSON to one fixed URL. The response is not interpreted.
    pub async fn post(&self, url: &str, json: &str, proxy: Option<&ProxyConfig>) -> Result<(), DownloadError> {
        let parsed = Url::parse(url).map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let spec = RequestSpec::new(
            Method::Post(json.as_bytes().to_vec()),
            parsed.as_str(),
            self.timeouts.for_class(TransportClass::Standard).post(),
        )
        .header("Content-Type", JSON_CONTENT_TYPE);
        let status = self
            .run(proxy, None, move |client, abort| client.post(&spec, abort))
            .await?;
        tracing::debug!("POST {} -> HTTP {}", parsed, status);
        Ok(())
    }

    /// Serialize `body` and [`post`](Self::post) it.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        proxy: Option<&ProxyConfig>,
    ) -> Result<(), DownloadError> {
        let json = serde_json::to_string(body)?;
        self.post(url, &json, proxy).await
    }

    fn head_spec(&self, mirror: &Mirror, url: &Url, auth: Option<&str>) -> RequestSpec {
        let timeout = self.timeouts.for_class(mirror.transport_class()).head();
        RequestSpec::new(Method::Head, url.as_str(), timeout).authorization(auth)
    }

    fn get_spec(&self, mirror: &Mirror, url: &Url, auth: Option<&str>, offset: Option<u64>) -> RequestSpec {
        let timeout = self.timeouts.for_class(mirror.transport_class()).get();
        RequestSpec::new(Method::Get, url.as_str(), timeout)
            .authorization(auth)
            .range_from(offset)
    }

    /// One GET attempt: the transfer thread feeds a bounded channel, this
    /// task drains it into the sink.
    async fn stream_into<S: ChunkSink>(
        &self,
        configured: Option<&ProxyConfig>,
        mirror: &Mirror,
        spec: RequestSpec,
        sink: &mut S,
        delivered: &AtomicU64,
    ) -> Result<(), DownloadError> {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(self.channel_depth);
        let chunk_size = self.chunk_size;

        let transfer = self.run(configured, Some(mirror), move |client, abort| {
            client.stream(&spec, chunk_size, &tx, abort)
        });
        let drain = async move {
            while let Some(chunk) = rx.recv().await {
                sink.receive(&chunk).await.map_err(DownloadError::Sink)?;
                delivered.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            }
            Ok::<(), DownloadError>(())
        };

        tokio::pin!(transfer);
        tokio::pin!(drain);
        tokio::select! {
            drained = &mut drain => {
                // On a sink error, returning drops `transfer`, which aborts it.
                drained?;
                transfer.await.map(|_status| ())
            }
            transferred = &mut transfer => {
                // The sender is gone now; keep every chunk already queued.
                drain.await?;
                transferred.map(|_status| ())
            }
        }
    }

    /// Take the shared client, bring its proxy in line with this attempt and
    /// run `f` on the blocking pool. The client stays locked until `f` returns.
    /// Dropping the returned future raises the abort flag handed to `f`, so a
    /// stalled transfer gives the client back within about a second.
    async fn run<R, F>(
        &self,
        configured: Option<&ProxyConfig>,
        mirror: Option<&Mirror>,
        f: F,
    ) -> Result<R, DownloadError>
    where
        R: Send + 'static,
        F: FnOnce(&mut TransportClient, &AtomicBool) -> Result<R, DownloadError> + Send + 'static,
    {
        let proxy = effective_proxy(configured, mirror);
        if let (Some(m), Some(_), None) = (mirror, configured, proxy.as_ref()) {
            tracing::debug!("not proxying local mirror {}", m);
        }
        let mut client = Arc::clone(&self.client).lock_owned().await;
        let recreations = Arc::clone(&self.recreations);
        let abort = Arc::new(AtomicBool::new(false));
        let _abort_on_drop = AbortOnDrop(Arc::clone(&abort));
        tokio::task::spawn_blocking(move || {
            if client.sync_proxy(proxy)? {
                recreations.fetch_add(1, Ordering::Relaxed);
            }
            f(&mut *client, &abort)
        })
        .await
        .map_err(|e| DownloadError::Worker(e.to_string()))?
    }
}

/// Raises the attempt's abort flag when the awaiting future goes away.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
