//! Asynchronous resolution of every image a scene references.
//!
//! Each source is fetched and decoded independently and concurrently. The
//! result is only handed out once *all* of them have settled, and only if
//! the scene they were requested for is still current.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use maymay_core::{ImageSource, Scene};
use tokio::sync::watch;

use crate::error::{RenderError, RenderResult};
use crate::image::{data_uri_bytes, load_image_from_bytes, DecodedImage};

/// Fetches the raw bytes behind an image location.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the bytes at `location` (URL, data URI, or path).
    async fn fetch(&self, location: &str) -> RenderResult<Vec<u8>>;
}

/// Default fetcher: HTTP(S) via reqwest, data URIs inline, everything else
/// from the filesystem.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> RenderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("maymay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RenderError::Fetch {
                source_ref: "http client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { http })
    }

    /// Create a fetcher sharing an existing client.
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_http(&self, url: &str) -> RenderResult<Vec<u8>> {
        let fetch_err = |reason: String| RenderError::Fetch {
            source_ref: url.to_string(),
            reason,
        };
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // 401/403 is how hosts refuse cross-origin hotlinking
            return Err(fetch_err(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> RenderResult<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.fetch_http(location).await
        } else if location.starts_with("data:") {
            data_uri_bytes(location)
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            tokio::fs::read(path).await.map_err(|e| RenderError::Fetch {
                source_ref: location.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Identity of the scene a resolution was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket(u64);

/// Stale-result guard.
///
/// Holds a generation counter; [`SessionGuard::advance`] marks the current
/// scene as replaced or discarded, which abandons every resolution started
/// under an older ticket.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    generation: Arc<watch::Sender<u64>>,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGuard {
    /// Create a guard at generation zero.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            generation: Arc::new(tx),
        }
    }

    /// Ticket for the current scene.
    #[must_use]
    pub fn current(&self) -> SessionTicket {
        SessionTicket(*self.generation.borrow())
    }

    /// Invalidate the current scene and return the ticket for its successor.
    pub fn advance(&self) -> SessionTicket {
        self.generation.send_modify(|generation| *generation += 1);
        let ticket = self.current();
        tracing::debug!("Scene session advanced to {}", ticket.0);
        ticket
    }

    /// Whether `ticket` still belongs to the current scene.
    #[must_use]
    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        self.current() == ticket
    }

    /// Resolves once `ticket` is no longer current.
    async fn superseded(&self, ticket: SessionTicket) {
        let mut rx = self.generation.subscribe();
        loop {
            if *rx.borrow_and_update() != ticket.0 {
                return;
            }
            if rx.changed().await.is_err() {
                // the sender lives as long as self; never superseded
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Every image a scene references, resolved or failed.
#[derive(Debug, Clone, Default)]
pub struct ResolvedImages {
    images: HashMap<String, Arc<DecodedImage>>,
    failures: BTreeMap<String, String>,
}

impl ResolvedImages {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded image under `key`.
    pub fn insert(&mut self, key: impl Into<String>, image: DecodedImage) {
        let key = key.into();
        self.failures.remove(&key);
        self.images.insert(key, Arc::new(image));
    }

    /// Record a failed resolution under `key`.
    pub fn insert_failure(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        let key = key.into();
        self.images.remove(&key);
        self.failures.insert(key, reason.into());
    }

    /// Decoded image for a source key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DecodedImage> {
        self.images.get(key).map(AsRef::as_ref)
    }

    /// Decoded image for a layer source.
    #[must_use]
    pub fn for_source(&self, source: &ImageSource) -> Option<&DecodedImage> {
        self.get(&source.cache_key())
    }

    /// Why a source key failed, if it did.
    #[must_use]
    pub fn failure(&self, key: &str) -> Option<&str> {
        self.failures.get(key).map(String::as_str)
    }

    /// All failures, ordered by key.
    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    /// Number of successfully resolved images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Check if nothing resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

enum Request {
    Remote(String),
    Local(Option<Arc<[u8]>>),
}

/// Distinct sources referenced by a scene, base first, in paint order.
fn requests(scene: &Scene) -> Vec<(String, Request)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    if !scene.base_image.is_empty() && seen.insert(scene.base_image.clone()) {
        out.push((scene.base_image.clone(), Request::Remote(scene.base_image.clone())));
    }
    for layer in scene.image_layers() {
        let key = layer.source.cache_key();
        if !seen.insert(key.clone()) {
            continue;
        }
        let request = match &layer.source {
            ImageSource::Remote(url) => Request::Remote(url.clone()),
            ImageSource::Local(resource) => Request::Local(scene.resources().get(resource)),
        };
        out.push((key, request));
    }
    out
}

async fn resolve_one(fetcher: &dyn ImageFetcher, request: Request) -> RenderResult<DecodedImage> {
    let bytes = match request {
        Request::Remote(location) => fetcher.fetch(&location).await?,
        Request::Local(Some(bytes)) => bytes.to_vec(),
        Request::Local(None) => {
            return Err(RenderError::Resource(
                "local resource was released or never allocated".to_string(),
            ))
        }
    };
    let image = load_image_from_bytes(&bytes)?;
    tracing::debug!(
        "Decoded {:?} image, {}x{}",
        image.format,
        image.width,
        image.height
    );
    Ok(image)
}

/// Resolve the base image and every layer source of `scene` concurrently.
///
/// Individual failures are recorded, not returned.
///
/// # Errors
///
/// Returns [`RenderError::Stale`] if `guard` advances before or while the
/// images resolve; in-flight fetches are dropped.
pub async fn resolve_scene(
    scene: &Scene,
    fetcher: &dyn ImageFetcher,
    guard: &SessionGuard,
) -> RenderResult<ResolvedImages> {
    let ticket = guard.current();
    let requests = requests(scene);
    tracing::debug!("Resolving {} image sources", requests.len());

    let work = join_all(requests.into_iter().map(|(key, request)| async move {
        let result = resolve_one(fetcher, request).await;
        (key, result)
    }));

    let settled = tokio::select! {
        settled = work => settled,
        () = guard.superseded(ticket) => {
            tracing::debug!("Scene replaced mid-resolution, abandoning fetches");
            return Err(RenderError::Stale);
        }
    };

    if !guard.is_current(ticket) {
        return Err(RenderError::Stale);
    }

    let mut resolved = ResolvedImages::new();
    for (key, result) in settled {
        match result {
            Ok(image) => resolved.insert(key, image),
            Err(e) => {
                tracing::warn!("Could not resolve {key}: {e}");
                resolved.insert_failure(key, e.to_string());
            }
        }
    }
    Ok(resolved)
}
