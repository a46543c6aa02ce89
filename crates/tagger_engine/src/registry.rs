use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tagger_core::PanelRecord;
use tagger_logging::{tagger_debug, tagger_info, tagger_warn};
use tokio::time::Instant;

use crate::error::{RemoteError, RemoteFailure};
use crate::http::{build_client, endpoint, send_json};
use crate::settings::RemoteSettings;

/// Source of registered panels. Never fails: callers always get a list.
#[async_trait::async_trait]
pub trait PanelRegistry: Send + Sync {
    async fn panels(&self) -> Vec<PanelRecord>;
    /// Drops the cached list so the next call refetches. Called by the
    /// operator side after panels are edited in the admin view.
    fn invalidate(&self);
}

#[derive(Debug, Deserialize)]
struct PanelsResponse {
    ok: bool,
    #[serde(default)]
    paneles: Vec<PanelPayload>,
}

#[derive(Debug, Deserialize)]
struct PanelPayload {
    id: u32,
    nombre: String,
    #[serde(default)]
    numero: PhoneNumbers,
}

/// `numero` is a single string for older panels and a list for newer ones.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum PhoneNumbers {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl PhoneNumbers {
    fn into_vec(self) -> Vec<String> {
        match self {
            PhoneNumbers::None => Vec::new(),
            PhoneNumbers::One(number) => vec![number],
            PhoneNumbers::Many(numbers) => numbers,
        }
    }
}

impl From<PanelPayload> for PanelRecord {
    fn from(payload: PanelPayload) -> Self {
        PanelRecord::new(payload.id, payload.nombre).with_numbers(payload.numero.into_vec())
    }
}

struct CachedPanels {
    fetched_at: Instant,
    panels: Vec<PanelRecord>,
}

#[derive(Default)]
struct RegistryCache {
    fresh: Option<CachedPanels>,
    last_good: Vec<PanelRecord>,
}

/// Panel registry behind `GET {base}/paneles/?secret=...`, cached for a TTL.
pub struct HttpPanelRegistry {
    client: reqwest::Client,
    base_url: String,
    secret: String,
    ttl: Duration,
    cache: Mutex<RegistryCache>,
}

impl HttpPanelRegistry {
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: settings.registry_base_url.clone(),
            secret: settings.secret.clone(),
            ttl: settings.panel_cache_ttl,
            cache: Mutex::new(RegistryCache::default()),
        })
    }

    /// One uncached request to the registry.
    pub async fn fetch_panels(&self) -> Result<Vec<PanelRecord>, RemoteError> {
        let url = endpoint(&self.base_url, "paneles/", &[("secret", self.secret.as_str())])?;
        let response: PanelsResponse = send_json(self.client.get(url)).await?;
        if !response.ok {
            return Err(RemoteError::new(
                RemoteFailure::Decode,
                "registry answered ok=false",
            ));
        }
        Ok(response.paneles.into_iter().map(PanelRecord::from).collect())
    }

    fn cached(&self) -> Option<Vec<PanelRecord>> {
        let cache = self.cache.lock().ok()?;
        let panels = cache
            .fresh
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.panels.clone());
        panels
    }
}

#[async_trait::async_trait]
impl PanelRegistry for HttpPanelRegistry {
    async fn panels(&self) -> Vec<PanelRecord> {
        if let Some(panels) = self.cached() {
            tagger_debug!("using {} cached panels", panels.len());
            return panels;
        }
        match self.fetch_panels().await {
            Ok(panels) => {
                tagger_info!("loaded {} panels from registry", panels.len());
                if let Ok(mut cache) = self.cache.lock() {
                    cache.fresh = Some(CachedPanels {
                        fetched_at: Instant::now(),
                        panels: panels.clone(),
                    });
                    cache.last_good = panels.clone();
                }
                panels
            }
            Err(err) => {
                tagger_warn!("panel registry unavailable: {err}");
                self.cache
                    .lock()
                    .map(|cache| cache.last_good.clone())
                    .unwrap_or_default()
            }
        }
    }

    fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.fresh = None;
        }
        tagger_info!("panel cache invalidated");
    }
}

/// Fixed panel list, used when no registry is configured.
#[derive(Debug, Clone, Default)]
pub struct StaticPanelRegistry {
    panels: Vec<PanelRecord>,
}

impl StaticPanelRegistry {
    pub fn new(panels: Vec<PanelRecord>) -> Self {
        Self { panels }
    }
}

#[async_trait::async_trait]
impl PanelRegistry for StaticPanelRegistry {
    async fn panels(&self) -> Vec<PanelRecord> {
        self.panels.clone()
    }

    fn invalidate(&self) {}
}
