use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteFailure};
use crate::http::{build_client, endpoint, json_request, send_json};
use crate::settings::RemoteSettings;

const MACHINE_ID_HEADER: &str = "X-Machine-ID";

/// A URL's campaign letter as known to the shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub url: String,
    pub letter: char,
    pub use_count: u32,
}

/// Shared URL -> letter store all pipeline instances coordinate through.
#[async_trait::async_trait]
pub trait MappingStore: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<MappingEntry>, RemoteError>;
    /// Every known mapping, for warming a fresh cache.
    async fn fetch_all(&self) -> Result<Vec<MappingEntry>, RemoteError>;
    async fn save(&self, url: &str, letter: char, panel: &str) -> Result<(), RemoteError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ok: bool,
    #[serde(default)]
    mapeo: Option<MappingPayload>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    ok: bool,
    #[serde(default)]
    mapeos: HashMap<String, MappingPayload>,
}

/// Older records hold the bare letter instead of an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MappingPayload {
    Full {
        letra: String,
        #[serde(default)]
        usos: Option<u32>,
    },
    Bare(String),
}

impl MappingPayload {
    fn into_entry(self, url: String) -> Option<MappingEntry> {
        let (letter, uses) = match self {
            MappingPayload::Full { letra, usos } => (letra, usos),
            MappingPayload::Bare(letra) => (letra, None),
        };
        let letter = single_letter(&letter)?;
        Some(MappingEntry {
            url,
            letter,
            use_count: uses.unwrap_or(1),
        })
    }
}

fn single_letter(raw: &str) -> Option<char> {
    let mut chars = raw.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    url: &'a str,
    letra: String,
    panel: &'a str,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    ok: bool,
}

/// Mapping store behind `{base}/mapeos`, identified by a machine id header.
pub struct HttpMappingStore {
    client: reqwest::Client,
    base_url: String,
    machine_id: String,
}

impl HttpMappingStore {
    pub fn new(settings: &RemoteSettings, machine_id: impl Into<String>) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: settings.mappings_base_url.clone(),
            machine_id: machine_id.into(),
        })
    }
}

#[async_trait::async_trait]
impl MappingStore for HttpMappingStore {
    async fn fetch(&self, url: &str) -> Result<Option<MappingEntry>, RemoteError> {
        let target = endpoint(&self.base_url, "mapeos", &[("url", url)])?;
        let request = self
            .client
            .get(target)
            .header(MACHINE_ID_HEADER, self.machine_id.as_str());
        let response: LookupResponse = send_json(request).await?;
        if !response.ok {
            return Ok(None);
        }
        Ok(response
            .mapeo
            .and_then(|payload| payload.into_entry(url.to_string())))
    }

    async fn fetch_all(&self) -> Result<Vec<MappingEntry>, RemoteError> {
        let target = endpoint(&self.base_url, "mapeos", &[])?;
        let request = self
            .client
            .get(target)
            .header(MACHINE_ID_HEADER, self.machine_id.as_str());
        let response: ListResponse = send_json(request).await?;
        if !response.ok {
            return Err(RemoteError::new(
                RemoteFailure::Decode,
                "mapping store answered ok=false",
            ));
        }
        Ok(response
            .mapeos
            .into_iter()
            .filter_map(|(url, payload)| payload.into_entry(url))
            .collect())
    }

    async fn save(&self, url: &str, letter: char, panel: &str) -> Result<(), RemoteError> {
        let target = endpoint(&self.base_url, "mapeos", &[])?;
        let body = SaveRequest {
            url,
            letra: letter.to_ascii_uppercase().to_string(),
            panel,
        };
        let request = json_request(
            self.client
                .post(target)
                .header(MACHINE_ID_HEADER, self.machine_id.as_str()),
            &body,
        )?;
        let response: SaveResponse = send_json(request).await?;
        if response.ok {
            Ok(())
        } else {
            Err(RemoteError::new(
                RemoteFailure::Decode,
                "mapping store rejected the write",
            ))
        }
    }
}

/// Process-local store; lets several resolvers share state without a server.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    entries: Mutex<HashMap<String, MappingEntry>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (String, char)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(url, letter)| {
                let entry = MappingEntry {
                    url: url.clone(),
                    letter,
                    use_count: 0,
                };
                (url, entry)
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn poisoned() -> RemoteError {
        RemoteError::new(RemoteFailure::Network, "mapping store lock poisoned")
    }
}

#[async_trait::async_trait]
impl MappingStore for MemoryMappingStore {
    async fn fetch(&self, url: &str) -> Result<Option<MappingEntry>, RemoteError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get_mut(url).map(|entry| {
            entry.use_count += 1;
            entry.clone()
        }))
    }

    async fn fetch_all(&self) -> Result<Vec<MappingEntry>, RemoteError> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.values().cloned().collect())
    }

    async fn save(&self, url: &str, letter: char, _panel: &str) -> Result<(), RemoteError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert(
            url.to_string(),
            MappingEntry {
                url: url.to_string(),
                letter: letter.to_ascii_uppercase(),
                use_count: 0,
            },
        );
        Ok(())
    }
}
