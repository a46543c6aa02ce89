use serde::Serialize;
use tagger_core::PanelRecord;

use crate::error::RemoteError;
use crate::http::{build_client, endpoint, json_request, send_expect_success};
use crate::settings::RemoteSettings;

/// Receives outage reports. Delivery is best-effort.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn report(&self, panel: &PanelRecord) -> Result<(), RemoteError>;
}

#[derive(Debug, Serialize)]
struct AlertRequest<'a> {
    id: u32,
    nombre: &'a str,
    numero: &'a str,
}

/// Posts `{id, nombre, numero}` to `{base}/alerts?secret=...`.
pub struct HttpAlertSink {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpAlertSink {
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: settings.registry_base_url.clone(),
            secret: settings.secret.clone(),
        })
    }
}

#[async_trait::async_trait]
impl AlertSink for HttpAlertSink {
    async fn report(&self, panel: &PanelRecord) -> Result<(), RemoteError> {
        let url = endpoint(&self.base_url, "alerts", &[("secret", self.secret.as_str())])?;
        let body = AlertRequest {
            id: panel.id,
            nombre: &panel.name,
            numero: panel.primary_number(),
        };
        send_expect_success(json_request(self.client.post(url), &body)?).await
    }
}

/// Drops every report; for runs without an alert endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlertSink;

#[async_trait::async_trait]
impl AlertSink for NullAlertSink {
    async fn report(&self, _panel: &PanelRecord) -> Result<(), RemoteError> {
        Ok(())
    }
}
