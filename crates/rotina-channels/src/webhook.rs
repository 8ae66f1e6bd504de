//! Generic HTTP webhook sender — POST with a JSON body.
//!
//! Useful for relaying through an SMS gateway or a test collector without
//! touching the engine.

use async_trait::async_trait;
use std::time::Duration;

use rotina_core::config::ChannelConfig;
use rotina_core::error::{Result, RotinaError};
use rotina_core::types::DeliveryResult;

use crate::{is_success, Outbound};

pub struct WebhookSender {
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        if config.webhook.url.is_empty() {
            return Err(RotinaError::Config("Webhook url not configured".into()));
        }
        Ok(Self {
            url: config.webhook.url.clone(),
            headers: config.webhook.headers.clone(),
            timeout: Duration::from_secs(config.send_timeout_secs),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Outbound for WebhookSender {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, to: &str, body: &str) -> DeliveryResult {
        let payload = serde_json::json!({
            "to": to,
            "body": body,
            "sent_at": chrono::Utc::now().to_rfc3339(),
        });

        let mut req = self.client.post(&self.url).json(&payload).timeout(self.timeout);
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let raw = resp.text().await.unwrap_or_default();
                if !is_success(status) {
                    tracing::warn!("Webhook error {status} from {}", self.url);
                }
                DeliveryResult {
                    ok: is_success(status),
                    status_code: Some(status),
                    raw,
                }
            }
            Err(e) => {
                tracing::warn!("Webhook send failed: {e}");
                DeliveryResult::failure(format!("Webhook send failed: {e}"))
            }
        }
    }
}
