//! WhatsApp Business Cloud API sender.
//!
//! Uses the official WhatsApp Business Platform (Cloud API).
//! Requires: Access Token + Phone Number ID from Meta Business Suite.

use async_trait::async_trait;
use std::time::Duration;

use rotina_core::config::ChannelConfig;
use rotina_core::error::{Result, RotinaError};
use rotina_core::types::DeliveryResult;

use crate::{is_success, Outbound};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v21.0";

pub struct WhatsAppSender {
    access_token: String,
    phone_number_id: String,
    api_base: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl WhatsAppSender {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        if config.whatsapp.access_token.is_empty() {
            return Err(RotinaError::Config("WhatsApp access_token not configured".into()));
        }
        if config.whatsapp.phone_number_id.is_empty() {
            return Err(RotinaError::Config("WhatsApp phone_number_id not configured".into()));
        }
        let api_base = if config.whatsapp.api_base.is_empty() {
            DEFAULT_API_BASE.to_string()
        } else {
            config.whatsapp.api_base.trim_end_matches('/').to_string()
        };
        Ok(Self {
            access_token: config.whatsapp.access_token.clone(),
            phone_number_id: config.whatsapp.phone_number_id.clone(),
            api_base,
            timeout: Duration::from_secs(config.send_timeout_secs),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Outbound for WhatsAppSender {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, to: &str, body: &str) -> DeliveryResult {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": body
            }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let raw = resp.text().await.unwrap_or_default();
                if is_success(status) {
                    tracing::debug!("WhatsApp message sent to {to}");
                } else {
                    tracing::warn!("WhatsApp API error {status}: {raw}");
                }
                DeliveryResult {
                    ok: is_success(status),
                    status_code: Some(status),
                    raw,
                }
            }
            Err(e) => {
                tracing::warn!("WhatsApp send failed: {e}");
                DeliveryResult::failure(format!("WhatsApp send failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_are_a_config_error() {
        let config = ChannelConfig::default();
        assert!(WhatsAppSender::new(&config).is_err());
    }

    #[test]
    fn api_base_override_is_trimmed() {
        let mut config = ChannelConfig::default();
        config.whatsapp.access_token = "tok".into();
        config.whatsapp.phone_number_id = "123".into();
        config.whatsapp.api_base = "http://localhost:9009/".into();
        let sender = WhatsAppSender::new(&config).unwrap();
        assert_eq!(sender.api_base, "http://localhost:9009");
    }
}
