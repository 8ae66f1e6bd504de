//! # Rotina Channels
//!
//! Outbound delivery for the notification engine. A channel takes a
//! normalized destination and a rendered body and reports a
//! [`DeliveryResult`] — it never panics and never propagates transport
//! errors upward; a failed send is `ok = false` with the provider's
//! response (or the error text) in `raw` for the audit record.

pub mod address;
pub mod webhook;
pub mod whatsapp;

use async_trait::async_trait;
use rotina_core::types::DeliveryResult;

pub use address::normalize_phone;
pub use webhook::WebhookSender;
pub use whatsapp::WhatsAppSender;

/// An outbound message channel.
#[async_trait]
pub trait Outbound: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `body` to the already-normalized destination `to`.
    /// HTTP 200/201 from the provider count as success.
    async fn send(&self, to: &str, body: &str) -> DeliveryResult;
}

pub(crate) fn is_success(status: u16) -> bool {
    status == 200 || status == 201
}
