//! Dispatcher — the only place a candidate becomes a message.
//!
//! Order per candidate: normalize address → send → record. The ledger
//! write happens only after a confirmed send, and a duplicate-key result
//! from it means a concurrent writer sent the same occurrence first — the
//! caller must not count this one. Failures are audited with status=error
//! and never consume quota; the same dedup key is free to retry on a
//! later cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use rotina_channels::{normalize_phone, Outbound};
use rotina_core::types::{AlertCandidate, AlertKind, RecordStatus, Subject};
use rotina_store::{DomainStore, Ledger, RecordOutcome};

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered and counted.
    Sent,
    /// Delivered, but another writer had already recorded the key.
    Duplicate,
    /// Channel said no; audited, retryable.
    Failed,
    /// Subject-level configuration problem (no dialable address).
    Skipped,
}

pub struct Dispatcher {
    channel: Arc<dyn Outbound>,
    ledger: Arc<Ledger>,
    domain: Arc<dyn DomainStore>,
    country_code: String,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn Outbound>,
        ledger: Arc<Ledger>,
        domain: Arc<dyn DomainStore>,
        country_code: &str,
    ) -> Self {
        Self {
            channel,
            ledger,
            domain,
            country_code: country_code.to_string(),
        }
    }

    pub async fn dispatch(
        &self,
        subject: &Subject,
        candidate: &AlertCandidate,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let to = match normalize_phone(&subject.phone, &self.country_code) {
            Some(to) => to,
            None => {
                tracing::warn!(
                    "Subject {} has no dialable phone ('{}'); skipping {} {}",
                    subject.id,
                    subject.phone,
                    candidate.kind,
                    candidate.dedup_key
                );
                return DispatchOutcome::Skipped;
            }
        };

        let result = self.channel.send(&to, &candidate.message).await;
        if !result.ok {
            tracing::warn!(
                "❌ Delivery failed for {} {} {} (status {:?})",
                subject.id,
                candidate.kind,
                candidate.dedup_key,
                result.status_code
            );
            // Best-effort audit; a ledger hiccup here must not hide the
            // delivery failure itself.
            if let Err(e) = self.ledger.record(
                &subject.id,
                candidate.kind,
                &candidate.dedup_key,
                RecordStatus::Error,
                Some(&truncate(&result.raw, 200)),
                now,
            ) {
                tracing::debug!("Error audit not written: {e}");
            }
            return DispatchOutcome::Failed;
        }

        let outcome = match self.ledger.record(
            &subject.id,
            candidate.kind,
            &candidate.dedup_key,
            RecordStatus::Success,
            None,
            now,
        ) {
            Ok(RecordOutcome::Recorded) | Ok(RecordOutcome::Skipped) => DispatchOutcome::Sent,
            Ok(RecordOutcome::AlreadyRecorded) => {
                tracing::debug!(
                    "Concurrent writer already recorded {} {} {}",
                    subject.id,
                    candidate.kind,
                    candidate.dedup_key
                );
                DispatchOutcome::Duplicate
            }
            Err(e) => {
                // The message went out; losing the record is the lesser
                // problem and the next cycle's dedup check will log again.
                tracing::warn!(
                    "Sent {} {} {} but ledger write failed: {e}",
                    subject.id,
                    candidate.kind,
                    candidate.dedup_key
                );
                DispatchOutcome::Sent
            }
        };

        if candidate.kind == AlertKind::EventToday {
            if let Some(event_id) = &candidate.entity_id {
                if let Err(e) = self.domain.mark_event_dispatched(event_id).await {
                    tracing::warn!("Event {event_id} not flagged as dispatched: {e}");
                }
            }
        }

        if outcome == DispatchOutcome::Sent {
            tracing::info!(
                "📣 [{}] {} → {} ({})",
                self.channel.name(),
                candidate.kind,
                subject.id,
                candidate.dedup_key
            );
        }
        outcome
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max);
        format!("{}…", &s[..cut])
    }
}
