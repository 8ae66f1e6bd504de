//! Shared fakes for engine tests: a channel that records what it was
//! asked to send, and an in-memory domain store with fixed data.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rotina_channels::Outbound;
use rotina_core::clock::TimeContext;
use rotina_core::error::{Result, RotinaError};
use rotina_core::types::{DeliveryResult, DomainSnapshot, Subject};
use rotina_store::DomainStore;

/// Records every (to, body) pair; answers with a fixed status.
pub struct MockChannel {
    pub sends: Arc<Mutex<Vec<(String, String)>>>,
    status: u16,
}

impl MockChannel {
    pub fn ok() -> Self {
        Self {
            sends: Arc::new(Mutex::new(Vec::new())),
            status: 200,
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            sends: Arc::new(Mutex::new(Vec::new())),
            status,
        }
    }
}

#[async_trait]
impl Outbound for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, to: &str, body: &str) -> DeliveryResult {
        self.sends.lock().unwrap().push((to.to_string(), body.to_string()));
        DeliveryResult {
            ok: self.status == 200 || self.status == 201,
            status_code: Some(self.status),
            raw: if self.status >= 400 { "provider error".into() } else { "ok".into() },
        }
    }
}

/// Fixed subjects + one snapshot for everyone; tracks dispatched events.
#[derive(Default)]
pub struct MockDomain {
    pub subjects: Vec<Subject>,
    pub snapshot: DomainSnapshot,
    pub fail_snapshots: bool,
    dispatched: Mutex<Vec<String>>,
}

impl MockDomain {
    pub fn with_subjects(subjects: Vec<Subject>, snapshot: DomainSnapshot) -> Self {
        Self {
            subjects,
            snapshot,
            fail_snapshots: false,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatched_events(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl DomainStore for MockDomain {
    async fn eligible_subjects(&self) -> Result<Vec<Subject>> {
        Ok(self.subjects.clone())
    }

    async fn snapshot(&self, _subject: &Subject, _ctx: &TimeContext) -> Result<DomainSnapshot> {
        if self.fail_snapshots {
            return Err(RotinaError::Store("snapshot unavailable".into()));
        }
        Ok(self.snapshot.clone())
    }

    async fn mark_event_dispatched(&self, event_id: &str) -> Result<()> {
        self.dispatched.lock().unwrap().push(event_id.to_string());
        Ok(())
    }
}
