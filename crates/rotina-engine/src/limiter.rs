//! Daily rate limiter.
//!
//! One quota per subject per local day, shared across every producer and
//! window type: a subject at the cap receives nothing more that day, no
//! matter which domain wants to talk. The counter is seeded from the
//! ledger once per cycle and consumed in memory — subjects are evaluated
//! sequentially inside a cycle, so no further locking is needed.

use rotina_core::clock::TimeContext;
use rotina_core::error::Result;
use rotina_core::types::Subject;
use rotina_store::Ledger;

#[derive(Debug, Clone)]
pub struct DailyQuota {
    cap: u32,
    used: u32,
}

impl DailyQuota {
    pub fn new(cap: u32, used: u32) -> Self {
        Self { cap, used }
    }

    /// Seed from today's success count in the ledger. A degraded ledger
    /// counts zero, so the cap fails open together with dedup.
    pub fn load(ledger: &Ledger, subject: &Subject, ctx: &TimeContext, cap: u32) -> Result<Self> {
        let used = ledger.success_count(&subject.id, ctx.day_start, ctx.day_end)?;
        Ok(Self::new(cap, used))
    }

    pub fn remaining(&self) -> u32 {
        self.cap.saturating_sub(self.used)
    }

    pub fn exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume one unit. Refuses at the cap.
    pub fn consume(&mut self) -> bool {
        if self.exhausted() {
            return false;
        }
        self.used += 1;
        true
    }
}
