//! Alert producers — one independent evaluator per domain condition.
//!
//! A producer is a pure function of (subject, resolved time, domain
//! snapshot): it reads, decides, and yields zero or more candidates. It
//! never touches the ledger, the quota, or the channel — admission and
//! dispatch belong to the cycle. That keeps every trigger condition
//! testable with a fixed clock and an in-memory snapshot.

pub mod diet;
pub mod events;
pub mod finance;
pub mod reminders;

use rotina_core::clock::{TimeContext, WindowSet};
use rotina_core::config::RotinaConfig;
use rotina_core::types::{AlertCandidate, DomainSnapshot, Subject};

pub use diet::{GoalsMissedProducer, JunkFoodProducer, LowProteinProducer, MealMissingProducer};
pub use events::{EventDueProducer, EventLeadProducer};
pub use finance::{CategorySpikeProducer, LowBalanceProducer};
pub use reminders::{CustomReminderProducer, WorkoutReminderProducer};

/// Everything a producer may consult besides the snapshot. One struct so
/// thresholds and windows are never re-derived ad hoc per producer.
pub struct EvalContext<'a> {
    pub time: &'a TimeContext,
    pub windows: &'a WindowSet,
    pub config: &'a RotinaConfig,
}

/// A domain evaluator. Registered on a driver in fixed priority order.
pub trait AlertProducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Yield the candidates whose condition holds "as of now". An empty
    /// vec is the normal case, not an error.
    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate>;
}
