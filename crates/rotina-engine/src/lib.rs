//! # Rotina Engine
//!
//! The notification scheduling & deduplication engine: decides, across
//! independent time triggers, whether a subject should hear about a
//! condition right now, sends through the outbound channel, and records
//! the send durably so it never repeats.
//!
//! ## Architecture
//! ```text
//! Driver (tokio interval / local-time cron)
//!   ├── reentrancy flag + minimum-gap guard
//!   └── cycle: resolve TimeContext (fixed IANA zone)
//!         └── per eligible subject, sequentially
//!               ├── DailyQuota  ← ledger success count for today
//!               ├── producers in priority order
//!               │     finance / diet / events / reminders
//!               ├── ledger.was_sent (dedup)
//!               ├── SuppressionCache (minute-level, cross-driver)
//!               └── Dispatcher → channel.send → ledger.record
//! ```
//!
//! Failure policy: errors are caught at the candidate (or subject) scope
//! and logged with subject, kind, and dedup key; a broken ledger degrades
//! to fail-open rather than stopping delivery.

pub mod cron;
pub mod cycle;
pub mod dispatcher;
pub mod driver;
pub mod limiter;
pub mod producers;
pub mod suppression;

#[cfg(test)]
pub(crate) mod testutil;

pub use cycle::{run_cycle, CycleStats, Engine};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use driver::{standard_drivers, Driver, Trigger};
pub use limiter::DailyQuota;
pub use producers::{AlertProducer, EvalContext};
pub use suppression::SuppressionCache;
