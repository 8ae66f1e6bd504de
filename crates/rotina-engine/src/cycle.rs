//! One evaluation cycle: resolve time once, walk subjects sequentially,
//! run the driver's producers in priority order, admit against the daily
//! quota, and dispatch.
//!
//! Error scope is one candidate, or at worst one subject — nothing that
//! happens inside a subject's evaluation may abort the rest of the cycle.

use std::sync::Arc;

use chrono_tz::Tz;

use rotina_channels::Outbound;
use rotina_core::clock::{Clock, SystemClock, TimeContext, WindowSet};
use rotina_core::config::RotinaConfig;
use rotina_core::error::Result;
use rotina_store::{DomainStore, Ledger};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::limiter::DailyQuota;
use crate::producers::{AlertProducer, EvalContext};
use crate::suppression::SuppressionCache;

/// Shared state every driver evaluates against.
pub struct Engine {
    pub clock: Arc<dyn Clock>,
    pub tz: Tz,
    pub windows: WindowSet,
    pub config: RotinaConfig,
    pub domain: Arc<dyn DomainStore>,
    pub ledger: Arc<Ledger>,
    pub dispatcher: Dispatcher,
    pub suppression: SuppressionCache,
}

impl Engine {
    pub fn new(
        config: RotinaConfig,
        domain: Arc<dyn DomainStore>,
        ledger: Arc<Ledger>,
        channel: Arc<dyn Outbound>,
    ) -> Result<Self> {
        let tz = config.tz()?;
        let windows = config.window_set()?;
        let dispatcher = Dispatcher::new(
            channel,
            ledger.clone(),
            domain.clone(),
            &config.channel.country_code,
        );
        let suppression = SuppressionCache::new(
            config.driver.suppression_ttl_secs,
            config.driver.suppression_cap,
        );
        Ok(Self {
            clock: Arc::new(SystemClock),
            tz,
            windows,
            config,
            domain,
            ledger,
            dispatcher,
            suppression,
        })
    }

    /// Swap the time source (tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Counters for one cycle, logged at cycle end.
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub subjects: usize,
    pub candidates: usize,
    pub sent: usize,
    pub deduped: usize,
    pub duplicates: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub async fn run_cycle(
    engine: &Engine,
    driver: &str,
    producers: &[Box<dyn AlertProducer>],
) -> CycleStats {
    let mut stats = CycleStats::default();
    let ctx = TimeContext::resolve(engine.clock.now_utc(), engine.tz);

    let subjects = match engine.domain.eligible_subjects().await {
        Ok(subjects) => subjects,
        Err(e) => {
            tracing::warn!("[{driver}] Could not list subjects: {e}");
            stats.errors += 1;
            return stats;
        }
    };
    stats.subjects = subjects.len();

    let ectx = EvalContext {
        time: &ctx,
        windows: &engine.windows,
        config: &engine.config,
    };

    for subject in &subjects {
        let mut quota =
            match DailyQuota::load(&engine.ledger, subject, &ctx, engine.config.daily_cap) {
                Ok(quota) => quota,
                Err(e) => {
                    tracing::warn!("[{driver}] Quota read failed for {}: {e}", subject.id);
                    stats.errors += 1;
                    continue;
                }
            };
        if quota.exhausted() {
            continue;
        }

        let snapshot = match engine.domain.snapshot(subject, &ctx).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("[{driver}] Snapshot failed for {}: {e}", subject.id);
                stats.errors += 1;
                continue;
            }
        };

        'producers: for producer in producers {
            for candidate in producer.evaluate(subject, &ectx, &snapshot) {
                stats.candidates += 1;

                // Once the limiter refuses, remaining producers for this
                // subject wait for the next cycle — nothing is lost, the
                // condition still holds and the key is still unsent.
                if quota.exhausted() {
                    break 'producers;
                }

                match engine
                    .ledger
                    .was_sent(&subject.id, candidate.kind, &candidate.dedup_key)
                {
                    Ok(true) => {
                        stats.deduped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            "[{driver}] Dedup check failed for {} {} {}: {e}",
                            subject.id,
                            candidate.kind,
                            candidate.dedup_key
                        );
                        stats.errors += 1;
                        continue;
                    }
                }

                // One message per subject per minute across all drivers:
                // closes the gap where a second driver passes the dedup
                // check before this one's ledger write lands.
                let minute_key = SuppressionCache::minute_key(&subject.id, &ctx);
                if !engine.suppression.try_acquire(&minute_key, ctx.now_utc) {
                    stats.suppressed += 1;
                    continue;
                }

                match engine.dispatcher.dispatch(subject, &candidate, ctx.now_utc).await {
                    DispatchOutcome::Sent => {
                        quota.consume();
                        stats.sent += 1;
                    }
                    DispatchOutcome::Duplicate => stats.duplicates += 1,
                    DispatchOutcome::Failed => stats.failed += 1,
                    DispatchOutcome::Skipped => stats.skipped += 1,
                }
            }
        }
    }

    tracing::info!(
        "🔁 [{driver}] cycle done: {} subjects, {} candidates, {} sent, {} deduped, {} suppressed, {} failed",
        stats.subjects,
        stats.candidates,
        stats.sent,
        stats.deduped,
        stats.suppressed,
        stats.failed
    );
    stats
}
