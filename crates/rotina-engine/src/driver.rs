//! Scheduler drivers — the independent time triggers that start cycles.
//!
//! Each driver is Idle → Running → Idle: an atomic flag refuses reentry
//! while a cycle is still going, and a minimum-gap guard swallows the
//! double fires interval timers produce after clock drift or suspend.
//! Drivers share one [`Engine`] (and through it the minute suppression
//! cache that coordinates them).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cron;
use crate::cycle::{run_cycle, CycleStats, Engine};
use crate::producers::{
    AlertProducer, CategorySpikeProducer, CustomReminderProducer, EventDueProducer,
    EventLeadProducer, GoalsMissedProducer, JunkFoodProducer, LowBalanceProducer,
    LowProteinProducer, MealMissingProducer, WorkoutReminderProducer,
};

/// When a driver fires.
pub enum Trigger {
    /// Fixed interval.
    Every(Duration),
    /// 5-field cron line, evaluated in the engine's timezone.
    Cron(String),
}

pub struct Driver {
    pub name: &'static str,
    trigger: Trigger,
    /// Fixed priority order — the tie-break when quota runs short.
    producers: Vec<Box<dyn AlertProducer>>,
    running: AtomicBool,
    last_done: Mutex<Option<DateTime<Utc>>>,
}

impl Driver {
    pub fn new(name: &'static str, trigger: Trigger, producers: Vec<Box<dyn AlertProducer>>) -> Self {
        Self {
            name,
            trigger,
            producers,
            running: AtomicBool::new(false),
            last_done: Mutex::new(None),
        }
    }

    /// Run one guarded cycle. Returns empty stats when the guard refused.
    pub async fn run_once(&self, engine: &Engine) -> CycleStats {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("[{}] previous cycle still running; skipping fire", self.name);
            return CycleStats::default();
        }

        let now = engine.clock.now_utc();
        let min_gap = chrono::Duration::seconds(engine.config.driver.min_gap_secs as i64);
        let too_soon = {
            let last_done = self.last_done.lock().unwrap_or_else(|e| e.into_inner());
            matches!(*last_done, Some(last) if now.signed_duration_since(last) < min_gap)
        };

        let stats = if too_soon {
            tracing::debug!("[{}] fired again within the minimum gap; skipping", self.name);
            CycleStats::default()
        } else {
            let stats = run_cycle(engine, self.name, &self.producers).await;
            let mut last_done = self.last_done.lock().unwrap_or_else(|e| e.into_inner());
            *last_done = Some(engine.clock.now_utc());
            stats
        };

        self.running.store(false, Ordering::SeqCst);
        stats
    }

    /// Run forever on this driver's trigger.
    pub fn spawn(self: Arc<Self>, engine: Arc<Engine>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match &self.trigger {
                Trigger::Every(period) => {
                    tracing::info!("⏰ [{}] every {}s", self.name, period.as_secs());
                    let mut interval = tokio::time::interval(*period);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    // First tick completes immediately.
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        self.run_once(&engine).await;
                    }
                }
                Trigger::Cron(expression) => {
                    tracing::info!("⏰ [{}] cron '{}' ({})", self.name, expression, engine.tz);
                    loop {
                        let next = match cron::next_fire(expression, Utc::now(), engine.tz) {
                            Some(next) => next,
                            None => {
                                tracing::warn!(
                                    "[{}] cron '{}' yields no fire time; driver stopped",
                                    self.name,
                                    expression
                                );
                                return;
                            }
                        };
                        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                        tokio::time::sleep(wait).await;
                        self.run_once(&engine).await;
                    }
                }
            }
        })
    }
}

/// The three shipped drivers, producers in priority order per window type.
pub fn standard_drivers(engine: &Engine) -> Vec<Driver> {
    let cfg = &engine.config.driver;
    vec![
        // Minute-granularity conditions: exact-time reminders first, then
        // window-gated nudges.
        Driver::new(
            "pulse",
            Trigger::Every(Duration::from_secs(cfg.pulse_secs)),
            vec![
                Box::new(CustomReminderProducer),
                Box::new(WorkoutReminderProducer),
                Box::new(EventDueProducer),
                Box::new(MealMissingProducer),
                Box::new(LowProteinProducer),
            ],
        ),
        // Morning window: day-relative event reminders outrank finance.
        Driver::new(
            "morning",
            Trigger::Cron(cfg.morning_cron.clone()),
            vec![
                Box::new(EventLeadProducer),
                Box::new(LowBalanceProducer),
                Box::new(CategorySpikeProducer),
            ],
        ),
        // Goal-closing window.
        Driver::new(
            "evening",
            Trigger::Cron(cfg.evening_cron.clone()),
            vec![Box::new(GoalsMissedProducer), Box::new(JunkFoodProducer)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockChannel, MockDomain};
    use chrono::TimeZone;
    use rotina_core::clock::FixedClock;
    use rotina_core::config::RotinaConfig;
    use rotina_core::types::{DomainSnapshot, Subject};
    use rotina_store::Ledger;
    use rusqlite::Connection;

    fn engine(channel: MockChannel) -> Engine {
        let ledger = Arc::new(
            Ledger::from_connection(Connection::open_in_memory().unwrap(), "alert_log", "notification_log")
                .unwrap(),
        );
        let subject = Subject {
            id: "u1".into(),
            name: "Ana".into(),
            phone: "11988887777".into(),
            active: true,
        };
        let snapshot = DomainSnapshot {
            month_balance: Some(150.0),
            ..Default::default()
        };
        let domain = Arc::new(MockDomain::with_subjects(vec![subject], snapshot));
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        Engine::new(RotinaConfig::default(), domain, ledger, Arc::new(channel))
            .unwrap()
            .with_clock(Arc::new(FixedClock(now)))
    }

    #[tokio::test]
    async fn min_gap_swallows_double_fire() {
        let channel = MockChannel::ok();
        let sends = channel.sends.clone();
        let engine = engine(channel);
        let driver = Driver::new("t", Trigger::Every(Duration::from_secs(60)), vec![Box::new(LowBalanceProducer)]);

        let stats = driver.run_once(&engine).await;
        assert_eq!(stats.sent, 1);

        // The clock is fixed, so the second fire lands "immediately" —
        // inside the minimum gap — and must be swallowed.
        let stats = driver.run_once(&engine).await;
        assert_eq!(stats.subjects, 0);
        assert_eq!(sends.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn standard_drivers_cover_all_producers() {
        let engine = engine(MockChannel::ok());
        let drivers = standard_drivers(&engine);
        assert_eq!(drivers.len(), 3);
        let names: Vec<_> = drivers.iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["pulse", "morning", "evening"]);
        let producer_count: usize = drivers.iter().map(|d| d.producers.len()).sum();
        assert_eq!(producer_count, 10);
    }
}
