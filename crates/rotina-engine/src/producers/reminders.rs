//! User-authored fixed-time reminders: custom daily notes and workout
//! schedule slots. Both match on the exact local HH:MM, so they live on
//! the minute-granularity pulse driver.

use chrono::Timelike;

use rotina_core::types::{AlertCandidate, AlertKind, DomainSnapshot, Subject};

use super::{AlertProducer, EvalContext};

fn matches_minute(time: chrono::NaiveTime, ctx: &EvalContext<'_>) -> bool {
    time.hour() == ctx.time.hour && time.minute() == ctx.time.minute
}

/// "Tomar vitamina às 08:00" — one candidate per reminder per day.
pub struct CustomReminderProducer;

impl AlertProducer for CustomReminderProducer {
    fn name(&self) -> &'static str {
        "custom-reminders"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        state
            .reminders
            .iter()
            .filter(|r| matches_minute(r.time, ctx))
            .map(|r| {
                let dedup_key = format!("{}-{}", r.id, ctx.time.date);
                let message = format!("🔔 Lembrete: {}", r.label);
                AlertCandidate::new(&subject.id, AlertKind::CustomReminder, dedup_key, message)
            })
            .collect()
    }
}

/// Workout slot for today's weekday. The dedup key is schedule-wide (one
/// workout nudge per subject per day, whatever the slot).
pub struct WorkoutReminderProducer;

impl AlertProducer for WorkoutReminderProducer {
    fn name(&self) -> &'static str {
        "workout-reminders"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let slot = state.workouts.iter().find(|s| matches_minute(s.time, ctx));
        let slot = match slot {
            Some(s) => s,
            None => return Vec::new(),
        };
        let dedup_key = ctx.time.date.to_string();
        let message = format!("🏋️ Hora do treino: {}", slot.label);
        vec![AlertCandidate::new(&subject.id, AlertKind::WorkoutReminder, dedup_key, message)]
    }
}
