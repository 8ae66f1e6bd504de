//! Calendar event reminders — two independent stages per event.

use chrono::Timelike;

use rotina_core::types::{AlertCandidate, AlertKind, DomainSnapshot, Subject};

use super::{AlertProducer, EvalContext};

/// "In N days" stage: fires inside the fixed morning window on the day
/// exactly `lead_days` before the event's local date.
pub struct EventLeadProducer;

impl AlertProducer for EventLeadProducer {
    fn name(&self) -> &'static str {
        "events-lead"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        if !ctx.windows.in_morning(ctx.time.minute_of_day) {
            return Vec::new();
        }
        let lead_days = ctx.config.events.lead_days;
        let mut out = Vec::new();
        for event in &state.events {
            let local_start = event.starts_at.with_timezone(&ctx.time.tz);
            let event_date = local_start.date_naive();
            if (event_date - ctx.time.date).num_days() != lead_days {
                continue;
            }
            let dedup_key = format!("{}-lead", event.id);
            let message = format!(
                "📅 Lembrete: '{}' em {} dias — {} às {:02}:{:02}.",
                event.title,
                lead_days,
                event_date.format("%d/%m"),
                local_start.hour(),
                local_start.minute(),
            );
            out.push(AlertCandidate::new(&subject.id, AlertKind::EventUpcoming, dedup_key, message));
        }
        out
    }
}

/// Same-day stage: fires within the tolerance window around the event's
/// exact start instant. Skips events already flagged as dispatched.
pub struct EventDueProducer;

impl AlertProducer for EventDueProducer {
    fn name(&self) -> &'static str {
        "events-due"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let tolerance = chrono::Duration::minutes(ctx.config.events.same_day_tolerance_min);
        let mut out = Vec::new();
        for event in &state.events {
            if event.dispatched {
                continue;
            }
            let delta = ctx.time.now_utc.signed_duration_since(event.starts_at);
            if delta < -tolerance || delta > tolerance {
                continue;
            }
            let local_start = event.starts_at.with_timezone(&ctx.time.tz);
            let dedup_key = format!("{}-same-day", event.id);
            let message = format!(
                "⏰ Agora: '{}' às {:02}:{:02}.",
                event.title,
                local_start.hour(),
                local_start.minute(),
            );
            out.push(
                AlertCandidate::new(&subject.id, AlertKind::EventToday, dedup_key, message)
                    .with_entity(&event.id),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producers::testctx;
    use chrono::{TimeZone, Utc};
    use rotina_core::config::RotinaConfig;
    use rotina_core::types::CalendarEvent;

    fn subject() -> Subject {
        Subject {
            id: "u1".into(),
            name: "Ana".into(),
            phone: "11988887777".into(),
            active: true,
        }
    }

    fn event(id: &str, starts_at: chrono::DateTime<Utc>, dispatched: bool) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            title: "Dentista".into(),
            starts_at,
            dispatched,
        }
    }

    #[test]
    fn lead_stage_fires_only_in_morning_window_two_days_before() {
        let config = RotinaConfig::default(); // morning 08:00–08:30 local, lead 2
        // Event 2024-06-10 14:00 local (17:00 UTC).
        let starts = Utc.with_ymd_and_hms(2024, 6, 10, 17, 0, 0).unwrap();
        let state = DomainSnapshot { events: vec![event("evt-42", starts, false)], ..Default::default() };

        // 2024-06-08 08:10 local (11:10 UTC) → fires.
        let now = Utc.with_ymd_and_hms(2024, 6, 8, 11, 10, 0).unwrap();
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        let cands = EventLeadProducer.evaluate(&subject(), &ctx, &state);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].dedup_key, "evt-42-lead");

        // Same local minute one day earlier → wrong distance, quiet.
        let now = Utc.with_ymd_and_hms(2024, 6, 7, 11, 10, 0).unwrap();
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        assert!(EventLeadProducer.evaluate(&subject(), &ctx, &state).is_empty());

        // Right day, 09:00 local → outside the morning window.
        let now = Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap();
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        assert!(EventLeadProducer.evaluate(&subject(), &ctx, &state).is_empty());
    }

    #[test]
    fn due_stage_respects_tolerance_and_dispatched_flag() {
        let config = RotinaConfig::default(); // tolerance ±10 min
        let starts = Utc.with_ymd_and_hms(2024, 6, 10, 17, 0, 0).unwrap();
        let state = DomainSnapshot { events: vec![event("evt-42", starts, false)], ..Default::default() };

        // 5 minutes before start → fires, carrying the event id.
        let now = starts - chrono::Duration::minutes(5);
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        let cands = EventDueProducer.evaluate(&subject(), &ctx, &state);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].dedup_key, "evt-42-same-day");
        assert_eq!(cands[0].entity_id.as_deref(), Some("evt-42"));

        // 30 minutes late → outside tolerance.
        let now = starts + chrono::Duration::minutes(30);
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        assert!(EventDueProducer.evaluate(&subject(), &ctx, &state).is_empty());

        // Already dispatched → quiet even on time.
        let state = DomainSnapshot { events: vec![event("evt-42", starts, true)], ..Default::default() };
        let now = starts;
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        assert!(EventDueProducer.evaluate(&subject(), &ctx, &state).is_empty());
    }
}
