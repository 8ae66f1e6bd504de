//! Core data model — subjects, alert candidates, ledger records, and the
//! read-only domain snapshot producers evaluate against.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// A user eligible to receive notifications.
///
/// Ownership of the flags lives in the CRUD layer — the engine only reads
/// them. `active` already folds in subscription/role state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    /// Outbound address (phone). Normalized only at dispatch time.
    pub phone: String,
    pub active: bool,
}

/// The domain an alert belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    LowBalance,
    CategorySpike,
    JunkFoodRepeat,
    LowProtein,
    GoalsMissed,
    MealMissing,
    EventUpcoming,
    EventToday,
    CustomReminder,
    WorkoutReminder,
}

impl AlertKind {
    /// Stable string form used in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowBalance => "low_balance",
            AlertKind::CategorySpike => "category_spike",
            AlertKind::JunkFoodRepeat => "junk_food_repeat",
            AlertKind::LowProtein => "low_protein",
            AlertKind::GoalsMissed => "goals_missed",
            AlertKind::MealMissing => "meal_missing",
            AlertKind::EventUpcoming => "event_upcoming",
            AlertKind::EventToday => "event_today",
            AlertKind::CustomReminder => "custom_reminder",
            AlertKind::WorkoutReminder => "workout_reminder",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "low_balance" => AlertKind::LowBalance,
            "category_spike" => AlertKind::CategorySpike,
            "junk_food_repeat" => AlertKind::JunkFoodRepeat,
            "low_protein" => AlertKind::LowProtein,
            "goals_missed" => AlertKind::GoalsMissed,
            "meal_missing" => AlertKind::MealMissing,
            "event_upcoming" => AlertKind::EventUpcoming,
            "event_today" => AlertKind::EventToday,
            "custom_reminder" => AlertKind::CustomReminder,
            "workout_reminder" => AlertKind::WorkoutReminder,
            _ => return None,
        })
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert a producer wants to send. Lives for one evaluation cycle,
/// never persisted directly.
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub subject_id: String,
    pub kind: AlertKind,
    /// Identifies the *occurrence* being alerted (e.g. "2024-05-200-150",
    /// "evt-42-same-day"). The ledger guarantees at most one successful
    /// send per (subject, kind, dedup_key).
    pub dedup_key: String,
    pub message: String,
    /// Backing entity when a follow-up write applies (calendar event id
    /// for the same-day stage).
    pub entity_id: Option<String>,
}

impl AlertCandidate {
    pub fn new(subject_id: &str, kind: AlertKind, dedup_key: String, message: String) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            kind,
            dedup_key,
            message,
            entity_id: None,
        }
    }

    pub fn with_entity(mut self, entity_id: &str) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }
}

/// Outcome of one outbound send attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub ok: bool,
    pub status_code: Option<u16>,
    /// Provider response body or transport error text, for audit records.
    pub raw: String,
}

impl DeliveryResult {
    pub fn failure(raw: impl Into<String>) -> Self {
        Self {
            ok: false,
            status_code: None,
            raw: raw.into(),
        }
    }
}

/// Ledger record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::Error => "error",
        }
    }
}

/// A persisted send record. Append-only; the system's only durable state.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub subject_id: String,
    pub kind: AlertKind,
    pub dedup_key: String,
    pub status: RecordStatus,
    pub detail: Option<String>,
    pub sent_at: DateTime<Utc>,
}

// ── Domain snapshot (read-only view of CRUD-owned state) ─────────────────

/// One food-diary line.
#[derive(Debug, Clone)]
pub struct DiaryEntry {
    pub date: NaiveDate,
    /// Meal label as entered ("Café da manhã", "Almoço", "Jantar"), if any.
    pub meal: Option<String>,
    pub description: String,
    pub calories: f64,
    pub protein_g: f64,
    pub water_ml: f64,
}

/// Per-subject daily targets.
#[derive(Debug, Clone)]
pub struct DailyGoals {
    pub calories: f64,
    pub protein_g: f64,
    pub water_ml: f64,
}

#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    /// Set by the engine after the same-day reminder succeeds.
    pub dispatched: bool,
}

/// User-authored fixed-time reminder.
#[derive(Debug, Clone)]
pub struct CustomReminder {
    pub id: String,
    pub label: String,
    pub time: NaiveTime,
}

/// One workout-schedule slot for a weekday.
#[derive(Debug, Clone)]
pub struct WorkoutSlot {
    pub weekday: Weekday,
    pub time: NaiveTime,
    pub label: String,
}

/// Everything a producer may look at for one subject, fetched once per
/// cycle. All fields are snapshots "as of now"; the engine never writes
/// back through this struct.
#[derive(Debug, Clone, Default)]
pub struct DomainSnapshot {
    /// Month-to-date balance. `None` when the subject has no transactions
    /// this month (a fresh ledger is not a low balance).
    pub month_balance: Option<f64>,
    /// Month-to-date expense totals per category.
    pub month_expenses: Vec<(String, f64)>,
    /// Food-diary entries over the last 7 days, today included.
    pub diary: Vec<DiaryEntry>,
    pub goals: Option<DailyGoals>,
    /// Calendar events from today up to the configured horizon.
    pub events: Vec<CalendarEvent>,
    pub reminders: Vec<CustomReminder>,
    /// Workout slots for today's weekday.
    pub workouts: Vec<WorkoutSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_kind_round_trips_through_ledger_form() {
        for kind in [
            AlertKind::LowBalance,
            AlertKind::CategorySpike,
            AlertKind::JunkFoodRepeat,
            AlertKind::LowProtein,
            AlertKind::GoalsMissed,
            AlertKind::MealMissing,
            AlertKind::EventUpcoming,
            AlertKind::EventToday,
            AlertKind::CustomReminder,
            AlertKind::WorkoutReminder,
        ] {
            assert_eq!(AlertKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AlertKind::parse("nope"), None);
    }

    #[test]
    fn candidate_entity_attachment() {
        let c = AlertCandidate::new("u1", AlertKind::EventToday, "evt-1-same-day".into(), "hi".into())
            .with_entity("evt-1");
        assert_eq!(c.entity_id.as_deref(), Some("evt-1"));
    }
}
