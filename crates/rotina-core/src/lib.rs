//! # Rotina Core
//!
//! Shared foundation for the Rotina notification engine: error taxonomy,
//! configuration, the alert data model, and fixed-timezone clock/window
//! resolution. Everything else in the workspace builds on this crate.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock, TimeContext, TimeWindow, WindowSet};
pub use config::RotinaConfig;
pub use error::{Result, RotinaError};
pub use types::{
    AlertCandidate, AlertKind, AlertRecord, CalendarEvent, CustomReminder, DailyGoals,
    DeliveryResult, DiaryEntry, DomainSnapshot, RecordStatus, Subject, WorkoutSlot,
};
