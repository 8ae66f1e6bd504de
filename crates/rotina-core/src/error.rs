//! Rotina error types.

use thiserror::Error;

/// All errors the notification engine can produce.
#[derive(Error, Debug)]
pub enum RotinaError {
    /// Configuration missing or invalid (bad timezone, empty token, ...).
    #[error("Config error: {0}")]
    Config(String),

    /// Domain-state or ledger read/write failure. Non-fatal to a cycle:
    /// the affected subject/candidate is skipped and evaluation continues.
    #[error("Store error: {0}")]
    Store(String),

    /// Ledger table missing the minimum columns. Drives the fallback table
    /// resolution; if both tables fail the ledger degrades to fail-open.
    #[error("Ledger schema error: {0}")]
    Schema(String),

    /// Outbound channel failure. Audited when possible, never escalated.
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RotinaError>;
