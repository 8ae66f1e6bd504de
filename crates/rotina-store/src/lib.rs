//! # Rotina Store
//!
//! Persistence adapters: the idempotency [`Ledger`] (schema-discovering,
//! fail-open) and the read-only [`DomainStore`] contract with its SQLite
//! implementation.

pub mod domain;
pub mod ledger;

pub use domain::{DomainStore, SqliteDomain};
pub use ledger::{ColumnMap, Ledger, LedgerSchema, RecordOutcome};
