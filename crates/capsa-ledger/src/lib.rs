//! Append-only hash-chained ledger for Capsa.
//!
//! This crate is the heart of the provenance system. It provides:
//! - `LedgerRecord` with canonical serialization and a SHA-256 seal
//! - `Ledger` handle owning the file and an exclusive advisory lock
//! - Chain-linked `append` that never re-reads the tail
//! - Full-file integrity validation reporting the first failing line

pub mod error;
pub mod ledger;
pub mod record;
pub mod validation;

pub use error::LedgerError;
pub use ledger::Ledger;
pub use record::{canonical_json, seal, LedgerRecord, GENESIS};
pub use validation::{ValidationReport, Violation, ViolationKind};
