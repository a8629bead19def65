use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger is locked by another writer: {path}")]
    Locked { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}
