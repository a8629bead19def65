use thiserror::Error;

/// Errors produced by store and Merkle operations.
#[derive(Debug, Error)]
pub enum CasError {
    #[error("invalid source filename: {0}")]
    InvalidFilename(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}
