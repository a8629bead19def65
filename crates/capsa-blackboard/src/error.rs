use thiserror::Error;

/// Errors produced by blackboard operations.
#[derive(Debug, Error)]
pub enum BlackboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}
