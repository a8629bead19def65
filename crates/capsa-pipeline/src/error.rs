use thiserror::Error;

use capsa_archive::ArchiveError;
use capsa_blackboard::BlackboardError;
use capsa_cas::CasError;
use capsa_ledger::LedgerError;

/// Errors surfaced by a pipeline run. Missing *auxiliary* files are not
/// here: they are skipped, not raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no capsule content provided")]
    MissingContent,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Cas(#[from] CasError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("blackboard error: {0}")]
    Blackboard(#[from] BlackboardError),
}
