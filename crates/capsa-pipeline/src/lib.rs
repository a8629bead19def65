//! Capsule processing orchestrator for Capsa.
//!
//! Composes the content-addressed store, Merkle builder, archiver,
//! blackboard, and ledger into one request/response operation:
//! [`Pipeline::process_capsule`]. The step order is fixed —
//! store, compute merkle, archive, update blackboard, log ledger — and
//! there is no compensating rollback: a failure surfaces as an error while
//! earlier side effects stay in place.

pub mod error;
pub mod pipeline;

pub use error::PipelineError;
pub use pipeline::{CapsuleRequest, CapsuleSummary, Pipeline, PipelinePaths};
