//! Shared blackboard document for Capsa.
//!
//! A persisted JSON document combining a last-write-wins register with an
//! observed/removed set, updated per capsule id and replaced atomically on
//! every write. Two merge policies are supported:
//!
//! - [`MergePolicy::Simplified`] — the original semantics, bit-for-bit: the
//!   register is overwritten unconditionally and a remove never clears the
//!   `added` entry.
//! - [`MergePolicy::Tagged`] — causal semantics: entry timestamps act as
//!   per-operation tags, so a stale remove cannot clobber a newer add.

pub mod blackboard;
pub mod document;
pub mod error;

pub use blackboard::{Blackboard, MergePolicy};
pub use document::{BlackboardDocument, Operation, OrSet, RegisterEntry, SetEntry};
pub use error::BlackboardError;
