//! Content-addressed storage for Capsa.
//!
//! A [`CasStore`] keeps raw byte blobs in a flat directory, each named
//! `{sha256-hex}_{original-filename}`. The [`MerkleBuilder`] folds the
//! store's current listing into one root digest and persists an advisory
//! summary. Entries are immutable once written; cleanup is external.

pub mod error;
pub mod merkle;
pub mod store;

pub use error::CasError;
pub use merkle::{fold_root, MerkleBuilder, MerkleSummary};
pub use store::CasStore;
