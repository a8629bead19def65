use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use capsa_types::{format_timestamp, Clock, Digest, StreamingHasher};

use crate::error::CasError;
use crate::store::CasStore;

/// Advisory snapshot of the store's Merkle state.
///
/// Derived, never authoritative: the real root is always recomputed from the
/// store's current listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleSummary {
    pub timestamp: String,
    pub root_hash: Digest,
    pub file_count: u64,
}

/// Folds the CAS listing into one root digest and persists summaries.
pub struct MerkleBuilder {
    summary_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl MerkleBuilder {
    pub fn new(summary_path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            summary_path: summary_path.into(),
            clock,
        }
    }

    /// Compute the Merkle root over the store's entries in lexicographic
    /// filename order. Leaves are the streamed digests of each entry's full
    /// contents. An empty store yields the zero digest.
    pub fn compute_root(&self, store: &CasStore) -> Result<Digest, CasError> {
        let mut leaves = Vec::new();
        for path in store.entries()? {
            leaves.push(StreamingHasher::hash_file(&path)?);
        }
        Ok(fold_root(&leaves))
    }

    /// Recompute the root and persist an advisory summary atomically.
    pub fn snapshot(&self, store: &CasStore) -> Result<MerkleSummary, CasError> {
        let root_hash = self.compute_root(store)?;
        let file_count = store.entries()?.len() as u64;
        let summary = MerkleSummary {
            timestamp: format_timestamp(self.clock.now()),
            root_hash,
            file_count,
        };
        self.write_summary(&summary)?;
        tracing::debug!(root = %root_hash.short_hex(), file_count, "merkle snapshot written");
        Ok(summary)
    }

    /// Load the last persisted summary, if one exists.
    pub fn load_summary(&self) -> Result<Option<MerkleSummary>, CasError> {
        match std::fs::read_to_string(&self.summary_path) {
            Ok(contents) => Ok(Some(
                serde_json::from_str(&contents)
                    .map_err(|e| CasError::Serialization(e.to_string()))?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_summary(&self, summary: &MerkleSummary) -> Result<(), CasError> {
        let parent = self
            .summary_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;

        let contents = serde_json::to_string_pretty(summary)
            .map_err(|e| CasError::Serialization(e.to_string()))?;
        let temp = tempfile::NamedTempFile::new_in(&parent)?;
        std::fs::write(temp.path(), contents)?;
        temp.persist(&self.summary_path)
            .map_err(|e| CasError::Io(e.error))?;
        Ok(())
    }
}

/// Pairwise fold: combine adjacent digests, duplicating the last element of
/// an odd level, until one digest remains. Combining hashes the
/// concatenation of the two 64-char hex strings.
pub fn fold_root(leaves: &[Digest]) -> Digest {
    if leaves.is_empty() {
        return Digest::zero();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                if pair.len() == 2 {
                    combine(&pair[0], &pair[1])
                } else {
                    combine(&pair[0], &pair[0])
                }
            })
            .collect();
    }
    level[0]
}

fn combine(left: &Digest, right: &Digest) -> Digest {
    Digest::from_bytes(format!("{left}{right}").as_bytes())
}
