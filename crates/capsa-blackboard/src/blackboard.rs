use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use capsa_types::{format_timestamp, Clock};

use crate::document::{BlackboardDocument, Operation, RegisterEntry, SetEntry};
use crate::error::BlackboardError;

/// How concurrent adds and removes for the same id are reconciled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Original behavior: unconditional register overwrite; a remove only
    /// grows the `removed` map and never touches `added`.
    #[default]
    Simplified,
    /// Causal behavior: timestamps are per-operation tags. Writes only win
    /// over older entries, and a remove clears the `added` entry it
    /// observed.
    Tagged,
}

/// Handle over one persisted blackboard document.
///
/// Every update loads the current document (or initializes an empty one),
/// applies the operation under the configured policy, and writes the whole
/// document back via temp-file-and-rename.
pub struct Blackboard {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    policy: MergePolicy,
}

impl Blackboard {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            policy: MergePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: MergePolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Load the current document; a missing file is an empty document.
    pub fn load(&self) -> Result<BlackboardDocument, BlackboardError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| BlackboardError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(BlackboardDocument::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply one add/remove for `capsule_id` and persist atomically.
    pub fn update(
        &self,
        capsule_id: &str,
        operation: Operation,
        data: Value,
    ) -> Result<(), BlackboardError> {
        let mut doc = self.load()?;
        let timestamp = format_timestamp(self.clock.now());

        match self.policy {
            MergePolicy::Simplified => {
                apply_simplified(&mut doc, capsule_id, operation, &timestamp, data)
            }
            MergePolicy::Tagged => {
                apply_tagged(&mut doc, capsule_id, operation, &timestamp, data)
            }
        }

        self.persist(&doc)?;
        tracing::debug!(capsule_id, %operation, policy = ?self.policy, "blackboard updated");
        Ok(())
    }

    fn persist(&self, doc: &BlackboardDocument) -> Result<(), BlackboardError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;

        let contents = serde_json::to_string_pretty(doc)
            .map_err(|e| BlackboardError::Serialization(e.to_string()))?;
        let temp = tempfile::NamedTempFile::new_in(&parent)?;
        std::fs::write(temp.path(), contents)?;
        temp.persist(&self.path)
            .map_err(|e| BlackboardError::Io(e.error))?;
        Ok(())
    }
}

fn apply_simplified(
    doc: &mut BlackboardDocument,
    capsule_id: &str,
    operation: Operation,
    timestamp: &str,
    data: Value,
) {
    doc.lww_register.insert(
        capsule_id.to_owned(),
        RegisterEntry {
            timestamp: timestamp.to_owned(),
            operation,
            data: data.clone(),
        },
    );

    let entry = SetEntry {
        timestamp: timestamp.to_owned(),
        data,
    };
    match operation {
        Operation::Add => {
            doc.or_set.added.insert(capsule_id.to_owned(), entry);
            doc.or_set.removed.remove(capsule_id);
        }
        Operation::Remove => {
            // The added entry is deliberately left in place; consumers apply
            // their own precedence rule.
            doc.or_set.removed.insert(capsule_id.to_owned(), entry);
        }
    }
}

fn apply_tagged(
    doc: &mut BlackboardDocument,
    capsule_id: &str,
    operation: Operation,
    timestamp: &str,
    data: Value,
) {
    let newer_than = |existing: Option<&String>| existing.map_or(true, |t| t.as_str() <= timestamp);

    if newer_than(doc.lww_register.get(capsule_id).map(|e| &e.timestamp)) {
        doc.lww_register.insert(
            capsule_id.to_owned(),
            RegisterEntry {
                timestamp: timestamp.to_owned(),
                operation,
                data: data.clone(),
            },
        );
    }

    let entry = SetEntry {
        timestamp: timestamp.to_owned(),
        data,
    };
    match operation {
        Operation::Add => {
            if newer_than(doc.or_set.added.get(capsule_id).map(|e| &e.timestamp)) {
                doc.or_set.added.insert(capsule_id.to_owned(), entry);
            }
            // Only discharge removals this add has causally observed.
            if doc
                .or_set
                .removed
                .get(capsule_id)
                .is_some_and(|e| e.timestamp.as_str() < timestamp)
            {
                doc.or_set.removed.remove(capsule_id);
            }
        }
        Operation::Remove => {
            if newer_than(doc.or_set.removed.get(capsule_id).map(|e| &e.timestamp)) {
                doc.or_set.removed.insert(capsule_id.to_owned(), entry);
            }
            if doc
                .or_set
                .added
                .get(capsule_id)
                .is_some_and(|e| e.timestamp.as_str() <= timestamp)
            {
                doc.or_set.added.remove(capsule_id);
            }
        }
    }
}
