use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The add/remove verb carried by a blackboard update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Last-write-wins cell for one capsule id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub timestamp: String,
    pub operation: Operation,
    pub data: Value,
}

/// One observed addition or removal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub timestamp: String,
    pub data: Value,
}

/// Observed/removed set. Additions and removals are tracked separately; an
/// id can sit in both maps, and consumers apply their own precedence rule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrSet {
    pub added: BTreeMap<String, SetEntry>,
    pub removed: BTreeMap<String, SetEntry>,
}

/// The whole persisted blackboard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlackboardDocument {
    pub lww_register: BTreeMap<String, RegisterEntry>,
    pub or_set: OrSet,
}

impl BlackboardDocument {
    /// "Removed wins if newer" presence check for consumers. Timestamps are
    /// fixed-width ISO-8601 strings, so lexicographic comparison is temporal
    /// comparison.
    pub fn is_present(&self, capsule_id: &str) -> bool {
        match (
            self.or_set.added.get(capsule_id),
            self.or_set.removed.get(capsule_id),
        ) {
            (Some(added), Some(removed)) => removed.timestamp <= added.timestamp,
            (Some(_), None) => true,
            _ => false,
        }
    }
}
