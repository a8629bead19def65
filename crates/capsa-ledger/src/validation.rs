use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use capsa_types::Digest;

use crate::error::LedgerError;
use crate::record::{seal, GENESIS};

/// Result of a full-chain validation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    /// Records checked before stopping (all of them when valid).
    pub records: u64,
    /// First violation found, if any. Validation stops at the first failure.
    pub violation: Option<Violation>,
}

impl ValidationReport {
    /// Returns `true` if the whole chain checked out.
    pub fn is_valid(&self) -> bool {
        self.violation.is_none()
    }
}

/// A specific integrity violation, pinned to its 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub line: u64,
    pub kind: ViolationKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// `prev_hash` does not match the previous line's seal.
    ChainBreak,
    /// Recomputed canonical hash does not match the stored `line_sha`.
    SealMismatch,
    /// The line is not a parseable record.
    MalformedRecord,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainBreak => write!(f, "prev_hash mismatch"),
            Self::SealMismatch => write!(f, "line_sha mismatch"),
            Self::MalformedRecord => write!(f, "malformed record"),
        }
    }
}

/// Validate every line of the ledger file at `path`.
///
/// For each non-blank line: parse, check the `prev_hash` link against the
/// previous line's seal (genesis for line 1), strip `line_sha`, recompute the
/// canonical hash, and compare. The first failure ends the pass. A missing
/// file is an empty, valid ledger.
pub fn validate_file(path: &Path) -> Result<ValidationReport, LedgerError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ValidationReport {
                records: 0,
                violation: None,
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut expected_prev = GENESIS;
    let mut records = 0u64;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_num = (index + 1) as u64;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records += 1;

        let fail = |kind| {
            tracing::warn!(line = line_num, %kind, "ledger integrity violation");
            Ok(ValidationReport {
                records,
                violation: Some(Violation {
                    line: line_num,
                    kind,
                }),
            })
        };

        let Ok(Value::Object(mut record)) = serde_json::from_str::<Value>(&line) else {
            return fail(ViolationKind::MalformedRecord);
        };

        let prev_hash = record
            .get("prev_hash")
            .and_then(Value::as_str)
            .and_then(|s| Digest::from_hex(s).ok());
        if prev_hash != Some(expected_prev) {
            return fail(ViolationKind::ChainBreak);
        }

        let Some(line_sha) = record
            .remove("line_sha")
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| Digest::from_hex(s).ok())
        else {
            return fail(ViolationKind::MalformedRecord);
        };

        if seal(&Value::Object(record)) != line_sha {
            return fail(ViolationKind::SealMismatch);
        }

        expected_prev = line_sha;
    }

    Ok(ValidationReport {
        records,
        violation: None,
    })
}
