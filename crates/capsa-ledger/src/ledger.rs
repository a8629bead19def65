use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde_json::{Map, Value};

use capsa_types::{format_timestamp, Clock, Digest};

use crate::error::LedgerError;
use crate::record::{seal, LedgerRecord, GENESIS};
use crate::validation::{self, ValidationReport};

/// Owning handle over one ledger file.
///
/// The handle holds the file open for append together with an exclusive
/// advisory lock for its whole lifetime, so the read-tail-then-append
/// sequence cannot interleave with another writer. The tail seal is cached
/// at open and maintained on every append; the file is never re-read on the
/// append path.
pub struct Ledger {
    path: PathBuf,
    file: File,
    tail: Digest,
    records: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("path", &self.path)
            .field("tail", &self.tail)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Open (creating if absent) the ledger at `path` and take the writer
    /// lock. Fails with [`LedgerError::Locked`] if another handle holds it.
    ///
    /// Existing lines are scanned once to recover the tail seal. An empty or
    /// unreadable tail degrades to the genesis hash rather than failing:
    /// corruption is surfaced by [`Ledger::validate`], not by open.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked { path: path.clone() })?;

        let (tail, records) = recover_tail(&path)?;
        tracing::debug!(path = %path.display(), records, tail = %tail.short_hex(), "ledger opened");

        Ok(Self {
            path,
            file,
            tail,
            records,
            clock,
        })
    }

    /// Seal of the most recent record, or genesis when the ledger is empty.
    pub fn tail_sha(&self) -> Digest {
        self.tail
    }

    /// Number of records appended so far.
    pub fn len(&self) -> u64 {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sealed record and return its `line_sha`.
    ///
    /// The record commits to the cached tail seal (`prev_hash`), is sealed
    /// over its canonical serialization, and is written as a single line.
    /// Prior lines are never touched.
    pub fn append(
        &mut self,
        event_type: &str,
        data: Value,
        provenance: Option<Value>,
    ) -> Result<Digest, LedgerError> {
        let mut record = Map::new();
        record.insert(
            "timestamp".into(),
            Value::String(format_timestamp(self.clock.now())),
        );
        record.insert("event_type".into(), Value::String(event_type.into()));
        record.insert("data".into(), data);
        record.insert(
            "provenance".into(),
            provenance.unwrap_or_else(|| Value::Object(Map::new())),
        );
        record.insert("prev_hash".into(), Value::String(self.tail.to_hex()));

        let line_sha = seal(&Value::Object(record.clone()));
        record.insert("line_sha".into(), Value::String(line_sha.to_hex()));

        let line = Value::Object(record).to_string();
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;

        self.tail = line_sha;
        self.records += 1;
        tracing::debug!(event_type, seq = self.records, seal = %line_sha.short_hex(), "record appended");

        Ok(line_sha)
    }

    /// Validate the whole chain from line 1, reporting the first violation.
    pub fn validate(&self) -> Result<ValidationReport, LedgerError> {
        validation::validate_file(&self.path)
    }

    /// Read every record back for consumers. Blank lines are skipped; a line
    /// that fails to parse is a hard error.
    pub fn records(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LedgerRecord = serde_json::from_str(&line)
                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Scan the file once and return (tail seal, record count).
fn recover_tail(path: &Path) -> Result<(Digest, u64), LedgerError> {
    let reader = BufReader::new(File::open(path)?);
    let mut tail = GENESIS;
    let mut records = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records += 1;
        // Permissive recovery: an unreadable tail degrades to genesis.
        tail = serde_json::from_str::<Value>(&line)
            .ok()
            .and_then(|v| v.get("line_sha").and_then(Value::as_str).map(str::to_owned))
            .and_then(|s| Digest::from_hex(&s).ok())
            .unwrap_or(GENESIS);
    }
    Ok((tail, records))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use capsa_types::FixedClock;

    use super::*;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::default_epoch())
    }

    fn temp_ledger(dir: &tempfile::TempDir) -> Ledger {
        Ledger::open(dir.path().join("ledger.jsonl"), clock()).unwrap()
    }

    #[test]
    fn first_record_commits_to_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = temp_ledger(&dir);
        ledger.append("created", json!({"k": 1}), None).unwrap();

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prev_hash, GENESIS);
        assert_eq!(records[0].prev_hash.to_hex(), "0".repeat(64));
    }

    #[test]
    fn appends_chain_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = temp_ledger(&dir);
        let mut last = GENESIS;
        for i in 0..10 {
            last = ledger.append("event", json!({"i": i}), None).unwrap();
        }
        assert_eq!(ledger.tail_sha(), last);
        assert_eq!(ledger.len(), 10);

        let report = ledger.validate().unwrap();
        assert!(report.is_valid());
        assert_eq!(report.records, 10);

        let records = ledger.records().unwrap();
        for pair in records.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].line_sha);
        }
    }

    #[test]
    fn append_returns_seal_of_written_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = temp_ledger(&dir);
        let sha = ledger.append("event", json!({"x": true}), None).unwrap();
        let records = ledger.records().unwrap();
        assert_eq!(records[0].line_sha, sha);
        assert_eq!(records[0].compute_seal().unwrap(), sha);
    }

    #[test]
    fn provenance_defaults_to_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = temp_ledger(&dir);
        ledger.append("event", json!({}), None).unwrap();
        let records = ledger.records().unwrap();
        assert_eq!(records[0].provenance, json!({}));
    }

    #[test]
    fn reopen_resumes_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let first = {
            let mut ledger = Ledger::open(&path, clock()).unwrap();
            ledger.append("a", json!({}), None).unwrap()
        };

        let mut ledger = Ledger::open(&path, clock()).unwrap();
        assert_eq!(ledger.tail_sha(), first);
        ledger.append("b", json!({}), None).unwrap();

        let records = ledger.records().unwrap();
        assert_eq!(records[1].prev_hash, first);
        assert!(ledger.validate().unwrap().is_valid());
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let _ledger = Ledger::open(&path, clock()).unwrap();
        let err = Ledger::open(&path, clock()).unwrap_err();
        assert!(matches!(err, LedgerError::Locked { .. }));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        drop(Ledger::open(&path, clock()).unwrap());
        assert!(Ledger::open(&path, clock()).is_ok());
    }

    #[test]
    fn deterministic_with_fixed_clock() {
        let dir = tempfile::tempdir().unwrap();
        let a = {
            let mut l = Ledger::open(dir.path().join("a.jsonl"), clock()).unwrap();
            l.append("e", json!({"v": 1}), Some(json!({"p": 2}))).unwrap()
        };
        let b = {
            let mut l = Ledger::open(dir.path().join("b.jsonl"), clock()).unwrap();
            l.append("e", json!({"v": 1}), Some(json!({"p": 2}))).unwrap()
        };
        assert_eq!(a, b);
    }
}
