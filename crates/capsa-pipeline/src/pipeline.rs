use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use capsa_archive::CapsuleArchiver;
use capsa_blackboard::{Blackboard, MergePolicy, Operation};
use capsa_cas::{CasStore, MerkleBuilder};
use capsa_ledger::{Ledger, ValidationReport};
use capsa_types::{format_timestamp, Clock, Digest};

use crate::error::PipelineError;

/// Locations of every persisted artifact the pipeline touches.
#[derive(Clone, Debug)]
pub struct PipelinePaths {
    pub ledger: PathBuf,
    pub cas_dir: PathBuf,
    pub blackboard: PathBuf,
    pub merkle: PathBuf,
    pub archive_dir: PathBuf,
}

impl Default for PipelinePaths {
    fn default() -> Self {
        Self {
            ledger: "ledger_main.jsonl".into(),
            cas_dir: "cas".into(),
            blackboard: "mesh_blackboard.json".into(),
            merkle: "mesh_merkle.json".into(),
            archive_dir: "archives".into(),
        }
    }
}

/// One capsule to process.
#[derive(Clone, Debug)]
pub struct CapsuleRequest {
    pub capsule_id: String,
    pub title: String,
    pub content: String,
    pub metadata: Option<Value>,
    pub extra_files: Vec<PathBuf>,
}

/// What a successful run produced.
#[derive(Clone, Debug, Serialize)]
pub struct CapsuleSummary {
    pub timestamp: String,
    pub capsule_id: String,
    pub content_sha256: Digest,
    pub merkle_root: Digest,
    pub archive_path: String,
    pub line_sha: Digest,
    pub file_hashes: BTreeMap<String, Digest>,
    pub status: String,
}

/// The composed capsule processor. Owns the ledger handle (and with it the
/// writer lock) for its whole lifetime.
pub struct Pipeline {
    store: CasStore,
    merkle: MerkleBuilder,
    archiver: CapsuleArchiver,
    blackboard: Blackboard,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    /// Open every component at the configured paths, creating directories
    /// and taking the ledger writer lock.
    pub fn open(paths: PipelinePaths, clock: Arc<dyn Clock>) -> Result<Self, PipelineError> {
        Ok(Self {
            store: CasStore::open(&paths.cas_dir)?,
            merkle: MerkleBuilder::new(&paths.merkle, clock.clone()),
            archiver: CapsuleArchiver::new(&paths.archive_dir, clock.clone()),
            blackboard: Blackboard::new(&paths.blackboard, clock.clone()),
            ledger: Ledger::open(&paths.ledger, clock.clone())?,
            clock,
        })
    }

    /// Select the blackboard merge policy (simplified by default).
    pub fn with_blackboard_policy(mut self, policy: MergePolicy) -> Self {
        self.blackboard.set_policy(policy);
        self
    }

    /// Run the full sequence for one capsule:
    /// store → compute merkle → archive → update blackboard → log ledger.
    ///
    /// No rollback: a failure at any step leaves the earlier side effects
    /// (stored blobs, merkle summary, archive) in place and returns the
    /// error instead of a partial summary.
    pub fn process_capsule(
        &mut self,
        request: CapsuleRequest,
    ) -> Result<CapsuleSummary, PipelineError> {
        let started = format_timestamp(self.clock.now());
        tracing::info!(capsule_id = %request.capsule_id, "processing capsule");

        // Store: content first, then each extra file that exists. Missing
        // auxiliary files are skipped, not raised.
        let content_hash = self
            .store
            .store(request.content.as_bytes(), &format!("{}.txt", request.capsule_id))?;

        let mut file_hashes: BTreeMap<String, Digest> = BTreeMap::new();
        for path in &request.extra_files {
            if path.exists() {
                let digest = self.store.store_file(path)?;
                file_hashes.insert(path.display().to_string(), digest);
            } else {
                tracing::warn!(path = %path.display(), "auxiliary file missing, excluded");
            }
        }

        // Compute merkle over the whole store and persist the summary.
        let merkle_root = self.merkle.snapshot(&self.store)?.root_hash;

        // Archive the entries this capsule just stored.
        let mut members: BTreeSet<PathBuf> =
            self.store.paths_for(&content_hash)?.into_iter().collect();
        for (source, digest) in &file_hashes {
            let filename = PathBuf::from(source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            members.insert(self.store.entry_path(digest, &filename));
        }
        let members: Vec<PathBuf> = members.into_iter().collect();
        let receipt = self.archiver.archive(&request.capsule_id, &members)?;

        let archive_path = receipt.archive_path.display().to_string();
        self.ledger.append(
            "capsule_archived",
            json!({
                "capsule_id": &request.capsule_id,
                "archive_path": &archive_path,
                "file_count": receipt.file_count,
                "archive_hash": receipt.archive_hash,
            }),
            None,
        )?;

        // Update blackboard with the capsule's identity and hashes.
        let metadata = request.metadata.unwrap_or_else(|| json!({}));
        let capsule_data = json!({
            "title": &request.title,
            "content_hash": content_hash,
            "file_hashes": &file_hashes,
            "metadata": &metadata,
        });
        self.blackboard
            .update(&request.capsule_id, Operation::Add, capsule_data)?;

        // Seal the processed event into the ledger.
        let line_sha = self.ledger.append(
            "capsule_processed",
            json!({
                "capsule_id": &request.capsule_id,
                "title": &request.title,
                "content_hash": content_hash,
                "file_hashes": &file_hashes,
                "merkle_root": merkle_root,
                "archive_path": &archive_path,
                "metadata": &metadata,
            }),
            Some(json!({
                "component": "capsa-pipeline",
                "version": env!("CARGO_PKG_VERSION"),
                "operation": "process_capsule",
            })),
        )?;

        Ok(CapsuleSummary {
            timestamp: started,
            capsule_id: request.capsule_id,
            content_sha256: content_hash,
            merkle_root,
            archive_path,
            line_sha,
            file_hashes,
            status: "success".into(),
        })
    }

    /// Validate the full ledger chain (validate-only mode).
    pub fn validate_ledger(&self) -> Result<ValidationReport, PipelineError> {
        Ok(self.ledger.validate()?)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn store(&self) -> &CasStore {
        &self.store
    }
}
