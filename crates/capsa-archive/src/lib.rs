//! Atomic capsule archiving for Capsa.
//!
//! A [`CapsuleArchiver`] bundles a capsule's stored files into one zip named
//! `{capsule_id}_{YYYYmmdd_HHMMSS}.zip`. The zip is built in a temp file in
//! the target directory and renamed into place, so a partial archive is
//! never visible under the final name; any failure removes the temp file and
//! propagates.

pub mod error;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use capsa_types::{format_compact, Clock, Digest, StreamingHasher};

pub use error::ArchiveError;

/// What an archive run produced. The caller appends the `capsule_archived`
/// ledger event from these fields.
#[derive(Clone, Debug)]
pub struct ArchiveReceipt {
    pub archive_path: PathBuf,
    /// Members actually written into the zip.
    pub file_count: u64,
    /// Streamed SHA-256 of the finished archive file.
    pub archive_hash: Digest,
}

/// Builds capsule archives in one directory.
pub struct CapsuleArchiver {
    archive_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl CapsuleArchiver {
    pub fn new(archive_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            clock,
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Archive the given paths for `capsule_id`.
    ///
    /// Missing paths are silently skipped, not an error. Surviving paths are
    /// written as deflate-compressed entries named by file name. An empty
    /// surviving set still produces a (valid, empty) archive.
    pub fn archive(
        &self,
        capsule_id: &str,
        file_paths: &[PathBuf],
    ) -> Result<ArchiveReceipt, ArchiveError> {
        std::fs::create_dir_all(&self.archive_dir)?;

        let mut members = Vec::new();
        for path in file_paths {
            if path.exists() {
                members.push(path.clone());
            } else {
                tracing::warn!(path = %path.display(), "skipping missing capsule file");
            }
        }

        let archive_name = format!("{capsule_id}_{}.zip", format_compact(self.clock.now()));
        let archive_path = self.archive_dir.join(&archive_name);

        // Built in a temp file beside the target; dropped (and deleted) on
        // any failure before the atomic rename.
        let mut temp = tempfile::NamedTempFile::new_in(&self.archive_dir)?;
        write_zip(temp.as_file_mut(), &members)?;
        temp.persist(&archive_path).map_err(|e| ArchiveError::Io(e.error))?;

        let archive_hash = StreamingHasher::hash_file(&archive_path)?;
        tracing::info!(
            archive = %archive_path.display(),
            members = members.len(),
            hash = %archive_hash.short_hex(),
            "capsule archived"
        );

        Ok(ArchiveReceipt {
            archive_path,
            file_count: members.len() as u64,
            archive_hash,
        })
    }
}

fn write_zip(file: &mut File, members: &[PathBuf]) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in members {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(name, options)?;
        std::io::copy(&mut File::open(path)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use capsa_types::FixedClock;

    use super::*;

    fn archiver(dir: &tempfile::TempDir) -> CapsuleArchiver {
        CapsuleArchiver::new(
            dir.path().join("archives"),
            Arc::new(FixedClock::default_epoch()),
        )
    }

    fn write_source(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn archive_name_follows_convention() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "a.txt", b"content");
        let receipt = archiver(&dir).archive("cap1", &[source]).unwrap();

        let name = receipt.archive_path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "cap1_20240101_000000.zip");
    }

    #[test]
    fn archive_contains_members_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_source(&dir, "a.txt", b"alpha");
        let b = write_source(&dir, "b.txt", b"bravo");
        let receipt = archiver(&dir).archive("cap1", &[a, b]).unwrap();
        assert_eq!(receipt.file_count, 2);

        let mut zip = zip::ZipArchive::new(File::open(&receipt.archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut contents = String::new();
        zip.by_name("a.txt").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "alpha");
    }

    #[test]
    fn missing_paths_are_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_source(&dir, "here.txt", b"x");
        let missing = dir.path().join("gone.txt");
        let receipt = archiver(&dir).archive("cap1", &[present, missing]).unwrap();
        assert_eq!(receipt.file_count, 1);
    }

    #[test]
    fn receipt_hash_matches_archive_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "a.txt", b"data");
        let receipt = archiver(&dir).archive("cap1", &[source]).unwrap();

        let bytes = std::fs::read(&receipt.archive_path).unwrap();
        assert_eq!(receipt.archive_hash, Digest::from_bytes(&bytes));
    }

    #[test]
    fn interrupted_write_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = archiver(&dir);
        // A directory passes the existence filter but fails mid-copy,
        // aborting the zip build partway through.
        let bad = dir.path().join("not-a-file");
        std::fs::create_dir(&bad).unwrap();
        let good = write_source(&dir, "good.txt", b"x");

        let result = archiver.archive("cap1", &[good, bad]);
        assert!(result.is_err());

        // No final archive and no leftover temp file.
        let leftovers: Vec<_> = std::fs::read_dir(archiver.archive_dir())
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn empty_member_set_still_produces_archive() {
        let dir = tempfile::tempdir().unwrap();
        let receipt = archiver(&dir).archive("cap1", &[]).unwrap();
        assert_eq!(receipt.file_count, 0);
        assert!(receipt.archive_path.exists());
    }
}
