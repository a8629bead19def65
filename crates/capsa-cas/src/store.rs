use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use capsa_types::{Digest, StreamingHasher};

use crate::error::CasError;

/// Read/write buffer size for streamed stores.
const CHUNK_SIZE: usize = 8192;

/// Flat-directory content-addressed store.
///
/// Entries are keyed by the SHA-256 of their bytes but named
/// `{digest}_{filename}`, so identical bytes stored under two names yield two
/// files. Entries are never mutated or deleted here.
pub struct CasStore {
    dir: PathBuf,
}

impl CasStore {
    /// Open the store at `dir`, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CasError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an entry with this digest and name would occupy.
    pub fn entry_path(&self, digest: &Digest, filename: &str) -> PathBuf {
        self.dir.join(format!("{digest}_{filename}"))
    }

    /// Store in-memory bytes under `filename` and return their digest.
    /// An existing entry with the same digest and name is overwritten.
    pub fn store(&self, bytes: &[u8], filename: &str) -> Result<Digest, CasError> {
        let digest = Digest::from_bytes(bytes);
        let path = self.entry_path(&digest, filename);
        std::fs::write(&path, bytes)?;
        tracing::debug!(digest = %digest.short_hex(), filename, "stored blob");
        Ok(digest)
    }

    /// Store a file's contents, streaming in fixed-size chunks so large
    /// blobs never sit fully in memory. The bytes flow through the hasher
    /// into a temp file in the store directory; once the digest is known the
    /// temp file is persisted under its final name.
    pub fn store_file(&self, source: &Path) -> Result<Digest, CasError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CasError::InvalidFilename(source.display().to_string()))?
            .to_owned();

        let mut reader = File::open(source)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        let mut hasher = StreamingHasher::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            temp.write_all(&buf[..n])?;
        }
        temp.flush()?;

        let digest = hasher.finalize();
        let path = self.entry_path(&digest, &filename);
        temp.persist(&path).map_err(|e| CasError::Io(e.error))?;
        tracing::debug!(digest = %digest.short_hex(), filename, "stored file");
        Ok(digest)
    }

    /// Plain retrieval. Callers may re-verify the digest themselves.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, CasError> {
        Ok(std::fs::read(path)?)
    }

    /// All entries, lexicographic by file name. This ordering is what the
    /// Merkle builder folds over.
    pub fn entries(&self) -> Result<Vec<PathBuf>, CasError> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
        Ok(entries)
    }

    /// Entries whose name carries the given digest prefix.
    pub fn paths_for(&self, digest: &Digest) -> Result<Vec<PathBuf>, CasError> {
        let prefix = format!("{digest}_");
        Ok(self
            .entries()?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect())
    }
}
