use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest as _, Sha256};

use crate::digest::Digest;

/// Read buffer size for streamed hashing.
const CHUNK_SIZE: usize = 8192;

/// Incremental SHA-256 hasher for inputs that should not be buffered whole.
///
/// Large blobs (CAS entries, finished archives) are hashed in fixed-size
/// chunks so memory use stays flat regardless of input size.
pub struct StreamingHasher {
    inner: Sha256,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed a chunk of input.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and produce the digest.
    pub fn finalize(self) -> Digest {
        Digest::from_hash(self.inner.finalize().into())
    }

    /// Hash everything a reader produces, in fixed-size chunks.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
        let mut hasher = Self::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Hash a file's full contents without loading it into memory.
    pub fn hash_file(path: &Path) -> io::Result<Digest> {
        Self::hash_reader(File::open(path)?)
    }
}

impl Default for StreamingHasher {
    fn default() -> Self {
        Self::new()
    }
}
