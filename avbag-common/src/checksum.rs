//! File checksum primitives for manifest verification and repair
//!
//! Reads files in 1MB chunks so multi-gigabyte preservation masters hash
//! without loading into memory. Callers on the async runtime must wrap
//! these in `tokio::task::spawn_blocking`.

use md5::Md5;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Chunk size for streaming file reads (1MB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Checksum algorithms a bag may carry manifests for.
///
/// Vendor deliveries are manifested with md5; sha256 is accepted for bags
/// produced by newer bagging tools. A bag may carry both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha256,
}

impl Algorithm {
    /// All supported algorithms, in manifest-discovery order
    pub const ALL: [Algorithm; 2] = [Algorithm::Md5, Algorithm::Sha256];

    /// Lowercase name as it appears in manifest filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha256 => "sha256",
        }
    }

    /// Parse the algorithm segment of a manifest filename ("md5", "sha256")
    pub fn from_tag_name(name: &str) -> Option<Algorithm> {
        match name {
            "md5" => Some(Algorithm::Md5),
            "sha256" => Some(Algorithm::Sha256),
            _ => None,
        }
    }

    /// Payload manifest filename for this algorithm
    pub fn manifest_name(&self) -> String {
        format!("manifest-{}.txt", self.as_str())
    }

    /// Tag manifest filename for this algorithm
    pub fn tagmanifest_name(&self) -> String {
        format!("tagmanifest-{}.txt", self.as_str())
    }

    /// Length of the hex digest this algorithm produces
    pub fn hex_len(&self) -> usize {
        match self {
            Algorithm::Md5 => 32,
            Algorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming hasher dispatching over the algorithm enum
enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Md5 => Hasher::Md5(Md5::new()),
            Algorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Hash a byte slice, returning the lowercase hex digest
pub fn hash_bytes(algorithm: Algorithm, data: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// Hash a file's content in chunks, returning the lowercase hex digest.
///
/// Blocking; runs on the calling thread.
pub fn hash_file(algorithm: Algorithm, path: &Path) -> Result<String> {
    tracing::trace!(path = %path.display(), algorithm = %algorithm, "Hashing file");

    let mut file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {} for hashing: {}", path.display(), e),
        ))
    })?;

    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {} for hashing: {}", path.display(), e),
            ))
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize_hex())
}

/// Hash a batch of files on the rayon pool.
///
/// Results come back in input order, one per path, each carrying its own
/// `Result` so a single unreadable file does not abort the batch.
pub fn hash_files(algorithm: Algorithm, paths: &[PathBuf]) -> Vec<(PathBuf, Result<String>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), hash_file(algorithm, path)))
        .collect()
}
