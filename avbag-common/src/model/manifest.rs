//! BagIt manifest files
//!
//! `manifest-<algo>.txt` and `tagmanifest-<algo>.txt` share one line
//! format: lowercase hex checksum, two spaces, path relative to the bag
//! root with `/` separators. Payload manifest paths always start with
//! `data/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::checksum::Algorithm;
use crate::error::{Error, Result};

/// One manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Lowercase hex digest
    pub checksum: String,
    /// Bag-root-relative path with `/` separators
    pub relpath: String,
}

/// A parsed manifest or tagmanifest file
#[derive(Debug, Clone)]
pub struct Manifest {
    pub algorithm: Algorithm,
    /// Entries in file order, duplicates included
    pub entries: Vec<ManifestEntry>,
    /// Paths listed more than once, in first-seen order
    pub duplicates: Vec<String>,
}

impl Manifest {
    /// Parse manifest content.
    ///
    /// Blank lines are skipped. A line without the two-space separator or
    /// with a digest of the wrong length for the algorithm fails the whole
    /// parse; the caller reports the file as unreadable rather than
    /// guessing at intent.
    pub fn parse(algorithm: Algorithm, content: &str) -> Result<Manifest> {
        let mut entries = Vec::new();
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        let mut duplicates = Vec::new();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let (checksum, relpath) = line.split_once("  ").ok_or_else(|| Error::TagFile {
                path: algorithm.manifest_name().into(),
                reason: format!("line {}: missing two-space separator", lineno + 1),
            })?;

            let checksum = checksum.trim().to_ascii_lowercase();
            let relpath = relpath.trim().to_string();

            if checksum.len() != algorithm.hex_len()
                || !checksum.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(Error::TagFile {
                    path: algorithm.manifest_name().into(),
                    reason: format!("line {}: malformed {} digest", lineno + 1, algorithm),
                });
            }
            if relpath.is_empty() {
                return Err(Error::TagFile {
                    path: algorithm.manifest_name().into(),
                    reason: format!("line {}: empty path", lineno + 1),
                });
            }

            let count = seen.entry(relpath.clone()).or_insert(0);
            *count += 1;
            if *count == 2 {
                duplicates.push(relpath.clone());
            }

            entries.push(ManifestEntry { checksum, relpath });
        }

        Ok(Manifest {
            algorithm,
            entries,
            duplicates,
        })
    }

    /// Load and parse a manifest file from disk.
    ///
    /// Parse errors carry the on-disk path rather than the generic
    /// manifest name.
    pub fn load(algorithm: Algorithm, path: &Path) -> Result<Manifest> {
        let content = fs::read_to_string(path).map_err(|e| Error::TagFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(algorithm, &content).map_err(|e| match e {
            Error::TagFile { reason, .. } => Error::TagFile {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Path → checksum map, last entry winning for duplicates
    pub fn checksums(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .map(|e| (e.relpath.as_str(), e.checksum.as_str()))
            .collect()
    }

    /// Render entries in canonical form: sorted by path, LF line endings.
    ///
    /// Used by repair when rewriting manifests wholesale.
    pub fn render(checksums: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for (relpath, checksum) in checksums {
            out.push_str(checksum);
            out.push_str("  ");
            out.push_str(relpath);
            out.push('\n');
        }
        out
    }
}
