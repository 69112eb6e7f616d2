//! Bag handle: tag-file locations and payload enumeration
//!
//! A [`Bag`] is a directory on disk, valid or not. Opening one asserts
//! only that the directory exists; whether it is a well-formed bag is the
//! validators' call.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::checksum::Algorithm;
use crate::error::{Error, Result};
use crate::model::filename::is_hidden_name;
use crate::model::oxum::Oxum;

/// Required tag files at the bag root
pub const BAGIT_TXT: &str = "bagit.txt";
pub const BAG_INFO_TXT: &str = "bag-info.txt";
/// Payload directory name
pub const DATA_DIR: &str = "data";

/// `BagIt-Version: M.N` shape
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+$").expect("version regex is valid"));

// ============================================================================
// Bag Declaration (bagit.txt)
// ============================================================================

/// Parsed `bagit.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagDeclaration {
    pub version: String,
    pub encoding: String,
}

impl BagDeclaration {
    /// Parse bagit.txt content: exactly the two declaration fields.
    pub fn parse(content: &str) -> Result<BagDeclaration> {
        let mut version = None;
        let mut encoding = None;

        for raw in content.lines() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| Error::TagFile {
                path: BAGIT_TXT.into(),
                reason: format!("malformed line: {:?}", line),
            })?;
            match name.trim() {
                "BagIt-Version" => version = Some(value.trim().to_string()),
                "Tag-File-Character-Encoding" => encoding = Some(value.trim().to_string()),
                other => {
                    return Err(Error::TagFile {
                        path: BAGIT_TXT.into(),
                        reason: format!("unexpected field: {}", other),
                    })
                }
            }
        }

        match (version, encoding) {
            (Some(version), Some(encoding)) => Ok(BagDeclaration { version, encoding }),
            _ => Err(Error::TagFile {
                path: BAGIT_TXT.into(),
                reason: "missing BagIt-Version or Tag-File-Character-Encoding".to_string(),
            }),
        }
    }

    /// Whether the declaration is one this tool accepts: a numeric
    /// `M.N` version and UTF-8 tag encoding.
    pub fn is_supported(&self) -> bool {
        VERSION_RE.is_match(&self.version) && self.encoding.eq_ignore_ascii_case("UTF-8")
    }
}

// ============================================================================
// Payload Files
// ============================================================================

/// One regular file under `data/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    /// Absolute path on disk
    pub abs: PathBuf,
    /// Bag-root-relative path with `/` separators (`data/...`), the form
    /// manifests use
    pub rel: String,
    /// Size in bytes
    pub size: u64,
    /// Whether the name or any directory component below `data/` is hidden
    pub hidden: bool,
}

// ============================================================================
// Bag
// ============================================================================

/// A candidate bag directory
#[derive(Debug, Clone)]
pub struct Bag {
    root: PathBuf,
    name: String,
}

impl Bag {
    /// Open a directory as a bag. Fails only if the path is missing or
    /// not a directory.
    pub fn open(path: &Path) -> Result<Bag> {
        if !path.is_dir() {
            return Err(Error::NotABag(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Bag {
            root: path.to_path_buf(),
            name,
        })
    }

    /// Quick test used by directory discovery: does this look like a bag?
    pub fn is_bag_dir(path: &Path) -> bool {
        path.join(BAGIT_TXT).is_file()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name; by convention the Primary ID of the bagged object
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bagit_txt(&self) -> PathBuf {
        self.root.join(BAGIT_TXT)
    }

    pub fn bag_info_txt(&self) -> PathBuf {
        self.root.join(BAG_INFO_TXT)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn manifest_path(&self, algorithm: Algorithm) -> PathBuf {
        self.root.join(algorithm.manifest_name())
    }

    pub fn tagmanifest_path(&self, algorithm: Algorithm) -> PathBuf {
        self.root.join(algorithm.tagmanifest_name())
    }

    /// Algorithms with a payload manifest present, in discovery order
    pub fn manifest_algorithms(&self) -> Vec<Algorithm> {
        Algorithm::ALL
            .iter()
            .copied()
            .filter(|a| self.manifest_path(*a).is_file())
            .collect()
    }

    /// Algorithms with a tagmanifest present
    pub fn tagmanifest_algorithms(&self) -> Vec<Algorithm> {
        Algorithm::ALL
            .iter()
            .copied()
            .filter(|a| self.tagmanifest_path(*a).is_file())
            .collect()
    }

    /// Tag files a tagmanifest must cover: the declaration, bag-info and
    /// every payload manifest present. Only existing files are returned.
    pub fn tag_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for candidate in [self.bagit_txt(), self.bag_info_txt()] {
            if candidate.is_file() {
                files.push(candidate);
            }
        }
        for algorithm in self.manifest_algorithms() {
            files.push(self.manifest_path(algorithm));
        }
        files
    }

    /// Enumerate every regular file under `data/`, sorted by relative
    /// path. Hidden files are included and flagged; a missing `data/`
    /// yields an empty list (the structural defect is reported
    /// elsewhere).
    pub fn payload_files(&self) -> Result<Vec<PayloadFile>> {
        let data = self.data_dir();
        if !data.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&data).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk {}: {}", data.display(), e),
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| Error::Internal(format!("walk escaped bag root: {}", e)))?;
            let components: Vec<String> = rel_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let rel = components.join("/");
            // Components below data/ decide hiddenness
            let hidden = components[1..].iter().any(|c| is_hidden_name(c));

            let size = entry
                .metadata()
                .map_err(|e| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("Failed to stat {}: {}", entry.path().display(), e),
                    ))
                })?
                .len();

            files.push(PayloadFile {
                abs: entry.path().to_path_buf(),
                rel,
                size,
                hidden,
            });
        }

        files.sort_by(|a, b| a.rel.cmp(&b.rel));
        Ok(files)
    }

    /// Recount the Payload-Oxum from disk
    pub fn payload_oxum(&self) -> Result<Oxum> {
        let files = self.payload_files()?;
        let bytes = files.iter().map(|f| f.size).sum();
        Ok(Oxum::new(bytes, files.len() as u64))
    }

    /// Load and parse the bag declaration
    pub fn declaration(&self) -> Result<BagDeclaration> {
        let path = self.bagit_txt();
        let content = fs::read_to_string(&path).map_err(|e| Error::TagFile {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        BagDeclaration::parse(&content)
    }
}
