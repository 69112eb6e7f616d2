//! Defect and report model
//!
//! Validation findings are data, not errors: each stage returns its
//! complete defect list so one run tells an operator everything wrong with
//! a bag. Reports serialize to JSON for machine consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Stages and Defect Kinds
// ============================================================================

/// Validation stage that produced a defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Structure,
    Integrity,
    Metadata,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Structure => "structure",
            Stage::Integrity => "integrity",
            Stage::Metadata => "metadata",
        }
    }
}

/// Everything that can be wrong with a bag
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectKind {
    // Structure
    MissingRequiredFile,
    MissingRequiredSubdir,
    EmptySubdir,
    MislocatedFile,
    UnrecognizedFilename,
    UnexpectedHiddenFile,
    ZeroByteFile,
    // Integrity
    OxumMismatch,
    ChecksumMismatch,
    ManifestEntryCountMismatch,
    DuplicateManifestEntry,
    ManifestUnreadable,
    TagChecksumMismatch,
    // Metadata
    MissingSidecar,
    ExtraSidecar,
    FilenameMismatch,
    SchemaInvalid,
    TechnicalMismatch,
}

impl DefectKind {
    /// Verdict string as reported on the console and in JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectKind::MissingRequiredFile => "MISSING_REQUIRED_FILE",
            DefectKind::MissingRequiredSubdir => "MISSING_REQUIRED_SUBDIR",
            DefectKind::EmptySubdir => "EMPTY_SUBDIR",
            DefectKind::MislocatedFile => "MISLOCATED_FILE",
            DefectKind::UnrecognizedFilename => "UNRECOGNIZED_FILENAME",
            DefectKind::UnexpectedHiddenFile => "UNEXPECTED_HIDDEN_FILE",
            DefectKind::ZeroByteFile => "ZERO_BYTE_FILE",
            DefectKind::OxumMismatch => "OXUM_MISMATCH",
            DefectKind::ChecksumMismatch => "CHECKSUM_MISMATCH",
            DefectKind::ManifestEntryCountMismatch => "MANIFEST_ENTRY_COUNT_MISMATCH",
            DefectKind::DuplicateManifestEntry => "DUPLICATE_MANIFEST_ENTRY",
            DefectKind::ManifestUnreadable => "MANIFEST_UNREADABLE",
            DefectKind::TagChecksumMismatch => "TAG_CHECKSUM_MISMATCH",
            DefectKind::MissingSidecar => "MISSING_SIDECAR",
            DefectKind::ExtraSidecar => "EXTRA_SIDECAR",
            DefectKind::FilenameMismatch => "FILENAME_MISMATCH",
            DefectKind::SchemaInvalid => "SCHEMA_INVALID",
            DefectKind::TechnicalMismatch => "TECHNICAL_MISMATCH",
        }
    }

    /// Stage this defect kind belongs to
    pub fn stage(&self) -> Stage {
        match self {
            DefectKind::MissingRequiredFile
            | DefectKind::MissingRequiredSubdir
            | DefectKind::EmptySubdir
            | DefectKind::MislocatedFile
            | DefectKind::UnrecognizedFilename
            | DefectKind::UnexpectedHiddenFile
            | DefectKind::ZeroByteFile => Stage::Structure,
            DefectKind::OxumMismatch
            | DefectKind::ChecksumMismatch
            | DefectKind::ManifestEntryCountMismatch
            | DefectKind::DuplicateManifestEntry
            | DefectKind::ManifestUnreadable
            | DefectKind::TagChecksumMismatch => Stage::Integrity,
            DefectKind::MissingSidecar
            | DefectKind::ExtraSidecar
            | DefectKind::FilenameMismatch
            | DefectKind::SchemaInvalid
            | DefectKind::TechnicalMismatch => Stage::Metadata,
        }
    }

    /// Whether a repair directive exists that clears this defect.
    ///
    /// Hidden files can be removed; integrity mismatches can be
    /// recomputed from disk once an operator has judged the payload
    /// correct. Structural and metadata defects need human hands.
    pub fn auto_fixable(&self) -> bool {
        matches!(
            self,
            DefectKind::UnexpectedHiddenFile
                | DefectKind::OxumMismatch
                | DefectKind::ChecksumMismatch
                | DefectKind::ManifestEntryCountMismatch
                | DefectKind::DuplicateManifestEntry
                | DefectKind::ManifestUnreadable
                | DefectKind::TagChecksumMismatch
        )
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Defects
// ============================================================================

/// One finding against a bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub kind: DefectKind,
    /// Bag-root-relative path the finding concerns, when file-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable particulars
    pub detail: String,
}

impl Defect {
    /// Bag-level defect with no specific path
    pub fn new(kind: DefectKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: None,
            detail: detail.into(),
        }
    }

    /// File-specific defect
    pub fn at(kind: DefectKind, path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: Some(path.into()),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}: {}", self.kind, path, self.detail),
            None => write!(f, "{}: {}", self.kind, self.detail),
        }
    }
}

// ============================================================================
// Per-Bag Report
// ============================================================================

/// Overall outcome for one bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BagStatus {
    /// Every executed stage came back clean
    Valid,
    /// At least one defect
    Invalid,
    /// The tool itself failed on this bag
    Error,
}

/// Complete validation report for one bag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BagReport {
    /// Bag directory name (the Primary ID)
    pub bag: String,
    /// Bag root path
    pub path: PathBuf,
    pub status: BagStatus,
    pub structure: Vec<Defect>,
    pub integrity: Vec<Defect>,
    pub metadata: Vec<Defect>,
    /// Tool failure message when `status` is `ERROR`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl BagReport {
    /// Start a report for a bag; stages fill in as they run
    pub fn begin(bag: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            bag: bag.into(),
            path: path.into(),
            status: BagStatus::Valid,
            structure: Vec::new(),
            integrity: Vec::new(),
            metadata: Vec::new(),
            error: None,
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    /// Close the report, fixing elapsed time and the overall status
    pub fn finish(&mut self) {
        self.elapsed_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
        self.status = if self.error.is_some() {
            BagStatus::Error
        } else if self.defect_count() > 0 {
            BagStatus::Invalid
        } else {
            BagStatus::Valid
        };
    }

    /// Mark the bag as failed with a tool error
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.status == BagStatus::Valid
    }

    pub fn defect_count(&self) -> usize {
        self.structure.len() + self.integrity.len() + self.metadata.len()
    }

    /// All defects across stages, structure first
    pub fn defects(&self) -> impl Iterator<Item = &Defect> {
        self.structure
            .iter()
            .chain(self.integrity.iter())
            .chain(self.metadata.iter())
    }

    /// Distinct defect kinds present in this report
    pub fn kinds(&self) -> Vec<DefectKind> {
        let mut kinds: Vec<DefectKind> = self.defects().map(|d| d.kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// A defect kind occurring in at least this many consecutive bags is a
/// systemic-failure candidate
const SYSTEMIC_MIN_RUN: usize = 3;
/// ...and must affect at least this share of all bags in the run
const SYSTEMIC_MIN_SHARE: f64 = 0.8;

/// Aggregate outcome of a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub bags_checked: usize,
    pub bags_valid: usize,
    pub bags_invalid: usize,
    pub bags_errored: usize,
    /// Total findings per defect kind across the run
    pub defect_counts: BTreeMap<DefectKind, usize>,
    /// Kinds that dominate the run: same defect in 3+ consecutive bags
    /// covering 80%+ of the run, which points at a vendor-side process
    /// error rather than per-bag damage
    pub systemic: Vec<DefectKind>,
}

impl RunSummary {
    /// Summarize reports in submission order (systemic detection relies
    /// on consecutive runs of the same kind).
    pub fn from_reports(reports: &[BagReport]) -> Self {
        let mut defect_counts: BTreeMap<DefectKind, usize> = BTreeMap::new();
        for report in reports {
            for defect in report.defects() {
                *defect_counts.entry(defect.kind).or_insert(0) += 1;
            }
        }

        let mut systemic = Vec::new();
        for kind in defect_counts.keys().copied() {
            let affected: Vec<bool> = reports
                .iter()
                .map(|r| r.defects().any(|d| d.kind == kind))
                .collect();
            let total = affected.iter().filter(|&&a| a).count();
            let longest_run = affected
                .split(|&a| !a)
                .map(|run| run.len())
                .max()
                .unwrap_or(0);
            if !reports.is_empty()
                && longest_run >= SYSTEMIC_MIN_RUN
                && (total as f64) / (reports.len() as f64) >= SYSTEMIC_MIN_SHARE
            {
                systemic.push(kind);
            }
        }

        Self {
            bags_checked: reports.len(),
            bags_valid: reports.iter().filter(|r| r.status == BagStatus::Valid).count(),
            bags_invalid: reports
                .iter()
                .filter(|r| r.status == BagStatus::Invalid)
                .count(),
            bags_errored: reports
                .iter()
                .filter(|r| r.status == BagStatus::Error)
                .count(),
            defect_counts,
            systemic,
        }
    }

    /// Whether the run as a whole passed
    pub fn all_valid(&self) -> bool {
        self.bags_invalid == 0 && self.bags_errored == 0
    }
}
