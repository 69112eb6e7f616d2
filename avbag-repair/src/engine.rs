//! Bag repair: directed, ordered, atomic
//!
//! The engine acts only on the directives it is given and applies them
//! in a fixed order: hidden-file removal, then payload manifests, then
//! the Payload-Oxum, then tag manifests. Each downstream step depends
//! on the upstream one being settled (a tag manifest must cover the
//! final manifest and bag-info content). Tag file rewrites go through a
//! temp file in the bag root and a rename, so a crash leaves either the
//! old file or the new one, never a torn one. After the directed steps
//! the bag is re-validated in full.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use avbag_common::checksum::{hash_file, hash_files, Algorithm};
use avbag_common::config::Config;
use avbag_common::human_size::format_human_size;
use avbag_common::model::baginfo::{BAG_SIZE, PAYLOAD_OXUM};
use avbag_common::model::filename::is_hidden_name;
use avbag_common::model::{Bag, BagInfo, Manifest};
use avbag_common::{BagReport, Defect, DefectKind, Error, Result};

use avbag_validate::inspector::Inspector;
use avbag_validate::metadata::{CompiledSchemaOracle, MetadataChecker};
use avbag_validate::types::SchemaOracle;
use avbag_validate::verifier::Verifier;

// ============================================================================
// Directives
// ============================================================================

/// Which repairs the caller has asked for. The engine never infers
/// intent: an undirected defect stays in the bag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    /// Delete hidden files and directories anywhere under the bag
    pub hidden: bool,
    /// Rewrite every payload manifest from the files on disk
    pub manifest: bool,
    /// Recount and rewrite Payload-Oxum (and Bag-Size) in bag-info.txt
    pub oxum: bool,
    /// Rewrite every tag manifest from the tag files on disk
    pub tagmanifest: bool,
}

impl Directives {
    pub fn all() -> Self {
        Self {
            hidden: true,
            manifest: true,
            oxum: true,
            tagmanifest: true,
        }
    }

    pub fn any(&self) -> bool {
        self.hidden || self.manifest || self.oxum || self.tagmanifest
    }
}

/// One repair step, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStep {
    RemoveHiddenFiles,
    RecomputeManifest,
    RecomputeOxum,
    RecomputeTagmanifest,
}

impl RepairStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStep::RemoveHiddenFiles => "remove-hidden-files",
            RepairStep::RecomputeManifest => "recompute-manifest",
            RepairStep::RecomputeOxum => "recompute-oxum",
            RepairStep::RecomputeTagmanifest => "recompute-tagmanifest",
        }
    }
}

impl fmt::Display for RepairStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one executed step touched
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: RepairStep,
    /// Bag-root-relative paths removed or rewritten
    pub changed: Vec<String>,
}

/// A completed repair: the steps that ran and the post-repair verdict
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    pub bag: String,
    pub steps: Vec<StepOutcome>,
    pub report: BagReport,
}

// ============================================================================
// Engine
// ============================================================================

/// Applies directed repairs and re-validates
pub struct RepairEngine {
    inspector: Inspector,
    verifier: Verifier,
    checker: MetadataChecker,
}

impl RepairEngine {
    /// Build an engine. The post-repair validation uses the same schema
    /// configuration as the validator.
    pub fn new(config: &Config) -> Result<Self> {
        let oracle: Arc<dyn SchemaOracle> = match &config.schema_dir {
            Some(dir) => Arc::new(CompiledSchemaOracle::from_dir(dir)?),
            None => Arc::new(CompiledSchemaOracle::embedded()?),
        };
        Ok(Self {
            inspector: Inspector::new(),
            verifier: Verifier::new(),
            checker: MetadataChecker::new(oracle, config.duration_tolerance_secs),
        })
    }

    /// Apply the directed repairs to one bag, in fixed order, then
    /// re-validate all three stages.
    ///
    /// # Errors
    ///
    /// Fails without touching the bag when no directives are given or
    /// when the bag has structural damage repair cannot resolve
    /// (missing required files or subdirectories, misplaced or
    /// malformed payload); those need human correction or re-delivery.
    /// An I/O failure inside a step aborts that step before its write,
    /// leaving the bag in its pre-step state.
    pub fn repair(&self, path: &Path, directives: Directives) -> Result<RepairOutcome> {
        if !directives.any() {
            return Err(Error::InvalidInput(
                "no repair directives given; pass --hidden, --manifest, --oxum, --tagmanifest or --all"
                    .to_string(),
            ));
        }
        let bag = Bag::open(path)?;
        self.refuse_unfixable(&bag, &directives)?;

        let mut steps = Vec::new();
        if directives.hidden {
            steps.push(self.remove_hidden(&bag)?);
        }
        if directives.manifest {
            steps.push(self.recompute_manifests(&bag)?);
        }
        if directives.oxum {
            steps.push(self.recompute_oxum(&bag)?);
        }
        if directives.tagmanifest {
            steps.push(self.recompute_tagmanifests(&bag)?);
        }

        let mut report = BagReport::begin(bag.name(), bag.root());
        report.structure = self.inspector.inspect(&bag)?;
        report.integrity = self.verifier.verify(&bag, false)?;
        report.metadata = self.checker.check(&bag)?;
        report.finish();

        info!(
            bag = bag.name(),
            steps = steps.len(),
            status = ?report.status,
            "Repair complete"
        );
        Ok(RepairOutcome {
            bag: bag.name().to_string(),
            steps,
            report,
        })
    }

    /// Structural damage the engine cannot resolve blocks the whole
    /// repair: a partial fix on a malformed bag would mask the damage.
    fn refuse_unfixable(&self, bag: &Bag, directives: &Directives) -> Result<()> {
        let structure = self.inspector.inspect(bag)?;
        let mut blocking: Vec<&Defect> = Vec::new();
        for defect in &structure {
            match defect.kind {
                DefectKind::UnexpectedHiddenFile => {}
                // The bag-level "no payload manifest" finding is exactly
                // what recompute-manifest writes
                DefectKind::MissingRequiredFile
                    if defect.path.is_none() && directives.manifest => {}
                _ => blocking.push(defect),
            }
        }
        if blocking.is_empty() {
            return Ok(());
        }
        Err(Error::InvalidInput(format!(
            "bag {} has structural defects repair cannot fix: {}",
            bag.name(),
            blocking
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        )))
    }

    /// Delete hidden files and directories anywhere under the bag.
    /// Targets are collected before anything is removed so the walk
    /// never descends into a directory it is about to delete.
    fn remove_hidden(&self, bag: &Bag) -> Result<StepOutcome> {
        let mut targets: Vec<(PathBuf, bool)> = Vec::new();
        let mut walker = WalkDir::new(bag.root())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("walking {}: {}", bag.root().display(), e),
                ))
            })?;
            if entry.depth() == 0 {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if is_hidden_name(&name) {
                let is_dir = entry.file_type().is_dir();
                targets.push((entry.path().to_path_buf(), is_dir));
                if is_dir {
                    walker.skip_current_dir();
                }
            }
        }

        let mut changed = Vec::new();
        for (target, is_dir) in targets {
            if is_dir {
                fs::remove_dir_all(&target)?;
            } else {
                fs::remove_file(&target)?;
            }
            debug!(path = %target.display(), "Removed hidden entry");
            changed.push(rel_of(bag, &target));
        }
        Ok(StepOutcome {
            step: RepairStep::RemoveHiddenFiles,
            changed,
        })
    }

    /// Rewrite every payload manifest from the files on disk, fully
    /// replacing stale entries. A merge could mask a missing-file
    /// defect, so the old content is never consulted. A bag with no
    /// manifest at all gets a fresh md5 one.
    fn recompute_manifests(&self, bag: &Bag) -> Result<StepOutcome> {
        let files = bag.payload_files()?;
        let paths: Vec<PathBuf> = files.iter().map(|f| f.abs.clone()).collect();
        let mut algorithms = bag.manifest_algorithms();
        if algorithms.is_empty() {
            algorithms.push(Algorithm::Md5);
        }

        let mut changed = Vec::new();
        for algorithm in algorithms {
            let digests = hash_files(algorithm, &paths);
            let mut checksums: BTreeMap<String, String> = BTreeMap::new();
            for (file, (_, digest)) in files.iter().zip(digests) {
                // An unreadable payload file aborts before any write
                checksums.insert(file.rel.clone(), digest?);
            }
            write_atomic(
                bag.root(),
                &bag.manifest_path(algorithm),
                &Manifest::render(&checksums),
            )?;
            info!(
                bag = bag.name(),
                manifest = algorithm.manifest_name(),
                entries = checksums.len(),
                "Rewrote payload manifest"
            );
            changed.push(algorithm.manifest_name());
        }
        Ok(StepOutcome {
            step: RepairStep::RecomputeManifest,
            changed,
        })
    }

    /// Recount the payload and rewrite Payload-Oxum and Bag-Size,
    /// leaving every other bag-info field byte-identical.
    fn recompute_oxum(&self, bag: &Bag) -> Result<StepOutcome> {
        let oxum = bag.payload_oxum()?;
        let mut info = BagInfo::load(&bag.bag_info_txt())?;
        info.set(PAYLOAD_OXUM, &oxum.to_string());
        info.set(BAG_SIZE, &format_human_size(oxum.bytes));
        write_atomic(bag.root(), &bag.bag_info_txt(), &info.to_content())?;
        info!(bag = bag.name(), oxum = %oxum, "Rewrote Payload-Oxum");
        Ok(StepOutcome {
            step: RepairStep::RecomputeOxum,
            changed: vec!["bag-info.txt".to_string()],
        })
    }

    /// Rewrite every tag manifest present from the tag files on disk.
    /// A bag without one is left without one; adding a tag manifest the
    /// vendor never delivered is not this engine's call.
    fn recompute_tagmanifests(&self, bag: &Bag) -> Result<StepOutcome> {
        let algorithms = bag.tagmanifest_algorithms();
        if algorithms.is_empty() {
            info!(bag = bag.name(), "No tagmanifest present; nothing to recompute");
            return Ok(StepOutcome {
                step: RepairStep::RecomputeTagmanifest,
                changed: Vec::new(),
            });
        }

        let mut changed = Vec::new();
        for algorithm in algorithms {
            let mut checksums: BTreeMap<String, String> = BTreeMap::new();
            for tag_file in bag.tag_files() {
                let digest = hash_file(algorithm, &tag_file)?;
                checksums.insert(rel_of(bag, &tag_file), digest);
            }
            write_atomic(
                bag.root(),
                &bag.tagmanifest_path(algorithm),
                &Manifest::render(&checksums),
            )?;
            info!(
                bag = bag.name(),
                tagmanifest = algorithm.tagmanifest_name(),
                entries = checksums.len(),
                "Rewrote tag manifest"
            );
            changed.push(algorithm.tagmanifest_name());
        }
        Ok(StepOutcome {
            step: RepairStep::RecomputeTagmanifest,
            changed,
        })
    }
}

fn rel_of(bag: &Bag, path: &Path) -> String {
    path.strip_prefix(bag.root())
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Write through a temp file in the bag root and rename into place.
/// The temp file sits on the same filesystem as the target, so the
/// rename is atomic and a crash cannot leave a torn tag file.
fn write_atomic(bag_root: &Path, target: &Path, content: &str) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(bag_root)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
