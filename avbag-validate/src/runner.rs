//! Validation run orchestration
//!
//! Expands the CLI's bag and directory arguments into a work list,
//! validates each bag through the three stages on a bounded worker
//! pool, and aggregates the per-bag reports into a run summary. Bags
//! are independent; a tool failure on one marks that bag's report as
//! errored and never aborts the rest of the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use avbag_common::config::Config;
use avbag_common::model::Bag;
use avbag_common::{BagReport, Error, Result, RunSummary};

use crate::inspector::Inspector;
use crate::metadata::{CompiledSchemaOracle, LoftyProber, MetadataChecker};
use crate::types::SchemaOracle;
use crate::verifier::Verifier;

/// Behavior switches for one validation run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Recompute payload checksums instead of entry-set and oxum checks only
    pub slow: bool,
    /// Probe media files and compare against sidecar technical blocks
    pub deep: bool,
}

/// The three per-bag stages, shared read-only across workers
struct Stages {
    inspector: Inspector,
    verifier: Verifier,
    checker: MetadataChecker,
}

/// Validates many bags on a bounded worker pool
pub struct Runner {
    stages: Arc<Stages>,
    workers: usize,
    slow: bool,
}

impl Runner {
    /// Build a runner from configuration. Schemas are compiled up front
    /// so a bad schema directory fails the run before any bag is read.
    pub fn new(config: &Config, options: RunOptions) -> Result<Self> {
        let oracle: Arc<dyn SchemaOracle> = match &config.schema_dir {
            Some(dir) => Arc::new(CompiledSchemaOracle::from_dir(dir)?),
            None => Arc::new(CompiledSchemaOracle::embedded()?),
        };
        let mut checker = MetadataChecker::new(oracle, config.duration_tolerance_secs);
        if options.deep {
            checker = checker.with_prober(Arc::new(LoftyProber::new()));
        }

        let workers = config
            .workers
            .unwrap_or_else(|| num_cpus::get().clamp(2, 8))
            .max(1);

        Ok(Self {
            stages: Arc::new(Stages {
                inspector: Inspector::new(),
                verifier: Verifier::new(),
                checker,
            }),
            workers,
            slow: options.slow,
        })
    }

    /// Expand `-b` and `-d` arguments into the bag list, preserving
    /// argument order. A directory of bags contributes each immediate
    /// subdirectory carrying a bagit.txt, sorted by name; other entries
    /// are skipped with a warning. Explicit `-b` paths are taken as
    /// given so a missing one surfaces as an errored report rather than
    /// killing the run.
    pub fn discover_bags(bag_paths: &[PathBuf], dir_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut bags: Vec<PathBuf> = bag_paths.to_vec();

        for dir in dir_paths {
            if !dir.is_dir() {
                return Err(Error::NotFound(format!(
                    "bag directory {}",
                    dir.display()
                )));
            }
            let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .collect();
            entries.sort();

            let before = bags.len();
            for entry in entries {
                if !entry.is_dir() {
                    continue;
                }
                if Bag::is_bag_dir(&entry) {
                    bags.push(entry);
                } else {
                    warn!(path = %entry.display(), "Skipping directory without bagit.txt");
                }
            }
            if bags.len() == before {
                warn!(dir = %dir.display(), "No bags found under directory");
            }
        }
        Ok(bags)
    }

    /// Validate every bag, returning per-bag reports in submission
    /// order plus the run summary.
    pub async fn run(&self, bags: Vec<PathBuf>) -> Result<(Vec<BagReport>, RunSummary)> {
        let total = bags.len();
        info!(
            bags = total,
            workers = self.workers,
            slow = self.slow,
            "Validation run starting"
        );

        let done = Arc::new(AtomicUsize::new(0));
        let mut results: Vec<(usize, BagReport)> = stream::iter(bags.into_iter().enumerate())
            .map(|(index, path)| {
                let stages = self.stages.clone();
                let slow = self.slow;
                let done = done.clone();
                async move {
                    let joined = tokio::task::spawn_blocking({
                        let path = path.clone();
                        move || validate_bag(&stages, &path, slow)
                    })
                    .await;
                    let report = match joined {
                        Ok(report) => report,
                        Err(e) => {
                            error!(path = %path.display(), error = %e, "Validation worker panicked");
                            let mut report = BagReport::begin(dir_name_of(&path), &path);
                            report.fail(format!("validation worker panicked: {}", e));
                            report.finish();
                            report
                        }
                    };

                    let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if current % 10 == 0 || current == total {
                        info!(progress = format!("{}/{}", current, total), "Validation progress");
                    }
                    (index, report)
                }
            })
            .buffer_unordered(self.workers)
            .collect::<Vec<_>>()
            .await;

        // Restore submission order: systemic-failure detection and the
        // printed report both follow the input sequence
        results.sort_by_key(|(index, _)| *index);
        let reports: Vec<BagReport> = results.into_iter().map(|(_, report)| report).collect();

        let summary = RunSummary::from_reports(&reports);
        info!(
            valid = summary.bags_valid,
            invalid = summary.bags_invalid,
            errored = summary.bags_errored,
            "Validation run complete"
        );
        Ok((reports, summary))
    }
}

fn dir_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run the three stages against one bag. Stage defects accumulate in
/// the report; a tool failure marks the report as errored instead.
fn validate_bag(stages: &Stages, path: &Path, slow: bool) -> BagReport {
    let mut report = BagReport::begin(dir_name_of(path), path);

    let bag = match Bag::open(path) {
        Ok(bag) => bag,
        Err(e) => {
            report.fail(e.to_string());
            report.finish();
            return report;
        }
    };

    match stages.inspector.inspect(&bag) {
        Ok(defects) => report.structure = defects,
        Err(e) => {
            report.fail(format!("structure inspection failed: {}", e));
            report.finish();
            return report;
        }
    }
    match stages.verifier.verify(&bag, !slow) {
        Ok(defects) => report.integrity = defects,
        Err(e) => {
            report.fail(format!("integrity verification failed: {}", e));
            report.finish();
            return report;
        }
    }
    match stages.checker.check(&bag) {
        Ok(defects) => report.metadata = defects,
        Err(e) => {
            report.fail(format!("metadata check failed: {}", e));
            report.finish();
            return report;
        }
    }

    report.finish();
    debug!(
        bag = report.bag.as_str(),
        status = ?report.status,
        defects = report.defect_count(),
        elapsed_ms = report.elapsed_ms,
        "Bag validated"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use avbag_common::checksum::{hash_bytes, Algorithm};
    use avbag_common::BagStatus;
    use serde_json::json;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    const WAV: &[u8] = b"RIFFdata";

    /// A bag that passes all three stages
    fn clean_bag(parent: &Path, name: &str) -> PathBuf {
        let root = parent.join(name);
        let record = json!({
            "asset": { "referenceFilename": format!("{}_v01_pm.wav", name), "fileRole": "pm" },
            "bibliographic": { "primaryID": name.split('_').last().unwrap(), "division": "myd" },
            "source": { "object": { "type": "audio cassette", "format": "audio cassette analog" } },
            "technical": {
                "filename": format!("{}_v01_pm", name),
                "extension": "wav",
                "fileFormat": "WAV",
                "audioCodec": "PCM",
                "fileSize": { "measure": WAV.len(), "unit": "bytes" },
                "durationMilli": { "measure": 30000, "unit": "ms" }
            }
        })
        .to_string();

        write_file(
            &root.join("bagit.txt"),
            b"BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n",
        );
        write_file(
            &root.join("bag-info.txt"),
            format!("Payload-Oxum: {}.2\n", WAV.len() + record.len()).as_bytes(),
        );
        let manifest = format!(
            "{}  data/PreservationMasters/{}_v01_pm.json\n{}  data/PreservationMasters/{}_v01_pm.wav\n",
            hash_bytes(Algorithm::Md5, record.as_bytes()),
            name,
            hash_bytes(Algorithm::Md5, WAV),
            name,
        );
        write_file(&root.join("manifest-md5.txt"), manifest.as_bytes());
        write_file(
            &root.join(format!("data/PreservationMasters/{}_v01_pm.wav", name)),
            WAV,
        );
        write_file(
            &root.join(format!("data/PreservationMasters/{}_v01_pm.json", name)),
            record.as_bytes(),
        );
        root
    }

    fn runner(slow: bool) -> Runner {
        Runner::new(
            &Config::default(),
            RunOptions { slow, deep: false },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_clean_bags_all_valid() {
        let tmp = TempDir::new().unwrap();
        let bags = vec![
            clean_bag(tmp.path(), "myd_111111"),
            clean_bag(tmp.path(), "myd_222222"),
        ];

        let (reports, summary) = runner(true).run(bags).await.unwrap();
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(report.is_valid(), "defects: {:?}", report);
        }
        assert!(summary.all_valid());
        assert_eq!(summary.bags_valid, 2);
    }

    #[tokio::test]
    async fn test_reports_keep_submission_order() {
        let tmp = TempDir::new().unwrap();
        let names = ["myd_000003", "myd_000001", "myd_000002"];
        let bags: Vec<PathBuf> = names.iter().map(|n| clean_bag(tmp.path(), n)).collect();

        let (reports, _) = runner(false).run(bags).await.unwrap();
        let got: Vec<&str> = reports.iter().map(|r| r.bag.as_str()).collect();
        assert_eq!(got, names);
    }

    #[tokio::test]
    async fn test_bad_bag_isolated_from_good_ones() {
        let tmp = TempDir::new().unwrap();
        let good = clean_bag(tmp.path(), "myd_111111");
        let stale = clean_bag(tmp.path(), "myd_222222");
        // Shrink the payload after manifesting: oxum and manifest both stale
        write_file(
            &stale.join("data/PreservationMasters/myd_222222_v01_pm.wav"),
            b"RIFF",
        );
        let missing = tmp.path().join("myd_333333");

        let (reports, summary) = runner(true)
            .run(vec![good, stale, missing])
            .await
            .unwrap();
        assert_eq!(reports[0].status, BagStatus::Valid);
        assert_eq!(reports[1].status, BagStatus::Invalid);
        assert!(reports[1]
            .integrity
            .iter()
            .any(|d| d.kind == avbag_common::DefectKind::OxumMismatch));
        assert_eq!(reports[2].status, BagStatus::Error);
        assert!(!summary.all_valid());
        assert_eq!(summary.bags_valid, 1);
        assert_eq!(summary.bags_invalid, 1);
        assert_eq!(summary.bags_errored, 1);
    }

    #[test]
    fn test_discover_bags_expands_directories() {
        let tmp = TempDir::new().unwrap();
        clean_bag(tmp.path(), "myd_222222");
        clean_bag(tmp.path(), "myd_111111");
        fs::create_dir(tmp.path().join("not_a_bag")).unwrap();
        write_file(&tmp.path().join("stray.txt"), b"x");

        let bags = Runner::discover_bags(&[], &[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<String> = bags.iter().map(|p| dir_name_of(p)).collect();
        assert_eq!(names, vec!["myd_111111", "myd_222222"]);
    }

    #[test]
    fn test_discover_bags_requires_directory_to_exist() {
        assert!(Runner::discover_bags(&[], &[PathBuf::from("/nonexistent/lsdir")]).is_err());
    }

    #[test]
    fn test_explicit_bag_paths_kept_in_order() {
        let a = PathBuf::from("/tmp/a");
        let b = PathBuf::from("/tmp/b");
        let bags = Runner::discover_bags(&[a.clone(), b.clone()], &[]).unwrap();
        assert_eq!(bags, vec![a, b]);
    }
}
