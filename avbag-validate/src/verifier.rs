//! Manifest and checksum verification (stage 2)
//!
//! Compares every payload manifest's entry set against the files on
//! disk, recounts the Payload-Oxum, and in slow mode recomputes payload
//! checksums on the rayon pool. Tag manifests are always verified in
//! full; the files they cover are a few kilobytes.
//!
//! Runs on a blocking thread: the caller bridges onto the async runtime
//! with `spawn_blocking`.

use std::collections::BTreeMap;
use tracing::debug;

use avbag_common::checksum::{hash_file, hash_files, Algorithm};
use avbag_common::model::{Bag, BagInfo, Manifest};
use avbag_common::{Defect, DefectKind, Result};

/// Stage-2 integrity verifier
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify a bag's manifests and oxum, returning the complete defect
    /// list. With `fast` set, payload checksum recomputation is skipped;
    /// entry sets, oxum and tag manifests are always checked.
    pub fn verify(&self, bag: &Bag, fast: bool) -> Result<Vec<Defect>> {
        let mut defects = Vec::new();

        let payload = bag.payload_files()?;
        let disk: BTreeMap<String, u64> = payload.iter().map(|f| (f.rel.clone(), f.size)).collect();

        self.check_oxum(bag, &disk, &mut defects);

        for algorithm in bag.manifest_algorithms() {
            self.check_manifest(bag, algorithm, &disk, fast, &mut defects);
        }

        for algorithm in bag.tagmanifest_algorithms() {
            self.check_tagmanifest(bag, algorithm, &mut defects);
        }

        debug!(
            bag = bag.name(),
            fast,
            defects = defects.len(),
            "Integrity verification complete"
        );
        Ok(defects)
    }

    /// Declared Payload-Oxum against a fresh recount. Byte and count
    /// discrepancies are reported separately.
    fn check_oxum(&self, bag: &Bag, disk: &BTreeMap<String, u64>, defects: &mut Vec<Defect>) {
        let declared = match BagInfo::load(&bag.bag_info_txt()) {
            Ok(info) => match info.payload_oxum() {
                Some(oxum) => oxum,
                None => {
                    defects.push(Defect::new(
                        DefectKind::OxumMismatch,
                        "Payload-Oxum missing or malformed in bag-info.txt",
                    ));
                    return;
                }
            },
            Err(e) => {
                defects.push(Defect::new(
                    DefectKind::OxumMismatch,
                    format!("cannot check Payload-Oxum: {}", e),
                ));
                return;
            }
        };

        let actual_bytes: u64 = disk.values().sum();
        let actual_count = disk.len() as u64;

        if declared.bytes != actual_bytes {
            defects.push(Defect::new(
                DefectKind::OxumMismatch,
                format!(
                    "declared {} payload bytes, found {}",
                    declared.bytes, actual_bytes
                ),
            ));
        }
        if declared.count != actual_count {
            defects.push(Defect::new(
                DefectKind::OxumMismatch,
                format!(
                    "declared {} payload files, found {}",
                    declared.count, actual_count
                ),
            ));
        }
    }

    /// One payload manifest: duplicates, entry set vs disk, checksums.
    fn check_manifest(
        &self,
        bag: &Bag,
        algorithm: Algorithm,
        disk: &BTreeMap<String, u64>,
        fast: bool,
        defects: &mut Vec<Defect>,
    ) {
        let manifest_name = algorithm.manifest_name();
        let manifest = match Manifest::load(algorithm, &bag.manifest_path(algorithm)) {
            Ok(manifest) => manifest,
            Err(e) => {
                defects.push(Defect::at(
                    DefectKind::ManifestUnreadable,
                    manifest_name,
                    e.to_string(),
                ));
                return;
            }
        };

        for relpath in &manifest.duplicates {
            defects.push(Defect::at(
                DefectKind::DuplicateManifestEntry,
                relpath.clone(),
                format!("listed more than once in {}", manifest_name),
            ));
        }

        let listed = manifest.checksums();

        // Entries with no file behind them, then files with no entry;
        // both directions reported in full
        for (relpath, _) in &listed {
            if !relpath.starts_with("data/") {
                defects.push(Defect::at(
                    DefectKind::ManifestEntryCountMismatch,
                    relpath.to_string(),
                    format!("entry outside data/ in {}", manifest_name),
                ));
            } else if !disk.contains_key(*relpath) {
                defects.push(Defect::at(
                    DefectKind::ManifestEntryCountMismatch,
                    relpath.to_string(),
                    format!("in {} but not on disk", manifest_name),
                ));
            }
        }
        for relpath in disk.keys() {
            if !listed.contains_key(relpath.as_str()) {
                defects.push(Defect::at(
                    DefectKind::ManifestEntryCountMismatch,
                    relpath.clone(),
                    format!("on disk but not in {}", manifest_name),
                ));
            }
        }

        if fast {
            return;
        }

        // Slow mode: recompute checksums for files present on both
        // sides, in parallel, and report every mismatch
        let verifiable: Vec<(String, String)> = listed
            .iter()
            .filter(|(relpath, _)| disk.contains_key(**relpath))
            .map(|(relpath, checksum)| (relpath.to_string(), checksum.to_string()))
            .collect();
        let paths: Vec<_> = verifiable
            .iter()
            .map(|(relpath, _)| bag.root().join(relpath))
            .collect();

        let computed = hash_files(algorithm, &paths);
        for ((relpath, expected), (_, result)) in verifiable.iter().zip(computed) {
            match result {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => defects.push(Defect::at(
                    DefectKind::ChecksumMismatch,
                    relpath.clone(),
                    format!("{} expected {}, computed {}", algorithm, expected, actual),
                )),
                Err(e) => defects.push(Defect::at(
                    DefectKind::ChecksumMismatch,
                    relpath.clone(),
                    format!("unreadable while hashing: {}", e),
                )),
            }
        }
    }

    /// One tag manifest: every entry recomputed, every required tag file
    /// covered.
    fn check_tagmanifest(&self, bag: &Bag, algorithm: Algorithm, defects: &mut Vec<Defect>) {
        let tagmanifest_name = algorithm.tagmanifest_name();
        let manifest = match Manifest::load(algorithm, &bag.tagmanifest_path(algorithm)) {
            Ok(manifest) => manifest,
            Err(e) => {
                defects.push(Defect::at(
                    DefectKind::ManifestUnreadable,
                    tagmanifest_name,
                    e.to_string(),
                ));
                return;
            }
        };

        for entry in &manifest.entries {
            let path = bag.root().join(&entry.relpath);
            if !path.is_file() {
                defects.push(Defect::at(
                    DefectKind::TagChecksumMismatch,
                    entry.relpath.clone(),
                    format!("in {} but not on disk", tagmanifest_name),
                ));
                continue;
            }
            match hash_file(algorithm, &path) {
                Ok(actual) if actual == entry.checksum => {}
                Ok(actual) => defects.push(Defect::at(
                    DefectKind::TagChecksumMismatch,
                    entry.relpath.clone(),
                    format!(
                        "{} expected {}, computed {}",
                        algorithm, entry.checksum, actual
                    ),
                )),
                Err(e) => defects.push(Defect::at(
                    DefectKind::TagChecksumMismatch,
                    entry.relpath.clone(),
                    format!("unreadable while hashing: {}", e),
                )),
            }
        }

        // Required tag files the tagmanifest fails to cover
        let listed = manifest.checksums();
        for tag_file in bag.tag_files() {
            let rel = tag_file
                .strip_prefix(bag.root())
                .unwrap_or(&tag_file)
                .to_string_lossy()
                .replace('\\', "/");
            if !listed.contains_key(rel.as_str()) {
                defects.push(Defect::at(
                    DefectKind::TagChecksumMismatch,
                    rel,
                    format!("not covered by {}", tagmanifest_name),
                ));
            }
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}
