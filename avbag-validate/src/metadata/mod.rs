//! Metadata conformance checking (stage 3)
//!
//! Every media file in a sidecar-bearing role directory must be
//! accompanied by a JSON record sharing its filename root. Records are
//! parsed, checked for encoding problems (a UTF-8 BOM is always a
//! defect), cross-checked against the filenames they claim to describe,
//! and validated against the schema family selected by their own
//! declared source format. Deep mode additionally probes each media
//! file and compares measured properties against the record.

mod schema;
mod sidecar;
mod technical;

pub use schema::CompiledSchemaOracle;
pub use sidecar::Sidecar;
pub use technical::LoftyProber;

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use avbag_common::model::{Bag, ParsedFilename, Role, RoleDir};
use avbag_common::{Defect, DefectKind, Result};

use crate::types::{MediaProber, SchemaOracle, SourceFormat};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One payload file participating in sidecar pairing
struct GroupFile {
    rel: String,
    name: String,
    role: Option<Role>,
}

/// All files sharing one filename root inside one role directory
#[derive(Default)]
struct RootGroup {
    media: Vec<GroupFile>,
    sidecar: Option<GroupFile>,
}

/// Stage-3 metadata conformance checker
pub struct MetadataChecker {
    oracle: Arc<dyn SchemaOracle>,
    prober: Option<Arc<dyn MediaProber>>,
    duration_tolerance_secs: f64,
}

impl MetadataChecker {
    pub fn new(oracle: Arc<dyn SchemaOracle>, duration_tolerance_secs: f64) -> Self {
        Self {
            oracle,
            prober: None,
            duration_tolerance_secs,
        }
    }

    /// Enable deep mode: probe media files and compare against sidecars.
    pub fn with_prober(mut self, prober: Arc<dyn MediaProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Check a bag's sidecar pairing and record conformance, returning
    /// the complete defect list.
    pub fn check(&self, bag: &Bag) -> Result<Vec<Defect>> {
        let mut defects = Vec::new();
        let groups = self.collect_groups(bag)?;

        for ((dir, root), group) in &groups {
            match (&group.sidecar, group.media.is_empty()) {
                (None, false) => {
                    for media in &group.media {
                        defects.push(Defect::at(
                            DefectKind::MissingSidecar,
                            media.rel.clone(),
                            format!("expected data/{}/{}.json", dir, root),
                        ));
                    }
                }
                (Some(record), true) => {
                    defects.push(Defect::at(
                        DefectKind::ExtraSidecar,
                        record.rel.clone(),
                        format!("no media file shares the root {}", root),
                    ));
                }
                (Some(record), false) => {
                    let parsed =
                        self.check_record(bag, record, root, &group.media, &mut defects)?;
                    if let (Some((document, format)), Some(prober)) = (parsed, &self.prober) {
                        self.check_technical(
                            bag,
                            prober.as_ref(),
                            &group.media,
                            &document,
                            format,
                            &mut defects,
                        );
                    }
                }
                // Auxiliary captioning/log files pair with a media root
                // but carry no record of their own
                (None, true) => {}
            }
        }

        debug!(
            bag = bag.name(),
            deep = self.prober.is_some(),
            defects = defects.len(),
            "Metadata check complete"
        );
        Ok(defects)
    }

    /// Group payload files by role directory and filename root. Only
    /// sidecar-bearing role directories participate; files whose names
    /// fall outside the grammar were already reported structurally and
    /// cannot be paired.
    fn collect_groups(&self, bag: &Bag) -> Result<BTreeMap<(String, String), RootGroup>> {
        let mut groups: BTreeMap<(String, String), RootGroup> = BTreeMap::new();
        for file in bag.payload_files()? {
            if file.hidden {
                continue;
            }
            let parts: Vec<&str> = file.rel.split('/').collect();
            if parts.len() != 3 {
                continue;
            }
            match RoleDir::from_dir_name(parts[1]) {
                Some(role_dir) if role_dir.requires_sidecar() => {}
                _ => continue,
            }
            let parsed = match ParsedFilename::parse(parts[2]) {
                Some(parsed) => parsed,
                None => continue,
            };

            let group = groups
                .entry((parts[1].to_string(), parsed.root.clone()))
                .or_default();
            let entry = GroupFile {
                rel: file.rel.clone(),
                name: parts[2].to_string(),
                role: parsed.role,
            };
            if parsed.is_json_sidecar() {
                group.sidecar = Some(entry);
            } else if !parsed.is_auxiliary_sidecar() {
                group.media.push(entry);
            }
        }
        Ok(groups)
    }

    /// Parse one record and run its content checks. Returns the parsed
    /// document and its declared format when schema selection succeeded,
    /// for the deep pass.
    fn check_record(
        &self,
        bag: &Bag,
        record: &GroupFile,
        root: &str,
        media: &[GroupFile],
        defects: &mut Vec<Defect>,
    ) -> Result<Option<(Sidecar, SourceFormat)>> {
        let bytes = fs::read(bag.root().join(&record.rel))?;

        // A BOM is a defect on its own; strip it so the remaining
        // checks still run and the report stays complete
        let content = match bytes.strip_prefix(UTF8_BOM) {
            Some(stripped) => {
                defects.push(Defect::at(
                    DefectKind::SchemaInvalid,
                    record.rel.clone(),
                    "leading UTF-8 byte-order mark",
                ));
                stripped
            }
            None => &bytes[..],
        };

        let text = match std::str::from_utf8(content) {
            Ok(text) => text,
            Err(e) => {
                defects.push(Defect::at(
                    DefectKind::SchemaInvalid,
                    record.rel.clone(),
                    format!("not valid UTF-8: {}", e),
                ));
                return Ok(None);
            }
        };
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                defects.push(Defect::at(
                    DefectKind::SchemaInvalid,
                    record.rel.clone(),
                    format!("invalid JSON: {}", e),
                ));
                return Ok(None);
            }
        };
        let document = Sidecar::new(value);

        if let Some(reference) = document.reference_filename() {
            if !media.iter().any(|m| m.name == reference) {
                defects.push(Defect::at(
                    DefectKind::FilenameMismatch,
                    record.rel.clone(),
                    format!(
                        "asset.referenceFilename \"{}\" does not name the media file \"{}\"",
                        reference, media[0].name
                    ),
                ));
            }
        }
        if let Some(technical) = document.technical_filename() {
            if technical != root {
                defects.push(Defect::at(
                    DefectKind::FilenameMismatch,
                    record.rel.clone(),
                    format!(
                        "technical.filename \"{}\" does not match the filename root \"{}\"",
                        technical, root
                    ),
                ));
            }
        }

        let format = match document.source_format() {
            None => {
                defects.push(Defect::at(
                    DefectKind::SchemaInvalid,
                    record.rel.clone(),
                    "source.object.format missing; cannot select a schema",
                ));
                return Ok(None);
            }
            Some(raw) => match SourceFormat::parse(raw) {
                Some(format) => format,
                None => {
                    defects.push(Defect::at(
                        DefectKind::SchemaInvalid,
                        record.rel.clone(),
                        format!("unrecognized source object format \"{}\"", raw.trim()),
                    ));
                    return Ok(None);
                }
            },
        };

        for violation in self.oracle.validate(format.family(), document.document()) {
            let detail = if violation.pointer.is_empty() {
                violation.message.clone()
            } else {
                format!("{}: {}", violation.pointer, violation.message)
            };
            defects.push(Defect::at(DefectKind::SchemaInvalid, record.rel.clone(), detail));
        }

        Ok(Some((document, format)))
    }

    /// Deep pass: probe each media file and compare. Files the prober
    /// cannot read are skipped rather than flagged; an unsupported
    /// container is not evidence of a bad file.
    fn check_technical(
        &self,
        bag: &Bag,
        prober: &dyn MediaProber,
        media: &[GroupFile],
        document: &Sidecar,
        format: SourceFormat,
        defects: &mut Vec<Defect>,
    ) {
        for m in media {
            let path = bag.root().join(&m.rel);
            let probed = match prober.probe(&path) {
                Ok(probed) => probed,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Probe skipped");
                    continue;
                }
            };
            defects.extend(technical::compare_media(
                &m.rel,
                m.role,
                format,
                document,
                &probed,
                self.duration_tolerance_secs,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProbeError, TechnicalMetadata};
    use serde_json::json;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    fn record_json(media_name: &str, root: &str, format: &str, size: u64, duration_ms: u64) -> String {
        let extension = media_name.rsplit('.').next().unwrap();
        json!({
            "asset": { "referenceFilename": media_name, "fileRole": "pm" },
            "bibliographic": { "primaryID": "123456", "division": "myd" },
            "source": { "object": { "type": "audio cassette", "format": format } },
            "technical": {
                "filename": root,
                "extension": extension,
                "fileFormat": extension.to_ascii_uppercase(),
                "audioCodec": "PCM",
                "fileSize": { "measure": size, "unit": "bytes" },
                "durationMilli": { "measure": duration_ms, "unit": "ms" }
            }
        })
        .to_string()
    }

    const WAV: &[u8] = b"RIFFdata";

    /// Bag with one PM media file and a conformant record
    fn paired_bag(dir: &Path) -> PathBuf {
        let root = dir.join("myd_123456");
        write_file(
            &root.join("bagit.txt"),
            b"BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n",
        );
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.wav"),
            WAV,
        );
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.json"),
            record_json(
                "myd_123456_v01_pm.wav",
                "myd_123456_v01_pm",
                "audio cassette analog",
                WAV.len() as u64,
                30_000,
            )
            .as_bytes(),
        );
        root
    }

    fn shallow_checker() -> MetadataChecker {
        MetadataChecker::new(Arc::new(CompiledSchemaOracle::embedded().unwrap()), 0.5)
    }

    fn kinds(defects: &[Defect]) -> Vec<DefectKind> {
        defects.iter().map(|d| d.kind).collect()
    }

    struct FakeProber {
        answer: TechnicalMetadata,
    }

    impl MediaProber for FakeProber {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn probe(&self, _path: &Path) -> std::result::Result<TechnicalMetadata, ProbeError> {
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn test_paired_conformant_bag_passes() {
        let tmp = TempDir::new().unwrap();
        let bag = Bag::open(&paired_bag(tmp.path())).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert!(defects.is_empty(), "unexpected: {:?}", defects);
    }

    #[test]
    fn test_media_without_record() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        fs::remove_file(root.join("data/PreservationMasters/myd_123456_v01_pm.json")).unwrap();

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::MissingSidecar]);
        assert!(defects[0].detail.ends_with("myd_123456_v01_pm.json"));
    }

    #[test]
    fn test_record_without_media() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v02_pm.json"),
            record_json(
                "myd_123456_v02_pm.wav",
                "myd_123456_v02_pm",
                "audio cassette analog",
                8,
                30_000,
            )
            .as_bytes(),
        );

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::ExtraSidecar]);
    }

    #[test]
    fn test_bom_is_a_defect_even_when_schema_passes() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        let record = root.join("data/PreservationMasters/myd_123456_v01_pm.json");
        let mut with_bom = vec![0xEF, 0xBB, 0xBF];
        with_bom.extend_from_slice(&fs::read(&record).unwrap());
        write_file(&record, &with_bom);

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::SchemaInvalid]);
        assert!(defects[0].detail.contains("byte-order mark"));
    }

    #[test]
    fn test_unparseable_record() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.json"),
            b"{ not json",
        );

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::SchemaInvalid]);
        assert!(defects[0].detail.contains("invalid JSON"));
    }

    #[test]
    fn test_unrecognized_source_format() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.json"),
            record_json(
                "myd_123456_v01_pm.wav",
                "myd_123456_v01_pm",
                "betamax",
                WAV.len() as u64,
                30_000,
            )
            .as_bytes(),
        );

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::SchemaInvalid]);
        assert!(defects[0].detail.contains("unrecognized source object format"));
    }

    #[test]
    fn test_schema_violations_reported_per_field() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        // Drop the required technical.audioCodec field
        let record = root.join("data/PreservationMasters/myd_123456_v01_pm.json");
        let mut value: Value = serde_json::from_slice(&fs::read(&record).unwrap()).unwrap();
        value["technical"].as_object_mut().unwrap().remove("audioCodec");
        write_file(&record, value.to_string().as_bytes());

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::SchemaInvalid]);
        assert!(defects[0].detail.contains("audioCodec"));
    }

    #[test]
    fn test_reference_filename_cross_checked() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.json"),
            record_json(
                "myd_999999_v01_pm.wav",
                "myd_123456_v01_pm",
                "audio cassette analog",
                WAV.len() as u64,
                30_000,
            )
            .as_bytes(),
        );

        let bag = Bag::open(&root).unwrap();
        let defects = shallow_checker().check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::FilenameMismatch]);
        assert!(defects[0].detail.contains("referenceFilename"));
    }

    #[test]
    fn test_exempt_directories_need_no_records() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        write_file(&root.join("data/Images/myd_123456_v01.jpg"), b"JFIF");

        let bag = Bag::open(&root).unwrap();
        assert!(shallow_checker().check(&bag).unwrap().is_empty());
    }

    #[test]
    fn test_auxiliary_files_neither_need_nor_are_records() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.cue"),
            b"FILE",
        );

        let bag = Bag::open(&root).unwrap();
        assert!(shallow_checker().check(&bag).unwrap().is_empty());
    }

    #[test]
    fn test_deep_mode_flags_mono_master() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        // Declared digital-origin cassette implies a 96kHz/24-bit
        // stereo master; the fake probe reports mono
        write_file(
            &root.join("data/PreservationMasters/myd_123456_v01_pm.json"),
            record_json(
                "myd_123456_v01_pm.wav",
                "myd_123456_v01_pm",
                "audio cassette digital",
                WAV.len() as u64,
                30_000,
            )
            .as_bytes(),
        );
        let prober = FakeProber {
            answer: TechnicalMetadata {
                duration_secs: Some(30.0),
                format: Some("WAV".to_string()),
                sample_rate_hz: Some(96_000),
                bit_depth: Some(24),
                channels: Some(1),
                file_size_bytes: WAV.len() as u64,
            },
        };

        let bag = Bag::open(&root).unwrap();
        let checker = shallow_checker().with_prober(Arc::new(prober));
        let defects = checker.check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::TechnicalMismatch]);
        assert!(defects[0].detail.contains("channels"));
    }

    #[test]
    fn test_deep_mode_flags_size_divergence() {
        let tmp = TempDir::new().unwrap();
        let root = paired_bag(tmp.path());
        let prober = FakeProber {
            answer: TechnicalMetadata {
                duration_secs: Some(30.0),
                format: Some("WAV".to_string()),
                sample_rate_hz: None,
                bit_depth: None,
                channels: None,
                file_size_bytes: 999,
            },
        };

        let bag = Bag::open(&root).unwrap();
        let checker = shallow_checker().with_prober(Arc::new(prober));
        let defects = checker.check(&bag).unwrap();
        assert_eq!(kinds(&defects), vec![DefectKind::TechnicalMismatch]);
        assert!(defects[0].detail.contains("fileSize"));
    }
}
