//! Media probing and deep technical comparison
//!
//! The production prober reads container headers with lofty. Probed
//! properties are compared against the sidecar's technical block, and
//! master files are additionally held to the capture profile implied by
//! the declared source format.

use std::path::Path;

use lofty::file::{FileType, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;

use avbag_common::model::Role;
use avbag_common::{Defect, DefectKind};

use super::sidecar::Sidecar;
use crate::types::{MediaProber, ProbeError, SourceFormat, TechnicalMetadata};

/// Header-reading prober backed by lofty
pub struct LoftyProber;

impl LoftyProber {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoftyProber {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProber for LoftyProber {
    fn name(&self) -> &'static str {
        "lofty"
    }

    fn probe(&self, path: &Path) -> Result<TechnicalMetadata, ProbeError> {
        let file_size_bytes = std::fs::metadata(path)?.len();

        let tagged = Probe::open(path)
            .map_err(|e| ProbeError::Parse(e.to_string()))?
            .read()
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        let properties = tagged.properties();
        let format = match tagged.file_type() {
            FileType::Wav => "WAV",
            FileType::Flac => "FLAC",
            FileType::Aiff => "AIFF",
            FileType::Mpeg => "MP3",
            FileType::Mp4 => "MPEG-4",
            FileType::Aac => "AAC",
            FileType::Opus => "Opus",
            FileType::Vorbis => "Ogg Vorbis",
            FileType::WavPack => "WavPack",
            _ => "Unknown",
        };

        Ok(TechnicalMetadata {
            duration_secs: Some(properties.duration().as_secs_f64()),
            format: Some(format.to_string()),
            sample_rate_hz: properties.sample_rate(),
            bit_depth: properties.bit_depth(),
            channels: properties.channels(),
            file_size_bytes,
        })
    }
}

/// Fold container labels so vendor spellings ("wave", "MPEG-4") compare
/// equal to probe labels.
fn canonical_format(label: &str) -> String {
    let lower = label.trim().to_ascii_lowercase();
    match lower.as_str() {
        "wave" => "wav".to_string(),
        "mpeg-4" | "m4a" | "m4v" => "mp4".to_string(),
        "mpeg" | "mpeg-1 layer 3" => "mp3".to_string(),
        "ogg vorbis" | "vorbis" => "ogg".to_string(),
        "matroska" => "mkv".to_string(),
        _ => lower,
    }
}

/// Compare a media file's probed properties against its sidecar's
/// technical block, and against the master capture profile when the
/// file is a pm or em. Every divergence is returned; nothing stops at
/// the first.
pub(super) fn compare_media(
    media_rel: &str,
    role: Option<Role>,
    format: SourceFormat,
    sidecar: &Sidecar,
    probed: &TechnicalMetadata,
    tolerance_secs: f64,
) -> Vec<Defect> {
    let mut defects = Vec::new();

    if let Some(declared) = sidecar.file_size_bytes() {
        if declared != probed.file_size_bytes {
            defects.push(Defect::at(
                DefectKind::TechnicalMismatch,
                media_rel,
                format!(
                    "technical.fileSize.measure says {} bytes, file is {} bytes",
                    declared, probed.file_size_bytes
                ),
            ));
        }
    }

    if let (Some(declared_ms), Some(probed_secs)) = (sidecar.duration_millis(), probed.duration_secs)
    {
        let declared_secs = declared_ms / 1000.0;
        if (declared_secs - probed_secs).abs() > tolerance_secs {
            defects.push(Defect::at(
                DefectKind::TechnicalMismatch,
                media_rel,
                format!(
                    "technical.durationMilli says {:.3}s, measured {:.3}s (tolerance {:.3}s)",
                    declared_secs, probed_secs, tolerance_secs
                ),
            ));
        }
    }

    if let (Some(declared), Some(probed_format)) = (sidecar.file_format(), probed.format.as_deref())
    {
        if canonical_format(declared) != canonical_format(probed_format) {
            defects.push(Defect::at(
                DefectKind::TechnicalMismatch,
                media_rel,
                format!(
                    "technical.fileFormat is \"{}\", probe identified {}",
                    declared, probed_format
                ),
            ));
        }
    }

    // Masters carry the capture profile for their source format; service
    // copies and mezzanines are derivatives and are exempt
    if matches!(role, Some(Role::Pm) | Some(Role::Em)) {
        let profile = format.master_profile();
        if let (Some(want), Some(got)) = (profile.sample_rate_hz, probed.sample_rate_hz) {
            if want != got {
                defects.push(Defect::at(
                    DefectKind::TechnicalMismatch,
                    media_rel,
                    format!(
                        "master from \"{}\" should be {} Hz, found {} Hz",
                        format, want, got
                    ),
                ));
            }
        }
        if let (Some(want), Some(got)) = (profile.bit_depth, probed.bit_depth) {
            if want != got {
                defects.push(Defect::at(
                    DefectKind::TechnicalMismatch,
                    media_rel,
                    format!(
                        "master from \"{}\" should be {}-bit, found {}-bit",
                        format, want, got
                    ),
                ));
            }
        }
        if let (Some(want), Some(got)) = (profile.channels, probed.channels) {
            if want != got {
                defects.push(Defect::at(
                    DefectKind::TechnicalMismatch,
                    media_rel,
                    format!(
                        "master from \"{}\" should have {} channels, found {}",
                        format, want, got
                    ),
                ));
            }
        }
    }

    defects
}
