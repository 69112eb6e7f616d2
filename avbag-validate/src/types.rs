//! Core types and trait definitions for bag validation
//!
//! The two capabilities the metadata checker depends on, schema
//! validation and media probing, sit behind traits so tests substitute
//! deterministic fakes and the production implementations stay swappable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Source Formats
// ============================================================================

/// The physical source formats the lab digitizes.
///
/// `source.object.format` in a metadata record must name one of these;
/// any other string is a metadata defect, not a new format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    AudioCassetteAnalog,
    AudioCassetteDigital,
    AudioReelAnalog,
    AudioReelDigital,
    AudioGroovedDisc,
    AudioGroovedCylinder,
    AudioOpticalDisc,
    AudioMagneticWire,
    VideoCassetteAnalog,
    VideoCassetteDigital,
    VideoReel,
    VideoOpticalDisc,
    Film,
}

impl SourceFormat {
    /// All formats, for exhaustive schema preloading
    pub const ALL: [SourceFormat; 13] = [
        SourceFormat::AudioCassetteAnalog,
        SourceFormat::AudioCassetteDigital,
        SourceFormat::AudioReelAnalog,
        SourceFormat::AudioReelDigital,
        SourceFormat::AudioGroovedDisc,
        SourceFormat::AudioGroovedCylinder,
        SourceFormat::AudioOpticalDisc,
        SourceFormat::AudioMagneticWire,
        SourceFormat::VideoCassetteAnalog,
        SourceFormat::VideoCassetteDigital,
        SourceFormat::VideoReel,
        SourceFormat::VideoOpticalDisc,
        SourceFormat::Film,
    ];

    /// The format string as it appears in `source.object.format`
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::AudioCassetteAnalog => "audio cassette analog",
            SourceFormat::AudioCassetteDigital => "audio cassette digital",
            SourceFormat::AudioReelAnalog => "audio reel analog",
            SourceFormat::AudioReelDigital => "audio reel digital",
            SourceFormat::AudioGroovedDisc => "audio grooved disc",
            SourceFormat::AudioGroovedCylinder => "audio grooved cylinder",
            SourceFormat::AudioOpticalDisc => "audio optical disc",
            SourceFormat::AudioMagneticWire => "audio magnetic wire",
            SourceFormat::VideoCassetteAnalog => "video cassette analog",
            SourceFormat::VideoCassetteDigital => "video cassette digital",
            SourceFormat::VideoReel => "video reel",
            SourceFormat::VideoOpticalDisc => "video optical disc",
            SourceFormat::Film => "film",
        }
    }

    /// Parse a `source.object.format` string. Matching is exact apart
    /// from surrounding whitespace and ASCII case.
    pub fn parse(s: &str) -> Option<SourceFormat> {
        let normalized = s.trim().to_ascii_lowercase();
        SourceFormat::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
    }

    /// Schema family this format validates against
    pub fn family(&self) -> SchemaFamily {
        match self {
            SourceFormat::AudioCassetteAnalog
            | SourceFormat::AudioCassetteDigital
            | SourceFormat::AudioReelAnalog
            | SourceFormat::AudioReelDigital
            | SourceFormat::AudioGroovedDisc
            | SourceFormat::AudioGroovedCylinder
            | SourceFormat::AudioOpticalDisc
            | SourceFormat::AudioMagneticWire => SchemaFamily::Audio,
            SourceFormat::VideoCassetteAnalog
            | SourceFormat::VideoCassetteDigital
            | SourceFormat::VideoReel
            | SourceFormat::VideoOpticalDisc => SchemaFamily::Video,
            SourceFormat::Film => SchemaFamily::Film,
        }
    }

    /// Technical expectations for a preservation master digitized from
    /// this format. Audio masters are captured at 96kHz/24-bit stereo;
    /// video and film masters have no single fixed profile, so only the
    /// JSON-vs-probe comparisons apply to them.
    pub fn master_profile(&self) -> FormatProfile {
        match self.family() {
            SchemaFamily::Audio => FormatProfile {
                sample_rate_hz: Some(96_000),
                bit_depth: Some(24),
                channels: Some(2),
            },
            SchemaFamily::Video | SchemaFamily::Film => FormatProfile::default(),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema family: one JSON Schema file per family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaFamily {
    Audio,
    Video,
    Film,
}

impl SchemaFamily {
    pub const ALL: [SchemaFamily; 3] = [SchemaFamily::Audio, SchemaFamily::Video, SchemaFamily::Film];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFamily::Audio => "audio",
            SchemaFamily::Video => "video",
            SchemaFamily::Film => "film",
        }
    }

    /// Schema filename inside the configured schema directory
    pub fn schema_file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for SchemaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected capture properties for a master, `None` meaning unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatProfile {
    pub sample_rate_hz: Option<u32>,
    pub bit_depth: Option<u8>,
    pub channels: Option<u8>,
}

// ============================================================================
// Media Probing
// ============================================================================

/// Technical properties extracted from a media file on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetadata {
    /// Playback duration in seconds
    pub duration_secs: Option<f64>,
    /// Container/codec label ("WAV", "FLAC", "MPEG-4", ...)
    pub format: Option<String>,
    pub sample_rate_hz: Option<u32>,
    pub bit_depth: Option<u8>,
    pub channels: Option<u8>,
    /// Size on disk in bytes
    pub file_size_bytes: u64,
}

/// Media probing error
#[derive(Debug, Error)]
pub enum ProbeError {
    /// I/O error (file read)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File type not supported by the prober
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container parsed but properties could not be read
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Extracts technical properties from media files.
///
/// The production implementation reads container headers; tests use a
/// fixed-answer fake so deep-mode logic stays deterministic.
pub trait MediaProber: Send + Sync {
    /// Prober name for log provenance
    fn name(&self) -> &'static str;

    /// Probe a file on disk.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` when the file cannot be read or its container
    /// is not one the prober understands.
    fn probe(&self, path: &Path) -> Result<TechnicalMetadata, ProbeError>;
}

// ============================================================================
// Schema Validation
// ============================================================================

/// One schema violation inside a metadata document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value ("/technical/durationMilliseconds")
    pub pointer: String,
    /// Validator message
    pub message: String,
}

/// Validates metadata documents against the per-family schema.
pub trait SchemaOracle: Send + Sync {
    /// Oracle name for log provenance
    fn name(&self) -> &'static str;

    /// Validate a parsed document against a family's schema, returning
    /// every violation found.
    fn validate(&self, family: SchemaFamily, document: &serde_json::Value) -> Vec<SchemaViolation>;
}
