//! Payload filename grammar
//!
//! Media filenames follow the lab's naming convention:
//!
//! ```text
//! <division>_<primary id>[_v##[f##][r##][s##][p##]]_<role>.<ext>
//! ```
//!
//! - division: 2-4 lowercase letters (e.g. `myd`, `scb`)
//! - primary id: the inventory number, matching the bag directory name
//! - volume/face/region/stream/part indices, two digits each, in that
//!   order, later ones optional (`v01`, `v01f02`, `v02p01`)
//! - role suffix: `pm`, `em`, `sc`, `mz`; files in suffix-exempt
//!   directories (`Images/` etc.) omit it
//!
//! Sidecars share the media file's filename root and differ only in
//! extension (`.json` metadata, plus `.scc`/`.cue`/`.csv`/
//! `.qctools.xml.gz` auxiliary files).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::roles::Role;

/// Filename root pattern (applied after the extension is split off)
static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<div>[a-z]{2,4})_(?P<id>[A-Za-z0-9]+)(?:_(?P<comp>v\d{2}(?:f\d{2})?(?:r\d{2})?(?:s\d{2})?(?:p\d{2})?))?(?:_(?P<role>pm|em|sc|mz))?$",
    )
    .expect("filename regex is valid")
});

/// Component-group pattern (`v01f02r01s01p01` and prefixes thereof)
static COMPONENTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v(?P<v>\d{2})(?:f(?P<f>\d{2}))?(?:r(?P<r>\d{2}))?(?:s(?P<s>\d{2}))?(?:p(?P<p>\d{2}))?$")
        .expect("components regex is valid")
});

/// Compound extensions that must be split off whole
const COMPOUND_EXTENSIONS: [&str; 1] = ["qctools.xml.gz"];

/// Auxiliary sidecar extensions allowed alongside media in role directories
const AUXILIARY_SIDECAR_EXTENSIONS: [&str; 4] = ["scc", "cue", "csv", "qctools.xml.gz"];

// ============================================================================
// Parsed Filename
// ============================================================================

/// Volume/face/region/stream/part indices from the filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Components {
    pub volume: u8,
    pub face: Option<u8>,
    pub region: Option<u8>,
    pub stream: Option<u8>,
    pub part: Option<u8>,
}

/// A payload filename decomposed against the naming convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    /// Division code (`myd`, `scb`, ...)
    pub division: String,
    /// Primary ID segment; must match the bag directory name
    pub primary_id: String,
    /// Volume/face/region/stream/part indices, when present
    pub components: Option<Components>,
    /// Role suffix, when present
    pub role: Option<Role>,
    /// Filename without its extension; sidecar pairing key
    pub root: String,
    /// Extension, lowercased, without the leading dot (compound
    /// extensions kept whole: `qctools.xml.gz`)
    pub extension: String,
}

impl ParsedFilename {
    /// Parse a bare filename (no directory part) against the grammar.
    ///
    /// Returns `None` when the name does not follow the convention at all.
    pub fn parse(file_name: &str) -> Option<ParsedFilename> {
        let (root, extension) = split_extension(file_name);
        let caps = FILENAME_RE.captures(root)?;

        let components = match caps.name("comp") {
            Some(m) => Some(parse_components(m.as_str())?),
            None => None,
        };
        // Suffix alternation only admits the four known roles
        let role = caps.name("role").and_then(|m| Role::from_suffix(m.as_str()));

        Some(ParsedFilename {
            division: caps["div"].to_string(),
            primary_id: caps["id"].to_string(),
            components,
            role,
            root: root.to_string(),
            extension,
        })
    }

    /// Whether this file is the JSON metadata sidecar for its root
    pub fn is_json_sidecar(&self) -> bool {
        self.extension == "json"
    }

    /// Whether this file is an auxiliary sidecar (captions, cue sheets,
    /// QCTools reports) rather than media
    pub fn is_auxiliary_sidecar(&self) -> bool {
        AUXILIARY_SIDECAR_EXTENSIONS.contains(&self.extension.as_str())
    }
}

fn parse_components(s: &str) -> Option<Components> {
    let caps = COMPONENTS_RE.captures(s)?;
    let index = |name: &str| -> Option<u8> { caps.name(name)?.as_str().parse().ok() };
    Some(Components {
        volume: index("v")?,
        face: index("f"),
        region: index("r"),
        stream: index("s"),
        part: index("p"),
    })
}

// ============================================================================
// Name Helpers
// ============================================================================

/// Split a filename into (root, lowercased extension without dot).
///
/// Compound extensions split off whole so `x_sc.qctools.xml.gz` pairs with
/// `x_sc`. A name without a dot yields an empty extension.
pub fn split_extension(file_name: &str) -> (&str, String) {
    let lower = file_name.to_ascii_lowercase();
    for compound in COMPOUND_EXTENSIONS {
        let with_dot = format!(".{}", compound);
        if lower.ends_with(&with_dot) {
            return (&file_name[..file_name.len() - with_dot.len()], compound.to_string());
        }
    }
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], lower[idx + 1..].to_string()),
        _ => (file_name, String::new()),
    }
}

/// Whether a directory entry name is hidden by convention.
///
/// Dotfiles (`.DS_Store`, AppleDouble `._*`, `.git`) and Windows
/// `Thumbs.db` count as hidden anywhere in a bag.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.') || name.eq_ignore_ascii_case("thumbs.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_master() {
        let parsed = ParsedFilename::parse("myd_123456_v01_pm.wav").unwrap();
        assert_eq!(parsed.division, "myd");
        assert_eq!(parsed.primary_id, "123456");
        assert_eq!(parsed.role, Some(Role::Pm));
        assert_eq!(parsed.root, "myd_123456_v01_pm");
        assert_eq!(parsed.extension, "wav");
        let comp = parsed.components.unwrap();
        assert_eq!(comp.volume, 1);
        assert_eq!(comp.face, None);
    }

    #[test]
    fn test_parse_full_component_chain() {
        let parsed = ParsedFilename::parse("scb_987654_v01f02r01s01p01_em.flac").unwrap();
        let comp = parsed.components.unwrap();
        assert_eq!(comp.volume, 1);
        assert_eq!(comp.face, Some(2));
        assert_eq!(comp.region, Some(1));
        assert_eq!(comp.stream, Some(1));
        assert_eq!(comp.part, Some(1));
        assert_eq!(parsed.role, Some(Role::Em));
    }

    #[test]
    fn test_parse_without_components() {
        let parsed = ParsedFilename::parse("myh_263838_pm.wav").unwrap();
        assert_eq!(parsed.primary_id, "263838");
        assert!(parsed.components.is_none());
        assert_eq!(parsed.role, Some(Role::Pm));
    }

    #[test]
    fn test_parse_suffix_exempt_image() {
        let parsed = ParsedFilename::parse("myd_123456_v01.jpg").unwrap();
        assert_eq!(parsed.role, None);
        assert_eq!(parsed.extension, "jpg");
    }

    #[test]
    fn test_parse_rejects_nonconforming_names() {
        assert!(ParsedFilename::parse("MYD_123456_v01_pm.wav").is_none());
        assert!(ParsedFilename::parse("notes.txt").is_none());
        assert!(ParsedFilename::parse("myd-123456-v01-pm.wav").is_none());
        assert!(ParsedFilename::parse("m_123456_v01_pm.wav").is_none());
    }

    #[test]
    fn test_json_sidecar_shares_root() {
        let media = ParsedFilename::parse("myd_123456_v01_pm.wav").unwrap();
        let sidecar = ParsedFilename::parse("myd_123456_v01_pm.json").unwrap();
        assert_eq!(media.root, sidecar.root);
        assert!(sidecar.is_json_sidecar());
        assert!(!media.is_json_sidecar());
    }

    #[test]
    fn test_compound_extension_pairs_with_media_root() {
        let (root, ext) = split_extension("myd_123456_v01_sc.qctools.xml.gz");
        assert_eq!(root, "myd_123456_v01_sc");
        assert_eq!(ext, "qctools.xml.gz");
        let parsed = ParsedFilename::parse("myd_123456_v01_sc.qctools.xml.gz").unwrap();
        assert!(parsed.is_auxiliary_sidecar());
        assert_eq!(parsed.role, Some(Role::Sc));
    }

    #[test]
    fn test_extension_lowercased() {
        let parsed = ParsedFilename::parse("myd_123456_v01_pm.WAV").unwrap();
        assert_eq!(parsed.extension, "wav");
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden_name(".DS_Store"));
        assert!(is_hidden_name("._myd_123456_v01_pm.wav"));
        assert!(is_hidden_name("Thumbs.db"));
        assert!(!is_hidden_name("myd_123456_v01_pm.wav"));
    }
}
