//! Bag structure inspection (stage 1)
//!
//! Walks a candidate bag and reports every structural defect: missing
//! tag files, missing or empty role directories, files outside their
//! role directory, names that break the filename grammar, hidden files,
//! zero-byte payload. Read-only; nothing is skipped silently.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use avbag_common::model::bag::{Bag, BAGIT_TXT, BAG_INFO_TXT, DATA_DIR};
use avbag_common::model::filename::{is_hidden_name, ParsedFilename};
use avbag_common::model::roles::RoleDir;
use avbag_common::model::BagDeclaration;
use avbag_common::{Defect, DefectKind, Error, Result};

/// Stage-1 structural inspector
pub struct Inspector;

impl Inspector {
    pub fn new() -> Self {
        Self
    }

    /// Inspect a bag, returning the complete structural defect list.
    /// Empty means structurally valid.
    pub fn inspect(&self, bag: &Bag) -> Result<Vec<Defect>> {
        let mut defects = Vec::new();

        self.check_required_files(bag, &mut defects)?;
        self.check_hidden_entries(bag, &mut defects)?;
        self.check_payload_layout(bag, &mut defects)?;

        debug!(
            bag = bag.name(),
            defects = defects.len(),
            "Structure inspection complete"
        );
        Ok(defects)
    }

    /// bagit.txt (with a sane declaration), bag-info.txt, and at least
    /// one payload manifest must exist at the root.
    fn check_required_files(&self, bag: &Bag, defects: &mut Vec<Defect>) -> Result<()> {
        if !bag.bagit_txt().is_file() {
            defects.push(Defect::at(
                DefectKind::MissingRequiredFile,
                BAGIT_TXT,
                "bag declaration missing",
            ));
        } else {
            match bag.declaration() {
                Ok(declaration) if declaration.is_supported() => {}
                Ok(declaration) => defects.push(Defect::at(
                    DefectKind::MissingRequiredFile,
                    BAGIT_TXT,
                    format!(
                        "unsupported declaration (BagIt-Version {:?}, encoding {:?})",
                        declaration.version, declaration.encoding
                    ),
                )),
                Err(Error::TagFile { reason, .. }) => defects.push(Defect::at(
                    DefectKind::MissingRequiredFile,
                    BAGIT_TXT,
                    format!("malformed declaration: {}", reason),
                )),
                Err(e) => return Err(e),
            }
        }

        if !bag.bag_info_txt().is_file() {
            defects.push(Defect::at(
                DefectKind::MissingRequiredFile,
                BAG_INFO_TXT,
                "bag metadata missing",
            ));
        }

        if bag.manifest_algorithms().is_empty() {
            defects.push(Defect::new(
                DefectKind::MissingRequiredFile,
                "no payload manifest (manifest-md5.txt or manifest-sha256.txt)",
            ));
        }

        Ok(())
    }

    /// Hidden files and directories anywhere under the bag root. A
    /// hidden directory is reported once and not descended into.
    fn check_hidden_entries(&self, bag: &Bag, defects: &mut Vec<Defect>) -> Result<()> {
        let mut walker = WalkDir::new(bag.root())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk {}: {}", bag.root().display(), e),
                ))
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if is_hidden_name(&name) {
                defects.push(Defect::at(
                    DefectKind::UnexpectedHiddenFile,
                    rel_of(bag, entry.path()),
                    "hidden file or directory",
                ));
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
            }
        }

        Ok(())
    }

    /// data/ exists, holds at least one recognized role directory, no
    /// role directory is payload-empty, and every payload file sits in
    /// the right place under a conforming name.
    fn check_payload_layout(&self, bag: &Bag, defects: &mut Vec<Defect>) -> Result<()> {
        let data = bag.data_dir();
        if !data.is_dir() {
            defects.push(Defect::at(
                DefectKind::MissingRequiredSubdir,
                DATA_DIR,
                "payload directory missing",
            ));
            return Ok(());
        }

        // Top level of data/: recognized role directories only
        let mut entries: Vec<_> = fs::read_dir(&data)
            .map_err(Error::Io)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(Error::Io)?;
        entries.sort_by_key(|e| e.file_name());

        let mut role_dirs: Vec<RoleDir> = Vec::new();
        for entry in &entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_name(&name) {
                continue; // reported by the hidden scan
            }
            let file_type = entry.file_type().map_err(Error::Io)?;
            if file_type.is_dir() {
                match RoleDir::from_dir_name(&name) {
                    Some(role_dir) => role_dirs.push(role_dir),
                    None => defects.push(Defect::at(
                        DefectKind::MislocatedFile,
                        format!("{}/{}", DATA_DIR, name),
                        "unrecognized directory under data/",
                    )),
                }
            } else {
                defects.push(Defect::at(
                    DefectKind::MislocatedFile,
                    format!("{}/{}", DATA_DIR, name),
                    "file outside any role directory",
                ));
            }
        }

        if role_dirs.is_empty() {
            defects.push(Defect::at(
                DefectKind::MissingRequiredSubdir,
                DATA_DIR,
                "no role directory (PreservationMasters, EditMasters, ...) under data/",
            ));
        }

        let payload = bag.payload_files()?;
        let visible: Vec<_> = payload.iter().filter(|f| !f.hidden).collect();

        // Payload-empty role directories
        for role_dir in &role_dirs {
            let prefix = format!("{}/{}/", DATA_DIR, role_dir.dir_name());
            if !visible.iter().any(|f| f.rel.starts_with(&prefix)) {
                defects.push(Defect::at(
                    DefectKind::EmptySubdir,
                    format!("{}/{}", DATA_DIR, role_dir.dir_name()),
                    "role directory contains no payload files",
                ));
            }
        }

        // Per-file checks inside recognized role directories
        let known: BTreeSet<&str> = role_dirs.iter().map(|d| d.dir_name()).collect();
        for file in &visible {
            let segments: Vec<&str> = file.rel.split('/').collect();
            // rel is "data/<top>/..."; files directly under data/ were
            // already reported above
            if segments.len() < 3 {
                continue;
            }
            let top = segments[1];
            if !known.contains(top) {
                continue; // inside an already-reported unknown directory
            }
            let role_dir = match RoleDir::from_dir_name(top) {
                Some(d) => d,
                None => continue,
            };
            self.check_payload_file(bag, role_dir, &file.rel, file.size, defects);
        }

        Ok(())
    }

    fn check_payload_file(
        &self,
        bag: &Bag,
        role_dir: RoleDir,
        rel: &str,
        size: u64,
        defects: &mut Vec<Defect>,
    ) {
        if size == 0 {
            defects.push(Defect::at(
                DefectKind::ZeroByteFile,
                rel,
                "zero-length payload file",
            ));
        }

        let file_name = rel.rsplit('/').next().unwrap_or(rel);
        let parsed = match ParsedFilename::parse(file_name) {
            Some(parsed) => parsed,
            None => {
                defects.push(Defect::at(
                    DefectKind::UnrecognizedFilename,
                    rel,
                    "name does not follow the <division>_<id>_<components>_<role> convention",
                ));
                return;
            }
        };

        match (role_dir.expected_role(), parsed.role) {
            (Some(expected), Some(actual)) if expected != actual => {
                defects.push(Defect::at(
                    DefectKind::MislocatedFile,
                    rel,
                    format!(
                        "role suffix '{}' belongs in {}/",
                        actual,
                        actual.directory().dir_name()
                    ),
                ));
            }
            (Some(expected), None) => {
                defects.push(Defect::at(
                    DefectKind::MislocatedFile,
                    rel,
                    format!("missing role suffix '{}' for {}/", expected, role_dir.dir_name()),
                ));
            }
            (None, Some(actual)) => {
                defects.push(Defect::at(
                    DefectKind::MislocatedFile,
                    rel,
                    format!(
                        "role suffix '{}' belongs in {}/",
                        actual,
                        actual.directory().dir_name()
                    ),
                ));
            }
            _ => {}
        }

        if !bag_name_matches(bag.name(), &parsed.primary_id) {
            defects.push(Defect::at(
                DefectKind::MislocatedFile,
                rel,
                format!(
                    "primary ID '{}' does not match bag '{}'",
                    parsed.primary_id,
                    bag.name()
                ),
            ));
        }
    }
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

/// Bag directory names carry the Primary ID either bare or as an
/// underscore-delimited segment (`123456`, `myd_123456`).
fn bag_name_matches(bag_name: &str, primary_id: &str) -> bool {
    bag_name == primary_id || bag_name.split('_').any(|segment| segment == primary_id)
}

fn rel_of(bag: &Bag, path: &Path) -> String {
    path.strip_prefix(bag.root())
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
