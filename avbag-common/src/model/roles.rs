//! Payload roles and role directories
//!
//! A bag's payload is organized into role directories under `data/`. Media
//! roles (`PreservationMasters`, `EditMasters`, `ServiceCopies`,
//! `Mezzanines`) hold digitization outputs whose filenames carry a matching
//! role suffix and require a JSON sidecar. `Images`, `ArchiveOriginals` and
//! `ProjectFiles` hold supporting material with no suffix or sidecar
//! requirement.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Media Roles
// ============================================================================

/// Media role, as encoded in the filename suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Preservation master (`pm`)
    Pm,
    /// Edit master (`em`)
    Em,
    /// Service copy (`sc`)
    Sc,
    /// Mezzanine (`mz`)
    Mz,
}

impl Role {
    /// Filename suffix for this role
    pub fn suffix(&self) -> &'static str {
        match self {
            Role::Pm => "pm",
            Role::Em => "em",
            Role::Sc => "sc",
            Role::Mz => "mz",
        }
    }

    /// Parse a filename suffix ("pm", "em", "sc", "mz")
    pub fn from_suffix(suffix: &str) -> Option<Role> {
        match suffix {
            "pm" => Some(Role::Pm),
            "em" => Some(Role::Em),
            "sc" => Some(Role::Sc),
            "mz" => Some(Role::Mz),
            _ => None,
        }
    }

    /// The role directory files with this suffix belong in
    pub fn directory(&self) -> RoleDir {
        match self {
            Role::Pm => RoleDir::PreservationMasters,
            Role::Em => RoleDir::EditMasters,
            Role::Sc => RoleDir::ServiceCopies,
            Role::Mz => RoleDir::Mezzanines,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// ============================================================================
// Role Directories
// ============================================================================

/// Recognized subdirectories of `data/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleDir {
    PreservationMasters,
    EditMasters,
    ServiceCopies,
    Mezzanines,
    Images,
    ArchiveOriginals,
    ProjectFiles,
}

impl RoleDir {
    /// All recognized role directories
    pub const ALL: [RoleDir; 7] = [
        RoleDir::PreservationMasters,
        RoleDir::EditMasters,
        RoleDir::ServiceCopies,
        RoleDir::Mezzanines,
        RoleDir::Images,
        RoleDir::ArchiveOriginals,
        RoleDir::ProjectFiles,
    ];

    /// Directory name as it appears under `data/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            RoleDir::PreservationMasters => "PreservationMasters",
            RoleDir::EditMasters => "EditMasters",
            RoleDir::ServiceCopies => "ServiceCopies",
            RoleDir::Mezzanines => "Mezzanines",
            RoleDir::Images => "Images",
            RoleDir::ArchiveOriginals => "ArchiveOriginals",
            RoleDir::ProjectFiles => "ProjectFiles",
        }
    }

    /// Parse a `data/` subdirectory name
    pub fn from_dir_name(name: &str) -> Option<RoleDir> {
        RoleDir::ALL.iter().copied().find(|d| d.dir_name() == name)
    }

    /// The role suffix files in this directory must carry, if any.
    ///
    /// `Images`, `ArchiveOriginals` and `ProjectFiles` are exempt.
    pub fn expected_role(&self) -> Option<Role> {
        match self {
            RoleDir::PreservationMasters => Some(Role::Pm),
            RoleDir::EditMasters => Some(Role::Em),
            RoleDir::ServiceCopies => Some(Role::Sc),
            RoleDir::Mezzanines => Some(Role::Mz),
            RoleDir::Images | RoleDir::ArchiveOriginals | RoleDir::ProjectFiles => None,
        }
    }

    /// Whether media files in this directory require a JSON sidecar
    pub fn requires_sidecar(&self) -> bool {
        self.expected_role().is_some()
    }
}

impl fmt::Display for RoleDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
