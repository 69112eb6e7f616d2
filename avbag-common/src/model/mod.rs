//! The bag data model: roles, filenames, tag files, payload enumeration

pub mod bag;
pub mod baginfo;
pub mod filename;
pub mod manifest;
pub mod oxum;
pub mod roles;

pub use bag::{Bag, BagDeclaration, PayloadFile};
pub use baginfo::BagInfo;
pub use filename::ParsedFilename;
pub use manifest::{Manifest, ManifestEntry};
pub use oxum::Oxum;
pub use roles::{Role, RoleDir};
