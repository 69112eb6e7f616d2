//! Common error types for the AVBag tools

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for AVBag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the AVBag tools
///
/// These represent the *tool* failing (unreadable directory, broken
/// configuration), never a bag failing validation. Validation findings are
/// data ([`crate::report::Defect`]) so a run can report every problem in a
/// bag instead of stopping at the first.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path expected to be a bag is missing or not a directory
    #[error("Not a bag: {0}")]
    NotABag(PathBuf),

    /// Tag file (bagit.txt, bag-info.txt, manifest) could not be parsed
    #[error("Unreadable tag file {path}: {reason}")]
    TagFile { path: PathBuf, reason: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
