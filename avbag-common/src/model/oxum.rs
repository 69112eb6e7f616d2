//! Payload-Oxum parsing and formatting
//!
//! The `Payload-Oxum` field in `bag-info.txt` encodes
//! `<total payload bytes>.<payload file count>` and is the cheap
//! completeness check a fast validation run relies on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed `Payload-Oxum` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oxum {
    /// Total payload size in bytes
    pub bytes: u64,
    /// Number of payload files
    pub count: u64,
}

impl Oxum {
    pub fn new(bytes: u64, count: u64) -> Self {
        Self { bytes, count }
    }

    /// Parse the `<bytes>.<count>` form.
    ///
    /// Both segments must be plain decimal integers; anything else
    /// (including a trailing segment) is rejected.
    pub fn parse(s: &str) -> Option<Oxum> {
        let (bytes, count) = s.trim().split_once('.')?;
        if bytes.is_empty() || count.is_empty() {
            return None;
        }
        if !bytes.bytes().all(|b| b.is_ascii_digit()) || !count.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Oxum {
            bytes: bytes.parse().ok()?,
            count: count.parse().ok()?,
        })
    }
}

impl fmt::Display for Oxum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bytes, self.count)
    }
}
