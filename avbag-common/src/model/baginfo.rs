//! bag-info.txt parsing with field preservation
//!
//! Repair rewrites `Payload-Oxum` and `Bag-Size` in place; every other
//! field must survive byte-for-byte, including unknown labels, field
//! order and folded continuation lines. Fields therefore keep their raw
//! source lines and only a replaced field is re-rendered.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::oxum::Oxum;

/// Label of the oxum field
pub const PAYLOAD_OXUM: &str = "Payload-Oxum";
/// Label of the human-readable size field
pub const BAG_SIZE: &str = "Bag-Size";

/// One logical field: label, folded value, original source lines
#[derive(Debug, Clone)]
struct Field {
    name: String,
    value: String,
    raw: Vec<String>,
}

/// Parsed `bag-info.txt`
#[derive(Debug, Clone)]
pub struct BagInfo {
    fields: Vec<Field>,
}

impl BagInfo {
    /// Parse bag-info content.
    ///
    /// `Label: value` lines; a line starting with space or tab continues
    /// the previous value (RFC 2822 style folding). A non-continuation
    /// line without a colon fails the parse.
    pub fn parse(content: &str) -> Result<BagInfo> {
        let mut fields: Vec<Field> = Vec::new();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.starts_with(' ') || line.starts_with('\t') {
                match fields.last_mut() {
                    Some(field) => {
                        field.value.push(' ');
                        field.value.push_str(line.trim());
                        field.raw.push(line.to_string());
                        continue;
                    }
                    None => {
                        return Err(Error::TagFile {
                            path: "bag-info.txt".into(),
                            reason: format!("line {}: continuation with no field", lineno + 1),
                        })
                    }
                }
            }
            if line.is_empty() {
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| Error::TagFile {
                path: "bag-info.txt".into(),
                reason: format!("line {}: missing colon", lineno + 1),
            })?;

            fields.push(Field {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
                raw: vec![line.to_string()],
            });
        }

        Ok(BagInfo { fields })
    }

    /// Load and parse bag-info.txt from disk
    pub fn load(path: &Path) -> Result<BagInfo> {
        let content = fs::read_to_string(path).map_err(|e| Error::TagFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::TagFile { reason, .. } => Error::TagFile {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// First value for a label, matched case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// The declared `Payload-Oxum`, if present and well-formed
    pub fn payload_oxum(&self) -> Option<Oxum> {
        self.get(PAYLOAD_OXUM).and_then(Oxum::parse)
    }

    /// Replace a field's value, or append the field if absent.
    ///
    /// A replaced field is re-rendered as a single `Name: value` line; the
    /// original label spelling is kept, the rest of the file untouched.
    pub fn set(&mut self, name: &str, value: &str) {
        match self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) => {
                field.value = value.to_string();
                field.raw = vec![format!("{}: {}", field.name, value)];
            }
            None => {
                self.fields.push(Field {
                    name: name.to_string(),
                    value: value.to_string(),
                    raw: vec![format!("{}: {}", name, value)],
                });
            }
        }
    }

    /// Render back to file content, LF line endings
    pub fn to_content(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            for line in &field.raw {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
