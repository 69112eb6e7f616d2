//! Typed view over a parsed metadata sidecar document
//!
//! Field access goes through JSON pointers so a malformed or partial
//! document degrades to `None` instead of a panic; whether a field is
//! allowed to be absent is the schema's decision, not this module's.

use serde_json::Value;

/// A parsed sidecar document
#[derive(Debug, Clone)]
pub struct Sidecar {
    value: Value,
}

impl Sidecar {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// The raw document, for schema validation
    pub fn document(&self) -> &Value {
        &self.value
    }

    /// `asset.referenceFilename`: the media filename this record describes
    pub fn reference_filename(&self) -> Option<&str> {
        self.str_at("/asset/referenceFilename")
    }

    /// `technical.filename`: the filename root, without extension
    pub fn technical_filename(&self) -> Option<&str> {
        self.str_at("/technical/filename")
    }

    /// `technical.extension`
    pub fn extension(&self) -> Option<&str> {
        self.str_at("/technical/extension")
    }

    /// `source.object.format`: selects the validation schema
    pub fn source_format(&self) -> Option<&str> {
        self.str_at("/source/object/format")
    }

    /// `technical.fileFormat`: container label as recorded by the vendor
    pub fn file_format(&self) -> Option<&str> {
        self.str_at("/technical/fileFormat")
    }

    /// `technical.fileSize.measure`, in bytes
    pub fn file_size_bytes(&self) -> Option<u64> {
        self.value.pointer("/technical/fileSize/measure")?.as_u64()
    }

    /// `technical.durationMilli.measure`, in milliseconds
    pub fn duration_millis(&self) -> Option<f64> {
        self.value.pointer("/technical/durationMilli/measure")?.as_f64()
    }

    fn str_at(&self, pointer: &str) -> Option<&str> {
        self.value.pointer(pointer)?.as_str()
    }
}
