//! JSON Schema oracle backed by compiled draft-07 schemas
//!
//! One schema per family (audio/video/film). The binary embeds a
//! default set so validation works out of the box; a configured schema
//! directory replaces all three at startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::info;

use avbag_common::{Error, Result};

use crate::types::{SchemaFamily, SchemaOracle, SchemaViolation};

const AUDIO_SCHEMA: &str = include_str!("../../schemas/audio.json");
const VIDEO_SCHEMA: &str = include_str!("../../schemas/video.json");
const FILM_SCHEMA: &str = include_str!("../../schemas/film.json");

/// Compiled per-family schema set
pub struct CompiledSchemaOracle {
    schemas: BTreeMap<SchemaFamily, JSONSchema>,
}

impl CompiledSchemaOracle {
    /// Compile the schemas embedded in the binary.
    pub fn embedded() -> Result<Self> {
        let mut schemas = BTreeMap::new();
        for family in SchemaFamily::ALL {
            let raw = match family {
                SchemaFamily::Audio => AUDIO_SCHEMA,
                SchemaFamily::Video => VIDEO_SCHEMA,
                SchemaFamily::Film => FILM_SCHEMA,
            };
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| Error::Internal(format!("embedded {} schema: {}", family, e)))?;
            schemas.insert(family, compile(family, value)?);
        }
        Ok(Self { schemas })
    }

    /// Compile `audio.json`, `video.json` and `film.json` from a schema
    /// directory. All three must be present; a partial set would make
    /// validation results depend on which bag happened to be checked.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut schemas = BTreeMap::new();
        for family in SchemaFamily::ALL {
            let path = dir.join(family.schema_file_name());
            let raw = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("cannot read schema {}: {}", path.display(), e))
            })?;
            let value: Value = serde_json::from_str(&raw).map_err(|e| {
                Error::Config(format!("schema {} is not valid JSON: {}", path.display(), e))
            })?;
            schemas.insert(family, compile(family, value)?);
        }
        info!(dir = %dir.display(), "Loaded metadata schemas");
        Ok(Self { schemas })
    }
}

/// Compilation errors borrow the schema document. The set is built once
/// at startup and lives for the whole run, so the three documents are
/// leaked rather than threaded through every caller.
fn compile(family: SchemaFamily, schema: Value) -> Result<JSONSchema> {
    let schema: &'static Value = Box::leak(Box::new(schema));
    JSONSchema::compile(schema)
        .map_err(|e| Error::Config(format!("{} schema does not compile: {}", family, e)))
}

impl SchemaOracle for CompiledSchemaOracle {
    fn name(&self) -> &'static str {
        "jsonschema"
    }

    fn validate(&self, family: SchemaFamily, document: &Value) -> Vec<SchemaViolation> {
        let compiled = match self.schemas.get(&family) {
            Some(compiled) => compiled,
            // Unreachable with the constructors above; reported rather
            // than swallowed in case a future constructor loads less
            None => {
                return vec![SchemaViolation {
                    pointer: String::new(),
                    message: format!("no schema loaded for family \"{}\"", family),
                }]
            }
        };
        match compiled.validate(document) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| SchemaViolation {
                    pointer: e.instance_path.to_string(),
                    message: e.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conformant_audio_document() -> Value {
        json!({
            "asset": { "referenceFilename": "myd_123456_v01_pm.wav", "fileRole": "pm" },
            "bibliographic": { "primaryID": "123456", "division": "myd" },
            "source": { "object": { "type": "audio cassette", "format": "audio cassette analog" } },
            "technical": {
                "filename": "myd_123456_v01_pm",
                "extension": "wav",
                "fileFormat": "WAV",
                "audioCodec": "PCM",
                "fileSize": { "measure": 527415296, "unit": "bytes" },
                "durationMilli": { "measure": 1832000, "unit": "ms" }
            }
        })
    }

    #[test]
    fn test_embedded_schemas_compile() {
        CompiledSchemaOracle::embedded().unwrap();
    }

    #[test]
    fn test_conformant_document_passes() {
        let oracle = CompiledSchemaOracle::embedded().unwrap();
        let violations = oracle.validate(SchemaFamily::Audio, &conformant_audio_document());
        assert!(violations.is_empty(), "unexpected: {:?}", violations);
    }

    #[test]
    fn test_missing_section_reported() {
        let oracle = CompiledSchemaOracle::embedded().unwrap();
        let mut document = conformant_audio_document();
        document.as_object_mut().unwrap().remove("technical");
        let violations = oracle.validate(SchemaFamily::Audio, &document);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("technical"));
    }

    #[test]
    fn test_all_violations_reported() {
        let oracle = CompiledSchemaOracle::embedded().unwrap();
        let document = json!({
            "asset": { "referenceFilename": "", "fileRole": "xx" },
            "bibliographic": { "primaryID": "123456" },
            "source": { "object": { "type": "audio cassette", "format": "audio cassette analog" } },
            "technical": {
                "filename": "myd_123456_v01_pm",
                "extension": "wav",
                "fileFormat": "WAV",
                "audioCodec": "PCM",
                "fileSize": { "measure": 527415296, "unit": "bytes" },
                "durationMilli": { "measure": 1832000, "unit": "ms" }
            }
        });
        let violations = oracle.validate(SchemaFamily::Audio, &document);
        // Empty referenceFilename and unknown fileRole
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.pointer.contains("referenceFilename")));
        assert!(violations.iter().any(|v| v.pointer.contains("fileRole")));
    }

    #[test]
    fn test_from_dir_requires_all_families() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("audio.json"), AUDIO_SCHEMA).unwrap();
        // video.json and film.json missing
        assert!(CompiledSchemaOracle::from_dir(tmp.path()).is_err());
    }

    #[test]
    fn test_from_dir_loads_complete_set() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("audio.json"), AUDIO_SCHEMA).unwrap();
        std::fs::write(tmp.path().join("video.json"), VIDEO_SCHEMA).unwrap();
        std::fs::write(tmp.path().join("film.json"), FILM_SCHEMA).unwrap();
        let oracle = CompiledSchemaOracle::from_dir(tmp.path()).unwrap();
        assert!(oracle
            .validate(SchemaFamily::Audio, &conformant_audio_document())
            .is_empty());
    }
}
