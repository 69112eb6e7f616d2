//! avbag-validate - preservation bag validation
//!
//! Validates BagIt packages produced by audio/video digitization in
//! three sequential stages per bag:
//!
//! 1. **Structure** ([`inspector`]): required tag files, role
//!    directory layout, filename grammar, hidden files
//! 2. **Integrity** ([`verifier`]): Payload-Oxum, manifest entry sets,
//!    payload and tag checksums
//! 3. **Metadata** ([`metadata`]): JSON sidecar pairing, encoding,
//!    schema conformance, and (deep mode) probed technical properties
//!
//! Stages accumulate complete defect lists rather than stopping at the
//! first finding; [`runner`] fans bags out across a worker pool and
//! folds the reports into a run summary.

pub mod inspector;
pub mod metadata;
pub mod runner;
pub mod types;
pub mod verifier;

pub use inspector::Inspector;
pub use metadata::{CompiledSchemaOracle, LoftyProber, MetadataChecker};
pub use runner::{RunOptions, Runner};
pub use types::{MediaProber, SchemaOracle, SchemaViolation, SourceFormat, TechnicalMetadata};
pub use verifier::Verifier;
