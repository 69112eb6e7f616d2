//! # AVBag Common Library
//!
//! Shared code for the AVBag validation and repair tools including:
//! - The bag data model (roles, filename grammar, manifests, bag-info,
//!   Payload-Oxum)
//! - Checksum primitives (md5/sha256, chunked, rayon batch hashing)
//! - The defect/report model
//! - Configuration loading
//! - Byte-count formatting

pub mod checksum;
pub mod config;
pub mod error;
pub mod human_size;
pub mod model;
pub mod report;

pub use error::{Error, Result};
pub use report::{BagReport, BagStatus, Defect, DefectKind, RunSummary, Stage};
