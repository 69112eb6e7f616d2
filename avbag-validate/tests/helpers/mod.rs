//! Test helper utilities
//!
//! Shared fixture builders for end-to-end validation tests

pub mod bag_builder;

// Re-export commonly used items
pub use bag_builder::{generate_wav, BagBuilder, RecordConfig, WavConfig};
