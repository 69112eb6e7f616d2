//! Directed repair for delivered preservation bags
//!
//! Validation ([`avbag_validate`]) reports what is wrong with a bag;
//! this crate fixes the subset of those problems that have exactly one
//! correct resolution: stray hidden files, stale payload manifests, a
//! stale Payload-Oxum, and stale tag manifests. Each fix runs only when
//! directed ([`Directives`]), in a fixed order, and every repaired bag
//! is re-validated before the tool reports success.
//!
//! Anything without a single safe resolution (a truncated payload
//! file, a misnamed master) is refused and left for human correction
//! or vendor re-delivery.

pub mod engine;

pub use engine::{Directives, RepairEngine, RepairOutcome, RepairStep, StepOutcome};
