//! Audit Module
//!
//! Per-element auditing, as used by both masters and workers.
//!
//! ## Submodules
//! - **`checks`**: name → async check closure registry, plus built-in checks.
//! - **`engine`**: the `Auditor` seam and a pooled engine implementing it.
//! - **`results`**: deduplicating issue store and platform fingerprints.

pub mod checks;
pub mod engine;
pub mod results;
pub mod types;
