//! ocinv
//! =====
//!
//! Build an inventory of container images hosted in OCI-compatible registries.
//!
//! - [inventory] walks a registry catalog and records one row per
//!   (repository, tag, platform, digest) tuple into a tab-separated table.
//! - [summary] aggregates that table into base-image groups and emits YAML.

pub mod distribution;
pub mod error;
pub mod inventory;
pub mod summary;

mod digest;

pub use digest::Digest;
