//! Review workflow engine for felling licence applications.
//!
//! The crate is a library consumed by an external host (HTTP layer, job
//! runner); it owns the status and assignment ledgers, the review
//! completion gates, and the document lifecycle rules, while persistence
//! and the other collaborators stay behind traits.

pub mod config;
pub mod workflows;

pub use config::{ConfigError, WorkflowConfig};
