//! High-level commands for kerbcheck operations.
//!
//! These are the entry points frontends call; each one wires the configured
//! collaborators and returns a serializable report.

pub mod check;
pub mod required;

pub use check::{CheckCommand, CheckOptions, parse_remediation_flag, resolve_credential};
pub use required::{RequiredCommand, RequiredOptions, RequiredReport};

pub use crate::reconcile::CheckReport;
