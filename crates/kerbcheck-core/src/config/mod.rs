//! Configuration for kerbcheck
//!
//! Supports two configuration scopes:
//! - Global: `<config_dir>/kerbcheck/kerbcheck.toml`
//! - Project: `./kerbcheck.toml`, layered over the global file

pub mod merge;
pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

use serde::{Deserialize, Serialize};

pub use merge::merge_configs;
pub use parser::{parse_kerbcheck_toml, parse_kerbcheck_toml_str};
pub use paths::{CONFIG_FILE_NAME, config_path_for_scope};
pub use schema::{DirectoryConfig, KerbcheckConfig, PowerShellConfig, SpnConfig, TopologyConfig};
pub use store::ConfigStore;

/// Configuration scope levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigScope {
    /// Per-user configuration
    Global,
    /// Working-directory configuration
    Project,
}
