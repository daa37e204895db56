//! Config store for loading one kerbcheck.toml layer.

use std::path::{Path, PathBuf};

use super::{ConfigScope, KerbcheckConfig, parser, paths::config_path_for_scope};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    scope: ConfigScope,
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(scope: ConfigScope, global_dir: &Path, project_root: &Path) -> Self {
        Self {
            scope,
            config_path: config_path_for_scope(scope, global_dir, project_root),
        }
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the layer, or `None` when the file does not exist.
    pub fn load(&self) -> anyhow::Result<Option<KerbcheckConfig>> {
        if !self.config_path.exists() {
            return Ok(None);
        }
        parser::parse_kerbcheck_toml(&self.config_path).map(Some)
    }
}
