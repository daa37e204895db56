//! Application context for dependency injection.

use std::path::{Path, PathBuf};

use crate::config::paths::default_global_dir;
use crate::config::{ConfigScope, ConfigStore, KerbcheckConfig, merge_configs, parse_kerbcheck_toml};
use crate::derive::StandardSpnSource;
use crate::directory::ActiveDirectory;
use crate::powershell::PowerShell;
use crate::topology::{FileTopologySource, SqlTopologySource, TopologySource};

/// Loaded configuration plus the paths it was resolved against.
///
/// Frontends create this once and build collaborators from it.
#[derive(Debug, Clone)]
pub struct AppContext {
    project_root: PathBuf,
    config: KerbcheckConfig,
}

impl AppContext {
    /// Create a context from an already loaded configuration.
    pub fn new(project_root: PathBuf, config: KerbcheckConfig) -> Self {
        Self {
            project_root,
            config,
        }
    }

    /// Load global and project configuration from the default locations.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let global_dir = default_global_dir()?;
        let project_root = std::env::current_dir()?;
        Self::from_paths(&global_dir, project_root)
    }

    /// Load and merge configuration from explicit locations.
    pub fn from_paths(global_dir: &Path, project_root: PathBuf) -> anyhow::Result<Self> {
        let global = ConfigStore::from_paths(ConfigScope::Global, global_dir, &project_root).load()?;
        let project =
            ConfigStore::from_paths(ConfigScope::Project, global_dir, &project_root).load()?;
        Ok(Self::new(project_root, merge_configs(global, project)))
    }

    /// Load a single configuration file, bypassing the scope layers.
    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        let config = parse_kerbcheck_toml(path)?;
        let project_root = std::env::current_dir()?;
        Ok(Self::new(project_root, config))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &KerbcheckConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut KerbcheckConfig {
        &mut self.config
    }

    pub fn powershell(&self) -> PowerShell {
        PowerShell::new(self.config.powershell.executable())
    }

    pub fn spn_source(&self) -> StandardSpnSource {
        match &self.config.spn.dns_suffix {
            Some(suffix) => StandardSpnSource::new().with_dns_suffix(suffix),
            None => StandardSpnSource::new(),
        }
    }

    pub fn directory(&self) -> ActiveDirectory {
        let directory = ActiveDirectory::new(self.powershell());
        match &self.config.directory.server {
            Some(server) => directory.with_server(server),
            None => directory,
        }
    }

    /// Topology file resolved against the project root, if configured.
    pub fn topology_file(&self) -> Option<PathBuf> {
        self.config
            .topology
            .file
            .as_ref()
            .map(|file| self.project_root.join(file))
    }

    /// File-backed source when a descriptor is configured, else the live instance.
    pub fn topology_source(&self) -> Box<dyn TopologySource> {
        match self.topology_file() {
            Some(path) => Box::new(FileTopologySource::new(path)),
            None => Box::new(SqlTopologySource::new(self.powershell())),
        }
    }
}
