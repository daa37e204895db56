//! Configuration schema for kerbcheck.toml
//!
//! Every field is optional so that a project file only needs to name what it
//! overrides in the global file.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::account::ServiceAccount;
use crate::powershell::DEFAULT_EXECUTABLE;

/// Environment variable read for the admin password when none is configured.
pub const DEFAULT_PASSWORD_ENV: &str = "KERBCHECK_ADMIN_PASSWORD";

/// Root configuration structure for kerbcheck.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KerbcheckConfig {
    #[serde(default)]
    pub powershell: PowerShellConfig,

    #[serde(default)]
    pub spn: SpnConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub topology: TopologyConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerShellConfig {
    /// `powershell` or `pwsh`, or a full path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpnConfig {
    /// DNS suffix appended to short network names to derive FQDN SPNs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_suffix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Domain controller passed as `-Server` to the AD cmdlets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Account used to register SPNs (`DOMAIN\user` or `user@domain`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,

    /// Environment variable holding the admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Topology descriptor used instead of querying the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl PowerShellConfig {
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(DEFAULT_EXECUTABLE)
    }
}

impl DirectoryConfig {
    pub fn password_env(&self) -> &str {
        self.password_env.as_deref().unwrap_or(DEFAULT_PASSWORD_ENV)
    }
}

impl KerbcheckConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(executable) = &self.powershell.executable
            && executable.trim().is_empty()
        {
            anyhow::bail!("powershell.executable must not be empty");
        }

        if let Some(suffix) = &self.spn.dns_suffix {
            if suffix.trim().is_empty() {
                anyhow::bail!("spn.dns_suffix must not be empty");
            }
            if suffix.starts_with('.') {
                anyhow::bail!("spn.dns_suffix must not start with '.': {}", suffix);
            }
        }

        if let Some(user) = &self.directory.admin_user {
            ServiceAccount::resolve(user).context("Invalid directory.admin_user")?;
        }

        if let Some(name) = &self.directory.password_env
            && (name.is_empty() || name.contains('='))
        {
            anyhow::bail!("directory.password_env is not a valid variable name: '{}'", name);
        }

        Ok(())
    }
}
