//! Offline topology descriptors.
//!
//! ```toml
//! mode = "availability_group"
//! name = "AG1"
//!
//! [[nodes]]
//! network_name = "sql01"
//! port = 1433
//! service_account = "ABCORP\\sqlsvc"
//!
//! [[nodes]]
//! network_name = "sql02"
//! port = 1433
//! service_account = "ABCORP\\sqlsvc"
//!
//! [listener]
//! network_name = "aglsn"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_PORT, Endpoint, Node, ServerIdentifier, Topology, TopologySource};
use crate::error::KerbcheckError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyMode {
    Standalone,
    Clustered,
    AvailabilityGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub network_name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub instance: Option<String>,
    pub service_account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerEntry {
    pub network_name: String,
    /// Defaults to the first node's port
    #[serde(default)]
    pub port: Option<u16>,
}

/// Root of a topology descriptor file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyFile {
    pub mode: TopologyMode,
    /// Availability group name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub listener: Option<ListenerEntry>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl NodeEntry {
    fn to_node(&self) -> Node {
        Node::new(
            Endpoint::instance(self.network_name.clone(), self.port, self.instance.as_deref()),
            self.service_account.clone(),
        )
    }
}

impl TopologyFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        for node in &self.nodes {
            if node.network_name.trim().is_empty() {
                anyhow::bail!("Topology node has an empty network_name");
            }
        }

        match self.mode {
            TopologyMode::Standalone | TopologyMode::Clustered => {
                if self.nodes.len() != 1 {
                    anyhow::bail!(
                        "A {:?} topology needs exactly one node, found {}",
                        self.mode,
                        self.nodes.len()
                    );
                }
                if self.listener.is_some() {
                    anyhow::bail!("Only availability groups have a listener");
                }
            }
            TopologyMode::AvailabilityGroup => {
                if self.name.as_deref().is_none_or(str::is_empty) {
                    anyhow::bail!("An availability_group topology needs a name");
                }
                if self.listener.is_none() {
                    anyhow::bail!("An availability_group topology needs a [listener]");
                }
            }
        }
        Ok(())
    }

    /// Resolve the descriptor for a discovery request.
    ///
    /// Asking for an availability group the file does not describe, or one
    /// with no nodes, is the same fatal error as an empty query result.
    pub fn into_topology(
        self,
        server: &ServerIdentifier,
        availability_group: Option<&str>,
    ) -> anyhow::Result<Topology> {
        let empty_group = |group: &str| KerbcheckError::EmptyAvailabilityGroup {
            group: group.to_string(),
            server: server.to_string(),
        };

        if let Some(group) = availability_group {
            let matches = self.mode == TopologyMode::AvailabilityGroup
                && self
                    .name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(group));
            if !matches || self.nodes.is_empty() {
                return Err(empty_group(group).into());
            }
        }

        match self.mode {
            TopologyMode::Standalone => Ok(Topology::Standalone {
                node: self.single_node()?,
            }),
            TopologyMode::Clustered => Ok(Topology::Clustered {
                node: self.single_node()?,
            }),
            TopologyMode::AvailabilityGroup => {
                let name = self.name.clone().unwrap_or_default();
                if self.nodes.is_empty() {
                    return Err(empty_group(&name).into());
                }
                let nodes: Vec<Node> = self.nodes.iter().map(NodeEntry::to_node).collect();
                let listener = self
                    .listener
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("Availability group '{}' has no listener", name))?;
                let port = listener.port.unwrap_or(nodes[0].endpoint.port);
                Ok(Topology::AvailabilityGroup {
                    name,
                    listener: Endpoint::listener(listener.network_name.clone(), port),
                    nodes,
                })
            }
        }
    }

    fn single_node(&self) -> anyhow::Result<Node> {
        match self.nodes.as_slice() {
            [node] => Ok(node.to_node()),
            nodes => anyhow::bail!("Expected exactly one node, found {}", nodes.len()),
        }
    }
}

/// Parse a topology descriptor from a string.
pub fn parse_topology_str(content: &str) -> anyhow::Result<TopologyFile> {
    let file: TopologyFile =
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Invalid topology file: {}", e))?;
    file.validate()?;
    Ok(file)
}

/// Reads the topology from a TOML descriptor instead of a live instance.
#[derive(Debug, Clone)]
pub struct FileTopologySource {
    path: PathBuf,
}

impl FileTopologySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<TopologyFile> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read topology file: {}", self.path.display()))?;
        parse_topology_str(&content)
            .with_context(|| format!("Failed to parse topology file: {}", self.path.display()))
    }
}

impl TopologySource for FileTopologySource {
    fn discover(
        &self,
        server: &ServerIdentifier,
        availability_group: Option<&str>,
    ) -> anyhow::Result<Topology> {
        let file = self.load()?;
        tracing::debug!(path = %self.path.display(), mode = ?file.mode, "Loaded topology file");
        file.into_topology(server, availability_group)
    }
}
