//! SQL Server deployment topology
//!
//! A topology is discovered once per run and decides which endpoints need
//! SPNs:
//! - Standalone: one instance on one host
//! - Clustered: one instance behind a failover cluster network name
//! - AvailabilityGroup: every replica plus the group listener

pub mod file;
pub mod sql;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KerbcheckError;

pub use file::FileTopologySource;
pub use sql::SqlTopologySource;

/// Instance name SQL Server uses for the default instance.
pub const DEFAULT_INSTANCE: &str = "MSSQLSERVER";

/// Default TCP port of the database engine.
pub const DEFAULT_PORT: u16 = 1433;

/// Target server as given on the command line: `host` or `host\instance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentifier {
    pub host: String,
    pub instance: Option<String>,
}

impl ServerIdentifier {
    pub fn parse(input: &str) -> Result<Self, KerbcheckError> {
        let invalid = |reason: &str| KerbcheckError::InvalidServerIdentifier {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (host, instance) = match input.split_once('\\') {
            Some((host, instance)) => (host.trim(), Some(instance.trim())),
            None => (input.trim(), None),
        };

        if host.is_empty() {
            return Err(invalid("host name is empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(invalid("host name contains whitespace"));
        }

        let instance = match instance {
            Some("") => return Err(invalid("instance name is empty")),
            Some(name) if name.eq_ignore_ascii_case(DEFAULT_INSTANCE) => None,
            Some(name) => Some(name.to_string()),
            None => None,
        };

        Ok(Self {
            host: host.to_string(),
            instance,
        })
    }

    pub fn is_default_instance(&self) -> bool {
        self.instance.is_none()
    }
}

impl fmt::Display for ServerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}\\{}", self.host, instance),
            None => f.write_str(&self.host),
        }
    }
}

impl FromStr for ServerIdentifier {
    type Err = KerbcheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// What kind of network endpoint an SPN set is derived for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Default instance: `MSSQLSvc/host:port` and `MSSQLSvc/host`
    DefaultInstance,
    /// Named instance: `MSSQLSvc/host:port` and `MSSQLSvc/host:INSTANCE`
    NamedInstance(String),
    /// Availability group listener: `MSSQLSvc/listener:port`
    Listener,
}

/// A network name and TCP port clients connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub network_name: String,
    pub port: u16,
    pub kind: EndpointKind,
}

impl Endpoint {
    /// Endpoint for an instance; `MSSQLSERVER` or no name means the default instance.
    pub fn instance(network_name: impl Into<String>, port: u16, instance: Option<&str>) -> Self {
        let kind = match instance {
            Some(name) if !name.is_empty() && !name.eq_ignore_ascii_case(DEFAULT_INSTANCE) => {
                EndpointKind::NamedInstance(name.to_string())
            }
            _ => EndpointKind::DefaultInstance,
        };
        Self {
            network_name: network_name.into(),
            port,
            kind,
        }
    }

    pub fn listener(network_name: impl Into<String>, port: u16) -> Self {
        Self {
            network_name: network_name.into(),
            port,
            kind: EndpointKind::Listener,
        }
    }
}

/// One SQL Server instance and the raw service account it runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub endpoint: Endpoint,
    pub service_account: String,
}

impl Node {
    pub fn new(endpoint: Endpoint, service_account: impl Into<String>) -> Self {
        Self {
            endpoint,
            service_account: service_account.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Topology {
    Standalone {
        node: Node,
    },
    Clustered {
        node: Node,
    },
    AvailabilityGroup {
        name: String,
        nodes: Vec<Node>,
        listener: Endpoint,
    },
}

impl Topology {
    pub fn mode(&self) -> &'static str {
        match self {
            Topology::Standalone { .. } => "standalone",
            Topology::Clustered { .. } => "clustered",
            Topology::AvailabilityGroup { .. } => "availability group",
        }
    }

    pub fn is_availability_group(&self) -> bool {
        matches!(self, Topology::AvailabilityGroup { .. })
    }

    /// Member nodes in discovery order.
    pub fn nodes(&self) -> &[Node] {
        match self {
            Topology::Standalone { node } | Topology::Clustered { node } => {
                std::slice::from_ref(node)
            }
            Topology::AvailabilityGroup { nodes, .. } => nodes,
        }
    }

    /// Every endpoint that needs SPNs: the nodes, then the listener if any.
    pub fn endpoints(&self) -> Vec<&Endpoint> {
        let mut endpoints: Vec<&Endpoint> = self.nodes().iter().map(|n| &n.endpoint).collect();
        if let Topology::AvailabilityGroup { listener, .. } = self {
            endpoints.push(listener);
        }
        endpoints
    }
}

/// Discovers the topology of a SQL Server target.
pub trait TopologySource {
    /// Classify `server` and enumerate its endpoints.
    ///
    /// An `availability_group` that yields no replicas must fail with
    /// [`KerbcheckError::EmptyAvailabilityGroup`].
    fn discover(
        &self,
        server: &ServerIdentifier,
        availability_group: Option<&str>,
    ) -> anyhow::Result<Topology>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_host_only() {
        let server = ServerIdentifier::parse("sql01").unwrap();
        assert_eq!(server.host, "sql01");
        assert!(server.is_default_instance());
        assert_eq!(server.to_string(), "sql01");
    }

    #[test]
    fn test_parse_server_named_instance() {
        let server: ServerIdentifier = "sql01\\INST1".parse().unwrap();
        assert_eq!(server.host, "sql01");
        assert_eq!(server.instance.as_deref(), Some("INST1"));
        assert_eq!(server.to_string(), "sql01\\INST1");
    }

    #[test]
    fn test_parse_server_default_instance_name() {
        let server = ServerIdentifier::parse("sql01\\mssqlserver").unwrap();
        assert!(server.is_default_instance());
    }

    #[test]
    fn test_parse_server_rejects_empty_parts() {
        assert!(ServerIdentifier::parse("").is_err());
        assert!(ServerIdentifier::parse("\\INST1").is_err());
        assert!(ServerIdentifier::parse("sql01\\").is_err());
        assert!(ServerIdentifier::parse("sql 01").is_err());
    }

    #[test]
    fn test_endpoint_instance_kinds() {
        assert_eq!(
            Endpoint::instance("sql01", 1433, None).kind,
            EndpointKind::DefaultInstance
        );
        assert_eq!(
            Endpoint::instance("sql01", 1433, Some("MSSQLSERVER")).kind,
            EndpointKind::DefaultInstance
        );
        assert_eq!(
            Endpoint::instance("sql01", 50001, Some("INST1")).kind,
            EndpointKind::NamedInstance("INST1".to_string())
        );
    }

    #[test]
    fn test_availability_group_endpoints_include_listener() {
        let topology = Topology::AvailabilityGroup {
            name: "AG1".to_string(),
            nodes: vec![
                Node::new(Endpoint::instance("sql01", 1433, None), "ABCORP\\svc"),
                Node::new(Endpoint::instance("sql02", 1433, None), "ABCORP\\svc"),
            ],
            listener: Endpoint::listener("aglsn", 1433),
        };

        let names: Vec<_> = topology
            .endpoints()
            .iter()
            .map(|e| e.network_name.as_str())
            .collect();
        assert_eq!(names, vec!["sql01", "sql02", "aglsn"]);
        assert!(topology.is_availability_group());
    }

    #[test]
    fn test_topology_serializes_with_mode_tag() {
        let topology = Topology::Standalone {
            node: Node::new(Endpoint::instance("sql01", 1433, None), "ABCORP\\svc"),
        };
        let json = serde_json::to_value(&topology).unwrap();
        assert_eq!(json["mode"], "standalone");
        assert_eq!(json["node"]["endpoint"]["network_name"], "sql01");
    }
}
