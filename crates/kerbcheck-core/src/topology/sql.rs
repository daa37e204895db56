//! Topology discovery by querying the database engine through `Invoke-Sqlcmd`.

use anyhow::Context;
use serde::Deserialize;

use super::{Endpoint, Node, ServerIdentifier, Topology, TopologySource};
use crate::error::KerbcheckError;
use crate::powershell::{PowerShell, quote};

const INSTANCE_QUERY: &str = "\
SELECT
    CAST(SERVERPROPERTY('MachineName') AS nvarchar(128)) AS machine_name,
    ISNULL(CAST(SERVERPROPERTY('InstanceName') AS nvarchar(128)), N'') AS instance_name,
    ISNULL(CAST(SERVERPROPERTY('IsClustered') AS int), 0) AS is_clustered,
    ISNULL(CAST(SERVERPROPERTY('IsHadrEnabled') AS int), 0) AS is_hadr_enabled,
    ISNULL((SELECT TOP (1) port FROM sys.dm_tcp_listener_states
        WHERE type_desc = N'TSQL' AND state_desc = N'ONLINE' AND ip_address IN (N'0.0.0.0', N'::')
        ORDER BY port), 0) AS tcp_port,
    ISNULL((SELECT TOP (1) service_account FROM sys.dm_server_services
        WHERE servicename LIKE N'SQL Server (%'), N'') AS service_account";

const INSTANCE_COLUMNS: &str =
    "machine_name, instance_name, is_clustered, is_hadr_enabled, tcp_port, service_account";

const REPLICA_COLUMNS: &str = "replica_server_name";

const LISTENER_COLUMNS: &str = "listener_name, listener_port";

/// Facts about one instance, as returned by [`INSTANCE_QUERY`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceFacts {
    pub machine_name: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub is_clustered: i64,
    #[serde(default)]
    pub is_hadr_enabled: i64,
    #[serde(default)]
    pub tcp_port: i64,
    #[serde(default)]
    pub service_account: String,
}

impl InstanceFacts {
    pub fn is_clustered(&self) -> bool {
        self.is_clustered != 0
    }

    pub fn is_hadr_enabled(&self) -> bool {
        self.is_hadr_enabled != 0
    }

    pub fn into_node(self) -> anyhow::Result<Node> {
        let port = u16::try_from(self.tcp_port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Instance on '{}' has no TCP listener; Kerberos requires TCP/IP",
                    self.machine_name
                )
            })?;
        if self.service_account.trim().is_empty() {
            anyhow::bail!(
                "Could not read the service account of the instance on '{}'",
                self.machine_name
            );
        }

        let instance = (!self.instance_name.is_empty()).then_some(self.instance_name.as_str());
        let endpoint = Endpoint::instance(self.machine_name.clone(), port, instance);
        Ok(Node::new(endpoint, self.service_account))
    }
}

/// One availability replica row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplicaRow {
    pub replica_server_name: String,
}

/// One availability group listener row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerRow {
    pub listener_name: String,
    #[serde(default)]
    pub listener_port: i64,
}

/// Parse the single-row result of the instance query.
pub fn parse_instance_facts(json: &str) -> anyhow::Result<InstanceFacts> {
    let rows: Vec<InstanceFacts> = crate::powershell::parse_json_output(json)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Instance query returned no rows"))
}

pub fn parse_replica_rows(json: &str) -> anyhow::Result<Vec<ReplicaRow>> {
    crate::powershell::parse_json_output(json)
}

pub fn parse_listener_rows(json: &str) -> anyhow::Result<Vec<ListenerRow>> {
    crate::powershell::parse_json_output(json)
}

/// Build the availability-replica query for `group`.
pub fn replica_query(group: &str) -> String {
    format!(
        "\
SELECT DISTINCT ar.replica_server_name
FROM sys.availability_groups AS ag
JOIN sys.availability_replicas AS ar ON ar.group_id = ag.group_id
WHERE ag.name = N'{}'
ORDER BY ar.replica_server_name",
        group.replace('\'', "''")
    )
}

/// Build the listener query for `group`, ordered by DNS name.
pub fn listener_query(group: &str) -> String {
    format!(
        "\
SELECT agl.dns_name AS listener_name, ISNULL(agl.port, 0) AS listener_port
FROM sys.availability_groups AS ag
JOIN sys.availability_group_listeners AS agl ON agl.group_id = ag.group_id
WHERE ag.name = N'{}'
ORDER BY agl.dns_name",
        group.replace('\'', "''")
    )
}

/// Pick the listener SPNs are derived for: the first by DNS name.
pub fn choose_listener(group: &str, listeners: Vec<ListenerRow>) -> anyhow::Result<ListenerRow> {
    let count = listeners.len();
    let listener = listeners
        .into_iter()
        .find(|row| !row.listener_name.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Availability group '{}' has no listener", group))?;
    if count > 1 {
        tracing::warn!(
            "Availability group '{}' has {} listeners; deriving SPNs for '{}' only",
            group,
            count,
            listener.listener_name
        );
    }
    Ok(listener)
}

/// Build a script that runs `query` on `server` and prints `columns` as a JSON array.
pub fn sqlcmd_script(server: &str, query: &str, columns: &str) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'\n\
         $rows = @(Invoke-Sqlcmd -ServerInstance {} -Query {} | Select-Object {})\n\
         ConvertTo-Json -Compress -InputObject $rows",
        quote(server),
        quote(query),
        columns
    )
}

/// Discovers topology from the instance's own metadata views.
#[derive(Debug, Clone, Default)]
pub struct SqlTopologySource {
    powershell: PowerShell,
}

impl SqlTopologySource {
    pub fn new(powershell: PowerShell) -> Self {
        Self { powershell }
    }

    fn instance_facts(&self, server: &str) -> anyhow::Result<InstanceFacts> {
        let script = sqlcmd_script(server, INSTANCE_QUERY, INSTANCE_COLUMNS);
        let stdout = self
            .powershell
            .run(&script)
            .with_context(|| format!("Failed to query instance properties on '{}'", server))?;
        parse_instance_facts(&stdout)
    }

    fn replicas(&self, server: &str, group: &str) -> anyhow::Result<Vec<ReplicaRow>> {
        let script = sqlcmd_script(server, &replica_query(group), REPLICA_COLUMNS);
        let stdout = self.powershell.run(&script).with_context(|| {
            format!(
                "Failed to query availability group '{}' on '{}'",
                group, server
            )
        })?;
        parse_replica_rows(&stdout)
    }

    fn listeners(&self, server: &str, group: &str) -> anyhow::Result<Vec<ListenerRow>> {
        let script = sqlcmd_script(server, &listener_query(group), LISTENER_COLUMNS);
        let stdout = self.powershell.run(&script).with_context(|| {
            format!(
                "Failed to query listeners of availability group '{}' on '{}'",
                group, server
            )
        })?;
        parse_listener_rows(&stdout)
    }
}

impl TopologySource for SqlTopologySource {
    fn discover(
        &self,
        server: &ServerIdentifier,
        availability_group: Option<&str>,
    ) -> anyhow::Result<Topology> {
        let server_name = server.to_string();

        let Some(group) = availability_group else {
            let facts = self.instance_facts(&server_name)?;
            tracing::debug!(
                server = %server_name,
                clustered = facts.is_clustered(),
                hadr = facts.is_hadr_enabled(),
                "Discovered instance"
            );
            if facts.is_hadr_enabled() {
                tracing::warn!(
                    "HADR is enabled on '{}'; pass the availability group name to include its replicas and listener",
                    server_name
                );
            }
            let clustered = facts.is_clustered();
            let node = facts.into_node()?;
            return Ok(if clustered {
                Topology::Clustered { node }
            } else {
                Topology::Standalone { node }
            });
        };

        let replicas = self.replicas(&server_name, group)?;
        if replicas.is_empty() {
            return Err(KerbcheckError::EmptyAvailabilityGroup {
                group: group.to_string(),
                server: server_name,
            }
            .into());
        }

        let listener = choose_listener(group, self.listeners(&server_name, group)?)?;
        let listener_name = listener.listener_name;
        let listener_port = u16::try_from(listener.listener_port).unwrap_or(0);

        let mut nodes = Vec::with_capacity(replicas.len());
        for replica in &replicas {
            let facts = self.instance_facts(&replica.replica_server_name)?;
            nodes.push(facts.into_node()?);
        }
        tracing::debug!(
            group,
            replicas = nodes.len(),
            listener = %listener_name,
            "Discovered availability group"
        );

        // A listener without a static port follows the replicas' port.
        let port = match listener_port {
            0 => nodes[0].endpoint.port,
            port => port,
        };

        Ok(Topology::AvailabilityGroup {
            name: group.to_string(),
            nodes,
            listener: Endpoint::listener(listener_name, port),
        })
    }
}
