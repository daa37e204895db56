//! Required-SPN derivation.

use anyhow::Context;

use crate::spn::{SQL_SERVICE_CLASS, SpnSet, sql_spns};
use crate::topology::{Endpoint, EndpointKind, Topology};

/// Computes the SPN strings a SQL Server endpoint registers.
pub trait EndpointSpnSource {
    fn endpoint_spns(&self, endpoint: &Endpoint) -> anyhow::Result<Vec<String>>;
}

/// Derives SPNs the way the database engine registers them at startup.
///
/// With a DNS suffix, short network names also produce FQDN forms.
#[derive(Debug, Clone, Default)]
pub struct StandardSpnSource {
    dns_suffix: Option<String>,
}

impl StandardSpnSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dns_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        let suffix = suffix.trim().trim_start_matches('.');
        self.dns_suffix = (!suffix.is_empty()).then(|| suffix.to_string());
        self
    }

    fn host_names(&self, network_name: &str) -> Vec<String> {
        match &self.dns_suffix {
            Some(suffix) if !network_name.contains('.') => {
                vec![
                    network_name.to_string(),
                    format!("{}.{}", network_name, suffix),
                ]
            }
            _ => vec![network_name.to_string()],
        }
    }
}

impl EndpointSpnSource for StandardSpnSource {
    fn endpoint_spns(&self, endpoint: &Endpoint) -> anyhow::Result<Vec<String>> {
        let mut spns = Vec::new();
        for host in self.host_names(&endpoint.network_name) {
            spns.push(format!("{SQL_SERVICE_CLASS}/{host}:{}", endpoint.port));
            match &endpoint.kind {
                EndpointKind::DefaultInstance => spns.push(format!("{SQL_SERVICE_CLASS}/{host}")),
                EndpointKind::NamedInstance(instance) => {
                    spns.push(format!("{SQL_SERVICE_CLASS}/{host}:{instance}"))
                }
                EndpointKind::Listener => {}
            }
        }
        Ok(spns)
    }
}

/// Union of the SQL Server SPNs for every endpoint of `topology`.
///
/// Non-SQL SPNs from the source are discarded.
pub fn required_spns<S>(topology: &Topology, source: &S) -> anyhow::Result<SpnSet>
where
    S: EndpointSpnSource + ?Sized,
{
    let mut required = SpnSet::new();
    for endpoint in topology.endpoints() {
        let spns = source.endpoint_spns(endpoint).with_context(|| {
            format!(
                "Failed to derive SPNs for {}:{}",
                endpoint.network_name, endpoint.port
            )
        })?;
        required.extend(sql_spns(spns));
    }
    tracing::debug!(
        mode = topology.mode(),
        count = required.len(),
        "Derived required SPNs"
    );
    Ok(required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Node;

    fn strings(set: &SpnSet) -> Vec<&str> {
        set.iter().map(|spn| spn.as_str()).collect()
    }

    #[test]
    fn test_named_instance_spns() {
        let source = StandardSpnSource::new();
        let spns = source
            .endpoint_spns(&Endpoint::instance("host1", 1433, Some("INST1")))
            .unwrap();
        assert_eq!(spns, vec!["MSSQLSvc/host1:1433", "MSSQLSvc/host1:INST1"]);
    }

    #[test]
    fn test_default_instance_spns() {
        let source = StandardSpnSource::new();
        let spns = source
            .endpoint_spns(&Endpoint::instance("host1", 1433, None))
            .unwrap();
        assert_eq!(spns, vec!["MSSQLSvc/host1:1433", "MSSQLSvc/host1"]);
    }

    #[test]
    fn test_listener_spns_are_port_only() {
        let source = StandardSpnSource::new();
        let spns = source
            .endpoint_spns(&Endpoint::listener("aglsn", 1433))
            .unwrap();
        assert_eq!(spns, vec!["MSSQLSvc/aglsn:1433"]);
    }

    #[test]
    fn test_dns_suffix_adds_fqdn_forms() {
        let source = StandardSpnSource::new().with_dns_suffix(".abcorp.local");
        let spns = source
            .endpoint_spns(&Endpoint::listener("aglsn", 1433))
            .unwrap();
        assert_eq!(
            spns,
            vec!["MSSQLSvc/aglsn:1433", "MSSQLSvc/aglsn.abcorp.local:1433"]
        );

        let fqdn = source
            .endpoint_spns(&Endpoint::listener("aglsn.other.local", 1433))
            .unwrap();
        assert_eq!(fqdn, vec!["MSSQLSvc/aglsn.other.local:1433"]);
    }

    #[test]
    fn test_required_spns_for_availability_group() {
        let topology = Topology::AvailabilityGroup {
            name: "AG1".to_string(),
            nodes: vec![
                Node::new(Endpoint::instance("sql01", 1433, None), "ABCORP\\svc"),
                Node::new(Endpoint::instance("sql02", 1433, None), "ABCORP\\svc"),
            ],
            listener: Endpoint::listener("aglsn", 1433),
        };

        let required = required_spns(&topology, &StandardSpnSource::new()).unwrap();
        assert_eq!(
            strings(&required),
            vec![
                "MSSQLSvc/aglsn:1433",
                "MSSQLSvc/sql01",
                "MSSQLSvc/sql01:1433",
                "MSSQLSvc/sql02",
                "MSSQLSvc/sql02:1433",
            ]
        );
    }
}
