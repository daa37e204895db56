#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use kerbcheck_core::KerbcheckError;
use kerbcheck_core::derive::EndpointSpnSource;
use kerbcheck_core::directory::{AdminCredential, Directory, SpnOwner};
use kerbcheck_core::spn::ServicePrincipalName;
use kerbcheck_core::topology::{
    Endpoint, Node, ServerIdentifier, Topology, TopologySource,
};

/// Returns a fixed topology; `None` behaves like an empty availability group.
pub struct FakeTopology {
    topology: Option<Topology>,
}

impl FakeTopology {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology: Some(topology),
        }
    }

    pub fn empty() -> Self {
        Self { topology: None }
    }
}

impl TopologySource for FakeTopology {
    fn discover(
        &self,
        server: &ServerIdentifier,
        availability_group: Option<&str>,
    ) -> anyhow::Result<Topology> {
        match &self.topology {
            Some(topology) => Ok(topology.clone()),
            None => Err(KerbcheckError::EmptyAvailabilityGroup {
                group: availability_group.unwrap_or_default().to_string(),
                server: server.to_string(),
            }
            .into()),
        }
    }
}

/// Derives SQL SPNs plus unrelated SPNs that must be filtered out.
pub struct NoisySpnSource;

impl EndpointSpnSource for NoisySpnSource {
    fn endpoint_spns(&self, endpoint: &Endpoint) -> anyhow::Result<Vec<String>> {
        Ok(vec![
            format!("MSSQLSvc/{}:{}", endpoint.network_name, endpoint.port),
            format!("HTTP/{}", endpoint.network_name),
            format!("WSMAN/{}", endpoint.network_name),
        ])
    }
}

/// In-memory directory keyed by the owner's display form.
#[derive(Default)]
pub struct FakeDirectory {
    spns: RefCell<HashMap<String, Vec<String>>>,
    pub list_calls: Cell<usize>,
    pub registrations: RefCell<Vec<(String, String)>>,
    pub fail_registration: bool,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spns(self, owner: &str, spns: &[&str]) -> Self {
        self.spns.borrow_mut().insert(
            owner.to_ascii_lowercase(),
            spns.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_registration: true,
            ..Self::default()
        }
    }
}

impl Directory for FakeDirectory {
    fn list_spns(&self, owner: &SpnOwner) -> anyhow::Result<Vec<String>> {
        self.list_calls.set(self.list_calls.get() + 1);
        Ok(self
            .spns
            .borrow()
            .get(&owner.to_string().to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    fn register_spn(
        &self,
        spn: &ServicePrincipalName,
        owner: &SpnOwner,
        _credential: &AdminCredential,
    ) -> anyhow::Result<()> {
        if self.fail_registration {
            anyhow::bail!("Insufficient access rights to perform the operation");
        }
        self.registrations
            .borrow_mut()
            .push((spn.to_string(), owner.to_string()));
        self.spns
            .borrow_mut()
            .entry(owner.to_string().to_ascii_lowercase())
            .or_default()
            .push(spn.to_string());
        Ok(())
    }
}

pub fn admin() -> AdminCredential {
    AdminCredential::new("ABCORP\\spnadmin", "secret")
}

pub fn standalone(host: &str, instance: Option<&str>, account: &str) -> Topology {
    Topology::Standalone {
        node: Node::new(Endpoint::instance(host, 1433, instance), account),
    }
}

pub fn availability_group(nodes: &[(&str, &str)], listener: &str) -> Topology {
    Topology::AvailabilityGroup {
        name: "AG1".to_string(),
        nodes: nodes
            .iter()
            .map(|(host, account)| Node::new(Endpoint::instance(*host, 1433, None), *account))
            .collect(),
        listener: Endpoint::listener(listener, 1433),
    }
}

pub fn spn_strings<'a, I>(spns: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ServicePrincipalName>,
{
    spns.into_iter().map(|spn| spn.to_string()).collect()
}
