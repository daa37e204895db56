//! SPN reconciliation.
//!
//! A run walks a fixed sequence:
//! 1. Discover the topology
//! 2. Derive the required SPNs
//! 3. Resolve every node's SPN owner and require them to agree
//! 4. Read the SPNs registered against the owning account
//! 5. Report the missing SPNs, then register them or print `SETSPN` commands

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::ServiceAccount;
use crate::derive::{EndpointSpnSource, required_spns};
use crate::directory::{AdminCredential, Directory, SpnOwner, common_owner};
use crate::error::KerbcheckError;
use crate::spn::{ServicePrincipalName, SpnSet};
use crate::topology::{ServerIdentifier, Topology, TopologySource};

/// Inputs of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub server: ServerIdentifier,
    pub availability_group: Option<String>,
    pub remediate: bool,
    pub credential: Option<AdminCredential>,
}

impl ReconcileRequest {
    pub fn new(server: ServerIdentifier) -> Self {
        Self {
            server,
            availability_group: None,
            remediate: false,
            credential: None,
        }
    }

    pub fn with_availability_group(mut self, group: impl Into<String>) -> Self {
        self.availability_group = Some(group.into());
        self
    }

    pub fn with_remediation(mut self, credential: AdminCredential) -> Self {
        self.remediate = true;
        self.credential = Some(credential);
        self
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub server: String,
    pub topology: Topology,
    pub owner: SpnOwner,
    pub required: SpnSet,
    pub existing: SpnSet,
    /// Required SPNs that were absent when the run started
    pub missing: SpnSet,
    /// Missing SPNs registered during this run
    pub registered: Vec<ServicePrincipalName>,
    /// `SETSPN` commands for SPNs left unregistered
    pub manual_commands: Vec<String>,
    pub warnings: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl CheckReport {
    /// Missing SPNs that were not registered by this run.
    pub fn outstanding(&self) -> Vec<&ServicePrincipalName> {
        self.missing
            .iter()
            .filter(|spn| !self.registered.contains(spn))
            .collect()
    }

    pub fn is_compliant(&self) -> bool {
        self.outstanding().is_empty()
    }
}

/// `Missing = Required \ Existing`.
pub fn missing_spns(required: &SpnSet, existing: &SpnSet) -> SpnSet {
    required.difference(existing).cloned().collect()
}

/// Manual remediation command for one SPN.
pub fn setspn_command(spn: &ServicePrincipalName, owner: &SpnOwner) -> String {
    format!("SETSPN -s {} {}", spn, owner)
}

/// Resolve every node's SPN owner and return the one they share.
///
/// A virtual account resolves to the computer object of the node it runs on.
pub fn spn_owner(topology: &Topology) -> anyhow::Result<SpnOwner> {
    let owners = topology
        .nodes()
        .iter()
        .map(|node| -> Result<SpnOwner, KerbcheckError> {
            let account = ServiceAccount::resolve(&node.service_account)?;
            Ok(SpnOwner::for_account(account, &node.endpoint.network_name))
        })
        .collect::<Result<Vec<_>, KerbcheckError>>()?;
    Ok(common_owner(&owners)?)
}

/// Runs the reconciliation sequence against its collaborators.
pub struct Reconciler<'a> {
    topology_source: &'a dyn TopologySource,
    spn_source: &'a dyn EndpointSpnSource,
    directory: &'a dyn Directory,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        topology_source: &'a dyn TopologySource,
        spn_source: &'a dyn EndpointSpnSource,
        directory: &'a dyn Directory,
    ) -> Self {
        Self {
            topology_source,
            spn_source,
            directory,
        }
    }

    pub fn run(&self, request: &ReconcileRequest) -> anyhow::Result<CheckReport> {
        let credential = match (request.remediate, &request.credential) {
            (true, None) => return Err(KerbcheckError::MissingCredential.into()),
            (true, Some(credential)) => Some(credential),
            (false, _) => None,
        };

        let topology = self
            .topology_source
            .discover(&request.server, request.availability_group.as_deref())?;
        tracing::debug!(server = %request.server, mode = topology.mode(), "Discovered topology");

        let required = required_spns(&topology, self.spn_source)?;

        let owner = spn_owner(&topology)?;

        let mut warnings = Vec::new();
        if owner.is_machine() && topology.is_availability_group() {
            let warning = format!(
                "The only replica runs under a virtual account, so the listener SPN is tied \
                 to {}. Adding a replica requires a domain or group managed service account.",
                owner.principal()
            );
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }

        let existing = self.existing_spns(&owner)?;
        let missing = missing_spns(&required, &existing);

        let mut registered = Vec::new();
        let mut manual_commands = Vec::new();
        for spn in &missing {
            match credential {
                Some(credential) => {
                    self.directory.register_spn(spn, &owner, credential)?;
                    tracing::info!(spn = %spn, owner = %owner, "Registered SPN");
                    registered.push(spn.clone());
                }
                None => manual_commands.push(setspn_command(spn, &owner)),
            }
        }

        Ok(CheckReport {
            server: request.server.to_string(),
            topology,
            owner,
            required,
            existing,
            missing,
            registered,
            manual_commands,
            warnings,
            checked_at: Utc::now(),
        })
    }

    fn existing_spns(&self, owner: &SpnOwner) -> anyhow::Result<SpnSet> {
        let raw = self.directory.list_spns(owner)?;
        let mut existing = SpnSet::new();
        for value in raw {
            match ServicePrincipalName::parse(&value) {
                Ok(spn) => {
                    existing.insert(spn);
                }
                Err(_) => tracing::warn!("Ignoring malformed SPN '{}' on {}", value, owner),
            }
        }
        Ok(existing)
    }
}
