//! Kerbcheck Core Library
//!
//! Verifies and repairs the Kerberos service principal names of SQL Server
//! standalone instances, failover cluster instances and availability groups.

pub mod account;
pub mod commands;
pub mod config;
pub mod context;
pub mod derive;
pub mod directory;
pub mod error;
pub mod powershell;
pub mod reconcile;
pub mod spn;
pub mod topology;

pub use error::KerbcheckError;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigScope, ConfigStore, KerbcheckConfig};
    pub use crate::context::AppContext;

    // Domain
    pub use crate::account::ServiceAccount;
    pub use crate::spn::{ServicePrincipalName, SpnSet};
    pub use crate::topology::{Endpoint, EndpointKind, Node, ServerIdentifier, Topology};

    // Collaborators
    pub use crate::derive::{EndpointSpnSource, StandardSpnSource};
    pub use crate::directory::{AdminCredential, Directory, SpnOwner};
    pub use crate::topology::TopologySource;

    // Reconciliation
    pub use crate::reconcile::{CheckReport, ReconcileRequest, Reconciler};
}
