//! Error types for kerbcheck

use thiserror::Error;

/// Errors raised by the reconciler and its input parsers.
///
/// `EmptyAvailabilityGroup` and `AccountMismatch` are fatal: a run that hits
/// either stops before any directory lookup or remediation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KerbcheckError {
    #[error(
        "Availability group '{group}' returned no replicas on '{server}'. \
         Check the group name and that the server is a member of it."
    )]
    EmptyAvailabilityGroup { group: String, server: String },

    #[error(
        "Availability group nodes run under different service accounts ({}). \
         All replicas must share one domain service account: SPNs are registered against a \
         single account, and a failover to a node running under another account breaks \
         Kerberos authentication (double-hop delegation fails) until the SPNs are \
         re-registered. Virtual and built-in accounts authenticate as each host's computer \
         account and cannot be shared.",
        accounts.join(", ")
    )]
    AccountMismatch { accounts: Vec<String> },

    #[error("Invalid server identifier '{input}': {reason}")]
    InvalidServerIdentifier { input: String, reason: String },

    #[error(
        "Unrecognized service account '{input}'. Expected DOMAIN\\account or account@domain"
    )]
    UnrecognizedAccount { input: String },

    #[error("Invalid service principal name '{input}'")]
    InvalidSpn { input: String },

    #[error("Invalid remediation flag '{input}'. Use yes/no, 1/0 or true/false")]
    InvalidRemediationFlag { input: String },

    #[error("Remediation requires an administrative credential; set directory.admin_user")]
    MissingCredential,
}
