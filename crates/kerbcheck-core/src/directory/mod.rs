//! Directory service access for SPN lookup and registration.

pub mod active_directory;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::ServiceAccount;
use crate::error::KerbcheckError;
use crate::spn::ServicePrincipalName;

pub use active_directory::ActiveDirectory;

/// The directory object SPNs are registered against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpnOwner {
    /// A domain user or (group) managed service account
    Account(ServiceAccount),
    /// The computer account of `host`, used by virtual and built-in accounts
    Machine { host: String },
}

impl SpnOwner {
    /// Owner for SPNs of a service running as `account` on `host`.
    pub fn for_account(account: ServiceAccount, host: &str) -> Self {
        if account.is_machine_account() {
            SpnOwner::Machine {
                host: short_host_name(host).to_string(),
            }
        } else {
            SpnOwner::Account(account)
        }
    }

    pub fn is_machine(&self) -> bool {
        matches!(self, SpnOwner::Machine { .. })
    }

    /// Network identity Kerberos tickets are issued for: `DOMAIN\name` or `HOST$`.
    pub fn principal(&self) -> String {
        match self {
            SpnOwner::Account(account) => account.to_string(),
            SpnOwner::Machine { host } => format!("{}$", host),
        }
    }

    /// Same directory object. Account names and host names ignore ASCII case;
    /// account domains are not compared.
    pub fn same_identity(&self, other: &SpnOwner) -> bool {
        match (self, other) {
            (SpnOwner::Account(a), SpnOwner::Account(b)) => a.same_name(b),
            (SpnOwner::Machine { host: a }, SpnOwner::Machine { host: b }) => {
                a.eq_ignore_ascii_case(b)
            }
            _ => false,
        }
    }
}

/// Return the owner shared by every node.
///
/// Nodes running under virtual or built-in accounts each authenticate as
/// their own computer account, so two of them never agree. An empty list is
/// reported as a mismatch.
pub fn common_owner(owners: &[SpnOwner]) -> Result<SpnOwner, KerbcheckError> {
    let mismatch = || KerbcheckError::AccountMismatch {
        accounts: owners.iter().map(SpnOwner::principal).collect(),
    };

    let (first, rest) = owners.split_first().ok_or_else(mismatch)?;
    if !rest.iter().all(|owner| owner.same_identity(first)) {
        return Err(mismatch());
    }
    Ok(first.clone())
}

impl fmt::Display for SpnOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpnOwner::Account(account) => write!(f, "{}", account),
            SpnOwner::Machine { host } => f.write_str(host),
        }
    }
}

/// Computer objects are named after the NetBIOS host name.
fn short_host_name(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Administrative credential used for SPN registration.
#[derive(Clone)]
pub struct AdminCredential {
    username: String,
    password: String,
}

impl AdminCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reads and writes the SPNs of directory objects.
pub trait Directory {
    /// SPNs currently registered against `owner`, in directory order.
    fn list_spns(&self, owner: &SpnOwner) -> anyhow::Result<Vec<String>>;

    /// Register `spn` against `owner`.
    ///
    /// Fails when the credential lacks rights or the SPN belongs to another
    /// object.
    fn register_spn(
        &self,
        spn: &ServicePrincipalName,
        owner: &SpnOwner,
        credential: &AdminCredential,
    ) -> anyhow::Result<()>;
}
