//! Service account resolution.
//!
//! SQL Server reports its service account as `DOMAIN\account`,
//! `account@domain`, or a virtual/built-in account such as
//! `NT Service\MSSQLSERVER`. Virtual and built-in accounts authenticate on the
//! network as the computer account of the host they run on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KerbcheckError;

/// Domain markers that identify a machine (computer) account.
pub const MACHINE_ACCOUNT_DOMAINS: [&str; 2] = ["NT Service", "NT AUTHORITY"];

/// Maximum length of a pre-Windows 2000 logon name.
pub const MAX_ACCOUNT_NAME_LEN: usize = 20;

/// A resolved (domain, account-name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub domain: String,
    pub name: String,
}

impl ServiceAccount {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }

    /// Resolve a raw service-account string.
    ///
    /// - `DOMAIN\account` splits on the first backslash.
    /// - `account@domain` splits on `@`; the account part is truncated to
    ///   [`MAX_ACCOUNT_NAME_LEN`] characters.
    pub fn resolve(raw: &str) -> Result<Self, KerbcheckError> {
        let unrecognized = || KerbcheckError::UnrecognizedAccount {
            input: raw.to_string(),
        };

        let (domain, name) = if let Some((domain, name)) = raw.split_once('\\') {
            (domain.trim().to_string(), name.trim().to_string())
        } else if let Some((name, domain)) = raw.split_once('@') {
            let name: String = name.trim().chars().take(MAX_ACCOUNT_NAME_LEN).collect();
            (domain.trim().to_string(), name)
        } else {
            return Err(unrecognized());
        };

        if domain.is_empty() || name.is_empty() {
            return Err(unrecognized());
        }

        Ok(Self { domain, name })
    }

    pub fn is_machine_account(&self) -> bool {
        MACHINE_ACCOUNT_DOMAINS
            .iter()
            .any(|marker| self.domain.eq_ignore_ascii_case(marker))
    }

    /// Group managed service accounts carry a trailing `$`.
    pub fn is_group_managed(&self) -> bool {
        self.name.ends_with('$')
    }

    /// Same account name, ignoring ASCII case.
    pub fn same_name(&self, other: &ServiceAccount) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.domain, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_backslash_form() {
        let account = ServiceAccount::resolve("ABCORP\\sqlsvc").unwrap();
        assert_eq!(account.domain, "ABCORP");
        assert_eq!(account.name, "sqlsvc");
        assert!(!account.is_machine_account());
    }

    #[test]
    fn test_resolve_splits_on_first_backslash_and_trims() {
        let account = ServiceAccount::resolve(" ABCORP \\ sql\\svc ").unwrap();
        assert_eq!(account.domain, "ABCORP");
        assert_eq!(account.name, "sql\\svc");
    }

    #[test]
    fn test_resolve_upn_form_truncates_account() {
        let account = ServiceAccount::resolve("sqlsvc12345678901234567890@abcorp.local").unwrap();
        assert_eq!(account.name, "sqlsvc12345678901234");
        assert_eq!(account.name.len(), MAX_ACCOUNT_NAME_LEN);
        assert_eq!(account.domain, "abcorp.local");
    }

    #[test]
    fn test_resolve_short_upn_is_untouched() {
        let account = ServiceAccount::resolve("sqlsvc@abcorp.local").unwrap();
        assert_eq!(account.name, "sqlsvc");
    }

    #[test]
    fn test_resolve_machine_accounts() {
        let virtual_account = ServiceAccount::resolve("NT Service\\MSSQLSERVER").unwrap();
        assert!(virtual_account.is_machine_account());

        let network_service = ServiceAccount::resolve("NT AUTHORITY\\NETWORK SERVICE").unwrap();
        assert!(network_service.is_machine_account());

        let lower = ServiceAccount::resolve("nt service\\MSSQL$INST1").unwrap();
        assert!(lower.is_machine_account());
    }

    #[test]
    fn test_resolve_rejects_bare_names() {
        assert!(matches!(
            ServiceAccount::resolve("LocalSystem"),
            Err(KerbcheckError::UnrecognizedAccount { .. })
        ));
        assert!(ServiceAccount::resolve("\\sqlsvc").is_err());
        assert!(ServiceAccount::resolve("sqlsvc@").is_err());
    }

    #[test]
    fn test_group_managed_account() {
        let gmsa = ServiceAccount::resolve("ABCORP\\gmsa-sql$").unwrap();
        assert!(gmsa.is_group_managed());
    }
}
