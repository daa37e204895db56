//! Service principal names.
//!
//! An SPN has the shape `<class>/<host>[:<port-or-instance>][/<service>]`.
//! Directory services compare SPNs without regard to ASCII case, so equality,
//! ordering and hashing here follow a lowercased key while the original
//! spelling is kept for display.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KerbcheckError;

/// Service class registered by the SQL Server database engine.
pub const SQL_SERVICE_CLASS: &str = "MSSQLSvc";

/// Ordered, duplicate-free set of SPNs.
pub type SpnSet = BTreeSet<ServicePrincipalName>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServicePrincipalName {
    raw: String,
    key: String,
}

impl ServicePrincipalName {
    pub fn parse(input: &str) -> Result<Self, KerbcheckError> {
        let raw = input.trim();
        let invalid = || KerbcheckError::InvalidSpn {
            input: input.to_string(),
        };

        if raw.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (class, rest) = raw.split_once('/').ok_or_else(invalid)?;
        if class.is_empty() || rest.is_empty() || rest.starts_with(':') {
            return Err(invalid());
        }

        Ok(Self {
            raw: raw.to_string(),
            key: raw.to_ascii_lowercase(),
        })
    }

    /// Build the SQL Server SPN for `host` with an optional `:<suffix>`.
    pub fn sql(host: &str, suffix: Option<&str>) -> Result<Self, KerbcheckError> {
        match suffix {
            Some(suffix) => Self::parse(&format!("{SQL_SERVICE_CLASS}/{host}:{suffix}")),
            None => Self::parse(&format!("{SQL_SERVICE_CLASS}/{host}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn service_class(&self) -> &str {
        self.raw.split_once('/').map(|(class, _)| class).unwrap_or("")
    }

    /// Host part, without port, instance or service name.
    pub fn host(&self) -> &str {
        let rest = self.raw.split_once('/').map(|(_, rest)| rest).unwrap_or("");
        rest.split([':', '/']).next().unwrap_or("")
    }

    pub fn is_sql(&self) -> bool {
        self.service_class().eq_ignore_ascii_case(SQL_SERVICE_CLASS)
    }
}

impl PartialEq for ServicePrincipalName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ServicePrincipalName {}

impl Hash for ServicePrincipalName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ServicePrincipalName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServicePrincipalName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for ServicePrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ServicePrincipalName {
    type Err = KerbcheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServicePrincipalName {
    type Error = KerbcheckError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServicePrincipalName> for String {
    fn from(spn: ServicePrincipalName) -> Self {
        spn.raw
    }
}

/// Keep only the SQL Server SPNs from a list of raw strings.
///
/// Entries that do not parse or belong to another service class are dropped.
pub fn sql_spns<I, S>(raw: I) -> SpnSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|s| ServicePrincipalName::parse(s.as_ref()).ok())
        .filter(ServicePrincipalName::is_sql)
        .collect()
}
