//! Active Directory access through the `ActiveDirectory` PowerShell module.

use anyhow::Context;

use super::{AdminCredential, Directory, SpnOwner};
use crate::powershell::{PowerShell, quote};
use crate::spn::ServicePrincipalName;

/// Environment variable carrying the admin password into the child process.
const PASSWORD_ENV: &str = "KERBCHECK_AD_PASSWORD";

/// Which `Get-AD*` / `Set-AD*` noun addresses the owner.
fn object_noun(owner: &SpnOwner) -> &'static str {
    match owner {
        SpnOwner::Account(account) if account.is_group_managed() => "ADServiceAccount",
        SpnOwner::Account(_) => "ADUser",
        SpnOwner::Machine { .. } => "ADComputer",
    }
}

fn identity(owner: &SpnOwner) -> &str {
    match owner {
        SpnOwner::Account(account) => account.name.as_str(),
        SpnOwner::Machine { host } => host.as_str(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActiveDirectory {
    powershell: PowerShell,
    server: Option<String>,
}

impl ActiveDirectory {
    pub fn new(powershell: PowerShell) -> Self {
        Self {
            powershell,
            server: None,
        }
    }

    /// Send every cmdlet to a specific domain controller.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// `-Server` argument: configured DC, else the account's domain.
    fn server_arg(&self, owner: &SpnOwner) -> String {
        let server = match (&self.server, owner) {
            (Some(server), _) => Some(server.as_str()),
            (None, SpnOwner::Account(account)) => Some(account.domain.as_str()),
            (None, SpnOwner::Machine { .. }) => None,
        };
        server
            .map(|s| format!(" -Server {}", quote(s)))
            .unwrap_or_default()
    }

    pub fn list_script(&self, owner: &SpnOwner) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'\n\
             Import-Module ActiveDirectory\n\
             $object = Get-{} -Identity {}{} -Properties servicePrincipalName\n\
             ConvertTo-Json -Compress -InputObject @($object.servicePrincipalName)",
            object_noun(owner),
            quote(identity(owner)),
            self.server_arg(owner),
        )
    }

    pub fn register_script(
        &self,
        spn: &ServicePrincipalName,
        owner: &SpnOwner,
        credential: &AdminCredential,
    ) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'\n\
             Import-Module ActiveDirectory\n\
             $secure = ConvertTo-SecureString $env:{} -AsPlainText -Force\n\
             $credential = New-Object System.Management.Automation.PSCredential({}, $secure)\n\
             Set-{} -Identity {}{} -Credential $credential -ServicePrincipalNames @{{Add={}}}",
            PASSWORD_ENV,
            quote(credential.username()),
            object_noun(owner),
            quote(identity(owner)),
            self.server_arg(owner),
            quote(spn.as_str()),
        )
    }
}

impl Directory for ActiveDirectory {
    fn list_spns(&self, owner: &SpnOwner) -> anyhow::Result<Vec<String>> {
        let spns: Vec<String> = self
            .powershell
            .run_json(&self.list_script(owner))
            .with_context(|| format!("Failed to read SPNs of {}", owner))?;
        tracing::debug!(owner = %owner, count = spns.len(), "Read registered SPNs");
        Ok(spns)
    }

    fn register_spn(
        &self,
        spn: &ServicePrincipalName,
        owner: &SpnOwner,
        credential: &AdminCredential,
    ) -> anyhow::Result<()> {
        let script = self.register_script(spn, owner, credential);
        self.powershell
            .run_with_env(&script, &[(PASSWORD_ENV, credential.password())])
            .with_context(|| format!("Failed to register {} for {}", spn, owner))?;
        Ok(())
    }
}
