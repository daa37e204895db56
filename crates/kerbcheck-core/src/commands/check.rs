//! Check command implementation.
//!
//! Verifies, and optionally registers, the SPNs of a SQL Server target.

use crate::account::ServiceAccount;
use crate::config::DirectoryConfig;
use crate::context::AppContext;
use crate::derive::EndpointSpnSource;
use crate::directory::{AdminCredential, Directory};
use crate::error::KerbcheckError;
use crate::reconcile::{CheckReport, ReconcileRequest, Reconciler};
use crate::topology::{ServerIdentifier, TopologySource};

/// Options for the check command
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Target server: `host` or `host\instance`
    pub server: String,
    /// Availability group the target belongs to
    pub availability_group: Option<String>,
    /// Register missing SPNs instead of printing commands
    pub remediate: bool,
    /// Credential used when remediating
    pub credential: Option<AdminCredential>,
}

impl CheckOptions {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            availability_group: None,
            remediate: false,
            credential: None,
        }
    }

    pub fn with_availability_group(mut self, group: impl Into<String>) -> Self {
        self.availability_group = Some(group.into());
        self
    }

    pub fn with_remediate(mut self, remediate: bool) -> Self {
        self.remediate = remediate;
        self
    }

    pub fn with_credential(mut self, credential: AdminCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    fn to_request(&self) -> anyhow::Result<ReconcileRequest> {
        let server = ServerIdentifier::parse(&self.server)?;
        let mut request = ReconcileRequest::new(server);
        if let Some(group) = &self.availability_group {
            request = request.with_availability_group(group.clone());
        }
        request.remediate = self.remediate;
        request.credential = self.credential.clone();
        Ok(request)
    }
}

/// Parse a yes/no remediation flag (`yes`, `no`, `y`, `n`, `1`, `0`, `true`, `false`).
pub fn parse_remediation_flag(input: &str) -> Result<bool, KerbcheckError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "1" | "true" => Ok(true),
        "no" | "n" | "0" | "false" => Ok(false),
        _ => Err(KerbcheckError::InvalidRemediationFlag {
            input: input.to_string(),
        }),
    }
}

/// Build the admin credential from configuration.
///
/// The username comes from `user_override` or `directory.admin_user`; the
/// password from the configured environment variable, else from `prompt`.
pub fn resolve_credential<F>(
    config: &DirectoryConfig,
    user_override: Option<&str>,
    prompt: F,
) -> anyhow::Result<AdminCredential>
where
    F: FnOnce(&str) -> anyhow::Result<String>,
{
    let username = user_override
        .or(config.admin_user.as_deref())
        .ok_or(KerbcheckError::MissingCredential)?;
    ServiceAccount::resolve(username)?;

    let password = match std::env::var(config.password_env()) {
        Ok(password) if !password.is_empty() => password,
        _ => prompt(username)?,
    };
    Ok(AdminCredential::new(username, password))
}

/// Check command orchestrator
#[derive(Debug)]
pub struct CheckCommand {
    ctx: AppContext,
}

impl CheckCommand {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(AppContext::with_defaults()?))
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Run against the configured SQL Server and Active Directory adapters.
    pub fn execute(&self, options: &CheckOptions) -> anyhow::Result<CheckReport> {
        let topology_source = self.ctx.topology_source();
        let spn_source = self.ctx.spn_source();
        let directory = self.ctx.directory();
        Self::execute_with(options, topology_source.as_ref(), &spn_source, &directory)
    }

    /// Run against explicit collaborators.
    pub fn execute_with(
        options: &CheckOptions,
        topology_source: &dyn TopologySource,
        spn_source: &dyn EndpointSpnSource,
        directory: &dyn Directory,
    ) -> anyhow::Result<CheckReport> {
        let request = options.to_request()?;
        Reconciler::new(topology_source, spn_source, directory).run(&request)
    }
}
