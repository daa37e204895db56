//! Required command implementation.
//!
//! Lists the SPNs a topology needs without touching the directory.

use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::derive::{EndpointSpnSource, required_spns};
use crate::spn::SpnSet;
use crate::topology::{ServerIdentifier, Topology, TopologySource};

#[derive(Debug, Clone)]
pub struct RequiredOptions {
    pub server: String,
    pub availability_group: Option<String>,
}

impl RequiredOptions {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            availability_group: None,
        }
    }

    pub fn with_availability_group(mut self, group: impl Into<String>) -> Self {
        self.availability_group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredReport {
    pub server: String,
    pub topology: Topology,
    pub required: SpnSet,
}

#[derive(Debug)]
pub struct RequiredCommand {
    ctx: AppContext,
}

impl RequiredCommand {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(AppContext::with_defaults()?))
    }

    pub fn execute(&self, options: &RequiredOptions) -> anyhow::Result<RequiredReport> {
        let topology_source = self.ctx.topology_source();
        let spn_source = self.ctx.spn_source();
        Self::execute_with(options, topology_source.as_ref(), &spn_source)
    }

    pub fn execute_with(
        options: &RequiredOptions,
        topology_source: &dyn TopologySource,
        spn_source: &dyn EndpointSpnSource,
    ) -> anyhow::Result<RequiredReport> {
        let server = ServerIdentifier::parse(&options.server)?;
        let topology = topology_source.discover(&server, options.availability_group.as_deref())?;
        let required = required_spns(&topology, spn_source)?;
        Ok(RequiredReport {
            server: server.to_string(),
            topology,
            required,
        })
    }
}
