//! Kerbcheck - SQL Server SPN checker
//!
//! Usage:
//!   kerbcheck check sql01\INST1 --remediate no
//!   kerbcheck check sql01 --availability-group AG1 --remediate yes
//!   kerbcheck required sql01 --availability-group AG1

mod prompt;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kerbcheck_core::commands::{
    CheckCommand, CheckOptions, CheckReport, RequiredCommand, RequiredOptions, RequiredReport,
    parse_remediation_flag, resolve_credential,
};
use kerbcheck_core::context::AppContext;
use kerbcheck_core::directory::SpnOwner;
use kerbcheck_core::topology::Topology;

use crate::prompt::prompt_password;

#[derive(Parser)]
#[command(name = "kerbcheck")]
#[command(about = "Verify and repair SQL Server Kerberos SPNs", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this configuration file instead of the global and project files
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare required SPNs with the directory and optionally register the missing ones
    Check {
        /// Target server: host or host\instance
        server: String,

        /// Register missing SPNs (yes/no)
        #[arg(
            long,
            value_parser = parse_flag,
            action = ArgAction::Set,
            required = true,
            value_name = "yes|no"
        )]
        remediate: bool,

        /// Availability group the target replica belongs to
        #[arg(long, short = 'a', value_name = "NAME")]
        availability_group: Option<String>,

        /// Account used for registration (overrides directory.admin_user)
        #[arg(long, value_name = "DOMAIN\\USER")]
        admin_user: Option<String>,

        /// Read the topology from a descriptor instead of querying the instance
        #[arg(long, value_name = "PATH")]
        topology_file: Option<PathBuf>,
    },

    /// Print the SPNs a target requires without contacting the directory
    Required {
        /// Target server: host or host\instance
        server: String,

        /// Availability group the target replica belongs to
        #[arg(long, short = 'a', value_name = "NAME")]
        availability_group: Option<String>,

        /// Read the topology from a descriptor instead of querying the instance
        #[arg(long, value_name = "PATH")]
        topology_file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable report
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// Only missing SPNs (non-zero exit if any remain)
    Quiet,
}

fn parse_flag(value: &str) -> std::result::Result<bool, String> {
    parse_remediation_flag(value).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "kerbcheck=debug,warn"
    } else {
        "kerbcheck=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = match &cli.config {
        Some(path) => AppContext::from_config_file(path)?,
        None => AppContext::with_defaults()?,
    };

    match cli.command {
        Commands::Check {
            server,
            remediate,
            availability_group,
            admin_user,
            topology_file,
        } => run_check(
            ctx,
            CheckArgs {
                server,
                remediate,
                availability_group,
                admin_user,
                topology_file,
            },
            cli.format,
        ),
        Commands::Required {
            server,
            availability_group,
            topology_file,
        } => run_required(ctx, server, availability_group, topology_file, cli.format),
    }
}

struct CheckArgs {
    server: String,
    remediate: bool,
    availability_group: Option<String>,
    admin_user: Option<String>,
    topology_file: Option<PathBuf>,
}

fn run_check(mut ctx: AppContext, args: CheckArgs, format: OutputFormat) -> Result<()> {
    if let Some(path) = args.topology_file {
        ctx.config_mut().topology.file = Some(path);
    }

    let mut options = CheckOptions::new(args.server).with_remediate(args.remediate);
    if let Some(group) = args.availability_group {
        options = options.with_availability_group(group);
    }
    if args.remediate {
        let credential = resolve_credential(
            &ctx.config().directory,
            args.admin_user.as_deref(),
            prompt_password,
        )?;
        options = options.with_credential(credential);
    }

    let cmd = CheckCommand::new(ctx);
    let report = cmd.execute(&options)?;

    match format {
        OutputFormat::Table => print_check_table(&report),
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Quiet => {
            let exit_code = print_check_quiet(&report);
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn run_required(
    mut ctx: AppContext,
    server: String,
    availability_group: Option<String>,
    topology_file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    if let Some(path) = topology_file {
        ctx.config_mut().topology.file = Some(path);
    }

    let mut options = RequiredOptions::new(server);
    if let Some(group) = availability_group {
        options = options.with_availability_group(group);
    }

    let report = RequiredCommand::new(ctx).execute(&options)?;

    match format {
        OutputFormat::Table => print_required_table(&report),
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Quiet => {
            for spn in &report.required {
                println!("{}", spn);
            }
        }
    }

    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_check_table(report: &CheckReport) {
    print_topology(&report.server, &report.topology);
    println!("Owner: {}", owner_label(&report.owner));
    println!();

    for warning in &report.warnings {
        println!("{} {}", style("warning:").yellow().bold(), warning);
    }
    if !report.warnings.is_empty() {
        println!();
    }

    println!("Required SPNs ({}):", report.required.len());
    for spn in &report.required {
        let marker = if !report.missing.contains(spn) {
            style(format!("{:<9}", "[OK]")).green()
        } else if report.registered.contains(spn) {
            style(format!("{:<9}", "[ADDED]")).cyan()
        } else {
            style(format!("{:<9}", "[MISSING]")).red()
        };
        println!("  {} {}", marker, spn);
    }
    println!();

    if report.missing.is_empty() {
        println!(
            "{} All required SPNs are registered to {}",
            style("✓").green().bold(),
            owner_label(&report.owner)
        );
        return;
    }

    if !report.registered.is_empty() {
        println!(
            "{} Registered {} SPN(s) to {}",
            style("✓").green().bold(),
            report.registered.len(),
            owner_label(&report.owner)
        );
    }

    if !report.manual_commands.is_empty() {
        println!(
            "{} {} SPN(s) missing. Register them with:",
            style("✗").red().bold(),
            report.manual_commands.len()
        );
        for command in &report.manual_commands {
            println!("  {}", command);
        }
    }
}

fn print_check_quiet(report: &CheckReport) -> i32 {
    if report.manual_commands.is_empty() {
        return 0;
    }
    for command in &report.manual_commands {
        println!("{}", command);
    }
    1
}

fn print_required_table(report: &RequiredReport) {
    print_topology(&report.server, &report.topology);
    println!();
    println!("Required SPNs ({}):", report.required.len());
    for spn in &report.required {
        println!("  {}", spn);
    }
}

fn print_json<T: serde::Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn print_topology(server: &str, topology: &Topology) {
    println!("Server: {}", server);
    match topology {
        Topology::AvailabilityGroup { name, listener, .. } => println!(
            "Topology: {} '{}' (listener {}:{})",
            topology.mode(),
            name,
            listener.network_name,
            listener.port
        ),
        _ => println!("Topology: {}", topology.mode()),
    }
    for node in topology.nodes() {
        println!(
            "  {}:{} as {}",
            node.endpoint.network_name, node.endpoint.port, node.service_account
        );
    }
}

fn owner_label(owner: &SpnOwner) -> String {
    match owner {
        SpnOwner::Account(account) => account.to_string(),
        SpnOwner::Machine { host } => format!("the machine account of {}", host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_check(args: &[&str]) -> Result<bool, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        match cli.command {
            Commands::Check { remediate, .. } => Ok(remediate),
            Commands::Required { .. } => panic!("expected the check subcommand"),
        }
    }

    #[test]
    fn test_check_requires_remediate_flag() {
        let err = parse_check(&["kerbcheck", "check", "sql01"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_check_parses_remediate_values() {
        assert!(parse_check(&["kerbcheck", "check", "sql01", "--remediate", "yes"]).unwrap());
        assert!(parse_check(&["kerbcheck", "check", "sql01", "--remediate", "Y"]).unwrap());
        assert!(!parse_check(&["kerbcheck", "check", "sql01", "--remediate", "0"]).unwrap());
        assert!(parse_check(&["kerbcheck", "check", "sql01", "--remediate", "maybe"]).is_err());
    }

    #[test]
    fn test_required_needs_no_remediate_flag() {
        let cli = Cli::try_parse_from(["kerbcheck", "required", "sql01", "-a", "AG1"]).unwrap();
        assert!(matches!(cli.command, Commands::Required { .. }));
    }
}
