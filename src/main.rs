//! xptrace - describe and diagnose Crossplane claims and composite resources
//!
//! Walks `spec.resourceRef`/`spec.resourceRefs` from a root object down to
//! the managed resources and prints the resulting tree.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use xptrace::cli::{
    ConfigSubcommand, DiagnoseArgs, TraceArgs, display_version, handle_config_command,
    handle_describe, handle_diagnose, init_logging,
};
use xptrace::config::ConfigLoader;

#[derive(Parser, Debug)]
#[command(name = "xptrace")]
#[command(about = "Describe and diagnose Crossplane claims and composite resources", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Describe a claim or composite resource and all its children
    ///
    /// Examples:
    ///   xptrace describe objectstorage my-object-storage
    ///   xptrace describe xobjectstorage.my-fqdn.cloud/v1alpha1 my-object-storage -n my-namespace
    Describe(TraceArgs),
    /// Find unhealthy resources below a claim or composite resource
    Diagnose(DiagnoseArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(log_file) = init_logging(args.debug) {
        eprintln!("Debug logging to {}", log_file.display());
    }

    match args.command {
        Command::Describe(trace) => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            handle_describe(trace, &config).await
        }
        Command::Diagnose(diagnose) => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            handle_diagnose(diagnose, &config).await
        }
        Command::Config { subcommand } => handle_config_command(subcommand),
        Command::Version => {
            display_version();
            Ok(())
        }
    }
}
