//! Command-line argument parsing for salesbridge
//!
//! This module defines the CLI structure using clap derive macros. The
//! binary is built for unattended scheduled runs, so the surface is small:
//! run the integration for one or more tenants, or check a tenant's
//! configuration and credentials.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// salesbridge - move sales-report archives from a commerce backend to a transfer endpoint
#[derive(Parser, Debug)]
#[command(
    name = "salesbridge",
    version,
    about = "Pull sales-report archives and deliver them to SFTP/FTP",
    long_about = "Unattended integration bridge: downloads sales-report archives from a commerce \
backend, extracts and optionally rewrites the documents, uploads them to a transfer endpoint, \
and emails a run report."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (trace level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the integration run for each given tenant configuration
    Run(RunArgs),

    /// Validate a tenant configuration and verify credentials
    Check(CheckArgs),
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tenant configuration file(s), processed sequentially
    #[arg(short, long = "config", value_name = "FILE", required = true)]
    pub configs: Vec<PathBuf>,
}

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Tenant configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level derived from the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.quiet {
            "error"
        } else if self.global.very_verbose {
            "trace"
        } else if self.global.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_accepts_multiple_configs() {
        let cli = Cli::try_parse_from([
            "salesbridge",
            "run",
            "--config",
            "a.toml",
            "--config",
            "b.toml",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.configs, vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_run_requires_a_config() {
        assert!(Cli::try_parse_from(["salesbridge", "run"]).is_err());
    }

    #[test]
    fn test_log_level_from_flags() {
        let cli = Cli::try_parse_from(["salesbridge", "-v", "check", "--config", "t.toml"]).unwrap();
        assert_eq!(cli.log_level(), "debug");

        let cli = Cli::try_parse_from(["salesbridge", "-q", "check", "--config", "t.toml"]).unwrap();
        assert_eq!(cli.log_level(), "error");

        let cli = Cli::try_parse_from(["salesbridge", "check", "--config", "t.toml"]).unwrap();
        assert_eq!(cli.log_level(), "info");
    }
}
