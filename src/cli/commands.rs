//! Command handlers for the salesbridge CLI
//!
//! Thin glue between parsed arguments and the core application: load the
//! tenant configuration, resolve secrets, and hand off to the orchestrator.

use tracing::{error, info};

use crate::app::{run_integration, ReportClient};
use crate::cli::{CheckArgs, RunArgs};
use crate::config::{Config, Secrets};
use crate::errors::{AppError, Result};

/// Handle the run command
///
/// Tenants are processed strictly one after another; a failing tenant does
/// not stop the remaining ones, but any failure makes the whole invocation
/// exit non-zero.
pub async fn handle_run(args: RunArgs) -> Result<()> {
    let secrets = Secrets::from_env()?;
    let mut failed: Vec<String> = Vec::new();

    for path in &args.configs {
        info!("Processing tenant configuration: {}", path.display());

        let config = match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Could not load {}: {}", path.display(), e);
                failed.push(path.display().to_string());
                continue;
            }
        };

        match run_integration(&config, &secrets).await {
            Ok(()) => info!("Tenant {} completed successfully", config.company_name),
            Err(e) => {
                error!("Tenant {} failed: {}", config.company_name, e);
                failed.push(config.company_name.clone());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::generic(format!(
            "{} tenant run(s) failed: {}",
            failed.len(),
            failed.join(", ")
        )))
    }
}

/// Handle the check command: validate the configuration and perform a
/// credential exchange against the token endpoint
pub async fn handle_check(args: CheckArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    println!("Configuration OK: {}", args.config.display());
    println!("  company:   {}", config.company_name);
    println!("  templates: {:?}", config.commerce.template_ids);
    println!("  transfer:  {} {}:{}", config.transfer.protocol, config.transfer.host, config.transfer.effective_port());

    let secrets = Secrets::from_env()?;
    let client = ReportClient::new(&config.commerce, &secrets.client_secret)?;
    client.verify().await?;
    println!("Credential exchange OK");

    Ok(())
}
