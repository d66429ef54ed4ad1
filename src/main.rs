//! salesbridge CLI application
//!
//! Scheduled entry point: pulls sales-report archives from the commerce
//! backend, delivers the extracted documents to the transfer endpoint, and
//! emails a run report. Exits non-zero when any tenant run fails.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use salesbridge::cli::{handle_check, handle_run, Cli, Commands};
use salesbridge::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(&cli);

    info!("salesbridge v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Run(args) => {
            info!("Executing run command");
            handle_run(args).await
        }
        Commands::Check(args) => {
            info!("Executing check command");
            handle_check(args).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("salesbridge={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
