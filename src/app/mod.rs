//! Core application logic for salesbridge
//!
//! This module contains the main application components: the report fetch
//! client, archive extraction and backup bookkeeping, the document
//! transform, the delivery clients, and the run orchestrator.
//!
//! # Examples
//!
//! ```rust,no_run
//! use salesbridge::app::run_integration;
//! use salesbridge::config::{Config, Secrets};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(std::path::Path::new("tenant.toml"))?;
//! let secrets = Secrets::from_env()?;
//! run_integration(&config, &secrets).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod delivery;
pub mod extract;
pub mod runner;
pub mod transform;
pub mod workdir;

// Re-export main public API
pub use client::ReportClient;
pub use delivery::{
    build_uploader, Deliverer, FtpSessionFactory, RetryPolicy, SessionFactory,
    SftpSessionFactory, TransferSession, Uploader,
};
pub use extract::{validate_archive, Extractor};
pub use runner::{run_integration, RunLog};
pub use transform::Transformer;
pub use workdir::Workdir;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        assert!(validate_archive(b"not an archive").is_err());
    }
}
