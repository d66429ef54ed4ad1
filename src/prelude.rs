//! Prelude module for the salesbridge library
//!
//! Re-exports the items needed for typical embedding with a single
//! `use salesbridge::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use salesbridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(std::path::Path::new("tenant.toml"))?;
//!     let secrets = Secrets::from_env()?;
//!     run_integration(&config, &secrets).await
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Configuration
pub use crate::config::{Config, Protocol, Secrets};

// Core components
pub use crate::app::{
    build_uploader, run_integration, Extractor, ReportClient, RunLog, Transformer, Uploader,
    Workdir,
};

// Notification
pub use crate::notify::Notifier;
