//! Configuration management for salesbridge
//!
//! One TOML file fully describes a tenant (commerce backend, transfer
//! endpoint, mail settings); secrets are never stored in the file and are
//! resolved from environment variables, with `.env` support at startup.
//! Multi-tenant deployments keep one file per tenant and run them
//! sequentially.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::constants::{env as env_vars, http, limits, report, transfer, transform};
use crate::errors::{ConfigError, ConfigResult};

/// Delivery protocol selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Encrypted session over SSH
    Sftp,
    /// Plaintext legacy protocol
    Ftp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Sftp => write!(f, "SFTP"),
            Protocol::Ftp => write!(f, "FTP"),
        }
    }
}

/// Tenant configuration, loaded from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Human-readable tenant name used in log lines and mail subjects
    pub company_name: String,

    /// Commerce backend settings
    pub commerce: CommerceConfig,

    /// Transfer endpoint settings
    pub transfer: TransferConfig,

    /// Mail report settings
    pub mail: MailConfig,

    /// Document transform settings
    #[serde(default)]
    pub transform: TransformConfig,

    /// Local working-area settings
    #[serde(default)]
    pub run: RunConfig,
}

/// Commerce backend (report source) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommerceConfig {
    /// Base URL of the commerce backend
    pub base_url: String,

    /// OAuth client identifier
    pub client_id: String,

    /// Tenant company identifier sent with every report request
    pub company_id: i64,

    /// Filial identifier sent with every report request
    pub filial_id: i64,

    /// Report template identifiers, one download per id per run
    pub template_ids: Vec<i64>,

    /// Period-type tag sent with every report request
    #[serde(default = "default_period_type")]
    pub period_type: String,

    /// Days between today and the end of the report window
    #[serde(default = "default_lag_days")]
    pub lag_days: u32,

    /// Report window length in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Delay between download attempts
    #[serde(with = "humantime_serde", default = "default_download_retry_delay")]
    pub download_retry_delay: Duration,

    /// Timeout for the report download call
    #[serde(with = "humantime_serde", default = "default_report_timeout")]
    pub report_timeout: Duration,
}

/// Transfer endpoint (report destination) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Protocol variant to use
    pub protocol: Protocol,

    /// Remote host name or address
    pub host: String,

    /// Remote port
    pub port: u16,

    /// Login user name
    pub username: String,

    /// Remote directory to upload into. Directory-change failure is
    /// non-fatal: files then land in the session's default directory.
    #[serde(default)]
    pub remote_dir: String,

    /// Whole-call attempts for one delivery (1 disables retry)
    #[serde(default = "default_upload_attempts")]
    pub max_attempts: u32,

    /// Delay between delivery attempts
    #[serde(with = "humantime_serde", default = "default_upload_retry_delay")]
    pub retry_delay: Duration,
}

/// Mail report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sender address (also the SMTP login user)
    pub sender: String,

    /// Report recipients
    pub recipients: Vec<String>,

    /// SMTP server host
    pub smtp_host: String,

    /// SMTP server port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

/// Document transform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Whether the area-id rewrite runs on extracted documents
    pub enabled: bool,

    /// JSON file mapping old area ids to new ones
    pub mapping_file: PathBuf,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mapping_file: PathBuf::from(transform::DEFAULT_MAPPING_FILE),
        }
    }
}

/// Local working-area settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Root for the temp extraction area and backups (default: current dir)
    pub working_dir: Option<PathBuf>,
}

fn default_period_type() -> String {
    report::DEFAULT_PERIOD_TYPE.to_string()
}

fn default_lag_days() -> u32 {
    report::DEFAULT_LAG_DAYS
}

fn default_window_days() -> u32 {
    report::DEFAULT_WINDOW_DAYS
}

fn default_download_retry_delay() -> Duration {
    limits::DEFAULT_DOWNLOAD_RETRY_DELAY
}

fn default_report_timeout() -> Duration {
    http::DEFAULT_REPORT_TIMEOUT
}

fn default_upload_attempts() -> u32 {
    limits::MAX_UPLOAD_ATTEMPTS
}

fn default_upload_retry_delay() -> Duration {
    limits::DEFAULT_UPLOAD_RETRY_DELAY
}

fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load and validate a tenant configuration from a TOML file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        Url::parse(&self.commerce.base_url).map_err(|e| ConfigError::InvalidValue {
            field: "commerce.base_url".to_string(),
            reason: e.to_string(),
        })?;

        if self.commerce.template_ids.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "commerce.template_ids".to_string(),
                reason: "at least one template id is required".to_string(),
            });
        }

        if self.transfer.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.mail.recipients.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "mail.recipients".to_string(),
                reason: "at least one recipient is required".to_string(),
            });
        }

        Ok(())
    }

    /// Working-area root, defaulting to the process working directory
    pub fn working_dir(&self) -> PathBuf {
        self.run
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl TransferConfig {
    /// Default port for the selected protocol, used when `port` is zero
    pub fn effective_port(&self) -> u16 {
        if self.port != 0 {
            return self.port;
        }
        match self.protocol {
            Protocol::Sftp => transfer::DEFAULT_SSH_PORT,
            Protocol::Ftp => transfer::DEFAULT_FTP_PORT,
        }
    }
}

/// Secrets resolved from the environment, never from the config file.
/// Deliberately not `Debug`: these values must not end up in log output.
#[derive(Clone)]
pub struct Secrets {
    /// OAuth client secret for the commerce backend
    pub client_secret: String,

    /// Password for the transfer endpoint
    pub transfer_password: String,

    /// SMTP password for the mail sender
    pub mail_password: String,
}

impl Secrets {
    /// Read all secrets from the environment
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            client_secret: require_env(env_vars::CLIENT_SECRET)?,
            transfer_password: require_env(env_vars::TRANSFER_PASSWORD)?,
            mail_password: require_env(env_vars::MAIL_PASSWORD)?,
        })
    }
}

fn require_env(var: &str) -> ConfigResult<String> {
    std::env::var(var).map_err(|_| ConfigError::MissingSecret {
        var: var.to_string(),
    })
}
