//! Error types for salesbridge
//!
//! This module defines the error taxonomy for all components of the
//! application. Errors are designed to be actionable: retryable conditions
//! are distinguishable from terminal ones, and remote failures carry a
//! truncated snippet of the offending response for diagnostics.

use std::path::PathBuf;
use thiserror::Error;

/// Report fetch errors (token lifecycle and report download)
#[derive(Error, Debug)]
pub enum FetchError {
    /// Credential exchange rejected by the token endpoint
    #[error("Credential exchange failed: {reason}")]
    Auth { reason: String },

    /// In-flight bearer token rejected mid-operation; the stored credential
    /// has been invalidated and will be re-acquired on the next attempt
    #[error("Bearer token rejected by the report endpoint; re-acquiring on retry")]
    AuthExpired,

    /// Report endpoint returned a non-success status other than auth
    #[error("Report endpoint error: HTTP {status}: {snippet}")]
    Remote { status: u16, snippet: String },

    /// Response had a nominal status but the payload is not a valid archive
    /// (commonly an HTML error page served with 200)
    #[error("Report payload is not a valid archive: {snippet}")]
    InvalidPayload { snippet: String },

    /// HTTP transport error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Invalid endpoint URL derived from configuration
    #[error("Invalid endpoint URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether the download retry loop should attempt again after this error.
    ///
    /// The credential-exchange rejection is terminal: wrong client
    /// credentials do not heal between attempts.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::AuthExpired
            | FetchError::Remote { .. }
            | FetchError::InvalidPayload { .. }
            | FetchError::Http(_) => true,
            FetchError::Auth { .. } | FetchError::InvalidUrl { .. } => false,
        }
    }
}

/// Local file processing errors (archive extraction, working area)
#[derive(Error, Debug)]
pub enum FileError {
    /// Byte sequence is not a valid archive container
    #[error("Invalid archive: {reason}")]
    InvalidArchive { reason: String },

    /// Archive member failed to materialize
    #[error("Failed to extract archive member {name}")]
    MemberExtraction {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while managing the working area
    #[error("File I/O error")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for FileError {
    fn from(err: zip::result::ZipError) -> Self {
        FileError::InvalidArchive {
            reason: err.to_string(),
        }
    }
}

/// Delivery session and transfer errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Could not establish a connection to the remote endpoint
    #[error("Connection to transfer endpoint failed: {0}")]
    Connect(String),

    /// Remote endpoint rejected the configured credentials. Never retried:
    /// a wrong password does not heal between attempts.
    #[error("Transfer endpoint rejected credentials: {0}")]
    Auth(String),

    /// Transport-level failure mid-session (socket error, protocol error,
    /// unexpected end of stream). Retryable with a fresh session.
    #[error("Transfer session failed: {0}")]
    Transport(String),

    /// Local file could not be read for upload
    #[error("Local file error during upload")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    /// Whether a fresh session attempt may succeed after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Connect(_) | DeliveryError::Transport(_) | DeliveryError::Io(_) => true,
            DeliveryError::Auth(_) => false,
        }
    }
}

/// Document transform errors
#[derive(Error, Debug)]
pub enum TransformError {
    /// XML document could not be parsed
    #[error("XML parse error in {path}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    /// Mapping table could not be parsed
    #[error("Area mapping file is not valid JSON")]
    MappingParse(#[from] serde_json::Error),

    /// I/O error reading or writing the document
    #[error("Transform I/O error")]
    Io(#[from] std::io::Error),
}

/// Notification (email) errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Recipient or sender address failed to parse
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Message construction failed
    #[error("Failed to build email message")]
    Build(#[from] lettre::error::Error),

    /// SMTP transport failure
    #[error("SMTP delivery failed")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Required secret missing from the environment
    #[error("Missing required environment variable: {var}")]
    MissingSecret { var: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// I/O error reading configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Report fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// File processing error
    #[error(transparent)]
    File(#[from] FileError),

    /// Delivery error
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Document transform error
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Notification error
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("{message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(e) => e.is_retryable(),
            AppError::Delivery(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get error category for logging and the run report
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::File(_) => "file",
            AppError::Delivery(_) => "delivery",
            AppError::Transform(_) => "transform",
            AppError::Notify(_) => "notify",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// File processing result type alias
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Delivery result type alias
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

/// Transform result type alias
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Notification result type alias
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_retryability() {
        assert!(FetchError::AuthExpired.is_retryable());
        assert!(
            FetchError::Remote {
                status: 500,
                snippet: "oops".into()
            }
            .is_retryable()
        );
        assert!(
            FetchError::InvalidPayload {
                snippet: "<html>".into()
            }
            .is_retryable()
        );
        assert!(
            !FetchError::Auth {
                reason: "bad client secret".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_delivery_retryability() {
        assert!(DeliveryError::Connect("refused".into()).is_retryable());
        assert!(DeliveryError::Transport("reset".into()).is_retryable());
        assert!(!DeliveryError::Auth("bad password".into()).is_retryable());
    }

    #[test]
    fn test_app_error_category() {
        let err = AppError::Fetch(FetchError::AuthExpired);
        assert_eq!(err.category(), "fetch");
        assert!(err.is_recoverable());

        let err = AppError::Config(ConfigError::MissingSecret {
            var: "SALESBRIDGE_CLIENT_SECRET".into(),
        });
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());
    }
}
