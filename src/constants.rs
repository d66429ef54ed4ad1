//! Application constants for salesbridge
//!
//! This module centralizes constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for secrets
pub mod env {
    /// Environment variable holding the commerce client secret
    pub const CLIENT_SECRET: &str = "SALESBRIDGE_CLIENT_SECRET";

    /// Environment variable holding the transfer-endpoint password
    pub const TRANSFER_PASSWORD: &str = "SALESBRIDGE_TRANSFER_PASSWORD";

    /// Environment variable holding the SMTP sender password
    pub const MAIL_PASSWORD: &str = "SALESBRIDGE_MAIL_PASSWORD";
}

/// Commerce backend endpoints, relative to the configured base URL
pub mod endpoints {
    /// Client-credentials token exchange
    pub const TOKEN_PATH: &str = "/security/oauth/token";

    /// Sales-report generation
    pub const REPORT_PATH: &str = "/trade/rep/integration/saleswork";

    /// OAuth scope requested with the client-credentials grant
    pub const TOKEN_SCOPE: &str = "read";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "salesbridge/0.1 (Sales Integration Bridge)";

    /// Timeout for the token exchange call
    pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default timeout for the report download call. Reports are generated
    /// server-side on demand and can take many minutes to start streaming.
    pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(1800);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Retry configuration
pub mod limits {
    use super::Duration;

    /// Maximum attempts for a report download (first try included)
    pub const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

    /// Default delay between download attempts. Deployments have used
    /// anything from a few seconds to ten minutes here.
    pub const DEFAULT_DOWNLOAD_RETRY_DELAY: Duration = Duration::from_secs(600);

    /// Maximum attempts for a delivery call (first try included)
    pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

    /// Default delay between delivery attempts
    pub const DEFAULT_UPLOAD_RETRY_DELAY: Duration = Duration::from_secs(15);

    /// Maximum length of response-body snippets carried in errors
    pub const SNIPPET_MAX_CHARS: usize = 200;

    /// Emit a streaming progress log line every this many bytes
    pub const PROGRESS_LOG_INTERVAL_BYTES: u64 = 4 * 1024 * 1024;
}

/// Transfer endpoint configuration constants
pub mod transfer {
    use super::Duration;

    /// TCP connect timeout for delivery sessions
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Blocking-operation timeout within an established session. Generous:
    /// a single large file may legitimately take minutes to transfer.
    pub const SESSION_TIMEOUT: Duration = Duration::from_secs(600);

    /// Default FTP control port
    pub const DEFAULT_FTP_PORT: u16 = 21;

    /// Default SSH port
    pub const DEFAULT_SSH_PORT: u16 = 22;
}

/// File and working-area constants
pub mod files {
    /// Extension (lowercase, no dot) of documents forwarded downstream
    pub const TARGET_EXTENSION: &str = "xml";

    /// Name of the temporary extraction directory under the working root
    pub const TEMP_DIR_NAME: &str = "temp_extract";

    /// Name of the backup directory under the working root
    pub const BACKUPS_DIR_NAME: &str = "backups";

    /// Prefix for backup archive file names
    pub const BACKUP_FILE_PREFIX: &str = "report_";

    /// Timestamp format embedded in backup archive file names
    pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// File name of the document eligible for the area-id rewrite
    pub const OUTLETS_FILE_NAME: &str = "outlets.xml";
}

/// Report request constants
pub mod report {
    /// Date format the report endpoint expects
    pub const DATE_FORMAT: &str = "%d.%m.%Y";

    /// Default period-type tag
    pub const DEFAULT_PERIOD_TYPE: &str = "L90D";

    /// Default report window in days
    pub const DEFAULT_WINDOW_DAYS: u32 = 90;

    /// Default lag in days between today and the end of the window
    pub const DEFAULT_LAG_DAYS: u32 = 1;
}

/// XML transform constants
pub mod transform {
    /// Attribute rewritten by the area-id transform
    pub const AREA_ID_ATTR: &str = "AREA_ID";

    /// Default location of the area mapping table
    pub const DEFAULT_MAPPING_FILE: &str = "data/area_mappings.json";
}

// Re-export commonly used constants for convenience
pub use endpoints::{REPORT_PATH, TOKEN_PATH};
pub use files::{TARGET_EXTENSION, TEMP_DIR_NAME};
pub use limits::{MAX_DOWNLOAD_ATTEMPTS, MAX_UPLOAD_ATTEMPTS};
