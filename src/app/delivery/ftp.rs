//! Plaintext legacy delivery variant
//!
//! Kept for endpoints that only speak FTP. Same contract and retry policy
//! as the encrypted variant; only the wire protocol differs.

use std::path::Path;

use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::debug;

use crate::config::TransferConfig;
use crate::errors::{DeliveryError, DeliveryResult};

use super::{SessionFactory, TransferSession};

/// Connects authenticated FTP sessions
#[derive(Clone)]
pub struct FtpSessionFactory {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl std::fmt::Debug for FtpSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpSessionFactory")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl FtpSessionFactory {
    pub fn new(config: &TransferConfig, password: &str) -> Self {
        Self {
            host: config.host.clone(),
            port: config.effective_port(),
            username: config.username.clone(),
            password: password.to_string(),
        }
    }
}

impl SessionFactory for FtpSessionFactory {
    type Session = FtpSession;

    fn connect(&self) -> DeliveryResult<FtpSession> {
        let mut stream = FtpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| DeliveryError::Connect(e.to_string()))?;

        stream
            .login(&self.username, &self.password)
            .map_err(|e| DeliveryError::Auth(e.to_string()))?;

        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(FtpSession { stream })
    }

    fn describe(&self) -> String {
        format!("FTP {}:{}", self.host, self.port)
    }
}

/// One live FTP control/data session
pub struct FtpSession {
    stream: FtpStream,
}

impl TransferSession for FtpSession {
    fn change_dir(&mut self, dir: &str) -> DeliveryResult<()> {
        self.stream
            .cwd(dir)
            .map_err(|e| DeliveryError::Transport(format!("{dir}: {e}")))
    }

    fn send_file(&mut self, local: &Path, remote_name: &str) -> DeliveryResult<()> {
        let mut source = std::fs::File::open(local)?;
        let bytes = self
            .stream
            .put_file(remote_name, &mut source)
            .map_err(|e| DeliveryError::Transport(format!("STOR {remote_name}: {e}")))?;
        debug!("Sent {} ({} bytes)", remote_name, bytes);
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.stream.quit();
        debug!("FTP session closed");
    }
}
