//! Encrypted delivery variant over SSH
//!
//! Session establishment is TCP connect, SSH handshake, password
//! authentication, then an SFTP channel. SFTP has no working-directory
//! state, so `change_dir` resolves the target directory once and prefixes
//! subsequent remote paths with it.

use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};

use ssh2::Session;
use tracing::debug;

use crate::config::TransferConfig;
use crate::constants::transfer;
use crate::errors::{DeliveryError, DeliveryResult};

use super::{SessionFactory, TransferSession};

/// Connects authenticated SFTP sessions
#[derive(Clone)]
pub struct SftpSessionFactory {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl std::fmt::Debug for SftpSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpSessionFactory")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SftpSessionFactory {
    pub fn new(config: &TransferConfig, password: &str) -> Self {
        Self {
            host: config.host.clone(),
            port: config.effective_port(),
            username: config.username.clone(),
            password: password.to_string(),
        }
    }
}

impl SessionFactory for SftpSessionFactory {
    type Session = SftpSession;

    fn connect(&self) -> DeliveryResult<SftpSession> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| DeliveryError::Connect(format!("{}: {e}", self.host)))?
            .next()
            .ok_or_else(|| {
                DeliveryError::Connect(format!("{} did not resolve to an address", self.host))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, transfer::CONNECT_TIMEOUT)
            .map_err(|e| DeliveryError::Connect(e.to_string()))?;

        let mut session =
            Session::new().map_err(|e| DeliveryError::Connect(e.to_string()))?;
        session.set_timeout(transfer::SESSION_TIMEOUT.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| DeliveryError::Connect(format!("SSH handshake failed: {e}")))?;

        session
            .userauth_password(&self.username, &self.password)
            .map_err(|e| DeliveryError::Auth(e.to_string()))?;
        if !session.authenticated() {
            return Err(DeliveryError::Auth(
                "password authentication did not complete".to_string(),
            ));
        }

        let sftp = session
            .sftp()
            .map_err(|e| DeliveryError::Transport(format!("SFTP channel failed: {e}")))?;

        Ok(SftpSession {
            session,
            sftp: Some(sftp),
            remote_dir: None,
        })
    }

    fn describe(&self) -> String {
        format!("SFTP {}:{}", self.host, self.port)
    }
}

/// One live SFTP session
pub struct SftpSession {
    session: Session,
    sftp: Option<ssh2::Sftp>,
    remote_dir: Option<PathBuf>,
}

impl SftpSession {
    fn sftp(&self) -> DeliveryResult<&ssh2::Sftp> {
        self.sftp
            .as_ref()
            .ok_or_else(|| DeliveryError::Transport("SFTP channel already closed".to_string()))
    }
}

impl TransferSession for SftpSession {
    fn change_dir(&mut self, dir: &str) -> DeliveryResult<()> {
        let target = PathBuf::from(dir);
        let stat = self
            .sftp()?
            .stat(&target)
            .map_err(|e| DeliveryError::Transport(format!("{dir}: {e}")))?;
        if !stat.is_dir() {
            return Err(DeliveryError::Transport(format!("{dir} is not a directory")));
        }
        self.remote_dir = Some(target);
        Ok(())
    }

    fn send_file(&mut self, local: &Path, remote_name: &str) -> DeliveryResult<()> {
        let remote_path = match &self.remote_dir {
            Some(dir) => dir.join(remote_name),
            None => PathBuf::from(remote_name),
        };

        let mut source = std::fs::File::open(local)?;
        let mut dest = self
            .sftp()?
            .create(&remote_path)
            .map_err(|e| {
                DeliveryError::Transport(format!("create {}: {e}", remote_path.display()))
            })?;

        let bytes = std::io::copy(&mut source, &mut dest)
            .map_err(|e| DeliveryError::Transport(format!("write {remote_name}: {e}")))?;
        debug!("Sent {} ({} bytes)", remote_name, bytes);
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the channel before disconnecting keeps libssh2 happy.
        self.sftp.take();
        let _ = self.session.disconnect(None, "done", None);
        debug!("SFTP session closed");
    }
}
