//! Delivery of extracted documents to the transfer endpoint
//!
//! One contract, two protocol variants. The wire protocols live behind the
//! [`TransferSession`] / [`SessionFactory`] seam; everything the contract
//! promises (empty-batch rejection, one session per attempt, strict input
//! order, all-or-nothing accounting, close on every exit path, whole-call
//! retry with an auth/transport error filter) is implemented once in
//! [`Deliverer`] and exercised against mock sessions in the tests below.
//!
//! Retry policy is an explicit parameter rather than a property of a
//! variant; a deployment that wants the legacy single-shot behavior sets
//! `max_attempts = 1`.

pub mod ftp;
pub mod sftp;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::{Protocol, TransferConfig};
use crate::errors::{DeliveryError, DeliveryResult};

pub use ftp::FtpSessionFactory;
pub use sftp::SftpSessionFactory;

/// One live, authenticated session with the transfer endpoint
pub trait TransferSession {
    /// Change the remote working directory for subsequent transfers.
    ///
    /// Callers treat failure as non-fatal: files then land in the session's
    /// default directory.
    fn change_dir(&mut self, dir: &str) -> DeliveryResult<()>;

    /// Transfer one local file under the given remote name (binary-safe,
    /// whole file)
    fn send_file(&mut self, local: &Path, remote_name: &str) -> DeliveryResult<()>;

    /// Release the session and its underlying connection. Must be safe to
    /// call exactly once on every exit path, including after errors.
    fn close(&mut self);
}

/// Connects authenticated sessions, one per upload attempt
pub trait SessionFactory {
    type Session: TransferSession;

    /// Establish and authenticate a fresh session
    fn connect(&self) -> DeliveryResult<Self::Session>;

    /// Endpoint description for log lines, e.g. `SFTP files.example.com:22`
    fn describe(&self) -> String;
}

/// Whole-call retry parameters for one delivery
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included; 1 disables retry
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay,
        }
    }
}

/// Object-safe upload contract consumed by the orchestrator
pub trait Uploader: Send {
    /// Transfer every file to the remote endpoint
    ///
    /// Returns `true` only if every requested file was transferred within
    /// one attempt. Uploading nothing is never success. Failures are logged
    /// here; the caller only branches on the outcome.
    fn upload(&self, paths: &[PathBuf]) -> bool;
}

/// Protocol-independent delivery logic
///
/// A retry re-runs the whole attempt with a fresh session and every file
/// again, so remote overwrite semantics must be last-write-wins. Partial
/// duplicate transfers across attempts are an accepted side effect.
#[derive(Debug)]
pub struct Deliverer<F: SessionFactory> {
    factory: F,
    remote_dir: String,
    policy: RetryPolicy,
}

impl<F: SessionFactory> Deliverer<F> {
    pub fn new(factory: F, remote_dir: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            factory,
            remote_dir: remote_dir.into(),
            policy,
        }
    }

    /// Run upload attempts until one succeeds, a non-retryable error occurs,
    /// or attempts are exhausted
    fn try_upload(&self, paths: &[PathBuf]) -> DeliveryResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.upload_attempt(paths) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        "Upload to {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        self.factory.describe(),
                        attempt,
                        self.policy.max_attempts,
                        e,
                        self.policy.delay
                    );
                    std::thread::sleep(self.policy.delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt: connect, optionally change directory, transfer all
    /// files in order, close the session on every exit path
    fn upload_attempt(&self, paths: &[PathBuf]) -> DeliveryResult<()> {
        let mut session = self.factory.connect()?;
        info!("Connected to {}", self.factory.describe());

        let outcome = self.transfer_all(&mut session, paths);
        session.close();

        let sent = outcome?;
        if sent == paths.len() {
            info!("All {} file(s) transferred", sent);
            Ok(())
        } else {
            // Unreachable with the current per-file error propagation; kept
            // as the contract's accounting invariant.
            Err(DeliveryError::Transport(format!(
                "transferred {} of {} file(s)",
                sent,
                paths.len()
            )))
        }
    }

    fn transfer_all(
        &self,
        session: &mut F::Session,
        paths: &[PathBuf],
    ) -> DeliveryResult<usize> {
        if !self.remote_dir.is_empty() {
            if let Err(e) = session.change_dir(&self.remote_dir) {
                warn!(
                    "Could not change to remote directory {}: {}. Uploading to the session default",
                    self.remote_dir, e
                );
            }
        }

        let mut sent = 0usize;
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    DeliveryError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("path has no usable file name: {}", path.display()),
                    ))
                })?;

            info!("Uploading {}", name);
            session.send_file(path, name)?;
            sent += 1;
        }
        Ok(sent)
    }
}

impl<F: SessionFactory + Send> Uploader for Deliverer<F> {
    fn upload(&self, paths: &[PathBuf]) -> bool {
        if paths.is_empty() {
            warn!("Nothing to upload; refusing an empty batch");
            return false;
        }

        match self.try_upload(paths) {
            Ok(()) => true,
            Err(e) => {
                error!("Upload to {} failed: {}", self.factory.describe(), e);
                false
            }
        }
    }
}

/// Build the uploader for the configured protocol variant
pub fn build_uploader(config: &TransferConfig, password: &str) -> Box<dyn Uploader> {
    let policy = RetryPolicy::from_config(config);
    match config.protocol {
        Protocol::Sftp => Box::new(Deliverer::new(
            SftpSessionFactory::new(config, password),
            config.remote_dir.clone(),
            policy,
        )),
        Protocol::Ftp => Box::new(Deliverer::new(
            FtpSessionFactory::new(config, password),
            config.remote_dir.clone(),
            policy,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// What a scripted session should do on this attempt
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Fault {
        None,
        ConnectRefused,
        AuthRejected,
        ChangeDirDenied,
        /// Transport error after successfully sending this many files
        DropAfter(usize),
    }

    #[derive(Debug, Default)]
    struct SessionLog {
        connects: usize,
        closes: usize,
        chdir_attempts: usize,
        sent: Vec<String>,
    }

    struct MockFactory {
        faults: Mutex<VecDeque<Fault>>,
        log: Arc<Mutex<SessionLog>>,
    }

    impl MockFactory {
        /// Faults are consumed one per attempt; attempts beyond the script
        /// behave cleanly
        fn scripted(faults: &[Fault]) -> (Self, Arc<Mutex<SessionLog>>) {
            let log = Arc::new(Mutex::new(SessionLog::default()));
            (
                Self {
                    faults: Mutex::new(faults.iter().copied().collect()),
                    log: Arc::clone(&log),
                },
                log,
            )
        }
    }

    struct MockSession {
        fault: Fault,
        sent_this_attempt: usize,
        log: Arc<Mutex<SessionLog>>,
    }

    impl SessionFactory for MockFactory {
        type Session = MockSession;

        fn connect(&self) -> DeliveryResult<MockSession> {
            let fault = self
                .faults
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Fault::None);
            match fault {
                Fault::ConnectRefused => Err(DeliveryError::Connect("connection refused".into())),
                Fault::AuthRejected => Err(DeliveryError::Auth("bad password".into())),
                fault => {
                    self.log.lock().unwrap().connects += 1;
                    Ok(MockSession {
                        fault,
                        sent_this_attempt: 0,
                        log: Arc::clone(&self.log),
                    })
                }
            }
        }

        fn describe(&self) -> String {
            "MOCK test-endpoint:0".to_string()
        }
    }

    impl TransferSession for MockSession {
        fn change_dir(&mut self, _dir: &str) -> DeliveryResult<()> {
            self.log.lock().unwrap().chdir_attempts += 1;
            if self.fault == Fault::ChangeDirDenied {
                Err(DeliveryError::Transport("550 no such directory".into()))
            } else {
                Ok(())
            }
        }

        fn send_file(&mut self, _local: &Path, remote_name: &str) -> DeliveryResult<()> {
            if let Fault::DropAfter(n) = self.fault {
                if self.sent_this_attempt >= n {
                    return Err(DeliveryError::Transport("unexpected end of stream".into()));
                }
            }
            self.sent_this_attempt += 1;
            self.log.lock().unwrap().sent.push(remote_name.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.log.lock().unwrap().closes += 1;
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/tmp/{n}"))).collect()
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_happy_path_transfers_in_order() {
        let (factory, log) = MockFactory::scripted(&[]);
        let deliverer = Deliverer::new(factory, "/inbound", policy(3));

        assert!(deliverer.upload(&paths(&["outlets.xml", "sales.xml"])));

        let log = log.lock().unwrap();
        assert_eq!(log.connects, 1);
        assert_eq!(log.closes, 1);
        assert_eq!(log.sent, vec!["outlets.xml", "sales.xml"]);
    }

    #[test]
    fn test_empty_batch_fails_without_session() {
        let (factory, log) = MockFactory::scripted(&[]);
        let deliverer = Deliverer::new(factory, "/inbound", policy(3));

        assert!(!deliverer.upload(&[]));
        assert_eq!(log.lock().unwrap().connects, 0);
    }

    #[test]
    fn test_transport_errors_retried_until_success() {
        let (factory, log) = MockFactory::scripted(&[Fault::ConnectRefused, Fault::DropAfter(1)]);
        let deliverer = Deliverer::new(factory, "", policy(3));

        assert!(deliverer.upload(&paths(&["a.xml", "b.xml"])));

        let log = log.lock().unwrap();
        // Attempt 1 never connected, attempt 2 dropped mid-batch, attempt 3
        // re-uploaded the whole set
        assert_eq!(log.connects, 2);
        assert_eq!(log.closes, 2);
        assert_eq!(log.sent, vec!["a.xml", "a.xml", "b.xml"]);
    }

    #[test]
    fn test_exhausted_retries_fail() {
        let (factory, log) = MockFactory::scripted(&[
            Fault::ConnectRefused,
            Fault::ConnectRefused,
            Fault::ConnectRefused,
        ]);
        let deliverer = Deliverer::new(factory, "", policy(3));

        assert!(!deliverer.upload(&paths(&["a.xml"])));
        assert_eq!(log.lock().unwrap().connects, 0);
    }

    #[test]
    fn test_auth_rejection_is_not_retried() {
        let (factory, log) = MockFactory::scripted(&[Fault::AuthRejected]);
        let deliverer = Deliverer::new(factory, "", policy(3));

        assert!(!deliverer.upload(&paths(&["a.xml"])));
        // No further attempts after the auth failure
        assert_eq!(log.lock().unwrap().connects, 0);
        assert!(log.lock().unwrap().sent.is_empty());
    }

    #[test]
    fn test_mid_batch_failure_close_still_runs() {
        let (factory, log) = MockFactory::scripted(&[Fault::DropAfter(0), Fault::DropAfter(0)]);
        let deliverer = Deliverer::new(factory, "", policy(2));

        assert!(!deliverer.upload(&paths(&["a.xml"])));

        let log = log.lock().unwrap();
        // Both sessions were opened and both were closed despite the errors
        assert_eq!(log.connects, 2);
        assert_eq!(log.closes, 2);
    }

    #[test]
    fn test_directory_change_failure_is_non_fatal() {
        let (factory, log) = MockFactory::scripted(&[Fault::ChangeDirDenied]);
        let deliverer = Deliverer::new(factory, "/missing/dir", policy(3));

        assert!(deliverer.upload(&paths(&["outlets.xml", "sales.xml"])));

        let log = log.lock().unwrap();
        assert_eq!(log.chdir_attempts, 1);
        assert_eq!(log.sent, vec!["outlets.xml", "sales.xml"]);
    }

    #[test]
    fn test_blank_remote_dir_skips_chdir() {
        let (factory, log) = MockFactory::scripted(&[]);
        let deliverer = Deliverer::new(factory, "", policy(3));

        assert!(deliverer.upload(&paths(&["a.xml"])));
        assert_eq!(log.lock().unwrap().chdir_attempts, 0);
    }

    #[test]
    fn test_single_attempt_policy_disables_retry() {
        let (factory, log) = MockFactory::scripted(&[Fault::ConnectRefused]);
        let deliverer = Deliverer::new(factory, "", policy(1));

        assert!(!deliverer.upload(&paths(&["a.xml"])));
        assert_eq!(log.lock().unwrap().connects, 0);
    }
}
