//! Backup bookkeeping for downloaded archives
//!
//! Every archive that passes validation is saved under `backups/` before
//! extraction. Backups from the current session are purged only after a
//! fully successful delivery; anything older is cleared at the start of the
//! next run. A failed run therefore always leaves its archives on disk for
//! forensics and manual retry.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::constants::files;
use crate::errors::FileResult;

/// Manages the backup directory under the working root
#[derive(Debug)]
pub struct Workdir {
    backups_dir: PathBuf,
}

impl Workdir {
    /// Create a manager rooted under the given working directory
    pub fn new(working_root: &Path) -> Self {
        Self {
            backups_dir: working_root.join(files::BACKUPS_DIR_NAME),
        }
    }

    /// Path of the backup directory
    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Save an archive payload as a timestamped backup file
    pub async fn save_backup(&self, template_id: i64, bytes: &[u8]) -> FileResult<PathBuf> {
        tokio::fs::create_dir_all(&self.backups_dir).await?;

        let timestamp = Local::now().format(files::BACKUP_TIMESTAMP_FORMAT);
        let name = format!(
            "{}{}_{}.zip",
            files::BACKUP_FILE_PREFIX,
            template_id,
            timestamp
        );
        let path = self.backups_dir.join(name);

        tokio::fs::write(&path, bytes).await?;
        info!("Backup saved: {}", path.display());
        Ok(path)
    }

    /// Remove every file left in the backup directory from earlier runs
    ///
    /// Failures are logged and skipped; a stale backup must never block a
    /// new run.
    pub async fn clear_stale_backups(&self) {
        let mut entries = match tokio::fs::read_dir(&self.backups_dir).await {
            Ok(entries) => entries,
            Err(_) => return, // no backup directory yet
        };

        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_file() {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove stale backup {}: {}", path.display(), e),
                }
            }
        }

        if removed > 0 {
            info!("Cleared {} stale backup file(s)", removed);
        }
    }

    /// Remove the backups created in this session, after a successful run
    pub async fn purge_backups(&self, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!("Backup removed: {}", path.display()),
                Err(e) => warn!("Failed to remove backup {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_backup_creates_timestamped_file() {
        let dir = TempDir::new().unwrap();
        let workdir = Workdir::new(dir.path());

        let path = workdir.save_backup(902, b"archive bytes").await.unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("report_902_"));
        assert!(name.ends_with(".zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"archive bytes");
    }

    #[tokio::test]
    async fn test_clear_stale_backups_empties_directory() {
        let dir = TempDir::new().unwrap();
        let workdir = Workdir::new(dir.path());

        workdir.save_backup(902, b"one").await.unwrap();
        workdir.save_backup(903, b"two").await.unwrap();
        workdir.clear_stale_backups().await;

        let remaining: Vec<_> = std::fs::read_dir(workdir.backups_dir())
            .unwrap()
            .collect();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_clear_stale_backups_without_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        let workdir = Workdir::new(dir.path());
        workdir.clear_stale_backups().await;
        assert!(!workdir.backups_dir().exists());
    }

    #[tokio::test]
    async fn test_purge_removes_only_session_backups() {
        let dir = TempDir::new().unwrap();
        let workdir = Workdir::new(dir.path());

        let session = workdir.save_backup(902, b"session").await.unwrap();
        let other = workdir.backups_dir().join("report_999_manual.zip");
        std::fs::write(&other, b"keep me").unwrap();

        workdir.purge_backups(std::slice::from_ref(&session)).await;
        assert!(!session.exists());
        assert!(other.exists());
    }
}
