//! Run orchestration
//!
//! Sequences one integration run: fetch every configured template, back up
//! and extract each archive, deduplicate the working file set, optionally
//! rewrite area ids, deliver, and report. A single template's failure is
//! tolerated; ending the run with nothing to deliver, or a delivery that
//! does not complete, is not. The temp extraction area is removed on every
//! exit path, success or failure.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info, warn};

use crate::config::{Config, Secrets};
use crate::constants::files;
use crate::errors::{AppError, DeliveryError, Result};
use crate::notify::Notifier;

use super::client::ReportClient;
use super::delivery;
use super::extract::Extractor;
use super::transform::Transformer;
use super::workdir::Workdir;

/// Chronological run log carried into the summary email
///
/// Every entry is also dispatched to tracing, so the log file and the
/// emailed report tell the same story.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        info!("{}", message.as_ref());
        self.push(message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        warn!("{}", message.as_ref());
        self.push(message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        error!("{}", message.as_ref());
        self.push(message.as_ref());
    }

    pub fn lines(&self) -> &[String] {
        &self.entries
    }

    pub fn into_lines(self) -> Vec<String> {
        self.entries
    }

    fn push(&mut self, message: &str) {
        self.entries
            .push(format!("[{}] {}", Local::now().format("%H:%M:%S"), message));
    }
}

/// Execute one integration run for one tenant
///
/// Always sends exactly one summary email and always removes the temp
/// extraction area before returning. The returned result mirrors the run
/// outcome so the process can exit non-zero on failure.
pub async fn run_integration(config: &Config, secrets: &Secrets) -> Result<()> {
    let mut log = RunLog::new();
    let working_root = config.working_dir();
    let mut extractor = Extractor::new(&working_root);

    let outcome = execute(config, secrets, &mut extractor, &mut log).await;

    // Cleanup phase: temp documents never survive a run, whatever happened.
    extractor.cleanup();

    let (subject, status) = match &outcome {
        Ok(()) => {
            let status = format!("All steps for {} completed successfully", config.company_name);
            log.info(&status);
            (
                format!("{} - integration run succeeded", config.company_name),
                status,
            )
        }
        Err(e) => {
            let status = format!(
                "Run for {} failed ({}): {}",
                config.company_name,
                e.category(),
                e
            );
            log.error(&status);
            (
                format!("{} - integration run FAILED", config.company_name),
                status,
            )
        }
    };

    let notifier = Notifier::new(&config.mail, &secrets.mail_password);
    let lines = log.into_lines();
    let notify_task = tokio::task::spawn_blocking(move || {
        notifier.send_report(&subject, &status, &lines)
    });
    match notify_task.await {
        Ok(delivered) => info!("Run report delivered to {} recipient(s)", delivered),
        Err(e) => error!("Notification task failed: {}", e),
    }

    outcome
}

async fn execute(
    config: &Config,
    secrets: &Secrets,
    extractor: &mut Extractor,
    log: &mut RunLog,
) -> Result<()> {
    log.info(format!("Integration run started: {}", config.company_name));

    let client = ReportClient::new(&config.commerce, &secrets.client_secret)?;
    let workdir = Workdir::new(&config.working_dir());
    workdir.clear_stale_backups().await;

    log.info(format!(
        "Templates to process: {:?}",
        config.commerce.template_ids
    ));

    let mut documents: Vec<PathBuf> = Vec::new();
    let mut seen_names: HashSet<OsString> = HashSet::new();
    let mut session_backups: Vec<PathBuf> = Vec::new();

    for &template_id in &config.commerce.template_ids {
        log.info(format!("Downloading report template {}", template_id));

        let bytes = match client.download_report(template_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log.error(format!("Template {} failed: {}", template_id, e));
                continue;
            }
        };

        match workdir.save_backup(template_id, &bytes).await {
            Ok(path) => session_backups.push(path),
            Err(e) => log.warn(format!("Backup for template {} failed: {}", template_id, e)),
        }

        match extractor.extract(&bytes) {
            Ok(paths) if paths.is_empty() => {
                log.warn(format!("Template {}: archive contains no documents", template_id));
            }
            Ok(paths) => {
                let added = merge_documents(&mut documents, &mut seen_names, paths);
                log.info(format!("Template {}: {} new document(s)", template_id, added));
            }
            Err(e) => {
                log.error(format!("Template {}: extraction failed: {}", template_id, e));
            }
        }
    }

    if documents.is_empty() {
        return Err(AppError::generic("No documents produced by any template"));
    }
    log.info(format!("Documents to deliver: {}", documents.len()));

    if config.transform.enabled {
        apply_transform(config, &documents, log);
    }

    log.info(format!("Delivering via {}", config.transfer.protocol));
    let uploader = delivery::build_uploader(&config.transfer, &secrets.transfer_password);
    let batch = documents.clone();
    let uploaded = tokio::task::spawn_blocking(move || uploader.upload(&batch))
        .await
        .map_err(|e| AppError::generic(format!("Upload task failed: {}", e)))?;

    if !uploaded {
        return Err(AppError::Delivery(DeliveryError::Transport(format!(
            "upload via {} did not complete",
            config.transfer.protocol
        ))));
    }

    log.info("Delivery complete; purging session backups");
    workdir.purge_backups(&session_backups).await;
    Ok(())
}

/// Append extracted paths whose file name has not been seen this run
///
/// Identically-named members from two templates count once: the later
/// extraction already overwrote the file in place, so the first path entry
/// keeps pointing at the freshest content.
fn merge_documents(
    documents: &mut Vec<PathBuf>,
    seen_names: &mut HashSet<OsString>,
    extracted: Vec<PathBuf>,
) -> usize {
    let mut added = 0usize;
    for path in extracted {
        let Some(name) = path.file_name().map(OsString::from) else {
            continue;
        };
        if seen_names.insert(name) {
            documents.push(path);
            added += 1;
        }
    }
    added
}

fn apply_transform(config: &Config, documents: &[PathBuf], log: &mut RunLog) {
    log.info("Applying area-id transform");

    let transformer = match Transformer::load(&config.transform.mapping_file) {
        Ok(transformer) => transformer,
        Err(e) => {
            log.warn(format!("Area mapping unavailable, transform skipped: {}", e));
            return;
        }
    };

    for path in documents {
        let is_outlets = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case(files::OUTLETS_FILE_NAME))
            .unwrap_or(false);
        if !is_outlets {
            continue;
        }

        match transformer.process_outlets(path) {
            Ok(true) => log.info(format!("Area ids updated: {}", path.display())),
            Ok(false) => log.info(format!("No area ids to update: {}", path.display())),
            Err(e) => log.warn(format!("Transform failed for {}: {}", path.display(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_documents_dedups_by_file_name() {
        let mut documents = Vec::new();
        let mut seen = HashSet::new();

        let first = vec![
            PathBuf::from("/work/temp/outlets.xml"),
            PathBuf::from("/work/temp/sales.xml"),
        ];
        assert_eq!(merge_documents(&mut documents, &mut seen, first), 2);

        // Second template yields one duplicate name and one new file
        let second = vec![
            PathBuf::from("/work/temp/outlets.xml"),
            PathBuf::from("/work/temp/stock.xml"),
        ];
        assert_eq!(merge_documents(&mut documents, &mut seen, second), 1);

        let names: Vec<_> = documents
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["outlets.xml", "sales.xml", "stock.xml"]);
    }

    #[test]
    fn test_merge_documents_preserves_discovery_order() {
        let mut documents = Vec::new();
        let mut seen = HashSet::new();

        let extracted = vec![
            PathBuf::from("/t/b.xml"),
            PathBuf::from("/t/a.xml"),
            PathBuf::from("/t/c.xml"),
        ];
        merge_documents(&mut documents, &mut seen, extracted);

        let names: Vec<_> = documents
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b.xml", "a.xml", "c.xml"]);
    }

    #[test]
    fn test_run_log_lines_are_timestamped_in_order() {
        let mut log = RunLog::new();
        log.info("first");
        log.warn("second");
        log.error("third");

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
        assert!(lines[2].ends_with("third"));
        assert!(lines[0].starts_with('['));
    }
}
