//! Archive extraction into the working area
//!
//! Materializes report archive members into a per-run temp directory and
//! enumerates the documents relevant to delivery. Also hosts the archive
//! integrity check the fetch client applies before accepting a payload.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::constants::files;
use crate::errors::{FileError, FileResult};

/// Integrity check for a candidate archive payload
///
/// Opens the container and reads every member to the end, so both structural
/// damage and per-member CRC corruption are caught before the payload is
/// accepted.
///
/// # Errors
///
/// Returns `FileError::InvalidArchive` when the bytes are not a readable
/// container or any member fails to decompress cleanly.
pub fn validate_archive(bytes: &[u8]) -> FileResult<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        let name = member.name().to_string();
        std::io::copy(&mut member, &mut std::io::sink()).map_err(|e| {
            FileError::InvalidArchive {
                reason: format!("member {name} is corrupt: {e}"),
            }
        })?;
    }

    Ok(())
}

/// Extracts report archives into a fresh working area
///
/// The first `extract` call of an instance clears whatever a previous run
/// left behind and creates the area anew; later calls in the same run
/// accumulate into it, overwriting same-named members in place. Members
/// persist on disk until `cleanup` regardless of how the run ends, so a
/// failed run leaves its files for forensics.
#[derive(Debug)]
pub struct Extractor {
    temp_dir: PathBuf,
    cleared: bool,
}

impl Extractor {
    /// Create an extractor rooted under the given working directory
    pub fn new(working_root: &Path) -> Self {
        Self {
            temp_dir: working_root.join(files::TEMP_DIR_NAME),
            cleared: false,
        }
    }

    /// Path of the working area this extractor manages
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Extract an archive and return the target-document paths
    ///
    /// Clears any working area left by a previous run, materializes every
    /// member, and returns the paths of members whose name ends in the
    /// target document extension (case-insensitive), in archive enumeration
    /// order. A valid archive with no matching members yields an empty list;
    /// callers decide whether that is fatal.
    ///
    /// # Errors
    ///
    /// Returns `FileError::InvalidArchive` for an unreadable container and
    /// `FileError::MemberExtraction` when a member cannot be written out.
    pub fn extract(&mut self, bytes: &[u8]) -> FileResult<Vec<PathBuf>> {
        if !self.cleared {
            self.cleanup();
            self.cleared = true;
        }
        std::fs::create_dir_all(&self.temp_dir)?;

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut documents = Vec::new();

        for index in 0..archive.len() {
            let mut member = archive.by_index(index)?;

            let relative = match member.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!("Skipping archive member with unsafe path: {}", member.name());
                    continue;
                }
            };
            let dest = self.temp_dir.join(&relative);

            if member.is_dir() {
                std::fs::create_dir_all(&dest)?;
                continue;
            }

            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut out = std::fs::File::create(&dest).map_err(|e| {
                FileError::MemberExtraction {
                    name: member.name().to_string(),
                    source: e,
                }
            })?;
            std::io::copy(&mut member, &mut out).map_err(|e| FileError::MemberExtraction {
                name: member.name().to_string(),
                source: e,
            })?;

            if has_target_extension(&relative) {
                documents.push(dest);
            }
        }

        info!(
            "Extracted archive into {}: {} target document(s)",
            self.temp_dir.display(),
            documents.len()
        );
        Ok(documents)
    }

    /// Remove the working area and everything in it
    ///
    /// Removal failure is logged, not raised: a stale temp directory must
    /// never break the next run, which recreates it from scratch anyway.
    pub fn cleanup(&self) {
        if self.temp_dir.exists() {
            match std::fs::remove_dir_all(&self.temp_dir) {
                Ok(()) => debug!("Removed working area {}", self.temp_dir.display()),
                Err(e) => warn!(
                    "Failed to remove working area {}: {}",
                    self.temp_dir.display(),
                    e
                ),
            }
        }
    }
}

fn has_target_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(files::TARGET_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Build an in-memory ZIP archive from (name, content) pairs
    fn build_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_validate_accepts_well_formed_archive() {
        let bytes = build_archive(&[("sales.xml", b"<SALES/>"), ("readme.txt", b"hello")]);
        assert!(validate_archive(&bytes).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_archive() {
        let result = validate_archive(b"<html>Service temporarily unavailable</html>");
        assert!(matches!(result, Err(FileError::InvalidArchive { .. })));
    }

    #[test]
    fn test_validate_rejects_truncated_archive() {
        let bytes = build_archive(&[("sales.xml", &[0x55u8; 4096])]);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(validate_archive(truncated).is_err());
    }

    #[test]
    fn test_extract_filters_and_preserves_order() {
        let dir = TempDir::new().unwrap();
        let mut extractor = Extractor::new(dir.path());

        let bytes = build_archive(&[
            ("outlets.xml", b"<OUTLETS/>"),
            ("sales.XML", b"<SALES/>"),
            ("readme.txt", b"notes"),
        ]);
        let paths = extractor.extract(&bytes).unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["outlets.xml", "sales.XML"]);
        for path in &paths {
            assert!(path.exists());
        }
        // Non-target members are still materialized
        assert!(extractor.temp_dir().join("readme.txt").exists());
    }

    #[test]
    fn test_extract_empty_match_is_ok() {
        let dir = TempDir::new().unwrap();
        let mut extractor = Extractor::new(dir.path());

        let bytes = build_archive(&[("readme.txt", b"no documents here")]);
        let paths = extractor.extract(&bytes).unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_extract_rejects_corrupt_bytes() {
        let dir = TempDir::new().unwrap();
        let mut extractor = Extractor::new(dir.path());
        assert!(extractor.extract(b"definitely not a zip").is_err());
    }

    #[test]
    fn test_new_run_clears_stale_working_area() {
        let dir = TempDir::new().unwrap();

        let mut previous_run = Extractor::new(dir.path());
        let stale = build_archive(&[("old.xml", b"<OLD/>")]);
        previous_run.extract(&stale).unwrap();
        assert!(previous_run.temp_dir().join("old.xml").exists());

        let mut extractor = Extractor::new(dir.path());
        let fresh = build_archive(&[("new.xml", b"<NEW/>")]);
        extractor.extract(&fresh).unwrap();
        assert!(!extractor.temp_dir().join("old.xml").exists());
        assert!(extractor.temp_dir().join("new.xml").exists());
    }

    #[test]
    fn test_same_run_extracts_accumulate() {
        let dir = TempDir::new().unwrap();
        let mut extractor = Extractor::new(dir.path());

        let first = build_archive(&[("outlets.xml", b"<OUTLETS/>")]);
        extractor.extract(&first).unwrap();

        let second = build_archive(&[("sales.xml", b"<SALES/>")]);
        extractor.extract(&second).unwrap();

        assert!(extractor.temp_dir().join("outlets.xml").exists());
        assert!(extractor.temp_dir().join("sales.xml").exists());
    }

    #[test]
    fn test_cleanup_removes_working_area() {
        let dir = TempDir::new().unwrap();
        let mut extractor = Extractor::new(dir.path());

        let bytes = build_archive(&[("sales.xml", b"<SALES/>")]);
        extractor.extract(&bytes).unwrap();
        assert!(extractor.temp_dir().exists());

        extractor.cleanup();
        assert!(!extractor.temp_dir().exists());
    }
}
