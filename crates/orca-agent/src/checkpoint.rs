//! Durable watermark storage.
//!
//! The checkpoint is a single text file holding an ISO-8601 timestamp. Writes
//! overwrite the whole file; there is no journaling, so a crash mid-write may
//! leave a file that fails to load.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::parse_timestamp;
use crate::error::{OrcaError, Result};

/// File-backed watermark store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by `path`. The file need not exist.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted watermark; `None` if the file does not exist.
    pub fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrcaError::CheckpointIo {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let watermark =
            parse_timestamp(&content).map_err(|e| OrcaError::CheckpointFormat {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %self.path.display(), %watermark, "Loaded checkpoint");
        Ok(Some(watermark))
    }

    /// Overwrite the checkpoint with `watermark`.
    pub fn save(&self, watermark: DateTime<Utc>) -> Result<()> {
        let io_error = |e: std::io::Error| OrcaError::CheckpointIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
        }
        let content = watermark.to_rfc3339_opts(SecondsFormat::Micros, true);
        std::fs::write(&self.path, content).map_err(io_error)?;
        debug!(path = %self.path.display(), %watermark, "Saved checkpoint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("last_check_time.txt"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("last_check_time.txt"));
        let watermark = Utc::now();

        store.save(watermark).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.timestamp(), watermark.timestamp());
        assert_eq!(
            loaded.timestamp_subsec_micros(),
            watermark.timestamp_subsec_micros()
        );
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("state").join("check.txt"));
        let first = Utc.with_ymd_and_hms(2025, 7, 26, 23, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 7, 27, 1, 30, 0).unwrap();

        store.save(first).unwrap();
        store.save(second).unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "2025-07-27T01:30:00.000000Z");
        assert_eq!(store.load().unwrap(), Some(second));
    }

    #[test]
    fn test_load_naive_isoformat() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("check.txt");
        std::fs::write(&path, "2025-07-26T23:04:30.373719\n").unwrap();

        let loaded = CheckpointStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.timestamp_subsec_micros(), 373_719);
    }

    #[test]
    fn test_load_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("check.txt");
        std::fs::write(&path, "not a timestamp").unwrap();

        let err = CheckpointStore::new(&path).load().unwrap_err();
        assert!(matches!(err, OrcaError::CheckpointFormat { .. }));
    }
}
