// Plain-text key log owned by a listener

use chrono::Local;
use keyclack_core::{KeyclackError, Result};
use parking_lot::Mutex;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Appends `<timestamp> - <message>` lines to a file
pub struct KeyLog {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl KeyLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                KeyclackError::IoError(format!("Failed to open key log {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one line; failures are logged and otherwise ignored
    pub fn record(&self, message: impl Display) {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        if let Err(e) = writeln!(self.writer.lock(), "{} - {}", timestamp, message) {
            log::warn!("Failed to write key log {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assert_timestamp(ts: &str) {
        let bytes = ts.as_bytes();
        assert_eq!(ts.len(), 23, "unexpected timestamp {:?}", ts);
        assert_eq!(bytes[4], b'-');
        assert_eq!(bytes[7], b'-');
        assert_eq!(bytes[10], b' ');
        assert_eq!(bytes[13], b':');
        assert_eq!(bytes[16], b':');
        assert_eq!(bytes[19], b',');
    }

    #[test]
    fn test_record_writes_timestamped_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.txt");

        let log = KeyLog::open(&path).unwrap();
        log.record("Key pressed: a");
        log.record(format_args!("Key pressed: {}", "Space"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let (ts, message) = lines[0].split_once(" - ").unwrap();
        assert_timestamp(ts);
        assert_eq!(message, "Key pressed: a");
        assert!(lines[1].ends_with(" - Key pressed: Space"));
    }

    #[test]
    fn test_open_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "earlier line\n").unwrap();

        KeyLog::open(&path).unwrap().record("Key pressed: b");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier line\n"));
        assert!(contents.trim_end().ends_with("Key pressed: b"));
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = KeyLog::open(dir.path().join("no/such/dir/keys.txt"));
        assert!(matches!(result, Err(KeyclackError::IoError(_))));
    }
}
