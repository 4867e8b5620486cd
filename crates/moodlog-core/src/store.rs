//! Append-only emotion event log backed by a two-column CSV file.
//!
//! The file always starts with the header row `timestamp,emotion`; every
//! following row is `YYYY-MM-DD HH:MM:SS,<label>`. The file is the only
//! persisted state and is read by spreadsheet tools as-is, so the layout
//! must not change.

use crate::types::{EmotionEvent, TIMESTAMP_FORMAT};
use chrono::{Local, NaiveDateTime, Timelike};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header row written on initialization and reset.
pub const HEADER: [&str; 2] = ["timestamp", "emotion"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("event log not initialized: {0}")]
    Uninitialized(PathBuf),
    #[error("failed to write event log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read event log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Logical state of the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// No file, or a zero-byte file.
    Uninitialized,
    /// Header present, zero or more events.
    Ready,
}

/// Handle to one event log file.
///
/// Holds only the path; every operation opens the file, does its work and
/// closes it again. Assumes a single writer process.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StoreState {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() > 0 => StoreState::Ready,
            _ => StoreState::Uninitialized,
        }
    }

    /// Create the file with its header if it is absent or empty.
    ///
    /// An already initialized log is left byte-for-byte untouched.
    pub fn initialize(&self) -> Result<(), StoreError> {
        if self.state() == StoreState::Ready {
            tracing::debug!(path = %self.path.display(), "event log already initialized");
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }
        self.write_header()?;
        tracing::info!(path = %self.path.display(), "event log initialized");
        Ok(())
    }

    /// Append one event stamped with the current local time.
    pub fn append(&self, emotion: &str) -> Result<(), StoreError> {
        let now = Local::now().naive_local();
        self.append_at(now.with_nanosecond(0).unwrap_or(now), emotion)
    }

    /// Append one event with an explicit timestamp (sub-second part dropped).
    pub fn append_at(&self, timestamp: NaiveDateTime, emotion: &str) -> Result<(), StoreError> {
        if self.state() != StoreState::Ready {
            return Err(StoreError::Uninitialized(self.path.clone()));
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_err(e))?;

        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        self.write_row(file, [stamp.as_str(), emotion])?;

        tracing::trace!(timestamp = %stamp, emotion, "event appended");
        Ok(())
    }

    /// Discard every event, leaving only the header row.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.write_header()?;
        tracing::info!(path = %self.path.display(), "event log reset");
        Ok(())
    }

    /// Read every event in append order.
    ///
    /// An absent or empty log reads as no events. Rows without exactly two
    /// fields, or with an unparseable timestamp (e.g. a torn final row after
    /// a crash), are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<EmotionEvent>, StoreError> {
        let bytes = self.raw_bytes()?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());

        match rdr.headers() {
            Ok(h) if h.iter().eq(HEADER) => {}
            Ok(h) => tracing::warn!(header = ?h, "unexpected event log header"),
            Err(e) => tracing::warn!(error = %e, "unreadable event log header"),
        }

        let mut events = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(row, error = %e, "skipping unreadable row");
                    continue;
                }
            };
            if record.len() != 2 {
                tracing::warn!(row, fields = record.len(), "skipping malformed row");
                continue;
            }
            match NaiveDateTime::parse_from_str(&record[0], TIMESTAMP_FORMAT) {
                Ok(timestamp) => events.push(EmotionEvent {
                    timestamp,
                    emotion: record[1].to_string(),
                }),
                Err(e) => {
                    tracing::warn!(
                        row,
                        value = &record[0],
                        error = %e,
                        "skipping row with bad timestamp"
                    );
                }
            }
        }

        tracing::debug!(count = events.len(), "event log read");
        Ok(events)
    }

    /// The file contents, unmodified. Empty for an absent log.
    pub fn raw_bytes(&self) -> Result<Vec<u8>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Truncate (or create) the file and write the header row.
    fn write_header(&self) -> Result<(), StoreError> {
        let file = File::create(&self.path).map_err(|e| self.write_err(e))?;
        self.write_row(file, HEADER)
    }

    fn write_row(&self, file: File, row: [&str; 2]) -> Result<(), StoreError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        wtr.write_record(row)
            .map_err(io::Error::from)
            .and_then(|()| wtr.flush())
            .map_err(|e| self.write_err(e))
    }

    fn write_err(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn temp_log() -> (TempDir, EventLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("emotion_data.csv"));
        (dir, log)
    }

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn contents(log: &EventLog) -> String {
        fs::read_to_string(log.path()).unwrap()
    }

    #[test]
    fn test_initialize_creates_header_only() {
        let (_dir, log) = temp_log();
        assert_eq!(log.state(), StoreState::Uninitialized);

        log.initialize().unwrap();
        assert_eq!(contents(&log), "timestamp,emotion\n");
        assert_eq!(log.state(), StoreState::Ready);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_dir, log) = temp_log();
        log.initialize().unwrap();
        log.append_at(ts(9, 0, 0), "happy").unwrap();
        let before = fs::read(log.path()).unwrap();

        log.initialize().unwrap();
        assert_eq!(fs::read(log.path()).unwrap(), before);
    }

    #[test]
    fn test_initialize_fills_zero_byte_file() {
        let (_dir, log) = temp_log();
        File::create(log.path()).unwrap();
        assert_eq!(log.state(), StoreState::Uninitialized);

        log.initialize().unwrap();
        assert_eq!(contents(&log), "timestamp,emotion\n");
    }

    #[test]
    fn test_initialize_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("nested/deeper/log.csv"));
        log.initialize().unwrap();
        assert_eq!(contents(&log), "timestamp,emotion\n");
    }

    #[test]
    fn test_append_requires_initialized_log() {
        let (_dir, log) = temp_log();
        let err = log.append("happy").unwrap_err();
        assert!(matches!(err, StoreError::Uninitialized(_)));
        assert!(!log.path().exists());
    }

    #[test]
    fn test_append_preserves_order() {
        let (_dir, log) = temp_log();
        let start = Local::now().naive_local().with_nanosecond(0).unwrap();
        log.initialize().unwrap();

        let labels = ["happy", "sad", "neutral", "happy", "angry"];
        for label in labels {
            log.append(label).unwrap();
        }

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), labels.len());
        for (event, label) in events.iter().zip(labels) {
            assert_eq!(event.emotion, label);
            assert!(event.timestamp >= start);
        }
    }

    #[test]
    fn test_append_writes_expected_row() {
        let (_dir, log) = temp_log();
        log.initialize().unwrap();
        log.append_at(ts(14, 3, 7), "surprise").unwrap();
        assert_eq!(
            contents(&log),
            "timestamp,emotion\n2024-05-01 14:03:07,surprise\n"
        );
    }

    #[test]
    fn test_labels_round_trip_exactly() {
        let (_dir, log) = temp_log();
        log.initialize().unwrap();

        let labels = ["pleasantly surprised", "a,b", "say \"hi\"", "ünïcödé"];
        for label in labels {
            log.append_at(ts(10, 0, 0), label).unwrap();
        }

        let read: Vec<String> = log
            .read_all()
            .unwrap()
            .into_iter()
            .map(|e| e.emotion)
            .collect();
        assert_eq!(read, labels);
        assert!(contents(&log).contains("2024-05-01 10:00:00,pleasantly surprised\n"));
    }

    #[test]
    fn test_reset_leaves_header_only() {
        let (_dir, log) = temp_log();
        log.initialize().unwrap();
        log.append_at(ts(8, 0, 0), "happy").unwrap();
        log.append_at(ts(8, 0, 1), "sad").unwrap();

        log.reset().unwrap();
        assert_eq!(contents(&log), "timestamp,emotion\n");
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_all_absent_and_empty() {
        let (_dir, log) = temp_log();
        assert!(log.read_all().unwrap().is_empty());
        assert!(log.raw_bytes().unwrap().is_empty());

        File::create(log.path()).unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_all_skips_torn_rows() {
        let (_dir, log) = temp_log();
        fs::write(
            log.path(),
            "timestamp,emotion\n2024-05-01 08:00:00,happy\n2024-05-01 08:0\nnot a time,sad\n2024-05-01 08:00:02,sad\n",
        )
        .unwrap();

        let events = log.read_all().unwrap();
        let labels: Vec<&str> = events.iter().map(|e| e.emotion.as_str()).collect();
        assert_eq!(labels, ["happy", "sad"]);
        assert_eq!(events[1].timestamp, ts(8, 0, 2));
    }

    #[test]
    fn test_scenario_append_reset() {
        let (_dir, log) = temp_log();
        log.initialize().unwrap();
        assert_eq!(contents(&log).lines().collect::<Vec<_>>(), ["timestamp,emotion"]);

        log.append("happy").unwrap();
        let text = contents(&log);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(",happy"));
        assert!(NaiveDateTime::parse_from_str(&lines[1][..19], TIMESTAMP_FORMAT).is_ok());

        log.append("sad").unwrap();
        assert_eq!(contents(&log).lines().count(), 3);

        let counts = crate::stats::EmotionCounts::from_events(&log.read_all().unwrap());
        assert_eq!(counts.get("happy"), 1);
        assert_eq!(counts.get("sad"), 1);

        log.reset().unwrap();
        assert_eq!(contents(&log), "timestamp,emotion\n");
        assert!(log.read_all().unwrap().is_empty());
    }
}
