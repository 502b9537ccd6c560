//! Activity logging: JSONL events for captures, archive I/O and set operations.
//!
//! [`ActivityLog`] is cheap to clone and can be handed to walker callbacks on
//! other threads; every clone appends to the same writer.

pub mod jsonl;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::config::LoggingConfig;
use crate::core::errors::SlistError;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::scanner::walker::{SkipReason, SkippedEntry, WalkSummary};

/// Shared handle on the JSONL activity log. A disabled log drops every event.
#[derive(Clone, Default)]
pub struct ActivityLog {
    writer: Option<Arc<Mutex<JsonlWriter>>>,
}

impl ActivityLog {
    /// Log that records nothing.
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    /// Open the log described by `config`, or a disabled log when turned off.
    pub fn from_config(config: &LoggingConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::open(JsonlConfig::from(config))
    }

    pub fn open(config: JsonlConfig) -> Self {
        Self {
            writer: Some(Arc::new(Mutex::new(JsonlWriter::open(config)))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Append one entry.
    pub fn log(&self, entry: &LogEntry) {
        if let Some(writer) = &self.writer {
            writer.lock().write_entry(entry);
        }
    }

    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.lock().flush();
        }
    }

    pub fn capture(&self, summary: &WalkSummary, duration: Duration) {
        let severity = if summary.skipped.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        };
        let mut entry = LogEntry::new(EventType::SnapshotCapture, severity)
            .with_path(&summary.root)
            .with_records(summary.recorded())
            .with_duration_ms(millis(duration));
        entry.skipped = Some(summary.skipped.len());
        self.log(&entry);
    }

    pub fn skipped(&self, skipped: &SkippedEntry) {
        let mut entry =
            LogEntry::new(EventType::EntrySkipped, Severity::Warning).with_path(&skipped.path);
        entry.reason = Some(skipped.reason.label().to_string());
        if let SkipReason::Unreadable(details) | SkipReason::Unencodable(details) = &skipped.reason {
            entry.details = Some(details.clone());
        }
        self.log(&entry);
    }

    pub fn load(&self, path: &Path, records: usize, duration: Duration) {
        self.log(
            &LogEntry::new(EventType::SnapshotLoad, Severity::Info)
                .with_path(path)
                .with_records(records)
                .with_duration_ms(millis(duration)),
        );
    }

    pub fn save(&self, path: &Path, records: usize, duration: Duration) {
        self.log(
            &LogEntry::new(EventType::SnapshotSave, Severity::Info)
                .with_path(path)
                .with_records(records)
                .with_duration_ms(millis(duration)),
        );
    }

    pub fn set_operation(&self, operation: &str, inputs: usize, records: usize) {
        let mut entry =
            LogEntry::new(EventType::SetOperation, Severity::Info).with_records(records);
        entry.operation = Some(operation.to_string());
        entry.inputs = Some(inputs);
        self.log(&entry);
    }

    pub fn error(&self, error: &SlistError, context: &str) {
        self.log(&LogEntry::from_error(error, context));
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
