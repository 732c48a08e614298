//! JSONL step trace: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all`, so a
//! reader tailing the file never sees a partial line.
//!
//! Degradation chain:
//! 1. Configured file path
//! 2. stderr with `[ISV-TRACE]` prefix
//! 3. Silent discard (tracing must never take the engine down)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{IsvError, Result};
use crate::engine::array_state::ArraySnapshot;

/// Trace event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    Step,
    Completed,
    Reset,
    Error,
}

/// A single JSONL line. Everything except `ts` and `event` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Sub-step label (`iteration`, `key`, `shift`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorted_boundary: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Empty entry stamped with the current UTC time.
    pub fn new(event: EventType) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            seq: None,
            step: None,
            working: None,
            key_index: None,
            current_index: None,
            comparison_index: None,
            sorted_boundary: None,
            details: None,
        }
    }

    /// Copy the array and highlight fields from `snapshot`.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: ArraySnapshot) -> Self {
        self.key_index = snapshot.key_index;
        self.current_index = snapshot.current_index;
        self.comparison_index = snapshot.comparison_index;
        self.sorted_boundary = Some(snapshot.sorted_boundary);
        self.working = Some(snapshot.working);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    File,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
pub struct JsonlWriter {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open `path` for appending, degrading to stderr on failure.
    pub fn open(path: &Path) -> Self {
        let mut w = Self {
            path: Some(path.to_path_buf()),
            writer: None,
            state: WriterState::Stderr,
            lines_written: 0,
        };
        match open_append(path) {
            Ok(file) => {
                w.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                w.state = WriterState::File;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ISV-TRACE] {e}; tracing to stderr");
            }
        }
        w
    }

    /// Writer that prints every line to stderr.
    pub fn stderr() -> Self {
        Self {
            path: None,
            writer: None,
            state: WriterState::Stderr,
            lines_written: 0,
        }
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ISV-TRACE] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Flush and sync the file to disk.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::File => "file",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::File => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[ISV-TRACE] {line}").is_ok() {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::File => {
                let _ = writeln!(io::stderr(), "[ISV-TRACE] trace write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

// ──────────────────────── helpers ────────────────────────

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IsvError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| IsvError::io(path, source))
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────
