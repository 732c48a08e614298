//! Step trace coordinator.
//!
//! A dedicated `isv-trace` thread owns the [`JsonlWriter`]. The sort thread
//! hands it [`TraceEvent`]s over a bounded crossbeam channel with
//! `try_send()`, so a slow disk never stretches an animation step.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{IsvError, Result};
use crate::engine::array_state::{ArraySnapshot, ArrayState};
use crate::engine::sort_engine::StepEvent;
use crate::engine::stepper::StepKind;
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry};

// ──────────────────── channel capacity ────────────────────

/// Default bounded channel capacity for trace events.
pub const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

#[derive(Debug, Clone)]
pub enum TraceEvent {
    SessionStarted {
        config_hash: String,
        num_values: usize,
        speed: u8,
    },
    Step {
        seq: u64,
        kind: StepKind,
        snapshot: ArraySnapshot,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cheaply-cloneable, non-blocking handle to the trace thread.
#[derive(Debug, Clone)]
pub struct StepTraceHandle {
    tx: Sender<TraceEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl StepTraceHandle {
    /// Queue an event. A full channel drops it and bumps the drop counter.
    pub fn send(&self, event: TraceEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Convenience for step observers.
    pub fn record_step(&self, event: &StepEvent, state: &ArrayState) {
        self.send(TraceEvent::Step {
            seq: event.seq,
            kind: event.kind,
            snapshot: state.snapshot(),
        });
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the trace thread to flush and stop. Join its handle afterwards.
    pub fn shutdown(&self) {
        let _ = self.tx.send(TraceEvent::Shutdown);
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the trace thread writing to `path`, or to stderr when `None`.
pub fn spawn_trace_logger(
    path: Option<&Path>,
    capacity: usize,
) -> Result<(StepTraceHandle, thread::JoinHandle<()>)> {
    let writer = path.map_or_else(JsonlWriter::stderr, JsonlWriter::open);
    spawn_with_writer(writer, capacity)
}

fn spawn_with_writer(
    writer: JsonlWriter,
    capacity: usize,
) -> Result<(StepTraceHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<TraceEvent>(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = StepTraceHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("isv-trace".to_string())
        .spawn(move || trace_thread_main(&rx, writer, &dropped_clone))
        .map_err(|e| IsvError::Runtime {
            details: format!("failed to spawn trace thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── trace thread ────────────────────

fn trace_thread_main(rx: &Receiver<TraceEvent>, mut jsonl: JsonlWriter, dropped: &AtomicU64) {
    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error);
            warn.details = Some(format!("{d} trace events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, TraceEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(event));
    }

    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

/// JSONL representation of a trace event.
pub fn event_to_log_entry(event: TraceEvent) -> LogEntry {
    match event {
        TraceEvent::SessionStarted {
            config_hash,
            num_values,
            speed,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart);
            e.details = Some(format!(
                "config_hash={config_hash} num_values={num_values} speed={speed}"
            ));
            e
        }
        TraceEvent::Step {
            seq,
            kind,
            snapshot,
        } => {
            let event = match kind {
                StepKind::Completed => EventType::Completed,
                StepKind::Reset => EventType::Reset,
                _ => EventType::Step,
            };
            let mut e = LogEntry::new(event).with_snapshot(snapshot);
            e.seq = Some(seq);
            e.step = Some(kind.label().to_string());
            e
        }
        TraceEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error);
            e.details = Some(format!("{code}: {message}"));
            e
        }
        TraceEvent::Shutdown => {
            // Handled by the thread loop.
            let mut e = LogEntry::new(EventType::Error);
            e.details = Some("shutdown sentinel".to_string());
            e
        }
    }
}
