//! Headless step printer: runs one sort and prints every observable sub-step
//! with the per-bar classification letters.

#![allow(missing_docs)]

use std::io::Write;
use std::time::Duration;

use crossbeam_channel::unbounded;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::cli::palette::painted_letter;
use crate::core::errors::{IsvError, Result};
use crate::engine::array_state::{ArraySnapshot, ArrayState};
use crate::engine::classifier::{Highlights, Spacing, classify_all};
use crate::engine::control::RunState;
use crate::engine::sort_engine::{SortEngine, StepEvent};
use crate::engine::speed::SpeedModel;
use crate::engine::stepper::StepKind;
use crate::logger::trace::StepTraceHandle;

/// Where the values come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Explicit(Vec<u32>),
    Random {
        size: usize,
        range: u32,
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub source: Source,
    pub speed: u8,
    pub max_delay: Duration,
    pub json: bool,
}

/// What the run ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    pub steps: u64,
    pub shifts: u64,
    pub final_state: RunState,
    pub sorted: Vec<u32>,
}

#[derive(Serialize)]
struct StepLine<'a> {
    seq: u64,
    #[serde(flatten)]
    step: StepKind,
    run_state: RunState,
    working: &'a [u32],
    classes: String,
}

/// Classification letters of every bar, left to right.
#[must_use]
pub fn class_letters(snapshot: &ArraySnapshot) -> String {
    classify_all(
        snapshot.working.len(),
        &Highlights::from(snapshot),
        Spacing::default(),
    )
    .iter()
    .map(|c| c.state.letter())
    .collect()
}

fn build_array(source: &Source) -> Result<ArrayState> {
    match source {
        Source::Explicit(values) => {
            if values.contains(&0) {
                return Err(IsvError::invalid("values must be >= 1"));
            }
            ArrayState::from_values(values.clone())
        }
        Source::Random { size, range, seed } => match seed {
            Some(seed) => {
                ArrayState::initialize_with(*size, *range, &mut StdRng::seed_from_u64(*seed))
            }
            None => ArrayState::initialize(*size, *range),
        },
    }
}

/// Run one sort to completion, writing a line per sub-step to `out`.
pub fn run<W: Write>(
    options: &TraceOptions,
    tracer: Option<&StepTraceHandle>,
    out: &mut W,
) -> Result<TraceSummary> {
    let array = build_array(&options.source)?;
    let engine = SortEngine::with_model(array, SpeedModel::new(options.max_delay), options.speed)?;

    let (tx, rx) = unbounded::<(StepEvent, ArraySnapshot)>();
    engine.on_step(move |event, state| {
        let _ = tx.send((*event, state.snapshot()));
    });
    if let Some(tracer) = tracer {
        let tracer = tracer.clone();
        engine.on_step(move |event, state| tracer.record_step(event, state));
    }

    let initial = engine.snapshot();
    write_initial(out, &initial, options.json)?;
    engine.start()?;

    let mut steps = 0u64;
    let mut shifts = 0u64;
    for (event, snapshot) in &rx {
        steps += 1;
        if matches!(event.kind, StepKind::Shifted { .. }) {
            shifts += 1;
        }
        write_step(out, &event, &snapshot, options.json)?;
        if matches!(event.kind, StepKind::Completed | StepKind::Reset) {
            break;
        }
    }

    let final_state = engine.wait_until_settled();
    let summary = TraceSummary {
        steps,
        shifts,
        final_state,
        sorted: engine.snapshot().working,
    };
    if !options.json {
        writeln!(
            out,
            "{} after {} steps ({} shifts): {}",
            final_state.label(),
            summary.steps,
            summary.shifts,
            join_values(&summary.sorted)
        )
        .map_err(write_error)?;
    }
    Ok(summary)
}

fn write_initial<W: Write>(out: &mut W, snapshot: &ArraySnapshot, json: bool) -> Result<()> {
    if json {
        return Ok(());
    }
    writeln!(
        out,
        "sorting {} values: {}",
        snapshot.working.len(),
        join_values(&snapshot.working)
    )
    .map_err(write_error)
}

fn write_step<W: Write>(
    out: &mut W,
    event: &StepEvent,
    snapshot: &ArraySnapshot,
    json: bool,
) -> Result<()> {
    if json {
        let line = StepLine {
            seq: event.seq,
            step: event.kind,
            run_state: event.run_state,
            working: &snapshot.working,
            classes: class_letters(snapshot),
        };
        let json = serde_json::to_string(&line)?;
        return writeln!(out, "{json}").map_err(write_error);
    }

    let highlights = Highlights::from(snapshot);
    let painted: String = classify_all(snapshot.working.len(), &highlights, Spacing::default())
        .iter()
        .map(|c| painted_letter(c.state).to_string())
        .collect();
    writeln!(
        out,
        "{:>5}  {:<9}  {}  {}",
        event.seq,
        event.kind.label(),
        painted,
        join_values(&snapshot.working)
    )
    .map_err(write_error)
}

fn join_values(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_error(e: std::io::Error) -> IsvError {
    IsvError::Runtime {
        details: format!("failed to write trace output: {e}"),
    }
}
