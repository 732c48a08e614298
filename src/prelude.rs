//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use insertion_sort_visualizer::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{IsvError, Result};

// Engine
pub use crate::engine::array_state::{ArraySnapshot, ArrayState};
pub use crate::engine::classifier::{BarState, Classification, Spacing, classify, classify_with};
pub use crate::engine::control::RunState;
pub use crate::engine::sort_engine::{SortEngine, StepEvent};
pub use crate::engine::speed::SpeedModel;
pub use crate::engine::stepper::StepKind;

// Logger
pub use crate::logger::trace::{StepTraceHandle, TraceEvent, spawn_trace_logger};
