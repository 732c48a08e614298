#![forbid(unsafe_code)]

//! Insertion Sort Visualizer (isv): a step-driven insertion sort engine with
//! pause / resume / cancel coordination and a terminal front end.
//!
//! The engine runs the sort on its own thread, one observable sub-step at a
//! time, and exposes everything a renderer needs:
//! 1. **Array state**: the working array plus key / current / comparison
//!    indices and the sorted boundary
//! 2. **Run control**: `Idle → Running ⇄ Paused → Completed`, cancellable
//!    from any active state with an exact restore of the original order
//! 3. **Render classification**: a per-bar state and horizontal offset
//!
//! # Library usage
//!
//! ```rust,no_run
//! use insertion_sort_visualizer::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let engine = SortEngine::new(ArrayState::from_values(vec![5, 3, 1])?, 100)?;
//! engine.start()?;
//! assert_eq!(engine.wait_until_settled(), RunState::Completed);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod engine;
pub mod logger;
