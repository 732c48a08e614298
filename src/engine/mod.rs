//! Sort engine: array model, sub-step machine, run-state coordination, and
//! the per-bar render classifier.

pub mod array_state;
pub mod classifier;
pub mod control;
pub mod sort_engine;
pub mod speed;
pub mod stepper;

#[cfg(test)]
mod test_properties;
