//! Insertion sort decomposed into observable sub-steps.
//!
//! [`InsertionStepper`] owns no threads and no timing: every call to
//! [`InsertionStepper::advance`] applies exactly one sub-step to an
//! [`ArrayState`] and reports what it did. The sort loop wraps it with
//! suspension points; tests drive it directly.
//!
//! Per outer iteration `i` in `1..len`:
//! 1. inter-iteration pause: no current/comparison, `sorted_boundary = i`
//! 2. key selection: `key_index = current_index = i`, `comparison_index = i-1`,
//!    `sorted_boundary = i-1`
//! 3. one shift per element greater than the key, moving the key left
//!
//! After the last iteration a terminal step sets `sorted_boundary = len`.

#![allow(missing_docs)]

use serde::Serialize;

use crate::engine::array_state::ArrayState;

/// What a single sub-step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Pause between outer iterations showing the sorted prefix.
    InterIteration { iteration: usize },
    /// `working[key_index]` became the key.
    KeySelected { key_index: usize, key: u32 },
    /// The element at `from` moved to `from + 1`; the key now sits at `from`.
    Shifted { from: usize, key: u32 },
    /// Whole array sorted.
    Completed,
    /// Array restored to its original order (cancel or forced reset).
    Reset,
}

impl StepKind {
    /// Short label for logs and the headless printer.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InterIteration { .. } => "iteration",
            Self::KeySelected { .. } => "key",
            Self::Shifted { .. } => "shift",
            Self::Completed => "completed",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NextIteration { i: usize },
    SelectKey { i: usize },
    Shift { i: usize, key: u32 },
    Finished,
}

/// Resumable insertion sort over an [`ArrayState`].
#[derive(Debug, Clone)]
pub struct InsertionStepper {
    phase: Phase,
}

impl Default for InsertionStepper {
    fn default() -> Self {
        Self::new()
    }
}

impl InsertionStepper {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::NextIteration { i: 1 },
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Apply the next sub-step. Returns `None` once [`StepKind::Completed`]
    /// has been emitted.
    pub fn advance(&mut self, state: &mut ArrayState) -> Option<StepKind> {
        loop {
            match self.phase {
                Phase::Finished => return None,
                Phase::NextIteration { i } => {
                    if i >= state.len() {
                        let len = state.len();
                        state.set_highlights(state.key_index(), None, None, len);
                        self.phase = Phase::Finished;
                        return Some(StepKind::Completed);
                    }
                    state.set_highlights(state.key_index(), None, None, i);
                    self.phase = Phase::SelectKey { i };
                    return Some(StepKind::InterIteration { iteration: i });
                }
                Phase::SelectKey { i } => {
                    let key = state.value_at(i);
                    state.set_highlights(Some(i), Some(i), Some(i - 1), i - 1);
                    self.phase = Phase::Shift { i, key };
                    return Some(StepKind::KeySelected { key_index: i, key });
                }
                Phase::Shift { i, key } => {
                    let Some(j) = state.comparison_index() else {
                        self.phase = Phase::NextIteration { i: i + 1 };
                        continue;
                    };
                    if state.value_at(j) <= key {
                        self.phase = Phase::NextIteration { i: i + 1 };
                        continue;
                    }
                    state.shift_right_and_place(j, key);
                    let next_comparison = j.checked_sub(1);
                    state.set_highlights(
                        state.key_index(),
                        Some(j),
                        next_comparison,
                        next_comparison.unwrap_or(0),
                    );
                    return Some(StepKind::Shifted { from: j, key });
                }
            }
        }
    }

    /// Drive to completion without any pacing, collecting every step.
    pub fn run_to_end(&mut self, state: &mut ArrayState) -> Vec<StepKind> {
        std::iter::from_fn(|| self.advance(state)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(values: &[u32]) -> ArrayState {
        ArrayState::from_values(values.to_vec()).unwrap()
    }

    #[test]
    fn five_three_one_scenario() {
        let mut s = state(&[5, 3, 1]);
        let mut stepper = InsertionStepper::new();

        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::InterIteration { iteration: 1 })
        );
        assert_eq!(s.sorted_boundary(), 1);
        assert_eq!(s.current_index(), None);

        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::KeySelected {
                key_index: 1,
                key: 3
            })
        );
        assert_eq!(s.comparison_index(), Some(0));
        assert_eq!(s.sorted_boundary(), 0);

        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::Shifted { from: 0, key: 3 })
        );
        assert_eq!(s.working(), &[3, 5, 1]);
        assert_eq!(s.current_index(), Some(0));
        assert_eq!(s.comparison_index(), None);

        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::InterIteration { iteration: 2 })
        );
        assert_eq!(s.sorted_boundary(), 2);

        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::KeySelected {
                key_index: 2,
                key: 1
            })
        );
        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::Shifted { from: 1, key: 1 })
        );
        assert_eq!(s.working(), &[3, 1, 5]);
        assert_eq!(s.comparison_index(), Some(0));
        assert_eq!(
            stepper.advance(&mut s),
            Some(StepKind::Shifted { from: 0, key: 1 })
        );
        assert_eq!(s.working(), &[1, 3, 5]);

        assert_eq!(stepper.advance(&mut s), Some(StepKind::Completed));
        assert_eq!(s.sorted_boundary(), 3);
        assert_eq!(s.current_index(), None);
        assert_eq!(s.comparison_index(), None);
        assert!(stepper.is_finished());
        assert_eq!(stepper.advance(&mut s), None);
    }

    #[test]
    fn single_element_completes_immediately() {
        let mut s = state(&[42]);
        let steps = InsertionStepper::new().run_to_end(&mut s);
        assert_eq!(steps, vec![StepKind::Completed]);
        assert_eq!(s.sorted_boundary(), 1);
    }

    #[test]
    fn sorted_input_never_shifts() {
        let mut s = state(&[1, 2, 2, 3]);
        let steps = InsertionStepper::new().run_to_end(&mut s);
        assert!(
            !steps
                .iter()
                .any(|step| matches!(step, StepKind::Shifted { .. }))
        );
        // 3 iterations x (inter-iteration + key) + completed
        assert_eq!(steps.len(), 7);
    }

    #[test]
    fn equal_keys_stop_the_shift() {
        let mut s = state(&[2, 2]);
        let steps = InsertionStepper::new().run_to_end(&mut s);
        assert_eq!(s.working(), &[2, 2]);
        assert!(
            !steps
                .iter()
                .any(|step| matches!(step, StepKind::Shifted { .. }))
        );
    }

    #[test]
    fn reverse_input_shift_count_is_quadratic() {
        let mut s = state(&[5, 4, 3, 2, 1]);
        let steps = InsertionStepper::new().run_to_end(&mut s);
        let shifts = steps
            .iter()
            .filter(|step| matches!(step, StepKind::Shifted { .. }))
            .count();
        assert_eq!(shifts, 10);
        assert_eq!(s.working(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn prefix_sorted_between_iterations() {
        let mut s = state(&[8, 6, 7, 5, 3, 0, 9]);
        let mut stepper = InsertionStepper::new();
        while let Some(step) = stepper.advance(&mut s) {
            assert!(s.is_permutation_of_original());
            if matches!(step, StepKind::InterIteration { .. } | StepKind::Completed) {
                let prefix = &s.working()[..s.sorted_boundary()];
                assert!(prefix.windows(2).all(|w| w[0] <= w[1]), "{prefix:?}");
            }
        }
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(StepKind::Completed.label(), "completed");
        assert_eq!(StepKind::Shifted { from: 0, key: 1 }.label(), "shift");
    }
}
