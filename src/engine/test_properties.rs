//! Property-based tests for the engine invariants.
//!
//! Uses `proptest` to check that arbitrary inputs always sort, never lose or
//! invent values, keep the prefix sorted between iterations, classify every
//! bar into exactly one state, and map speed to a non-increasing delay.

use std::time::Duration;

use proptest::prelude::*;

use super::array_state::ArrayState;
use super::classifier::{BarState, Highlights, Spacing, classify_all, state_of};
use super::speed::SpeedModel;
use super::stepper::{InsertionStepper, StepKind};

// ──────────────────── strategies ────────────────────

fn arb_values() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=99, 1..=60)
}

fn arb_highlights() -> impl Strategy<Value = (usize, Highlights)> {
    (1usize..=40).prop_flat_map(|len| {
        (
            Just(len),
            prop::option::of(0..len),
            prop::option::of(0..len),
            prop::option::of(0..len),
            0..=len,
        )
            .prop_map(|(len, key, current, comparison, boundary)| {
                (
                    len,
                    Highlights {
                        key_index: key,
                        current_index: current,
                        comparison_index: comparison,
                        sorted_boundary: boundary,
                    },
                )
            })
    })
}

// ──────────────────── properties ────────────────────

proptest! {
    #[test]
    fn stepper_always_sorts(values in arb_values()) {
        let mut state = ArrayState::from_values(values.clone()).unwrap();
        let steps = InsertionStepper::new().run_to_end(&mut state);

        let mut expected = values;
        expected.sort_unstable();
        prop_assert_eq!(state.working(), expected.as_slice());
        prop_assert_eq!(steps.last(), Some(&StepKind::Completed));
        prop_assert_eq!(state.sorted_boundary(), state.len());
    }

    #[test]
    fn every_step_preserves_multiset(values in arb_values()) {
        let mut state = ArrayState::from_values(values).unwrap();
        let mut stepper = InsertionStepper::new();
        while stepper.advance(&mut state).is_some() {
            prop_assert!(state.is_permutation_of_original());
        }
    }

    #[test]
    fn prefix_sorted_at_iteration_boundaries(values in arb_values()) {
        let mut state = ArrayState::from_values(values).unwrap();
        let mut stepper = InsertionStepper::new();
        while let Some(step) = stepper.advance(&mut state) {
            if let StepKind::InterIteration { iteration } = step {
                let prefix = &state.working()[..iteration];
                prop_assert!(prefix.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }

    #[test]
    fn shift_count_equals_inversions(values in arb_values()) {
        let inversions = values
            .iter()
            .enumerate()
            .map(|(i, a)| values[i + 1..].iter().filter(|b| a > b).count())
            .sum::<usize>();
        let mut state = ArrayState::from_values(values).unwrap();
        let shifts = InsertionStepper::new()
            .run_to_end(&mut state)
            .into_iter()
            .filter(|s| matches!(s, StepKind::Shifted { .. }))
            .count();
        prop_assert_eq!(shifts, inversions);
    }

    #[test]
    fn reset_after_any_prefix_restores_original(values in arb_values(), cut in 0usize..200) {
        let mut state = ArrayState::from_values(values.clone()).unwrap();
        let mut stepper = InsertionStepper::new();
        for _ in 0..cut {
            if stepper.advance(&mut state).is_none() {
                break;
            }
        }
        state.reset();
        prop_assert_eq!(state.working(), values.as_slice());
        prop_assert_eq!(state.sorted_boundary(), 0);
        prop_assert_eq!(state.key_index(), None);
    }

    #[test]
    fn classifier_is_total_and_matches_precedence((len, h) in arb_highlights()) {
        let all = classify_all(len, &h, Spacing::default());
        prop_assert_eq!(all.len(), len);
        for (i, c) in all.iter().enumerate() {
            prop_assert!(BarState::ALL.contains(&c.state));
            if i < h.sorted_boundary {
                prop_assert_eq!(c.state, BarState::SortedCommitted);
            }
            prop_assert_eq!(c.state, state_of(i, &h));
        }
    }

    #[test]
    fn delay_is_non_increasing_in_speed(a in 0u8..=100, b in 0u8..=100, max_ms in 1u64..10_000) {
        let model = SpeedModel::new(Duration::from_millis(max_ms));
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(model.delay_for(hi).unwrap() <= model.delay_for(lo).unwrap());
        prop_assert!(model.delay_for(lo).unwrap() <= model.max_delay());
    }
}
