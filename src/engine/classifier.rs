//! Per-bar rendering state and horizontal spacing.
//!
//! Precedence is first-match-wins and load-bearing: an index can be both
//! `<= key_index` and at the sorted boundary during a shift, and the order
//! below decides it deterministically.
//!
//! | # | condition                  | state                 | x offset                    |
//! |---|----------------------------|-----------------------|-----------------------------|
//! | 1 | `i < sorted_boundary`      | `SortedCommitted`     | 0                           |
//! | 2 | `i == comparison_index`    | `Comparing`           | comparison / 2              |
//! | 3 | `i == current_index`       | `KeyElement`          | comparison / 2              |
//! | 4 | `i <= key_index`           | `SortedPendingReview` | comparison / 2 + sorted     |
//! | 5 | otherwise                  | `Unsorted`            | comparison + sorted         |

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use serde::Serialize;

use crate::engine::array_state::{ArraySnapshot, ArrayState};

/// Rendering state of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarState {
    /// Placed before this key's insertion; not yet compared with the key.
    SortedCommitted,
    /// Currently compared against the key.
    Comparing,
    /// The key itself.
    KeyElement,
    /// Already known greater than the key, now to its right.
    SortedPendingReview,
    /// Has not been a key yet.
    Unsorted,
}

impl BarState {
    pub const ALL: [Self; 5] = [
        Self::SortedCommitted,
        Self::Comparing,
        Self::KeyElement,
        Self::SortedPendingReview,
        Self::Unsorted,
    ];

    /// One-letter code for compact text output.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::SortedCommitted => 'S',
            Self::Comparing => 'C',
            Self::KeyElement => 'K',
            Self::SortedPendingReview => 'P',
            Self::Unsorted => 'U',
        }
    }
}

/// Gaps isolating the comparison and separating sorted from unsorted bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spacing {
    pub comparison_padding: u32,
    pub sorted_padding: u32,
}

impl Default for Spacing {
    /// Pixel spacing of a 1600-wide canvas.
    fn default() -> Self {
        Self {
            comparison_padding: 300,
            sorted_padding: 100,
        }
    }
}

/// Classifier output for one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub state: BarState,
    pub x_offset: u32,
}

/// The highlight indices the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlights {
    pub key_index: Option<usize>,
    pub current_index: Option<usize>,
    pub comparison_index: Option<usize>,
    pub sorted_boundary: usize,
}

impl From<&ArrayState> for Highlights {
    fn from(state: &ArrayState) -> Self {
        Self {
            key_index: state.key_index(),
            current_index: state.current_index(),
            comparison_index: state.comparison_index(),
            sorted_boundary: state.sorted_boundary(),
        }
    }
}

impl From<&ArraySnapshot> for Highlights {
    fn from(snapshot: &ArraySnapshot) -> Self {
        Self {
            key_index: snapshot.key_index,
            current_index: snapshot.current_index,
            comparison_index: snapshot.comparison_index,
            sorted_boundary: snapshot.sorted_boundary,
        }
    }
}

/// Rendering state of `index` alone.
#[must_use]
pub fn state_of(index: usize, h: &Highlights) -> BarState {
    if index < h.sorted_boundary {
        BarState::SortedCommitted
    } else if h.comparison_index == Some(index) {
        BarState::Comparing
    } else if h.current_index == Some(index) {
        BarState::KeyElement
    } else if h.key_index.is_some_and(|key| index <= key) {
        BarState::SortedPendingReview
    } else {
        BarState::Unsorted
    }
}

/// Horizontal adjustment for a bar in `state`.
#[must_use]
pub const fn x_offset_for(state: BarState, spacing: Spacing) -> u32 {
    let half = spacing.comparison_padding / 2;
    match state {
        BarState::SortedCommitted => 0,
        BarState::Comparing | BarState::KeyElement => half,
        BarState::SortedPendingReview => half + spacing.sorted_padding,
        BarState::Unsorted => spacing.comparison_padding + spacing.sorted_padding,
    }
}

/// Classify `index` of `state` with the default pixel spacing.
#[must_use]
pub fn classify(index: usize, state: &ArrayState) -> Classification {
    classify_with(index, &Highlights::from(state), Spacing::default())
}

/// Classify `index` with explicit spacing.
#[must_use]
pub fn classify_with(index: usize, highlights: &Highlights, spacing: Spacing) -> Classification {
    let state = state_of(index, highlights);
    Classification {
        state,
        x_offset: x_offset_for(state, spacing),
    }
}

/// Classify every index of an array of `len` bars.
#[must_use]
pub fn classify_all(len: usize, highlights: &Highlights, spacing: Spacing) -> Vec<Classification> {
    (0..len)
        .map(|index| classify_with(index, highlights, spacing))
        .collect()
}

// ──────────────────── bar geometry ────────────────────

/// Horizontal and vertical placement of bars on a canvas.
///
/// Each bar gets an equal slot after the walls and both gaps are reserved;
/// three quarters of a slot is bar, the rest is inter-bar space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarGeometry {
    pub wall_padding: u32,
    pub slot_width: u32,
    pub bar_width: u32,
}

impl BarGeometry {
    #[must_use]
    pub fn new(canvas_width: u32, bars: usize, wall_padding: u32, spacing: Spacing) -> Self {
        let reserved = 2 * wall_padding + spacing.sorted_padding + spacing.comparison_padding;
        let bars = u32::try_from(bars.max(1)).unwrap_or(u32::MAX);
        let slot_width = canvas_width.saturating_sub(reserved) / bars;
        let bar_width = (slot_width - slot_width / 4).max(1);
        Self {
            wall_padding,
            slot_width: slot_width.max(1),
            bar_width,
        }
    }

    /// Left edge of bar `index` after its classification offset.
    #[must_use]
    pub fn x_for(&self, index: usize, classification: Classification) -> u32 {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.wall_padding
            .saturating_add(index.saturating_mul(self.slot_width))
            .saturating_add(classification.x_offset)
    }
}

/// Bar height scaled so the largest value fills `available_height`.
#[must_use]
pub fn bar_height(value: u32, max_value: u32, available_height: u32) -> u32 {
    if max_value == 0 {
        return 0;
    }
    let scale = f64::from(available_height) / f64::from(max_value);
    (f64::from(value) * scale) as u32
}
