//! Working array, its unsorted snapshot, and the four highlight indices.

#![allow(missing_docs)]

use rand::Rng;
use serde::Serialize;

use crate::core::errors::{IsvError, Result};

/// Array being sorted plus the highlight positions the renderer needs.
///
/// `working` is always a permutation of `original`. Only the sort loop mutates
/// it while a sort is bound; everyone else reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayState {
    working: Vec<u32>,
    original: Vec<u32>,
    key_index: Option<usize>,
    current_index: Option<usize>,
    comparison_index: Option<usize>,
    sorted_boundary: usize,
}

/// Owned, serializable copy of an [`ArrayState`] for renderers and traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArraySnapshot {
    pub working: Vec<u32>,
    pub key_index: Option<usize>,
    pub current_index: Option<usize>,
    pub comparison_index: Option<usize>,
    pub sorted_boundary: usize,
}

impl ArrayState {
    /// Random array of `size` values drawn uniformly from `[1, max_value]`.
    pub fn initialize(size: usize, max_value: u32) -> Result<Self> {
        Self::initialize_with(size, max_value, &mut rand::rng())
    }

    /// Same as [`ArrayState::initialize`] with a caller-supplied RNG.
    pub fn initialize_with<R: Rng>(
        size: usize,
        max_value: u32,
        rng: &mut R,
    ) -> Result<Self> {
        if size == 0 {
            return Err(IsvError::invalid("array size must be >= 1"));
        }
        if max_value == 0 {
            return Err(IsvError::invalid("value range must be >= 1"));
        }
        let values = (0..size).map(|_| rng.random_range(1..=max_value)).collect();
        Self::from_values(values)
    }

    /// Bind an explicit sequence of values.
    pub fn from_values(values: Vec<u32>) -> Result<Self> {
        if values.is_empty() {
            return Err(IsvError::invalid("array must hold at least one value"));
        }
        Ok(Self {
            original: values.clone(),
            working: values,
            key_index: None,
            current_index: None,
            comparison_index: None,
            sorted_boundary: 0,
        })
    }

    /// Restore the pre-sort order and clear every highlight.
    pub fn reset(&mut self) {
        self.working.clone_from(&self.original);
        self.key_index = None;
        self.current_index = None;
        self.comparison_index = None;
        self.sorted_boundary = 0;
    }

    pub fn working(&self) -> &[u32] {
        &self.working
    }

    pub fn original(&self) -> &[u32] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    pub fn key_index(&self) -> Option<usize> {
        self.key_index
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn comparison_index(&self) -> Option<usize> {
        self.comparison_index
    }

    pub fn sorted_boundary(&self) -> usize {
        self.sorted_boundary
    }

    /// Largest value in the working array (bar height scaling).
    pub fn max_value(&self) -> u32 {
        self.working.iter().copied().max().unwrap_or(0)
    }

    /// Whether `working` holds exactly the multiset of `original`.
    pub fn is_permutation_of_original(&self) -> bool {
        let mut a = self.working.clone();
        let mut b = self.original.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    pub fn snapshot(&self) -> ArraySnapshot {
        ArraySnapshot {
            working: self.working.clone(),
            key_index: self.key_index,
            current_index: self.current_index,
            comparison_index: self.comparison_index,
            sorted_boundary: self.sorted_boundary,
        }
    }

    // ──────────────────── sort-loop mutators ────────────────────

    pub(crate) fn value_at(&self, index: usize) -> u32 {
        self.working[index]
    }

    pub(crate) fn set_highlights(
        &mut self,
        key_index: Option<usize>,
        current_index: Option<usize>,
        comparison_index: Option<usize>,
        sorted_boundary: usize,
    ) {
        self.key_index = key_index;
        self.current_index = current_index;
        self.comparison_index = comparison_index;
        self.sorted_boundary = sorted_boundary.min(self.working.len());
    }

    /// Move `working[index]` one slot right and drop `key` into `index`.
    /// Both writes happen under one call so no observer sees a duplicate.
    pub(crate) fn shift_right_and_place(&mut self, index: usize, key: u32) {
        self.working[index + 1] = self.working[index];
        self.working[index] = key;
    }
}
