//! Bar colors per classifier state.

use colored::{ColoredString, Colorize};
use crossterm::style::Color;

use crate::engine::classifier::BarState;

/// Terminal color for a bar.
#[must_use]
pub const fn bar_color(state: BarState) -> Color {
    match state {
        BarState::SortedCommitted => Color::DarkGreen,
        BarState::Comparing => Color::Red,
        BarState::KeyElement => Color::Blue,
        BarState::SortedPendingReview => Color::Green,
        BarState::Unsorted => Color::White,
    }
}

/// Classification letter painted for line-oriented output.
#[must_use]
pub fn painted_letter(state: BarState) -> ColoredString {
    let letter = state.letter().to_string();
    match state {
        BarState::SortedCommitted => letter.green().dimmed(),
        BarState::Comparing => letter.red().bold(),
        BarState::KeyElement => letter.blue().bold(),
        BarState::SortedPendingReview => letter.bright_green(),
        BarState::Unsorted => letter.normal(),
    }
}

/// One-line legend for the footer.
#[must_use]
pub fn legend() -> String {
    BarState::ALL
        .iter()
        .map(|state| format!("{}={}", state.letter(), describe(*state)))
        .collect::<Vec<_>>()
        .join("  ")
}

const fn describe(state: BarState) -> &'static str {
    match state {
        BarState::SortedCommitted => "sorted",
        BarState::Comparing => "comparing",
        BarState::KeyElement => "key",
        BarState::SortedPendingReview => "shifted",
        BarState::Unsorted => "unsorted",
    }
}
