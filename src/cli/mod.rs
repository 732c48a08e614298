//! Terminal front ends: the interactive player, the headless step printer,
//! and the state-to-color palette they share.
#![allow(missing_docs)]

pub mod palette;
pub mod play;
pub mod trace;
