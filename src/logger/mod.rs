//! Structured step trace: JSONL writer plus the thread that feeds it.

pub mod jsonl;
pub mod trace;
