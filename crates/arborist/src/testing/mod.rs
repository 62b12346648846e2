//! Deterministic collaborators and fixtures for tests and benchmarks.
//!
//! The split objective is owned by callers; the splitters here only exist
//! to drive the pre-tree and forest machinery reproducibly.

pub mod data;
mod splitters;

pub use splitters::{MedianSplitter, NoSplit, ScriptedSplitter};
