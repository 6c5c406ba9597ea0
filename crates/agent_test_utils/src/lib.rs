//! # Agent Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Snapshot builder and fixed-point helpers
//! - Recording command sink
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod recording;

/// Re-export proptest for convenience.
pub use proptest;
