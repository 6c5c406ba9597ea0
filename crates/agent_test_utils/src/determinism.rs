//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the agent issues identical
//! commands given identical configuration and snapshots.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the harness guards against:
//!
//! - **System randomness**: every random choice goes through the agent's
//!   seeded `ChaCha8Rng`.
//! - **HashMap iteration order**: pending counts and ledgers use ordered
//!   maps, and units are visited in snapshot order.
//! - **Floating-point math**: positions and time are fixed point. Only the
//!   policy model uses floats, and its output only feeds an arg-max.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use agent_core::agent::Agent;
use agent_core::config::AgentConfig;
use agent_core::snapshot::WorldSnapshot;

use crate::recording::{RecordedCommand, RecordingSink};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Command log hash from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks per run.
    pub ticks: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic agent).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Agent is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Run a fresh agent over `snapshots` and return every command it issued,
/// one entry per tick.
///
/// # Panics
///
/// Panics if the agent cannot be created or a tick fails.
#[must_use]
pub fn record_session(
    config: &AgentConfig,
    snapshots: &[WorldSnapshot],
) -> Vec<Vec<RecordedCommand>> {
    let mut agent = Agent::new(config.clone()).expect("agent config should be valid");
    snapshots
        .iter()
        .map(|snap| {
            let mut sink = RecordingSink::new();
            agent.on_step(snap, &mut sink).expect("tick should succeed");
            sink.commands
        })
        .collect()
}

/// Run the same configuration over the same snapshots `runs` times and
/// compare command log hashes.
#[must_use]
pub fn verify_determinism(
    runs: usize,
    config: &AgentConfig,
    snapshots: &[WorldSnapshot],
) -> DeterminismResult {
    let hashes: Vec<u64> = (0..runs)
        .map(|_| compute_hash(&record_session(config, snapshots)))
        .collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !is_deterministic {
        tracing::warn!(?hashes, "command logs diverged");
    }
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: snapshots.len(),
    }
}

/// Compare two runs tick by tick and return the first tick whose commands
/// differ.
#[must_use]
pub fn find_first_divergence(config: &AgentConfig, snapshots: &[WorldSnapshot]) -> Option<usize> {
    let first = record_session(config, snapshots);
    let second = record_session(config, snapshots);
    first.iter().zip(&second).position(|(a, b)| a != b)
}
