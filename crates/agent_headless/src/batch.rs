//! Batch session runner.
//!
//! Plays many seeds in parallel with rayon and folds the results into one
//! [`BatchSummary`].

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use agent_core::config::AgentConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::{BatchSummary, SessionMetrics};
use crate::runner::{SessionRunner, DEFAULT_STEP_LOOPS};
use crate::sandbox::SandboxConfig;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of sessions to play
    pub games: u32,
    /// Maximum parallel sessions (0 = use rayon default)
    pub parallel: u32,
    /// Seed of the first session; session `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Agent settings shared by every session (seed is overridden)
    pub agent: AgentConfig,
    /// Sandbox settings shared by every session
    pub sandbox: SandboxConfig,
    /// Game loops between agent ticks
    pub step_loops: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            games: 100,
            parallel: 0,
            seed_start: 0,
            agent: AgentConfig::default(),
            sandbox: SandboxConfig::default(),
            step_loops: DEFAULT_STEP_LOOPS,
        }
    }
}

impl BatchConfig {
    /// Create config for `games` sessions with the given settings
    #[must_use]
    pub fn new(games: u32, agent: AgentConfig, sandbox: SandboxConfig) -> Self {
        Self {
            games,
            agent,
            sandbox,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set maximum parallel sessions
    #[must_use]
    pub fn with_parallel(mut self, parallel: u32) -> Self {
        self.parallel = parallel;
        self
    }

    fn agent_for(&self, index: u32) -> AgentConfig {
        let mut agent = self.agent.clone();
        agent.seed = self.seed_start.wrapping_add(u64::from(index));
        agent
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual session metrics, in seed order
    pub sessions: Vec<SessionMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Session index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

fn play(config: &BatchConfig, index: u32) -> std::result::Result<SessionMetrics, BatchError> {
    let agent = config.agent_for(index);
    let seed = agent.seed;
    SessionRunner::new(agent, config.sandbox.clone())
        .and_then(|runner| runner.with_step_loops(config.step_loops).run())
        .map_err(|e| {
            warn!(game = index, seed, error = %e, "session failed");
            BatchError {
                game_index: index,
                seed,
                message: e.to_string(),
            }
        })
}

fn play_all(config: &BatchConfig) -> Vec<std::result::Result<SessionMetrics, BatchError>> {
    let completed = AtomicU32::new(0);
    (0..config.games)
        .into_par_iter()
        .map(|index| {
            let result = play(config, index);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 {
                debug!("Progress: {}/{}", done, config.games);
            }
            result
        })
        .collect()
}

/// Run a batch of sessions
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        games = config.games,
        parallel = config.parallel,
        seed_start = config.seed_start,
        mode = ?config.agent.tactics.mode,
        "Starting batch run"
    );

    let results = if config.parallel > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build()
        {
            Ok(pool) => pool.install(|| play_all(&config)),
            Err(e) => {
                warn!(error = %e, "Failed to build thread pool, using rayon default");
                play_all(&config)
            }
        }
    } else {
        play_all(&config)
    };

    let (sessions, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    let sessions: Vec<SessionMetrics> = sessions.into_iter().filter_map(|r| r.ok()).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(|r| r.err()).collect();

    let summary = BatchSummary::from_sessions(&sessions);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} sessions in {:.1}s ({:.1} sessions/sec), win rate {:.1}%",
        sessions.len(),
        duration_seconds,
        sessions.len() as f64 / duration_seconds.max(f64::EPSILON),
        summary.win_rate * 100.0
    );

    BatchResults {
        config,
        sessions,
        summary,
        duration_seconds,
        errors,
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Runs compared.
    pub runs: u32,
    /// Command hash of each run.
    pub command_hashes: Vec<u64>,
    /// Final state hash of each run.
    pub state_hashes: Vec<u64>,
}

impl DeterminismReport {
    /// Whether every run matched the first.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.command_hashes.windows(2).all(|w| w[0] == w[1])
            && self.state_hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Play the same seed `runs` times and compare command and state hashes.
pub fn verify_determinism(
    agent: &AgentConfig,
    sandbox: &SandboxConfig,
    runs: u32,
) -> Result<DeterminismReport> {
    let mut report = DeterminismReport {
        runs,
        command_hashes: Vec::new(),
        state_hashes: Vec::new(),
    };
    for run in 0..runs {
        let metrics = SessionRunner::new(agent.clone(), sandbox.clone())?.run()?;
        debug!(
            run,
            command_hash = metrics.command_hash,
            state_hash = metrics.final_state_hash,
            "determinism run"
        );
        report.command_hashes.push(metrics.command_hash);
        report.state_hashes.push(metrics.final_state_hash);
    }
    Ok(report)
}
