//! Error type for the headless runner.

use thiserror::Error;

use agent_core::config::ConfigError;
use agent_core::error::AgentError;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Errors from loading sandbox settings, running sessions and writing results.
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(String),
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse sandbox config: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Agent configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The agent failed during a session.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// Replays of one seed diverged.
    #[error("Seed {seed} diverged across {runs} runs")]
    Nondeterministic {
        /// Seed that was replayed.
        seed: u64,
        /// Runs compared.
        runs: u32,
    },
}
