//! Error types for the decision engine.
//!
//! Ordinary "cannot do that right now" outcomes (unaffordable, no producer,
//! no target) are not errors: managers turn them into no-ops. The variants
//! here cover the boundary with the host: command transport, policy model
//! loading, and training log persistence.

use thiserror::Error;

use crate::unit_kind::UnitKind;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Top-level error type for the decision engine.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The host rejected or failed to deliver a command.
    #[error("Command submission failed: {0}")]
    CommandRejected(String),

    /// A command referenced a unit the host does not know.
    #[error("Unknown unit ID: {0}")]
    UnknownUnit(u64),

    /// A train or build request named a kind the producer cannot make.
    #[error("{producer:?} cannot produce {kind:?}")]
    InvalidProduction {
        /// Producing structure kind.
        producer: UnitKind,
        /// Requested kind.
        kind: UnitKind,
    },

    /// The policy model could not be loaded.
    #[error("Failed to load policy model '{path}': {message}")]
    PolicyLoad {
        /// Path to the model file.
        path: String,
        /// Error message.
        message: String,
    },

    /// The policy model expects a different input shape than the encoder renders.
    #[error("Policy input shape {expected:?} does not match encoded state {actual:?}")]
    ShapeMismatch {
        /// Shape the model was trained on (height, width, channels).
        expected: (usize, usize, usize),
        /// Shape the encoder produces.
        actual: (usize, usize, usize),
    },

    /// Inference produced an unusable output vector.
    #[error("Policy inference failed: {0}")]
    Inference(String),

    /// Training log could not be read or written.
    #[error("Training log I/O error: {0}")]
    TrainingIo(#[from] std::io::Error),

    /// Training log could not be encoded or decoded.
    #[error("Training log format error: {0}")]
    TrainingFormat(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Invalid agent state.
    #[error("Invalid agent state: {0}")]
    InvalidState(String),
}
