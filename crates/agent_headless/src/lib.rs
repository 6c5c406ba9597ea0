//! Headless sandbox runner for the decision engine.
//!
//! This crate plays whole sessions without a game client:
//!
//! - **Sandbox**: a deterministic stand-in world implementing
//!   [`agent_core::facade::CommandSink`]
//! - **Sessions**: one agent ticked against one world until an outcome
//! - **Batches**: many seeds in parallel, summarised for comparison
//! - **Determinism checks**: the same seed replayed and hashed
//!
//! # Example
//!
//! ```bash
//! # One session, metrics as JSON on stdout
//! cargo run -p agent_headless -- run --config agent.ron --seed 7
//!
//! # A batch of sessions
//! cargo run -p agent_headless -- run --games 200 --parallel 8 --output results/
//!
//! # Inspect a flushed sample log
//! cargo run -p agent_headless -- inspect --file train_data/session-7-20160.bin
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod sandbox;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, DeterminismReport};
pub use error::{HeadlessError, Result};
pub use metrics::{BatchSummary, SessionMetrics};
pub use runner::SessionRunner;
pub use sandbox::{SandboxConfig, SandboxWorld};
