//! # Agent Core
//!
//! Per-tick decision engine for an economy-and-army strategy bot.
//!
//! This crate contains **only** decision logic:
//! - No game client or network
//! - No global state (everything lives in one [`agent::Agent`])
//! - No system randomness (a seeded `ChaCha8Rng` is injected)
//! - Fixed-point positions and time
//!
//! Each tick the host hands the agent an immutable [`snapshot::WorldSnapshot`]
//! and a [`facade::CommandSink`]; the agent runs its managers in a fixed
//! order and submits build, train, cast, move and attack commands.
//!
//! ## Crate Structure
//!
//! - [`gate`] - Same-tick affordability and pending checks
//! - [`economy`], [`production`], [`force`], [`scout`] - Unconditional managers
//! - [`tactics`] - Cooldown-gated attack decisions
//! - [`policy`], [`encoding`], [`training`] - Learned attack policy support
//! - [`agent`] - The pipeline tying them together

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod config;
pub mod economy;
pub mod encoding;
pub mod error;
pub mod facade;
pub mod force;
pub mod gate;
pub mod math;
pub mod policy;
pub mod production;
pub mod scout;
pub mod snapshot;
pub mod tactics;
pub mod tick;
pub mod training;
pub mod unit_kind;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, SessionOutcome, TickReport};
    pub use crate::config::{AgentConfig, ConfigError, TacticsMode};
    pub use crate::encoding::{EncodedState, StateEncoder};
    pub use crate::error::{AgentError, Result};
    pub use crate::facade::{Ability, CommandSink, Placement, Target};
    pub use crate::gate::{ResourceGate, TickLedger};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::policy::{LinearPolicy, PolicyModel};
    pub use crate::snapshot::{EnemyRef, Geyser, MapSize, UnitId, UnitRef, WorldSnapshot};
    pub use crate::tactics::{ActionChoice, CooldownTimer, Decision};
    pub use crate::training::{TrainingLog, TrainingSample};
    pub use crate::unit_kind::{Cost, UnitKind, UnitRole};
}
