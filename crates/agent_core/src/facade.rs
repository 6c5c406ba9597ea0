//! Command interface between the agent and the host engine.
//!
//! The [`CommandSink`] trait is the only way the agent acts on the game.
//! Every call is fire-and-forget: the agent never waits for an order to
//! complete and never cancels one. The next tick simply issues fresh
//! orders from a fresh snapshot.
//!
//! # Command Flow
//!
//! Managers consult [`crate::gate::ResourceGate`] (and, for boosts,
//! [`CommandSink::can_cast`]) before submitting, so a submission that
//! reaches the sink is expected to be legal. An `Err` from the sink means
//! the host could not take the order at all and aborts the tick.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::Vec2Fixed;
use crate::snapshot::UnitId;
use crate::unit_kind::UnitKind;

/// Where a structure should go. Exact placement is the host's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    /// Anywhere valid near this anchor.
    Near(Vec2Fixed),
    /// On a specific geyser, built by a specific worker.
    OnGeyser {
        /// Geyser to build on.
        geyser: UnitId,
        /// Worker assigned to build.
        worker: UnitId,
    },
    /// At the next free expansion location.
    Expansion,
}

/// What an attack order is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A specific enemy unit or structure.
    Unit(UnitId),
    /// A map position (attack-move).
    Position(Vec2Fixed),
}

/// Castable abilities the agent uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Energy-cost production speed-up cast by a primary base.
    PriorityBoost,
}

/// Trait for the host side of the command boundary.
///
/// Both the real game client and the headless sandbox implement this, so
/// the agent behaves identically in either. Tests use a recording sink.
pub trait CommandSink {
    /// Let the host rebalance mining workers across bases and geysers.
    fn distribute_workers(&mut self) -> Result<()>;

    /// Request a structure.
    fn request_build(&mut self, kind: UnitKind, placement: Placement) -> Result<()>;

    /// Queue a unit on a production structure.
    fn request_train(&mut self, producer: UnitId, kind: UnitKind) -> Result<()>;

    /// Whether `caster` may legally cast `ability` on `target` right now.
    fn can_cast(&self, caster: UnitId, ability: Ability, target: UnitId) -> bool;

    /// Cast an ability on a unit.
    fn request_cast(&mut self, caster: UnitId, ability: Ability, target: UnitId) -> Result<()>;

    /// Move a unit to a point.
    fn request_move(&mut self, unit: UnitId, point: Vec2Fixed) -> Result<()>;

    /// Order a unit to attack a target.
    fn request_attack(&mut self, unit: UnitId, target: Target) -> Result<()>;

    /// Issue the same attack to several units.
    ///
    /// Convenience method for group orders.
    fn request_attack_all(&mut self, units: &[UnitId], target: Target) -> Result<()> {
        for &unit in units {
            self.request_attack(unit, target)?;
        }
        Ok(())
    }
}
