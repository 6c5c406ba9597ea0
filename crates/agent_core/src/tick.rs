//! Per-tick execution context shared by the managers.
//!
//! A [`TickContext`] bundles the snapshot, the command sink and the
//! same-tick [`TickLedger`]. Managers submit through its helpers so that
//! every accepted request is reserved in the ledger and counted.

use crate::error::Result;
use crate::facade::{Ability, CommandSink, Placement, Target};
use crate::gate::{ResourceGate, TickLedger};
use crate::math::Vec2Fixed;
use crate::snapshot::{UnitId, WorldSnapshot};
use crate::unit_kind::UnitKind;

/// Snapshot, sink and ledger for one tick.
pub struct TickContext<'a, S: CommandSink + ?Sized> {
    /// This tick's world view.
    pub snapshot: &'a WorldSnapshot,
    sink: &'a mut S,
    ledger: TickLedger,
    commands: usize,
}

impl<'a, S: CommandSink + ?Sized> TickContext<'a, S> {
    /// Start a tick.
    pub fn new(snapshot: &'a WorldSnapshot, sink: &'a mut S) -> Self {
        Self {
            snapshot,
            sink,
            ledger: TickLedger::new(),
            commands: 0,
        }
    }

    /// Affordability view including this tick's commitments.
    #[must_use]
    pub fn gate(&self) -> ResourceGate<'_> {
        ResourceGate::new(self.snapshot, &self.ledger)
    }

    /// Commitments made so far.
    #[must_use]
    pub const fn ledger(&self) -> &TickLedger {
        &self.ledger
    }

    /// Commands submitted so far.
    #[must_use]
    pub const fn commands_issued(&self) -> usize {
        self.commands
    }

    /// Read-only access to the sink (legality checks).
    #[must_use]
    pub fn sink(&self) -> &S {
        &*self.sink
    }

    /// Ask the host to rebalance mining workers.
    pub fn distribute_workers(&mut self) -> Result<()> {
        self.sink.distribute_workers()?;
        self.commands += 1;
        Ok(())
    }

    /// Submit a structure request and reserve its cost.
    pub fn build(&mut self, kind: UnitKind, placement: Placement) -> Result<()> {
        self.sink.request_build(kind, placement)?;
        self.ledger.commit(kind);
        self.commands += 1;
        tracing::debug!(?kind, ?placement, loop_ = self.snapshot.game_loop, "build");
        Ok(())
    }

    /// Submit a train request and reserve its cost.
    pub fn train(&mut self, producer: UnitId, kind: UnitKind) -> Result<()> {
        self.sink.request_train(producer, kind)?;
        self.ledger.commit(kind);
        self.commands += 1;
        tracing::debug!(%producer, ?kind, loop_ = self.snapshot.game_loop, "train");
        Ok(())
    }

    /// Whether `caster` can cast now and has not cast earlier this tick.
    #[must_use]
    pub fn can_cast(&self, caster: UnitId, ability: Ability, target: UnitId) -> bool {
        !self.ledger.has_boosted(caster) && self.sink.can_cast(caster, ability, target)
    }

    /// Submit a cast.
    pub fn cast(&mut self, caster: UnitId, ability: Ability, target: UnitId) -> Result<()> {
        self.sink.request_cast(caster, ability, target)?;
        self.ledger.mark_boost(caster);
        self.commands += 1;
        tracing::debug!(%caster, ?ability, %target, "cast");
        Ok(())
    }

    /// Submit a move.
    pub fn move_to(&mut self, unit: UnitId, point: Vec2Fixed) -> Result<()> {
        self.sink.request_move(unit, point)?;
        self.commands += 1;
        Ok(())
    }

    /// Submit the same attack for each unit.
    pub fn attack_all(&mut self, units: &[UnitId], target: Target) -> Result<()> {
        self.sink.request_attack_all(units, target)?;
        self.commands += units.len();
        Ok(())
    }

    /// Submit one attack.
    pub fn attack(&mut self, unit: UnitId, target: Target) -> Result<()> {
        self.sink.request_attack(unit, target)?;
        self.commands += 1;
        Ok(())
    }
}
