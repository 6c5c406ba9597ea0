//! A [`CommandSink`] that records every submission.
//!
//! Tests drive the agent or a single manager against a [`RecordingSink`]
//! and then assert on what was submitted, in order.

use std::collections::BTreeSet;

use agent_core::error::{AgentError, Result};
use agent_core::facade::{Ability, CommandSink, Placement, Target};
use agent_core::math::Vec2Fixed;
use agent_core::snapshot::UnitId;
use agent_core::unit_kind::UnitKind;
use serde::{Deserialize, Serialize};

/// One submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordedCommand {
    /// Worker rebalance.
    DistributeWorkers,
    /// Structure request.
    Build {
        /// Structure kind.
        kind: UnitKind,
        /// Placement.
        placement: Placement,
    },
    /// Train request.
    Train {
        /// Producing structure.
        producer: UnitId,
        /// Unit kind.
        kind: UnitKind,
    },
    /// Ability cast.
    Cast {
        /// Casting unit.
        caster: UnitId,
        /// Ability.
        ability: Ability,
        /// Target unit.
        target: UnitId,
    },
    /// Move order.
    Move {
        /// Unit.
        unit: UnitId,
        /// Destination.
        point: Vec2Fixed,
    },
    /// Attack order.
    Attack {
        /// Unit.
        unit: UnitId,
        /// Target.
        target: Target,
    },
}

/// Sink that records commands and answers `can_cast` from a fixed set.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Everything submitted, in order.
    pub commands: Vec<RecordedCommand>,
    /// Casters for which `can_cast` returns true.
    pub castable: BTreeSet<UnitId>,
    /// Reject every submission after this many have been accepted.
    pub fail_after: Option<usize>,
}

impl RecordingSink {
    /// Empty sink where nothing can cast.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink where the given casters can always cast.
    #[must_use]
    pub fn with_casters(casters: impl IntoIterator<Item = UnitId>) -> Self {
        Self {
            castable: casters.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Forget recorded commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Structure requests.
    #[must_use]
    pub fn builds(&self) -> Vec<(UnitKind, Placement)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                RecordedCommand::Build { kind, placement } => Some((kind, placement)),
                _ => None,
            })
            .collect()
    }

    /// Structure requests of one kind.
    #[must_use]
    pub fn builds_of(&self, kind: UnitKind) -> usize {
        self.builds().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Train requests.
    #[must_use]
    pub fn trains(&self) -> Vec<(UnitId, UnitKind)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                RecordedCommand::Train { producer, kind } => Some((producer, kind)),
                _ => None,
            })
            .collect()
    }

    /// Train requests of one kind.
    #[must_use]
    pub fn trains_of(&self, kind: UnitKind) -> usize {
        self.trains().iter().filter(|(_, k)| *k == kind).count()
    }

    /// Casts as `(caster, target)`.
    #[must_use]
    pub fn casts(&self) -> Vec<(UnitId, UnitId)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                RecordedCommand::Cast { caster, target, .. } => Some((caster, target)),
                _ => None,
            })
            .collect()
    }

    /// Move orders.
    #[must_use]
    pub fn moves(&self) -> Vec<(UnitId, Vec2Fixed)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                RecordedCommand::Move { unit, point } => Some((unit, point)),
                _ => None,
            })
            .collect()
    }

    /// Attack orders.
    #[must_use]
    pub fn attacks(&self) -> Vec<(UnitId, Target)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                RecordedCommand::Attack { unit, target } => Some((unit, target)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, command: RecordedCommand) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.commands.len() >= n) {
            return Err(AgentError::CommandRejected(format!("{command:?}")));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl CommandSink for RecordingSink {
    fn distribute_workers(&mut self) -> Result<()> {
        self.record(RecordedCommand::DistributeWorkers)
    }

    fn request_build(&mut self, kind: UnitKind, placement: Placement) -> Result<()> {
        self.record(RecordedCommand::Build { kind, placement })
    }

    fn request_train(&mut self, producer: UnitId, kind: UnitKind) -> Result<()> {
        self.record(RecordedCommand::Train { producer, kind })
    }

    fn can_cast(&self, caster: UnitId, _ability: Ability, _target: UnitId) -> bool {
        self.castable.contains(&caster)
    }

    fn request_cast(&mut self, caster: UnitId, ability: Ability, target: UnitId) -> Result<()> {
        self.record(RecordedCommand::Cast {
            caster,
            ability,
            target,
        })
    }

    fn request_move(&mut self, unit: UnitId, point: Vec2Fixed) -> Result<()> {
        self.record(RecordedCommand::Move { unit, point })
    }

    fn request_attack(&mut self, unit: UnitId, target: Target) -> Result<()> {
        self.record(RecordedCommand::Attack { unit, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut sink = RecordingSink::new();
        sink.distribute_workers().unwrap();
        sink.request_train(UnitId(1), UnitKind::Probe).unwrap();
        sink.request_attack(UnitId(2), Target::Unit(UnitId(9))).unwrap();
        assert_eq!(sink.commands.len(), 3);
        assert_eq!(sink.trains(), vec![(UnitId(1), UnitKind::Probe)]);
        assert_eq!(sink.attacks(), vec![(UnitId(2), Target::Unit(UnitId(9)))]);
    }

    #[test]
    fn test_fail_after() {
        let mut sink = RecordingSink {
            fail_after: Some(1),
            ..RecordingSink::default()
        };
        assert!(sink.distribute_workers().is_ok());
        assert!(matches!(
            sink.distribute_workers(),
            Err(AgentError::CommandRejected(_))
        ));
    }

    #[test]
    fn test_castable_set() {
        let sink = RecordingSink::with_casters([UnitId(4)]);
        assert!(sink.can_cast(UnitId(4), Ability::PriorityBoost, UnitId(1)));
        assert!(!sink.can_cast(UnitId(5), Ability::PriorityBoost, UnitId(1)));
    }
}
