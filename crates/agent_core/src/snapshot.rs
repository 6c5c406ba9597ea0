//! Read-only world view handed to the agent once per tick.
//!
//! The host engine fills a [`WorldSnapshot`] before every call to
//! [`crate::agent::Agent::on_step`]. Enemy information is whatever the
//! engine currently has vision of: it may be stale, partial, or empty.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};
use crate::unit_kind::UnitKind;

/// Game loops per real-time second at "faster" game speed.
pub const LOOPS_PER_SECOND: f64 = 22.4;

/// Game loops per minute (22.4 × 60).
pub const LOOPS_PER_MINUTE: u64 = 1344;

/// Supply cap ceiling; no further supply structures help past this.
pub const MAX_SUPPLY: u32 = 200;

/// Opaque handle for a unit, structure or map feature known to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One owned unit or structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    /// Host handle.
    pub id: UnitId,
    /// What it is.
    pub kind: UnitKind,
    /// Map position.
    pub position: Vec2Fixed,
    /// No current order.
    pub is_idle: bool,
    /// Construction complete.
    pub is_ready: bool,
    /// Production queue empty (structures only).
    pub queue_empty: bool,
    /// Worker currently mining or returning cargo.
    pub is_gathering: bool,
    /// Ability energy (priority boost casters).
    pub energy: u32,
}

/// A known enemy unit or structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyRef {
    /// Host handle.
    pub id: UnitId,
    /// Last known position.
    pub position: Vec2Fixed,
    /// Whether it can fight (workers and structures cannot).
    pub is_combatant: bool,
}

/// A vespene geyser that an extractor can be built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geyser {
    /// Host handle.
    pub id: UnitId,
    /// Map position.
    pub position: Vec2Fixed,
}

/// Playable map dimensions in map units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    /// Width (x extent).
    pub width: u32,
    /// Height (y extent).
    pub height: u32,
}

impl Default for MapSize {
    fn default() -> Self {
        Self {
            width: 200,
            height: 176,
        }
    }
}

impl MapSize {
    /// Upper-right corner as a vector.
    #[must_use]
    pub fn bounds(self) -> Vec2Fixed {
        Vec2Fixed::new(
            Fixed::saturating_from_num(self.width),
            Fixed::saturating_from_num(self.height),
        )
    }
}

/// Immutable per-tick view of the world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Monotonic game loop counter.
    pub game_loop: u64,
    /// Primary currency.
    pub minerals: u32,
    /// Secondary currency.
    pub vespene: u32,
    /// Supply in use.
    pub supply_used: u32,
    /// Supply provided.
    pub supply_cap: u32,
    /// Playable area.
    pub map_size: MapSize,
    /// Owned units and structures, including ones under construction.
    pub units: Vec<UnitRef>,
    /// Known enemy units.
    pub enemy_units: Vec<EnemyRef>,
    /// Known enemy structures.
    pub enemy_structures: Vec<EnemyRef>,
    /// Possible enemy spawn points; the first is the scouted one.
    pub enemy_start_locations: Vec<Vec2Fixed>,
    /// Vespene geysers on the map.
    pub geysers: Vec<Geyser>,
    /// Outstanding build/train requests by kind, as tracked by the host.
    pub pending: BTreeMap<UnitKind, u32>,
}

impl WorldSnapshot {
    /// Elapsed game time in minutes.
    #[must_use]
    pub fn elapsed_minutes(&self) -> Fixed {
        Fixed::saturating_from_num(self.game_loop) / Fixed::from_num(LOOPS_PER_MINUTE)
    }

    /// Supply headroom.
    #[must_use]
    pub const fn supply_left(&self) -> u32 {
        self.supply_cap.saturating_sub(self.supply_used)
    }

    /// All owned units of a kind.
    pub fn units_of(&self, kind: UnitKind) -> impl Iterator<Item = &UnitRef> + '_ {
        self.units.iter().filter(move |u| u.kind == kind)
    }

    /// Owned units of a kind that finished construction.
    pub fn ready_of(&self, kind: UnitKind) -> impl Iterator<Item = &UnitRef> + '_ {
        self.units_of(kind).filter(|u| u.is_ready)
    }

    /// Owned units of a kind with no current order.
    pub fn idle_of(&self, kind: UnitKind) -> impl Iterator<Item = &UnitRef> + '_ {
        self.units_of(kind).filter(|u| u.is_idle)
    }

    /// Ready structures of a kind with an empty production queue.
    pub fn ready_idle_producers(&self, kind: UnitKind) -> impl Iterator<Item = &UnitRef> + '_ {
        self.ready_of(kind).filter(|u| u.queue_empty)
    }

    /// Count of owned units of a kind, including ones under construction.
    #[must_use]
    pub fn count_of(&self, kind: UnitKind) -> usize {
        self.units_of(kind).count()
    }

    /// Count of ready units of a kind.
    #[must_use]
    pub fn ready_count(&self, kind: UnitKind) -> usize {
        self.ready_of(kind).count()
    }

    /// Whether at least one ready unit of a kind exists.
    #[must_use]
    pub fn has_ready(&self, kind: UnitKind) -> bool {
        self.ready_of(kind).next().is_some()
    }

    /// Outstanding requests of a kind tracked by the host.
    #[must_use]
    pub fn pending_count(&self, kind: UnitKind) -> u32 {
        self.pending.get(&kind).copied().unwrap_or(0)
    }

    /// Idle units that join army attacks.
    #[must_use]
    pub fn idle_combatants(&self) -> Vec<&UnitRef> {
        self.units
            .iter()
            .filter(|u| u.kind.is_combatant() && u.is_idle && u.is_ready)
            .collect()
    }

    /// Owned units of a kind strictly closer than `radius` to `point`.
    pub fn units_near(
        &self,
        kind: UnitKind,
        radius: Fixed,
        point: Vec2Fixed,
    ) -> impl Iterator<Item = &UnitRef> + '_ {
        self.units_of(kind)
            .filter(move |u| u.position.is_closer_than(radius, point))
    }

    /// Geysers strictly closer than `radius` to `point`.
    pub fn geysers_near(
        &self,
        radius: Fixed,
        point: Vec2Fixed,
    ) -> impl Iterator<Item = &Geyser> + '_ {
        self.geysers
            .iter()
            .filter(move |g| g.position.is_closer_than(radius, point))
    }

    /// Whether any enemy unit or structure is known.
    #[must_use]
    pub fn has_enemy_intel(&self) -> bool {
        !self.enemy_units.is_empty() || !self.enemy_structures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: u64, kind: UnitKind, ready: bool) -> UnitRef {
        UnitRef {
            id: UnitId(id),
            kind,
            position: Vec2Fixed::from_ints(10, 10),
            is_idle: true,
            is_ready: ready,
            queue_empty: true,
            is_gathering: false,
            energy: 0,
        }
    }

    #[test]
    fn test_elapsed_minutes() {
        let snap = WorldSnapshot {
            game_loop: LOOPS_PER_MINUTE * 3,
            ..Default::default()
        };
        assert_eq!(snap.elapsed_minutes(), Fixed::from_num(3));
        assert_eq!(WorldSnapshot::default().elapsed_minutes(), Fixed::ZERO);
    }

    #[test]
    fn test_supply_left_saturates() {
        let snap = WorldSnapshot {
            supply_used: 30,
            supply_cap: 23,
            ..Default::default()
        };
        assert_eq!(snap.supply_left(), 0);
    }

    #[test]
    fn test_ready_and_total_counts() {
        let snap = WorldSnapshot {
            units: vec![
                unit(1, UnitKind::Gateway, true),
                unit(2, UnitKind::Gateway, false),
                unit(3, UnitKind::Pylon, true),
            ],
            ..Default::default()
        };
        assert_eq!(snap.count_of(UnitKind::Gateway), 2);
        assert_eq!(snap.ready_count(UnitKind::Gateway), 1);
        assert!(snap.has_ready(UnitKind::Pylon));
        assert!(!snap.has_ready(UnitKind::Nexus));
    }

    #[test]
    fn test_idle_combatants_excludes_workers_and_scouts() {
        let mut busy = unit(4, UnitKind::Stalker, true);
        busy.is_idle = false;
        let snap = WorldSnapshot {
            units: vec![
                unit(1, UnitKind::Probe, true),
                unit(2, UnitKind::Observer, true),
                unit(3, UnitKind::VoidRay, true),
                busy,
            ],
            ..Default::default()
        };
        let idle: Vec<_> = snap.idle_combatants().iter().map(|u| u.id).collect();
        assert_eq!(idle, vec![UnitId(3)]);
    }
}
