//! Test fixtures and helpers.
//!
//! Pre-built snapshots and unit configurations for consistent testing.

use agent_core::math::Vec2Fixed;
use agent_core::snapshot::{
    EnemyRef, Geyser, MapSize, UnitId, UnitRef, WorldSnapshot, LOOPS_PER_MINUTE,
};
use agent_core::unit_kind::UnitKind;
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Game loop for a whole number of minutes.
#[must_use]
pub const fn minutes(m: u64) -> u64 {
    m * LOOPS_PER_MINUTE
}

/// Fluent builder for [`WorldSnapshot`].
///
/// Owned units get sequential ids starting at 1; enemies and geysers get
/// ids from a separate range starting at 10 000 so the two never collide.
///
/// ```
/// use agent_core::unit_kind::UnitKind;
/// use agent_test_utils::fixtures::SnapshotBuilder;
///
/// let snap = SnapshotBuilder::new()
///     .minerals(400)
///     .unit(UnitKind::Nexus, 30, 30)
///     .army(UnitKind::Stalker, 5, 40, 40)
///     .enemy_start(170, 140)
///     .build();
/// assert_eq!(snap.idle_combatants().len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: WorldSnapshot,
    next_owned: u64,
    next_foreign: u64,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Empty snapshot at loop 0 with 15/15 supply.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: WorldSnapshot {
                supply_used: 15,
                supply_cap: 15,
                ..WorldSnapshot::default()
            },
            next_owned: 1,
            next_foreign: 10_000,
        }
    }

    /// Set the loop counter.
    #[must_use]
    pub fn at_loop(mut self, game_loop: u64) -> Self {
        self.snapshot.game_loop = game_loop;
        self
    }

    /// Set the loop counter to a whole number of minutes.
    #[must_use]
    pub fn at_minute(self, m: u64) -> Self {
        self.at_loop(minutes(m))
    }

    /// Set minerals.
    #[must_use]
    pub fn minerals(mut self, minerals: u32) -> Self {
        self.snapshot.minerals = minerals;
        self
    }

    /// Set vespene.
    #[must_use]
    pub fn vespene(mut self, vespene: u32) -> Self {
        self.snapshot.vespene = vespene;
        self
    }

    /// Plenty of both resources.
    #[must_use]
    pub fn rich(self) -> Self {
        self.minerals(5000).vespene(5000)
    }

    /// Set supply used and cap.
    #[must_use]
    pub fn supply(mut self, used: u32, cap: u32) -> Self {
        self.snapshot.supply_used = used;
        self.snapshot.supply_cap = cap;
        self
    }

    /// Set the map size.
    #[must_use]
    pub fn map(mut self, width: u32, height: u32) -> Self {
        self.snapshot.map_size = MapSize { width, height };
        self
    }

    fn owned_id(&mut self) -> UnitId {
        let id = UnitId(self.next_owned);
        self.next_owned += 1;
        id
    }

    fn foreign_id(&mut self) -> UnitId {
        let id = UnitId(self.next_foreign);
        self.next_foreign += 1;
        id
    }

    /// Add a fully customised owned unit. Its id is kept as given.
    #[must_use]
    pub fn unit_ref(mut self, unit: UnitRef) -> Self {
        self.snapshot.units.push(unit);
        self
    }

    /// Add a ready, idle owned unit with an empty queue.
    #[must_use]
    pub fn unit(mut self, kind: UnitKind, x: i32, y: i32) -> Self {
        let id = self.owned_id();
        self.snapshot.units.push(ready_unit(id, kind, x, y));
        self
    }

    /// Add a ready unit with `energy`.
    #[must_use]
    pub fn unit_with_energy(mut self, kind: UnitKind, x: i32, y: i32, energy: u32) -> Self {
        let id = self.owned_id();
        self.snapshot.units.push(UnitRef {
            energy,
            ..ready_unit(id, kind, x, y)
        });
        self
    }

    /// Add an owned structure still under construction.
    #[must_use]
    pub fn constructing(mut self, kind: UnitKind, x: i32, y: i32) -> Self {
        let id = self.owned_id();
        self.snapshot.units.push(UnitRef {
            is_ready: false,
            is_idle: false,
            ..ready_unit(id, kind, x, y)
        });
        self
    }

    /// Add a ready structure that is busy producing.
    #[must_use]
    pub fn busy(mut self, kind: UnitKind, x: i32, y: i32) -> Self {
        let id = self.owned_id();
        self.snapshot.units.push(UnitRef {
            is_idle: false,
            queue_empty: false,
            ..ready_unit(id, kind, x, y)
        });
        self
    }

    /// Add `count` mining workers.
    #[must_use]
    pub fn workers(mut self, count: usize, x: i32, y: i32) -> Self {
        for _ in 0..count {
            let id = self.owned_id();
            self.snapshot.units.push(UnitRef {
                is_idle: false,
                is_gathering: true,
                ..ready_unit(id, UnitKind::Probe, x, y)
            });
        }
        self
    }

    /// Add `count` idle ready units of a kind at one point.
    #[must_use]
    pub fn army(mut self, kind: UnitKind, count: usize, x: i32, y: i32) -> Self {
        for _ in 0..count {
            let id = self.owned_id();
            self.snapshot.units.push(ready_unit(id, kind, x, y));
        }
        self
    }

    /// Add a known enemy unit.
    #[must_use]
    pub fn enemy_unit(mut self, x: i32, y: i32, is_combatant: bool) -> Self {
        let id = self.foreign_id();
        self.snapshot.enemy_units.push(EnemyRef {
            id,
            position: Vec2Fixed::from_ints(x, y),
            is_combatant,
        });
        self
    }

    /// Add a known enemy structure.
    #[must_use]
    pub fn enemy_structure(mut self, x: i32, y: i32) -> Self {
        let id = self.foreign_id();
        self.snapshot.enemy_structures.push(EnemyRef {
            id,
            position: Vec2Fixed::from_ints(x, y),
            is_combatant: false,
        });
        self
    }

    /// Add an enemy start location.
    #[must_use]
    pub fn enemy_start(mut self, x: i32, y: i32) -> Self {
        self.snapshot
            .enemy_start_locations
            .push(Vec2Fixed::from_ints(x, y));
        self
    }

    /// Add a vespene geyser.
    #[must_use]
    pub fn geyser(mut self, x: i32, y: i32) -> Self {
        let id = self.foreign_id();
        self.snapshot.geysers.push(Geyser {
            id,
            position: Vec2Fixed::from_ints(x, y),
        });
        self
    }

    /// Record `count` host-tracked pending requests of a kind.
    #[must_use]
    pub fn pending(mut self, kind: UnitKind, count: u32) -> Self {
        self.snapshot.pending.insert(kind, count);
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> WorldSnapshot {
        self.snapshot
    }
}

fn ready_unit(id: UnitId, kind: UnitKind, x: i32, y: i32) -> UnitRef {
    UnitRef {
        id,
        kind,
        position: Vec2Fixed::from_ints(x, y),
        is_idle: true,
        is_ready: true,
        queue_empty: true,
        is_gathering: false,
        energy: 0,
    }
}

/// A one-base opening: Nexus at (30, 30), twelve workers, two geysers,
/// enemy start at (170, 140).
#[must_use]
pub fn opening() -> WorldSnapshot {
    SnapshotBuilder::new()
        .minerals(50)
        .supply(12, 15)
        .unit(UnitKind::Nexus, 30, 30)
        .workers(12, 35, 30)
        .geyser(37, 37)
        .geyser(23, 37)
        .enemy_start(170, 140)
        .build()
}

/// Proptest strategies for snapshots.
pub mod strategies {
    use super::{minutes, SnapshotBuilder};
    use agent_core::math::{Fixed, Vec2Fixed};
    use agent_core::snapshot::WorldSnapshot;
    use agent_core::unit_kind::UnitKind;
    use proptest::prelude::*;

    /// Coordinate on the default 200 × 176 map.
    pub fn arb_coord() -> impl Strategy<Value = (i32, i32)> {
        (0i32..200, 0i32..176)
    }

    /// Fixed-point position on the default map.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        arb_coord().prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// Elapsed time in minutes, with sub-minute resolution.
    pub fn arb_elapsed() -> impl Strategy<Value = Fixed> {
        (0u32..60 * 100).prop_map(|h| Fixed::from_num(h) / Fixed::from_num(100))
    }

    /// Combat unit kind.
    pub fn arb_combat_kind() -> impl Strategy<Value = UnitKind> {
        prop_oneof![
            Just(UnitKind::Zealot),
            Just(UnitKind::Stalker),
            Just(UnitKind::VoidRay),
        ]
    }

    /// Snapshot with one base, an idle army of `0..max_army`, random enemy
    /// intel and a guaranteed enemy start location.
    pub fn arb_battlefield(max_army: usize) -> impl Strategy<Value = WorldSnapshot> {
        (
            1u64..30,
            0..max_army,
            arb_combat_kind(),
            proptest::collection::vec((arb_coord(), any::<bool>()), 0..6),
            proptest::collection::vec(arb_coord(), 0..4),
            arb_coord(),
        )
            .prop_map(|(minute, army, kind, enemies, structures, start)| {
                let mut b = SnapshotBuilder::new()
                    .at_loop(minutes(minute))
                    .supply(60, 100)
                    .unit(UnitKind::Nexus, 30, 30)
                    .army(kind, army, 45, 45);
                for ((x, y), combatant) in enemies {
                    b = b.enemy_unit(x, y, combatant);
                }
                for (x, y) in structures {
                    b = b.enemy_structure(x, y);
                }
                b.enemy_start(start.0, start.1).build()
            })
    }

    /// Snapshot with `bases` ready bases, random workers, resources and supply.
    pub fn arb_economy() -> impl Strategy<Value = WorldSnapshot> {
        (1usize..4, 0usize..70, 0u32..2000, 0u32..200, 0u32..40)
            .prop_map(|(bases, workers, minerals, used, headroom)| {
                let mut b = SnapshotBuilder::new()
                    .minerals(minerals)
                    .supply(used, (used + headroom).min(200));
                for i in 0..bases {
                    let offset = i32::try_from(i).unwrap_or(0) * 50;
                    b = b.unit(UnitKind::Nexus, 30 + offset, 30);
                }
                b.workers(workers, 35, 30).build()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::math::Fixed;

    #[test]
    fn test_builder_assigns_distinct_ids() {
        let snap = SnapshotBuilder::new()
            .unit(UnitKind::Nexus, 0, 0)
            .army(UnitKind::Zealot, 3, 1, 1)
            .enemy_unit(5, 5, true)
            .geyser(6, 6)
            .build();
        let mut ids: Vec<u64> = snap.units.iter().map(|u| u.id.0).collect();
        ids.extend(snap.enemy_units.iter().map(|e| e.id.0));
        ids.extend(snap.geysers.iter().map(|g| g.id.0));
        let len = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), len);
    }

    #[test]
    fn test_minutes_helper() {
        let snap = SnapshotBuilder::new().at_minute(4).build();
        assert_eq!(snap.elapsed_minutes(), fixed(4));
    }

    #[test]
    fn test_opening_shape() {
        let snap = opening();
        assert_eq!(snap.count_of(UnitKind::Probe), 12);
        assert_eq!(snap.geysers.len(), 2);
        assert_eq!(snap.supply_left(), 3);
        assert_eq!(fixed_f(0.5), Fixed::from_num(1) / Fixed::from_num(2));
    }
}
