//! Affordability and duplicate-request predicates.
//!
//! [`ResourceGate`] answers the two questions every production decision
//! asks: "can I pay for this now?" and "is one of these already on the
//! way?". It never mutates the snapshot. Same-tick commitments live in a
//! separate [`TickLedger`] so that two managers running in the same tick
//! do not both spend the same minerals or both request the same
//! prerequisite.

use std::collections::{BTreeMap, BTreeSet};

use crate::snapshot::{UnitId, WorldSnapshot};
use crate::unit_kind::{Cost, UnitKind};

/// Commitments made earlier in the current tick.
///
/// Reset at the start of every tick; never carried across ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickLedger {
    committed: Cost,
    requested: BTreeMap<UnitKind, u32>,
    boost_casters: BTreeSet<UnitId>,
}

impl TickLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request for one `kind`, reserving its cost.
    pub fn commit(&mut self, kind: UnitKind) {
        self.committed += kind.cost();
        *self.requested.entry(kind).or_insert(0) += 1;
    }

    /// Total cost reserved this tick.
    #[must_use]
    pub const fn committed(&self) -> Cost {
        self.committed
    }

    /// Requests of `kind` made this tick.
    #[must_use]
    pub fn requested(&self, kind: UnitKind) -> u32 {
        self.requested.get(&kind).copied().unwrap_or(0)
    }

    /// Record that `caster` spent its boost this tick.
    pub fn mark_boost(&mut self, caster: UnitId) {
        self.boost_casters.insert(caster);
    }

    /// Whether `caster` already spent its boost this tick.
    #[must_use]
    pub fn has_boosted(&self, caster: UnitId) -> bool {
        self.boost_casters.contains(&caster)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Read-only affordability view over a snapshot plus same-tick commitments.
#[derive(Debug, Clone, Copy)]
pub struct ResourceGate<'a> {
    snapshot: &'a WorldSnapshot,
    ledger: &'a TickLedger,
}

impl<'a> ResourceGate<'a> {
    /// Create a gate.
    #[must_use]
    pub const fn new(snapshot: &'a WorldSnapshot, ledger: &'a TickLedger) -> Self {
        Self { snapshot, ledger }
    }

    /// Whether `cost` can be paid from what is left this tick.
    ///
    /// Supply is only checked when the cost carries supply.
    #[must_use]
    pub fn can_afford(&self, cost: Cost) -> bool {
        let spent = self.ledger.committed();
        let minerals_ok = u64::from(self.snapshot.minerals)
            >= u64::from(spent.minerals) + u64::from(cost.minerals);
        let vespene_ok = u64::from(self.snapshot.vespene)
            >= u64::from(spent.vespene) + u64::from(cost.vespene);
        let supply_ok = cost.supply == 0
            || u64::from(self.snapshot.supply_left())
                >= u64::from(spent.supply) + u64::from(cost.supply);
        minerals_ok && vespene_ok && supply_ok
    }

    /// Shorthand for [`Self::can_afford`] with a kind's cost.
    #[must_use]
    pub fn can_afford_kind(&self, kind: UnitKind) -> bool {
        self.can_afford(kind.cost())
    }

    /// Whether a request for `kind` is outstanding at the host or was made
    /// earlier this tick.
    #[must_use]
    pub fn already_pending(&self, kind: UnitKind) -> bool {
        self.pending_count(kind) > 0
    }

    /// Outstanding plus same-tick requests for `kind`.
    #[must_use]
    pub fn pending_count(&self, kind: UnitKind) -> u32 {
        self.snapshot.pending_count(kind) + self.ledger.requested(kind)
    }

    /// Supply headroom left after same-tick commitments.
    #[must_use]
    pub fn supply_left(&self) -> u32 {
        self.snapshot
            .supply_left()
            .saturating_sub(self.ledger.committed().supply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(minerals: u32, vespene: u32, used: u32, cap: u32) -> WorldSnapshot {
        WorldSnapshot {
            minerals,
            vespene,
            supply_used: used,
            supply_cap: cap,
            ..Default::default()
        }
    }

    #[test]
    fn test_can_afford_reads_resources() {
        let snap = snapshot(150, 50, 10, 15);
        let ledger = TickLedger::new();
        let gate = ResourceGate::new(&snap, &ledger);

        assert!(gate.can_afford_kind(UnitKind::Gateway));
        assert!(gate.can_afford_kind(UnitKind::Stalker));
        assert!(!gate.can_afford_kind(UnitKind::Stargate));
    }

    #[test]
    fn test_supply_only_checked_for_units() {
        let snap = snapshot(1000, 1000, 15, 15);
        let ledger = TickLedger::new();
        let gate = ResourceGate::new(&snap, &ledger);

        assert!(!gate.can_afford_kind(UnitKind::Probe));
        assert!(gate.can_afford_kind(UnitKind::Pylon));
    }

    #[test]
    fn test_ledger_reserves_resources() {
        let snap = snapshot(200, 0, 0, 15);
        let mut ledger = TickLedger::new();
        ledger.commit(UnitKind::Gateway);
        let gate = ResourceGate::new(&snap, &ledger);

        assert!(gate.can_afford_kind(UnitKind::Probe));
        assert!(!gate.can_afford_kind(UnitKind::Pylon));
    }

    #[test]
    fn test_already_pending_combines_host_and_ledger() {
        let mut snap = snapshot(0, 0, 0, 0);
        snap.pending.insert(UnitKind::Pylon, 1);
        let mut ledger = TickLedger::new();
        ledger.commit(UnitKind::Gateway);
        let gate = ResourceGate::new(&snap, &ledger);

        assert!(gate.already_pending(UnitKind::Pylon));
        assert!(gate.already_pending(UnitKind::Gateway));
        assert!(!gate.already_pending(UnitKind::Stargate));
    }

    #[test]
    fn test_gate_does_not_mutate_snapshot() {
        let snap = snapshot(100, 0, 0, 15);
        let before = snap.clone();
        let ledger = TickLedger::new();
        let gate = ResourceGate::new(&snap, &ledger);
        let _ = gate.can_afford_kind(UnitKind::Nexus);
        let _ = gate.already_pending(UnitKind::Nexus);
        assert_eq!(snap, before);
    }

    #[test]
    fn test_boost_marks_clear() {
        let mut ledger = TickLedger::new();
        ledger.mark_boost(UnitId(7));
        assert!(ledger.has_boosted(UnitId(7)));
        ledger.clear();
        assert!(!ledger.has_boosted(UnitId(7)));
        assert_eq!(ledger.committed(), Cost::ZERO);
    }
}
