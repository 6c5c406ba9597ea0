//! Closed unit identity system.
//!
//! This module provides a single source of truth for what the agent can
//! own, build and train:
//! - [`UnitKind`]: every unit and structure the managers reason about
//! - [`UnitRole`]: bitflags for fast classification queries
//! - [`Cost`]: mineral, vespene and supply price of a kind
//!
//! Every property is an exhaustive `match` so adding a kind forces each
//! manager-facing table to be updated.

use serde::{Deserialize, Serialize};

/// Every unit or structure kind the agent owns, builds or trains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Primary base: trains workers, receives resources, casts boosts.
    Nexus,
    /// Supply structure; also powers nearby production.
    Pylon,
    /// Gas extractor built on a vespene geyser.
    Assimilator,
    /// Ground production structure.
    Gateway,
    /// Tech-core unlocking mid-tier production.
    CyberneticsCore,
    /// Upgrade structure on the special-tech branch.
    Forge,
    /// Robotic production structure on the special-tech branch.
    RoboticsFacility,
    /// Flight production structure.
    Stargate,
    /// Worker.
    Probe,
    /// Light melee combat unit.
    Zealot,
    /// Ranged ground combat unit.
    Stalker,
    /// Capital air combat unit.
    VoidRay,
    /// Cloaked reconnaissance unit.
    Observer,
}

impl UnitKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Nexus,
        Self::Pylon,
        Self::Assimilator,
        Self::Gateway,
        Self::CyberneticsCore,
        Self::Forge,
        Self::RoboticsFacility,
        Self::Stargate,
        Self::Probe,
        Self::Zealot,
        Self::Stalker,
        Self::VoidRay,
        Self::Observer,
    ];

    /// Price of one instance of this kind.
    #[must_use]
    pub const fn cost(self) -> Cost {
        match self {
            Self::Nexus => Cost::new(400, 0, 0),
            Self::Pylon => Cost::new(100, 0, 0),
            Self::Assimilator => Cost::new(75, 0, 0),
            Self::Gateway => Cost::new(150, 0, 0),
            Self::CyberneticsCore => Cost::new(150, 0, 0),
            Self::Forge => Cost::new(150, 0, 0),
            Self::RoboticsFacility => Cost::new(150, 100, 0),
            Self::Stargate => Cost::new(150, 150, 0),
            Self::Probe => Cost::new(50, 0, 1),
            Self::Zealot => Cost::new(100, 0, 2),
            Self::Stalker => Cost::new(125, 50, 2),
            Self::VoidRay => Cost::new(250, 150, 4),
            Self::Observer => Cost::new(25, 75, 1),
        }
    }

    /// Classification flags for this kind.
    #[must_use]
    pub const fn role(self) -> UnitRole {
        match self {
            Self::Nexus => UnitRole::STRUCTURE
                .union(UnitRole::PRODUCER)
                .union(UnitRole::BASE),
            Self::Gateway | Self::RoboticsFacility | Self::Stargate => {
                UnitRole::STRUCTURE.union(UnitRole::PRODUCER)
            }
            Self::Pylon | Self::Assimilator | Self::CyberneticsCore | Self::Forge => {
                UnitRole::STRUCTURE
            }
            Self::Probe => UnitRole::WORKER.union(UnitRole::GROUND),
            Self::Zealot | Self::Stalker => UnitRole::COMBATANT.union(UnitRole::GROUND),
            Self::VoidRay => UnitRole::COMBATANT.union(UnitRole::AIR),
            Self::Observer => UnitRole::SCOUT.union(UnitRole::AIR),
        }
    }

    /// Structure that trains this kind, if it is a trainable unit.
    #[must_use]
    pub const fn trained_by(self) -> Option<Self> {
        match self {
            Self::Probe => Some(Self::Nexus),
            Self::Zealot | Self::Stalker => Some(Self::Gateway),
            Self::VoidRay => Some(Self::Stargate),
            Self::Observer => Some(Self::RoboticsFacility),
            Self::Nexus
            | Self::Pylon
            | Self::Assimilator
            | Self::Gateway
            | Self::CyberneticsCore
            | Self::Forge
            | Self::RoboticsFacility
            | Self::Stargate => None,
        }
    }

    /// Whether this kind is a structure.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        self.role().contains(UnitRole::STRUCTURE)
    }

    /// Whether this kind fights in army attacks.
    #[must_use]
    pub const fn is_combatant(self) -> bool {
        self.role().contains(UnitRole::COMBATANT)
    }
}

/// Price of a build or train request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Primary currency.
    pub minerals: u32,
    /// Secondary currency.
    pub vespene: u32,
    /// Supply consumed while the unit lives.
    pub supply: u32,
}

impl Cost {
    /// Create a cost.
    #[must_use]
    pub const fn new(minerals: u32, vespene: u32, supply: u32) -> Self {
        Self {
            minerals,
            vespene,
            supply,
        }
    }

    /// Nothing.
    pub const ZERO: Self = Self::new(0, 0, 0);
}

impl std::ops::Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            minerals: self.minerals + rhs.minerals,
            vespene: self.vespene + rhs.vespene,
            supply: self.supply + rhs.supply,
        }
    }
}

impl std::ops::AddAssign for Cost {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Bitflags for fast unit classification queries.
///
/// # Example
///
/// ```
/// use agent_core::unit_kind::{UnitKind, UnitRole};
///
/// let role = UnitKind::VoidRay.role();
/// assert!(role.contains(UnitRole::COMBATANT));
/// assert!(role.intersects(UnitRole::AIR));
/// assert!(!role.contains(UnitRole::STRUCTURE));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UnitRole(u32);

impl UnitRole {
    /// Moves on ground.
    pub const GROUND: Self = Self(1 << 0);
    /// Flies.
    pub const AIR: Self = Self(1 << 1);
    /// Immobile building.
    pub const STRUCTURE: Self = Self(1 << 2);
    /// Trains units.
    pub const PRODUCER: Self = Self(1 << 3);
    /// Primary base.
    pub const BASE: Self = Self(1 << 4);
    /// Harvests and constructs.
    pub const WORKER: Self = Self(1 << 5);
    /// Joins army attacks.
    pub const COMBATANT: Self = Self(1 << 6);
    /// Reconnaissance.
    pub const SCOUT: Self = Self(1 << 7);

    /// Empty role (no flags set).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if all flags in `other` are set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any flags in `other` are set in `self`.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combine two roles (union of flags).
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for UnitRole {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_unit_has_a_producer() {
        for kind in UnitKind::ALL {
            if kind.is_structure() {
                assert!(kind.trained_by().is_none(), "{kind:?}");
            } else {
                let producer = kind.trained_by().expect("units are trainable");
                assert!(producer.role().contains(UnitRole::PRODUCER));
            }
        }
    }

    #[test]
    fn test_combatants() {
        let combat: Vec<_> = UnitKind::ALL
            .into_iter()
            .filter(|k| k.is_combatant())
            .collect();
        assert_eq!(
            combat,
            vec![UnitKind::Zealot, UnitKind::Stalker, UnitKind::VoidRay]
        );
    }

    #[test]
    fn test_structures_cost_no_supply() {
        for kind in UnitKind::ALL.into_iter().filter(|k| k.is_structure()) {
            assert_eq!(kind.cost().supply, 0);
        }
    }

    #[test]
    fn test_cost_addition() {
        let mut total = Cost::ZERO;
        total += UnitKind::VoidRay.cost();
        total += UnitKind::Probe.cost();
        assert_eq!(total, Cost::new(300, 150, 5));
    }
}
