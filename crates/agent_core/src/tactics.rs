//! Attack decisions for the idle army.
//!
//! Once per tick the [`TacticsManager`] looks at the idle combat units and
//! the known enemies and makes at most one decision, then fans the
//! resulting orders out to every idle combat unit.
//!
//! # Decision Flow
//!
//! ```text
//! no idle army ──────────────────────────────► nothing
//! elapsed <= cooldown ───────────────────────► nothing
//! otherwise, by mode:
//!   Escalation  count >= attack ─────────────► everyone at the fallback target
//!               count >= defend, enemy near ─► each unit at a random nearby enemy
//!               else ────────────────────────► Hold
//!   Choice      policy arg-max, or uniform ──► one of the four labels
//! Hold ──► cooldown = elapsed + jitter
//! ```
//!
//! An attack whose referent set is empty (no enemy near a base, no known
//! structure, no start location) issues nothing and is not an error.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{TacticsConfig, TacticsMode};
use crate::encoding::EncodedState;
use crate::error::Result;
use crate::facade::{CommandSink, Target};
use crate::math::{Fixed, Vec2Fixed};
use crate::policy::{self, PolicyModel};
use crate::snapshot::{EnemyRef, UnitId, WorldSnapshot};
use crate::tick::TickContext;
use crate::unit_kind::UnitKind;

/// The four attack labels. Indices are stable and match the one-hot
/// encoding used by training samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionChoice {
    /// Do nothing and wait out a cooldown.
    Hold = 0,
    /// Attack the enemy unit closest to one of our bases.
    AttackNearBase = 1,
    /// Attack a known enemy structure.
    AttackEnemyStructure = 2,
    /// Attack-move to the enemy start location.
    AttackEnemyStart = 3,
}

impl ActionChoice {
    /// Number of labels.
    pub const COUNT: usize = 4;

    /// All labels in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Hold,
        Self::AttackNearBase,
        Self::AttackEnemyStructure,
        Self::AttackEnemyStart,
    ];

    /// Stable label index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Label for an index, if in range.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// One-hot vector with a 1 at [`Self::index`].
    #[must_use]
    pub fn one_hot(self) -> [u8; Self::COUNT] {
        let mut out = [0; Self::COUNT];
        out[self.index()] = 1;
        out
    }
}

/// "Do not reconsider before" time, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CooldownTimer {
    until: Option<Fixed>,
}

impl CooldownTimer {
    /// A timer that has never been set.
    #[must_use]
    pub const fn new() -> Self {
        Self { until: None }
    }

    /// Whether decisions are still suppressed at `elapsed`.
    #[must_use]
    pub fn is_active(&self, elapsed: Fixed) -> bool {
        self.until.is_some_and(|until| elapsed <= until)
    }

    /// Suppress decisions until `until` (inclusive).
    pub fn set(&mut self, until: Fixed) {
        self.until = Some(until);
    }

    /// Current expiry, if any.
    #[must_use]
    pub const fn until(&self) -> Option<Fixed> {
        self.until
    }
}

/// Input for a policy-driven choice.
#[derive(Clone, Copy)]
pub struct PolicyInput<'a> {
    /// Frozen model.
    pub model: &'a dyn PolicyModel,
    /// This tick's encoded state.
    pub state: &'a EncodedState,
}

/// What the tactics manager decided this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Waiting; no reconsideration until `until`.
    Hold {
        /// Cooldown expiry in minutes.
        until: Fixed,
    },
    /// Attack orders issued.
    Attack {
        /// Label, when the decision came from a label choice.
        label: Option<ActionChoice>,
        /// Attack commands issued (zero when the referent set was empty).
        orders: usize,
    },
}

impl Decision {
    /// Label for sample logging. Escalation attacks carry no label.
    #[must_use]
    pub const fn label(&self) -> Option<ActionChoice> {
        match self {
            Self::Hold { .. } => Some(ActionChoice::Hold),
            Self::Attack { label, .. } => *label,
        }
    }

    /// Attack commands issued.
    #[must_use]
    pub const fn orders(&self) -> usize {
        match self {
            Self::Hold { .. } => 0,
            Self::Attack { orders, .. } => *orders,
        }
    }
}

/// Per-tick attack decision state machine.
#[derive(Debug, Clone)]
pub struct TacticsManager {
    config: TacticsConfig,
    cooldown: CooldownTimer,
}

impl TacticsManager {
    /// Create a manager with an unset cooldown.
    #[must_use]
    pub const fn new(config: TacticsConfig) -> Self {
        Self {
            config,
            cooldown: CooldownTimer::new(),
        }
    }

    /// Selection mode.
    #[must_use]
    pub const fn mode(&self) -> TacticsMode {
        self.config.mode
    }

    /// Current cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> CooldownTimer {
        self.cooldown
    }

    /// Decide and issue this tick's attack orders.
    ///
    /// Returns `None` when no decision was made (no idle army, or still on
    /// cooldown). `input` is only consulted in [`TacticsMode::Choice`].
    pub fn step<S, R>(
        &mut self,
        ctx: &mut TickContext<'_, S>,
        rng: &mut R,
        input: Option<PolicyInput<'_>>,
    ) -> Result<Option<Decision>>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        let idle: Vec<UnitId> = snap.idle_combatants().iter().map(|u| u.id).collect();
        if idle.is_empty() {
            return Ok(None);
        }
        let elapsed = snap.elapsed_minutes();
        if self.cooldown.is_active(elapsed) {
            return Ok(None);
        }

        let decision = match self.config.mode {
            TacticsMode::Escalation => self.escalate(ctx, rng, &idle)?,
            TacticsMode::Choice => {
                let choice = match input {
                    Some(input) => policy::choose(input.model, input.state)?,
                    None => random_choice(rng),
                };
                self.execute(ctx, rng, choice, &idle)?
            }
        };
        tracing::info!(
            mode = ?self.config.mode,
            ?decision,
            idle = idle.len(),
            elapsed = %elapsed,
            "tactics decision"
        );
        Ok(Some(decision))
    }

    /// Two-threshold rule: attack, defend near bases, or hold.
    fn escalate<S, R>(
        &mut self,
        ctx: &mut TickContext<'_, S>,
        rng: &mut R,
        idle: &[UnitId],
    ) -> Result<Decision>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        let count = u32::try_from(idle.len()).unwrap_or(u32::MAX);

        if count >= self.config.attack_threshold {
            let orders = match resolve_target(snap, rng) {
                Some(target) => {
                    ctx.attack_all(idle, target)?;
                    idle.len()
                }
                None => 0,
            };
            return Ok(Decision::Attack {
                label: None,
                orders,
            });
        }

        if count >= self.config.defend_threshold {
            let near = enemies_near_bases(snap, Fixed::from_num(self.config.defend_radius));
            if !near.is_empty() {
                for &unit in idle {
                    if let Some(enemy) = near.choose(rng) {
                        ctx.attack(unit, Target::Unit(enemy.id))?;
                    }
                }
                return Ok(Decision::Attack {
                    label: None,
                    orders: idle.len(),
                });
            }
        }

        Ok(self.hold(snap.elapsed_minutes(), rng))
    }

    /// Issue the orders for a label.
    fn execute<S, R>(
        &mut self,
        ctx: &mut TickContext<'_, S>,
        rng: &mut R,
        choice: ActionChoice,
        idle: &[UnitId],
    ) -> Result<Decision>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        let target = match choice {
            ActionChoice::Hold => return Ok(self.hold(snap.elapsed_minutes(), rng)),
            ActionChoice::AttackNearBase => closest_to_random_base(snap, rng),
            ActionChoice::AttackEnemyStructure => snap
                .enemy_structures
                .choose(rng)
                .map(|s| Target::Unit(s.id)),
            ActionChoice::AttackEnemyStart => snap
                .enemy_start_locations
                .first()
                .map(|&p| Target::Position(p)),
        };
        let orders = match target {
            Some(target) => {
                ctx.attack_all(idle, target)?;
                idle.len()
            }
            None => 0,
        };
        Ok(Decision::Attack {
            label: Some(choice),
            orders,
        })
    }

    fn hold<R: Rng + ?Sized>(&mut self, elapsed: Fixed, rng: &mut R) -> Decision {
        let (min, max) = (self.config.hold_jitter_min, self.config.hold_jitter_max);
        let hundredths = if max > min { rng.gen_range(min..max) } else { min };
        let until = elapsed.saturating_add(Fixed::from_num(hundredths) / Fixed::from_num(100));
        self.cooldown.set(until);
        Decision::Hold { until }
    }
}

fn random_choice<R: Rng + ?Sized>(rng: &mut R) -> ActionChoice {
    ActionChoice::ALL[rng.gen_range(0..ActionChoice::COUNT)]
}

/// Fallback chain: a random enemy combatant, else a random enemy
/// non-combat unit, else a random enemy structure, else the first enemy
/// start location.
///
/// Always `Some` when the snapshot has a start location.
pub fn resolve_target<R: Rng + ?Sized>(snap: &WorldSnapshot, rng: &mut R) -> Option<Target> {
    let (combatants, others): (Vec<&EnemyRef>, Vec<&EnemyRef>) =
        snap.enemy_units.iter().partition(|e| e.is_combatant);
    let structures: Vec<&EnemyRef> = snap.enemy_structures.iter().collect();

    pick_unit(&combatants, rng)
        .or_else(|| pick_unit(&others, rng))
        .or_else(|| pick_unit(&structures, rng))
        .or_else(|| snap.enemy_start_locations.first().map(|&p| Target::Position(p)))
}

fn pick_unit<R: Rng + ?Sized>(pool: &[&EnemyRef], rng: &mut R) -> Option<Target> {
    pool.choose(rng).map(|e| Target::Unit(e.id))
}

/// Known enemy units strictly within `radius` of any ready base.
#[must_use]
pub fn enemies_near_bases(snap: &WorldSnapshot, radius: Fixed) -> Vec<&EnemyRef> {
    let bases: Vec<Vec2Fixed> = snap.ready_of(UnitKind::Nexus).map(|n| n.position).collect();
    snap.enemy_units
        .iter()
        .filter(|e| bases.iter().any(|&b| e.position.is_closer_than(radius, b)))
        .collect()
}

/// The enemy unit closest to a randomly chosen ready base.
fn closest_to_random_base<R: Rng + ?Sized>(snap: &WorldSnapshot, rng: &mut R) -> Option<Target> {
    let bases: Vec<Vec2Fixed> = snap.ready_of(UnitKind::Nexus).map(|n| n.position).collect();
    let &base = bases.choose(rng)?;
    snap.enemy_units
        .iter()
        .min_by_key(|e| (e.position.distance_squared(base), e.id))
        .map(|e| Target::Unit(e.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as AgentResult;
    use crate::facade::{Ability, Placement};
    use crate::policy::LinearPolicy;
    use crate::snapshot::{UnitRef, LOOPS_PER_MINUTE};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Default)]
    struct Attacks(Vec<(UnitId, Target)>);

    impl CommandSink for Attacks {
        fn distribute_workers(&mut self) -> AgentResult<()> {
            Ok(())
        }
        fn request_build(&mut self, _: UnitKind, _: Placement) -> AgentResult<()> {
            Ok(())
        }
        fn request_train(&mut self, _: UnitId, _: UnitKind) -> AgentResult<()> {
            Ok(())
        }
        fn can_cast(&self, _: UnitId, _: Ability, _: UnitId) -> bool {
            false
        }
        fn request_cast(&mut self, _: UnitId, _: Ability, _: UnitId) -> AgentResult<()> {
            Ok(())
        }
        fn request_move(&mut self, _: UnitId, _: Vec2Fixed) -> AgentResult<()> {
            Ok(())
        }
        fn request_attack(&mut self, unit: UnitId, target: Target) -> AgentResult<()> {
            self.0.push((unit, target));
            Ok(())
        }
    }

    fn owned(id: u64, kind: UnitKind, x: i32, y: i32) -> UnitRef {
        UnitRef {
            id: UnitId(id),
            kind,
            position: Vec2Fixed::from_ints(x, y),
            is_idle: true,
            is_ready: true,
            queue_empty: true,
            is_gathering: false,
            energy: 0,
        }
    }

    fn enemy(id: u64, x: i32, y: i32, is_combatant: bool) -> EnemyRef {
        EnemyRef {
            id: UnitId(id),
            position: Vec2Fixed::from_ints(x, y),
            is_combatant,
        }
    }

    /// A base at (30, 30), `army` idle void rays, five minutes in.
    fn world(army: u64) -> WorldSnapshot {
        let mut units = vec![owned(1, UnitKind::Nexus, 30, 30)];
        units.extend((0..army).map(|i| owned(100 + i, UnitKind::VoidRay, 40, 40)));
        WorldSnapshot {
            game_loop: 5 * LOOPS_PER_MINUTE,
            units,
            enemy_start_locations: vec![Vec2Fixed::from_ints(170, 140)],
            ..Default::default()
        }
    }

    fn escalation(attack: u32, defend: u32) -> TacticsManager {
        TacticsManager::new(TacticsConfig {
            attack_threshold: attack,
            defend_threshold: defend,
            ..TacticsConfig::default()
        })
    }

    fn run(
        tactics: &mut TacticsManager,
        snap: &WorldSnapshot,
        rng: &mut ChaCha8Rng,
    ) -> (Option<Decision>, Vec<(UnitId, Target)>) {
        let mut sink = Attacks::default();
        let mut ctx = TickContext::new(snap, &mut sink);
        let decision = tactics.step(&mut ctx, rng, None).unwrap();
        (decision, sink.0)
    }

    #[test]
    fn test_one_hot_matches_index() {
        for choice in ActionChoice::ALL {
            let hot = choice.one_hot();
            assert_eq!(hot.iter().map(|&b| u32::from(b)).sum::<u32>(), 1);
            assert_eq!(hot[choice.index()], 1);
            assert_eq!(ActionChoice::from_index(choice.index()), Some(choice));
        }
        assert_eq!(ActionChoice::from_index(4), None);
    }

    #[test]
    fn test_cooldown_timer_is_inclusive() {
        let mut timer = CooldownTimer::new();
        assert_eq!(timer, CooldownTimer::default());
        assert!(!timer.is_active(Fixed::ZERO));
        assert_eq!(timer.until(), None);

        let until = Fixed::from_num(3) + Fixed::from_num(7) / 100;
        timer.set(until);
        assert_eq!(timer.until(), Some(until));
        assert!(timer.is_active(Fixed::from_num(3)));
        assert!(timer.is_active(until));
        assert!(!timer.is_active(until + Fixed::DELTA));
    }

    #[test]
    fn test_no_idle_army_no_decision() {
        let mut snap = world(0);
        snap.enemy_units.push(enemy(900, 35, 35, true));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut tactics = escalation(1, 1);
        let (decision, attacks) = run(&mut tactics, &snap, &mut rng);
        assert!(decision.is_none());
        assert!(attacks.is_empty());
        assert_eq!(tactics.cooldown().until(), None);
    }

    #[test]
    fn test_full_attack_fans_out_to_all_idle() {
        let mut snap = world(20);
        snap.enemy_structures.push(enemy(900, 160, 130, false));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (decision, attacks) = run(&mut escalation(15, 3), &snap, &mut rng);

        assert_eq!(decision.map(|d| d.orders()), Some(20));
        assert_eq!(attacks.len(), 20);
        assert!(attacks.iter().all(|(_, t)| *t == Target::Unit(UnitId(900))));
    }

    #[test]
    fn test_defend_targets_only_nearby_enemy() {
        let mut snap = world(5);
        snap.enemy_units.push(enemy(900, 40, 30, true));
        snap.enemy_units.push(enemy(901, 150, 150, true));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (decision, attacks) = run(&mut escalation(15, 3), &snap, &mut rng);

        assert!(matches!(decision, Some(Decision::Attack { label: None, orders: 5 })));
        assert_eq!(attacks.len(), 5);
        assert!(attacks.iter().all(|(_, t)| *t == Target::Unit(UnitId(900))));
    }

    #[test]
    fn test_hold_sets_cooldown_and_blocks() {
        let mut snap = world(5);
        snap.enemy_units.push(enemy(901, 150, 150, true));
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut tactics = escalation(15, 3);
        let (decision, attacks) = run(&mut tactics, &snap, &mut rng);

        let Some(Decision::Hold { until }) = decision else {
            panic!("expected hold, got {decision:?}");
        };
        assert!(attacks.is_empty());
        let elapsed = snap.elapsed_minutes();
        assert!(until >= elapsed + Fixed::from_num(7) / Fixed::from_num(100));
        assert!(until < elapsed + Fixed::from_num(1));
        assert_eq!(tactics.cooldown().until(), Some(until));

        // Same tick again: still on cooldown.
        let (again, _) = run(&mut tactics, &snap, &mut rng);
        assert!(again.is_none());
    }

    #[test]
    fn test_choice_with_policy() {
        let snap = world(3);
        let mut model = LinearPolicy::zeros((8, 8, 3), 2);
        model.bias[ActionChoice::AttackEnemyStart.index()] = 3.0;
        let state = EncodedState::zeros(8, 8);
        let mut tactics = TacticsManager::new(TacticsConfig {
            mode: TacticsMode::Choice,
            ..TacticsConfig::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut sink = Attacks::default();
        let mut ctx = TickContext::new(&snap, &mut sink);
        let decision = tactics
            .step(
                &mut ctx,
                &mut rng,
                Some(PolicyInput {
                    model: &model,
                    state: &state,
                }),
            )
            .unwrap();

        assert_eq!(
            decision.and_then(|d| d.label()),
            Some(ActionChoice::AttackEnemyStart)
        );
        assert_eq!(sink.0.len(), 3);
        assert!(sink
            .0
            .iter()
            .all(|(_, t)| *t == Target::Position(Vec2Fixed::from_ints(170, 140))));
    }

    #[test]
    fn test_empty_referent_is_silent() {
        let snap = world(4);
        let mut tactics = TacticsManager::new(TacticsConfig {
            mode: TacticsMode::Choice,
            ..TacticsConfig::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut sink = Attacks::default();
        let mut ctx = TickContext::new(&snap, &mut sink);
        let decision = tactics
            .execute(&mut ctx, &mut rng, ActionChoice::AttackEnemyStructure, &[UnitId(100)])
            .unwrap();
        assert_eq!(
            decision,
            Decision::Attack {
                label: Some(ActionChoice::AttackEnemyStructure),
                orders: 0
            }
        );
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_near_base_picks_closest_enemy() {
        let mut snap = world(0);
        snap.enemy_units.push(enemy(900, 90, 90, false));
        snap.enemy_units.push(enemy(901, 50, 30, true));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(
            closest_to_random_base(&snap, &mut rng),
            Some(Target::Unit(UnitId(901)))
        );
    }

    #[test]
    fn test_fallback_chain_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut snap = world(0);
        assert_eq!(
            resolve_target(&snap, &mut rng),
            Some(Target::Position(Vec2Fixed::from_ints(170, 140)))
        );

        snap.enemy_structures.push(enemy(800, 160, 130, false));
        assert_eq!(resolve_target(&snap, &mut rng), Some(Target::Unit(UnitId(800))));

        snap.enemy_units.push(enemy(700, 100, 100, false));
        assert_eq!(resolve_target(&snap, &mut rng), Some(Target::Unit(UnitId(700))));

        snap.enemy_units.push(enemy(600, 100, 100, true));
        assert_eq!(resolve_target(&snap, &mut rng), Some(Target::Unit(UnitId(600))));
    }

    #[test]
    fn test_no_target_without_any_intel() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut snap = world(0);
        snap.enemy_start_locations.clear();
        assert_eq!(resolve_target(&snap, &mut rng), None);
    }
}
