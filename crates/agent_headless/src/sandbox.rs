//! Coarse single-player stand-in engine.
//!
//! [`SandboxWorld`] implements [`CommandSink`] and renders a
//! [`WorldSnapshot`] on demand, so an [`agent_core::agent::Agent`] can play
//! whole sessions without a game client. Only what the managers read is
//! modelled:
//!
//! - mineral and vespene income per gathering worker
//! - construction and training timers, supply, and boost energy
//! - raider waves that appear near the home base and destroy one owned
//!   unit per strike interval until they are killed
//! - an enemy base at the start location, revealed by scouting and worn
//!   down by attacks that reach it
//!
//! All randomness goes through a seeded `ChaCha8Rng` and all state lives in
//! ordered maps, so the same seed and the same commands replay exactly.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use agent_core::agent::SessionOutcome;
use agent_core::error::{AgentError, Result as AgentResult};
use agent_core::facade::{Ability, CommandSink, Placement, Target};
use agent_core::math::{Fixed, Vec2Fixed};
use agent_core::snapshot::{
    EnemyRef, Geyser, MapSize, UnitId, UnitRef, WorldSnapshot, LOOPS_PER_MINUTE, MAX_SUPPLY,
};
use agent_core::unit_kind::UnitKind;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{HeadlessError, Result};

// =============================================================================
// WORLD CONSTANTS
// =============================================================================

/// Game loops to cross one map tile.
pub const LOOPS_PER_TILE: u64 = 6;

/// Boost energy regenerated per base per minute.
const ENERGY_PER_MINUTE: u64 = 47;

/// Energy ceiling of a base.
const MAX_ENERGY: u32 = 200;

/// Energy a base starts with.
const STARTING_ENERGY: u32 = 50;

/// Energy cost of one priority boost.
const BOOST_COST: u32 = 50;

/// How long a boosted structure stays boosted.
const BOOST_LOOPS: u64 = 448;

/// Supply provided by a ready base.
const BASE_SUPPLY: u32 = 15;

/// Supply provided by a ready supply structure.
const PYLON_SUPPLY: u32 = 8;

/// Mineral workers a ready base can use.
const MINERAL_SLOTS_PER_BASE: usize = 16;

/// Gas workers a ready extractor can use.
const GAS_SLOTS_PER_EXTRACTOR: usize = 3;

/// Attacks landing this close to the enemy start count as base hits.
const ENEMY_BASE_RADIUS: i32 = 30;

/// Units arriving this close to the enemy start reveal its structures.
const REVEAL_RADIUS: i32 = 30;

/// Hits an enemy structure takes before it falls.
const OUTPOST_HP: u32 = 3;

/// Geysers placed around every base location.
const GEYSER_OFFSETS: [(i32, i32); 2] = [(7, 7), (-7, 7)];

/// First id handed to geysers.
const GEYSER_ID_BASE: u64 = 5_000;

/// First id handed to enemy units and structures.
const ENEMY_ID_BASE: u64 = 10_000;

/// Construction or training time in game loops.
#[must_use]
pub const fn build_loops(kind: UnitKind) -> u64 {
    match kind {
        UnitKind::Nexus => 1590,
        UnitKind::Pylon => 400,
        UnitKind::Assimilator => 470,
        UnitKind::Gateway => 1030,
        UnitKind::CyberneticsCore => 800,
        UnitKind::Forge => 710,
        UnitKind::RoboticsFacility => 1030,
        UnitKind::Stargate => 960,
        UnitKind::Probe => 270,
        UnitKind::Zealot | UnitKind::Stalker => 600,
        UnitKind::VoidRay => 830,
        UnitKind::Observer => 430,
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Sandbox map, economy and opponent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Map dimensions (width, height) in tiles.
    pub map_size: (u32, u32),
    /// Home base position.
    pub home: (i32, i32),
    /// Free base locations, claimed in order.
    pub expansions: Vec<(i32, i32)>,
    /// Enemy start location.
    pub enemy_start: (i32, i32),
    /// Enemy structures around the start location.
    pub enemy_structures: u32,
    /// Starting minerals.
    pub starting_minerals: u32,
    /// Starting workers.
    pub starting_workers: u32,
    /// Extra ready units placed next to the home base.
    pub starting_army: Vec<(UnitKind, u32)>,
    /// Minerals per mining worker per minute.
    pub mineral_rate: u32,
    /// Vespene per gas worker per minute.
    pub vespene_rate: u32,
    /// Minutes between raider waves (0 disables waves).
    pub wave_interval_minutes: u32,
    /// Raiders in the first wave.
    pub wave_size: u32,
    /// Extra raiders per later wave.
    pub wave_growth: u32,
    /// Loops between strikes of a surviving raider.
    pub strike_interval_loops: u64,
    /// Base hits needed to win.
    pub victory_hits: u32,
    /// Session length limit in game minutes.
    pub max_minutes: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            map_size: (200, 176),
            home: (30, 30),
            expansions: vec![(30, 80), (80, 30), (90, 90), (140, 40)],
            enemy_start: (170, 146),
            enemy_structures: 6,
            starting_minerals: 50,
            starting_workers: 12,
            starting_army: Vec::new(),
            mineral_rate: 55,
            vespene_rate: 53,
            wave_interval_minutes: 4,
            wave_size: 2,
            wave_growth: 1,
            strike_interval_loops: 448,
            victory_hits: 40,
            max_minutes: 30,
        }
    }
}

impl SandboxConfig {
    /// Load sandbox settings from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(HeadlessError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse sandbox settings from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Ok(ron::from_str(ron)?)
    }

    /// Session length limit in game loops.
    #[must_use]
    pub fn max_loops(&self) -> u64 {
        u64::from(self.max_minutes) * LOOPS_PER_MINUTE
    }

    fn map(&self) -> MapSize {
        MapSize {
            width: self.map_size.0,
            height: self.map_size.1,
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Counters the runner turns into session metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxStats {
    /// Commands accepted.
    pub commands: u64,
    /// Units finished, by kind.
    pub trained: BTreeMap<UnitKind, u32>,
    /// Structures started, by kind.
    pub started: BTreeMap<UnitKind, u32>,
    /// Boosts cast.
    pub boosts: u32,
    /// Attack orders accepted.
    pub attack_orders: u32,
    /// Attacks that reached the enemy base.
    pub base_hits: u32,
    /// Enemy structures destroyed.
    pub outposts_destroyed: u32,
    /// Raiders that appeared.
    pub raiders_spawned: u32,
    /// Raiders killed.
    pub raiders_killed: u32,
    /// Owned units destroyed or spent.
    pub units_lost: u32,
    /// Loop of the first expansion request.
    pub first_expansion_loop: Option<u64>,
    /// Loop of the first attack order.
    pub first_attack_loop: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Move(Vec2Fixed),
    Attack(Target),
}

#[derive(Debug, Clone, Copy)]
struct Order {
    action: Action,
    arrives_at: u64,
}

#[derive(Debug, Clone, Copy)]
struct Training {
    kind: UnitKind,
    done_at: u64,
}

#[derive(Debug, Clone)]
struct SimUnit {
    kind: UnitKind,
    position: Vec2Fixed,
    ready_at: u64,
    order: Option<Order>,
    training: Option<Training>,
    gathering: bool,
    energy: u32,
    energy_carry: u64,
    boosted_until: u64,
}

impl SimUnit {
    fn new(kind: UnitKind, position: Vec2Fixed, ready_at: u64) -> Self {
        Self {
            kind,
            position,
            ready_at,
            order: None,
            training: None,
            gathering: false,
            energy: if kind == UnitKind::Nexus { STARTING_ENERGY } else { 0 },
            energy_carry: 0,
            boosted_until: 0,
        }
    }

    fn is_ready(&self, now: u64) -> bool {
        self.ready_at <= now
    }

    fn is_idle(&self, now: u64) -> bool {
        self.is_ready(now) && self.order.is_none() && self.training.is_none() && !self.gathering
    }
}

#[derive(Debug, Clone, Copy)]
struct Raider {
    position: Vec2Fixed,
    next_strike: u64,
}

#[derive(Debug, Clone, Copy)]
struct Outpost {
    position: Vec2Fixed,
    hp: u32,
}

/// Deterministic single-player world.
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    config: SandboxConfig,
    rng: ChaCha8Rng,
    game_loop: u64,
    minerals: u32,
    vespene: u32,
    mineral_carry: u64,
    vespene_carry: u64,
    units: BTreeMap<UnitId, SimUnit>,
    geysers: Vec<Geyser>,
    raiders: BTreeMap<UnitId, Raider>,
    outposts: BTreeMap<UnitId, Outpost>,
    outposts_revealed: bool,
    next_owned: u64,
    next_enemy: u64,
    waves: u32,
    next_wave_at: Option<u64>,
    command_hash: u64,
    stats: SandboxStats,
}

impl SandboxWorld {
    /// Build the starting position for `seed`.
    #[must_use]
    pub fn new(config: SandboxConfig, seed: u64) -> Self {
        let mut world = Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            game_loop: 0,
            minerals: config.starting_minerals,
            vespene: 0,
            mineral_carry: 0,
            vespene_carry: 0,
            units: BTreeMap::new(),
            geysers: Vec::new(),
            raiders: BTreeMap::new(),
            outposts: BTreeMap::new(),
            outposts_revealed: false,
            next_owned: 1,
            next_enemy: ENEMY_ID_BASE,
            waves: 0,
            next_wave_at: (config.wave_interval_minutes > 0)
                .then(|| u64::from(config.wave_interval_minutes) * LOOPS_PER_MINUTE),
            command_hash: 0,
            stats: SandboxStats::default(),
            config,
        };
        world.populate();
        world
    }

    fn populate(&mut self) {
        let (hx, hy) = self.config.home;
        let mut geyser_id = GEYSER_ID_BASE;
        let bases: Vec<(i32, i32)> = std::iter::once(self.config.home)
            .chain(self.config.expansions.iter().copied())
            .collect();
        for (bx, by) in bases {
            for (dx, dy) in GEYSER_OFFSETS {
                self.geysers.push(Geyser {
                    id: UnitId(geyser_id),
                    position: Vec2Fixed::from_ints(bx + dx, by + dy),
                });
                geyser_id += 1;
            }
        }

        self.spawn(UnitKind::Nexus, Vec2Fixed::from_ints(hx, hy), 0);
        for _ in 0..self.config.starting_workers {
            let id = self.spawn(UnitKind::Probe, Vec2Fixed::from_ints(hx + 5, hy), 0);
            if let Some(probe) = self.units.get_mut(&id) {
                probe.gathering = true;
            }
        }
        let army = self.config.starting_army.clone();
        for (kind, count) in army {
            for _ in 0..count {
                self.spawn(kind, Vec2Fixed::from_ints(hx + 10, hy + 10), 0);
            }
        }

        let (ex, ey) = self.config.enemy_start;
        for _ in 0..self.config.enemy_structures {
            let dx = self.rng.gen_range(-8..=8);
            let dy = self.rng.gen_range(-8..=8);
            let id = self.enemy_id();
            let position = self.clamp(Vec2Fixed::from_ints(ex + dx, ey + dy));
            self.outposts.insert(
                id,
                Outpost {
                    position,
                    hp: OUTPOST_HP,
                },
            );
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current game loop.
    #[must_use]
    pub const fn game_loop(&self) -> u64 {
        self.game_loop
    }

    /// Session counters so far.
    #[must_use]
    pub const fn stats(&self) -> &SandboxStats {
        &self.stats
    }

    /// Settings this world was built from.
    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Running hash over every accepted command and the loop it arrived on.
    #[must_use]
    pub const fn command_hash(&self) -> u64 {
        self.command_hash
    }

    /// Hash of the observable world state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.game_loop.hash(&mut hasher);
        self.minerals.hash(&mut hasher);
        self.vespene.hash(&mut hasher);
        for (id, unit) in &self.units {
            (id, unit.kind, unit.position, unit.ready_at).hash(&mut hasher);
        }
        for (id, raider) in &self.raiders {
            (id, raider.position).hash(&mut hasher);
        }
        for (id, outpost) in &self.outposts {
            (id, outpost.hp).hash(&mut hasher);
        }
        self.stats.base_hits.hash(&mut hasher);
        hasher.finish()
    }

    /// Owned units of a kind, including ones under construction.
    #[must_use]
    pub fn owned_count(&self, kind: UnitKind) -> usize {
        self.units.values().filter(|u| u.kind == kind).count()
    }

    /// Raiders currently alive.
    #[must_use]
    pub fn raider_count(&self) -> usize {
        self.raiders.len()
    }

    /// Supply used by owned units and queued training.
    #[must_use]
    pub fn supply_used(&self) -> u32 {
        self.units
            .values()
            .map(|u| u.kind.cost().supply + u.training.map_or(0, |t| t.kind.cost().supply))
            .sum()
    }

    /// Supply provided by ready bases and supply structures.
    #[must_use]
    pub fn supply_cap(&self) -> u32 {
        let now = self.game_loop;
        let provided: u32 = self
            .units
            .values()
            .filter(|u| u.is_ready(now))
            .map(|u| match u.kind {
                UnitKind::Nexus => BASE_SUPPLY,
                UnitKind::Pylon => PYLON_SUPPLY,
                _ => 0,
            })
            .sum();
        provided.min(MAX_SUPPLY)
    }

    /// How the session ended, if it has.
    #[must_use]
    pub fn outcome(&self) -> Option<SessionOutcome> {
        if self.stats.base_hits >= self.config.victory_hits {
            Some(SessionOutcome::Victory)
        } else if self.owned_count(UnitKind::Nexus) == 0 {
            Some(SessionOutcome::Defeat)
        } else if self.game_loop >= self.config.max_loops() {
            Some(SessionOutcome::Tie)
        } else {
            None
        }
    }

    /// Render what the agent can see right now.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let now = self.game_loop;
        let mut pending = BTreeMap::new();
        let mut units = Vec::with_capacity(self.units.len());
        for (&id, unit) in &self.units {
            let ready = unit.is_ready(now);
            if !ready {
                *pending.entry(unit.kind).or_insert(0) += 1;
            }
            if let Some(training) = unit.training {
                *pending.entry(training.kind).or_insert(0) += 1;
            }
            units.push(UnitRef {
                id,
                kind: unit.kind,
                position: unit.position,
                is_idle: unit.is_idle(now),
                is_ready: ready,
                queue_empty: unit.training.is_none(),
                is_gathering: unit.gathering,
                energy: unit.energy,
            });
        }

        let enemy_units = self
            .raiders
            .iter()
            .map(|(&id, raider)| EnemyRef {
                id,
                position: raider.position,
                is_combatant: true,
            })
            .collect();
        let enemy_structures = if self.outposts_revealed {
            self.outposts
                .iter()
                .map(|(&id, outpost)| EnemyRef {
                    id,
                    position: outpost.position,
                    is_combatant: false,
                })
                .collect()
        } else {
            Vec::new()
        };

        let (ex, ey) = self.config.enemy_start;
        WorldSnapshot {
            game_loop: now,
            minerals: self.minerals,
            vespene: self.vespene,
            supply_used: self.supply_used(),
            supply_cap: self.supply_cap(),
            map_size: self.config.map(),
            units,
            enemy_units,
            enemy_structures,
            enemy_start_locations: vec![Vec2Fixed::from_ints(ex, ey)],
            geysers: self.geysers.clone(),
            pending,
        }
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    /// Run the world forward by `loops` game loops.
    ///
    /// Income and energy accrue from the state at the start of the step;
    /// timers, arrivals and raids resolve at its end.
    pub fn advance(&mut self, loops: u64) {
        self.collect_income(loops);
        self.regenerate_energy(loops);
        self.game_loop = self.game_loop.saturating_add(loops);
        self.finish_training();
        self.resolve_orders();
        self.spawn_waves();
        self.raider_strikes();
    }

    fn collect_income(&mut self, loops: u64) {
        let now = self.game_loop;
        let gatherers = self
            .units
            .values()
            .filter(|u| u.kind == UnitKind::Probe && u.gathering)
            .count();
        let ready = |kind: UnitKind| {
            self.units
                .values()
                .filter(|u| u.kind == kind && u.is_ready(now))
                .count()
        };
        let gas_workers = gatherers.min(ready(UnitKind::Assimilator) * GAS_SLOTS_PER_EXTRACTOR);
        let mineral_workers =
            (gatherers - gas_workers).min(ready(UnitKind::Nexus) * MINERAL_SLOTS_PER_BASE);

        let minerals = accrue(
            &mut self.mineral_carry,
            mineral_workers as u64 * u64::from(self.config.mineral_rate),
            loops,
        );
        let vespene = accrue(
            &mut self.vespene_carry,
            gas_workers as u64 * u64::from(self.config.vespene_rate),
            loops,
        );
        self.minerals = self.minerals.saturating_add(minerals);
        self.vespene = self.vespene.saturating_add(vespene);
    }

    fn regenerate_energy(&mut self, loops: u64) {
        let now = self.game_loop;
        for unit in self.units.values_mut() {
            if unit.kind != UnitKind::Nexus || !unit.is_ready(now) {
                continue;
            }
            let gained = accrue(&mut unit.energy_carry, ENERGY_PER_MINUTE, loops);
            unit.energy = unit.energy.saturating_add(gained).min(MAX_ENERGY);
        }
    }

    fn finish_training(&mut self) {
        let now = self.game_loop;
        let finished: Vec<(UnitId, UnitKind, Vec2Fixed)> = self
            .units
            .iter()
            .filter_map(|(&id, u)| {
                u.training
                    .filter(|t| t.done_at <= now)
                    .map(|t| (id, t.kind, u.position))
            })
            .collect();

        for (producer, kind, position) in finished {
            if let Some(unit) = self.units.get_mut(&producer) {
                unit.training = None;
            }
            let rally = self.clamp(position + Vec2Fixed::from_ints(2, 2));
            let id = self.spawn(kind, rally, now);
            *self.stats.trained.entry(kind).or_insert(0) += 1;
            tracing::trace!(%producer, %id, ?kind, "unit finished");
        }
    }

    fn resolve_orders(&mut self) {
        let now = self.game_loop;
        let arrived: Vec<(UnitId, Action)> = self
            .units
            .iter()
            .filter_map(|(&id, u)| {
                u.order
                    .filter(|o| o.arrives_at <= now)
                    .map(|o| (id, o.action))
            })
            .collect();

        for (id, action) in arrived {
            match action {
                Action::Move(point) => self.settle(id, point),
                Action::Attack(Target::Unit(target)) => {
                    if let Some(raider) = self.raiders.remove(&target) {
                        self.stats.raiders_killed += 1;
                        tracing::debug!(unit = %id, raider = %target, "raider killed");
                        self.settle(id, raider.position);
                    } else if self.outposts.contains_key(&target) {
                        self.hit_enemy_base(id, Some(target));
                    } else if let Some(unit) = self.units.get_mut(&id) {
                        unit.order = None;
                    }
                }
                Action::Attack(Target::Position(point)) => {
                    if self.near_enemy_start(point, ENEMY_BASE_RADIUS) {
                        self.hit_enemy_base(id, None);
                    } else {
                        self.settle(id, point);
                    }
                }
            }
        }
    }

    /// Finish an order at `point`.
    fn settle(&mut self, id: UnitId, point: Vec2Fixed) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.position = point;
            unit.order = None;
        }
        if !self.outposts_revealed && self.near_enemy_start(point, REVEAL_RADIUS) {
            self.outposts_revealed = true;
            tracing::debug!(scout = %id, "enemy base revealed");
        }
    }

    /// The attacker reaches the enemy base, lands one hit and is spent.
    fn hit_enemy_base(&mut self, attacker: UnitId, target: Option<UnitId>) {
        self.outposts_revealed = true;
        self.stats.base_hits += 1;
        let struck = target.or_else(|| self.outposts.keys().next().copied());
        if let Some(id) = struck {
            if let Some(outpost) = self.outposts.get_mut(&id) {
                outpost.hp = outpost.hp.saturating_sub(1);
                if outpost.hp == 0 {
                    self.outposts.remove(&id);
                    self.stats.outposts_destroyed += 1;
                }
            }
        }
        if self.units.remove(&attacker).is_some() {
            self.stats.units_lost += 1;
        }
        tracing::debug!(
            unit = %attacker,
            hits = self.stats.base_hits,
            needed = self.config.victory_hits,
            "attack reached enemy base"
        );
    }

    fn spawn_waves(&mut self) {
        let Some(mut due) = self.next_wave_at else {
            return;
        };
        let interval = u64::from(self.config.wave_interval_minutes) * LOOPS_PER_MINUTE;
        let (hx, hy) = self.config.home;
        while due <= self.game_loop {
            let size = self.config.wave_size + self.waves * self.config.wave_growth;
            self.waves += 1;
            for _ in 0..size {
                let dx = self.rng.gen_range(-10..=10);
                let dy = self.rng.gen_range(-10..=10);
                let id = self.enemy_id();
                let position = self.clamp(Vec2Fixed::from_ints(hx + dx, hy + dy));
                self.raiders.insert(
                    id,
                    Raider {
                        position,
                        next_strike: self.game_loop + self.config.strike_interval_loops,
                    },
                );
            }
            self.stats.raiders_spawned += size;
            tracing::info!(wave = self.waves, size, "raider wave arrived");
            due += interval;
        }
        self.next_wave_at = Some(due);
    }

    /// Every raider due to strike destroys the nearest owned unit,
    /// structures last.
    fn raider_strikes(&mut self) {
        let now = self.game_loop;
        let due: Vec<UnitId> = self
            .raiders
            .iter()
            .filter(|(_, r)| r.next_strike <= now)
            .map(|(&id, _)| id)
            .collect();

        for raider_id in due {
            let Some(raider) = self.raiders.get_mut(&raider_id) else {
                continue;
            };
            raider.next_strike = now + self.config.strike_interval_loops;
            let from = raider.position;
            let victim = self
                .units
                .iter()
                .min_by_key(|&(&id, u)| {
                    (u.kind.is_structure(), u.position.distance_squared(from), id)
                })
                .map(|(&id, _)| id);
            if let Some(id) = victim {
                if let Some(unit) = self.units.remove(&id) {
                    self.stats.units_lost += 1;
                    tracing::debug!(
                        raider = %raider_id,
                        victim = %id,
                        kind = ?unit.kind,
                        "raider strike"
                    );
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn spawn(&mut self, kind: UnitKind, position: Vec2Fixed, ready_at: u64) -> UnitId {
        let id = UnitId(self.next_owned);
        self.next_owned += 1;
        self.units.insert(id, SimUnit::new(kind, position, ready_at));
        id
    }

    fn enemy_id(&mut self) -> UnitId {
        let id = UnitId(self.next_enemy);
        self.next_enemy += 1;
        id
    }

    fn clamp(&self, point: Vec2Fixed) -> Vec2Fixed {
        point.clamp_to(self.config.map().bounds())
    }

    fn near_enemy_start(&self, point: Vec2Fixed, radius: i32) -> bool {
        let (ex, ey) = self.config.enemy_start;
        point.is_closer_than(Fixed::from_num(radius), Vec2Fixed::from_ints(ex, ey))
    }

    fn enemy_position(&self, id: UnitId) -> Option<Vec2Fixed> {
        self.raiders
            .get(&id)
            .map(|r| r.position)
            .or_else(|| self.outposts.get(&id).map(|o| o.position))
    }

    fn pay(&mut self, kind: UnitKind) -> AgentResult<()> {
        let cost = kind.cost();
        if self.minerals < cost.minerals || self.vespene < cost.vespene {
            return Err(AgentError::CommandRejected(format!("cannot afford {kind:?}")));
        }
        if cost.supply > 0 && self.supply_used() + cost.supply > self.supply_cap() {
            return Err(AgentError::CommandRejected(format!("no supply for {kind:?}")));
        }
        self.minerals -= cost.minerals;
        self.vespene -= cost.vespene;
        Ok(())
    }

    /// Fold an accepted command into the running command hash.
    fn record<T: Hash>(&mut self, command: &T) {
        let mut hasher = DefaultHasher::new();
        self.command_hash.hash(&mut hasher);
        self.game_loop.hash(&mut hasher);
        command.hash(&mut hasher);
        self.command_hash = hasher.finish();
        self.stats.commands += 1;
    }

    fn placement_position(
        &mut self,
        kind: UnitKind,
        placement: Placement,
    ) -> AgentResult<Vec2Fixed> {
        match placement {
            Placement::Near(anchor) => {
                let dx = self.rng.gen_range(-6..=6);
                let dy = self.rng.gen_range(-6..=6);
                Ok(self.clamp(anchor + Vec2Fixed::from_ints(dx, dy)))
            }
            Placement::OnGeyser { geyser, worker } => {
                if kind != UnitKind::Assimilator {
                    return Err(AgentError::CommandRejected(format!(
                        "{kind:?} cannot be built on a geyser"
                    )));
                }
                let position = self
                    .geysers
                    .iter()
                    .find(|g| g.id == geyser)
                    .map(|g| g.position)
                    .ok_or(AgentError::UnknownUnit(geyser.0))?;
                if !self
                    .units
                    .get(&worker)
                    .is_some_and(|w| w.kind == UnitKind::Probe)
                {
                    return Err(AgentError::UnknownUnit(worker.0));
                }
                if self
                    .units
                    .values()
                    .any(|u| u.kind == UnitKind::Assimilator && u.position == position)
                {
                    return Err(AgentError::CommandRejected(format!("geyser {geyser} is taken")));
                }
                Ok(position)
            }
            Placement::Expansion => {
                if kind != UnitKind::Nexus {
                    return Err(AgentError::CommandRejected(format!(
                        "{kind:?} cannot claim an expansion"
                    )));
                }
                let taken = |p: Vec2Fixed| {
                    self.units.values().any(|u| {
                        u.kind == UnitKind::Nexus
                            && u.position.is_closer_than(Fixed::from_num(10), p)
                    })
                };
                self.config
                    .expansions
                    .iter()
                    .map(|&(x, y)| Vec2Fixed::from_ints(x, y))
                    .find(|&p| !taken(p))
                    .ok_or_else(|| AgentError::CommandRejected("no free expansion".into()))
            }
        }
    }

    fn order(&mut self, id: UnitId, action: Action, destination: Vec2Fixed) -> AgentResult<()> {
        let now = self.game_loop;
        let destination = self.clamp(destination);
        let unit = self
            .units
            .get_mut(&id)
            .ok_or(AgentError::UnknownUnit(id.0))?;
        if unit.kind.is_structure() {
            return Err(AgentError::CommandRejected(format!("{id} is a structure")));
        }
        let action = match action {
            Action::Move(_) => Action::Move(destination),
            attack @ Action::Attack(_) => attack,
        };
        unit.gathering = false;
        unit.order = Some(Order {
            action,
            arrives_at: now + travel_loops(unit.position, destination),
        });
        Ok(())
    }
}

impl CommandSink for SandboxWorld {
    fn distribute_workers(&mut self) -> AgentResult<()> {
        let now = self.game_loop;
        for unit in self.units.values_mut() {
            if unit.kind == UnitKind::Probe && unit.is_idle(now) {
                unit.gathering = true;
            }
        }
        self.record(&"distribute");
        Ok(())
    }

    fn request_build(&mut self, kind: UnitKind, placement: Placement) -> AgentResult<()> {
        if !kind.is_structure() {
            return Err(AgentError::InvalidProduction {
                producer: UnitKind::Probe,
                kind,
            });
        }
        let position = self.placement_position(kind, placement)?;
        self.pay(kind)?;
        let id = self.spawn(kind, position, self.game_loop + build_loops(kind));
        *self.stats.started.entry(kind).or_insert(0) += 1;
        if placement == Placement::Expansion {
            self.stats.first_expansion_loop.get_or_insert(self.game_loop);
        }
        self.record(&(kind, placement));
        tracing::debug!(%id, ?kind, "construction started");
        Ok(())
    }

    fn request_train(&mut self, producer: UnitId, kind: UnitKind) -> AgentResult<()> {
        let now = self.game_loop;
        let (producer_kind, free) = self
            .units
            .get(&producer)
            .map(|u| (u.kind, u.is_ready(now) && u.training.is_none()))
            .ok_or(AgentError::UnknownUnit(producer.0))?;
        if kind.trained_by() != Some(producer_kind) {
            return Err(AgentError::InvalidProduction {
                producer: producer_kind,
                kind,
            });
        }
        if !free {
            return Err(AgentError::CommandRejected(format!("{producer} is busy")));
        }
        self.pay(kind)?;
        if let Some(unit) = self.units.get_mut(&producer) {
            unit.training = Some(Training {
                kind,
                done_at: now + build_loops(kind),
            });
        }
        self.record(&(producer, kind));
        Ok(())
    }

    fn can_cast(&self, caster: UnitId, ability: Ability, target: UnitId) -> bool {
        let now = self.game_loop;
        match ability {
            Ability::PriorityBoost => {
                let caster_ok = self.units.get(&caster).is_some_and(|c| {
                    c.kind == UnitKind::Nexus && c.is_ready(now) && c.energy >= BOOST_COST
                });
                let target_ok = self.units.get(&target).is_some_and(|t| {
                    t.kind.is_structure() && t.is_ready(now) && t.boosted_until <= now
                });
                caster_ok && target_ok
            }
        }
    }

    fn request_cast(
        &mut self,
        caster: UnitId,
        ability: Ability,
        target: UnitId,
    ) -> AgentResult<()> {
        if !self.can_cast(caster, ability, target) {
            return Err(AgentError::CommandRejected(format!(
                "{caster} cannot cast {ability:?} on {target}"
            )));
        }
        let now = self.game_loop;
        if let Some(unit) = self.units.get_mut(&caster) {
            unit.energy -= BOOST_COST;
        }
        if let Some(unit) = self.units.get_mut(&target) {
            unit.boosted_until = now + BOOST_LOOPS;
            if let Some(training) = unit.training.as_mut() {
                let remaining = training.done_at.saturating_sub(now);
                training.done_at -= remaining / 3;
            }
        }
        self.stats.boosts += 1;
        self.record(&(caster, ability, target));
        Ok(())
    }

    fn request_move(&mut self, unit: UnitId, point: Vec2Fixed) -> AgentResult<()> {
        self.order(unit, Action::Move(point), point)?;
        self.record(&(unit, point));
        Ok(())
    }

    fn request_attack(&mut self, unit: UnitId, target: Target) -> AgentResult<()> {
        let destination = match target {
            Target::Unit(id) => self
                .enemy_position(id)
                .ok_or(AgentError::UnknownUnit(id.0))?,
            Target::Position(point) => point,
        };
        self.order(unit, Action::Attack(target), destination)?;
        self.stats.attack_orders += 1;
        self.stats.first_attack_loop.get_or_insert(self.game_loop);
        self.record(&(unit, target));
        Ok(())
    }
}

/// Add `per_minute × loops` to a carry measured in 1/`LOOPS_PER_MINUTE`
/// units and return the whole units that became available.
fn accrue(carry: &mut u64, per_minute: u64, loops: u64) -> u32 {
    *carry = carry.saturating_add(per_minute.saturating_mul(loops));
    let whole = *carry / LOOPS_PER_MINUTE;
    *carry %= LOOPS_PER_MINUTE;
    u32::try_from(whole).unwrap_or(u32::MAX)
}

/// Chebyshev travel time between two points, at least one loop.
fn travel_loops(from: Vec2Fixed, to: Vec2Fixed) -> u64 {
    let dx = (from.x - to.x).abs();
    let dy = (from.y - to.y).abs();
    let tiles = dx.max(dy).ceil().to_num::<u64>();
    (tiles * LOOPS_PER_TILE).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SandboxConfig {
        SandboxConfig {
            wave_interval_minutes: 0,
            ..SandboxConfig::default()
        }
    }

    fn first_of(world: &SandboxWorld, kind: UnitKind) -> UnitId {
        world
            .snapshot()
            .units
            .iter()
            .find(|u| u.kind == kind)
            .map(|u| u.id)
            .unwrap()
    }

    #[test]
    fn test_starting_position() {
        let world = SandboxWorld::new(SandboxConfig::default(), 1);
        let snap = world.snapshot();
        assert_eq!(snap.count_of(UnitKind::Nexus), 1);
        assert_eq!(snap.count_of(UnitKind::Probe), 12);
        assert_eq!((snap.supply_used, snap.supply_cap), (12, 15));
        assert_eq!(snap.minerals, 50);
        assert_eq!(snap.geysers.len(), 10);
        assert_eq!(snap.enemy_start_locations, vec![Vec2Fixed::from_ints(170, 146)]);
        // Enemy structures stay hidden until scouted.
        assert!(snap.enemy_structures.is_empty());
        assert!(world.outcome().is_none());
    }

    #[test]
    fn test_income_per_minute() {
        let mut world = SandboxWorld::new(quiet(), 1);
        world.advance(LOOPS_PER_MINUTE);
        assert_eq!(world.snapshot().minerals, 50 + 12 * 55);
    }

    #[test]
    fn test_income_is_split_across_steps_without_loss() {
        let mut world = SandboxWorld::new(quiet(), 1);
        for _ in 0..(LOOPS_PER_MINUTE / 8) {
            world.advance(8);
        }
        assert_eq!(world.snapshot().minerals, 50 + 12 * 55);
    }

    #[test]
    fn test_train_worker_reserves_supply_until_done() {
        let mut world = SandboxWorld::new(quiet(), 1);
        let nexus = first_of(&world, UnitKind::Nexus);
        world.request_train(nexus, UnitKind::Probe).unwrap();

        let snap = world.snapshot();
        assert_eq!(snap.minerals, 0);
        assert_eq!(snap.supply_used, 13);
        assert_eq!(snap.pending_count(UnitKind::Probe), 1);
        assert!(!snap.units[0].queue_empty);

        world.advance(build_loops(UnitKind::Probe));
        let snap = world.snapshot();
        assert_eq!(snap.count_of(UnitKind::Probe), 13);
        assert_eq!(snap.pending_count(UnitKind::Probe), 0);
        assert_eq!(world.stats().trained[&UnitKind::Probe], 1);
    }

    #[test]
    fn test_new_worker_is_idle_until_distributed() {
        let mut world = SandboxWorld::new(quiet(), 1);
        let nexus = first_of(&world, UnitKind::Nexus);
        world.request_train(nexus, UnitKind::Probe).unwrap();
        world.advance(build_loops(UnitKind::Probe));
        let idle = |w: &SandboxWorld| w.snapshot().idle_of(UnitKind::Probe).count();
        assert_eq!(idle(&world), 1);
        world.distribute_workers().unwrap();
        assert_eq!(idle(&world), 0);
    }

    #[test]
    fn test_invalid_requests_are_errors() {
        let mut world = SandboxWorld::new(quiet(), 1);
        let nexus = first_of(&world, UnitKind::Nexus);
        assert!(matches!(
            world.request_train(nexus, UnitKind::Zealot),
            Err(AgentError::InvalidProduction { .. })
        ));
        assert!(matches!(
            world.request_train(UnitId(999), UnitKind::Probe),
            Err(AgentError::UnknownUnit(999))
        ));
        assert!(matches!(
            world.request_build(UnitKind::Nexus, Placement::Expansion),
            Err(AgentError::CommandRejected(_))
        ));
        assert!(matches!(
            world.request_attack(first_of(&world, UnitKind::Probe), Target::Unit(UnitId(77))),
            Err(AgentError::UnknownUnit(77))
        ));
        assert_eq!(world.stats().commands, 0);
    }

    #[test]
    fn test_construction_counts_as_pending() {
        let mut world = SandboxWorld::new(
            SandboxConfig {
                starting_minerals: 500,
                ..quiet()
            },
            1,
        );
        world
            .request_build(UnitKind::Pylon, Placement::Near(Vec2Fixed::from_ints(30, 30)))
            .unwrap();
        let snap = world.snapshot();
        assert_eq!(snap.pending_count(UnitKind::Pylon), 1);
        assert!(!snap.has_ready(UnitKind::Pylon));

        world.advance(build_loops(UnitKind::Pylon));
        let snap = world.snapshot();
        assert_eq!(snap.pending_count(UnitKind::Pylon), 0);
        assert_eq!(snap.supply_cap, 23);
    }

    #[test]
    fn test_extractor_on_geyser_and_gas_income() {
        let mut world = SandboxWorld::new(
            SandboxConfig {
                starting_minerals: 500,
                ..quiet()
            },
            1,
        );
        let snap = world.snapshot();
        let geyser = snap.geysers[0].id;
        let worker = first_of(&world, UnitKind::Probe);
        let placement = Placement::OnGeyser { geyser, worker };
        world.request_build(UnitKind::Assimilator, placement).unwrap();
        assert!(matches!(
            world.request_build(UnitKind::Assimilator, placement),
            Err(AgentError::CommandRejected(_))
        ));

        world.advance(build_loops(UnitKind::Assimilator));
        world.advance(LOOPS_PER_MINUTE);
        assert_eq!(world.snapshot().vespene, 3 * 53);
    }

    #[test]
    fn test_boost_spends_energy_and_speeds_training() {
        let mut world = SandboxWorld::new(quiet(), 1);
        let nexus = first_of(&world, UnitKind::Nexus);
        world.request_train(nexus, UnitKind::Probe).unwrap();
        assert!(world.can_cast(nexus, Ability::PriorityBoost, nexus));
        world
            .request_cast(nexus, Ability::PriorityBoost, nexus)
            .unwrap();
        assert!(!world.can_cast(nexus, Ability::PriorityBoost, nexus));
        assert_eq!(world.snapshot().units[0].energy, 0);

        world.advance(build_loops(UnitKind::Probe) * 2 / 3 + 1);
        assert_eq!(world.snapshot().count_of(UnitKind::Probe), 13);
    }

    #[test]
    fn test_energy_regenerates() {
        let mut world = SandboxWorld::new(quiet(), 1);
        world.advance(LOOPS_PER_MINUTE);
        assert_eq!(world.snapshot().units[0].energy, STARTING_ENERGY + 47);
    }

    #[test]
    fn test_scouting_reveals_enemy_structures() {
        let mut world = SandboxWorld::new(
            SandboxConfig {
                starting_army: vec![(UnitKind::Observer, 1)],
                ..quiet()
            },
            1,
        );
        let observer = first_of(&world, UnitKind::Observer);
        world
            .request_move(observer, Vec2Fixed::from_ints(165, 140))
            .unwrap();
        assert!(world.snapshot().enemy_structures.is_empty());
        world.advance(LOOPS_PER_TILE * 200);
        assert_eq!(world.snapshot().enemy_structures.len(), 6);
    }

    #[test]
    fn test_attacks_on_enemy_start_win() {
        let mut world = SandboxWorld::new(
            SandboxConfig {
                starting_army: vec![(UnitKind::Stalker, 3)],
                victory_hits: 3,
                ..quiet()
            },
            1,
        );
        let stalkers: Vec<UnitId> = world
            .snapshot()
            .idle_combatants()
            .iter()
            .map(|u| u.id)
            .collect();
        let start = world.snapshot().enemy_start_locations[0];
        for id in &stalkers {
            world.request_attack(*id, Target::Position(start)).unwrap();
        }
        assert!(world.outcome().is_none());
        world.advance(LOOPS_PER_TILE * 200);
        assert_eq!(world.stats().base_hits, 3);
        assert_eq!(world.stats().units_lost, 3);
        assert_eq!(world.outcome(), Some(SessionOutcome::Victory));
    }

    #[test]
    fn test_raiders_strike_until_killed() {
        let config = SandboxConfig {
            wave_interval_minutes: 1,
            wave_size: 1,
            wave_growth: 0,
            starting_army: vec![(UnitKind::Zealot, 2)],
            ..SandboxConfig::default()
        };
        let mut world = SandboxWorld::new(config, 4);
        world.advance(LOOPS_PER_MINUTE);
        assert_eq!(world.raider_count(), 1);
        let raider = world.snapshot().enemy_units[0].id;

        world.advance(448);
        assert_eq!(world.stats().units_lost, 1);

        // Whichever unit the raider struck, one zealot is left.
        let zealot = first_of(&world, UnitKind::Zealot);
        world.request_attack(zealot, Target::Unit(raider)).unwrap();
        world.advance(LOOPS_PER_TILE * 40);
        assert_eq!(world.stats().raiders_killed, 1);
        assert!(world.snapshot().enemy_units.is_empty());
    }

    #[test]
    fn test_losing_every_base_is_defeat() {
        let config = SandboxConfig {
            starting_workers: 0,
            wave_interval_minutes: 1,
            wave_size: 1,
            ..SandboxConfig::default()
        };
        let mut world = SandboxWorld::new(config, 2);
        world.advance(LOOPS_PER_MINUTE);
        world.advance(448);
        assert_eq!(world.outcome(), Some(SessionOutcome::Defeat));
    }

    #[test]
    fn test_time_limit_is_a_tie() {
        let mut world = SandboxWorld::new(
            SandboxConfig {
                max_minutes: 1,
                ..quiet()
            },
            1,
        );
        world.advance(LOOPS_PER_MINUTE);
        assert_eq!(world.outcome(), Some(SessionOutcome::Tie));
    }

    #[test]
    fn test_same_seed_same_world() {
        let run = |seed| {
            let mut world = SandboxWorld::new(SandboxConfig::default(), seed);
            let nexus = first_of(&world, UnitKind::Nexus);
            world.request_train(nexus, UnitKind::Probe).unwrap();
            for _ in 0..20 {
                world.advance(LOOPS_PER_MINUTE / 2);
            }
            (world.state_hash(), world.command_hash())
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_config_from_ron() {
        let ron = "(victory_hits: 10, starting_army: [(Stalker, 4)])";
        let config = SandboxConfig::from_ron_str(ron).unwrap();
        assert_eq!(config.victory_hits, 10);
        assert_eq!(config.starting_army, vec![(UnitKind::Stalker, 4)]);
        assert_eq!(config.home, (30, 30));
        assert!(matches!(
            SandboxConfig::load("/definitely/not/here.ron"),
            Err(HeadlessError::FileNotFound(_))
        ));
    }
}
