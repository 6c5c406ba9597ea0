//! Session metrics for sandbox runs.
//!
//! One [`SessionMetrics`] per played session, folded into a
//! [`BatchSummary`] when many sessions run together.

use std::collections::BTreeMap;
use std::path::PathBuf;

use agent_core::agent::{SessionOutcome, TickReport};
use agent_core::snapshot::WorldSnapshot;
use agent_core::tactics::Decision;
use agent_core::unit_kind::UnitKind;
use serde::{Deserialize, Serialize};

use crate::sandbox::SandboxWorld;

/// Complete metrics for a single session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Unique session identifier.
    pub session_id: String,
    /// Agent seed.
    pub seed: u64,
    /// Attack decision mode.
    pub mode: String,
    /// How the session ended (None if it never finished).
    pub outcome: Option<SessionOutcome>,
    /// Session length in game loops.
    pub duration_loops: u64,
    /// Agent ticks run.
    pub ticks: u64,
    /// Commands the agent submitted.
    pub commands: u64,
    /// Tactics decisions by label.
    pub decisions: BTreeMap<String, u32>,
    /// Attack orders accepted by the world.
    pub attack_orders: u32,
    /// Units finished, by kind.
    pub units_trained: BTreeMap<String, u32>,
    /// Structures started, by kind.
    pub structures_started: BTreeMap<String, u32>,
    /// Priority boosts cast.
    pub boosts: u32,
    /// Attacks that reached the enemy base.
    pub base_hits: u32,
    /// Raiders that appeared.
    pub raiders_spawned: u32,
    /// Raiders killed.
    pub raiders_killed: u32,
    /// Owned units lost.
    pub units_lost: u32,
    /// Loop of the first attack order.
    pub first_attack_loop: Option<u64>,
    /// Loop of the first expansion request.
    pub first_expansion_loop: Option<u64>,
    /// Largest combat force seen.
    pub peak_army: u32,
    /// Largest worker count seen.
    pub peak_workers: u32,
    /// Training samples recorded during the session.
    pub samples_recorded: u32,
    /// Where samples were flushed, if the session was won.
    pub samples_path: Option<PathBuf>,
    /// Running hash of accepted commands.
    pub command_hash: u64,
    /// Final world state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl SessionMetrics {
    /// Create metrics for a new session.
    #[must_use]
    pub fn new(session_id: impl Into<String>, seed: u64, mode: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            seed,
            mode: mode.into(),
            ..Default::default()
        }
    }

    /// Fold one agent tick into the totals.
    pub fn observe(&mut self, report: &TickReport, snapshot: &WorldSnapshot) {
        self.ticks += 1;
        self.commands += report.commands as u64;
        self.samples_recorded += u32::try_from(report.samples_recorded).unwrap_or(u32::MAX);
        if let Some(decision) = report.decision {
            *self
                .decisions
                .entry(decision_name(&decision))
                .or_default() += 1;
        }

        let army = snapshot
            .units
            .iter()
            .filter(|u| u.kind.is_combatant())
            .count();
        let workers = snapshot.count_of(UnitKind::Probe);
        self.peak_army = self.peak_army.max(u32::try_from(army).unwrap_or(u32::MAX));
        self.peak_workers = self
            .peak_workers
            .max(u32::try_from(workers).unwrap_or(u32::MAX));
    }

    /// Record the outcome and copy the world's counters.
    pub fn finalize(
        &mut self,
        outcome: SessionOutcome,
        world: &SandboxWorld,
        samples_path: Option<PathBuf>,
    ) {
        let stats = world.stats();
        self.outcome = Some(outcome);
        self.duration_loops = world.game_loop();
        self.attack_orders = stats.attack_orders;
        self.units_trained = by_name(&stats.trained);
        self.structures_started = by_name(&stats.started);
        self.boosts = stats.boosts;
        self.base_hits = stats.base_hits;
        self.raiders_spawned = stats.raiders_spawned;
        self.raiders_killed = stats.raiders_killed;
        self.units_lost = stats.units_lost;
        self.first_attack_loop = stats.first_attack_loop;
        self.first_expansion_loop = stats.first_expansion_loop;
        self.samples_path = samples_path;
        self.command_hash = world.command_hash();
        self.final_state_hash = world.state_hash();
    }

    /// Whether the session was won.
    #[must_use]
    pub fn won(&self) -> bool {
        self.outcome == Some(SessionOutcome::Victory)
    }
}

fn decision_name(decision: &Decision) -> String {
    decision
        .label()
        .map_or_else(|| "Attack".to_string(), |choice| format!("{choice:?}"))
}

fn by_name(counts: &BTreeMap<UnitKind, u32>) -> BTreeMap<String, u32> {
    counts
        .iter()
        .map(|(kind, count)| (format!("{kind:?}"), *count))
        .collect()
}

/// Summary statistics across multiple sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total sessions played.
    pub total_sessions: u32,
    /// Sessions won.
    pub victories: u32,
    /// Sessions lost.
    pub defeats: u32,
    /// Sessions that hit the time limit.
    pub ties: u32,
    /// Fraction of sessions won.
    pub win_rate: f64,
    /// Average session length in loops.
    pub avg_duration_loops: f64,
    /// Shortest session.
    pub min_duration_loops: u64,
    /// Longest session.
    pub max_duration_loops: u64,
    /// Average loop of the first attack order, over sessions that attacked.
    pub avg_first_attack_loop: Option<f64>,
    /// Average units lost per session.
    pub avg_units_lost: f64,
    /// Decisions by label, summed over sessions.
    pub decisions: BTreeMap<String, u32>,
    /// Training samples flushed from won sessions.
    pub samples_flushed: u32,
}

impl BatchSummary {
    /// Calculate summary from a list of session metrics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_sessions(sessions: &[SessionMetrics]) -> Self {
        if sessions.is_empty() {
            return Self::default();
        }

        let total = sessions.len() as f64;
        let mut summary = Self {
            total_sessions: u32::try_from(sessions.len()).unwrap_or(u32::MAX),
            min_duration_loops: u64::MAX,
            ..Default::default()
        };

        let mut duration_sum = 0u64;
        let mut lost_sum = 0u64;
        let mut first_attacks = Vec::new();
        for session in sessions {
            match session.outcome {
                Some(SessionOutcome::Victory) => summary.victories += 1,
                Some(SessionOutcome::Defeat) => summary.defeats += 1,
                Some(SessionOutcome::Tie) | None => summary.ties += 1,
            }
            duration_sum += session.duration_loops;
            summary.min_duration_loops = summary.min_duration_loops.min(session.duration_loops);
            summary.max_duration_loops = summary.max_duration_loops.max(session.duration_loops);
            lost_sum += u64::from(session.units_lost);
            first_attacks.extend(session.first_attack_loop);
            for (label, count) in &session.decisions {
                *summary.decisions.entry(label.clone()).or_default() += count;
            }
            if session.samples_path.is_some() {
                summary.samples_flushed += session.samples_recorded;
            }
        }

        summary.win_rate = f64::from(summary.victories) / total;
        summary.avg_duration_loops = duration_sum as f64 / total;
        summary.avg_units_lost = lost_sum as f64 / total;
        summary.avg_first_attack_loop = (!first_attacks.is_empty())
            .then(|| first_attacks.iter().sum::<u64>() as f64 / first_attacks.len() as f64);
        summary
    }
}
