//! The per-session decision engine.
//!
//! An [`Agent`] owns every piece of mutable state the managers need (the
//! RNG, the tactics cooldown, the sample buffer) and runs the fixed
//! per-tick pipeline:
//!
//! ```text
//! economy ─► production ─► force ─► scouting ─► [encode] ─► tactics ─► [record]
//! ```
//!
//! The economy, production and force managers run every tick. Only the
//! tactics manager is gated by its cooldown.

use std::path::PathBuf;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{AgentConfig, TacticsMode};
use crate::economy::EconomyManager;
use crate::encoding::{EncodedState, StateEncoder};
use crate::error::{AgentError, Result};
use crate::facade::CommandSink;
use crate::force::ForceManager;
use crate::policy::{LinearPolicy, PolicyModel};
use crate::production::ProductionManager;
use crate::scout::ScoutManager;
use crate::snapshot::WorldSnapshot;
use crate::tactics::{CooldownTimer, Decision, PolicyInput, TacticsManager};
use crate::tick::TickContext;
use crate::training::TrainingLog;

/// Numbered names tried before a sample flush gives up on a taken file name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// We won.
    Victory,
    /// We lost.
    Defeat,
    /// Draw or abandoned.
    Tie,
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Loop counter of the snapshot.
    pub game_loop: u64,
    /// Tactics decision, if one was made.
    pub decision: Option<Decision>,
    /// Commands submitted this tick.
    pub commands: usize,
    /// Training samples appended this tick.
    pub samples_recorded: usize,
}

/// Decision engine for one session.
pub struct Agent {
    config: AgentConfig,
    rng: ChaCha8Rng,
    economy: EconomyManager,
    production: ProductionManager,
    force: ForceManager,
    scout: ScoutManager,
    tactics: TacticsManager,
    encoder: StateEncoder,
    policy: Option<Box<dyn PolicyModel>>,
    samples: TrainingLog,
    last_loop: u64,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("seed", &self.config.seed)
            .field("mode", &self.tactics.mode())
            .field("has_policy", &self.policy.is_some())
            .field("samples", &self.samples.len())
            .field("last_loop", &self.last_loop)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent seeded from `config.seed`.
    ///
    /// In [`TacticsMode::Choice`] with a model path configured, a model that
    /// fails to load or does not match the encoder shape is fatal.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }

    /// Create an agent with an explicit RNG.
    pub fn with_rng(config: AgentConfig, rng: ChaCha8Rng) -> Result<Self> {
        config.validate()?;
        let encoder = StateEncoder::new(config.encoder);

        let policy: Option<Box<dyn PolicyModel>> =
            match (config.tactics.mode, &config.learning.model_path) {
                (TacticsMode::Choice, Some(path)) => {
                    let model = LinearPolicy::load(path)?;
                    check_shape(&model, &encoder)?;
                    Some(Box::new(model))
                }
                (TacticsMode::Escalation, Some(path)) => {
                    tracing::warn!(
                        path = %path.display(),
                        "policy model ignored outside choice mode"
                    );
                    None
                }
                (_, None) => None,
            };

        tracing::info!(
            seed = config.seed,
            mode = ?config.tactics.mode,
            policy = policy.is_some(),
            record = config.learning.record_samples,
            "agent created"
        );

        Ok(Self {
            economy: EconomyManager::new(config.economy.clone()),
            production: ProductionManager::new(config.production.clone()),
            force: ForceManager::new(config.force.clone()),
            scout: ScoutManager::new(config.scouting.clone()),
            tactics: TacticsManager::new(config.tactics.clone()),
            samples: TrainingLog::new(config.seed),
            encoder,
            policy,
            rng,
            config,
            last_loop: 0,
        })
    }

    /// Replace the policy model.
    pub fn set_policy(&mut self, model: Box<dyn PolicyModel>) -> Result<()> {
        check_shape(model.as_ref(), &self.encoder)?;
        self.policy = Some(model);
        Ok(())
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Tactics cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> CooldownTimer {
        self.tactics.cooldown()
    }

    /// Samples recorded so far this session.
    #[must_use]
    pub const fn samples(&self) -> &TrainingLog {
        &self.samples
    }

    /// Whether a policy model is loaded.
    #[must_use]
    pub fn has_policy(&self) -> bool {
        self.policy.is_some()
    }

    fn recording(&self) -> bool {
        self.config.tactics.mode == TacticsMode::Choice && self.config.learning.record_samples
    }

    fn wants_encoding(&self) -> bool {
        self.config.tactics.mode == TacticsMode::Choice
            && (self.config.learning.record_samples || self.policy.is_some())
    }

    /// Run the full pipeline for one snapshot.
    pub fn on_step<S: CommandSink + ?Sized>(
        &mut self,
        snapshot: &WorldSnapshot,
        sink: &mut S,
    ) -> Result<TickReport> {
        #[cfg(feature = "debug-validation")]
        validate_snapshot(snapshot)?;

        self.last_loop = snapshot.game_loop;
        let mut ctx = TickContext::new(snapshot, sink);

        self.economy.step(&mut ctx)?;
        self.production.step(&mut ctx, &mut self.rng)?;
        self.force.step(&mut ctx)?;
        self.scout.step(&mut ctx, &mut self.rng)?;

        let state: Option<EncodedState> = self
            .wants_encoding()
            .then(|| self.encoder.encode(snapshot));
        let input = match (&self.policy, &state) {
            (Some(model), Some(state)) => Some(PolicyInput {
                model: model.as_ref(),
                state,
            }),
            _ => None,
        };
        let decision = self.tactics.step(&mut ctx, &mut self.rng, input)?;

        let mut samples_recorded = 0;
        if self.recording() {
            if let (Some(label), Some(state)) = (decision.and_then(|d| d.label()), state) {
                self.samples.push(label, state);
                samples_recorded = 1;
            }
        }

        let report = TickReport {
            game_loop: snapshot.game_loop,
            decision,
            commands: ctx.commands_issued(),
            samples_recorded,
        };
        tracing::debug!(?report, "tick complete");
        Ok(report)
    }

    /// Finish the session. A won session with recorded samples writes them
    /// to the output directory and returns the file path; otherwise the
    /// samples are dropped. Existing sample files are never replaced: a
    /// taken `session-<seed>-<loop>.bin` gets a `-1`, `-2`, ... suffix.
    pub fn end_session(&mut self, outcome: SessionOutcome) -> Result<Option<PathBuf>> {
        let samples = std::mem::replace(&mut self.samples, TrainingLog::new(self.config.seed));
        if outcome != SessionOutcome::Victory || samples.is_empty() {
            tracing::info!(?outcome, dropped = samples.len(), "session ended");
            return Ok(None);
        }

        let dir = &self.config.learning.output_dir;
        std::fs::create_dir_all(dir)?;
        let stem = format!("session-{}-{}", self.config.seed, self.last_loop);
        let mut attempt = 0u32;
        let path = loop {
            let name = match attempt {
                0 => format!("{stem}.bin"),
                n => format!("{stem}-{n}.bin"),
            };
            let path = dir.join(name);
            match samples.save_new(&path) {
                Ok(()) => break path,
                Err(AgentError::TrainingIo(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    if attempt > MAX_NAME_ATTEMPTS {
                        return Err(AgentError::TrainingIo(e));
                    }
                }
                Err(e) => return Err(e),
            }
        };
        tracing::info!(
            ?outcome,
            samples = samples.len(),
            path = %path.display(),
            "training samples flushed"
        );
        Ok(Some(path))
    }
}

fn check_shape(model: &dyn PolicyModel, encoder: &StateEncoder) -> Result<()> {
    if model.input_shape() != encoder.shape() {
        tracing::warn!(
            expected = ?model.input_shape(),
            actual = ?encoder.shape(),
            "policy input shape mismatch"
        );
        return Err(AgentError::ShapeMismatch {
            expected: model.input_shape(),
            actual: encoder.shape(),
        });
    }
    Ok(())
}

/// Owned unit ids must be unique and supply must be consistent.
#[cfg(feature = "debug-validation")]
fn validate_snapshot(snapshot: &WorldSnapshot) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    if let Some(dup) = snapshot.units.iter().find(|u| !seen.insert(u.id)) {
        return Err(AgentError::InvalidState(format!(
            "duplicate unit {} in snapshot",
            dup.id
        )));
    }
    if snapshot.supply_used > crate::snapshot::MAX_SUPPLY {
        return Err(AgentError::InvalidState(format!(
            "supply {} exceeds {}",
            snapshot.supply_used,
            crate::snapshot::MAX_SUPPLY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::facade::{Ability, Placement, Target};
    use crate::math::Vec2Fixed;
    use crate::snapshot::{UnitId, UnitRef, LOOPS_PER_MINUTE};
    use crate::unit_kind::UnitKind;

    #[derive(Default)]
    struct Count(usize);

    impl CommandSink for Count {
        fn distribute_workers(&mut self) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
        fn request_build(&mut self, _: UnitKind, _: Placement) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
        fn request_train(&mut self, _: UnitId, _: UnitKind) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
        fn can_cast(&self, _: UnitId, _: Ability, _: UnitId) -> bool {
            false
        }
        fn request_cast(&mut self, _: UnitId, _: Ability, _: UnitId) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
        fn request_move(&mut self, _: UnitId, _: Vec2Fixed) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
        fn request_attack(&mut self, _: UnitId, _: Target) -> Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    fn army(n: u64) -> WorldSnapshot {
        let units = (0..n)
            .map(|i| UnitRef {
                id: UnitId(100 + i),
                kind: UnitKind::Stalker,
                position: Vec2Fixed::from_ints(50, 50),
                is_idle: true,
                is_ready: true,
                queue_empty: true,
                is_gathering: false,
                energy: 0,
            })
            .collect();
        WorldSnapshot {
            game_loop: 3 * LOOPS_PER_MINUTE,
            supply_used: 20,
            supply_cap: 23,
            units,
            enemy_start_locations: vec![Vec2Fixed::from_ints(150, 150)],
            ..Default::default()
        }
    }

    fn choice_config(output_dir: PathBuf) -> AgentConfig {
        let mut config = AgentConfig::default();
        config.tactics.mode = crate::config::TacticsMode::Choice;
        config.encoder.height = 16;
        config.encoder.width = 16;
        config.learning = LearningConfig {
            record_samples: true,
            model_path: None,
            output_dir,
        };
        config
    }

    #[test]
    fn test_report_counts_commands() {
        let mut agent = Agent::new(AgentConfig::default()).unwrap();
        let mut sink = Count::default();
        let report = agent.on_step(&army(10), &mut sink).unwrap();
        assert_eq!(report.commands, sink.0);
        // distribute_workers plus ten attacks
        assert_eq!(report.commands, 11);
        assert_eq!(report.samples_recorded, 0);
    }

    #[test]
    fn test_choice_mode_records_and_flushes_on_victory() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = Agent::new(choice_config(dir.path().join("out"))).unwrap();
        let report = agent.on_step(&army(2), &mut Count::default()).unwrap();
        assert_eq!(report.samples_recorded, 1);
        assert_eq!(agent.samples().len(), 1);

        let path = agent.end_session(SessionOutcome::Victory).unwrap().unwrap();
        let log = TrainingLog::load(&path).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.samples[0].choice(),
            report.decision.and_then(|d| d.label())
        );
        assert!(agent.samples().is_empty());
    }

    #[test]
    fn test_repeat_flush_keeps_earlier_samples() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut paths = Vec::new();
        for _ in 0..3 {
            let mut agent = Agent::new(choice_config(out.clone())).unwrap();
            agent.on_step(&army(2), &mut Count::default()).unwrap();
            paths.push(agent.end_session(SessionOutcome::Victory).unwrap().unwrap());
        }

        assert_eq!(paths[0], out.join(format!("session-0-{}.bin", 3 * LOOPS_PER_MINUTE)));
        assert_eq!(paths[1], out.join(format!("session-0-{}-1.bin", 3 * LOOPS_PER_MINUTE)));
        assert_eq!(paths[2], out.join(format!("session-0-{}-2.bin", 3 * LOOPS_PER_MINUTE)));
        for path in &paths {
            assert_eq!(TrainingLog::load(path).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_defeat_drops_samples() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut agent = Agent::new(choice_config(out.clone())).unwrap();
        agent.on_step(&army(2), &mut Count::default()).unwrap();
        assert_eq!(agent.end_session(SessionOutcome::Defeat).unwrap(), None);
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_model_is_fatal_in_choice_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = choice_config(dir.path().to_path_buf());
        config.learning.model_path = Some(dir.path().join("missing.json"));
        assert!(matches!(
            Agent::new(config),
            Err(AgentError::PolicyLoad { .. })
        ));
    }

    #[test]
    fn test_model_shape_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        LinearPolicy::zeros((8, 8, 3), 2).save(&path).unwrap();
        let mut config = choice_config(dir.path().to_path_buf());
        config.learning.model_path = Some(path);
        assert!(matches!(
            Agent::new(config),
            Err(AgentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_model_ignored_in_escalation_mode() {
        let mut config = AgentConfig::default();
        config.learning.model_path = Some(PathBuf::from("/no/such/model.json"));
        let agent = Agent::new(config).unwrap();
        assert!(!agent.has_policy());
    }
}
