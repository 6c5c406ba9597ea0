//! Drives one agent through one sandbox session.

use agent_core::agent::Agent;
use agent_core::config::AgentConfig;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::SessionMetrics;
use crate::sandbox::{SandboxConfig, SandboxWorld};

/// Game loops between agent ticks.
pub const DEFAULT_STEP_LOOPS: u64 = 8;

/// One agent playing one sandbox world to completion.
pub struct SessionRunner {
    agent: Agent,
    world: SandboxWorld,
    step_loops: u64,
}

impl SessionRunner {
    /// Build the agent and a world seeded with the agent's seed.
    pub fn new(agent_config: AgentConfig, sandbox: SandboxConfig) -> Result<Self> {
        let seed = agent_config.seed;
        let agent = Agent::new(agent_config)?;
        Ok(Self {
            agent,
            world: SandboxWorld::new(sandbox, seed),
            step_loops: DEFAULT_STEP_LOOPS,
        })
    }

    /// Tick the agent every `loops` game loops (at least one).
    #[must_use]
    pub fn with_step_loops(mut self, loops: u64) -> Self {
        self.step_loops = loops.max(1);
        self
    }

    /// The world being played.
    #[must_use]
    pub const fn world(&self) -> &SandboxWorld {
        &self.world
    }

    /// Play until the world reports an outcome.
    ///
    /// Any error the agent raises ends the session with that error. A won
    /// session flushes its training samples before returning.
    pub fn run(mut self) -> Result<SessionMetrics> {
        let config = self.agent.config();
        let seed = config.seed;
        let mut metrics = SessionMetrics::new(
            format!("session_{seed}"),
            seed,
            format!("{:?}", config.tactics.mode),
        );
        info!(seed, step_loops = self.step_loops, "session starting");

        let outcome = loop {
            if let Some(outcome) = self.world.outcome() {
                break outcome;
            }
            let snapshot = self.world.snapshot();
            let report = self.agent.on_step(&snapshot, &mut self.world)?;
            metrics.observe(&report, &snapshot);
            if let Some(decision) = report.decision {
                debug!(game_loop = report.game_loop, ?decision, "tactics decision");
            }
            self.world.advance(self.step_loops);
        };

        let samples_path = self.agent.end_session(outcome)?;
        metrics.finalize(outcome, &self.world, samples_path);
        info!(
            seed,
            ?outcome,
            loops = metrics.duration_loops,
            ticks = metrics.ticks,
            base_hits = metrics.base_hits,
            units_lost = metrics.units_lost,
            "session finished"
        );
        Ok(metrics)
    }
}
