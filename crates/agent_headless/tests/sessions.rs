//! Whole sessions played against the sandbox world.

use agent_core::agent::SessionOutcome;
use agent_core::config::{AgentConfig, TacticsMode};
use agent_core::tactics::ActionChoice;
use agent_core::training::TrainingLog;
use agent_core::unit_kind::UnitKind;
use agent_headless::{verify_determinism, SandboxConfig, SessionRunner};

fn no_waves(max_minutes: u32) -> SandboxConfig {
    SandboxConfig {
        max_minutes,
        wave_interval_minutes: 0,
        ..SandboxConfig::default()
    }
}

#[test]
fn test_default_session_reaches_an_outcome() {
    let sandbox = SandboxConfig {
        max_minutes: 12,
        ..SandboxConfig::default()
    };
    let metrics = SessionRunner::new(AgentConfig::default(), sandbox)
        .unwrap()
        .run()
        .unwrap();

    assert!(metrics.outcome.is_some());
    assert!(metrics.duration_loops <= 12 * 1344);
    assert!(metrics.commands > 0);
    assert!(metrics.structures_started.contains_key("Pylon"));
    // Metrics are plain JSON.
    let json = serde_json::to_string(&metrics).unwrap();
    assert!(json.contains("\"mode\":\"Escalation\""));
}

#[test]
fn test_economy_grows_without_pressure() {
    let metrics = SessionRunner::new(AgentConfig::default(), no_waves(8))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(metrics.outcome, Some(SessionOutcome::Tie));
    assert!(metrics.peak_workers >= 20);
    assert!(metrics.structures_started.contains_key("Assimilator"));
    assert!(metrics.first_expansion_loop.is_some());
    assert_eq!(metrics.raiders_spawned, 0);
}

#[test]
fn test_same_seed_replays_identically() {
    let agent = AgentConfig {
        seed: 99,
        ..AgentConfig::default()
    };
    let sandbox = SandboxConfig {
        max_minutes: 6,
        wave_interval_minutes: 2,
        ..SandboxConfig::default()
    };
    let report = verify_determinism(&agent, &sandbox, 2).unwrap();
    assert!(report.is_deterministic());
}

#[test]
fn test_won_choice_session_flushes_samples() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AgentConfig::default();
    agent.seed = 5;
    agent.tactics.mode = TacticsMode::Choice;
    agent.learning.record_samples = true;
    agent.learning.output_dir = dir.path().to_path_buf();
    agent.encoder.height = 32;
    agent.encoder.width = 32;

    let sandbox = SandboxConfig {
        starting_army: vec![(UnitKind::Stalker, 10)],
        victory_hits: 5,
        ..no_waves(20)
    };
    let metrics = SessionRunner::new(agent, sandbox).unwrap().run().unwrap();

    assert!(metrics.won());
    assert!(metrics.samples_recorded >= 1);
    let path = metrics.samples_path.expect("won session flushes samples");
    assert!(path.starts_with(dir.path()));

    let log = TrainingLog::load(&path).unwrap();
    assert_eq!(log.len() as u32, metrics.samples_recorded);
    let counts = log.label_counts();
    assert!(
        counts[ActionChoice::AttackEnemyStart.index()]
            + counts[ActionChoice::AttackEnemyStructure.index()]
            >= 1
    );
    for sample in &log.samples {
        assert_eq!(sample.state.shape(), (32, 32, 3));
    }
}

#[test]
fn test_lost_session_drops_samples() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AgentConfig::default();
    agent.tactics.mode = TacticsMode::Choice;
    agent.learning.record_samples = true;
    agent.learning.output_dir = dir.path().join("samples");
    agent.encoder.height = 16;
    agent.encoder.width = 16;

    let sandbox = SandboxConfig {
        starting_army: vec![(UnitKind::Zealot, 2)],
        max_minutes: 4,
        wave_interval_minutes: 0,
        ..SandboxConfig::default()
    };
    let metrics = SessionRunner::new(agent, sandbox).unwrap().run().unwrap();

    assert_ne!(metrics.outcome, Some(SessionOutcome::Victory));
    assert!(metrics.samples_path.is_none());
    assert!(!dir.path().join("samples").exists());
}
