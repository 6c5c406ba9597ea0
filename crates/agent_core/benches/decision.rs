//! Decision pipeline benchmarks for agent_core.
//!
//! Run with: `cargo bench -p agent_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use agent_core::agent::Agent;
use agent_core::config::{AgentConfig, TacticsMode};
use agent_core::encoding::StateEncoder;
use agent_core::policy::LinearPolicy;
use agent_core::unit_kind::UnitKind;
use agent_test_utils::fixtures::{minutes, SnapshotBuilder};
use agent_test_utils::recording::RecordingSink;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn midgame() -> agent_core::snapshot::WorldSnapshot {
    let mut b = SnapshotBuilder::new()
        .at_loop(minutes(8))
        .rich()
        .supply(120, 150)
        .unit(UnitKind::Nexus, 30, 30)
        .unit(UnitKind::Nexus, 80, 30)
        .unit(UnitKind::Pylon, 36, 36)
        .unit(UnitKind::Gateway, 40, 36)
        .unit(UnitKind::CyberneticsCore, 40, 40)
        .unit(UnitKind::Stargate, 44, 40)
        .unit(UnitKind::RoboticsFacility, 48, 40)
        .workers(40, 35, 30)
        .army(UnitKind::VoidRay, 10, 50, 50)
        .army(UnitKind::Stalker, 10, 50, 50)
        .enemy_start(170, 140);
    for i in 0..20 {
        b = b.enemy_unit(120 + i, 100, i % 2 == 0);
    }
    b.geyser(37, 37).geyser(23, 37).build()
}

/// Runs the full per-tick pipeline.
pub fn on_step_benchmark(c: &mut Criterion) {
    let snap = midgame();

    c.bench_function("on_step_escalation", |b| {
        let mut agent = Agent::new(AgentConfig::default()).expect("default config");
        b.iter(|| {
            let mut sink = RecordingSink::new();
            black_box(agent.on_step(black_box(&snap), &mut sink).expect("tick"));
        });
    });

    c.bench_function("on_step_choice_policy", |b| {
        let mut config = AgentConfig::default();
        config.tactics.mode = TacticsMode::Choice;
        let mut agent = Agent::new(config).expect("choice config");
        let shape = StateEncoder::new(agent.config().encoder).shape();
        agent
            .set_policy(Box::new(LinearPolicy::zeros(shape, 8)))
            .expect("matching shape");
        b.iter(|| {
            let mut sink = RecordingSink::new();
            black_box(agent.on_step(black_box(&snap), &mut sink).expect("tick"));
        });
    });
}

/// Rasterises a busy snapshot.
pub fn encode_benchmark(c: &mut Criterion) {
    let snap = midgame();
    let encoder = StateEncoder::new(AgentConfig::default().encoder);
    c.bench_function("encode_state", |b| {
        b.iter(|| black_box(encoder.encode(black_box(&snap))));
    });
}

criterion_group!(benches, on_step_benchmark, encode_benchmark);
criterion_main!(benches);
