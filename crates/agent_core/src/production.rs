//! Tech and production structure ordering.
//!
//! Structures unlock in a fixed chain:
//!
//! ```text
//! Pylon ─► Gateway ─► CyberneticsCore ─┬─► Forge / RoboticsFacility
//!                                      └─► Stargate (one per ready Nexus)
//! ```
//!
//! Each step fires only when its prerequisite is ready, the target is not
//! already present or pending, and the cost is affordable. Placement is an
//! anchor near a randomly chosen ready Pylon; the host finds the exact spot.

use rand::seq::IteratorRandom;
use rand::Rng;

use crate::config::ProductionConfig;
use crate::error::Result;
use crate::facade::{CommandSink, Placement};
use crate::math::Vec2Fixed;
use crate::snapshot::WorldSnapshot;
use crate::tick::TickContext;
use crate::unit_kind::UnitKind;

/// Structure build ordering.
#[derive(Debug, Clone)]
pub struct ProductionManager {
    config: ProductionConfig,
}

impl ProductionManager {
    /// Create a manager.
    #[must_use]
    pub const fn new(config: ProductionConfig) -> Self {
        Self { config }
    }

    /// Walk the prerequisite chain once.
    pub fn step<S, R>(&self, ctx: &mut TickContext<'_, S>, rng: &mut R) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        self.build_tech_core(ctx, rng)?;
        self.build_gateways(ctx, rng)?;
        self.build_tech_branch(ctx, rng)?;
        self.build_stargates(ctx, rng)?;
        Ok(())
    }

    /// Gateways up to the configured count, once a Pylon is ready.
    pub fn build_gateways<S, R>(&self, ctx: &mut TickContext<'_, S>, rng: &mut R) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        let present = snap.count_of(UnitKind::Gateway) as u64;
        if present >= u64::from(self.config.target_gateways) {
            return Ok(());
        }
        self.try_build(ctx, rng, UnitKind::Gateway)
    }

    /// The single tech-core, once a Gateway is ready.
    pub fn build_tech_core<S, R>(&self, ctx: &mut TickContext<'_, S>, rng: &mut R) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        if !snap.has_ready(UnitKind::Gateway) || snap.count_of(UnitKind::CyberneticsCore) > 0 {
            return Ok(());
        }
        self.try_build(ctx, rng, UnitKind::CyberneticsCore)
    }

    /// Special-tech structures, one each, once the tech-core is ready.
    pub fn build_tech_branch<S, R>(&self, ctx: &mut TickContext<'_, S>, rng: &mut R) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        if !snap.has_ready(UnitKind::CyberneticsCore) {
            return Ok(());
        }
        let wanted = [
            (UnitKind::Forge, self.config.build_forge),
            (UnitKind::RoboticsFacility, self.config.build_robotics),
        ];
        for (kind, enabled) in wanted {
            if enabled && snap.count_of(kind) == 0 {
                self.try_build(ctx, rng, kind)?;
            }
        }
        Ok(())
    }

    /// Flight production, one per ready primary base.
    pub fn build_stargates<S, R>(&self, ctx: &mut TickContext<'_, S>, rng: &mut R) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        if !snap.has_ready(UnitKind::CyberneticsCore)
            || snap.ready_count(UnitKind::Stargate) >= snap.ready_count(UnitKind::Nexus)
        {
            return Ok(());
        }
        self.try_build(ctx, rng, UnitKind::Stargate)
    }

    fn try_build<S, R>(
        &self,
        ctx: &mut TickContext<'_, S>,
        rng: &mut R,
        kind: UnitKind,
    ) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let gate = ctx.gate();
        if gate.already_pending(kind) || !gate.can_afford_kind(kind) {
            return Ok(());
        }
        let Some(anchor) = supply_anchor(ctx.snapshot, rng) else {
            return Ok(());
        };
        ctx.build(kind, Placement::Near(anchor))
    }
}

/// Position of a random ready Pylon.
fn supply_anchor<R: Rng + ?Sized>(snap: &WorldSnapshot, rng: &mut R) -> Option<Vec2Fixed> {
    snap.ready_of(UnitKind::Pylon)
        .choose(rng)
        .map(|pylon| pylon.position)
}
