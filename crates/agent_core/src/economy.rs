//! Worker production, supply, gas extraction and expansion.
//!
//! Every decision here is recomputed from scratch each tick. Nothing is
//! remembered between ticks: a request that could not be afforded is
//! simply tried again on the next snapshot.

use crate::config::EconomyConfig;
use crate::error::Result;
use crate::facade::{CommandSink, Placement};
use crate::math::{Fixed, Vec2Fixed};
use crate::snapshot::{UnitRef, MAX_SUPPLY};
use crate::tick::TickContext;
use crate::unit_kind::UnitKind;

/// Economy decisions.
#[derive(Debug, Clone)]
pub struct EconomyManager {
    config: EconomyConfig,
}

impl EconomyManager {
    /// Create a manager.
    #[must_use]
    pub const fn new(config: EconomyConfig) -> Self {
        Self { config }
    }

    /// Run every economy decision in order.
    pub fn step<S: CommandSink + ?Sized>(&self, ctx: &mut TickContext<'_, S>) -> Result<()> {
        ctx.distribute_workers()?;
        self.train_workers(ctx)?;
        self.build_supply(ctx)?;
        self.build_extractors(ctx)?;
        self.expand(ctx)?;
        Ok(())
    }

    /// Soft worker target: saturation of every base plus every extractor.
    #[must_use]
    pub fn worker_target(&self, bases: usize, extractors: usize) -> u64 {
        u64::from(self.config.workers_per_base) * bases as u64
            + u64::from(self.config.workers_per_extractor) * extractors as u64
    }

    /// Train a worker from each ready, idle base while under both caps.
    pub fn train_workers<S: CommandSink + ?Sized>(
        &self,
        ctx: &mut TickContext<'_, S>,
    ) -> Result<()> {
        let snap = ctx.snapshot;
        let target = self.worker_target(
            snap.count_of(UnitKind::Nexus),
            snap.count_of(UnitKind::Assimilator),
        );
        let producers: Vec<UnitRef> = snap.ready_idle_producers(UnitKind::Nexus).copied().collect();

        for nexus in producers {
            let workers = snap.count_of(UnitKind::Probe) as u64
                + u64::from(ctx.ledger().requested(UnitKind::Probe));
            if workers >= u64::from(self.config.max_workers) || workers >= target {
                break;
            }
            if !ctx.gate().can_afford_kind(UnitKind::Probe) {
                break;
            }
            ctx.train(nexus.id, UnitKind::Probe)?;
        }
        Ok(())
    }

    /// Request one supply structure when headroom runs low.
    pub fn build_supply<S: CommandSink + ?Sized>(
        &self,
        ctx: &mut TickContext<'_, S>,
    ) -> Result<()> {
        let snap = ctx.snapshot;
        if snap.supply_left() >= self.config.supply_threshold || snap.supply_cap >= MAX_SUPPLY {
            return Ok(());
        }
        let gate = ctx.gate();
        if gate.already_pending(UnitKind::Pylon) || !gate.can_afford_kind(UnitKind::Pylon) {
            return Ok(());
        }
        let Some(anchor) = snap.ready_of(UnitKind::Nexus).next().map(|n| n.position) else {
            return Ok(());
        };
        ctx.build(UnitKind::Pylon, Placement::Near(anchor))
    }

    /// Claim every free geyser near a ready base.
    pub fn build_extractors<S: CommandSink + ?Sized>(
        &self,
        ctx: &mut TickContext<'_, S>,
    ) -> Result<()> {
        let snap = ctx.snapshot;
        let radius = Fixed::from_num(self.config.geyser_radius);
        let clearance = Fixed::from_num(self.config.extractor_clearance);
        let mut assigned = Vec::new();
        let mut builders = Vec::new();

        for nexus in snap.ready_of(UnitKind::Nexus) {
            for geyser in snap.geysers_near(radius, nexus.position) {
                if assigned.contains(&geyser.id) {
                    continue;
                }
                let taken = snap
                    .units_near(UnitKind::Assimilator, clearance, geyser.position)
                    .next()
                    .is_some();
                if taken || !ctx.gate().can_afford_kind(UnitKind::Assimilator) {
                    continue;
                }
                let probes = snap
                    .units_of(UnitKind::Probe)
                    .filter(|p| !builders.contains(&p.id));
                let Some(worker) = nearest_build_worker(probes, geyser.position) else {
                    continue;
                };
                ctx.build(
                    UnitKind::Assimilator,
                    Placement::OnGeyser {
                        geyser: geyser.id,
                        worker: worker.id,
                    },
                )?;
                assigned.push(geyser.id);
                builders.push(worker.id);
            }
        }
        Ok(())
    }

    /// Expansion cap at `elapsed_minutes`: grows from the minimum toward
    /// the maximum one base per minute and never exceeds the maximum.
    #[must_use]
    pub fn expansion_cap(&self, elapsed_minutes: Fixed) -> Fixed {
        let floor = Fixed::from_num(self.config.min_expansion_cap);
        let ceiling = Fixed::from_num(self.config.max_expansion_cap);
        elapsed_minutes.max(floor).min(ceiling)
    }

    /// Request a new base while under the ramped cap.
    pub fn expand<S: CommandSink + ?Sized>(&self, ctx: &mut TickContext<'_, S>) -> Result<()> {
        let snap = ctx.snapshot;
        let bases = snap.count_of(UnitKind::Nexus);
        if bases == 0 {
            return Ok(());
        }
        let cap = self.expansion_cap(snap.elapsed_minutes());
        if Fixed::saturating_from_num(bases) >= cap {
            return Ok(());
        }
        let gate = ctx.gate();
        if gate.already_pending(UnitKind::Nexus) || !gate.can_afford_kind(UnitKind::Nexus) {
            return Ok(());
        }
        tracing::info!(bases, cap = %cap, "expanding");
        ctx.build(UnitKind::Nexus, Placement::Expansion)
    }
}

/// Nearest worker that is idle or mining; busy builders are left alone.
///
/// A worker holds one build order at a time, so callers drop workers they
/// already ordered this tick before asking.
fn nearest_build_worker<'a>(
    workers: impl Iterator<Item = &'a UnitRef>,
    point: Vec2Fixed,
) -> Option<&'a UnitRef> {
    workers
        .filter(|w| w.is_ready && (w.is_idle || w.is_gathering))
        .min_by_key(|w| (w.position.distance_squared(point), w.id))
}
