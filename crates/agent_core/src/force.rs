//! Army unit training and priority boost.
//!
//! Each ready production structure with an empty queue trains at most one
//! unit per tick. After a unit starts, the first primary base able to cast
//! the priority boost spends it on the producer. That is a greedy first
//! fit: bases are tried in snapshot order and the search stops at the
//! first successful cast.

use crate::config::ForceConfig;
use crate::error::Result;
use crate::facade::{Ability, CommandSink};
use crate::snapshot::UnitRef;
use crate::tick::TickContext;
use crate::unit_kind::UnitKind;

/// Army training decisions.
#[derive(Debug, Clone)]
pub struct ForceManager {
    config: ForceConfig,
}

impl ForceManager {
    /// Create a manager.
    #[must_use]
    pub const fn new(config: ForceConfig) -> Self {
        Self { config }
    }

    /// Train from every production structure kind.
    pub fn step<S: CommandSink + ?Sized>(&self, ctx: &mut TickContext<'_, S>) -> Result<()> {
        self.train_air(ctx)?;
        self.train_ground(ctx)?;
        self.train_observers(ctx)?;
        Ok(())
    }

    /// Capital air units from every idle Stargate.
    pub fn train_air<S: CommandSink + ?Sized>(&self, ctx: &mut TickContext<'_, S>) -> Result<()> {
        let producers: Vec<UnitRef> = ctx
            .snapshot
            .ready_idle_producers(UnitKind::Stargate)
            .copied()
            .collect();
        for stargate in producers {
            let gate = ctx.gate();
            if gate.supply_left() < self.config.capital_supply_headroom
                || !gate.can_afford_kind(UnitKind::VoidRay)
            {
                break;
            }
            self.train_and_boost(ctx, &stargate, UnitKind::VoidRay)?;
        }
        Ok(())
    }

    /// Ranged ground units from every idle Gateway, kept from outnumbering
    /// the air army when composition balancing is on.
    pub fn train_ground<S: CommandSink + ?Sized>(
        &self,
        ctx: &mut TickContext<'_, S>,
    ) -> Result<()> {
        if !self.config.train_gateway_units || !ctx.snapshot.has_ready(UnitKind::CyberneticsCore) {
            return Ok(());
        }
        let producers: Vec<UnitRef> = ctx
            .snapshot
            .ready_idle_producers(UnitKind::Gateway)
            .copied()
            .collect();
        for gateway in producers {
            if self.config.balance_composition && self.ground_ahead(ctx) {
                break;
            }
            let gate = ctx.gate();
            if gate.supply_left() < self.config.light_supply_headroom
                || !gate.can_afford_kind(UnitKind::Stalker)
            {
                break;
            }
            self.train_and_boost(ctx, &gateway, UnitKind::Stalker)?;
        }
        Ok(())
    }

    /// Reconnaissance units up to the configured count.
    pub fn train_observers<S: CommandSink + ?Sized>(
        &self,
        ctx: &mut TickContext<'_, S>,
    ) -> Result<()> {
        let producers: Vec<UnitRef> = ctx
            .snapshot
            .ready_idle_producers(UnitKind::RoboticsFacility)
            .copied()
            .collect();
        for robo in producers {
            let owned = ctx.snapshot.count_of(UnitKind::Observer) as u64
                + u64::from(ctx.gate().pending_count(UnitKind::Observer));
            if owned >= u64::from(self.config.max_observers)
                || !ctx.gate().can_afford_kind(UnitKind::Observer)
            {
                break;
            }
            ctx.train(robo.id, UnitKind::Observer)?;
        }
        Ok(())
    }

    /// Ground count including this tick's requests exceeds air count.
    fn ground_ahead<S: CommandSink + ?Sized>(&self, ctx: &TickContext<'_, S>) -> bool {
        let gate = ctx.gate();
        let ground = ctx.snapshot.count_of(UnitKind::Stalker) as u64
            + u64::from(gate.pending_count(UnitKind::Stalker));
        let air = ctx.snapshot.count_of(UnitKind::VoidRay) as u64
            + u64::from(gate.pending_count(UnitKind::VoidRay));
        ground > air
    }

    fn train_and_boost<S: CommandSink + ?Sized>(
        &self,
        ctx: &mut TickContext<'_, S>,
        producer: &UnitRef,
        kind: UnitKind,
    ) -> Result<()> {
        ctx.train(producer.id, kind)?;
        if self.config.use_priority_boost {
            priority_boost(ctx, producer)?;
        }
        Ok(())
    }
}

/// Cast the priority boost on `target` from the first ready base that can.
///
/// Returns whether a cast was issued.
pub fn priority_boost<S: CommandSink + ?Sized>(
    ctx: &mut TickContext<'_, S>,
    target: &UnitRef,
) -> Result<bool> {
    let casters: Vec<_> = ctx
        .snapshot
        .ready_of(UnitKind::Nexus)
        .map(|n| n.id)
        .collect();
    for caster in casters {
        if ctx.can_cast(caster, Ability::PriorityBoost, target.id) {
            ctx.cast(caster, Ability::PriorityBoost, target.id)?;
            return Ok(true);
        }
    }
    Ok(false)
}
