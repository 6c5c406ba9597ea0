//! Reconnaissance dispatch.
//!
//! Idle scouts are sent to a point near the enemy start location, with
//! each coordinate perturbed by up to a fixed percentage of its own value
//! so that scouts do not park on the same spot every time. Nothing is
//! remembered between ticks.

use rand::Rng;

use crate::config::ScoutConfig;
use crate::error::Result;
use crate::facade::CommandSink;
use crate::math::{Fixed, Vec2Fixed};
use crate::snapshot::MapSize;
use crate::tick::TickContext;
use crate::unit_kind::{UnitKind, UnitRole};

/// Scout dispatch.
#[derive(Debug, Clone)]
pub struct ScoutManager {
    config: ScoutConfig,
}

impl ScoutManager {
    /// Create a manager.
    #[must_use]
    pub const fn new(config: ScoutConfig) -> Self {
        Self { config }
    }

    /// Send every idle scout toward a jittered point near the enemy anchor.
    pub fn step<S, R>(&self, ctx: &mut TickContext<'_, S>, rng: &mut R) -> Result<()>
    where
        S: CommandSink + ?Sized,
        R: Rng + ?Sized,
    {
        let snap = ctx.snapshot;
        let Some(&anchor) = snap.enemy_start_locations.first() else {
            return Ok(());
        };
        let scouts: Vec<_> = UnitKind::ALL
            .into_iter()
            .filter(|k| k.role().contains(UnitRole::SCOUT))
            .flat_map(move |k| snap.idle_of(k))
            .filter(|u| u.is_ready)
            .map(|u| u.id)
            .collect();

        for scout in scouts {
            let point = self.jittered_target(anchor, snap.map_size, rng);
            tracing::debug!(%scout, x = %point.x, y = %point.y, "scouting");
            ctx.move_to(scout, point)?;
        }
        Ok(())
    }

    /// Perturb each coordinate of `anchor` by up to ±`jitter_percent`% of
    /// its own value, then clamp into the map.
    pub fn jittered_target<R: Rng + ?Sized>(
        &self,
        anchor: Vec2Fixed,
        map: MapSize,
        rng: &mut R,
    ) -> Vec2Fixed {
        let point = Vec2Fixed::new(
            self.jitter(anchor.x, rng),
            self.jitter(anchor.y, rng),
        );
        point.clamp_to(map.bounds())
    }

    fn jitter<R: Rng + ?Sized>(&self, value: Fixed, rng: &mut R) -> Fixed {
        let bound = (value.abs() * Fixed::from_num(self.config.jitter_percent)
            / Fixed::from_num(100))
        .to_bits();
        if bound == 0 {
            return value;
        }
        value.saturating_add(Fixed::from_bits(rng.gen_range(-bound..=bound)))
    }
}
