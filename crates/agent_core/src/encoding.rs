//! Rasterised state encoding for the policy model.
//!
//! [`StateEncoder`] draws a `height × width × 3` byte image of the map:
//! owned units and structures as filled discs coloured by kind, known
//! enemies on top, and four indicator bars in the top-left corner whose
//! pixel length is proportional to
//!
//! 1. minerals (saturating at 1500),
//! 2. vespene (saturating at 1500),
//! 3. supply headroom as a share of the supply cap,
//! 4. combat units as a share of supply in use.
//!
//! Row 0 is the top of the image, which is the *high* y edge of the map
//! (the image is vertically flipped relative to map coordinates).
//!
//! The exact pixels are a local convention; the shape is a hard contract
//! with [`crate::policy::PolicyModel::input_shape`].

use serde::{Deserialize, Serialize};

use crate::config::EncoderConfig;
use crate::math::{Fixed, Vec2Fixed};
use crate::snapshot::{MapSize, WorldSnapshot};
use crate::unit_kind::UnitKind;

/// Colour channels per pixel.
pub const CHANNELS: usize = 3;

/// Resource amount drawn as a full-length bar.
const RESOURCE_BAR_FULL: u32 = 1500;

/// Longest indicator bar in pixels.
const BAR_MAX_LEN: usize = 50;

/// Rows of the four indicator bars, top to bottom.
const BAR_ROWS: [usize; 4] = [3, 7, 11, 15];

/// Fixed-shape `height × width × 3` image.
///
/// Deserialization goes through [`EncodedState::from_raw`], so a decoded
/// state always holds exactly `height × width × 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawState")]
pub struct EncodedState {
    height: usize,
    width: usize,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct RawState {
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl TryFrom<RawState> for EncodedState {
    type Error = String;

    fn try_from(raw: RawState) -> Result<Self, Self::Error> {
        let (height, width, len) = (raw.height, raw.width, raw.data.len());
        Self::from_raw(height, width, raw.data)
            .ok_or_else(|| format!("{len} bytes do not fill a {height}x{width}x{CHANNELS} state"))
    }
}

impl EncodedState {
    /// Black image.
    #[must_use]
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![0; height * width * CHANNELS],
        }
    }

    /// Wrap raw row-major pixel bytes.
    ///
    /// Returns `None` when `data` does not match the shape.
    #[must_use]
    pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Option<Self> {
        let expected = height.checked_mul(width)?.checked_mul(CHANNELS)?;
        (data.len() == expected).then_some(Self {
            height,
            width,
            data,
        })
    }

    /// `(height, width, channels)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, CHANNELS)
    }

    /// Row-major pixel bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(row, col)`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; CHANNELS]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let i = (row * self.width + col) * CHANNELS;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    fn set(&mut self, row: usize, col: usize, colour: [u8; CHANNELS]) {
        if row < self.height && col < self.width {
            let i = (row * self.width + col) * CHANNELS;
            self.data[i..i + CHANNELS].copy_from_slice(&colour);
        }
    }

    /// Filled disc centred on `(row, col)`; clipped at the edges.
    fn fill_disc(&mut self, row: i64, col: i64, radius: i64, colour: [u8; CHANNELS]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let (r, c) = (row + dy, col + dx);
                if r >= 0 && c >= 0 {
                    self.set(r as usize, c as usize, colour);
                }
            }
        }
    }

    /// Horizontal bar of `len` pixels, `thickness` rows, starting at column 0.
    fn fill_bar(&mut self, row: usize, len: usize, thickness: usize, colour: [u8; CHANNELS]) {
        for r in row..row + thickness {
            for c in 0..len {
                self.set(r, c, colour);
            }
        }
    }
}

/// Disc radius and colour for an owned kind.
const fn owned_style(kind: UnitKind) -> (i64, [u8; CHANNELS]) {
    match kind {
        UnitKind::Nexus => (15, [0, 255, 0]),
        UnitKind::Pylon => (3, [20, 235, 0]),
        UnitKind::Assimilator => (2, [55, 200, 0]),
        UnitKind::Gateway => (3, [200, 100, 0]),
        UnitKind::CyberneticsCore => (3, [150, 150, 0]),
        UnitKind::Forge => (3, [120, 120, 60]),
        UnitKind::RoboticsFacility => (5, [215, 155, 0]),
        UnitKind::Stargate => (5, [255, 0, 0]),
        UnitKind::Probe => (1, [55, 200, 0]),
        UnitKind::Zealot => (1, [230, 60, 30]),
        UnitKind::Stalker => (2, [230, 120, 30]),
        UnitKind::VoidRay => (3, [255, 100, 0]),
        UnitKind::Observer => (1, [255, 255, 255]),
    }
}

const ENEMY_STRUCTURE_STYLE: (i64, [u8; CHANNELS]) = (5, [200, 50, 212]);
const ENEMY_COMBATANT_STYLE: (i64, [u8; CHANNELS]) = (1, [50, 0, 215]);
const ENEMY_WORKER_STYLE: (i64, [u8; CHANNELS]) = (1, [55, 0, 155]);

const BAR_COLOURS: [[u8; CHANNELS]; 4] = [
    [0, 255, 25],
    [220, 200, 200],
    [150, 150, 150],
    [0, 0, 255],
];

/// Renders snapshots into [`EncodedState`] images of a fixed shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEncoder {
    config: EncoderConfig,
}

impl StateEncoder {
    /// Create an encoder.
    #[must_use]
    pub const fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Shape every encoded state will have.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize, usize) {
        (self.config.height, self.config.width, CHANNELS)
    }

    /// Render one snapshot.
    #[must_use]
    pub fn encode(&self, snap: &WorldSnapshot) -> EncodedState {
        let mut image = EncodedState::zeros(self.config.height, self.config.width);

        for unit in snap.units.iter().filter(|u| u.is_ready) {
            let (radius, colour) = owned_style(unit.kind);
            let (row, col) = self.project(unit.position, snap.map_size);
            image.fill_disc(row, col, radius, colour);
        }
        for enemy in &snap.enemy_structures {
            let (radius, colour) = ENEMY_STRUCTURE_STYLE;
            let (row, col) = self.project(enemy.position, snap.map_size);
            image.fill_disc(row, col, radius, colour);
        }
        for enemy in &snap.enemy_units {
            let (radius, colour) = if enemy.is_combatant {
                ENEMY_COMBATANT_STYLE
            } else {
                ENEMY_WORKER_STYLE
            };
            let (row, col) = self.project(enemy.position, snap.map_size);
            image.fill_disc(row, col, radius, colour);
        }

        let bar_len = BAR_MAX_LEN.min(self.config.width);
        for ((row, colour), ratio) in BAR_ROWS
            .into_iter()
            .zip(BAR_COLOURS)
            .zip(indicator_ratios(snap))
        {
            let len = (ratio * Fixed::saturating_from_num(bar_len)).to_num::<i64>();
            image.fill_bar(row, len.max(0) as usize, 3, colour);
        }
        image
    }

    /// Map position to `(row, col)`, scaling to the image and flipping y.
    fn project(&self, pos: Vec2Fixed, map: MapSize) -> (i64, i64) {
        let scale = |v: Fixed, map_extent: u32, pixels: usize| -> i64 {
            if map_extent == 0 {
                return 0;
            }
            (v * Fixed::saturating_from_num(pixels) / Fixed::saturating_from_num(map_extent))
                .to_num::<i64>()
        };
        let col = scale(pos.x, map.width, self.config.width);
        let row = self.config.height as i64 - 1 - scale(pos.y, map.height, self.config.height);
        (row, col)
    }
}

/// The four indicator ratios, each clamped to `[0, 1]`.
#[must_use]
pub fn indicator_ratios(snap: &WorldSnapshot) -> [Fixed; 4] {
    let ratio = |num: u64, den: u64| -> Fixed {
        if den == 0 {
            return Fixed::ZERO;
        }
        (Fixed::saturating_from_num(num) / Fixed::saturating_from_num(den))
            .clamp(Fixed::ZERO, Fixed::from_num(1))
    };
    let combatants = snap.units.iter().filter(|u| u.kind.is_combatant()).count() as u64;
    [
        ratio(u64::from(snap.minerals), u64::from(RESOURCE_BAR_FULL)),
        ratio(u64::from(snap.vespene), u64::from(RESOURCE_BAR_FULL)),
        ratio(u64::from(snap.supply_left()), u64::from(snap.supply_cap)),
        ratio(combatants, u64::from(snap.supply_used)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{EnemyRef, UnitId, UnitRef};

    fn encoder() -> StateEncoder {
        StateEncoder::new(EncoderConfig::default())
    }

    #[test]
    fn test_shape_matches_config() {
        let state = encoder().encode(&WorldSnapshot::default());
        assert_eq!(state.shape(), (176, 200, 3));
        assert_eq!(state.as_slice().len(), 176 * 200 * 3);
    }

    #[test]
    fn test_nexus_drawn_flipped() {
        let snap = WorldSnapshot {
            units: vec![UnitRef {
                id: UnitId(1),
                kind: UnitKind::Nexus,
                position: Vec2Fixed::from_ints(100, 30),
                is_idle: true,
                is_ready: true,
                queue_empty: true,
                is_gathering: false,
                energy: 0,
            }],
            ..Default::default()
        };
        let state = encoder().encode(&snap);
        assert_eq!(state.pixel(175 - 30, 100), Some([0, 255, 0]));
        assert_eq!(state.pixel(30, 100), Some([0, 0, 0]));
    }

    #[test]
    fn test_unfinished_structures_not_drawn() {
        let snap = WorldSnapshot {
            units: vec![UnitRef {
                id: UnitId(1),
                kind: UnitKind::Nexus,
                position: Vec2Fixed::from_ints(100, 100),
                is_idle: true,
                is_ready: false,
                queue_empty: true,
                is_gathering: false,
                energy: 0,
            }],
            ..Default::default()
        };
        let state = encoder().encode(&snap);
        assert!(state.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_enemy_drawn_and_clipped_at_edge() {
        let snap = WorldSnapshot {
            enemy_structures: vec![EnemyRef {
                id: UnitId(9),
                position: Vec2Fixed::from_ints(0, 0),
                is_combatant: false,
            }],
            ..Default::default()
        };
        let state = encoder().encode(&snap);
        assert_eq!(state.pixel(175, 0), Some([200, 50, 212]));
    }

    #[test]
    fn test_mineral_bar_length() {
        let snap = WorldSnapshot {
            minerals: 750,
            ..Default::default()
        };
        let state = encoder().encode(&snap);
        assert_eq!(state.pixel(3, 24), Some([0, 255, 25]));
        assert_eq!(state.pixel(3, 25), Some([0, 0, 0]));
    }

    #[test]
    fn test_ratios_clamped() {
        let snap = WorldSnapshot {
            minerals: 9000,
            supply_used: 0,
            supply_cap: 0,
            ..Default::default()
        };
        let r = indicator_ratios(&snap);
        assert_eq!(r[0], Fixed::from_num(1));
        assert_eq!(r[2], Fixed::ZERO);
        assert_eq!(r[3], Fixed::ZERO);
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(EncodedState::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(EncodedState::from_raw(2, 2, vec![0; 11]).is_none());
        assert!(EncodedState::from_raw(usize::MAX, 2, Vec::new()).is_none());
    }

    #[test]
    fn test_deserialize_rejects_wrong_length() {
        let good: EncodedState =
            serde_json::from_str(r#"{"height":1,"width":2,"data":[1,2,3,4,5,6]}"#).unwrap();
        assert_eq!(good.pixel(0, 1), Some([4, 5, 6]));

        let short = r#"{"height":2,"width":2,"data":[0,0,0]}"#;
        assert!(serde_json::from_str::<EncodedState>(short).is_err());
    }
}
