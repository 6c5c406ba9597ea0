//! Agent configuration.
//!
//! Every tunable the managers read lives here. Configurations are plain
//! RON files; anything left out falls back to [`Default`].
//!
//! ```ron
//! (
//!     seed: 7,
//!     tactics: (mode: Choice, attack_threshold: 12),
//!     learning: (record_samples: true, output_dir: "train_data"),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted distance setting, in map tiles.
pub const MAX_DISTANCE: u32 = 4096;

/// Largest accepted base-count setting.
pub const MAX_BASES: u32 = 64;

/// Largest accepted hold cooldown bound, in hundredths of a minute.
pub const MAX_HOLD_HUNDREDTHS: u32 = 60 * 100;

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found.
    #[error("Config file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Values parsed but contradict each other.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Complete agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Seed for jitter, placement anchors and exploration choices.
    pub seed: u64,
    /// Worker, supply, gas and expansion settings.
    pub economy: EconomyConfig,
    /// Tech structure settings.
    pub production: ProductionConfig,
    /// Army training settings.
    pub force: ForceConfig,
    /// Reconnaissance settings.
    pub scouting: ScoutConfig,
    /// Attack decision settings.
    pub tactics: TacticsConfig,
    /// Sample recording and policy model settings.
    pub learning: LearningConfig,
    /// Encoded state dimensions.
    pub encoder: EncoderConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            economy: EconomyConfig::default(),
            production: ProductionConfig::default(),
            force: ForceConfig::default(),
            scouting: ScoutConfig::default(),
            tactics: TacticsConfig::default(),
            learning: LearningConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that contradict each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tactics;
        if t.defend_threshold > t.attack_threshold {
            return Err(ConfigError::Invalid(format!(
                "defend_threshold {} exceeds attack_threshold {}",
                t.defend_threshold, t.attack_threshold
            )));
        }
        if t.hold_jitter_min >= t.hold_jitter_max {
            return Err(ConfigError::Invalid(format!(
                "hold jitter range {}..{} is empty",
                t.hold_jitter_min, t.hold_jitter_max
            )));
        }
        let e = &self.economy;
        if e.min_expansion_cap > e.max_expansion_cap {
            return Err(ConfigError::Invalid(format!(
                "min_expansion_cap {} exceeds max_expansion_cap {}",
                e.min_expansion_cap, e.max_expansion_cap
            )));
        }
        at_most("economy.geyser_radius", e.geyser_radius, MAX_DISTANCE)?;
        at_most("economy.extractor_clearance", e.extractor_clearance, MAX_DISTANCE)?;
        at_most("economy.max_expansion_cap", e.max_expansion_cap, MAX_BASES)?;
        at_most("tactics.defend_radius", t.defend_radius, MAX_DISTANCE)?;
        at_most("tactics.hold_jitter_max", t.hold_jitter_max, MAX_HOLD_HUNDREDTHS)?;
        if self.encoder.height == 0 || self.encoder.width == 0 {
            return Err(ConfigError::Invalid("encoder shape must be non-empty".into()));
        }
        if self.scouting.jitter_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "scout jitter {}% exceeds 100%",
                self.scouting.jitter_percent
            )));
        }
        Ok(())
    }
}

fn at_most(name: &str, value: u32, max: u32) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::Invalid(format!("{name} {value} exceeds {max}")));
    }
    Ok(())
}

/// Worker, supply, gas and expansion tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Hard worker cap.
    pub max_workers: u32,
    /// Soft target contribution of each primary base.
    pub workers_per_base: u32,
    /// Soft target contribution of each gas extractor.
    pub workers_per_extractor: u32,
    /// Build supply when headroom drops below this.
    pub supply_threshold: u32,
    /// Geysers within this distance of a base are taken.
    pub geyser_radius: u32,
    /// An extractor within this distance of a geyser occupies it.
    pub extractor_clearance: u32,
    /// Expansion cap at the start of the match.
    pub min_expansion_cap: u32,
    /// Expansion cap ceiling.
    pub max_expansion_cap: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            max_workers: 50,
            workers_per_base: 16,
            workers_per_extractor: 3,
            supply_threshold: 10,
            geyser_radius: 15,
            extractor_clearance: 1,
            min_expansion_cap: 3,
            max_expansion_cap: 5,
        }
    }
}

/// Tech structure tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Gateways to keep.
    pub target_gateways: u32,
    /// Build a forge once the tech-core is ready.
    pub build_forge: bool,
    /// Build a robotics facility once the tech-core is ready.
    pub build_robotics: bool,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            target_gateways: 1,
            build_forge: false,
            build_robotics: true,
        }
    }
}

/// Army training tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    /// Minimum headroom before training a capital air unit.
    pub capital_supply_headroom: u32,
    /// Minimum headroom before training a light ground unit.
    pub light_supply_headroom: u32,
    /// Train ground units from gateways.
    pub train_gateway_units: bool,
    /// Never let ground units outnumber air units.
    pub balance_composition: bool,
    /// Observers to keep.
    pub max_observers: u32,
    /// Spend priority boost on fresh production.
    pub use_priority_boost: bool,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            capital_supply_headroom: 4,
            light_supply_headroom: 2,
            train_gateway_units: true,
            balance_composition: true,
            max_observers: 1,
            use_priority_boost: true,
        }
    }
}

/// Reconnaissance tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Maximum perturbation per coordinate, as a percentage of the coordinate.
    pub jitter_percent: u32,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self { jitter_percent: 20 }
    }
}

/// How the attack decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TacticsMode {
    /// Two-threshold escalation rule.
    #[default]
    Escalation,
    /// Pick one of the four labels: from the policy model when loaded,
    /// otherwise uniformly at random.
    Choice,
}

/// Attack decision tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Selection mode.
    pub mode: TacticsMode,
    /// Idle army size that triggers a full attack.
    pub attack_threshold: u32,
    /// Idle army size that defends against enemies near a base.
    pub defend_threshold: u32,
    /// Distance from a base that counts as "near".
    pub defend_radius: u32,
    /// Hold cooldown lower bound, in hundredths of a minute (inclusive).
    pub hold_jitter_min: u32,
    /// Hold cooldown upper bound, in hundredths of a minute (exclusive).
    pub hold_jitter_max: u32,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            mode: TacticsMode::Escalation,
            attack_threshold: 8,
            defend_threshold: 2,
            defend_radius: 25,
            hold_jitter_min: 7,
            hold_jitter_max: 100,
        }
    }
}

/// Sample recording and policy model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Record (label, state) pairs whenever a choice is made in
    /// [`TacticsMode::Choice`].
    pub record_samples: bool,
    /// Frozen policy model; absent means uniform random choice.
    pub model_path: Option<PathBuf>,
    /// Where won sessions flush their samples.
    pub output_dir: PathBuf,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            record_samples: false,
            model_path: None,
            output_dir: PathBuf::from("train_data"),
        }
    }
}

/// Encoded state dimensions (channels are always 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Rows.
    pub height: usize,
    /// Columns.
    pub width: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            height: 176,
            width: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config =
            AgentConfig::from_ron_str("(seed: 7, tactics: (mode: Choice, attack_threshold: 12))")
                .expect("valid config");
        assert_eq!(config.seed, 7);
        assert_eq!(config.tactics.mode, TacticsMode::Choice);
        assert_eq!(config.tactics.attack_threshold, 12);
        assert_eq!(config.tactics.defend_radius, 25);
        assert_eq!(config.economy.max_workers, 50);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = AgentConfig::from_ron_str("(tactics: (attack_threshold: 2, defend_threshold: 5))")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_empty_jitter_range() {
        let err = AgentConfig::from_ron_str("(tactics: (hold_jitter_min: 50, hold_jitter_max: 50))")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_out_of_range_distances() {
        for ron in [
            "(tactics: (defend_radius: 4294967295))",
            "(economy: (geyser_radius: 3000000000))",
            "(economy: (extractor_clearance: 4097))",
            "(economy: (max_expansion_cap: 3000000000))",
            "(tactics: (hold_jitter_max: 4294967295))",
        ] {
            let err = AgentConfig::from_ron_str(ron).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{ron} should be rejected");
        }
        let edge = format!("(tactics: (defend_radius: {MAX_DISTANCE}))");
        assert!(AgentConfig::from_ron_str(&edge).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = AgentConfig::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = AgentConfig::from_ron_str("(seed: \"seven\")").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
