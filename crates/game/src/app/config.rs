use std::env;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub(crate) const CONFIG_PATH_ENV_VAR: &str = "DUNGEON_CONFIG";
pub(crate) const SEED_ENV_VAR: &str = "DUNGEON_SEED";
pub(crate) const MAX_TICKS_ENV_VAR: &str = "DUNGEON_MAX_TICKS";

const MIN_WORLD_SIZE: u32 = 6;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) seed: u64,
    pub(crate) world_size: u32,
    pub(crate) target_tps: u32,
    pub(crate) max_ticks: Option<u64>,
    /// Ends the run once the player reaches this depth.
    pub(crate) max_depth: Option<u32>,
    pub(crate) mobs_per_depth: u32,
    pub(crate) autopilot: bool,
    pub(crate) player: PlayerConfig,
    pub(crate) skeleton: SkeletonConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            world_size: 32,
            target_tps: 30,
            max_ticks: None,
            max_depth: None,
            mobs_per_depth: 3,
            autopilot: true,
            player: PlayerConfig::default(),
            skeleton: SkeletonConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PlayerConfig {
    pub(crate) max_health: u32,
    pub(crate) strength: u32,
    pub(crate) armor: u32,
    pub(crate) backpack_slots: u32,
    pub(crate) weapon: Option<WeaponConfig>,
    pub(crate) regeneration: Option<RegenerationConfig>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            strength: 0,
            armor: 0,
            backpack_slots: 8,
            weapon: None,
            regeneration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WeaponConfig {
    pub(crate) name: String,
    pub(crate) cooldown_seconds: f64,
    pub(crate) min_damage: u32,
    pub(crate) max_damage: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RegenerationConfig {
    pub(crate) cooldown_seconds: f64,
    pub(crate) amount: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SkeletonConfig {
    pub(crate) max_health: u32,
    pub(crate) seek_chance: f64,
    pub(crate) strike_damage: u32,
    pub(crate) strike_pause_seconds: f64,
    pub(crate) lunge_seconds: f32,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            max_health: 10,
            seek_chance: 0.03,
            strike_damage: 8,
            strike_pause_seconds: 1.0,
            lunge_seconds: 0.1,
        }
    }
}

impl GameConfig {
    /// Defaults, then the optional JSON file, then env overrides, then validation.
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        let config_path = read_env(CONFIG_PATH_ENV_VAR)?.map(PathBuf::from);
        let seed = read_env(SEED_ENV_VAR)?;
        let max_ticks = read_env(MAX_TICKS_ENV_VAR)?;
        Self::resolve(config_path.as_deref(), seed.as_deref(), max_ticks.as_deref())
    }

    pub(crate) fn resolve(
        config_path: Option<&Path>,
        seed_override: Option<&str>,
        max_ticks_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        if let Some(raw) = seed_override {
            config.seed = parse_env_value(SEED_ENV_VAR, raw)?;
        }
        if let Some(raw) = max_ticks_override {
            config.max_ticks = Some(parse_env_value(MAX_TICKS_ENV_VAR, raw)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_json(&raw)
    }

    pub(crate) fn parse_json(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            ConfigError::Parse {
                path,
                source: error.into_inner(),
            }
        })
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.world_size < MIN_WORLD_SIZE {
            return Err(expected_actual(
                "world_size",
                format!(">= {MIN_WORLD_SIZE}"),
                self.world_size,
            ));
        }
        if self.target_tps == 0 {
            return Err(expected_actual("target_tps", ">= 1", self.target_tps));
        }
        if self.player.max_health == 0 {
            return Err(expected_actual("player.max_health", ">= 1", 0));
        }
        if let Some(weapon) = &self.player.weapon {
            if !weapon.cooldown_seconds.is_finite() || weapon.cooldown_seconds <= 0.0 {
                return Err(expected_actual(
                    "player.weapon.cooldown_seconds",
                    "finite number > 0",
                    weapon.cooldown_seconds,
                ));
            }
            if weapon.min_damage > weapon.max_damage {
                return Err(expected_actual(
                    "player.weapon.min_damage",
                    format!("<= max_damage ({})", weapon.max_damage),
                    weapon.min_damage,
                ));
            }
        }
        if let Some(regeneration) = &self.player.regeneration {
            check_seconds(
                "player.regeneration.cooldown_seconds",
                regeneration.cooldown_seconds,
            )?;
        }
        if self.skeleton.max_health == 0 {
            return Err(expected_actual("skeleton.max_health", ">= 1", 0));
        }
        if !self.skeleton.seek_chance.is_finite() || !(0.0..=1.0).contains(&self.skeleton.seek_chance)
        {
            return Err(expected_actual(
                "skeleton.seek_chance",
                "value in [0, 1]",
                self.skeleton.seek_chance,
            ));
        }
        check_seconds(
            "skeleton.strike_pause_seconds",
            self.skeleton.strike_pause_seconds,
        )?;
        if !self.skeleton.lunge_seconds.is_finite() || self.skeleton.lunge_seconds <= 0.0 {
            return Err(expected_actual(
                "skeleton.lunge_seconds",
                "finite number > 0",
                self.skeleton.lunge_seconds,
            ));
        }
        Ok(())
    }
}

fn read_env(var: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(value)) => Err(ConfigError::Env {
            var,
            value: value.to_string_lossy().into_owned(),
        }),
    }
}

fn parse_env_value<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: raw.to_string(),
    })
}

fn check_seconds(path: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(expected_actual(path, "finite number >= 0", value));
    }
    Ok(())
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_string(),
        message: format!("expected {expected}, got {actual}"),
    }
}
