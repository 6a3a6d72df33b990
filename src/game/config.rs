//! Session configuration.
//!
//! Every field has a default so that a partial TOML file (or none at all)
//! yields a playable session.
//!
//! ```toml
//! [simulation]
//! delta_time = 0.016666668
//!
//! [spawner]
//! interval = 0.5
//! seed = 7
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while loading a [`GameConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted name of the rejected field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Tick timing and threading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed tick length in seconds.
    pub delta_time: f32,
    /// Dedicated worker threads; `0` uses the global rayon pool.
    pub worker_threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { delta_time: 1.0 / 60.0, worker_threads: 0 }
    }
}

/// Player prefab tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Units per second.
    pub move_speed: f32,
    /// Starting and maximum hit points.
    pub hit_points: i32,
    /// Seconds between attacks.
    pub attack_cooldown: f64,
    /// Half extent of the attack detection box.
    pub detection_size: f32,
    /// Radius of the circle collider.
    pub collider_radius: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            hit_points: 100,
            attack_cooldown: 1.5,
            detection_size: 10.0,
            collider_radius: 0.5,
        }
    }
}

/// Enemy prefab tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    /// Units per second.
    pub move_speed: f32,
    /// Starting and maximum hit points.
    pub hit_points: i32,
    /// Damage dealt per contact.
    pub attack_damage: i32,
    /// Seconds between attacks.
    pub attack_cooldown: f64,
    /// Radius of the circle collider.
    pub collider_radius: f32,
    /// Whether dying enemies leave a gem behind.
    pub drops_gem: bool,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            move_speed: 2.5,
            hit_points: 10,
            attack_damage: 1,
            attack_cooldown: 1.0,
            collider_radius: 0.5,
            drops_gem: true,
        }
    }
}

/// Projectile prefab tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Units per second.
    pub move_speed: f32,
    /// Damage dealt on hit.
    pub damage: i32,
    /// Radius of the circle collider.
    pub collider_radius: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self { move_speed: 15.0, damage: 5, collider_radius: 0.25 }
    }
}

/// Enemy spawner tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Seconds between spawns.
    pub interval: f32,
    /// Spawn distance from the player.
    pub distance: f32,
    /// RNG seed of the spawner.
    pub seed: u64,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self { interval: 0.5, distance: 15.0, seed: 1 }
    }
}

/// Gem prefab tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemConfig {
    /// Radius of the circle collider.
    pub collider_radius: f32,
}

impl Default for GemConfig {
    fn default() -> Self {
        Self { collider_radius: 0.25 }
    }
}

/// Physics backend tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Edge length of a broad-phase grid cell.
    pub cell_size: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self { cell_size: 2.0 }
    }
}

/// Complete session configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tick timing and threading.
    pub simulation: SimulationConfig,
    /// Player settings.
    pub player: PlayerConfig,
    /// Enemy settings.
    pub enemy: EnemyConfig,
    /// Projectile settings.
    pub projectile: ProjectileConfig,
    /// Spawner settings.
    pub spawner: SpawnerConfig,
    /// Gem settings.
    pub gem: GemConfig,
    /// Physics settings.
    pub physics: PhysicsConfig,
}

impl GameConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks ranges the simulation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if !(self.simulation.delta_time > 0.0) {
            return invalid("simulation.delta_time", "must be positive");
        }
        if self.player.hit_points <= 0 {
            return invalid("player.hit_points", "must be positive");
        }
        if self.enemy.hit_points <= 0 {
            return invalid("enemy.hit_points", "must be positive");
        }
        if self.enemy.attack_damage < 0 || self.projectile.damage < 0 {
            return invalid("damage", "must not be negative");
        }
        if !(self.spawner.interval > 0.0) {
            return invalid("spawner.interval", "must be positive");
        }
        if !(self.physics.cell_size > 0.0) {
            return invalid("physics.cell_size", "must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config = GameConfig::from_toml_str("[spawner]\nseed = 42\n").unwrap();
        assert_eq!(config.spawner.seed, 42);
        assert_eq!(config.spawner.interval, SpawnerConfig::default().interval);
        assert_eq!(config.player, PlayerConfig::default());
    }

    #[test]
    fn rejects_non_positive_delta() {
        let err = GameConfig::from_toml_str("[simulation]\ndelta_time = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "simulation.delta_time", .. }));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = GameConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(GameConfig::from_toml_str(&text).unwrap(), config);
    }
}
