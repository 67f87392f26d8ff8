//! Configuration
//!
//! Every effect-bearing tunable of the simulation and the sync protocol.
//! Defaults are the tuned gameplay values; a JSON file
//! may override any subset of fields.

use std::env;
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::game::maze::GameSize;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "TANK_ARENA_CONFIG";

/// Highest tick rate the driver accepts (Hz).
pub const MAX_TICK_RATE: u32 = 1_000;

/// World bounds envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Smallest accepted world size.
    pub min_size: GameSize,
    /// Largest accepted world size.
    pub max_size: GameSize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min_size: GameSize::new(320.0, 240.0),
            max_size: GameSize::new(1920.0, 1080.0),
        }
    }
}

/// Tank movement and weapon tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    /// Distance travelled per tick while driving.
    pub speed: f64,
    /// Body edge length.
    pub size: f64,
    /// Heading change per tick while turning (radians).
    pub rotation_step: f64,
    /// Turret length beyond the body front.
    pub turret_size: f64,
    /// Live bullets a tank may own at once.
    pub max_bullets: usize,
    /// Minimum time between shots (ms).
    pub shoot_cooldown_ms: u64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            size: 40.0,
            rotation_step: 0.1,
            turret_size: 20.0,
            max_bullets: 10,
            shoot_cooldown_ms: 200,
        }
    }
}

/// Bullet tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletConfig {
    /// Distance travelled per tick.
    pub speed: f64,
    /// Edge length of the bullet's square bounding box.
    pub size: f64,
    /// Age at which the bullet expires (seconds).
    pub lifetime_secs: f64,
    /// Age at which fading starts (seconds).
    pub fade_start_secs: f64,
    /// Alpha never drops below this before expiry.
    pub min_alpha: f64,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            size: 10.0,
            lifetime_secs: 2.7,
            fade_start_secs: 2.0,
            min_alpha: 0.4,
        }
    }
}

/// Maze wall tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Cell size of the maze grid.
    pub size: f64,
    /// Probability threshold below which a cell becomes a wall.
    pub density: f64,
    /// How long a traversal highlight stays visible (ms).
    pub highlight_ms: u64,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            size: 100.0,
            density: 0.3,
            highlight_ms: 300,
        }
    }
}

/// Liveness and authority timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interval between PING broadcasts (ms).
    pub ping_interval_ms: u64,
    /// Silence after which a remote tank is purged (ms).
    pub ping_timeout_ms: u64,
    /// How long a non-authority waits for the authority's maze (ms).
    pub maze_wait_ms: u64,
    /// Simulation ticks per second driven by the peer driver.
    pub tick_rate: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 10_000,
            ping_timeout_ms: 15_000,
            maze_wait_ms: 3_000,
            tick_rate: 60,
        }
    }
}

/// Wall-teleport gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleportConfig {
    /// Maximum angle between travel direction and wall centre (radians).
    pub max_angle: f64,
    /// Maximum number of probe iterations per maneuver.
    pub max_probes: usize,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            max_angle: std::f64::consts::FRAC_PI_4,
            max_probes: 200,
        }
    }
}

/// Round lifecycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// How long the win/lose message is shown before a new round (ms).
    pub restart_delay_ms: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self { restart_delay_ms: 3_000 }
    }
}

/// Complete game configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// World bounds envelope
    pub world: WorldConfig,
    /// Tank tuning
    pub tank: TankConfig,
    /// Bullet tuning
    pub bullet: BulletConfig,
    /// Wall tuning
    pub wall: WallConfig,
    /// Liveness timing
    pub network: NetworkConfig,
    /// Teleport gates
    pub teleport: TeleportConfig,
    /// Round timing
    pub round: RoundConfig,
}

impl GameConfig {
    /// Parse a (partial) JSON config and validate it.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Load from the file named by [`CONFIG_PATH_ENV`], or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Probe step used by wall-teleport scans.
    #[inline]
    pub fn probe_step(&self) -> f64 {
        self.tank.size / 16.0
    }

    /// Reject values that would break the simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("world.min_size.width", self.world.min_size.width),
            ("world.min_size.height", self.world.min_size.height),
            ("tank.speed", self.tank.speed),
            ("tank.size", self.tank.size),
            ("bullet.speed", self.bullet.speed),
            ("bullet.size", self.bullet.size),
            ("bullet.lifetime_secs", self.bullet.lifetime_secs),
            ("wall.size", self.wall.size),
            ("teleport.max_angle", self.teleport.max_angle),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be a positive finite number",
                });
            }
        }

        if self.world.min_size.width > self.world.max_size.width
            || self.world.min_size.height > self.world.max_size.height
        {
            return Err(ConfigError::Invalid {
                field: "world",
                reason: "min_size exceeds max_size",
            });
        }

        if self.bullet.fade_start_secs >= self.bullet.lifetime_secs {
            return Err(ConfigError::Invalid {
                field: "bullet.fade_start_secs",
                reason: "must be below bullet.lifetime_secs",
            });
        }

        if !(0.0..=1.0).contains(&self.bullet.min_alpha) {
            return Err(ConfigError::Invalid {
                field: "bullet.min_alpha",
                reason: "must lie in [0, 1]",
            });
        }

        if self.network.ping_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "network.ping_interval_ms",
                reason: "must be non-zero",
            });
        }

        if !(1..=MAX_TICK_RATE).contains(&self.network.tick_rate) {
            return Err(ConfigError::Invalid {
                field: "network.tick_rate",
                reason: "must lie in [1, 1000]",
            });
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config value {field}: {reason}")]
    Invalid {
        /// Offending field path
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}
