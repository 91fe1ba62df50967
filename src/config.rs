//! Configuration system for the simulation.
//!
//! Supports YAML configuration files with sensible defaults. Every value is
//! checked by [`Config::validate`] before a world is built from it.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub world: WorldConfig,
    pub bounds: TraitBounds,
    pub agents: AgentConfig,
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Closed interval used for trait bounds and sampling ranges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// True when `other` lies entirely inside this range
    pub fn covers(&self, other: &Range) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    fn is_ordered(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// World geometry and interaction constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Half-width of the square world; positions live in [-extent, extent]
    pub extent: f32,
    /// Distance under which a prey, mate or food item counts as reached
    pub capture_distance: f32,
    /// Energy gained from one food unit
    pub food_energy: f32,
    /// Above this energy, foragers keep their distance from others
    pub crowding_energy: f32,
    /// Radius of the crowding-avoidance nudge
    pub separation_radius: f32,
    /// Corpse food is scattered within +- this offset of the body
    pub corpse_scatter: f32,
    /// Cell edge of the spatial hash grid
    pub spatial_cell_size: f32,
}

/// Global clamps applied to heritable traits after mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitBounds {
    pub speed: Range,
    pub size: Range,
    pub vision_range: Range,
    pub mutation_strength: Range,
}

/// Behavioral parameters every spawned agent starts with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Starting energy of first-generation agents
    pub initial_energy: f32,
    pub flee_distance: f32,
    pub mutation_strength: f32,
    /// Let mutation strength itself drift between generations
    pub evolve_mutation_strength: bool,
    /// Energy at which an agent starts looking for a mate
    pub reproduction_start: f32,
    /// Energy below which an agent stops looking for a mate
    pub reproduction_stop: f32,
    pub base_energy_usage: f32,
    pub size_energy_coeff: f32,
    pub vision_energy_coeff: f32,
    pub speed_energy_coeff: f32,
}

/// First-generation sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub initial_population: usize,
    /// Half-extents of the spawn rectangle (x, y)
    pub area: [f32; 2],
    pub speed: Range,
    pub size: Range,
    pub vision_range: Range,
    pub wander_time: Range,
}

/// Ambient food generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodConfig {
    /// Seconds between cluster spawns
    pub spawn_interval: f32,
    /// The spawner never grows the field past this many units
    pub max_food: usize,
    /// Clusters placed when the world is created
    pub initial_clusters: usize,
    /// Food units per cluster
    pub cluster_size: usize,
    /// Cluster units land within +- this offset of the cluster centre
    pub cluster_spread: f32,
}

/// Trait-average aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Simulated seconds between samples
    pub update_interval: f32,
    /// Keep at most this many samples; `None` keeps everything
    pub history_capacity: Option<usize>,
}

/// Step driving and safety limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Multiplier applied to every dt (0.1 - 10)
    pub time_scale: f32,
    /// Fixed dt used by the headless runner, in seconds
    pub tick_seconds: f32,
    /// Maximum allowed population; births past it are refused
    pub max_population: usize,
}

/// Logging and checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Steps between checkpoints
    pub checkpoint_interval: u64,
    /// Steps between stats logging
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            extent: 10.0,
            capture_distance: 0.5,
            food_energy: 1.0,
            crowding_energy: 5.0,
            separation_radius: 0.1,
            corpse_scatter: 0.5,
            spatial_cell_size: 2.0,
        }
    }
}

impl Default for TraitBounds {
    fn default() -> Self {
        Self {
            speed: Range::new(0.1, 60.0),
            size: Range::new(0.5, 6.0),
            vision_range: Range::new(1.0, 60.0),
            mutation_strength: Range::new(0.0, 1.0),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            initial_energy: 2.0,
            flee_distance: 0.5,
            mutation_strength: 0.1,
            evolve_mutation_strength: false,
            reproduction_start: 1.5,
            reproduction_stop: 1.0,
            base_energy_usage: 0.1,
            size_energy_coeff: 0.3,
            vision_energy_coeff: 0.02,
            speed_energy_coeff: 0.1,
        }
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            initial_population: 30,
            area: [10.0, 5.0],
            speed: Range::new(0.5, 5.0),
            size: Range::new(0.5, 1.5),
            vision_range: Range::new(1.0, 10.0),
            wander_time: Range::new(0.5, 5.0),
        }
    }
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            spawn_interval: 5.0,
            max_food: 50,
            initial_clusters: 20,
            cluster_size: 2,
            cluster_spread: 3.0,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            update_interval: 1.0,
            history_capacity: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            tick_seconds: 0.02,
            max_population: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 5000,
            stats_interval: 50,
            log_level: "info".to_string(),
        }
    }
}

/// Errors raised while loading or validating a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Allowed range of the simulation time scale
pub const TIME_SCALE_RANGE: Range = Range::new(0.1, 10.0);

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let world = &self.world;
        if !(world.extent > 0.0) {
            return invalid("world.extent must be > 0".into());
        }
        if !(world.capture_distance > 0.0) {
            return invalid("world.capture_distance must be > 0".into());
        }
        if !(world.spatial_cell_size > 0.0) {
            return invalid("world.spatial_cell_size must be > 0".into());
        }
        let non_negative = [
            ("world.food_energy", world.food_energy),
            ("world.crowding_energy", world.crowding_energy),
            ("world.separation_radius", world.separation_radius),
            ("world.corpse_scatter", world.corpse_scatter),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return invalid(format!("{name} must be >= 0"));
            }
        }

        let bounds = [
            ("bounds.speed", &self.bounds.speed),
            ("bounds.size", &self.bounds.size),
            ("bounds.vision_range", &self.bounds.vision_range),
            ("bounds.mutation_strength", &self.bounds.mutation_strength),
        ];
        for (name, range) in bounds {
            if !range.is_ordered() {
                return invalid(format!("{name} must satisfy min <= max"));
            }
        }
        if self.bounds.speed.min < 0.0 || self.bounds.size.min <= 0.0 || self.bounds.vision_range.min <= 0.0 {
            return invalid("speed must be >= 0, size and vision_range must be > 0".into());
        }
        if !(self.bounds.mutation_strength.min >= 0.0) {
            return invalid("bounds.mutation_strength.min must be >= 0".into());
        }

        let spawn = &self.spawn;
        let sampled = [
            ("spawn.speed", &spawn.speed, &self.bounds.speed),
            ("spawn.size", &spawn.size, &self.bounds.size),
            ("spawn.vision_range", &spawn.vision_range, &self.bounds.vision_range),
        ];
        for (name, range, bound) in sampled {
            if !range.is_ordered() {
                return invalid(format!("{name} must satisfy min <= max"));
            }
            if !bound.covers(range) {
                return invalid(format!(
                    "{name} [{}, {}] lies outside the trait bounds [{}, {}]",
                    range.min, range.max, bound.min, bound.max
                ));
            }
        }
        if !spawn.wander_time.is_ordered() || spawn.wander_time.min <= 0.0 {
            return invalid("spawn.wander_time must be a positive, ordered range".into());
        }
        if spawn.area.iter().any(|&half| !(half >= 0.0) || half > world.extent) {
            return invalid("spawn.area must lie inside the world extent".into());
        }

        let agents = &self.agents;
        if !(agents.initial_energy > 0.0) {
            return invalid("agents.initial_energy must be > 0".into());
        }
        if !self.bounds.mutation_strength.contains(agents.mutation_strength) {
            return invalid("agents.mutation_strength lies outside bounds.mutation_strength".into());
        }
        if agents.reproduction_stop > agents.reproduction_start {
            return invalid("agents.reproduction_stop cannot exceed reproduction_start".into());
        }
        let coeffs = [
            agents.base_energy_usage,
            agents.size_energy_coeff,
            agents.vision_energy_coeff,
            agents.speed_energy_coeff,
            agents.flee_distance,
        ];
        if coeffs.iter().any(|&c| !(c >= 0.0)) {
            return invalid("energy coefficients and flee_distance must be >= 0".into());
        }

        if !(self.food.spawn_interval > 0.0) || !(self.food.cluster_spread >= 0.0) {
            return invalid("food.spawn_interval must be > 0 and cluster_spread >= 0".into());
        }
        if !(self.stats.update_interval > 0.0) {
            return invalid("stats.update_interval must be > 0".into());
        }
        if self.stats.history_capacity == Some(0) {
            return invalid("stats.history_capacity must be > 0 when set".into());
        }

        let sim = &self.simulation;
        if !TIME_SCALE_RANGE.contains(sim.time_scale) {
            return invalid(format!(
                "simulation.time_scale must be between {} and {}",
                TIME_SCALE_RANGE.min, TIME_SCALE_RANGE.max
            ));
        }
        if !(sim.tick_seconds > 0.0) {
            return invalid("simulation.tick_seconds must be > 0".into());
        }
        if sim.max_population == 0 {
            return invalid("simulation.max_population must be > 0".into());
        }
        if spawn.initial_population > sim.max_population {
            return invalid("initial_population cannot exceed max_population".into());
        }
        if self.logging.stats_interval == 0 || self.logging.checkpoint_interval == 0 {
            return invalid("logging intervals must be > 0".into());
        }
        Ok(())
    }
}
