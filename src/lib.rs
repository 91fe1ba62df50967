//! # evosim
//!
//! Evolving-population simulator: autonomous agents compete for food, mates
//! and survival in a bounded 2D world, passing mutated traits on to their
//! offspring.
//!
//! ## Features
//!
//! - **Priority-driven agents**: flee, hunt, seek a mate, seek food, wander
//! - **Energy economy**: metabolism scales with speed, size and vision
//! - **Parallel**: agent decisions run on all cores via Rayon
//! - **Reproducible**: seeded runs give identical results on any thread count
//! - **Configurable**: YAML configuration files, validated at startup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evosim::{Config, World};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut world = World::new_with_seed(Config::default(), 42)?;
//! world.run(1000);
//!
//! println!("Population: {}", world.population());
//! println!("Max generation: {}", world.generation_max());
//! println!("Average speed over time: {:?}", world.speed_history());
//! # Ok(())
//! # }
//! ```
//!
//! ## Checkpoints
//!
//! ```rust,no_run
//! use evosim::checkpoint::Checkpoint;
//! use evosim::{Config, World};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut world = World::try_new(Config::default())?;
//! world.run(1000);
//! world.create_checkpoint().save("checkpoint.bin")?;
//!
//! let restored = World::from_checkpoint(Checkpoint::load("checkpoint.bin")?)?;
//! assert_eq!(restored.time, 1000);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod food;
pub mod grid;
pub mod population;
pub mod spawn;
pub mod stats;
pub mod world;

// Re-export main types
pub use agent::{Agent, AgentId, BehaviorKind};
pub use config::{Config, ConfigError};
pub use grid::{Category, EntityRef, SpatialIndex, SpatialQuery};
pub use population::PopulationRegistry;
pub use stats::{StatsAggregator, StatsSample};
pub use world::World;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark on the default configuration
pub fn benchmark(steps: u64, population: usize) -> Result<BenchmarkResult, ConfigError> {
    use std::time::Instant;

    let mut config = Config::default();
    config.spawn.initial_population = population;
    config.simulation.max_population = config.simulation.max_population.max(population);

    let mut world = World::new_with_seed(config, 0)?;

    let start = Instant::now();
    world.run(steps);
    let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);

    Ok(BenchmarkResult {
        steps,
        initial_population: population,
        final_population: world.population(),
        elapsed_secs: elapsed,
        steps_per_second: steps as f64 / elapsed,
        max_generation: world.generation_max(),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: u64,
    pub initial_population: usize,
    pub final_population: usize,
    pub elapsed_secs: f64,
    pub steps_per_second: f64,
    pub max_generation: u32,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "Population: {} -> {}", self.initial_population, self.final_population)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} steps/s", self.steps_per_second)?;
        writeln!(f, "Max generation: {}", self.max_generation)?;
        Ok(())
    }
}
