//! World simulation engine - main simulation loop.

use crate::agent::{Agent, AgentId, Effect, TickContext, TickOutcome};
use crate::checkpoint::Checkpoint;
use crate::config::{Config, ConfigError, TIME_SCALE_RANGE};
use crate::food::{FoodField, FoodId, FoodSpawner};
use crate::grid::{EntityRef, SpatialIndex};
use crate::population::PopulationRegistry;
use crate::spawn;
use crate::stats::{Stats, StatsAggregator, StatsHistory};
use glam::Vec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::VecDeque;

/// Odd constant used to decorrelate derived seeds
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// RNG for world-level randomness during step `time`
fn step_rng(seed: u64, time: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ time.wrapping_add(1).wrapping_mul(SEED_MIX))
}

/// RNG for one agent's tick, independent of thread scheduling
fn agent_rng(tick_seed: u64, id: AgentId) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(tick_seed ^ id.wrapping_add(1).wrapping_mul(SEED_MIX).rotate_left(17))
}

/// The simulation world
pub struct World {
    // Population
    agents: PopulationRegistry,

    // Environment
    food: FoodField,
    spawner: FoodSpawner,
    spatial_index: SpatialIndex,

    // State
    pub time: u64,
    pub elapsed: f32,
    time_scale: f32,

    // Configuration
    pub config: Config,

    // Statistics
    pub stats: Stats,
    pub stats_history: StatsHistory,
    aggregator: StatsAggregator,

    // ID generation
    next_agent_id: AgentId,

    seed: u64,
}

impl World {
    /// Create a world with a random seed
    pub fn try_new(config: Config) -> Result<Self, ConfigError> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create a world with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let agents: PopulationRegistry =
            spawn::initial_population(&config, 0, &mut rng).into_iter().collect();
        let next_agent_id = agents.len() as AgentId;

        let mut food = FoodField::new();
        let spawner = FoodSpawner::new(config.food.clone(), config.world.extent);
        spawner.seed(&mut food, &mut rng);

        let spatial_index = SpatialIndex::from_world(config.world.spatial_cell_size, &agents, &food);

        log::info!(
            "World created: {} agents, {} food, extent {}, seed {}",
            agents.len(),
            food.len(),
            config.world.extent,
            seed
        );

        let mut world = Self {
            agents,
            food,
            spawner,
            spatial_index,
            time: 0,
            elapsed: 0.0,
            time_scale: config.simulation.time_scale,
            stats: Stats::new(),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            aggregator: StatsAggregator::new(config.stats.update_interval, config.stats.history_capacity),
            next_agent_id,
            seed,
            config,
        };
        world.update_stats();

        Ok(world)
    }

    /// Restore a world from a checkpoint
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, ConfigError> {
        checkpoint.config.validate()?;
        let config = checkpoint.config;
        let spatial_index = SpatialIndex::from_world(
            config.world.spatial_cell_size,
            &checkpoint.population,
            &checkpoint.food,
        );

        log::info!(
            "World restored at step {} with {} agents",
            checkpoint.time,
            checkpoint.population.len()
        );

        Ok(Self {
            agents: checkpoint.population,
            food: checkpoint.food,
            spawner: checkpoint.spawner,
            spatial_index,
            time: checkpoint.time,
            elapsed: checkpoint.elapsed,
            time_scale: TIME_SCALE_RANGE.clamp(checkpoint.time_scale),
            stats: checkpoint.stats,
            stats_history: StatsHistory::new(config.logging.stats_interval),
            aggregator: checkpoint.aggregator,
            next_agent_id: checkpoint.next_agent_id,
            seed: checkpoint.seed,
            config,
        })
    }

    /// Create checkpoint of current state
    pub fn create_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: Checkpoint::VERSION,
            time: self.time,
            elapsed: self.elapsed,
            time_scale: self.time_scale,
            config: self.config.clone(),
            population: self.agents.clone(),
            food: self.food.clone(),
            spawner: self.spawner.clone(),
            aggregator: self.aggregator.clone(),
            stats: self.stats.clone(),
            next_agent_id: self.next_agent_id,
            seed: self.seed,
        }
    }

    /// Advance by the configured fixed tick
    pub fn step(&mut self) {
        self.step_by(self.config.simulation.tick_seconds);
    }

    /// Advance by `wall_dt` seconds, scaled by the current time scale
    pub fn step_by(&mut self, wall_dt: f32) {
        let dt = wall_dt * self.time_scale;
        let mut rng = step_rng(self.seed, self.time);
        let tick_seed: u64 = rng.gen();

        self.stats.births = 0;
        self.stats.deaths = 0;
        self.stats.kills = 0;
        self.stats.food_eaten = 0;

        // Phase 1: parallel decisions against the current snapshot
        let decisions = self.decide(dt, tick_seed);

        // Phase 2: sequential commit in id order
        self.commit(decisions, &mut rng);

        // Phase 3: environment and aggregation
        self.spawner.advance(dt, &mut self.food, &mut rng);
        self.spatial_index.rebuild(&self.agents, &self.food);
        self.aggregator.advance(dt, &self.agents);

        self.time += 1;
        self.elapsed += dt;
        self.update_stats();
    }

    /// Run every agent's tick in parallel on a clone
    fn decide(&self, dt: f32, tick_seed: u64) -> Vec<(Agent, TickOutcome)> {
        let ctx = TickContext {
            spatial: &self.spatial_index,
            population: &self.agents,
            food: &self.food,
            config: &self.config,
        };
        let snapshot: Vec<&Agent> = self.agents.all().collect();

        snapshot
            .par_iter()
            .map(|&agent| {
                let mut next = agent.clone();
                let mut rng = agent_rng(tick_seed, agent.id);
                let outcome = next.tick(dt, &ctx, &mut rng);
                (next, outcome)
            })
            .collect()
    }

    /// Apply decisions, re-validating every interaction against the live state
    fn commit(&mut self, decisions: Vec<(Agent, TickOutcome)>, rng: &mut ChaCha8Rng) {
        for (mut agent, outcome) in decisions {
            // eaten earlier in this commit
            if !self.agents.contains(agent.id) {
                continue;
            }

            for effect in outcome.effects {
                match effect {
                    Effect::Devour { prey, gain } => {
                        if self.agents.remove(prey).is_some() {
                            self.stats.kills += 1;
                            log::trace!("agent {} ate agent {}", agent.id, prey);
                        } else {
                            agent.energy = (agent.energy - gain).max(0.0);
                            agent.kills = agent.kills.saturating_sub(1);
                        }
                    }
                    Effect::Eat { food, gain } => {
                        if self.food.remove(food).is_some() {
                            self.stats.food_eaten += 1;
                        } else {
                            agent.energy = (agent.energy - gain).max(0.0);
                            agent.food_eaten = agent.food_eaten.saturating_sub(1);
                        }
                    }
                    Effect::Birth(child) => {
                        if self.agents.len() >= self.config.simulation.max_population {
                            agent.energy += child.energy;
                            agent.offspring_count = agent.offspring_count.saturating_sub(1);
                            continue;
                        }
                        let id = self.allocate_id();
                        log::trace!(
                            "agent {} born to {} and {} (gen {})",
                            id,
                            child.parent,
                            child.mate,
                            child.generation
                        );
                        self.agents.add(child.into_agent(id));
                        self.stats.births += 1;
                    }
                }
            }

            if agent.is_starved() {
                self.agents.remove(agent.id);
                let extent = self.config.world.extent;
                let scatter = self.config.world.corpse_scatter;
                self.food.scatter(agent.position, agent.corpse_food(), scatter, extent, rng);
                self.stats.deaths += 1;
                log::trace!("agent {} starved at age {:.1}s", agent.id, agent.age);
                continue;
            }

            if let Some(slot) = self.agents.get_mut(agent.id) {
                *slot = agent;
            }
        }
    }

    fn allocate_id(&mut self) -> AgentId {
        let id = self.next_agent_id;
        self.next_agent_id += 1;
        id
    }

    /// Register an externally built agent under a fresh id
    pub fn add_agent(&mut self, mut agent: Agent) -> AgentId {
        let id = self.allocate_id();
        agent.id = id;
        self.spatial_index.insert(EntityRef::Agent(id), agent.position);
        self.agents.add(agent);
        id
    }

    /// Place a single food unit
    pub fn add_food(&mut self, position: Vec2) -> FoodId {
        let id = self.food.spawn(position);
        self.spatial_index.insert(EntityRef::Food(id), position);
        id
    }

    /// Update statistics
    fn update_stats(&mut self) {
        self.stats.time = self.time;
        self.stats.elapsed = self.elapsed;
        self.stats.update(&self.agents, self.food.len());

        if self.time % self.config.logging.stats_interval == 0 {
            self.stats_history.record(self.stats.clone());
        }
    }

    /// Run simulation for specified number of steps
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Run simulation with callback for progress updates
    pub fn run_with_callback<F>(&mut self, steps: u64, mut callback: F)
    where
        F: FnMut(&World, u64),
    {
        for i in 0..steps {
            self.step();
            callback(self, i);
        }
    }

    /// Set the global time scale, clamped to [0.1, 10]; returns the applied value
    pub fn set_time_scale(&mut self, scale: f32) -> f32 {
        self.time_scale = if scale.is_nan() {
            self.time_scale
        } else {
            TIME_SCALE_RANGE.clamp(scale)
        };
        self.time_scale
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Live agents
    pub fn agents(&self) -> &PopulationRegistry {
        &self.agents
    }

    pub fn food(&self) -> &FoodField {
        &self.food
    }

    pub fn aggregator(&self) -> &StatsAggregator {
        &self.aggregator
    }

    pub fn speed_history(&self) -> &VecDeque<f32> {
        self.aggregator.speed_history()
    }

    pub fn size_history(&self) -> &VecDeque<f32> {
        self.aggregator.size_history()
    }

    pub fn vision_history(&self) -> &VecDeque<f32> {
        self.aggregator.vision_history()
    }

    /// Get current population count
    pub fn population(&self) -> usize {
        self.agents.len()
    }

    /// Check if population is extinct
    pub fn is_extinct(&self) -> bool {
        self.agents.is_empty()
    }

    /// Highest generation among live agents
    pub fn generation_max(&self) -> u32 {
        self.stats.generation_max
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::test_agent;
    use crate::config::Range;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.spawn.initial_population = 30;
        config
    }

    /// Empty world with no ambient food, for hand-built scenarios
    fn empty_config() -> Config {
        let mut config = Config::default();
        config.spawn.initial_population = 0;
        config.food.initial_clusters = 0;
        config.food.spawn_interval = 1.0e6;
        config
    }

    fn agent_at(x: f32, y: f32, size: f32, energy: f32) -> Agent {
        let mut agent = test_agent(0);
        agent.position = Vec2::new(x, y);
        agent.traits.size = size;
        agent.energy = energy;
        agent
    }

    #[test]
    fn test_world_creation() {
        let config = test_config();
        let world = World::new_with_seed(config.clone(), 1).unwrap();

        assert_eq!(world.population(), config.spawn.initial_population);
        assert_eq!(world.time, 0);
        assert!(!world.food().is_empty());
        assert!(world.food().len() <= config.food.max_food);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.spawn.size = Range::new(0.1, 0.2);
        assert!(matches!(World::try_new(config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_world_run() {
        let mut world = World::new_with_seed(test_config(), 2).unwrap();
        world.run(100);

        assert_eq!(world.time, 100);
        let expected = 100.0 * world.config.simulation.tick_seconds;
        assert!((world.elapsed - expected).abs() < 1e-3);
    }

    #[test]
    fn test_time_scale() {
        let mut world = World::new_with_seed(empty_config(), 3).unwrap();
        assert_eq!(world.set_time_scale(0.01), 0.1);
        assert_eq!(world.set_time_scale(50.0), 10.0);
        assert_eq!(world.set_time_scale(f32::NAN), 10.0);
        assert_eq!(world.set_time_scale(2.0), 2.0);

        world.step_by(0.5);
        assert!((world.elapsed - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reproducibility() {
        let mut world1 = World::new_with_seed(test_config(), 42).unwrap();
        let mut world2 = World::new_with_seed(test_config(), 42).unwrap();

        world1.run(200);
        world2.run(200);

        assert_eq!(world1.population(), world2.population());
        assert_eq!(world1.food().len(), world2.food().len());
        for (a, b) in world1.agents().all().zip(world2.agents().all()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.position, b.position);
            assert_eq!(a.energy, b.energy);
        }
    }

    #[test]
    fn test_checkpoint_resume_matches_uninterrupted_run() {
        let mut reference = World::new_with_seed(test_config(), 7).unwrap();
        reference.run(50);
        let mut resumed = World::from_checkpoint(reference.create_checkpoint()).unwrap();

        reference.run(50);
        resumed.run(50);

        assert_eq!(resumed.time, reference.time);
        assert_eq!(resumed.population(), reference.population());
        for (a, b) in resumed.agents().all().zip(reference.agents().all()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn test_starvation_leaves_corpse_food() {
        let mut world = World::new_with_seed(empty_config(), 4).unwrap();
        let id = world.add_agent(agent_at(0.0, 0.0, 1.2, 0.001));

        world.step();

        assert!(world.is_extinct());
        assert!(!world.agents().contains(id));
        assert_eq!(world.food().len(), 3);
        assert_eq!(world.stats.deaths, 1);
    }

    #[test]
    fn test_predation_removes_prey() {
        let mut world = World::new_with_seed(empty_config(), 5).unwrap();
        let hunter = world.add_agent(agent_at(0.0, 0.0, 2.0, 10.0));
        let prey = world.add_agent(agent_at(0.1, 0.0, 1.0, 1.0));

        world.step();

        assert!(!world.agents().contains(prey));
        assert_eq!(world.population(), 1);
        assert_eq!(world.stats.kills, 1);
        let energy = world.agents().get(hunter).map(|a| a.energy).unwrap();
        assert!(energy > 12.9 && energy < 13.0, "{energy}");
    }

    #[test]
    fn test_contested_prey_is_eaten_once() {
        let mut world = World::new_with_seed(empty_config(), 6).unwrap();
        let first = world.add_agent(agent_at(-0.1, 0.0, 2.0, 10.0));
        let second = world.add_agent(agent_at(0.1, 0.0, 2.0, 10.0));
        world.add_agent(agent_at(0.0, 0.0, 1.0, 1.0));

        world.step();

        assert_eq!(world.population(), 2);
        assert_eq!(world.stats.kills, 1);
        let energy = |id| world.agents().get(id).map(|a| a.energy).unwrap();
        assert!(energy(first) > 12.0);
        assert!(energy(second) < 10.0);
        assert_eq!(world.agents().get(second).map(|a| a.kills), Some(0));
    }

    #[test]
    fn test_mating_registers_children() {
        let mut world = World::new_with_seed(empty_config(), 8).unwrap();
        world.add_agent(agent_at(0.0, 0.0, 1.0, 2.0));
        world.add_agent(agent_at(0.1, 0.0, 1.0, 2.0));

        world.step();

        assert_eq!(world.stats.births, 2);
        assert_eq!(world.population(), 4);
        assert_eq!(world.generation_max(), 2);
        let children: Vec<_> = world.agents().all().filter(|a| a.generation == 2).collect();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.id >= 2));
    }

    #[test]
    fn test_births_refused_at_population_cap() {
        let mut config = empty_config();
        config.simulation.max_population = 2;
        let mut world = World::new_with_seed(config, 9).unwrap();
        world.add_agent(agent_at(0.0, 0.0, 1.0, 2.0));
        world.add_agent(agent_at(0.1, 0.0, 1.0, 2.0));

        world.step();

        assert_eq!(world.population(), 2);
        assert_eq!(world.stats.births, 0);
        // the child's share is refunded
        assert!(world.agents().all().all(|a| a.energy > 1.9 && a.offspring_count == 0));
    }

    #[test]
    fn test_contested_food_is_eaten_once() {
        let mut world = World::new_with_seed(empty_config(), 10).unwrap();
        let a = world.add_agent(agent_at(-0.1, 0.0, 1.0, 1.0));
        let b = world.add_agent(agent_at(0.1, 0.0, 1.0, 1.0));
        world.add_food(Vec2::ZERO);

        world.step();

        assert!(world.food().is_empty());
        assert_eq!(world.stats.food_eaten, 1);
        let eaten: u32 = [a, b]
            .iter()
            .filter_map(|&id| world.agents().get(id))
            .map(|agent| agent.food_eaten)
            .sum();
        assert_eq!(eaten, 1);
    }

    #[test]
    fn test_traits_stay_in_bounds_over_run() {
        let mut config = test_config();
        config.agents.mutation_strength = 1.0;
        let mut world = World::new_with_seed(config, 11).unwrap();
        world.run(300);

        let bounds = &world.config.bounds;
        assert!(world.agents().all().all(|a| a.traits.within(bounds)));
        let extent = world.config.world.extent;
        assert!(world
            .agents()
            .all()
            .all(|a| a.position.x.abs() <= extent && a.position.y.abs() <= extent));
    }

    #[test]
    fn test_aggregator_cadence() {
        let mut config = test_config();
        config.stats.update_interval = 0.5;
        config.simulation.tick_seconds = 0.25;
        let mut world = World::new_with_seed(config, 12).unwrap();
        world.run(8);

        assert_eq!(world.speed_history().len(), 4);
        assert_eq!(world.size_history().len(), 4);
        assert_eq!(world.vision_history().len(), 4);
    }
}
