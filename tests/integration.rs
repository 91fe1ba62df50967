//! Integration tests for evosim

use evosim::agent::TickContext;
use evosim::checkpoint::Checkpoint;
use evosim::food::FoodField;
use evosim::grid::Sighting;
use evosim::spawn::initial_population;
use evosim::{Category, Config, ConfigError, EntityRef, PopulationRegistry, SpatialIndex, SpatialQuery, World};
use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("evosim_it_{}_{name}", std::process::id()))
}

#[test]
fn test_full_simulation_cycle() {
    let mut config = Config::default();
    config.spawn.initial_population = 50;

    let mut world = World::new_with_seed(config, 12345).unwrap();
    world.run(500);

    assert_eq!(world.time, 500);

    let extent = world.config.world.extent;
    let bounds = world.config.bounds.clone();
    let mut ids = std::collections::HashSet::new();
    for agent in world.agents().all() {
        assert!(ids.insert(agent.id), "agent {} listed twice", agent.id);
        assert!(agent.energy > 0.0);
        assert!(agent.generation >= 1);
        assert!(agent.traits.within(&bounds));
        assert!(agent.position.x.abs() <= extent && agent.position.y.abs() <= extent);
    }

    // one snapshot at creation plus one every stats_interval steps
    let expected = 1 + 500 / world.config.logging.stats_interval as usize;
    assert_eq!(world.stats_history.snapshots.len(), expected);
}

#[test]
fn test_checkpoint_persistence() {
    let mut config = Config::default();
    config.spawn.initial_population = 30;

    let mut world = World::new_with_seed(config, 54321).unwrap();
    world.run(100);

    let path = temp_path("checkpoint.bin");
    world.create_checkpoint().save(&path).expect("Failed to save checkpoint");
    let loaded = Checkpoint::load(&path).expect("Failed to load checkpoint");
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.time, world.time);
    assert_eq!(loaded.population.len(), world.population());
    assert_eq!(loaded.seed, world.seed());

    let mut restored = World::from_checkpoint(loaded).unwrap();
    assert_eq!(restored.population(), world.population());
    assert_eq!(restored.speed_history(), world.speed_history());

    restored.run(100);
    world.run(100);
    assert_eq!(restored.time, 200);
    assert_eq!(restored.population(), world.population());
}

#[test]
fn test_reproducibility() {
    let mut config = Config::default();
    config.spawn.initial_population = 40;

    let mut world1 = World::new_with_seed(config.clone(), 99999).unwrap();
    let mut world2 = World::new_with_seed(config, 99999).unwrap();

    world1.run(300);
    world2.run(300);

    assert_eq!(world1.population(), world2.population());
    assert_eq!(world1.speed_history(), world2.speed_history());
    assert_eq!(world1.size_history(), world2.size_history());
    assert_eq!(world1.vision_history(), world2.vision_history());
}

#[test]
fn test_config_file_roundtrip_and_validation() {
    let path = temp_path("config.yaml");

    let mut config = Config::default();
    config.spawn.initial_population = 12;
    config.stats.history_capacity = Some(8);
    config.save(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.spawn.initial_population, 12);
    assert_eq!(loaded.stats.history_capacity, Some(8));

    let yaml = std::fs::read_to_string(&path)
        .unwrap()
        .replace("min: 0.5\n    max: 1.5", "min: 0.1\n    max: 0.2");
    std::fs::write(&path, yaml).unwrap();
    let rejected = Config::from_file(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(rejected, Err(ConfigError::Invalid(msg)) if msg.contains("spawn.size")));
}

#[test]
fn test_bounded_history_keeps_series_aligned() {
    let mut config = Config::default();
    config.spawn.initial_population = 20;
    config.stats.update_interval = 0.1;
    config.stats.history_capacity = Some(5);

    let mut world = World::new_with_seed(config, 3).unwrap();
    world.run(100);

    assert_eq!(world.speed_history().len(), 5);
    assert_eq!(world.size_history().len(), 5);
    assert_eq!(world.vision_history().len(), 5);
}

/// Linear scan over every entity; agents must behave the same with it
struct BruteForce(Vec<Sighting>);

impl SpatialQuery for BruteForce {
    fn query(&self, position: Vec2, radius: f32, category: Category) -> Vec<Sighting> {
        self.0
            .iter()
            .filter(|s| s.entity.category() == category && s.position.distance(position) <= radius)
            .copied()
            .collect()
    }
}

#[test]
fn test_agents_only_depend_on_the_query_trait() {
    let config = Config::default();
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let population: PopulationRegistry = initial_population(&config, 0, &mut rng).into_iter().collect();
    let mut food = FoodField::new();
    food.scatter(Vec2::ZERO, 40, 8.0, config.world.extent, &mut rng);

    let mut everything: Vec<Sighting> = population
        .all()
        .map(|a| Sighting { entity: EntityRef::Agent(a.id), position: a.position })
        .collect();
    everything.extend(food.iter().map(|f| Sighting { entity: EntityRef::Food(f.id), position: f.position }));
    let brute = BruteForce(everything);
    let grid = SpatialIndex::from_world(config.world.spatial_cell_size, &population, &food);

    let brute_ctx = TickContext { spatial: &brute, population: &population, food: &food, config: &config };
    let grid_ctx = TickContext { spatial: &grid, population: &population, food: &food, config: &config };

    for agent in population.all() {
        let (mut a, mut b) = (agent.clone(), agent.clone());
        let outcome_a = a.tick(0.02, &brute_ctx, &mut ChaCha8Rng::seed_from_u64(agent.id));
        let outcome_b = b.tick(0.02, &grid_ctx, &mut ChaCha8Rng::seed_from_u64(agent.id));

        assert_eq!(outcome_a.behavior, outcome_b.behavior);
        assert_eq!(a.target, b.target);
        assert_eq!(a.position, b.position);
    }
}

#[test]
fn test_run_with_callback_and_time_scale() {
    let mut config = Config::default();
    config.spawn.initial_population = 15;

    let mut world = World::new_with_seed(config, 21).unwrap();
    assert_eq!(world.set_time_scale(2.0), 2.0);

    let mut seen = Vec::new();
    world.run_with_callback(10, |w, i| seen.push((i, w.time)));

    assert_eq!(seen.len(), 10);
    assert_eq!(seen[9], (9, 10));
    let expected = 10.0 * 2.0 * world.config.simulation.tick_seconds;
    assert!((world.elapsed - expected).abs() < 1e-4);
}
