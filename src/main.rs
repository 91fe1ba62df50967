//! evosim - CLI Entry Point
//!
//! Headless driver for the evolving-population simulator.

use clap::{Parser, Subcommand};
use evosim::checkpoint::{Checkpoint, CheckpointManager};
use evosim::{benchmark, BehaviorKind, Config, World};
use std::path::PathBuf;
use std::time::Instant;

/// Checkpoints kept by the periodic writer
const KEEP_CHECKPOINTS: usize = 10;

#[derive(Parser)]
#[command(name = "evosim")]
#[command(version)]
#[command(about = "Evolving-population agent simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of steps to simulate
        #[arg(short, long, default_value = "10000")]
        steps: u64,

        /// Output directory for checkpoints and stats
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Time scale override (0.1 - 10)
        #[arg(long)]
        time_scale: Option<f32>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Resume simulation from checkpoint
    Resume {
        /// Checkpoint file to resume from
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Number of additional steps
        #[arg(short, long, default_value = "10000")]
        steps: u64,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of steps
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Population size
        #[arg(short, long, default_value = "500")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Analyze a checkpoint file
    Analyze {
        /// Checkpoint file
        checkpoint: PathBuf,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            output,
            seed,
            time_scale,
            quiet,
        } => run_simulation(config, steps, output, seed, time_scale, quiet),

        Commands::Resume {
            checkpoint,
            steps,
            output,
        } => resume_simulation(checkpoint, steps, output),

        Commands::Benchmark { steps, population } => {
            init_logging("info");
            run_benchmark(steps, population)
        }

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }

        Commands::Analyze { checkpoint } => {
            init_logging("info");
            analyze_checkpoint(checkpoint)
        }
    }
}

/// Step `world` until `target_time` or extinction, printing and checkpointing
fn drive(world: &mut World, target_time: u64, checkpoints: &mut CheckpointManager, quiet: bool) {
    let stats_interval = world.config.logging.stats_interval;

    while world.time < target_time {
        world.step();

        if !quiet && world.time % stats_interval == 0 {
            println!("{}", world.stats.summary());
        }

        if checkpoints.should_save(world.time) {
            match checkpoints.save(&world.create_checkpoint()) {
                Ok(path) => log::info!("Checkpoint saved: {}", path.display()),
                Err(e) => log::error!("Checkpoint error: {e}"),
            }
        }

        if world.is_extinct() {
            println!("\nPopulation extinct at step {}", world.time);
            break;
        }
    }
}

fn run_simulation(
    config_path: PathBuf,
    steps: u64,
    output: PathBuf,
    seed: Option<u64>,
    time_scale: Option<f32>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, loaded) = if config_path.exists() {
        (Config::from_file(&config_path)?, true)
    } else {
        (Config::default(), false)
    };
    init_logging(&config.logging.log_level);
    if loaded {
        log::info!("Loaded config from {}", config_path.display());
    } else {
        log::info!("{} not found, using default configuration", config_path.display());
    }

    std::fs::create_dir_all(&output)?;

    let mut world = match seed {
        Some(s) => World::new_with_seed(config.clone(), s)?,
        None => World::try_new(config.clone())?,
    };
    if let Some(scale) = time_scale {
        let applied = world.set_time_scale(scale);
        log::info!("Time scale set to {applied}");
    }

    println!("Starting simulation");
    println!("  Seed: {}", world.seed());
    println!("  Initial population: {}", world.population());
    println!("  World: [-{0}, {0}]^2", config.world.extent);
    println!("  Steps: {}", steps);
    println!();

    let mut checkpoints =
        CheckpointManager::new(&output, config.logging.checkpoint_interval, KEEP_CHECKPOINTS)?;

    let start = Instant::now();
    drive(&mut world, steps, &mut checkpoints, quiet);
    let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed);
    println!("Steps: {} ({:.1} simulated seconds)", world.time, world.elapsed);
    println!("Speed: {:.1} steps/s", world.time as f64 / elapsed);
    println!("Final population: {}", world.population());
    println!("Max generation: {}", world.generation_max());

    let final_path = output.join("final_state.bin");
    world.create_checkpoint().save(&final_path)?;
    println!("Final checkpoint: {}", final_path.display());

    let stats_path = output.join("stats_history.json");
    world.stats_history.save(&stats_path)?;
    let traits_path = output.join("trait_history.json");
    world.aggregator().history().save_json(&traits_path)?;
    println!("Stats history: {}", stats_path.display());
    println!("Trait history: {}", traits_path.display());

    Ok(())
}

fn resume_simulation(
    checkpoint_path: PathBuf,
    steps: u64,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoint = Checkpoint::load(&checkpoint_path)?;
    init_logging(&checkpoint.config.logging.log_level);
    log::info!("Loaded checkpoint {}", checkpoint_path.display());

    let mut world = World::from_checkpoint(checkpoint)?;

    println!("Resumed at step {}", world.time);
    println!("Population: {}", world.population());
    println!("Running {} additional steps", steps);
    println!();

    std::fs::create_dir_all(&output)?;
    let mut checkpoints =
        CheckpointManager::new(&output, world.config.logging.checkpoint_interval, KEEP_CHECKPOINTS)?;

    let start = Instant::now();
    let first_step = world.time;
    drive(&mut world, first_step + steps, &mut checkpoints, false);
    let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);

    println!();
    println!("=== Resume Complete ===");
    println!("Time: {:.2}s", elapsed);
    println!("Final step: {}", world.time);
    println!("Speed: {:.1} steps/s", (world.time - first_step) as f64 / elapsed);
    println!("Population: {}", world.population());

    Ok(())
}

fn run_benchmark(steps: u64, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== evosim Benchmark ===");
    println!("Steps: {}", steps);
    println!("Population: {}", population);
    println!();

    let result = benchmark(steps, population)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    Config::default().save(&output)?;
    println!("Configuration saved to: {}", output.display());
    Ok(())
}

fn analyze_checkpoint(checkpoint_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Checkpoint Analysis ===");
    println!("File: {}", checkpoint_path.display());
    println!();

    let checkpoint = Checkpoint::load(&checkpoint_path)?;
    let agents: Vec<_> = checkpoint.population.all().collect();

    println!("Step: {} ({:.1} simulated seconds)", checkpoint.time, checkpoint.elapsed);
    println!("Seed: {}", checkpoint.seed);
    println!("Population: {}", agents.len());
    println!("Food: {}", checkpoint.food.len());

    if !agents.is_empty() {
        let n = agents.len() as f32;
        let mean = |f: fn(&evosim::Agent) -> f32| agents.iter().map(|a| f(a)).sum::<f32>() / n;
        let max_gen = agents.iter().map(|a| a.generation).max().unwrap_or(0);

        println!();
        println!("Max generation: {}", max_gen);
        println!("Average energy: {:.2}", mean(|a| a.energy));
        println!("Average speed: {:.3}", mean(|a| a.traits.speed));
        println!("Average size: {:.3}", mean(|a| a.traits.size));
        println!("Average vision: {:.3}", mean(|a| a.traits.vision_range));
        println!("Average mutation strength: {:.3}", mean(|a| a.traits.mutation_strength));

        println!();
        println!("Last behavior:");
        for kind in BehaviorKind::PRIORITY {
            let count = agents.iter().filter(|a| a.last_behavior == Some(kind)).count();
            println!("  {:<10} {:5} ({:.1}%)", format!("{kind:?}"), count, 100.0 * count as f32 / n);
        }

        if let Some(best) = agents.iter().max_by(|a, b| a.fitness().total_cmp(&b.fitness())) {
            println!();
            println!(
                "Fittest agent: #{} gen {} ({} offspring, {} kills, {} food)",
                best.id, best.generation, best.offspring_count, best.kills, best.food_eaten
            );
        }
    }

    let history = checkpoint.aggregator.history();
    if let Some(latest) = history.iter().last() {
        println!();
        println!("Trait samples: {}", history.len());
        println!(
            "Latest averages: speed {:.3}, size {:.3}, vision {:.3}",
            latest.speed, latest.size, latest.vision_range
        );
    }

    println!();
    println!("Checkpoint size: {:.2} MB", checkpoint.size_bytes()? as f64 / 1_000_000.0);

    Ok(())
}
