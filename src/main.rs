use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use traffic_control_sim::simulation::SimWorld;
use traffic_control_sim::strategy::DEFAULT_STRATEGY;

#[derive(Parser)]
#[command(name = "traffic_control_sim")]
#[command(about = "Headless traffic simulation for comparing signal-control strategies")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds, at most 1
    #[arg(long, default_value = "0.1")]
    delta: f64,

    /// Signal-control strategy installed on every intersection
    #[arg(long, default_value = DEFAULT_STRATEGY)]
    strategy: String,

    /// Number of cars the population is steered towards
    #[arg(long, default_value = "20")]
    cars: usize,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON world snapshot here when the run ends
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

/// Settings of one headless run
#[derive(Debug, Clone)]
struct SimConfig {
    ticks: u32,
    delta: f64,
    strategy: String,
    target_cars: usize,
    seed: Option<u64>,
    snapshot_out: Option<PathBuf>,
}

impl From<Cli> for SimConfig {
    fn from(cli: Cli) -> Self {
        Self {
            ticks: cli.ticks,
            delta: cli.delta,
            strategy: cli.strategy,
            target_cars: cli.cars,
            seed: cli.seed,
            snapshot_out: cli.snapshot_out,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SimConfig::from(Cli::parse());
    run_headless(&config)
}

/// Run the simulation without any output besides logs and the final summary
fn run_headless(config: &SimConfig) -> Result<()> {
    info!(
        "Running {} ticks of {}s with '{}' and {} cars",
        config.ticks, config.delta, config.strategy, config.target_cars
    );

    let mut world = match config.seed {
        Some(seed) => SimWorld::create_test_world_with_seed(seed),
        None => SimWorld::create_test_world(),
    }
    .context("Failed to build test world")?;

    if !world.set_strategy_for_all(&config.strategy) {
        warn!(
            "Strategy '{}' is not available, choose one of: {}",
            config.strategy,
            world.strategy_manager.available_strategy_types().join(", ")
        );
    }
    world.set_target_car_count(config.target_cars);

    for tick in 0..config.ticks {
        world
            .tick(config.delta)
            .with_context(|| format!("Tick {} failed", tick + 1))?;
    }

    world.print_summary();
    log_run_summary(&world);

    if let Some(path) = &config.snapshot_out {
        let json = world.save().to_json_string()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }

    Ok(())
}

fn log_run_summary(world: &SimWorld) {
    info!("=== SIMULATION COMPLETE ===");
    info!("Elapsed time: {:.2}s", world.time);
    info!(
        "Strategy: {}",
        world.strategy_manager.current_strategy_type()
    );
    info!("Total cars spawned: {}", world.cars_spawned);
    info!("Total cars completed: {}", world.cars_completed);
    info!("Active cars: {}", world.cars.len());
    info!(
        "Total intersections: {}",
        world.road_network.intersection_count()
    );
    info!("Total roads: {}", world.road_network.road_count());
    if let Some(sample) = world.kpi.latest() {
        info!(
            "Queued cars: {}, average wait: {:.2}s, throughput: {}",
            sample.queued_cars, sample.average_wait_time, sample.throughput
        );
    }
}
