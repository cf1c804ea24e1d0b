//! Main simulation world that ties everything together
//!
//! The world owns the entity pools, the road network and the strategy
//! manager, and drives them one bounded tick at a time.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;

use super::car::{CarUpdateResult, SimCar, FOLLOWING_DISTANCE};
use super::intersection::SimIntersection;
use super::kpi::{KpiLog, KpiSample};
use super::pool::Pool;
use super::road_network::SimRoadNetwork;
use super::traffic_state::{LaneSampler, TrafficSampler};
use super::types::{
    CarId, Direction, IntersectionId, Position, RoadId, SimId, SimRoad, DEFAULT_CAR_SPEED,
};
use crate::error::SimError;
use crate::strategy::{ConfigMap, StrategyManager};

/// Longest stretch of simulated time a single tick may cover, seconds
pub const MAX_TICK_DELTA: f64 = 1.0;

/// Origin/destination draws per spawn before giving up for this tick
const SPAWN_ATTEMPTS: usize = 8;

/// The main simulation world
pub struct SimWorld {
    /// Road network for pathfinding and lane occupancy
    pub road_network: SimRoadNetwork,

    /// All intersections
    pub intersections: Pool<SimIntersection>,

    /// All cars
    pub cars: Pool<SimCar>,

    /// Strategy registry used for every intersection
    pub strategy_manager: StrategyManager,

    /// Source of per-approach readings handed to the strategies
    sampler: Box<dyn TrafficSampler>,

    pub kpi: KpiLog,

    /// Next ID to assign
    next_id: usize,

    /// Simulation time
    pub time: f64,

    /// Car count the population is steered towards, one car per tick
    target_car_count: usize,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,

    /// Cars spawned since the world was created
    pub cars_spawned: u64,

    /// Cars that reached their destination
    pub cars_completed: u64,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            road_network: SimRoadNetwork::new(),
            intersections: Pool::new(),
            cars: Pool::new(),
            strategy_manager: StrategyManager::with_defaults(),
            sampler: Box::new(LaneSampler),
            kpi: KpiLog::new(),
            next_id: 0,
            time: 0.0,
            target_car_count: 0,
            rng,
            cars_spawned: 0,
            cars_completed: 0,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    /// Replace the traffic sampler
    pub fn with_sampler(mut self, sampler: impl TrafficSampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    /// Get a random value in the given range, using seeded RNG if available
    fn random_range(&mut self, range: std::ops::Range<f64>) -> f64 {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    /// Choose a random element from a slice, using seeded RNG if available
    fn choose_random<T: Copy>(&mut self, slice: &[T]) -> Option<T> {
        match &mut self.rng {
            Some(rng) => slice.choose(rng).copied(),
            None => slice.choose(&mut rand::rng()).copied(),
        }
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn restore_counters(&mut self, next_id: usize, time: f64, target_car_count: usize) {
        self.next_id = next_id;
        self.time = time;
        self.target_car_count = target_car_count;
    }

    pub(crate) fn next_id(&self) -> usize {
        self.next_id
    }

    /// Add an intersection controlled by the currently selected strategy
    pub fn add_intersection(&mut self, position: Position) -> Result<IntersectionId> {
        let id = IntersectionId(self.next_sim_id());
        let intersection =
            SimIntersection::new(id, position, self.strategy_manager.create_strategy());
        self.intersections.put(intersection)?;
        self.road_network.add_intersection(id, position);
        Ok(id)
    }

    /// Add a one-way road and attach it as an approach of its end intersection
    pub fn add_road(&mut self, start: IntersectionId, end: IntersectionId) -> Result<RoadId> {
        let start_pos = *self
            .road_network
            .get_intersection_position(start)
            .context("Start intersection not found")?;

        let end_pos = *self
            .road_network
            .get_intersection_position(end)
            .context("End intersection not found")?;

        let id = RoadId(self.next_sim_id());
        let road = SimRoad::new(id, start, end, &start_pos, &end_pos);
        self.road_network
            .add_road(road)
            .with_context(|| format!("Failed to add {} from {} to {}", id, start, end))?;

        let intersection = self
            .intersections
            .get_mut(&end)
            .context("End intersection not found")?;
        intersection
            .attach_approach(id, Direction::from_offset(&end_pos, &start_pos))
            .with_context(|| format!("{} has no free approach for {}", end, id))?;

        Ok(id)
    }

    /// Add a two-way road between intersections (creates two logical roads)
    pub fn add_two_way_road(
        &mut self,
        start: IntersectionId,
        end: IntersectionId,
    ) -> Result<(RoadId, RoadId)> {
        let forward = self.add_road(start, end)?;
        let backward = self.add_road(end, start)?;
        Ok((forward, backward))
    }

    pub fn target_car_count(&self) -> usize {
        self.target_car_count
    }

    /// Set the population the world steers towards, one car per tick
    pub fn set_target_car_count(&mut self, count: usize) {
        self.target_car_count = count;
    }

    /// Select a strategy and install a fresh instance of it on every intersection
    ///
    /// An unknown key installs the default strategy and returns false.
    pub fn set_strategy_for_all(&mut self, key: &str) -> bool {
        let known = self.strategy_manager.select_strategy(key);
        for id in self.intersections.ids() {
            if let Some(intersection) = self.intersections.get_mut(&id) {
                self.strategy_manager.apply_to_intersection(intersection);
            }
        }
        info!(
            "Installed '{}' on {} intersections",
            self.strategy_manager.current_strategy_type(),
            self.intersections.len()
        );
        known
    }

    /// Store settings for a strategy; running instances of it pick them up immediately
    pub fn apply_strategy_settings(&mut self, key: &str, options: &ConfigMap) -> bool {
        if !self.strategy_manager.apply_strategy_settings(key, options) {
            return false;
        }
        for intersection in self.intersections.values_mut() {
            if intersection.strategy().strategy_type() == key {
                intersection.strategy_mut().update_config(options);
            }
        }
        true
    }

    /// Spawn one car on a random route
    ///
    /// The first road of the route must have room at its start.
    pub fn spawn_car(&mut self) -> Result<CarId> {
        let origins: Vec<IntersectionId> = self
            .intersections
            .ids()
            .into_iter()
            .filter(|id| !self.road_network.outgoing_roads(*id).is_empty())
            .collect();
        if origins.len() < 2 {
            anyhow::bail!("Need at least two connected intersections to spawn a car");
        }

        for _ in 0..SPAWN_ATTEMPTS {
            let Some(from) = self.choose_random(&origins) else {
                break;
            };
            let destinations: Vec<IntersectionId> =
                self.intersections.ids().into_iter().filter(|id| *id != from).collect();
            let Some(to) = self.choose_random(&destinations) else {
                break;
            };

            let Some(path) = self.road_network.find_path(from, to) else {
                continue;
            };
            let Some(&first_target) = path.first() else {
                continue;
            };

            let road_id = self.road_network.find_road_between(from, first_target)?;
            let start_clear = self
                .road_network
                .last_car_distance(road_id)
                .map_or(true, |distance| distance > FOLLOWING_DISTANCE);
            if !start_clear {
                continue;
            }

            let road_angle = self
                .road_network
                .get_road(road_id)
                .context("Road not found")?
                .angle;
            let start_pos = *self
                .road_network
                .get_intersection_position(from)
                .context("Start intersection position not found")?;

            let speed = DEFAULT_CAR_SPEED * self.random_range(0.75..1.5);
            let id = CarId(self.next_sim_id());
            let car = SimCar::new(id, speed, road_id, from, path, start_pos, road_angle);

            self.road_network.place_car(id, road_id, 0.0);
            self.cars.put(car)?;
            self.cars_spawned += 1;
            debug!("Spawned {} from {} to {} at {:.1} m/s", id, from, to, speed);
            return Ok(id);
        }

        anyhow::bail!("No free route found after {} attempts", SPAWN_ATTEMPTS)
    }

    /// Remove a car, releasing its lane slot exactly once
    pub fn remove_car(&mut self, car_id: CarId) -> Result<Option<SimCar>, SimError> {
        let road_network = &mut self.road_network;
        self.cars
            .pop_with(&car_id, |car| car.release(road_network))
    }

    /// Spawn or remove at most one car to approach the target count
    fn adjust_population(&mut self) -> Result<(), SimError> {
        let count = self.cars.len();
        if count < self.target_car_count {
            if let Err(err) = self.spawn_car() {
                if let Some(fatal) = err.downcast_ref::<SimError>() {
                    return Err(fatal.clone());
                }
                debug!("Spawn skipped: {:#}", err);
            }
        } else if count > self.target_car_count {
            if let Some(&lowest) = self.cars.ids().first() {
                self.remove_car(lowest)?;
                debug!("Removed {} to meet target of {}", lowest, self.target_car_count);
            }
        }
        Ok(())
    }

    /// Sample each intersection and let its strategy recompute the signals
    fn update_intersections(&mut self, delta_secs: f64) {
        for id in self.intersections.ids() {
            let Some(intersection) = self.intersections.get(&id) else {
                continue;
            };
            let states = self
                .sampler
                .sample(intersection, &self.road_network, &self.cars);

            if let Some(intersection) = self.intersections.get_mut(&id) {
                intersection.update(delta_secs, &states, self.time);
            }
        }
    }

    /// Update all cars, removing those that are done
    fn update_cars(&mut self, delta_secs: f64) -> Result<(), SimError> {
        let mut finished = Vec::new();

        for car_id in self.cars.ids() {
            let Some(car) = self.cars.get_mut(&car_id) else {
                continue;
            };

            let result = car.update(
                delta_secs,
                self.time,
                &mut self.road_network,
                &mut self.intersections,
            );

            match result {
                Ok(CarUpdateResult::Continue) => {}
                Ok(CarUpdateResult::Despawn) => finished.push(car_id),
                Ok(CarUpdateResult::ArrivedAtDestination(destination)) => {
                    debug!("{} arrived at {}", car_id, destination);
                    self.cars_completed += 1;
                    finished.push(car_id);
                }
                Err(err) => {
                    if let Some(fatal) = err.downcast_ref::<SimError>() {
                        return Err(fatal.clone());
                    }
                    warn!("Despawning {}: {:#}", car_id, err);
                    finished.push(car_id);
                }
            }
        }

        for car_id in finished {
            self.remove_car(car_id)?;
        }
        Ok(())
    }

    /// Record one KPI sample per whole second crossed since `previous_time`
    fn sample_kpis(&mut self, previous_time: f64) {
        let boundaries = KpiLog::boundaries_crossed(previous_time, self.time);
        if boundaries.is_empty() {
            return;
        }

        let waits: Vec<f64> = self
            .cars
            .values()
            .filter(|car| car.queued)
            .map(|car| car.wait_time)
            .collect();
        let average_wait_time = if waits.is_empty() {
            0.0
        } else {
            waits.iter().sum::<f64>() / waits.len() as f64
        };
        let throughput: u64 = self.intersections.values().map(|i| i.throughput).sum();

        for time in boundaries {
            self.kpi.record(KpiSample {
                time,
                car_count: self.cars.len(),
                queued_cars: waits.len(),
                average_wait_time,
                throughput,
            });
        }
    }

    /// Advance the simulation by `delta_secs`
    ///
    /// A delta above one second, negative or NaN is rejected before anything
    /// changes. Errors that escape a tick leave the world in an undefined
    /// state and should end the run.
    pub fn tick(&mut self, delta_secs: f64) -> Result<(), SimError> {
        if !delta_secs.is_finite() || delta_secs < 0.0 {
            return Err(SimError::InvalidTickDelta { delta: delta_secs });
        }
        if delta_secs > MAX_TICK_DELTA {
            return Err(SimError::TickTooLarge { delta: delta_secs });
        }

        let previous_time = self.time;
        self.time += delta_secs;

        self.adjust_population()?;
        self.update_intersections(delta_secs);
        self.update_cars(delta_secs)?;
        self.sample_kpis(previous_time);

        Ok(())
    }

    /// Create a default test world for simulation
    pub fn create_test_world() -> Result<Self> {
        Self::build_test_world(SimWorld::new())
    }

    /// Create a default test world with a seeded RNG for reproducible simulations
    pub fn create_test_world_with_seed(seed: u64) -> Result<Self> {
        Self::build_test_world(SimWorld::new_with_seed(seed))
    }

    /// Build a 3x3 grid of two-way roads
    ///
    /// Corner intersections get two approaches, edges three and the centre four.
    pub fn build_test_world(mut world: SimWorld) -> Result<Self> {
        let spacing = 20.0;
        let mut grid = [[IntersectionId(SimId(0)); 3]; 3];

        for (row, cells) in grid.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                let x = (col as f64 - 1.0) * spacing;
                let z = (row as f64 - 1.0) * spacing;
                *cell = world.add_intersection(Position::new(x, 0.0, z))?;
            }
        }

        // Connect grid horizontally
        for row in 0..3 {
            for col in 0..2 {
                world.add_two_way_road(grid[row][col], grid[row][col + 1])?;
            }
        }

        // Connect grid vertically
        for row in 0..2 {
            for col in 0..3 {
                world.add_two_way_road(grid[row][col], grid[row + 1][col])?;
            }
        }

        Ok(world)
    }

    /// Cars currently stopped on an approach
    pub fn queued_car_count(&self) -> usize {
        self.cars.values().filter(|car| car.queued).count()
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Traffic Simulation Summary ===");
        println!("Time: {:.2}s", self.time);
        println!(
            "Intersections: {}, Roads: {}",
            self.road_network.intersection_count(),
            self.road_network.road_count()
        );
        println!(
            "Cars: {} (target {}), queued: {}",
            self.cars.len(),
            self.target_car_count,
            self.queued_car_count()
        );
        println!(
            "Spawned: {}, completed: {}",
            self.cars_spawned, self.cars_completed
        );
        println!();

        println!("--- Intersections ---");
        for intersection in self.intersections.iter_sorted() {
            let strategy = intersection.strategy();
            println!(
                "  {}: {} phase {}/{} ({:.1}s), approaches={}, throughput={}",
                intersection.id,
                strategy.strategy_type(),
                strategy.current_phase() + 1,
                strategy.total_phases(),
                strategy.time_in_phase(),
                intersection.info().road_count(),
                intersection.throughput
            );
        }

        if let Some(sample) = self.kpi.latest() {
            println!("--- Latest KPI ({:.0}s) ---", sample.time);
            println!(
                "  cars={}, queued={}, avg wait={:.1}s, throughput={}",
                sample.car_count, sample.queued_cars, sample.average_wait_time, sample.throughput
            );
        }
    }
}
