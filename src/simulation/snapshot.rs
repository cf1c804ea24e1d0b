//! Whole-world save and load
//!
//! Pools are rebuilt through factories on load, so a loaded world never
//! shares data with the snapshot it came from. Strategies go through the
//! manager: fresh instance, bound to the rebuilt intersection, then the
//! persisted state laid over it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::car::SimCar;
use super::intersection::SimIntersection;
use super::kpi::KpiSample;
use super::pool::Pool;
use super::types::{IntersectionId, Position, RoadId, SimRoad};
use super::world::SimWorld;
use crate::strategy::ConfigMap;

/// Persisted form of one intersection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionSnapshot {
    pub id: IntersectionId,
    pub position: Position,
    #[serde(default)]
    pub approaches: [Option<RoadId>; 4],
    /// Output of the strategy's `to_snapshot`
    #[serde(default)]
    pub strategy: Value,
    #[serde(default)]
    pub departures: [Vec<f64>; 4],
    #[serde(default)]
    pub throughput: u64,
}

/// Persisted form of a whole world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldSnapshot {
    pub time: f64,
    pub next_id: usize,
    pub target_car_count: usize,
    pub current_strategy: String,
    pub strategy_settings: BTreeMap<String, ConfigMap>,
    pub intersections: Vec<IntersectionSnapshot>,
    pub roads: Vec<SimRoad>,
    pub cars: Vec<SimCar>,
    pub kpi: Vec<KpiSample>,
    pub cars_spawned: u64,
    pub cars_completed: u64,
}

impl WorldSnapshot {
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize world snapshot")
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse world snapshot")
    }
}

impl SimWorld {
    /// Capture everything needed to continue the run later
    pub fn save(&self) -> WorldSnapshot {
        let intersections = self
            .intersections
            .iter_sorted()
            .map(|intersection| IntersectionSnapshot {
                id: intersection.id,
                position: intersection.position,
                approaches: intersection.approaches(),
                strategy: intersection.strategy().to_snapshot().to_json(),
                departures: intersection.departures(),
                throughput: intersection.throughput,
            })
            .collect();

        let strategy_settings = self
            .strategy_manager
            .available_strategy_types()
            .into_iter()
            .filter_map(|key| {
                self.strategy_manager
                    .strategy_settings(key)
                    .map(|settings| (key.to_string(), settings.clone()))
            })
            .collect();

        WorldSnapshot {
            time: self.time,
            next_id: self.next_id(),
            target_car_count: self.target_car_count(),
            current_strategy: self.strategy_manager.current_strategy_type().to_string(),
            strategy_settings,
            intersections,
            roads: self.road_network.roads().iter_sorted().cloned().collect(),
            cars: self.cars.iter_sorted().cloned().collect(),
            kpi: self.kpi.samples().to_vec(),
            cars_spawned: self.cars_spawned,
            cars_completed: self.cars_completed,
        }
    }

    /// Rebuild a world from a snapshot
    ///
    /// Unknown strategies fall back to the default with a warning; broken
    /// topology or duplicate ids fail the load.
    pub fn load(snapshot: &WorldSnapshot) -> Result<Self> {
        let mut world = SimWorld::new();

        for (key, settings) in &snapshot.strategy_settings {
            world.strategy_manager.apply_strategy_settings(key, settings);
        }
        if !snapshot.current_strategy.is_empty() {
            world
                .strategy_manager
                .select_strategy(&snapshot.current_strategy);
        }

        for intersection in &snapshot.intersections {
            world
                .road_network
                .add_intersection(intersection.id, intersection.position);
        }
        for road in &snapshot.roads {
            world
                .road_network
                .add_road(road.clone())
                .with_context(|| format!("Failed to restore {}", road.id))?;
        }

        let manager = &world.strategy_manager;
        world.intersections = Pool::hydrate(&snapshot.intersections, |saved| {
            let mut intersection =
                SimIntersection::new(saved.id, saved.position, manager.create_strategy());
            intersection.set_approaches(saved.approaches);
            intersection.set_departures(saved.departures.clone());
            intersection.throughput = saved.throughput;

            let strategy = manager.create_from_json(&saved.strategy, &intersection.info());
            intersection.install_strategy(strategy);
            Ok(intersection)
        })
        .context("Failed to restore intersections")?;

        world.cars = Pool::hydrate(&snapshot.cars, |saved| {
            world
                .road_network
                .get_road(saved.current_road)
                .with_context(|| format!("{} is on unknown {}", saved.id, saved.current_road))?;
            Ok(saved.clone())
        })
        .context("Failed to restore cars")?;

        for car in world.cars.iter_sorted() {
            world
                .road_network
                .place_car(car.id, car.current_road, car.distance_along_road);
        }

        for sample in &snapshot.kpi {
            world.kpi.record(*sample);
        }
        world.cars_spawned = snapshot.cars_spawned;
        world.cars_completed = snapshot.cars_completed;
        world.restore_counters(snapshot.next_id, snapshot.time, snapshot.target_car_count);

        Ok(world)
    }
}
