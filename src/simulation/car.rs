//! Car movement logic for the traffic simulation
//!
//! Cars follow a precomputed path, keep their distance to the car ahead and
//! stop at the end of a road until the signal for their movement is green.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::intersection::SimIntersection;
use super::pool::{Pool, PoolEntity};
use super::road_network::SimRoadNetwork;
use super::types::{
    CarId, IntersectionId, Movement, Position, RoadId, CAR_LENGTH, SAFE_FOLLOWING_MULTIPLIER,
};
use crate::error::SimError;

/// Gap a car keeps to the one ahead
pub const FOLLOWING_DISTANCE: f64 = CAR_LENGTH * SAFE_FOLLOWING_MULTIPLIER;

/// Result of a car update indicating what action should be taken
#[derive(Debug, Clone, PartialEq)]
pub enum CarUpdateResult {
    Continue,                             // Car continues moving
    Despawn,                              // Car should be despawned
    ArrivedAtDestination(IntersectionId), // Car arrived at destination
}

/// A car in the traffic simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimCar {
    pub id: CarId,
    pub speed: f64,
    pub current_road: RoadId,
    pub distance_along_road: f64,
    pub start_intersection: IntersectionId,
    /// Remaining intersections; the first one is the end of the current road
    pub path: Vec<IntersectionId>,
    pub position: Position,
    pub angle: f64,
    /// Seconds spent stopped on the current approach
    pub wait_time: f64,
    /// Whether the car could not move as far as it wanted on the last tick
    pub queued: bool,
}

impl PoolEntity for SimCar {
    type Id = CarId;

    fn id(&self) -> CarId {
        self.id
    }
}

impl SimCar {
    pub fn new(
        id: CarId,
        speed: f64,
        current_road: RoadId,
        start_intersection: IntersectionId,
        path: Vec<IntersectionId>,
        position: Position,
        angle: f64,
    ) -> Self {
        Self {
            id,
            speed,
            current_road,
            distance_along_road: 0.0,
            start_intersection,
            path,
            position,
            angle,
            wait_time: 0.0,
            queued: false,
        }
    }

    /// Give up the car's lane slot. Used as the pool release hook
    pub fn release(&self, road_network: &mut SimRoadNetwork) -> Result<(), SimError> {
        road_network.release_car(self.id, self.current_road, self.distance_along_road)
    }

    /// Update car movement logic
    /// Returns CarUpdateResult indicating what action should be taken with the car
    pub fn update(
        &mut self,
        delta_secs: f64,
        now: f64,
        road_network: &mut SimRoadNetwork,
        intersections: &mut Pool<SimIntersection>,
    ) -> Result<CarUpdateResult> {
        let Some(&target_intersection_id) = self.path.first() else {
            return Ok(CarUpdateResult::Despawn);
        };

        let current_road = road_network
            .get_road(self.current_road)
            .context("Road not found")?
            .clone();

        let desired_distance = self.distance_along_road + self.speed * delta_secs;
        let mut limit = current_road.length;
        if let Some((ahead_distance, _)) = road_network.find_car_ahead_on_road(
            self.current_road,
            self.id,
            self.distance_along_road,
        ) {
            limit = limit.min(ahead_distance - FOLLOWING_DISTANCE);
        }

        let mut new_distance = desired_distance.min(limit).max(self.distance_along_road);
        let mut blocked = new_distance < desired_distance;

        if new_distance >= current_road.length {
            // Reached the stop line of the target intersection
            if self.path.len() == 1 {
                self.move_to(road_network, current_road.length)?;
                return Ok(CarUpdateResult::ArrivedAtDestination(target_intersection_id));
            }

            let next_intersection_id = self.path[1];
            let next_road_id =
                road_network.find_road_between(target_intersection_id, next_intersection_id)?;
            let next_road = road_network
                .get_road(next_road_id)
                .context("Next road not found")?
                .clone();

            let intersection = intersections
                .get_mut(&target_intersection_id)
                .context("Target intersection not found")?;
            let approach = intersection
                .approach_of(self.current_road)
                .context("Road is not attached to its end intersection")?;
            let movement = Movement::from_headings(current_road.angle, next_road.angle);

            let exit_clear = road_network
                .last_car_distance(next_road_id)
                .map_or(true, |distance| distance > FOLLOWING_DISTANCE);

            if intersection.is_green(approach, movement) && exit_clear {
                road_network.move_car(
                    self.id,
                    (self.current_road, self.distance_along_road),
                    (next_road_id, 0.0),
                )?;
                intersection.record_departure(approach, now);

                self.current_road = next_road_id;
                self.start_intersection = target_intersection_id;
                self.path.remove(0);
                self.distance_along_road = 0.0;
                self.angle = next_road.angle;
                self.wait_time = 0.0;
                self.queued = false;
                self.update_position(road_network);
                return Ok(CarUpdateResult::Continue);
            }

            new_distance = current_road.length;
            blocked = true;
        }

        self.move_to(road_network, new_distance)?;
        if delta_secs > 0.0 {
            self.queued = blocked;
            if blocked {
                self.wait_time += delta_secs;
            }
        }
        self.update_position(road_network);

        Ok(CarUpdateResult::Continue)
    }

    fn move_to(&mut self, road_network: &mut SimRoadNetwork, distance: f64) -> Result<(), SimError> {
        if distance != self.distance_along_road {
            road_network.move_car(
                self.id,
                (self.current_road, self.distance_along_road),
                (self.current_road, distance),
            )?;
            self.distance_along_road = distance;
        }
        Ok(())
    }

    fn update_position(&mut self, road_network: &SimRoadNetwork) {
        let Some(road) = road_network.get_road(self.current_road) else {
            return;
        };
        let start = road_network.get_intersection_position(road.start_intersection);
        let end = road_network.get_intersection_position(road.end_intersection);
        if let (Some(start), Some(end)) = (start, end) {
            let t = if road.length > 0.0 {
                (self.distance_along_road / road.length).clamp(0.0, 1.0)
            } else {
                1.0
            };
            self.position = start.lerp(end, t);
        }
    }
}
