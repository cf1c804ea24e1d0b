//! Per-approach traffic readings fed to the strategies
//!
//! The sampler is an injected collaborator: it reports instantaneous values
//! and strategies must not assume any smoothing or integration.

use serde::{Deserialize, Serialize};

use super::car::SimCar;
use super::intersection::SimIntersection;
use super::pool::Pool;
use super::road_network::SimRoadNetwork;
use super::types::Direction;

/// Traffic conditions on one approach at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficState {
    /// Vehicles stopped on the approach
    pub queue_length: u32,
    /// Mean wait of the stopped vehicles, seconds
    pub average_wait_time: f64,
    /// Longest wait of the stopped vehicles, seconds
    pub max_wait_time: f64,
    /// Vehicles that left the approach over the last minute
    pub flow_rate: f64,
    /// Left, forward, right signal of the approach
    pub signal_state: [u8; 3],
}

impl TrafficState {
    pub fn with_queue(queue_length: u32) -> Self {
        Self {
            queue_length,
            ..Default::default()
        }
    }
}

/// Last known reading per approach, in North, East, South, West order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApproachReadings([TrafficState; 4]);

impl ApproachReadings {
    /// Take up to four readings; approaches beyond the list keep their values
    pub fn absorb(&mut self, states: &[TrafficState]) {
        for (slot, state) in self.0.iter_mut().zip(states) {
            *slot = *state;
        }
    }

    pub fn get(&self, direction: Direction) -> &TrafficState {
        &self.0[direction.index()]
    }
}

/// Source of traffic readings for an intersection
pub trait TrafficSampler {
    /// One reading per approach, North first
    fn sample(
        &mut self,
        intersection: &SimIntersection,
        road_network: &SimRoadNetwork,
        cars: &Pool<SimCar>,
    ) -> Vec<TrafficState>;
}

/// Samples queues directly from lane occupancy
#[derive(Debug, Default, Clone, Copy)]
pub struct LaneSampler;

impl TrafficSampler for LaneSampler {
    fn sample(
        &mut self,
        intersection: &SimIntersection,
        road_network: &SimRoadNetwork,
        cars: &Pool<SimCar>,
    ) -> Vec<TrafficState> {
        let signals = intersection.signals();

        Direction::ALL
            .into_iter()
            .map(|direction| {
                let mut state = TrafficState {
                    flow_rate: intersection.flow_rate(direction),
                    signal_state: signals[direction.index()],
                    ..Default::default()
                };

                let Some(road_id) = intersection.approach_road(direction) else {
                    return state;
                };

                let waits: Vec<f64> = road_network
                    .cars_on_road(road_id)
                    .iter()
                    .filter_map(|car_id| cars.get(car_id))
                    .filter(|car| car.queued)
                    .map(|car| car.wait_time)
                    .collect();

                if !waits.is_empty() {
                    state.queue_length = waits.len() as u32;
                    state.average_wait_time = waits.iter().sum::<f64>() / waits.len() as f64;
                    state.max_wait_time = waits.iter().copied().fold(0.0, f64::max);
                }
                state
            })
            .collect()
    }
}
