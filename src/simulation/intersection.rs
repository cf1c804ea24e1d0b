//! Intersection logic for the traffic simulation
//!
//! An intersection owns its control strategy exclusively, maps incoming
//! roads onto the four approaches and keeps the signal matrix the strategy
//! produced on the last tick.

use log::warn;
use std::collections::VecDeque;

use super::pool::PoolEntity;
use super::traffic_state::TrafficState;
use super::types::{Direction, IntersectionId, Movement, Position, RoadId, SignalStates, GREEN};
use crate::strategy::TrafficControlStrategy;

/// Window over which departures count towards the flow rate, seconds
pub const FLOW_WINDOW: f64 = 60.0;

/// Read-only topology a strategy binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionInfo {
    pub id: IntersectionId,
    /// Which approaches have an incoming road, North first
    pub approaches: [bool; 4],
}

impl IntersectionInfo {
    /// A four-way intersection, mostly useful for driving strategies directly
    pub fn four_way(id: IntersectionId) -> Self {
        Self {
            id,
            approaches: [true; 4],
        }
    }

    /// An intersection whose first `road_count` approaches (N, E, S, W order) are present
    pub fn with_road_count(id: IntersectionId, road_count: usize) -> Self {
        let mut approaches = [false; 4];
        for present in approaches.iter_mut().take(road_count) {
            *present = true;
        }
        Self { id, approaches }
    }

    /// Number of roads feeding the intersection
    pub fn road_count(&self) -> usize {
        self.approaches.iter().filter(|present| **present).count()
    }

    pub fn has_approach(&self, direction: Direction) -> bool {
        self.approaches[direction.index()]
    }

    /// Present approaches in matrix order
    pub fn present_approaches(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL
            .into_iter()
            .filter(|direction| self.has_approach(*direction))
    }
}

/// An intersection in the traffic simulation
#[derive(Debug)]
pub struct SimIntersection {
    pub id: IntersectionId,
    pub position: Position,
    /// Incoming road per approach
    approaches: [Option<RoadId>; 4],
    strategy: Box<dyn TrafficControlStrategy>,
    signals: SignalStates,
    /// Simulation times of recent departures per approach
    departures: [VecDeque<f64>; 4],
    /// Cars that crossed since the intersection was created
    pub throughput: u64,
}

impl PoolEntity for SimIntersection {
    type Id = IntersectionId;

    fn id(&self) -> IntersectionId {
        self.id
    }
}

impl SimIntersection {
    pub fn new(
        id: IntersectionId,
        position: Position,
        strategy: Box<dyn TrafficControlStrategy>,
    ) -> Self {
        let mut intersection = Self {
            id,
            position,
            approaches: [None; 4],
            strategy,
            signals: [[0; 3]; 4],
            departures: Default::default(),
            throughput: 0,
        };
        intersection.rebind_strategy();
        intersection
    }

    /// Topology view handed to strategies
    pub fn info(&self) -> IntersectionInfo {
        IntersectionInfo {
            id: self.id,
            approaches: self.approaches.map(|road| road.is_some()),
        }
    }

    /// Attach an incoming road to the approach it arrives from
    ///
    /// When that side is taken the road goes to the first free approach.
    /// Returns the approach used, or `None` when all four are occupied.
    pub fn attach_approach(&mut self, road_id: RoadId, preferred: Direction) -> Option<Direction> {
        let direction = if self.approaches[preferred.index()].is_none() {
            preferred
        } else {
            let fallback = Direction::ALL
                .into_iter()
                .find(|direction| self.approaches[direction.index()].is_none());
            match fallback {
                Some(direction) => {
                    warn!(
                        "{} already has a {:?} approach, attaching {} as {:?}",
                        self.id, preferred, road_id, direction
                    );
                    direction
                }
                None => {
                    warn!("{} has no free approach for {}", self.id, road_id);
                    return None;
                }
            }
        };

        self.approaches[direction.index()] = Some(road_id);
        self.rebind_strategy();
        Some(direction)
    }

    /// Restore the approach table from a snapshot without resetting the strategy
    pub(crate) fn set_approaches(&mut self, approaches: [Option<RoadId>; 4]) {
        self.approaches = approaches;
    }

    pub fn approaches(&self) -> [Option<RoadId>; 4] {
        self.approaches
    }

    /// The approach an incoming road is attached to
    pub fn approach_of(&self, road_id: RoadId) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|direction| self.approaches[direction.index()] == Some(road_id))
    }

    pub fn approach_road(&self, direction: Direction) -> Option<RoadId> {
        self.approaches[direction.index()]
    }

    /// Replace the control strategy; the old one is dropped
    pub fn set_strategy(&mut self, strategy: Box<dyn TrafficControlStrategy>) {
        self.strategy = strategy;
        self.rebind_strategy();
    }

    /// Install an already initialized strategy, e.g. one rebuilt from a snapshot
    pub fn install_strategy(&mut self, mut strategy: Box<dyn TrafficControlStrategy>) {
        self.signals = strategy.update(0.0, None);
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> &dyn TrafficControlStrategy {
        self.strategy.as_ref()
    }

    pub fn strategy_mut(&mut self) -> &mut dyn TrafficControlStrategy {
        self.strategy.as_mut()
    }

    fn rebind_strategy(&mut self) {
        let info = self.info();
        self.strategy.initialize(&info);
        self.signals = self.strategy.update(0.0, None);
    }

    /// Let the strategy recompute the signal matrix
    pub fn update(&mut self, delta: f64, traffic_states: &[TrafficState], now: f64) {
        self.prune_departures(now);
        self.signals = self.strategy.update(delta, Some(traffic_states));
    }

    pub fn signals(&self) -> SignalStates {
        self.signals
    }

    pub fn is_green(&self, direction: Direction, movement: Movement) -> bool {
        self.signals[direction.index()][movement.index()] == GREEN
    }

    /// Note a car leaving through `direction` at simulation time `now`
    pub fn record_departure(&mut self, direction: Direction, now: f64) {
        self.departures[direction.index()].push_back(now);
        self.throughput += 1;
    }

    /// Departures per minute through an approach
    pub fn flow_rate(&self, direction: Direction) -> f64 {
        self.departures[direction.index()].len() as f64 * 60.0 / FLOW_WINDOW
    }

    /// Departure times per approach still inside the flow window
    pub fn departures(&self) -> [Vec<f64>; 4] {
        self.departures
            .each_ref()
            .map(|times| times.iter().copied().collect())
    }

    pub(crate) fn set_departures(&mut self, departures: [Vec<f64>; 4]) {
        self.departures = departures.map(VecDeque::from);
    }

    fn prune_departures(&mut self, now: f64) {
        for departures in &mut self.departures {
            while departures
                .front()
                .is_some_and(|time| now - *time > FLOW_WINDOW)
            {
                departures.pop_front();
            }
        }
    }
}
