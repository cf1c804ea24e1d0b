//! Standalone traffic simulation module
//!
//! Entity pools, road network, cars and the tick driver that asks each
//! intersection's control strategy for a fresh signal matrix. Everything
//! runs headless and can be driven directly from tests.

mod car;
mod intersection;
mod kpi;
mod pool;
mod road_network;
mod snapshot;
mod traffic_state;
mod types;
mod world;

pub use car::{CarUpdateResult, SimCar, FOLLOWING_DISTANCE};
pub use intersection::{IntersectionInfo, SimIntersection, FLOW_WINDOW};
pub use kpi::{KpiLog, KpiSample};
pub use pool::{Pool, PoolEntity};
pub use road_network::{RoadEdge, SimRoadNetwork};
pub use snapshot::{IntersectionSnapshot, WorldSnapshot};
pub use traffic_state::{ApproachReadings, LaneSampler, TrafficSampler, TrafficState};
pub use types::{
    CarId, Direction, IntersectionId, Movement, MovementKey, Position, RoadId, SignalStates,
    SimId, SimRoad, ALL_RED, CAR_LENGTH, DEFAULT_CAR_SPEED, GREEN, RED, SAFE_FOLLOWING_MULTIPLIER,
};
pub use world::{SimWorld, MAX_TICK_DELTA};
