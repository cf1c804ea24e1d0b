//! Road network graph for pathfinding and lane occupancy
//!
//! Standalone implementation of the road topology. Roads live in a [`Pool`];
//! the petgraph graph mirrors them for routing.

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use super::pool::{Pool, PoolEntity};
use super::types::{CarId, IntersectionId, Position, RoadId, SimRoad};
use crate::error::SimError;

impl PoolEntity for SimRoad {
    type Id = RoadId;

    fn id(&self) -> RoadId {
        self.id
    }
}

/// Edge data for the road network graph
#[derive(Debug, Clone, Copy)]
pub struct RoadEdge {
    pub road_id: RoadId,
    pub weight: u32, // Road length scaled for integer weights
}

impl RoadEdge {
    pub fn from_road(road: &SimRoad) -> Self {
        // Convert road length to integer weight (scaled by 100 to preserve precision)
        let weight = (road.length * 100.0) as u32;
        Self {
            road_id: road.id,
            weight: weight.max(1),
        }
    }
}

/// A car's slot on a road, ordered by distance then id
type LaneSlot = (OrderedFloat<f64>, CarId);

/// Road topology plus per-road lane occupancy
#[derive(Debug, Default)]
pub struct SimRoadNetwork {
    /// The underlying petgraph directed graph (one-way roads)
    graph: DiGraph<IntersectionId, RoadEdge>,

    /// Maps intersection IDs to their node indices in the graph
    intersection_to_node: HashMap<IntersectionId, NodeIndex>,

    /// Maps node indices back to intersection IDs
    node_to_intersection: HashMap<NodeIndex, IntersectionId>,

    /// Cached path results
    path_cache: HashMap<IntersectionId, HashMap<IntersectionId, Vec<IntersectionId>>>,

    /// Cars on each road, ordered by distance along it
    occupancy: HashMap<RoadId, BTreeSet<LaneSlot>>,

    /// Storage for road data
    roads: Pool<SimRoad>,

    /// Storage for intersection positions
    intersection_positions: HashMap<IntersectionId, Position>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an intersection to the network graph
    pub fn add_intersection(&mut self, intersection_id: IntersectionId, position: Position) {
        if self.intersection_to_node.contains_key(&intersection_id) {
            return;
        }

        let node_index = self.graph.add_node(intersection_id);
        self.intersection_to_node.insert(intersection_id, node_index);
        self.node_to_intersection.insert(node_index, intersection_id);
        self.intersection_positions.insert(intersection_id, position);
        self.path_cache.clear();
    }

    /// Gets the position of an intersection
    pub fn get_intersection_position(&self, intersection_id: IntersectionId) -> Option<&Position> {
        self.intersection_positions.get(&intersection_id)
    }

    /// Adds a road to the network and updates the graph adjacency
    pub fn add_road(&mut self, road: SimRoad) -> Result<()> {
        let start_node = *self
            .intersection_to_node
            .get(&road.start_intersection)
            .context("Start intersection not in road network")?;
        let end_node = *self
            .intersection_to_node
            .get(&road.end_intersection)
            .context("End intersection not in road network")?;

        let edge_data = RoadEdge::from_road(&road);
        self.roads.put(road)?;
        self.graph.add_edge(start_node, end_node, edge_data);
        self.path_cache.clear();
        Ok(())
    }

    /// Gets a road by ID
    pub fn get_road(&self, road_id: RoadId) -> Option<&SimRoad> {
        self.roads.get(&road_id)
    }

    /// Finds the road connecting two intersections
    pub fn find_road_between(
        &self,
        from_intersection: IntersectionId,
        to_intersection: IntersectionId,
    ) -> Result<RoadId> {
        let from_node = self
            .intersection_to_node
            .get(&from_intersection)
            .ok_or_else(|| anyhow::anyhow!("Intersection {} not found", from_intersection))?;

        let to_node = self
            .intersection_to_node
            .get(&to_intersection)
            .ok_or_else(|| anyhow::anyhow!("Intersection {} not found", to_intersection))?;

        self.graph
            .edges(*from_node)
            .find(|edge| edge.target() == *to_node)
            .map(|edge| edge.weight().road_id)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No road found connecting {} to {}",
                    from_intersection,
                    to_intersection
                )
            })
    }

    /// Finds a path between two intersections using A* (Dijkstra with null heuristic)
    ///
    /// The returned path excludes `start`.
    pub fn find_path(
        &mut self,
        start: IntersectionId,
        end: IntersectionId,
    ) -> Option<Vec<IntersectionId>> {
        if start == end {
            return Some(vec![]);
        }

        if let Some(path) = self.path_cache.get(&start).and_then(|paths| paths.get(&end)) {
            return Some(path.clone());
        }

        let start_node = self.intersection_to_node.get(&start)?;
        let end_node = self.intersection_to_node.get(&end)?;

        let (_, node_path) = astar(
            &self.graph,
            *start_node,
            |node| node == *end_node,
            |edge| edge.weight().weight,
            |_| 0, // Null heuristic = Dijkstra
        )?;

        let path: Vec<IntersectionId> = node_path
            .iter()
            .skip(1)
            .filter_map(|node_idx| self.node_to_intersection.get(node_idx).copied())
            .collect();

        self.path_cache
            .entry(start)
            .or_default()
            .insert(end, path.clone());

        Some(path)
    }

    /// Roads leaving an intersection, with the intersection they lead to
    pub fn outgoing_roads(&self, intersection_id: IntersectionId) -> Vec<(RoadId, IntersectionId)> {
        let Some(node_index) = self.intersection_to_node.get(&intersection_id) else {
            return Vec::new();
        };

        let mut connections: Vec<_> = self
            .graph
            .edges(*node_index)
            .map(|edge| {
                let road_id = edge.weight().road_id;
                let next_intersection = self.node_to_intersection[&edge.target()];
                (road_id, next_intersection)
            })
            .collect();
        connections.sort();
        connections
    }

    /// Record a car at `distance` along `road_id`
    pub fn place_car(&mut self, car_id: CarId, road_id: RoadId, distance: f64) {
        self.occupancy
            .entry(road_id)
            .or_default()
            .insert((OrderedFloat(distance), car_id));
    }

    /// Move a car's recorded position, possibly onto another road
    pub fn move_car(
        &mut self,
        car_id: CarId,
        from: (RoadId, f64),
        to: (RoadId, f64),
    ) -> Result<(), SimError> {
        self.release_car(car_id, from.0, from.1)?;
        self.place_car(car_id, to.0, to.1);
        Ok(())
    }

    /// Remove a car's recorded position
    ///
    /// Releasing a position that was never recorded means the caller's
    /// bookkeeping is out of sync, which is fatal.
    pub fn release_car(
        &mut self,
        car_id: CarId,
        road_id: RoadId,
        distance: f64,
    ) -> Result<(), SimError> {
        let removed = self
            .occupancy
            .get_mut(&road_id)
            .is_some_and(|slots| slots.remove(&(OrderedFloat(distance), car_id)));

        if removed {
            Ok(())
        } else {
            Err(SimError::MissingCarPosition {
                car: car_id,
                road: road_id,
            })
        }
    }

    /// Find the car directly ahead of `car_id` on the same road
    pub fn find_car_ahead_on_road(
        &self,
        road_id: RoadId,
        car_id: CarId,
        current_distance: f64,
    ) -> Option<(f64, CarId)> {
        self.occupancy.get(&road_id).and_then(|slots| {
            slots
                .range((
                    Bound::Excluded((OrderedFloat(current_distance), car_id)),
                    Bound::Unbounded,
                ))
                .next()
                .map(|(distance, car)| (distance.0, *car))
        })
    }

    /// Distance of the rearmost car on a road, if any
    pub fn last_car_distance(&self, road_id: RoadId) -> Option<f64> {
        self.occupancy
            .get(&road_id)
            .and_then(|slots| slots.first())
            .map(|(distance, _)| distance.0)
    }

    /// Get all cars currently on a specific road, rearmost first
    pub fn cars_on_road(&self, road_id: RoadId) -> Vec<CarId> {
        self.occupancy
            .get(&road_id)
            .map(|slots| slots.iter().map(|(_, car)| *car).collect())
            .unwrap_or_default()
    }

    /// Get number of roads
    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    /// Get number of intersections
    pub fn intersection_count(&self) -> usize {
        self.intersection_to_node.len()
    }

    /// Get all roads
    pub fn roads(&self) -> &Pool<SimRoad> {
        &self.roads
    }
}
