//! Core types for the traffic simulation
//!
//! Ids, positions, the approach/movement convention and the signal matrix
//! shared by the world and every control strategy.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;
use std::str::FromStr;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimId(pub usize);

/// A wrapper type for intersection IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntersectionId(pub SimId);

/// A wrapper type for road IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadId(pub SimId);

/// A wrapper type for car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarId(pub SimId);

impl fmt::Display for IntersectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intersection-{}", self.0 .0)
    }
}

impl fmt::Display for RoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "road-{}", self.0 .0)
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "car-{}", self.0 .0)
    }
}

/// A 3D position in the simulation
///
/// The ground plane is x/z. North points towards negative z.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f64) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Calculate the heading from this position to another (Y-axis rotation)
    ///
    /// Heading south is 0, heading east is PI/2.
    pub fn angle_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        let direction_len = (dx * dx + dz * dz).sqrt();
        if direction_len > 0.0 {
            (dx / direction_len).atan2(dz / direction_len)
        } else {
            0.0
        }
    }
}

/// The compass side an approach arrives from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    /// All approaches in signal-matrix order
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    /// The side of an intersection that `from` lies on
    pub fn from_offset(intersection: &Position, from: &Position) -> Direction {
        let dx = from.x - intersection.x;
        let dz = from.z - intersection.z;
        if dz.abs() >= dx.abs() {
            if dz < 0.0 {
                Direction::North
            } else {
                Direction::South
            }
        } else if dx > 0.0 {
            Direction::East
        } else {
            Direction::West
        }
    }

    pub fn code(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }

    pub fn from_code(code: char) -> Option<Direction> {
        match code {
            'N' => Some(Direction::North),
            'E' => Some(Direction::East),
            'S' => Some(Direction::South),
            'W' => Some(Direction::West),
            _ => None,
        }
    }
}

/// A turning choice within an approach
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Movement {
    Left = 0,
    Forward = 1,
    Right = 2,
}

impl Movement {
    /// All movements in signal-matrix order
    pub const ALL: [Movement; 3] = [Movement::Left, Movement::Forward, Movement::Right];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> char {
        match self {
            Movement::Left => 'L',
            Movement::Forward => 'F',
            Movement::Right => 'R',
        }
    }

    pub fn from_code(code: char) -> Option<Movement> {
        match code {
            'L' => Some(Movement::Left),
            'F' => Some(Movement::Forward),
            'R' => Some(Movement::Right),
            _ => None,
        }
    }

    /// Classify the turn between an incoming and an outgoing heading
    ///
    /// Traffic drives on the right. U-turns count as left turns.
    pub fn from_headings(incoming: f64, outgoing: f64) -> Movement {
        let mut diff = outgoing - incoming;
        while diff > PI {
            diff -= 2.0 * PI;
        }
        while diff <= -PI {
            diff += 2.0 * PI;
        }

        if diff > FRAC_PI_4 {
            Movement::Left
        } else if diff < -FRAC_PI_4 {
            Movement::Right
        } else {
            Movement::Forward
        }
    }
}

/// One `(direction, movement)` pair, written as `"<Dir>-<Movement>"` (e.g. `N-L`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MovementKey {
    pub direction: Direction,
    pub movement: Movement,
}

impl MovementKey {
    pub fn new(direction: Direction, movement: Movement) -> Self {
        Self {
            direction,
            movement,
        }
    }

    /// All twelve movements, approach-major
    pub fn all() -> impl Iterator<Item = MovementKey> {
        Direction::ALL.into_iter().flat_map(|direction| {
            Movement::ALL
                .into_iter()
                .map(move |movement| MovementKey::new(direction, movement))
        })
    }
}

impl fmt::Display for MovementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.direction.code(), self.movement.code())
    }
}

impl FromStr for MovementKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let parsed = match (chars.next(), chars.next(), chars.next(), chars.next()) {
            (Some(d), Some('-'), Some(m), None) => {
                Direction::from_code(d).zip(Movement::from_code(m))
            }
            _ => None,
        };
        parsed
            .map(|(direction, movement)| MovementKey::new(direction, movement))
            .ok_or_else(|| format!("invalid movement code '{s}'"))
    }
}

impl From<MovementKey> for String {
    fn from(key: MovementKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for MovementKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Signal value for a stopped movement
pub const RED: u8 = 0;

/// Signal value for a permitted movement
pub const GREEN: u8 = 1;

/// Per-approach, per-movement signal matrix: `[direction][movement]`, 0 or 1
pub type SignalStates = [[u8; 3]; 4];

/// A matrix with every movement stopped
pub const ALL_RED: SignalStates = [[RED; 3]; 4];

/// A road segment connecting two intersections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRoad {
    pub id: RoadId,
    pub start_intersection: IntersectionId,
    pub end_intersection: IntersectionId,
    pub length: f64,
    pub angle: f64,
}

impl SimRoad {
    pub fn new(
        id: RoadId,
        start_intersection: IntersectionId,
        end_intersection: IntersectionId,
        start_pos: &Position,
        end_pos: &Position,
    ) -> Self {
        Self {
            id,
            start_intersection,
            end_intersection,
            length: start_pos.distance(end_pos),
            angle: start_pos.angle_to(end_pos),
        }
    }
}

/// Length of a car in world units
pub const CAR_LENGTH: f64 = 0.5;

/// Safe following distance multiplier for CAR_LENGTH
pub const SAFE_FOLLOWING_MULTIPLIER: f64 = 1.5;

/// Default cruising speed of a car in world units per second
pub const DEFAULT_CAR_SPEED: f64 = 3.0;
