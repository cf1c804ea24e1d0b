//! Fatal error taxonomy for the simulation core
//!
//! These errors signal a caller or integration bug. They abort the offending
//! operation and are propagated to whoever drives the tick loop. Recoverable
//! problems (unknown strategy keys, partial snapshots) are logged and handled
//! locally instead.

use crate::simulation::{CarId, RoadId};

/// A precondition violation inside the simulation core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// More than one second of simulated time was coalesced into one tick
    #[error("tick delta of {delta}s exceeds the one second limit")]
    TickTooLarge { delta: f64 },

    /// The tick delta was negative or not a number
    #[error("tick delta of {delta}s is not a valid duration")]
    InvalidTickDelta { delta: f64 },

    /// An entity with the same id already lives in the pool
    #[error("an entity with id {0} already exists in the pool")]
    DuplicateId(String),

    /// A car was released from a road position it never occupied
    #[error("car {car} has no recorded position on road {road}")]
    MissingCarPosition { car: CarId, road: RoadId },
}
