//! Traffic Control Simulation Library
//!
//! A headless road-traffic simulation for comparing intersection
//! signal-control strategies.

pub mod error;
pub mod simulation;
pub mod strategy;
