//! Phase clock and phase tables shared by the cyclic strategies

use serde::{Deserialize, Serialize};

use crate::simulation::{Direction, Movement, SignalStates, ALL_RED, GREEN};

/// Tolerance applied when comparing accumulated phase time to its target,
/// so that a duration fed in many small steps still switches on time
pub const PHASE_EPSILON: f64 = 1e-9;

/// Phase duration used when a strategy does not compute its own
pub const DEFAULT_PHASE_DURATION: f64 = 10.0;

/// Current phase, time spent in it and the target duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimer {
    pub current_phase: usize,
    pub time_in_phase: f64,
    pub next_phase_change_time: f64,
    pub total_phases: usize,
}

impl PhaseTimer {
    pub fn new(total_phases: usize, duration: f64) -> Self {
        Self {
            current_phase: 0,
            time_in_phase: 0.0,
            next_phase_change_time: duration,
            total_phases: total_phases.max(1),
        }
    }

    pub fn tick(&mut self, delta: f64) {
        self.time_in_phase += delta;
    }

    /// Whether the target duration of the current phase has been reached
    pub fn elapsed(&self) -> bool {
        self.time_in_phase + PHASE_EPSILON >= self.next_phase_change_time
    }

    /// Move to the next phase and start its clock
    ///
    /// The caller sets the new target once it knows the phase it entered.
    pub fn advance(&mut self) {
        self.current_phase = self.upcoming_phase();
        self.time_in_phase = 0.0;
    }

    /// The phase that follows the current one
    pub fn upcoming_phase(&self) -> usize {
        (self.current_phase + 1) % self.total_phases
    }

    /// Back to phase 0 with a fresh clock
    pub fn restart(&mut self) {
        self.current_phase = 0;
        self.time_in_phase = 0.0;
    }

    /// Change the phase count, keeping the current phase in range
    pub fn set_total_phases(&mut self, total_phases: usize) {
        self.total_phases = total_phases.max(1);
        self.current_phase %= self.total_phases;
    }
}

/// Movements permitted per approach for each phase
///
/// Each phase lists one movement string per approach (North, East, South,
/// West) built from `L`, `F` and `R`. A phase only ever encodes a
/// non-conflicting movement set.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    phases: Vec<[&'static str; 4]>,
}

/// Protected lefts, then through-and-right, for each axis in turn
const STANDARD_PHASES: [[&str; 4]; 4] = [
    ["L", "", "L", ""],
    ["FR", "", "FR", ""],
    ["", "L", "", "L"],
    ["", "FR", "", "FR"],
];

/// Everything permitted at once, for junctions where nothing can conflict
const SINGLE_PHASE: [[&str; 4]; 1] = [["LFR", "LFR", "LFR", "LFR"]];

impl PhasePlan {
    /// The four-phase plan for a full intersection
    pub fn standard() -> Self {
        Self {
            phases: STANDARD_PHASES.to_vec(),
        }
    }

    /// The single all-movement phase for junctions with two roads or fewer
    pub fn single() -> Self {
        Self {
            phases: SINGLE_PHASE.to_vec(),
        }
    }

    /// Pick the plan suited to an intersection with `road_count` connecting roads
    pub fn for_road_count(road_count: usize) -> Self {
        if road_count <= 2 {
            Self::single()
        } else {
            Self::standard()
        }
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// The signal matrix a phase permits
    pub fn signals(&self, phase: usize) -> SignalStates {
        let mut signals = ALL_RED;
        if let Some(approaches) = self.phases.get(phase) {
            for (direction, movements) in approaches.iter().enumerate() {
                for code in movements.chars() {
                    if let Some(movement) = Movement::from_code(code) {
                        signals[direction][movement.index()] = GREEN;
                    }
                }
            }
        }
        signals
    }

    /// Approaches with at least one movement permitted in a phase
    pub fn active_approaches(&self, phase: usize) -> Vec<Direction> {
        self.phases
            .get(phase)
            .map(|approaches| {
                Direction::ALL
                    .into_iter()
                    .filter(|direction| !approaches[direction.index()].is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
