//! Pluggable signal-control strategies
//!
//! Every strategy implements [`TrafficControlStrategy`]. The trait carries
//! the shared phase-timer behaviour as default methods; a concrete strategy
//! supplies the signal matrix of its current phase and overrides the
//! switching predicate or duration where it needs to.

mod adaptive_timing;
mod all_red_flashing;
mod config;
mod conflict;
mod fixed_timing;
mod manager;
mod phase_timer;
mod snapshot;
mod traffic_enforcer;

use std::fmt;

pub use adaptive_timing::{AdaptiveTimingConfig, AdaptiveTimingStrategy};
pub use all_red_flashing::{AllRedFlashingConfig, AllRedFlashingStrategy};
pub use config::{ConfigMap, ConfigValue};
pub use conflict::ConflictTable;
pub use fixed_timing::{FixedTimingConfig, FixedTimingStrategy};
pub use manager::{StrategyFactory, StrategyManager, DEFAULT_STRATEGY};
pub use phase_timer::{PhasePlan, PhaseTimer, DEFAULT_PHASE_DURATION, PHASE_EPSILON};
pub use snapshot::StrategySnapshot;
pub use traffic_enforcer::{TrafficEnforcerConfig, TrafficEnforcerStrategy};

use crate::simulation::{IntersectionInfo, SignalStates, TrafficState};

/// Registry key of [`FixedTimingStrategy`]
pub const FIXED_TIMING: &str = "fixed-timing";
/// Registry key of [`AdaptiveTimingStrategy`]
pub const ADAPTIVE_TIMING: &str = "adaptive-timing";
/// Registry key of [`AllRedFlashingStrategy`]
pub const ALL_RED_FLASHING: &str = "all-red-flashing";
/// Registry key of [`TrafficEnforcerStrategy`]
pub const TRAFFIC_ENFORCER: &str = "traffic-enforcer";

/// A signal-control algorithm bound to one intersection
///
/// Strategies only read their inputs and produce a signal matrix; they never
/// touch the intersection or any vehicle.
pub trait TrafficControlStrategy: fmt::Debug {
    /// Registry key, also written into snapshots
    fn strategy_type(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn timer(&self) -> &PhaseTimer;

    fn timer_mut(&mut self) -> &mut PhaseTimer;

    /// Bind to an intersection's topology and reset all state
    ///
    /// Calling it again re-homes the strategy onto another intersection.
    fn initialize(&mut self, intersection: &IntersectionInfo);

    /// The signal matrix that is valid right now
    fn phase_signals(&self) -> SignalStates;

    /// Absorb the latest traffic readings. Missing approaches keep their old values
    fn observe(&mut self, _traffic_states: &[TrafficState]) {}

    fn should_switch_phase(&self) -> bool {
        self.timer().elapsed()
    }

    /// Target duration of the phase that was just entered
    fn next_phase_duration(&self) -> f64 {
        DEFAULT_PHASE_DURATION
    }

    /// Advance the phase clock by `delta` seconds and return the valid matrix
    ///
    /// A zero delta never changes the phase.
    fn update(&mut self, delta: f64, traffic_states: Option<&[TrafficState]>) -> SignalStates {
        let delta = delta.max(0.0);
        if let Some(states) = traffic_states {
            self.observe(states);
        }

        self.timer_mut().tick(delta);
        if delta > 0.0 && self.should_switch_phase() {
            self.timer_mut().advance();
            let duration = self.next_phase_duration();
            self.timer_mut().next_phase_change_time = duration;
        }

        self.phase_signals()
    }

    /// Back to phase 0 with a recomputed target duration
    fn reset(&mut self) {
        self.timer_mut().restart();
        let duration = self.next_phase_duration();
        self.timer_mut().next_phase_change_time = duration;
    }

    fn current_phase(&self) -> usize {
        self.timer().current_phase
    }

    fn total_phases(&self) -> usize {
        self.timer().total_phases
    }

    fn time_in_phase(&self) -> f64 {
        self.timer().time_in_phase
    }

    fn config_options(&self) -> ConfigMap;

    /// Apply a partial configuration; keys that are absent keep their values
    fn update_config(&mut self, options: &ConfigMap);

    /// Write strategy specific state into a snapshot
    fn write_extras(&self, _snapshot: &mut StrategySnapshot) {}

    /// Read strategy specific state back; missing fields keep current values
    fn read_extras(&mut self, _snapshot: &StrategySnapshot) {}

    fn to_snapshot(&self) -> StrategySnapshot {
        let timer = self.timer();
        let mut snapshot = StrategySnapshot {
            strategy_type: self.strategy_type().to_string(),
            current_phase: timer.current_phase,
            time_in_phase: timer.time_in_phase,
            total_phases: timer.total_phases,
            phase_duration: timer.next_phase_change_time,
            config_options: self.config_options(),
            ..Default::default()
        };
        self.write_extras(&mut snapshot);
        snapshot
    }

    /// Overlay persisted state onto an initialized strategy
    fn restore(&mut self, snapshot: &StrategySnapshot) {
        self.update_config(&snapshot.config_options);
        self.read_extras(snapshot);

        let total_phases = self.total_phases();
        if snapshot.total_phases != 0 && snapshot.total_phases != total_phases {
            log::debug!(
                "Snapshot of {} had {} phases, intersection now supports {}",
                snapshot.strategy_type,
                snapshot.total_phases,
                total_phases
            );
        }

        let timer = self.timer_mut();
        timer.current_phase = snapshot.current_phase % total_phases;
        timer.time_in_phase = if snapshot.time_in_phase.is_finite() {
            snapshot.time_in_phase.max(0.0)
        } else {
            0.0
        };

        let duration = if snapshot.phase_duration.is_finite() && snapshot.phase_duration > 0.0 {
            snapshot.phase_duration
        } else {
            self.next_phase_duration()
        };
        self.timer_mut().next_phase_change_time = duration;
    }
}
