//! Phase plan whose timing follows demand
//!
//! Uses the same phases as fixed timing, but each phase is sized from the
//! demand on its approaches and may be cut short or extended while running.

use serde::{Deserialize, Serialize};

use super::config::ConfigMap;
use super::phase_timer::{PhasePlan, PhaseTimer, PHASE_EPSILON};
use super::snapshot::StrategySnapshot;
use super::{TrafficControlStrategy, ADAPTIVE_TIMING};
use crate::simulation::{ApproachReadings, IntersectionInfo, SignalStates, TrafficState};

/// Demand at which a phase gets its full extension
const DEMAND_SATURATION: f64 = 20.0;

/// Upcoming demand must exceed current demand by this factor to cut a phase short
const EARLY_SWITCH_RATIO: f64 = 2.0;

/// Share of the target duration that must pass before an early switch
const EARLY_SWITCH_PROGRESS: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveTimingConfig {
    pub base_duration: f64,
    pub min_phase_duration: f64,
    pub max_phase_duration: f64,
    /// How strongly demand stretches a phase, 0 to 1
    pub sensitivity: f64,
    pub queue_weight: f64,
    pub wait_time_weight: f64,
}

impl Default for AdaptiveTimingConfig {
    fn default() -> Self {
        Self {
            base_duration: 10.0,
            min_phase_duration: 5.0,
            max_phase_duration: 30.0,
            sensitivity: 0.5,
            queue_weight: 1.0,
            wait_time_weight: 0.1,
        }
    }
}

impl AdaptiveTimingConfig {
    pub fn to_options(&self) -> ConfigMap {
        ConfigMap::new()
            .with("baseDuration", self.base_duration)
            .with("minPhaseDuration", self.min_phase_duration)
            .with("maxPhaseDuration", self.max_phase_duration)
            .with("sensitivity", self.sensitivity)
            .with("queueWeight", self.queue_weight)
            .with("waitTimeWeight", self.wait_time_weight)
    }

    pub fn apply(&mut self, options: &ConfigMap) {
        if let Some(value) = options.positive("baseDuration") {
            self.base_duration = value;
        }
        if let Some(value) = options.positive("minPhaseDuration") {
            self.min_phase_duration = value;
        }
        if let Some(value) = options.positive("maxPhaseDuration") {
            self.max_phase_duration = value;
        }
        if let Some(value) = options.non_negative("sensitivity") {
            self.sensitivity = value.min(1.0);
        }
        if let Some(value) = options.non_negative("queueWeight") {
            self.queue_weight = value;
        }
        if let Some(value) = options.non_negative("waitTimeWeight") {
            self.wait_time_weight = value;
        }
    }

    /// `(min, max)` phase bounds with `max >= min`
    pub fn bounds(&self) -> (f64, f64) {
        let min = self.min_phase_duration;
        (min, self.max_phase_duration.max(min))
    }
}

/// Demand-responsive phase timing
#[derive(Debug, Clone)]
pub struct AdaptiveTimingStrategy {
    timer: PhaseTimer,
    config: AdaptiveTimingConfig,
    plan: PhasePlan,
    readings: ApproachReadings,
}

impl Default for AdaptiveTimingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveTimingStrategy {
    pub fn new() -> Self {
        let config = AdaptiveTimingConfig::default();
        let plan = PhasePlan::standard();
        let mut strategy = Self {
            timer: PhaseTimer::new(plan.len(), config.base_duration),
            config,
            plan,
            readings: ApproachReadings::default(),
        };
        strategy.timer.next_phase_change_time = strategy.next_phase_duration();
        strategy
    }

    pub fn config(&self) -> &AdaptiveTimingConfig {
        &self.config
    }

    /// Weighted queue and wait over the approaches a phase serves
    pub fn phase_demand(&self, phase: usize) -> f64 {
        self.plan
            .active_approaches(phase)
            .into_iter()
            .map(|direction| {
                let state = self.readings.get(direction);
                self.config.queue_weight * state.queue_length as f64
                    + self.config.wait_time_weight * state.average_wait_time
            })
            .sum()
    }

    /// Target duration for a phase carrying `demand`
    pub fn duration_for_demand(&self, demand: f64) -> f64 {
        let (min, max) = self.config.bounds();
        let base = self.config.base_duration;
        let load = (demand / DEMAND_SATURATION).min(1.0);
        (base + self.config.sensitivity * load * (max - base)).clamp(min, max)
    }
}

impl TrafficControlStrategy for AdaptiveTimingStrategy {
    fn strategy_type(&self) -> &'static str {
        ADAPTIVE_TIMING
    }

    fn display_name(&self) -> &'static str {
        "Adaptive Timing"
    }

    fn description(&self) -> &'static str {
        "Stretches or cuts phases according to queue length and waiting time"
    }

    fn timer(&self) -> &PhaseTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut PhaseTimer {
        &mut self.timer
    }

    fn initialize(&mut self, intersection: &IntersectionInfo) {
        self.plan = PhasePlan::for_road_count(intersection.road_count());
        self.timer.set_total_phases(self.plan.len());
        self.readings = ApproachReadings::default();
        self.reset();
    }

    fn phase_signals(&self) -> SignalStates {
        self.plan.signals(self.timer.current_phase)
    }

    fn observe(&mut self, traffic_states: &[TrafficState]) {
        self.readings.absorb(traffic_states);
    }

    fn should_switch_phase(&self) -> bool {
        let (min, max) = self.config.bounds();
        let elapsed = self.timer.time_in_phase + PHASE_EPSILON;
        if elapsed < min {
            return false;
        }

        let current_demand = self.phase_demand(self.timer.current_phase);
        let upcoming_demand = self.phase_demand(self.timer.upcoming_phase());

        if upcoming_demand > EARLY_SWITCH_RATIO * current_demand
            && elapsed >= EARLY_SWITCH_PROGRESS * self.timer.next_phase_change_time
        {
            return true;
        }

        if current_demand > 0.0 && elapsed < max {
            return false;
        }

        self.timer.elapsed()
    }

    fn next_phase_duration(&self) -> f64 {
        self.duration_for_demand(self.phase_demand(self.timer.current_phase))
    }

    fn config_options(&self) -> ConfigMap {
        self.config.to_options()
    }

    fn update_config(&mut self, options: &ConfigMap) {
        self.config.apply(options);
    }

    fn write_extras(&self, snapshot: &mut StrategySnapshot) {
        snapshot.put_extra("trafficStates", &self.readings);
    }

    fn read_extras(&mut self, snapshot: &StrategySnapshot) {
        if let Some(readings) = snapshot.extra::<ApproachReadings>("trafficStates") {
            self.readings = readings;
        }
    }
}
