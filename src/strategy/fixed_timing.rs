//! Fixed cycle through the standard phase plan

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::ConfigMap;
use super::phase_timer::{PhasePlan, PhaseTimer};
use super::snapshot::StrategySnapshot;
use super::{TrafficControlStrategy, FIXED_TIMING};
use crate::simulation::{IntersectionInfo, SignalStates};

/// Shortest phase the variation is allowed to produce, seconds
const MIN_PHASE_DURATION: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedTimingConfig {
    /// Nominal length of every phase, seconds
    pub base_duration: f64,
    /// Per-intersection spread around the base duration, percent
    pub variation_percentage: f64,
}

impl Default for FixedTimingConfig {
    fn default() -> Self {
        Self {
            base_duration: 10.0,
            variation_percentage: 5.0,
        }
    }
}

impl FixedTimingConfig {
    pub fn to_options(&self) -> ConfigMap {
        ConfigMap::new()
            .with("baseDuration", self.base_duration)
            .with("variationPercentage", self.variation_percentage)
    }

    pub fn apply(&mut self, options: &ConfigMap) {
        if let Some(value) = options.positive("baseDuration") {
            self.base_duration = value;
        }
        if let Some(value) = options.non_negative("variationPercentage") {
            self.variation_percentage = value.min(100.0);
        }
    }
}

/// Cycles the standard plan with a constant, slightly randomized phase length
///
/// The random factor is drawn once per instance so neighbouring
/// intersections drift apart instead of switching in lockstep.
#[derive(Debug, Clone)]
pub struct FixedTimingStrategy {
    timer: PhaseTimer,
    config: FixedTimingConfig,
    plan: PhasePlan,
    /// In `[-1, 1]`; scaled by the variation percentage
    random_factor: f64,
}

impl Default for FixedTimingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedTimingStrategy {
    pub fn new() -> Self {
        Self::with_random_factor(rand::rng().random_range(-1.0..=1.0))
    }

    /// Build with a known random factor, for reproducible runs
    pub fn with_random_factor(random_factor: f64) -> Self {
        let config = FixedTimingConfig::default();
        let plan = PhasePlan::standard();
        let mut strategy = Self {
            timer: PhaseTimer::new(plan.len(), config.base_duration),
            config,
            plan,
            random_factor: random_factor.clamp(-1.0, 1.0),
        };
        strategy.timer.next_phase_change_time = strategy.phase_duration();
        strategy
    }

    pub fn config(&self) -> &FixedTimingConfig {
        &self.config
    }

    pub fn random_factor(&self) -> f64 {
        self.random_factor
    }

    /// Base duration with this instance's variation applied
    pub fn phase_duration(&self) -> f64 {
        let multiplier = 1.0 + self.random_factor * self.config.variation_percentage / 100.0;
        (self.config.base_duration * multiplier).max(MIN_PHASE_DURATION)
    }
}

impl TrafficControlStrategy for FixedTimingStrategy {
    fn strategy_type(&self) -> &'static str {
        FIXED_TIMING
    }

    fn display_name(&self) -> &'static str {
        "Fixed Timing"
    }

    fn description(&self) -> &'static str {
        "Cycles through the phases with a constant duration"
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
        self.reset();
    }

    fn phase_signals(&self) -> SignalStates {
        self.plan.signals(self.timer.current_phase)
    }

    fn next_phase_duration(&self) -> f64 {
        self.phase_duration()
    }

    fn config_options(&self) -> ConfigMap {
        self.config.to_options()
    }

    fn update_config(&mut self, options: &ConfigMap) {
        self.config.apply(options);
    }

    fn write_extras(&self, snapshot: &mut StrategySnapshot) {
        snapshot.put_extra("randomFactor", &self.random_factor);
    }

    fn read_extras(&mut self, snapshot: &StrategySnapshot) {
        if let Some(factor) = snapshot.extra::<f64>("randomFactor") {
            self.random_factor = factor.clamp(-1.0, 1.0);
        }
    }
}
