//! Failure mode: every movement stopped, lamps flashing

use serde::{Deserialize, Serialize};

use super::config::ConfigMap;
use super::phase_timer::PhaseTimer;
use super::snapshot::StrategySnapshot;
use super::{TrafficControlStrategy, ALL_RED_FLASHING};
use crate::simulation::{IntersectionInfo, SignalStates, TrafficState, ALL_RED};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllRedFlashingConfig {
    /// Seconds between visibility toggles
    pub flash_interval: f64,
}

impl Default for AllRedFlashingConfig {
    fn default() -> Self {
        Self {
            flash_interval: 1.0,
        }
    }
}

impl AllRedFlashingConfig {
    pub fn to_options(&self) -> ConfigMap {
        ConfigMap::new().with("flashInterval", self.flash_interval)
    }

    pub fn apply(&mut self, options: &ConfigMap) {
        if let Some(value) = options.positive("flashInterval") {
            self.flash_interval = value;
        }
    }
}

/// Single-phase strategy that never lets traffic through
///
/// The visibility flag only drives the flashing display.
#[derive(Debug, Clone)]
pub struct AllRedFlashingStrategy {
    timer: PhaseTimer,
    config: AllRedFlashingConfig,
    visible: bool,
}

impl Default for AllRedFlashingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllRedFlashingStrategy {
    pub fn new() -> Self {
        let config = AllRedFlashingConfig::default();
        Self {
            timer: PhaseTimer::new(1, config.flash_interval),
            config,
            visible: true,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl TrafficControlStrategy for AllRedFlashingStrategy {
    fn strategy_type(&self) -> &'static str {
        ALL_RED_FLASHING
    }

    fn display_name(&self) -> &'static str {
        "All-Red Flashing"
    }

    fn description(&self) -> &'static str {
        "Emergency mode: all signals flash red and no movement is permitted"
    }

    fn timer(&self) -> &PhaseTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut PhaseTimer {
        &mut self.timer
    }

    fn initialize(&mut self, _intersection: &IntersectionInfo) {
        self.reset();
    }

    fn phase_signals(&self) -> SignalStates {
        ALL_RED
    }

    fn next_phase_duration(&self) -> f64 {
        self.config.flash_interval
    }

    fn update(&mut self, delta: f64, _traffic_states: Option<&[TrafficState]>) -> SignalStates {
        let delta = delta.max(0.0);
        self.timer.tick(delta);
        if delta > 0.0 && self.timer.elapsed() {
            self.visible = !self.visible;
            self.timer.advance();
            self.timer.next_phase_change_time = self.config.flash_interval;
        }
        ALL_RED
    }

    fn reset(&mut self) {
        self.timer.restart();
        self.timer.next_phase_change_time = self.config.flash_interval;
        self.visible = true;
    }

    fn config_options(&self) -> ConfigMap {
        self.config.to_options()
    }

    fn update_config(&mut self, options: &ConfigMap) {
        self.config.apply(options);
    }

    fn write_extras(&self, snapshot: &mut StrategySnapshot) {
        snapshot.put_extra("visible", &self.visible);
    }

    fn read_extras(&mut self, snapshot: &StrategySnapshot) {
        if let Some(visible) = snapshot.extra::<bool>("visible") {
            self.visible = visible;
        }
    }
}
