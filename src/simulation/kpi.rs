//! Once-per-second KPI samples
//!
//! The world records one sample for every whole-second boundary a tick
//! crosses. Reporting on top of these samples lives outside the core.

use serde::{Deserialize, Serialize};

/// Network-wide indicators at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSample {
    /// Simulation time of the boundary that triggered the sample
    pub time: f64,
    pub car_count: usize,
    pub queued_cars: usize,
    /// Mean wait of the queued cars, seconds
    pub average_wait_time: f64,
    /// Cars that crossed any intersection since the start
    pub throughput: u64,
}

/// Collected KPI samples
#[derive(Debug, Clone, Default)]
pub struct KpiLog {
    samples: Vec<KpiSample>,
}

impl KpiLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole-second boundaries in `(previous, current]`
    pub fn boundaries_crossed(previous: f64, current: f64) -> Vec<f64> {
        let first = previous.floor() as i64 + 1;
        let last = current.floor() as i64;
        (first..=last).map(|second| second as f64).collect()
    }

    pub fn record(&mut self, sample: KpiSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[KpiSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&KpiSample> {
        self.samples.last()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
