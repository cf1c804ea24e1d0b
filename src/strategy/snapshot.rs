//! Persisted form of a strategy
//!
//! Every field defaults when missing so that older or partial snapshots still
//! load. Strategy specific state rides along in `extras`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::ConfigMap;

/// JSON-serializable snapshot of a strategy's state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategySnapshot {
    pub strategy_type: String,
    pub current_phase: usize,
    pub time_in_phase: f64,
    pub total_phases: usize,
    pub phase_duration: f64,
    pub config_options: ConfigMap,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl StrategySnapshot {
    pub fn to_json(&self) -> Value {
        // A struct of plain maps and numbers always converts
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Store one strategy specific field
    pub fn put_extra<T: Serialize>(&mut self, key: &str, value: &T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.extras.insert(key.to_string(), value);
        }
    }

    /// Read one strategy specific field, `None` when missing or malformed
    pub fn extra<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.extras.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                log::warn!("Ignoring malformed snapshot field '{}': {}", key, err);
                None
            }
        }
    }
}
