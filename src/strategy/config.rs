//! String-keyed configuration view shared by all strategies
//!
//! Each strategy keeps a typed config struct and converts to and from a
//! [`ConfigMap`] at the manager/UI boundary.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single configuration value: a number or a list of numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Number(f64),
    List(Vec<f64>),
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<Vec<f64>> for ConfigValue {
    fn from(value: Vec<f64>) -> Self {
        ConfigValue::List(value)
    }
}

/// Ordered `key -> value` configuration map
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(BTreeMap<String, ConfigValue>);

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a finite, non-negative number, warning when the key holds something else
    pub fn non_negative(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            ConfigValue::Number(value) if value.is_finite() && *value >= 0.0 => Some(*value),
            other => {
                warn!("Ignoring invalid value {:?} for config option '{}'", other, key);
                None
            }
        }
    }

    /// Read a finite number strictly greater than zero
    pub fn positive(&self, key: &str) -> Option<f64> {
        match self.non_negative(key) {
            Some(value) if value > 0.0 => Some(value),
            Some(_) => {
                warn!("Ignoring zero value for config option '{}'", key);
                None
            }
            None => None,
        }
    }

    /// Read a list of numbers; a single number is treated as a one-element list
    pub fn list(&self, key: &str) -> Option<Vec<f64>> {
        match self.0.get(key)? {
            ConfigValue::List(values) => Some(values.clone()),
            ConfigValue::Number(value) => Some(vec![*value]),
        }
    }
}
