//! Registry of strategy factories and the per-strategy settings cache
//!
//! The manager is a plain value owned by the world. Every strategy it hands
//! out is a fresh instance with the cached settings of its type applied.

use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::config::ConfigMap;
use super::snapshot::StrategySnapshot;
use super::{
    AdaptiveTimingStrategy, AllRedFlashingStrategy, FixedTimingStrategy, TrafficControlStrategy,
    TrafficEnforcerStrategy, ADAPTIVE_TIMING, ALL_RED_FLASHING, FIXED_TIMING, TRAFFIC_ENFORCER,
};
use crate::simulation::{IntersectionInfo, SimIntersection};

/// Strategy used when nothing else is selected or a key is unknown
pub const DEFAULT_STRATEGY: &str = FIXED_TIMING;

/// Zero-argument constructor for one strategy type
pub type StrategyFactory = Box<dyn Fn() -> Box<dyn TrafficControlStrategy>>;

pub struct StrategyManager {
    factories: BTreeMap<String, StrategyFactory>,
    /// Normalized settings per strategy key
    settings: BTreeMap<String, ConfigMap>,
    current: String,
}

impl fmt::Debug for StrategyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyManager")
            .field("strategies", &self.factories.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("current", &self.current)
            .finish()
    }
}

impl Default for StrategyManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StrategyManager {
    /// An empty registry; `current` still names the default strategy
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            settings: BTreeMap::new(),
            current: DEFAULT_STRATEGY.to_string(),
        }
    }

    /// A registry holding the four built-in strategies
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager.register_strategy(FIXED_TIMING, || Box::new(FixedTimingStrategy::new()));
        manager.register_strategy(ADAPTIVE_TIMING, || Box::new(AdaptiveTimingStrategy::new()));
        manager.register_strategy(ALL_RED_FLASHING, || Box::new(AllRedFlashingStrategy::new()));
        manager.register_strategy(TRAFFIC_ENFORCER, || {
            Box::new(TrafficEnforcerStrategy::new())
        });
        manager
    }

    /// Register or replace the factory for `key`
    ///
    /// The settings cache is seeded with the defaults of a fresh instance.
    pub fn register_strategy<F>(&mut self, key: &str, factory: F)
    where
        F: Fn() -> Box<dyn TrafficControlStrategy> + 'static,
    {
        self.settings
            .insert(key.to_string(), factory().config_options());
        if self.factories.insert(key.to_string(), Box::new(factory)).is_some() {
            debug!("Replaced strategy factory '{}'", key);
        }
    }

    /// Registered keys, sorted
    pub fn available_strategy_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn current_strategy_type(&self) -> &str {
        &self.current
    }

    /// Make `key` the strategy handed out by [`create_strategy`](Self::create_strategy)
    ///
    /// An unknown key selects the default strategy instead and returns false.
    pub fn select_strategy(&mut self, key: &str) -> bool {
        if self.is_registered(key) {
            self.current = key.to_string();
            true
        } else {
            warn!(
                "Unknown strategy '{}', falling back to '{}'",
                key, DEFAULT_STRATEGY
            );
            self.current = DEFAULT_STRATEGY.to_string();
            false
        }
    }

    /// A fresh instance of the current strategy with its cached settings
    pub fn create_strategy(&self) -> Box<dyn TrafficControlStrategy> {
        match self.create_strategy_of(&self.current) {
            Some(strategy) => strategy,
            None => self.create_default(),
        }
    }

    /// A fresh instance of `key` with its cached settings, `None` when unregistered
    pub fn create_strategy_of(&self, key: &str) -> Option<Box<dyn TrafficControlStrategy>> {
        let factory = self.factories.get(key)?;
        let mut strategy = factory();
        if let Some(settings) = self.settings.get(key) {
            strategy.update_config(settings);
        }
        Some(strategy)
    }

    fn create_default(&self) -> Box<dyn TrafficControlStrategy> {
        self.create_strategy_of(DEFAULT_STRATEGY)
            .unwrap_or_else(|| Box::new(FixedTimingStrategy::new()))
    }

    /// Replace an intersection's strategy with a fresh instance of the current one
    pub fn apply_to_intersection<'a>(
        &self,
        intersection: &'a mut SimIntersection,
    ) -> &'a dyn TrafficControlStrategy {
        intersection.set_strategy(self.create_strategy());
        intersection.strategy()
    }

    /// Cached settings of a registered strategy, `None` for unknown keys
    pub fn strategy_settings(&self, key: &str) -> Option<&ConfigMap> {
        self.settings.get(key)
    }

    /// Merge `options` into the cached settings of `key`
    ///
    /// The merge goes through a fresh instance so invalid values are dropped
    /// and the cache always holds a complete option set. Returns false for an
    /// unregistered key.
    pub fn apply_strategy_settings(&mut self, key: &str, options: &ConfigMap) -> bool {
        let Some(mut strategy) = self.create_strategy_of(key) else {
            warn!("Cannot store settings for unknown strategy '{}'", key);
            return false;
        };

        strategy.update_config(options);
        self.settings
            .insert(key.to_string(), strategy.config_options());
        true
    }

    /// Rebuild a strategy from its JSON snapshot and bind it to `intersection`
    ///
    /// The strategy is initialized first, then the persisted state is laid
    /// over it. An unknown type or malformed snapshot yields a freshly
    /// initialized default strategy.
    pub fn create_from_json(
        &self,
        value: &Value,
        intersection: &IntersectionInfo,
    ) -> Box<dyn TrafficControlStrategy> {
        let snapshot = match serde_json::from_value::<StrategySnapshot>(value.clone()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    "Malformed strategy snapshot for {}: {}, using '{}'",
                    intersection.id, err, DEFAULT_STRATEGY
                );
                let mut strategy = self.create_default();
                strategy.initialize(intersection);
                return strategy;
            }
        };

        let Some(factory) = self.factories.get(&snapshot.strategy_type) else {
            warn!(
                "Unknown strategy type '{}' in snapshot for {}, using '{}'",
                snapshot.strategy_type, intersection.id, DEFAULT_STRATEGY
            );
            let mut strategy = self.create_default();
            strategy.initialize(intersection);
            return strategy;
        };

        let mut strategy = factory();
        strategy.initialize(intersection);
        strategy.restore(&snapshot);
        strategy
    }
}
