//! Reactive signal allocation driven by congestion and fairness
//!
//! Instead of cycling a phase plan, the enforcer periodically scores every
//! movement, then greens the best-scoring set that is free of conflicts.
//! Severe congestion or a badly starved approach forces an early decision.
//!
//! A decision never cuts a movement's green short of the minimum green time.

use log::debug;
use serde::{Deserialize, Serialize};

use super::config::ConfigMap;
use super::conflict::ConflictTable;
use super::phase_timer::{PhaseTimer, PHASE_EPSILON};
use super::snapshot::StrategySnapshot;
use super::{TrafficControlStrategy, TRAFFIC_ENFORCER};
use crate::simulation::{
    Direction, IntersectionInfo, Movement, MovementKey, SignalStates, TrafficState, ALL_RED,
    GREEN,
};

/// Upper bound of a congestion score
pub const MAX_CONGESTION_SCORE: f64 = 10.0;

/// Below this `min/max` history ratio an approach counts as starved
const FAIRNESS_RATIO_LIMIT: f64 = 0.3;

/// Weight of the fairness bonus in movement scores
const FAIRNESS_BONUS_WEIGHT: f64 = 3.0;

/// Extra score for through movements, which clear the most vehicles
const FORWARD_BONUS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEnforcerConfig {
    /// Seconds between regular decisions
    pub decision_interval: f64,
    /// A green movement is held at least this long, seconds
    pub minimum_green_time: f64,
    /// Congestion score that forces an immediate decision
    pub emergency_threshold: f64,
    /// Green seconds after which a starved approach forces a decision
    pub fairness_window: f64,
    /// Movements must score above half of this to be activated
    pub priority_threshold: f64,
    pub priority_bonus: f64,
    pub priority_directions: Vec<Direction>,
}

impl Default for TrafficEnforcerConfig {
    fn default() -> Self {
        Self {
            decision_interval: 10.0,
            minimum_green_time: 5.0,
            emergency_threshold: 8.0,
            fairness_window: 60.0,
            priority_threshold: 5.0,
            priority_bonus: 2.0,
            priority_directions: Vec::new(),
        }
    }
}

impl TrafficEnforcerConfig {
    pub fn to_options(&self) -> ConfigMap {
        let priority_directions: Vec<f64> = self
            .priority_directions
            .iter()
            .map(|direction| direction.index() as f64)
            .collect();

        ConfigMap::new()
            .with("decisionInterval", self.decision_interval)
            .with("minimumGreenTime", self.minimum_green_time)
            .with("emergencyThreshold", self.emergency_threshold)
            .with("fairnessWindow", self.fairness_window)
            .with("priorityThreshold", self.priority_threshold)
            .with("priorityBonus", self.priority_bonus)
            .with("priorityDirections", priority_directions)
    }

    pub fn apply(&mut self, options: &ConfigMap) {
        if let Some(value) = options.positive("decisionInterval") {
            self.decision_interval = value;
        }
        if let Some(value) = options.non_negative("minimumGreenTime") {
            self.minimum_green_time = value;
        }
        if let Some(value) = options.non_negative("emergencyThreshold") {
            self.emergency_threshold = value;
        }
        if let Some(value) = options.non_negative("fairnessWindow") {
            self.fairness_window = value;
        }
        if let Some(value) = options.non_negative("priorityThreshold") {
            self.priority_threshold = value;
        }
        if let Some(value) = options.non_negative("priorityBonus") {
            self.priority_bonus = value;
        }
        if let Some(values) = options.list("priorityDirections") {
            let mut directions: Vec<Direction> = values
                .into_iter()
                .filter(|value| value.fract() == 0.0 && *value >= 0.0)
                .filter_map(|value| Direction::from_index(value as usize))
                .collect();
            directions.sort();
            directions.dedup();
            self.priority_directions = directions;
        }
    }

    pub fn is_prioritized(&self, direction: Direction) -> bool {
        self.priority_directions.contains(&direction)
    }
}

/// Reactive allocator with a conflict table and fairness tracking
///
/// Runs a single phase; `time_in_phase` is the time since the last decision.
#[derive(Debug, Clone)]
pub struct TrafficEnforcerStrategy {
    timer: PhaseTimer,
    config: TrafficEnforcerConfig,
    approaches: [bool; 4],
    conflicts: ConflictTable,
    queue_lengths: [u32; 4],
    wait_times: [f64; 4],
    flow_rates: [f64; 4],
    congestion_scores: [f64; 4],
    /// Seconds each movement has been green since it was last activated
    green_timers: [[f64; 3]; 4],
    /// Total green seconds granted per approach
    direction_history: [f64; 4],
    active_movements: Vec<MovementKey>,
    current_signals: SignalStates,
}

impl Default for TrafficEnforcerStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficEnforcerStrategy {
    pub fn new() -> Self {
        let config = TrafficEnforcerConfig::default();
        Self {
            timer: PhaseTimer::new(1, config.decision_interval),
            config,
            approaches: [true; 4],
            conflicts: ConflictTable::standard(),
            queue_lengths: [0; 4],
            wait_times: [0.0; 4],
            flow_rates: [0.0; 4],
            congestion_scores: [0.0; 4],
            green_timers: [[0.0; 3]; 4],
            direction_history: [0.0; 4],
            active_movements: Vec::new(),
            current_signals: ALL_RED,
        }
    }

    pub fn config(&self) -> &TrafficEnforcerConfig {
        &self.config
    }

    pub fn congestion_scores(&self) -> [f64; 4] {
        self.congestion_scores
    }

    pub fn direction_history(&self) -> [f64; 4] {
        self.direction_history
    }

    pub fn green_timers(&self) -> [[f64; 3]; 4] {
        self.green_timers
    }

    pub fn active_movements(&self) -> &[MovementKey] {
        &self.active_movements
    }

    fn present_approaches(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL
            .into_iter()
            .filter(|direction| self.approaches[direction.index()])
    }

    /// 0 to 10 heuristic from queue, wait and flow on one approach
    fn congestion_score(&self, direction: Direction) -> f64 {
        let i = direction.index();
        let queue = (self.queue_lengths[i] as f64 / 2.0).min(10.0);
        let wait = (self.wait_times[i] / 30.0).min(10.0);
        let flow = if self.flow_rates[i] > 0.0 {
            (10.0 / self.flow_rates[i]).min(10.0)
        } else {
            10.0
        };

        let mut score = 0.5 * queue + 0.3 * wait + 0.2 * flow;
        if self.config.is_prioritized(direction) {
            score += self.config.priority_bonus;
        }
        score.clamp(0.0, MAX_CONGESTION_SCORE)
    }

    fn refresh_congestion_scores(&mut self) {
        for direction in Direction::ALL {
            self.congestion_scores[direction.index()] = self.congestion_score(direction);
        }
    }

    fn accumulate_green_time(&mut self, delta: f64) {
        let mut served = [false; 4];
        for key in &self.active_movements {
            self.green_timers[key.direction.index()][key.movement.index()] += delta;
            served[key.direction.index()] = true;
        }
        for (history, served) in self.direction_history.iter_mut().zip(served) {
            if served {
                *history += delta;
            }
        }
    }

    fn history_bounds(&self) -> (f64, f64) {
        self.present_approaches()
            .map(|direction| self.direction_history[direction.index()])
            .fold(None, |bounds: Option<(f64, f64)>, history| match bounds {
                Some((min, max)) => Some((min.min(history), max.max(history))),
                None => Some((history, history)),
            })
            .unwrap_or((0.0, 0.0))
    }

    /// `min(history) / max(history)` over present approaches, 1 when nothing was served yet
    pub fn fairness_ratio(&self) -> f64 {
        let (min, max) = self.history_bounds();
        if max > 0.0 {
            min / max
        } else {
            1.0
        }
    }

    /// Whether conditions call for a decision ahead of the regular interval
    pub fn is_emergency(&self) -> bool {
        let congested = self.present_approaches().any(|direction| {
            self.congestion_scores[direction.index()] >= self.config.emergency_threshold
        });
        if congested {
            return true;
        }

        let (_, max) = self.history_bounds();
        max > self.config.fairness_window && self.fairness_ratio() < FAIRNESS_RATIO_LIMIT
    }

    fn minimum_green_elapsed(&self) -> bool {
        self.active_movements.iter().all(|key| {
            self.green_timers[key.direction.index()][key.movement.index()] + PHASE_EPSILON
                >= self.config.minimum_green_time
        })
    }

    /// Every movement on a present approach with its score, best first
    fn score_candidates(&self) -> Vec<(MovementKey, f64)> {
        let (_, max_history) = self.history_bounds();

        let mut candidates: Vec<(MovementKey, f64)> = self
            .present_approaches()
            .flat_map(|direction| {
                Movement::ALL.map(|movement| MovementKey::new(direction, movement))
            })
            .map(|key| {
                let i = key.direction.index();
                let fairness_bonus = if max_history > 0.0 {
                    (1.0 - self.direction_history[i] / max_history) * FAIRNESS_BONUS_WEIGHT
                } else {
                    0.0
                };
                let forward_bonus = if key.movement == Movement::Forward {
                    FORWARD_BONUS
                } else {
                    0.0
                };
                let priority_bonus = if self.config.is_prioritized(key.direction) {
                    self.config.priority_bonus
                } else {
                    0.0
                };

                let score =
                    self.congestion_scores[i] + fairness_bonus + forward_bonus + priority_bonus;
                (key, score)
            })
            .collect();

        // Stable sort keeps approach-major order between equal scores
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates
    }

    /// Green the best conflict-free movement set and restart the decision clock
    fn make_decision(&mut self) {
        let candidates = self.score_candidates();
        let threshold = self.config.priority_threshold / 2.0;

        let mut chosen: Vec<MovementKey> = Vec::new();
        for (key, score) in &candidates {
            if *score > threshold
                && chosen
                    .iter()
                    .all(|active| !self.conflicts.conflicts(*key, *active))
            {
                chosen.push(*key);
            }
        }

        if chosen.is_empty() {
            if let Some((key, _)) = candidates.first() {
                chosen.push(*key);
            }
        }

        self.current_signals = ALL_RED;
        for key in &chosen {
            let (d, m) = (key.direction.index(), key.movement.index());
            self.current_signals[d][m] = GREEN;
            self.green_timers[d][m] = 0.0;
        }

        debug!(
            "Enforcer activated [{}] with congestion {:?}",
            chosen
                .iter()
                .map(MovementKey::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            self.congestion_scores
        );

        self.active_movements = chosen;
        self.timer.time_in_phase = 0.0;
    }
}

impl TrafficControlStrategy for TrafficEnforcerStrategy {
    fn strategy_type(&self) -> &'static str {
        TRAFFIC_ENFORCER
    }

    fn display_name(&self) -> &'static str {
        "Traffic Enforcer"
    }

    fn description(&self) -> &'static str {
        "Allocates green to the most congested conflict-free movements, with fairness tracking"
    }

    fn timer(&self) -> &PhaseTimer {
        &self.timer
    }

    fn timer_mut(&mut self) -> &mut PhaseTimer {
        &mut self.timer
    }

    fn initialize(&mut self, intersection: &IntersectionInfo) {
        self.approaches = intersection.approaches;
        self.conflicts = ConflictTable::for_approaches(intersection.approaches);
        self.reset();
    }

    fn phase_signals(&self) -> SignalStates {
        self.current_signals
    }

    fn observe(&mut self, traffic_states: &[TrafficState]) {
        for (i, state) in traffic_states.iter().take(4).enumerate() {
            self.queue_lengths[i] = state.queue_length;
            self.wait_times[i] = state.average_wait_time;
            self.flow_rates[i] = state.flow_rate;
        }
    }

    fn next_phase_duration(&self) -> f64 {
        self.config.decision_interval
    }

    fn update(&mut self, delta: f64, traffic_states: Option<&[TrafficState]>) -> SignalStates {
        let delta = delta.max(0.0);
        if let Some(states) = traffic_states {
            self.observe(states);
        }

        self.timer.tick(delta);
        self.accumulate_green_time(delta);
        self.refresh_congestion_scores();

        if delta > 0.0 && self.minimum_green_elapsed() {
            let emergency = self.is_emergency();
            if emergency && !self.timer.elapsed() {
                debug!(
                    "Enforcer emergency decision after {:.1}s: congestion {:?}, fairness {:.2}",
                    self.timer.time_in_phase,
                    self.congestion_scores,
                    self.fairness_ratio()
                );
            }
            if self.active_movements.is_empty() || emergency || self.timer.elapsed() {
                self.make_decision();
            }
        }

        self.current_signals
    }

    fn reset(&mut self) {
        self.timer.restart();
        self.timer.next_phase_change_time = self.config.decision_interval;
        self.queue_lengths = [0; 4];
        self.wait_times = [0.0; 4];
        self.flow_rates = [0.0; 4];
        self.congestion_scores = [0.0; 4];
        self.green_timers = [[0.0; 3]; 4];
        self.direction_history = [0.0; 4];
        self.active_movements.clear();
        self.current_signals = ALL_RED;
    }

    fn config_options(&self) -> ConfigMap {
        self.config.to_options()
    }

    fn update_config(&mut self, options: &ConfigMap) {
        self.config.apply(options);
        self.timer.next_phase_change_time = self.config.decision_interval;
    }

    fn write_extras(&self, snapshot: &mut StrategySnapshot) {
        snapshot.put_extra("currentSignals", &self.current_signals);
        snapshot.put_extra("activeMovements", &self.active_movements);
        snapshot.put_extra("greenTimers", &self.green_timers);
        snapshot.put_extra("directionHistory", &self.direction_history);
        snapshot.put_extra("queueLengths", &self.queue_lengths);
        snapshot.put_extra("waitTimes", &self.wait_times);
        snapshot.put_extra("flowRates", &self.flow_rates);
        snapshot.put_extra("congestionScores", &self.congestion_scores);
    }

    fn read_extras(&mut self, snapshot: &StrategySnapshot) {
        if let Some(signals) = snapshot.extra("currentSignals") {
            self.current_signals = signals;
        }
        if let Some(active) = snapshot.extra::<Vec<MovementKey>>("activeMovements") {
            let approaches = self.approaches;
            self.active_movements = active
                .into_iter()
                .filter(|key| approaches[key.direction.index()])
                .collect();
        }
        if let Some(timers) = snapshot.extra("greenTimers") {
            self.green_timers = timers;
        }
        if let Some(history) = snapshot.extra("directionHistory") {
            self.direction_history = history;
        }
        if let Some(queues) = snapshot.extra("queueLengths") {
            self.queue_lengths = queues;
        }
        if let Some(waits) = snapshot.extra("waitTimes") {
            self.wait_times = waits;
        }
        if let Some(flows) = snapshot.extra("flowRates") {
            self.flow_rates = flows;
        }
        if let Some(scores) = snapshot.extra("congestionScores") {
            self.congestion_scores = scores;
        }
    }
}
