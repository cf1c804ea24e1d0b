//! Phase-timer behaviour of the cyclic strategies
//!
//! Drives fixed timing, adaptive timing and all-red flashing directly,
//! without a world around them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use traffic_control_sim::simulation::{
    IntersectionId, IntersectionInfo, SimId, TrafficState, ALL_RED,
};
use traffic_control_sim::strategy::{
    AdaptiveTimingStrategy, AllRedFlashingStrategy, ConfigMap, FixedTimingStrategy,
    StrategyManager, TrafficControlStrategy, TrafficEnforcerStrategy,
};

fn four_way() -> IntersectionInfo {
    IntersectionInfo::four_way(IntersectionId(SimId(0)))
}

/// Fixed timing with one second phases and no variation
fn one_second_fixed() -> FixedTimingStrategy {
    let mut strategy = FixedTimingStrategy::with_random_factor(0.0);
    strategy.update_config(
        &ConfigMap::new()
            .with("baseDuration", 1.0)
            .with("variationPercentage", 0.0),
    );
    strategy.initialize(&four_way());
    strategy
}

fn queues(lengths: [u32; 4]) -> Vec<TrafficState> {
    lengths.into_iter().map(TrafficState::with_queue).collect()
}

fn all_strategies() -> Vec<Box<dyn TrafficControlStrategy>> {
    let manager = StrategyManager::with_defaults();
    manager
        .available_strategy_types()
        .into_iter()
        .filter_map(|key| manager.create_strategy_of(key))
        .map(|mut strategy| {
            strategy.initialize(&four_way());
            strategy
        })
        .collect()
}

#[test]
fn test_fixed_timing_holds_phase_until_duration() {
    let mut strategy = one_second_fixed();
    assert_eq!(strategy.total_phases(), 4);
    assert_eq!(strategy.current_phase(), 0);

    let before = strategy.update(0.9, None);
    assert_eq!(strategy.current_phase(), 0);

    let again = strategy.update(0.0, None);
    assert_eq!(strategy.current_phase(), 0);
    assert_eq!(before, again);

    let after = strategy.update(0.2, None);
    assert_eq!(strategy.current_phase(), 1);
    assert_ne!(before, after);
}

#[test]
fn test_fixed_timing_phase_signals() {
    let mut strategy = one_second_fixed();

    // Protected lefts north and south
    let signals = strategy.update(0.0, None);
    assert_eq!(signals, [[1, 0, 0], [0, 0, 0], [1, 0, 0], [0, 0, 0]]);

    strategy.update(1.0, None);
    assert_eq!(
        strategy.phase_signals(),
        [[0, 1, 1], [0, 0, 0], [0, 1, 1], [0, 0, 0]]
    );

    strategy.update(1.0, None);
    assert_eq!(
        strategy.phase_signals(),
        [[0, 0, 0], [1, 0, 0], [0, 0, 0], [1, 0, 0]]
    );

    strategy.update(1.0, None);
    strategy.update(1.0, None);
    assert_eq!(strategy.current_phase(), 0, "Phase should wrap around");
}

#[test]
fn test_small_steps_do_not_lose_a_switch() {
    let step_patterns: Vec<Vec<f64>> = vec![
        vec![0.1; 10],
        vec![1.0 / 3.0; 3],
        vec![1.0 / 7.0; 7],
        vec![0.25, 0.5, 0.25],
        vec![0.7, 0.0, 0.3],
        vec![0.01; 100],
    ];

    for steps in step_patterns {
        let mut strategy = one_second_fixed();
        for step in &steps {
            strategy.update(*step, None);
        }
        assert_eq!(
            strategy.current_phase(),
            1,
            "Steps {:?} should advance exactly one phase",
            steps
        );
    }
}

#[test]
fn test_fixed_timing_variation_stays_in_band() {
    for _ in 0..50 {
        let strategy = FixedTimingStrategy::new();
        let duration = strategy.phase_duration();
        assert!(
            (9.5..=10.5).contains(&duration),
            "Duration {} outside 5% band",
            duration
        );
        assert!((-1.0..=1.0).contains(&strategy.random_factor()));
    }
}

#[test]
fn test_two_road_intersection_uses_single_phase() {
    let info = IntersectionInfo::with_road_count(IntersectionId(SimId(3)), 2);
    let mut strategy = FixedTimingStrategy::with_random_factor(0.0);
    strategy.initialize(&info);

    assert_eq!(strategy.total_phases(), 1);
    assert_eq!(strategy.phase_signals(), [[1, 1, 1]; 4]);

    strategy.update(25.0, None);
    assert_eq!(strategy.current_phase(), 0);
}

#[test]
fn test_partial_config_update_keeps_other_keys() {
    let mut strategy = FixedTimingStrategy::with_random_factor(0.5);
    strategy.update_config(&ConfigMap::new().with("baseDuration", 20.0));

    assert_eq!(strategy.config().base_duration, 20.0);
    assert_eq!(strategy.config().variation_percentage, 5.0);

    // Invalid values are ignored
    strategy.update_config(&ConfigMap::new().with("baseDuration", -4.0));
    assert_eq!(strategy.config().base_duration, 20.0);
}

#[test]
fn test_current_phase_stays_in_range() {
    let mut rng = StdRng::seed_from_u64(11);

    for mut strategy in all_strategies() {
        for _ in 0..500 {
            let delta = rng.random_range(0.0..1.0);
            let states: Vec<TrafficState> = (0..4)
                .map(|_| TrafficState {
                    queue_length: rng.random_range(0..20),
                    average_wait_time: rng.random_range(0.0..120.0),
                    flow_rate: rng.random_range(0.0..30.0),
                    ..Default::default()
                })
                .collect();

            strategy.update(delta, Some(&states));
            assert!(
                strategy.current_phase() < strategy.total_phases(),
                "{} left its phase range",
                strategy.strategy_type()
            );
        }
    }
}

#[test]
fn test_zero_delta_update_is_idempotent() {
    let states = queues([6, 2, 9, 1]);

    for mut strategy in all_strategies() {
        for _ in 0..37 {
            strategy.update(0.4, Some(&states));
        }
        let first = strategy.update(0.0, Some(&states));
        let phase = strategy.current_phase();
        let second = strategy.update(0.0, Some(&states));

        assert_eq!(first, second, "{} changed on a zero delta", strategy.strategy_type());
        assert_eq!(phase, strategy.current_phase());
    }
}

#[test]
fn test_snapshot_round_trip_for_every_strategy() {
    let manager = StrategyManager::with_defaults();
    let info = four_way();
    let states = queues([4, 12, 0, 7]);

    for mut strategy in all_strategies() {
        for _ in 0..23 {
            strategy.update(0.7, Some(&states));
        }

        let json = strategy.to_snapshot().to_json();
        let restored = manager.create_from_json(&json, &info);

        assert_eq!(restored.strategy_type(), strategy.strategy_type());
        assert_eq!(restored.config_options(), strategy.config_options());
        assert_eq!(restored.current_phase(), strategy.current_phase());
        assert_eq!(restored.time_in_phase(), strategy.time_in_phase());
        assert_eq!(restored.total_phases(), strategy.total_phases());
        assert_eq!(restored.phase_signals(), strategy.phase_signals());
        assert_eq!(restored.to_snapshot(), strategy.to_snapshot());
    }
}

#[test]
fn test_snapshot_uses_camel_case_fields() {
    let strategy = one_second_fixed();
    let json = strategy.to_snapshot().to_json();

    assert_eq!(json["strategyType"], "fixed-timing");
    assert_eq!(json["currentPhase"], 0);
    assert_eq!(json["totalPhases"], 4);
    assert_eq!(json["configOptions"]["baseDuration"], 1.0);
    assert_eq!(json["randomFactor"], 0.0);
}

#[test]
fn test_adaptive_duration_follows_demand() {
    let strategy = AdaptiveTimingStrategy::new();

    assert_eq!(strategy.duration_for_demand(0.0), 10.0);
    assert_eq!(strategy.duration_for_demand(10.0), 15.0);
    assert_eq!(strategy.duration_for_demand(20.0), 20.0);
    assert_eq!(strategy.duration_for_demand(500.0), 20.0);
}

#[test]
fn test_adaptive_extends_phase_with_demand() {
    let mut strategy = AdaptiveTimingStrategy::new();
    strategy.initialize(&four_way());

    // Queue on the approaches served by the first phases
    let states = queues([10, 0, 0, 0]);
    for second in 1..30 {
        strategy.update(1.0, Some(&states));
        assert_eq!(
            strategy.current_phase(),
            0,
            "Phase with demand switched after {}s",
            second
        );
    }

    strategy.update(1.0, Some(&states));
    assert_eq!(strategy.current_phase(), 1, "Maximum duration must end the phase");
}

#[test]
fn test_adaptive_switches_early_for_waiting_cross_traffic() {
    let mut strategy = AdaptiveTimingStrategy::new();
    strategy.initialize(&four_way());
    let states = queues([0, 10, 0, 10]);

    for _ in 0..10 {
        strategy.update(1.0, Some(&states));
    }
    assert_eq!(strategy.current_phase(), 1);

    for _ in 0..7 {
        strategy.update(1.0, Some(&states));
    }
    assert_eq!(strategy.current_phase(), 1);

    // 75% of the ten second target has passed
    strategy.update(1.0, Some(&states));
    assert_eq!(strategy.current_phase(), 2);
    assert_eq!(strategy.timer().next_phase_change_time, 20.0);
}

#[test]
fn test_adaptive_respects_minimum_duration() {
    let mut strategy = AdaptiveTimingStrategy::new();
    strategy.update_config(&ConfigMap::new().with("baseDuration", 1.0));
    strategy.initialize(&four_way());

    for _ in 0..4 {
        strategy.update(1.0, Some(&queues([0, 0, 0, 0])));
    }
    assert_eq!(strategy.current_phase(), 0);

    strategy.update(1.0, Some(&queues([0, 0, 0, 0])));
    assert_eq!(strategy.current_phase(), 1);
}

#[test]
fn test_all_red_never_permits_movement() {
    let mut strategy = AllRedFlashingStrategy::new();
    strategy.update_config(&ConfigMap::new().with("flashInterval", 0.5));
    strategy.initialize(&four_way());

    assert!(strategy.is_visible());
    assert_eq!(strategy.update(0.5, None), ALL_RED);
    assert!(!strategy.is_visible());
    assert_eq!(strategy.update(0.25, None), ALL_RED);
    assert!(!strategy.is_visible());
    assert_eq!(strategy.update(0.25, None), ALL_RED);
    assert!(strategy.is_visible());
    assert_eq!(strategy.total_phases(), 1);
}

#[test]
fn test_initialize_rehomes_strategy() {
    let mut strategy = TrafficEnforcerStrategy::new();
    strategy.initialize(&four_way());
    strategy.update(1.0, Some(&queues([3, 3, 3, 3])));
    assert!(!strategy.active_movements().is_empty());

    let three_way = IntersectionInfo {
        id: IntersectionId(SimId(9)),
        approaches: [true, true, true, false],
    };
    strategy.initialize(&three_way);

    assert!(strategy.active_movements().is_empty());
    assert_eq!(strategy.phase_signals(), ALL_RED);
    assert_eq!(strategy.time_in_phase(), 0.0);
}
