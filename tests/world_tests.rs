//! Tick driver, population churn, KPI sampling and world snapshots

use std::cell::Cell;
use std::rc::Rc;

use traffic_control_sim::error::SimError;
use traffic_control_sim::simulation::{
    CarId, Direction, IntersectionId, LaneSampler, Pool, Position, SimCar, SimId,
    SimIntersection, SimRoadNetwork, SimWorld, TrafficSampler, TrafficState, WorldSnapshot,
};
use traffic_control_sim::strategy::{
    ConfigMap, ConfigValue, ADAPTIVE_TIMING, ALL_RED_FLASHING, FIXED_TIMING, TRAFFIC_ENFORCER,
};

fn grid_world(seed: u64) -> SimWorld {
    SimWorld::create_test_world_with_seed(seed).expect("test world builds")
}

/// Three intersections in a north-south line with one-way roads A -> B -> C
fn line_world(seed: u64) -> (SimWorld, [IntersectionId; 3]) {
    let mut world = SimWorld::new_with_seed(seed);
    let a = world.add_intersection(Position::new(0.0, 0.0, 0.0)).unwrap();
    let b = world.add_intersection(Position::new(0.0, 0.0, 10.0)).unwrap();
    let c = world.add_intersection(Position::new(0.0, 0.0, 20.0)).unwrap();
    world.add_road(a, b).unwrap();
    world.add_road(b, c).unwrap();
    (world, [a, b, c])
}

#[test]
fn test_test_world_topology() {
    let world = grid_world(1);
    assert_eq!(world.road_network.intersection_count(), 9);
    assert_eq!(world.road_network.road_count(), 24);

    let corner = world.intersections.get(&IntersectionId(SimId(0))).unwrap();
    let edge = world.intersections.get(&IntersectionId(SimId(1))).unwrap();
    let centre = world.intersections.get(&IntersectionId(SimId(4))).unwrap();

    assert_eq!(corner.info().road_count(), 2);
    assert_eq!(edge.info().road_count(), 3);
    assert_eq!(centre.info().road_count(), 4);

    assert_eq!(corner.strategy().total_phases(), 1);
    assert_eq!(centre.strategy().total_phases(), 4);
}

#[test]
fn test_roads_attach_to_the_side_they_arrive_from() {
    let (world, [_, b, c]) = line_world(1);

    let b = world.intersections.get(&b).unwrap();
    assert!(b.approach_road(Direction::North).is_some());
    assert!(b.approach_road(Direction::South).is_none());

    let c = world.intersections.get(&c).unwrap();
    assert_eq!(c.info().road_count(), 1);
}

#[test]
fn test_oversized_tick_is_rejected_without_mutation() {
    let mut world = grid_world(3);
    world.set_target_car_count(4);
    for _ in 0..5 {
        world.tick(0.1).unwrap();
    }

    let before = world.save().to_json_string().unwrap();
    let time = world.time;

    let err = world.tick(1.5).unwrap_err();
    assert_eq!(err, SimError::TickTooLarge { delta: 1.5 });
    assert_eq!(world.time, time);
    assert_eq!(world.save().to_json_string().unwrap(), before);
}

#[test]
fn test_invalid_tick_delta_is_rejected() {
    let mut world = grid_world(3);

    assert!(matches!(
        world.tick(-0.5),
        Err(SimError::InvalidTickDelta { .. })
    ));
    assert!(matches!(
        world.tick(f64::NAN),
        Err(SimError::InvalidTickDelta { .. })
    ));
    assert_eq!(world.time, 0.0);

    // Exactly one second is still allowed
    world.tick(1.0).unwrap();
    assert_eq!(world.time, 1.0);
}

#[test]
fn test_population_changes_by_at_most_one_per_tick() {
    let mut world = grid_world(7);
    world.set_target_car_count(5);

    let mut previous = world.cars.len();
    for _ in 0..30 {
        world.tick(0.1).unwrap();
        let count = world.cars.len();
        assert!(count <= previous + 1, "Spawned more than one car in a tick");
        assert!(count >= previous, "Lost a car while below target");
        assert!(count <= 5);
        previous = count;
    }
    assert!(previous > 0, "No car was spawned");

    world.set_target_car_count(0);
    while previous > 0 {
        world.tick(0.1).unwrap();
        let count = world.cars.len();
        assert_eq!(count, previous - 1, "Expected exactly one removal");
        previous = count;
    }
}

#[test]
fn test_removed_car_releases_its_lane_slot() {
    let mut world = grid_world(9);
    let car_id = world.spawn_car().unwrap();
    let road = world.cars.get(&car_id).unwrap().current_road;
    assert_eq!(world.road_network.cars_on_road(road), vec![car_id]);

    let removed = world.remove_car(car_id).unwrap();
    assert_eq!(removed.map(|car| car.id), Some(car_id));
    assert!(world.road_network.cars_on_road(road).is_empty());

    assert!(world.remove_car(car_id).unwrap().is_none());
}

#[test]
fn test_releasing_unknown_position_is_fatal() {
    let mut world = grid_world(9);
    let road = world.road_network.roads().ids()[0];
    let car = CarId(SimId(1000));

    assert_eq!(
        world.road_network.release_car(car, road, 3.0),
        Err(SimError::MissingCarPosition { car, road })
    );
}

#[test]
fn test_kpi_sampled_once_per_second() {
    let mut world = grid_world(2);
    world.set_target_car_count(3);

    for _ in 0..12 {
        world.tick(0.25).unwrap();
    }

    let times: Vec<f64> = world.kpi.samples().iter().map(|s| s.time).collect();
    assert_eq!(times, vec![1.0, 2.0, 3.0]);
    assert_eq!(world.kpi.latest().map(|s| s.car_count), Some(world.cars.len()));
}

#[test]
fn test_all_red_stops_every_crossing() {
    let (mut world, [_, b, _]) = line_world(4);
    assert!(world.set_strategy_for_all(ALL_RED_FLASHING));
    world.set_target_car_count(3);

    for _ in 0..600 {
        world.tick(0.1).unwrap();
    }

    assert!(world.intersections.values().all(|i| i.throughput == 0));

    let b = world.intersections.get(&b).unwrap();
    let states = LaneSampler.sample(b, &world.road_network, &world.cars);
    assert!(
        states[Direction::North.index()].queue_length > 0,
        "Cars heading through should queue at the red signal"
    );
    assert!(states[Direction::North.index()].average_wait_time > 0.0);
}

#[test]
fn test_green_signal_lets_cars_through() {
    let (mut world, [_, b, _]) = line_world(4);
    world.set_target_car_count(3);

    for _ in 0..600 {
        world.tick(0.1).unwrap();
    }

    let b = world.intersections.get(&b).unwrap();
    assert!(b.throughput > 0);
    assert!(b.flow_rate(Direction::North) >= 0.0);
    assert!(world.cars_completed > 0);
}

/// Reports a fixed queue on every approach and counts its calls
struct FixedQueueSampler {
    queue: u32,
    calls: Rc<Cell<usize>>,
}

impl TrafficSampler for FixedQueueSampler {
    fn sample(
        &mut self,
        _intersection: &SimIntersection,
        _road_network: &SimRoadNetwork,
        _cars: &Pool<SimCar>,
    ) -> Vec<TrafficState> {
        self.calls.set(self.calls.get() + 1);
        vec![TrafficState::with_queue(self.queue); 4]
    }
}

#[test]
fn test_injected_sampler_feeds_every_intersection() {
    let calls = Rc::new(Cell::new(0));
    let mut world = grid_world(5).with_sampler(FixedQueueSampler {
        queue: 7,
        calls: Rc::clone(&calls),
    });
    world.set_strategy_for_all(ADAPTIVE_TIMING);

    for _ in 0..4 {
        world.tick(0.5).unwrap();
    }
    assert_eq!(calls.get(), 4 * 9);

    let centre = world.intersections.get(&IntersectionId(SimId(4))).unwrap();
    let snapshot = centre.strategy().to_snapshot().to_json();
    assert_eq!(snapshot["trafficStates"][0]["queueLength"], 7);
    assert_eq!(snapshot["trafficStates"][3]["queueLength"], 7);
}

#[test]
fn test_every_strategy_runs_on_the_grid() {
    for key in [FIXED_TIMING, ADAPTIVE_TIMING, ALL_RED_FLASHING, TRAFFIC_ENFORCER] {
        let mut world = grid_world(12);
        assert!(world.set_strategy_for_all(key));
        world.set_target_car_count(15);

        for _ in 0..240 {
            world.tick(0.25).unwrap();
        }

        assert!(world
            .intersections
            .values()
            .all(|i| i.strategy().strategy_type() == key));
        assert_eq!(world.kpi.samples().len(), 60);
    }
}

#[test]
fn test_unknown_strategy_falls_back_to_fixed_timing() {
    let mut world = grid_world(1);
    world.set_strategy_for_all(TRAFFIC_ENFORCER);

    assert!(!world.set_strategy_for_all("green-wave"));
    assert!(world
        .intersections
        .values()
        .all(|i| i.strategy().strategy_type() == FIXED_TIMING));
}

#[test]
fn test_strategy_settings_reach_running_instances() {
    let mut world = grid_world(1);
    assert!(world.apply_strategy_settings(
        FIXED_TIMING,
        &ConfigMap::new().with("baseDuration", 25.0)
    ));

    for intersection in world.intersections.values() {
        assert_eq!(
            intersection.strategy().config_options().get("baseDuration"),
            Some(&ConfigValue::Number(25.0))
        );
    }

    // Intersections added later use the cached settings
    let id = world.add_intersection(Position::new(100.0, 0.0, 0.0)).unwrap();
    assert_eq!(
        world
            .intersections
            .get(&id)
            .unwrap()
            .strategy()
            .config_options()
            .get("baseDuration"),
        Some(&ConfigValue::Number(25.0))
    );
}

#[test]
fn test_save_and_load_round_trip() {
    let mut world = grid_world(21);
    world.set_strategy_for_all(TRAFFIC_ENFORCER);
    world.set_target_car_count(10);
    for _ in 0..150 {
        world.tick(0.2).unwrap();
    }

    let json = world.save().to_json_string().unwrap();
    let snapshot = WorldSnapshot::from_json_str(&json).unwrap();
    let mut loaded = SimWorld::load(&snapshot).unwrap();

    assert_eq!(loaded.time, world.time);
    assert_eq!(loaded.cars.len(), world.cars.len());
    assert_eq!(loaded.intersections.len(), world.intersections.len());
    assert_eq!(loaded.kpi.samples(), world.kpi.samples());
    assert_eq!(loaded.target_car_count(), 10);
    assert_eq!(
        loaded.strategy_manager.current_strategy_type(),
        TRAFFIC_ENFORCER
    );

    for id in world.intersections.ids() {
        let original = world.intersections.get(&id).unwrap();
        let restored = loaded.intersections.get(&id).unwrap();
        assert_eq!(restored.approaches(), original.approaches());
        assert_eq!(restored.signals(), original.signals());
        assert_eq!(restored.throughput, original.throughput);
        assert_eq!(
            restored.strategy().to_snapshot(),
            original.strategy().to_snapshot()
        );
    }

    for car in world.cars.values() {
        let restored = loaded.cars.get(&car.id).unwrap();
        assert_eq!(restored.current_road, car.current_road);
        assert_eq!(restored.distance_along_road, car.distance_along_road);
        assert_eq!(
            loaded.road_network.cars_on_road(car.current_road),
            world.road_network.cars_on_road(car.current_road)
        );
    }

    // Lane bookkeeping survived, so the loaded world keeps running
    for _ in 0..50 {
        loaded.tick(0.2).unwrap();
    }
    assert!(loaded.time > world.time);
}

#[test]
fn test_kpi_samples_use_camel_case_fields() {
    let mut world = grid_world(2);
    world.set_target_car_count(2);
    world.tick(1.0).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&world.save().to_json_string().unwrap()).unwrap();
    let sample = &json["kpi"][0];
    assert_eq!(sample["time"], 1.0);
    assert!(sample.get("carCount").is_some());
    assert!(sample.get("queuedCars").is_some());
    assert!(sample.get("averageWaitTime").is_some());
    assert!(sample.get("car_count").is_none());
}

#[test]
fn test_load_tolerates_missing_fields() {
    let snapshot = WorldSnapshot::from_json_str("{}").unwrap();
    let world = SimWorld::load(&snapshot).unwrap();
    assert!(world.intersections.is_empty());
    assert_eq!(
        world.strategy_manager.current_strategy_type(),
        FIXED_TIMING
    );
}

#[test]
fn test_load_rejects_duplicate_intersections() {
    let world = grid_world(1);
    let mut snapshot = world.save();
    let duplicate = snapshot.intersections[0].clone();
    snapshot.intersections.push(duplicate);

    assert!(SimWorld::load(&snapshot).is_err());
}
