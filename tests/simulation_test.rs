use std::process::{Command, Output};

use traffic_control_sim::simulation::WorldSnapshot;

fn run_simulation(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_traffic_control_sim"))
        .args(args)
        .env("RUST_LOG", "warn,traffic_control_sim=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the simulation runs in headless mode without crashing
#[test]
fn test_headless_simulation_runs() {
    let output = run_simulation(&["--ticks", "200", "--seed", "3"]);

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
}

/// Test that simulation statistics are logged
#[test]
fn test_simulation_statistics_logged() {
    let output = run_simulation(&["--ticks", "100", "--strategy", "traffic-enforcer"]);

    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    for statistic in [
        "Total cars spawned:",
        "Total cars completed:",
        "Active cars:",
        "Total intersections: 9",
        "Total roads: 24",
        "Strategy: traffic-enforcer",
    ] {
        assert!(
            stderr.contains(statistic),
            "Missing '{}' statistic. stderr: {}",
            statistic,
            stderr
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Traffic Simulation Summary ==="));
}

#[test]
fn test_unknown_strategy_still_runs() {
    let output = run_simulation(&["--ticks", "20", "--strategy", "green-wave"]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Strategy: fixed-timing"));
}

#[test]
fn test_oversized_delta_fails() {
    let output = run_simulation(&["--ticks", "5", "--delta", "1.5"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exceeds the one second limit"));
}

#[test]
fn test_snapshot_written() {
    let path = std::env::temp_dir().join(format!(
        "traffic_control_sim_snapshot_{}.json",
        std::process::id()
    ));
    let path_arg = path.to_string_lossy().to_string();

    let output = run_simulation(&[
        "--ticks",
        "50",
        "--strategy",
        "adaptive-timing",
        "--snapshot-out",
        &path_arg,
    ]);
    assert!(output.status.success());

    let json = std::fs::read_to_string(&path).expect("snapshot file written");
    let snapshot = WorldSnapshot::from_json_str(&json).expect("snapshot parses");
    assert_eq!(snapshot.intersections.len(), 9);
    assert_eq!(snapshot.current_strategy, "adaptive-timing");

    let _ = std::fs::remove_file(&path);
}
