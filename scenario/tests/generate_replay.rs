mod common;

use common::{FakeSim, EGO_VEHICLE, MAP};
use scenario::config::{SEED_MAX, SEED_MIN};
use scenario::placement::forward_separation;
use scenario::{
    BridgeConfig, GenerateRequest, Outcome, ScenarioConfig, ScenarioError, ScenarioGenerator,
    ScenarioKey, ScenarioReplayer, ScenarioStore, StoreError, WeatherParams,
};
use sim_client::Simulator;
use std::time::Duration;

fn request(npc_count: usize, seed: Option<i64>) -> GenerateRequest {
    let mut req = GenerateRequest::new(EGO_VEHICLE, MAP, npc_count);
    req.runtime = 5.0;
    req.seed = seed;
    req.weather = WeatherParams::fixed(0.2, 0.0, 0.4, 14.0);
    req
}

fn temp_store() -> (tempfile::TempDir, ScenarioStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ScenarioStore::open(dir.path().join("or"));
    (dir, store)
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[test]
fn placed_npcs_respect_spacing() {
    let (_dir, store) = temp_store();
    let config = ScenarioConfig::default();
    let generator = ScenarioGenerator::new(config.clone());
    let mut sim = Simulator::new(FakeSim::new());

    let req = request(12, Some(42));
    let report = generator.generate(&mut sim, &store, &req).unwrap();
    let record = &report.record;
    assert!(!record.is_empty());
    assert_eq!(sim.transport().npc_spawns().len(), record.len());

    let long = |name: &str| config.long_vehicle_types.iter().any(|t| t == name);
    let gap = |a: &str, b: &str| {
        if long(a) || long(b) {
            req.spacing.min_gap * config.long_gap_factor
        } else {
            req.spacing.min_gap
        }
    };

    let npcs: Vec<_> = record.npcs().collect();
    for (j, (name_j, later)) in npcs.iter().enumerate() {
        for (name_i, earlier) in &npcs[..j] {
            let sep = forward_separation(later, earlier);
            assert!(
                sep > gap(name_i, name_j) - 1e-9,
                "{name_j} #{j} only {sep:.3} m from {name_i}"
            );
        }
        let ego = sim_client::Transform::default();
        assert!(forward_separation(later, &ego) > req.spacing.min_gap - 1e-9);
    }
}

#[test]
fn off_lane_retries_are_bounded() {
    let (_dir, store) = temp_store();
    let config = ScenarioConfig::default();
    let budget = config.max_attempts_per_npc * 4;
    let mut fake = FakeSim::new();
    fake.lane_drift = Some(5.0);
    let mut sim = Simulator::new(fake);

    let report = ScenarioGenerator::new(config)
        .generate(&mut sim, &store, &request(4, Some(3)))
        .unwrap();

    assert!(report.record.is_empty());
    assert_eq!(report.outcome, Outcome::Completed);
    let fake = sim.transport();
    assert!(fake.npc_spawns().is_empty());
    assert!(fake.count("map/point_on_lane") <= 2 * budget);
}

#[test]
fn collision_halts_run_and_persists() {
    let (_dir, store) = temp_store();
    let mut fake = FakeSim::new();
    fake.collide_with_first_npc = true;
    let mut sim = Simulator::new(fake);

    let report = ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut sim, &store, &request(3, Some(7)))
        .unwrap();

    let message = report.to_string();
    assert!(message.contains("collided"), "{message}");
    assert!(message.contains("Seed: 7"), "{message}");
    assert!(message.contains("Replay Key: 0001"), "{message}");
    match &report.outcome {
        Outcome::Collision { agent, other, contact } => {
            assert_eq!(agent, "Ego");
            assert_eq!(other, &report.record.npc_names[0]);
            assert!(contact.is_some());
        }
        Outcome::Completed => panic!("expected a collision"),
    }

    let stored = store.read(report.key).unwrap();
    assert!(!stored.is_empty());
    assert_eq!(stored, report.record);
    assert_eq!(sim.transport().count("simulator/continue"), 0);
}

#[test]
fn zero_npcs_completes_with_empty_record() {
    let (_dir, store) = temp_store();
    let mut sim = Simulator::new(FakeSim::new());

    let report = ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut sim, &store, &request(0, Some(1)))
        .unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert!(report.to_string().starts_with("Simulation ended with no collisions"));
    let stored = store.read(report.key).unwrap();
    assert!(stored.replayed_states.is_empty());
    assert!(stored.npc_names.is_empty());
    assert_eq!(sim.transport().count("map/point_on_lane"), 0);
}

#[test]
fn random_seed_is_recorded_and_reused_on_replay() {
    let (_dir, store) = temp_store();
    let mut sim = Simulator::new(FakeSim::new());
    let report = ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut sim, &store, &request(2, None))
        .unwrap();

    assert!((SEED_MIN..=SEED_MAX).contains(&report.seed));
    assert_eq!(report.record.run_info.seed, report.seed);
    assert_eq!(sim.transport().loads, vec![(MAP.to_owned(), Some(report.seed))]);

    let mut replay_sim = Simulator::new(FakeSim::new());
    ScenarioReplayer::new(ScenarioConfig::default())
        .replay(&mut replay_sim, &store, report.key)
        .unwrap();
    assert_eq!(
        replay_sim.transport().loads,
        vec![(MAP.to_owned(), Some(report.seed))]
    );
}

#[test]
fn same_seed_reproduces_placement_and_weather() {
    let mut req = request(8, Some(-12345));
    req.weather = WeatherParams::default();

    let run = || {
        let (_dir, store) = temp_store();
        let mut sim = Simulator::new(FakeSim::new());
        ScenarioGenerator::new(ScenarioConfig::default())
            .generate(&mut sim, &store, &req)
            .unwrap()
            .record
    };
    let a = run();
    let b = run();
    assert_eq!(a.npc_names, b.npc_names);
    assert_eq!(a.replayed_states, b.replayed_states);
    assert_eq!(a.weather_info, b.weather_info);
}

#[test]
fn unknown_ego_vehicle_is_not_found() {
    let (_dir, store) = temp_store();
    let mut sim = Simulator::new(FakeSim::new());
    let mut req = request(2, Some(1));
    req.vehicle_name = "Hovercraft".into();

    let err = ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut sim, &store, &req)
        .unwrap_err();
    assert!(matches!(err, ScenarioError::VehicleNotFound(ref name) if name == "Hovercraft"));
    assert!(err.is_not_found());
    assert!(matches!(store.list_keys(), Err(StoreError::NoRegistry(_))));
}

#[test]
fn invalid_request_is_configuration_error() {
    let (_dir, store) = temp_store();
    for runtime in [-1.0, 1e30] {
        let mut sim = Simulator::new(FakeSim::new());
        let mut req = request(0, Some(1));
        req.runtime = runtime;

        let err = ScenarioGenerator::new(ScenarioConfig::default())
            .generate(&mut sim, &store, &req)
            .unwrap_err();
        assert!(matches!(err, ScenarioError::Configuration(_)), "{runtime}: {err}");
        assert!(sim.transport().commands.is_empty());
    }
}

fn bridge_config(timeout: Duration) -> ScenarioConfig {
    let mut bridge = BridgeConfig::new("10.0.0.2", 9090);
    bridge.timeout = timeout;
    bridge.poll_interval = Duration::from_millis(1);
    ScenarioConfig {
        bridge: Some(bridge),
        ..Default::default()
    }
}

#[test]
fn bridge_is_awaited() {
    let (_dir, store) = temp_store();
    let mut fake = FakeSim::new();
    fake.bridge_after_polls = Some(3);
    let mut sim = Simulator::new(fake);

    ScenarioGenerator::new(bridge_config(Duration::from_secs(5)))
        .generate(&mut sim, &store, &request(1, Some(2)))
        .unwrap();
    assert_eq!(sim.transport().count("vehicle/bridge/connect"), 1);
    assert_eq!(sim.transport().count("vehicle/bridge/connected"), 4);
}

#[test]
fn bridge_that_never_connects_is_connectivity_error() {
    let (_dir, store) = temp_store();
    let mut fake = FakeSim::new();
    fake.bridge_after_polls = None;
    let mut sim = Simulator::new(fake);

    let err = ScenarioGenerator::new(bridge_config(Duration::from_millis(20)))
        .generate(&mut sim, &store, &request(1, Some(2)))
        .unwrap_err();
    assert!(matches!(err, ScenarioError::Connectivity(_)), "{err}");
}

#[test]
fn slow_spawning_trips_the_watchdog() {
    let (_dir, store) = temp_store();
    let mut fake = FakeSim::new();
    fake.lane_query_delay = Duration::from_millis(30);
    let mut sim = Simulator::new(fake);
    let config = ScenarioConfig {
        watchdog_grace: Duration::ZERO,
        ..Default::default()
    };
    let mut req = request(20, Some(4));
    req.runtime = 0.05;

    let err = ScenarioGenerator::new(config)
        .generate(&mut sim, &store, &req)
        .unwrap_err();
    assert!(matches!(err, ScenarioError::Timeout(_)), "{err}");
    assert!(err.to_string().contains("failed to spawn"));
    assert!(sim.deadline().is_none());
    assert!(matches!(store.list_keys(), Err(StoreError::NoRegistry(_))));
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[test]
fn replay_is_idempotent() {
    let (_dir, store) = temp_store();
    let mut sim = Simulator::new(FakeSim::new());
    let report = ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut sim, &store, &request(6, Some(5)))
        .unwrap();
    let expected: Vec<_> = report
        .record
        .npcs()
        .map(|(name, t)| (name.to_owned(), *t))
        .collect();

    let replayer = ScenarioReplayer::new(ScenarioConfig::default());
    let mut replay_sim = Simulator::new(FakeSim::new());
    let first = replayer.replay(&mut replay_sim, &store, report.key).unwrap();
    let after_first = replay_sim.transport().npc_spawns();
    let second = replayer.replay(&mut replay_sim, &store, report.key).unwrap();
    let all = replay_sim.transport().npc_spawns();

    assert_eq!(first.npc_count, expected.len());
    assert_eq!(second.npc_count, expected.len());
    assert_eq!(after_first, expected);
    assert_eq!(&all[expected.len()..], expected.as_slice());
    // Second replay reuses the loaded map.
    assert_eq!(replay_sim.transport().loads.len(), 1);
    assert_eq!(replay_sim.transport().count("simulator/reset"), 1);
}

#[test]
fn replayed_collision_is_not_persisted() {
    let (_dir, store) = temp_store();
    let mut sim = Simulator::new(FakeSim::new());
    let report = ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut sim, &store, &request(3, Some(8)))
        .unwrap();
    assert!(!report.record.is_empty());

    let mut fake = FakeSim::new();
    fake.collide_with_first_npc = true;
    let mut replay_sim = Simulator::new(fake);
    let replayed = ScenarioReplayer::new(ScenarioConfig::default())
        .replay(&mut replay_sim, &store, report.key)
        .unwrap();

    assert!(replayed.outcome.is_collision());
    assert!(replayed.to_string().contains("collided"));
    assert_eq!(store.list_keys().unwrap(), vec![report.key]);
}

#[test]
fn replay_of_unknown_key_is_not_found() {
    let (_dir, store) = temp_store();
    let replayer = ScenarioReplayer::new(ScenarioConfig::default());
    let key: ScenarioKey = "0042".parse().unwrap();

    let mut sim = Simulator::new(FakeSim::new());
    let err = replayer.replay(&mut sim, &store, key).unwrap_err();
    assert!(err.is_not_found());

    let mut gen_sim = Simulator::new(FakeSim::new());
    ScenarioGenerator::new(ScenarioConfig::default())
        .generate(&mut gen_sim, &store, &request(0, Some(1)))
        .unwrap();
    let err = replayer.replay(&mut sim, &store, key).unwrap_err();
    assert!(matches!(
        err,
        ScenarioError::Store(StoreError::KeyNotFound(k)) if k == key
    ));
    assert!(sim.transport().commands.is_empty());
}
