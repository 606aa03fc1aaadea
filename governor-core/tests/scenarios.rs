// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! End-to-end scenarios exercised through the public API only: a
//! [`ConfigStore`] feeding a [`GovernorEngine`] (or a [`GovernorRegistry`]
//! of several). `Dummy` devices complete every move instantly, which makes
//! them useless for exercising timeout/limits-violation paths. The timeout
//! and abort-in-flight scenarios lean on a `TwoPositionActuator`'s default
//! un-commanded state, which never reports itself done without outside
//! help. The limits-violation scenario needs to drive a device's live value
//! after a successful move, which `GovernorEngine::simio` exposes directly.

use std::collections::HashMap;
use std::time::Duration;

use governor_core::config::{
    ConfigStore, DeviceConfig, GovernorConfig, SequenceStep, StateConfig, SyncConfig, TargetConfig,
};
use governor_core::engine::{EngineStatus, GovernorEngine};
use governor_core::error::{ConfigError, DeviceError, EngineError, ValidationError};
use governor_core::registry::GovernorRegistry;

fn target(position: &str, limits: (f64, f64)) -> TargetConfig {
    TargetConfig {
        target: position.to_string(),
        limits,
        update_after: false,
    }
}

/// Scenario 1: happy path. `Off -> On` moves a valve then two motors in
/// parallel; every device is a `Dummy` so the whole sequence succeeds on
/// the first poll.
#[test]
fn happy_path_moves_through_declared_sequence() {
    let mut devices = HashMap::new();
    for name in ["valve", "motorA", "motorB"] {
        devices.insert(
            name.to_string(),
            DeviceConfig::Dummy {
                name: name.to_string(),
                timeout: 1.0,
            },
        );
    }

    let mut off_targets = HashMap::new();
    let mut on_targets = HashMap::new();
    for name in ["valve", "motorA", "motorB"] {
        off_targets.insert(name.to_string(), target("Closed", (0.0, 0.0)));
        on_targets.insert(name.to_string(), target("Open", (0.0, 0.0)));
    }

    let mut states = HashMap::new();
    states.insert(
        "Off".to_string(),
        StateConfig {
            name: None,
            targets: off_targets,
        },
    );
    states.insert(
        "On".to_string(),
        StateConfig {
            name: None,
            targets: on_targets,
        },
    );

    let mut off_to = HashMap::new();
    off_to.insert(
        "On".to_string(),
        vec![
            SequenceStep::Single("valve".to_string()),
            SequenceStep::Parallel(vec!["motorA".to_string(), "motorB".to_string()]),
        ],
    );
    let mut transitions = HashMap::new();
    transitions.insert("Off".to_string(), off_to);

    let config = GovernorConfig {
        name: "Plant".to_string(),
        init_state: "Off".to_string(),
        devices,
        states,
        transitions,
    };

    let store = ConfigStore::new("/tmp/happy-path.toml", config);
    let engine = GovernorEngine::spawn(store, None);

    assert_eq!(engine.status(), EngineStatus::Idle);
    engine.do_transition("On").unwrap();
    assert_eq!(engine.current_state(), "On");
    assert_eq!(engine.status(), EngineStatus::Idle);

    engine.shutdown();
}

fn single_valve_config(name: &str, timeout_secs: f64) -> GovernorConfig {
    let mut devices = HashMap::new();
    devices.insert(
        "valve".to_string(),
        DeviceConfig::TwoPositionActuator {
            name: "Valve".to_string(),
            timeout: timeout_secs,
            pv: "TST:VLV1".to_string(),
        },
    );

    let mut off_targets = HashMap::new();
    off_targets.insert("valve".to_string(), target("Closed", (0.0, 0.0)));
    let mut on_targets = HashMap::new();
    on_targets.insert("valve".to_string(), target("Open", (0.0, 0.0)));

    let mut states = HashMap::new();
    states.insert(
        "Off".to_string(),
        StateConfig {
            name: None,
            targets: off_targets,
        },
    );
    states.insert(
        "On".to_string(),
        StateConfig {
            name: None,
            targets: on_targets,
        },
    );

    let mut off_to = HashMap::new();
    off_to.insert("On".to_string(), vec![SequenceStep::Single("valve".to_string())]);
    let mut transitions = HashMap::new();
    transitions.insert("Off".to_string(), off_to);

    GovernorConfig {
        name: name.to_string(),
        init_state: "Off".to_string(),
        devices,
        states,
        transitions,
    }
}

/// Scenario 3: timeout. A `TwoPositionActuator` never reports itself
/// `Open` without an externally-driven status word, so `Device::wait`
/// reliably times out; the engine surfaces a `Device(Timeout)` error and
/// leaves `current_state` untouched.
#[test]
fn timeout_during_move_is_surfaced_and_state_is_untouched() {
    let config = single_valve_config("Plant", 0.1);
    let store = ConfigStore::new("/tmp/timeout.toml", config);
    let engine = GovernorEngine::spawn(store, None);

    let err = engine.do_transition("On").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Device(DeviceError::Timeout(_))
    ));
    assert_eq!(engine.current_state(), "Off");

    engine.shutdown();
}

/// Scenario 2 (abort-in-flight): aborting while a move is still blocked in
/// `Device::wait` forces the engine back to `init_state` as soon as the
/// supervisor picks up the event, independent of whether the in-flight
/// move itself later succeeds or times out.
#[test]
fn abort_forces_engine_back_to_init_state_during_a_move() {
    let config = single_valve_config("Plant", 0.3);
    let store = ConfigStore::new("/tmp/abort.toml", config);
    let engine = GovernorEngine::spawn(store, None);

    let (tx, rx) = std::sync::mpsc::channel();
    engine.request_transition(
        "On",
        Some(Box::new(move |result| {
            let _ = tx.send(result);
        })),
    );

    // Give the worker thread time to enter Device::wait's poll loop before
    // aborting.
    std::thread::sleep(Duration::from_millis(60));
    engine.abort();

    let result = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("transition did not complete");
    assert!(result.is_err());
    assert_eq!(engine.current_state(), "Off");
    assert_ne!(engine.status(), EngineStatus::Fault);

    engine.shutdown();
}

/// Scenario 5: a transition whose origin equals its destination is an
/// invalid config and is rejected at load time with `SameStateTransition`
/// — the error a `--check_config` run would report before exiting 1.
#[test]
fn self_transition_is_rejected_as_invalid_config() {
    let toml = r#"
        name = "Plant"
        init_state = "Off"

        [devices.valve]
        type = "Dummy"
        name = "Valve"
        timeout = 1.0

        [states.Off]
        [states.Off.targets.valve]
        target = "Closed"
        limits = [0.0, 0.0]

        [transitions.Off.Off]
    "#;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, toml).unwrap();

    let err = ConfigStore::load(&path).unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert!(
                errors
                    .iter()
                    .any(|e| matches!(e, ValidationError::SameStateTransition(_)))
            );
        }
        other => panic!("expected Validation error, got {other:?}"),
    }
}

fn motor_sync_config(governor_name: &str) -> GovernorConfig {
    let mut positions = HashMap::new();
    positions.insert("In".to_string(), 10.0);

    let mut devices = HashMap::new();
    devices.insert(
        "motorA".to_string(),
        DeviceConfig::AnalogPositioner {
            name: "MotorA".to_string(),
            timeout: 1.0,
            pv: "TST:MOT1".to_string(),
            tolerance: 0.5,
            positions,
        },
    );

    let mut states = HashMap::new();
    states.insert(
        "Off".to_string(),
        StateConfig {
            name: None,
            targets: HashMap::new(),
        },
    );

    GovernorConfig {
        name: governor_name.to_string(),
        init_state: "Off".to_string(),
        devices,
        states,
        transitions: HashMap::new(),
    }
}

fn motor_limits_config() -> GovernorConfig {
    let mut positions = HashMap::new();
    positions.insert("In".to_string(), 10.0);
    positions.insert("Out".to_string(), 0.0);

    let mut devices = HashMap::new();
    devices.insert(
        "motorA".to_string(),
        DeviceConfig::AnalogPositioner {
            name: "MotorA".to_string(),
            timeout: 1.0,
            pv: "TST:MOT1".to_string(),
            tolerance: 0.5,
            positions,
        },
    );

    let mut off_targets = HashMap::new();
    off_targets.insert("motorA".to_string(), target("Out", (0.0, 0.0)));
    let mut on_targets = HashMap::new();
    on_targets.insert("motorA".to_string(), target("In", (-0.5, 0.5)));

    let mut states = HashMap::new();
    states.insert(
        "Off".to_string(),
        StateConfig {
            name: None,
            targets: off_targets,
        },
    );
    states.insert(
        "On".to_string(),
        StateConfig {
            name: None,
            targets: on_targets,
        },
    );

    let mut off_to = HashMap::new();
    off_to.insert("On".to_string(), vec![SequenceStep::Single("motorA".to_string())]);
    let mut transitions = HashMap::new();
    transitions.insert("Off".to_string(), off_to);

    GovernorConfig {
        name: "Plant".to_string(),
        init_state: "Off".to_string(),
        devices,
        states,
        transitions,
    }
}

/// Scenario 4: after a successful transition to `On`, the motor's live
/// value drifts outside its assigned band. The supervisor's periodic band
/// scan (not a one-shot check) catches it on its next 500ms tick, pushes
/// `LimitsViolated`, and the engine is forced back to `init_state`.
#[test]
fn limits_violation_after_transition_forces_reset_to_init_state() {
    let config = motor_limits_config();
    let store = ConfigStore::new("/tmp/limits-violation.toml", config);
    let engine = GovernorEngine::spawn(store, None);

    let io = engine.simio("motorA").unwrap();
    io.set_u32("TST:MOT1:STATUS", 0x4000);
    io.set_bool("TST:MOT1:DONE", true);
    io.set_f64("TST:MOT1:RBV", 10.0);

    engine.do_transition("On").unwrap();
    assert_eq!(engine.current_state(), "On");

    io.set_f64("TST:MOT1:RBV", 100.0);
    std::thread::sleep(Duration::from_millis(800));

    assert_eq!(engine.current_state(), "Off");

    engine.shutdown();
}

/// Scenario 6: a synchronized position edit through the registry updates
/// every engine sharing that (device, position) pair, both in the
/// committed file and (implicitly, since the same `ConfigStore` serves
/// both) in memory.
#[test]
fn synchronized_position_edit_updates_every_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path_g1 = dir.path().join("g1.toml");
    let path_g2 = dir.path().join("g2.toml");

    let store_g1 = ConfigStore::new(&path_g1, motor_sync_config("G1"));
    let store_g2 = ConfigStore::new(&path_g2, motor_sync_config("G2"));
    store_g1.commit().unwrap();
    store_g2.commit().unwrap();

    let mut sync = HashMap::new();
    sync.insert("motorA".to_string(), vec!["In".to_string()]);

    let mut registry = GovernorRegistry::new(SyncConfig(sync));
    registry.register("G1", GovernorEngine::spawn(ConfigStore::load(&path_g1).unwrap(), None));
    registry.register("G2", GovernorEngine::spawn(ConfigStore::load(&path_g2).unwrap(), None));

    registry
        .set_device_position("G1", "motorA", "In", Some(7.5))
        .unwrap();

    for path in [&path_g1, &path_g2] {
        let reloaded = ConfigStore::load(path).unwrap();
        match &reloaded.config().devices["motorA"] {
            DeviceConfig::AnalogPositioner { positions, .. } => {
                assert_eq!(positions["In"], 7.5);
            }
            other => panic!("expected AnalogPositioner, got {other:?}"),
        }
    }

    registry.engine("G1").unwrap().shutdown();
    registry.engine("G2").unwrap().shutdown();
}
