// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! `GovernorEngine`: the state machine driving one governor's devices
//! through its declared states and transitions.
//!
//! A governor is Idle, Busy (running a transition), Disabled, or Fault.
//! `do_transition` runs under a single per-engine lock so transitions never
//! overlap; a separate supervisor thread wakes every 500ms to run a health
//! scan (disconnected/alarmed/not-homed) and a band scan (every device with
//! an assigned target still within its tolerance band), and reacts to
//! pushed fault events (timeout, limits violation, abort) by forcing the
//! engine back to its init state. A transition-worker thread drains queued
//! `request_transition` calls so bus-facing callers never block on device
//! motion.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::config::{ConfigStore, GovernorConfig, SequenceStep, StateConfig, TargetConfig};
use crate::device::{AnalogPositioner, Device, DeviceKind, Dummy, SimIo, TwoPositionActuator};
use crate::error::{DeviceError, EngineError};

/// A state's observer-facing view: whether it's the current state, whether
/// it's reachable from the current state, and the configured `(low, high)`
/// offset limits for each device it targets.
#[derive(Debug, Clone)]
pub struct StateView {
    pub name: String,
    pub active: bool,
    pub reachable: bool,
    pub device_limits: HashMap<String, (f64, f64)>,
}

/// A transition's observer-facing view: whether it's the one currently
/// executing, and whether it's reachable from the current state (i.e. its
/// origin matches).
#[derive(Debug, Clone)]
pub struct TransitionView {
    pub origin: String,
    pub destination: String,
    pub active: bool,
    pub reachable: bool,
}

/// A device's observer-facing view: how many states target it, and its
/// declared positions by name (the fixed table for `TwoPositionActuator`,
/// the configured setpoints for `AnalogPositioner`, empty for `Dummy`).
#[derive(Debug, Clone)]
pub struct DeviceView {
    pub name: String,
    pub target_count: usize,
    pub positions: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Busy,
    Disabled,
    Fault,
}

#[derive(Debug, Clone, Copy)]
pub enum LimitSide {
    Low,
    High,
}

/// A full-state snapshot handed to the observer after any state change:
/// `update(gov_name, state_view, transition_view, device_positions)` from
/// spec.md §4.4, with `state_view`/`transition_view` expanded to one entry
/// per declared state/transition and `device_positions` folded into
/// [`DeviceView`] alongside each device's target count.
#[derive(Debug, Clone)]
pub struct GovernorSnapshot {
    pub governor: String,
    pub current_state: String,
    pub next_state: String,
    pub status: EngineStatus,
    pub status_message: String,
    pub states: Vec<StateView>,
    pub transitions: Vec<TransitionView>,
    pub devices: Vec<DeviceView>,
}

/// One-way callback the engine uses to report state changes.
pub trait ObserverSink: Send + Sync {
    fn update(&self, snapshot: GovernorSnapshot);
}

#[derive(Debug, Default)]
struct FaultSets {
    disconnected: HashSet<String>,
    alarmed: HashSet<String>,
    not_homed: HashSet<String>,
}

impl FaultSets {
    fn is_empty(&self) -> bool {
        self.disconnected.is_empty() && self.alarmed.is_empty() && self.not_homed.is_empty()
    }
}

enum EngineEvent {
    Disconnect,
    Alarm,
    LimitsViolated,
    Timeout,
    Abort,
    Shutdown,
}

type CompletionCallback = Box<dyn FnOnce(Result<(), EngineError>) + Send + 'static>;

enum TransitionRequest {
    Run(String, Option<CompletionCallback>),
    Shutdown,
}

pub struct GovernorEngine {
    name: String,
    config: Mutex<ConfigStore>,
    devices: HashMap<String, Device>,
    /// Each non-`Dummy` device's backing `SimIo`, keyed by device name.
    /// `SimIo` is the only `ChannelIo` implementation this crate has (the
    /// real control bus is out of scope); exposed via [`Self::simio`] so
    /// tests can drive live values and status bits directly.
    io_handles: HashMap<String, Arc<SimIo>>,
    states: HashMap<String, StateConfig>,
    transitions: HashMap<String, HashMap<String, Vec<SequenceStep>>>,
    init_state: String,

    current_state: Mutex<String>,
    next_state: Mutex<String>,
    status: Mutex<EngineStatus>,
    enabled: AtomicBool,
    abort_flag: AtomicBool,
    transition_lock: Mutex<()>,
    fault_sets: Mutex<FaultSets>,
    observer: Mutex<Option<Arc<dyn ObserverSink>>>,

    event_tx: Sender<EngineEvent>,
    transition_tx: Sender<TransitionRequest>,
}

impl GovernorEngine {
    /// Build the engine's devices and state catalog from a loaded config
    /// and start its supervisor and transition-worker threads.
    ///
    /// Every non-`Dummy` device is backed by a [`SimIo`]: the real control
    /// system bus is out of scope here, so there is no production
    /// `ChannelIo` implementation to wire in instead.
    pub fn spawn(config: ConfigStore, observer: Option<Arc<dyn ObserverSink>>) -> Arc<Self> {
        let cfg = config.config().clone();
        let (devices, io_handles) = build_devices(&cfg);
        let init_state = cfg.init_state.clone();

        let (event_tx, event_rx) = unbounded();
        let (transition_tx, transition_rx) = unbounded();

        let engine = Arc::new(Self {
            name: cfg.name.clone(),
            config: Mutex::new(config),
            devices,
            io_handles,
            states: cfg.states.clone(),
            transitions: cfg.transitions.clone(),
            init_state: init_state.clone(),
            current_state: Mutex::new(init_state.clone()),
            next_state: Mutex::new(init_state),
            status: Mutex::new(EngineStatus::Idle),
            enabled: AtomicBool::new(true),
            abort_flag: AtomicBool::new(false),
            transition_lock: Mutex::new(()),
            fault_sets: Mutex::new(FaultSets::default()),
            observer: Mutex::new(observer),
            event_tx,
            transition_tx,
        });

        {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.run_supervisor(event_rx));
        }
        {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.run_transition_worker(transition_rx));
        }

        engine
    }

    /// Stop the supervisor and transition-worker threads. Queued
    /// transitions are dropped; in-flight ones still complete.
    pub fn shutdown(&self) {
        let _ = self.event_tx.send(EngineEvent::Shutdown);
        let _ = self.transition_tx.send(TransitionRequest::Shutdown);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock().unwrap()
    }

    pub fn current_state(&self) -> String {
        self.current_state.lock().unwrap().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// The `SimIo` backing a non-`Dummy` device, if any. There is no
    /// production `ChannelIo` to hand back instead; this exists so tests can
    /// drive a device's live value or status bits without a real bus.
    pub fn simio(&self, device: &str) -> Option<Arc<SimIo>> {
        self.io_handles.get(device).cloned()
    }

    /// Queue a transition to run on the worker thread; returns immediately.
    pub fn request_transition(&self, dest: impl Into<String>, on_complete: Option<CompletionCallback>) {
        let _ = self
            .transition_tx
            .send(TransitionRequest::Run(dest.into(), on_complete));
    }

    /// Run a transition to completion on the calling thread. Exposed
    /// directly (rather than only through [`Self::request_transition`]) so
    /// callers, including tests, can drive it synchronously.
    pub fn do_transition(&self, dest: &str) -> Result<(), EngineError> {
        let _guard = self.transition_lock.lock().unwrap();
        self.abort_flag.store(false, Ordering::SeqCst);
        *self.status.lock().unwrap() = EngineStatus::Busy;
        self.notify_observer();

        if !self.is_enabled() {
            *self.status.lock().unwrap() = EngineStatus::Disabled;
            return Err(EngineError::Disabled);
        }

        let current = self.current_state();
        let reachable = self.reachable_states(&current);
        if !reachable.iter().any(|s| s == dest) {
            *self.status.lock().unwrap() = EngineStatus::Idle;
            return Err(EngineError::UnreachableState(dest.to_string()));
        }

        *self.next_state.lock().unwrap() = dest.to_string();

        if dest == current {
            *self.status.lock().unwrap() = EngineStatus::Idle;
            return Ok(());
        }

        if let Err(err) = self.write_back_phase(&current) {
            *self.status.lock().unwrap() = EngineStatus::Idle;
            return Err(err);
        }
        self.notify_observer();

        let sequence = self
            .transitions
            .get(&current)
            .and_then(|m| m.get(dest))
            .cloned()
            .unwrap_or_default();
        let dest_targets = self
            .states
            .get(dest)
            .map(|s| s.targets.clone())
            .unwrap_or_default();

        let mut faulted_err: Option<EngineError> = None;
        for step in &sequence {
            if self.abort_flag.load(Ordering::SeqCst) || self.status() == EngineStatus::Fault {
                break;
            }
            if let Err(err) = self.execute_step(step, &dest_targets) {
                match &err {
                    EngineError::Device(DeviceError::Timeout(_)) => {
                        let _ = self.event_tx.send(EngineEvent::Timeout);
                    }
                    EngineError::Device(DeviceError::LimitsViolated { .. }) => {
                        let _ = self.event_tx.send(EngineEvent::LimitsViolated);
                    }
                    _ => {}
                }
                faulted_err = Some(err);
                break;
            }
        }

        let aborted = self.abort_flag.load(Ordering::SeqCst);
        if faulted_err.is_none() && !aborted {
            *self.current_state.lock().unwrap() = dest.to_string();
        }

        let moved: HashSet<&str> = sequence.iter().flat_map(|s| s.devices()).collect();
        for (name, device) in &self.devices {
            if !moved.contains(name.as_str()) {
                device.clear_target();
            }
        }

        {
            let mut status = self.status.lock().unwrap();
            if *status != EngineStatus::Fault {
                *status = EngineStatus::Idle;
            }
        }
        self.notify_observer();

        match faulted_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn write_back_phase(&self, current_state: &str) -> Result<(), EngineError> {
        let Some(state_cfg) = self.states.get(current_state) else {
            return Ok(());
        };

        for (device_name, target) in &state_cfg.targets {
            if !target.update_after {
                continue;
            }
            let Some(device) = self.devices.get(device_name) else {
                continue;
            };
            let live = device.live_value();
            let mut config = self.config.lock().unwrap();
            config.set_device_position(device_name, &target.target, live)?;
        }

        Ok(())
    }

    fn execute_step(
        &self,
        step: &SequenceStep,
        dest_targets: &HashMap<String, TargetConfig>,
    ) -> Result<(), EngineError> {
        let device_names = step.devices();

        let outcomes: Vec<Result<(), EngineError>> = thread::scope(|scope| {
            let handles: Vec<_> = device_names
                .iter()
                .map(|name| {
                    let device = self.devices.get(*name);
                    let target = dest_targets.get(*name);
                    let name = (*name).to_string();
                    scope.spawn(move || -> Result<(), EngineError> {
                        let device =
                            device.ok_or_else(|| EngineError::UnknownDevice(name.clone()))?;
                        let target =
                            target.ok_or_else(|| EngineError::UnknownDevice(name.clone()))?;
                        device.move_to(&target.target)?;
                        device.wait()?;
                        device.assign_target(&target.target, target.limits)?;
                        Ok(())
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().expect("device worker thread panicked"))
                .collect()
        });

        outcomes.into_iter().collect::<Result<Vec<()>, _>>()?;
        Ok(())
    }

    pub fn abort(&self) {
        let _ = self.event_tx.send(EngineEvent::Abort);
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        if self.status() == EngineStatus::Busy {
            return Err(EngineError::Busy);
        }

        self.enabled.store(enabled, Ordering::SeqCst);
        *self.status.lock().unwrap() = if enabled {
            EngineStatus::Idle
        } else {
            EngineStatus::Disabled
        };
        self.force_reset_to_init();
        Ok(())
    }

    pub fn set_state_device_limit(
        &self,
        state: &str,
        device: &str,
        which: LimitSide,
        value: f64,
    ) -> Result<(), EngineError> {
        let current_limits = {
            let config = self.config.lock().unwrap();
            config
                .config()
                .states
                .get(state)
                .and_then(|s| s.targets.get(device))
                .map(|t| t.limits)
                .ok_or_else(|| EngineError::UnknownDevice(device.to_string()))?
        };

        let (low, high) = match which {
            LimitSide::Low => (value, current_limits.1),
            LimitSide::High => (current_limits.0, value),
        };

        if low > high {
            return Err(EngineError::InvertedLimits {
                state: state.to_string(),
                device: device.to_string(),
                low,
                high,
            });
        }

        let mut config = self.config.lock().unwrap();
        config.set_state_device_limits(state, device, (low, high))?;
        Ok(())
    }

    pub fn set_device_position(
        &self,
        device: &str,
        position: &str,
        value: Option<f64>,
    ) -> Result<(), EngineError> {
        let Some(value) = value else {
            return Err(EngineError::MissingPositionValue {
                device: device.to_string(),
                position: position.to_string(),
            });
        };

        let mut config = self.config.lock().unwrap();
        config.set_device_position(device, position, value)?;
        Ok(())
    }

    pub fn reachable_states(&self, origin: &str) -> Vec<String> {
        let mut out = vec![origin.to_string()];
        if let Some(destinations) = self.transitions.get(origin) {
            out.extend(destinations.keys().cloned());
        }
        out
    }

    pub fn status_message(&self) -> String {
        match self.status() {
            EngineStatus::Fault => {
                let sets = self.fault_sets.lock().unwrap();
                let mut parts = Vec::new();
                if !sets.disconnected.is_empty() {
                    parts.push(format!("disconn({})", join_sorted(&sets.disconnected)));
                }
                if !sets.alarmed.is_empty() {
                    parts.push(format!("alarm({})", join_sorted(&sets.alarmed)));
                }
                if !sets.not_homed.is_empty() {
                    parts.push(format!("!homed({})", join_sorted(&sets.not_homed)));
                }
                parts.join(" ")
            }
            EngineStatus::Disabled => "disabled".to_string(),
            _ => {
                let current = self.current_state();
                let next = self.next_state.lock().unwrap().clone();
                if current == next {
                    format!("state {current}")
                } else {
                    format!("transition {current} to {next}")
                }
            }
        }
    }

    fn force_reset_to_init(&self) {
        *self.current_state.lock().unwrap() = self.init_state.clone();
        *self.next_state.lock().unwrap() = self.init_state.clone();
        for device in self.devices.values() {
            device.clear_target();
        }
        self.notify_observer();
    }

    fn notify_observer(&self) {
        if let Some(observer) = self.observer.lock().unwrap().as_ref() {
            observer.update(self.snapshot());
        }
    }

    fn snapshot(&self) -> GovernorSnapshot {
        let current = self.current_state();
        let next = self.next_state.lock().unwrap().clone();
        let status = self.status();
        let reachable_now = self.reachable_states(&current);

        let states = self
            .states
            .iter()
            .map(|(name, cfg)| StateView {
                name: name.clone(),
                active: *name == current,
                reachable: reachable_now.iter().any(|s| s == name),
                device_limits: cfg
                    .targets
                    .iter()
                    .map(|(device, target)| (device.clone(), target.limits))
                    .collect(),
            })
            .collect();

        let transitions = self
            .transitions
            .iter()
            .flat_map(|(origin, destinations)| {
                let origin = origin.clone();
                let current = current.clone();
                let next = next.clone();
                destinations.keys().map(move |destination| TransitionView {
                    origin: origin.clone(),
                    destination: destination.clone(),
                    active: status == EngineStatus::Busy && origin == current && *destination == next,
                    reachable: origin == current,
                })
            })
            .collect();

        let devices = self
            .devices
            .iter()
            .map(|(name, device)| DeviceView {
                name: name.clone(),
                target_count: self
                    .states
                    .values()
                    .filter(|s| s.targets.contains_key(name))
                    .count(),
                positions: device.declared_positions().into_iter().collect(),
            })
            .collect();

        GovernorSnapshot {
            governor: self.name.clone(),
            current_state: current,
            next_state: next,
            status,
            status_message: self.status_message(),
            states,
            transitions,
            devices,
        }
    }

    fn run_supervisor(self: Arc<Self>, event_rx: Receiver<EngineEvent>) {
        loop {
            match event_rx.recv_timeout(Duration::from_millis(500)) {
                Ok(EngineEvent::Shutdown) => break,
                Ok(event) => self.handle_fault_event(event),
                Err(RecvTimeoutError::Timeout) => {
                    self.band_scan();
                    self.health_scan();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Re-check every device's tolerance band on each 500ms tick, for as
    /// long as a target stays assigned — not just once at `assign_target`
    /// time. A device with no target assigned is always in band, so this
    /// only ever fires for drift after a completed move.
    fn band_scan(&self) {
        let violated = self.devices.values().any(|device| !device.in_band());
        if violated {
            let _ = self.event_tx.send(EngineEvent::LimitsViolated);
        }
    }

    fn handle_fault_event(&self, event: EngineEvent) {
        self.abort_flag.store(true, Ordering::SeqCst);
        self.force_reset_to_init();
        if matches!(event, EngineEvent::Abort) {
            for device in self.devices.values() {
                let _ = device.stop();
            }
        }
        self.health_scan();
    }

    fn health_scan(&self) {
        let mut disconnected = HashSet::new();
        let mut alarmed = HashSet::new();
        let mut not_homed = HashSet::new();

        for (name, device) in &self.devices {
            if !device.connected() {
                disconnected.insert(name.clone());
            }
            if device.alarmed() {
                alarmed.insert(name.clone());
            }
            if !device.homed() {
                not_homed.insert(name.clone());
            }
        }

        let sets = FaultSets {
            disconnected,
            alarmed,
            not_homed,
        };
        let any_fault = !sets.is_empty();
        *self.fault_sets.lock().unwrap() = sets;

        let mut status = self.status.lock().unwrap();
        if any_fault && self.is_enabled() {
            if *status != EngineStatus::Fault {
                *status = EngineStatus::Fault;
                drop(status);
                self.force_reset_to_init();
            }
        } else if !any_fault && *status == EngineStatus::Fault {
            *status = EngineStatus::Idle;
            drop(status);
            self.notify_observer();
        }
    }

    fn run_transition_worker(self: Arc<Self>, rx: Receiver<TransitionRequest>) {
        for request in rx.iter() {
            match request {
                TransitionRequest::Shutdown => break,
                TransitionRequest::Run(dest, callback) => {
                    let result = self.do_transition(&dest);
                    if let Some(callback) = callback {
                        callback(result);
                    }
                }
            }
        }
    }
}

fn join_sorted(set: &HashSet<String>) -> String {
    let mut items: Vec<&String> = set.iter().collect();
    items.sort();
    items
        .into_iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(",")
}

fn build_devices(config: &GovernorConfig) -> (HashMap<String, Device>, HashMap<String, Arc<SimIo>>) {
    let mut devices = HashMap::new();
    let mut io_handles = HashMap::new();

    for (name, device_cfg) in &config.devices {
        let timeout = Duration::from_secs_f64(device_cfg.timeout());
        let device = match device_cfg {
            crate::config::DeviceConfig::Dummy { .. } => {
                Device::new(name.clone(), timeout, DeviceKind::Dummy(Dummy))
            }
            crate::config::DeviceConfig::AnalogPositioner {
                pv,
                tolerance,
                positions,
                ..
            } => {
                let io = SimIo::new();
                io_handles.insert(name.clone(), io.clone());
                Device::new(
                    name.clone(),
                    timeout,
                    DeviceKind::Analog(AnalogPositioner::new(
                        pv.clone(),
                        *tolerance,
                        positions.clone(),
                        io,
                    )),
                )
            }
            crate::config::DeviceConfig::TwoPositionActuator { pv, .. } => {
                let io = SimIo::new();
                io_handles.insert(name.clone(), io.clone());
                Device::new(
                    name.clone(),
                    timeout,
                    DeviceKind::TwoPosition(TwoPositionActuator::new(pv.clone(), io)),
                )
            }
        };
        devices.insert(name.clone(), device);
    }

    (devices, io_handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn two_state_config() -> GovernorConfig {
        let mut devices = HashMap::new();
        devices.insert(
            "valve".to_string(),
            DeviceConfig::Dummy {
                name: "Valve".to_string(),
                timeout: 1.0,
            },
        );

        let mut off_targets = HashMap::new();
        off_targets.insert(
            "valve".to_string(),
            TargetConfig {
                target: "Closed".to_string(),
                limits: (0.0, 0.0),
                update_after: false,
            },
        );
        let mut on_targets = HashMap::new();
        on_targets.insert(
            "valve".to_string(),
            TargetConfig {
                target: "Open".to_string(),
                limits: (0.0, 0.0),
                update_after: false,
            },
        );

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

        let mut transitions = HashMap::new();
        let mut off_to = HashMap::new();
        off_to.insert(
            "On".to_string(),
            vec![SequenceStep::Single("valve".to_string())],
        );
        transitions.insert("Off".to_string(), off_to);
        let mut on_to = HashMap::new();
        on_to.insert(
            "Off".to_string(),
            vec![SequenceStep::Single("valve".to_string())],
        );
        transitions.insert("On".to_string(), on_to);

        GovernorConfig {
            name: "Test".to_string(),
            init_state: "Off".to_string(),
            devices,
            states,
            transitions,
        }
    }

    fn spawn_test_engine() -> Arc<GovernorEngine> {
        let store = ConfigStore::new("/tmp/does-not-matter.toml", two_state_config());
        GovernorEngine::spawn(store, None)
    }

    #[test]
    fn transition_moves_to_destination_state() {
        let engine = spawn_test_engine();
        engine.do_transition("On").unwrap();
        assert_eq!(engine.current_state(), "On");
        assert_eq!(engine.status(), EngineStatus::Idle);
        engine.shutdown();
    }

    #[test]
    fn transition_to_unreachable_state_is_rejected() {
        let engine = spawn_test_engine();
        let err = engine.do_transition("Nowhere").unwrap_err();
        assert!(matches!(err, EngineError::UnreachableState(_)));
        engine.shutdown();
    }

    #[test]
    fn transition_to_current_state_is_a_no_op() {
        let engine = spawn_test_engine();
        engine.do_transition("Off").unwrap();
        assert_eq!(engine.current_state(), "Off");
        engine.shutdown();
    }

    #[test]
    fn disabled_engine_rejects_transitions() {
        let engine = spawn_test_engine();
        engine.set_enabled(false).unwrap();
        let err = engine.do_transition("On").unwrap_err();
        assert!(matches!(err, EngineError::Disabled));
        assert_eq!(engine.status_message(), "disabled");
        engine.shutdown();
    }

    #[test]
    fn reachable_states_includes_self_and_declared_destinations() {
        let engine = spawn_test_engine();
        let reachable = engine.reachable_states("Off");
        assert!(reachable.contains(&"Off".to_string()));
        assert!(reachable.contains(&"On".to_string()));
        engine.shutdown();
    }

    #[test]
    fn status_message_reports_state_when_idle() {
        let engine = spawn_test_engine();
        assert_eq!(engine.status_message(), "state Off");
        engine.shutdown();
    }

    #[test]
    fn set_device_position_rejects_missing_value() {
        let engine = spawn_test_engine();
        let err = engine
            .set_device_position("valve", "Open", None)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingPositionValue { .. }));
        engine.shutdown();
    }

    #[test]
    fn set_state_device_limit_rejects_inverted_limits() {
        let engine = spawn_test_engine();
        // Off/valve limits are (0.0, 0.0); forcing Low above the existing
        // High of 0.0 should be rejected.
        let err = engine
            .set_state_device_limit("Off", "valve", LimitSide::Low, 5.0)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvertedLimits { .. }));
        engine.shutdown();
    }

    #[test]
    fn abort_forces_reset_without_raising_fault() {
        let engine = spawn_test_engine();
        engine.abort();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(engine.current_state(), "Off");
        assert_ne!(engine.status(), EngineStatus::Fault);
        engine.shutdown();
    }

    #[test]
    fn request_transition_runs_asynchronously_and_reports_completion() {
        let engine = spawn_test_engine();
        let (tx, rx) = std::sync::mpsc::channel();
        engine.request_transition(
            "On",
            Some(Box::new(move |result| {
                let _ = tx.send(result.is_ok());
            })),
        );
        let completed_ok = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("transition did not complete");
        assert!(completed_ok);
        assert_eq!(engine.current_state(), "On");
        engine.shutdown();
    }
}
