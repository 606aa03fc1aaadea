// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Devices: the actuators a [`crate::engine::GovernorEngine`] drives.
//!
//! A [`Device`] wraps one of three kinds (`Dummy`, `AnalogPositioner`,
//! `TwoPositionActuator`) behind a common contract — `move_to`, `wait`,
//! `stop`, `assign_target`, and the `connected`/`alarmed`/`homed`/`done`
//! predicates — so the engine never matches on device type itself.
//!
//! Two pieces of per-device state are tracked, deliberately kept separate:
//! `last_commanded` (what `move_to` most recently asked for, used by
//! `TwoPositionActuator::done` to know what "done" means) and
//! `current_target` (the Target assigned by `assign_target` once a move
//! completes, used purely for band monitoring). Clearing the target during
//! a move and only assigning it afterward matches the "latch
//! current_target = none, dispatch, wait" ordering in spec.md §4.2.

pub mod analog;
pub mod dummy;
pub mod io;
pub mod two_position;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::DeviceError;

pub use analog::AnalogPositioner;
pub use dummy::Dummy;
pub use io::{ChannelIo, SimIo};
pub use two_position::TwoPositionActuator;

/// The Target currently installed for post-move band monitoring.
#[derive(Debug, Clone)]
pub struct AssignedTarget {
    pub position: String,
    pub limits: (f64, f64),
}

pub enum DeviceKind {
    Dummy(Dummy),
    Analog(AnalogPositioner),
    TwoPosition(TwoPositionActuator),
}

pub struct Device {
    name: String,
    timeout: Duration,
    kind: DeviceKind,
    last_commanded: Mutex<Option<String>>,
    current_target: Mutex<Option<AssignedTarget>>,
}

impl Device {
    pub fn new(name: impl Into<String>, timeout: Duration, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            timeout,
            kind,
            last_commanded: Mutex::new(None),
            current_target: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a position name to its commanded setpoint, following the
    /// per-type lookup rule (literal fallback for `AnalogPositioner`, fixed
    /// `Open`/`Closed` table for `TwoPositionActuator`).
    pub fn setpoint(&self, position: &str) -> f64 {
        match &self.kind {
            DeviceKind::Dummy(_) => 0.0,
            DeviceKind::Analog(a) => a.resolve(position),
            DeviceKind::TwoPosition(t) => t.resolve(position).map(|v| v as f64).unwrap_or(0.0),
        }
    }

    fn tolerance(&self) -> f64 {
        match &self.kind {
            DeviceKind::Analog(a) => a.tolerance,
            DeviceKind::Dummy(_) | DeviceKind::TwoPosition(_) => 0.0,
        }
    }

    pub fn live_value(&self) -> f64 {
        match &self.kind {
            DeviceKind::Dummy(d) => d.live_value(),
            DeviceKind::Analog(a) => a.live_value().unwrap_or(0.0),
            DeviceKind::TwoPosition(t) => t.reported_position().map(|v| v as f64).unwrap_or(0.0),
        }
    }

    pub fn connected(&self) -> bool {
        match &self.kind {
            DeviceKind::Dummy(d) => d.connected(),
            DeviceKind::Analog(a) => a.connected(),
            DeviceKind::TwoPosition(t) => t.connected(),
        }
    }

    pub fn homed(&self) -> bool {
        match &self.kind {
            DeviceKind::Dummy(d) => d.homed(),
            DeviceKind::Analog(a) => a.homed().unwrap_or(false),
            DeviceKind::TwoPosition(_) => true,
        }
    }

    /// Always false: the original never defines an alarm condition for any
    /// device type (`components.py::Device.alarmed` is a constant `False`
    /// property, never overridden by `Motor` or `Valve`).
    pub fn alarmed(&self) -> bool {
        false
    }

    pub fn done(&self) -> bool {
        match &self.kind {
            DeviceKind::Dummy(d) => d.done(),
            DeviceKind::Analog(a) => a.done().unwrap_or(false),
            DeviceKind::TwoPosition(t) => {
                let commanded = self.last_commanded.lock().unwrap();
                match commanded.as_deref().and_then(|p| t.resolve(p)) {
                    Some(expected) => t
                        .reported_position()
                        .map(|got| got == expected)
                        .unwrap_or(false),
                    None => true,
                }
            }
        }
    }

    /// Latch `current_target = none`, dispatch the move, and return — does
    /// not block. Call [`Device::wait`] to block until completion.
    pub fn move_to(&self, position: &str) -> Result<(), DeviceError> {
        *self.current_target.lock().unwrap() = None;
        *self.last_commanded.lock().unwrap() = Some(position.to_string());

        match &self.kind {
            DeviceKind::Dummy(_) => Ok(()),
            DeviceKind::Analog(a) => {
                let setpoint = a.resolve(position);
                a.write_setpoint(setpoint)
            }
            DeviceKind::TwoPosition(t) => t.command(position),
        }
    }

    /// Block until [`Device::done`], or until `timeout` elapses without the
    /// live value changing.
    pub fn wait(&self) -> Result<(), DeviceError> {
        let poll_interval = Duration::from_millis(100);
        let mut last_value = self.live_value();
        let mut last_change = Instant::now();

        loop {
            if self.done() {
                return Ok(());
            }

            std::thread::sleep(poll_interval);

            let value = self.live_value();
            if (value - last_value).abs() > f64::EPSILON {
                last_value = value;
                last_change = Instant::now();
            }

            if last_change.elapsed() >= self.timeout {
                return Err(DeviceError::Timeout(self.name.clone()));
            }
        }
    }

    pub fn stop(&self) -> Result<(), DeviceError> {
        match &self.kind {
            DeviceKind::Dummy(_) => Ok(()),
            DeviceKind::Analog(a) => a.stop(),
            DeviceKind::TwoPosition(t) => t.stop(),
        }
    }

    /// Install a new Target and immediately re-check the live value
    /// against its band.
    pub fn assign_target(&self, position: &str, limits: (f64, f64)) -> Result<(), DeviceError> {
        *self.current_target.lock().unwrap() = Some(AssignedTarget {
            position: position.to_string(),
            limits,
        });
        self.check_band()
    }

    /// Clear the assigned Target, disabling band monitoring.
    pub fn clear_target(&self) {
        *self.current_target.lock().unwrap() = None;
    }

    fn check_band(&self) -> Result<(), DeviceError> {
        let guard = self.current_target.lock().unwrap();
        let Some(target) = guard.as_ref() else {
            return Ok(());
        };

        let setpoint = self.setpoint(&target.position);
        let tolerance = self.tolerance();
        let (low_offset, high_offset) = target.limits;
        let low = setpoint + low_offset - tolerance;
        let high = setpoint + high_offset + tolerance;
        let live = self.live_value();

        if live < low || live > high {
            return Err(DeviceError::LimitsViolated {
                device: self.name.clone(),
                live,
                low,
                high,
            });
        }

        Ok(())
    }

    /// True if a Target is assigned and the live value is currently within
    /// its band; a device with no Target assigned is always in band. Polled
    /// by the engine's periodic band scan for as long as the band stays
    /// armed, not just once at assignment time.
    pub fn in_band(&self) -> bool {
        self.check_band().is_ok()
    }

    /// Declared position names and their setpoints, for the observer's
    /// per-device position channels. Empty for `Dummy`, which has none;
    /// the fixed `Open`/`Closed` table for `TwoPositionActuator`.
    pub fn declared_positions(&self) -> Vec<(String, f64)> {
        match &self.kind {
            DeviceKind::Dummy(_) => Vec::new(),
            DeviceKind::Analog(a) => a.positions.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            DeviceKind::TwoPosition(_) => {
                vec![("Open".to_string(), 1.0), ("Closed".to_string(), 0.0)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn dummy_device() -> Device {
        Device::new("d1", Duration::from_millis(100), DeviceKind::Dummy(Dummy))
    }

    fn analog_device() -> (Device, std::sync::Arc<SimIo>) {
        let io = SimIo::new();
        let mut positions = HashMap::new();
        positions.insert("In".to_string(), 10.0);
        positions.insert("Out".to_string(), 0.0);
        let analog = AnalogPositioner::new("TST:MOT1", 0.5, positions, io.clone());
        (
            Device::new("motorA", Duration::from_millis(200), DeviceKind::Analog(analog)),
            io,
        )
    }

    #[test]
    fn dummy_move_and_wait_succeed_immediately() {
        let device = dummy_device();
        device.move_to("anything").unwrap();
        device.wait().unwrap();
        assert!(device.done());
        assert!(!device.alarmed());
    }

    #[test]
    fn analog_wait_times_out_if_never_done() {
        let (device, io) = analog_device();
        io.set_bool("TST:MOT1:DONE", false);
        device.move_to("In").unwrap();
        let err = device.wait().unwrap_err();
        assert!(matches!(err, DeviceError::Timeout(_)));
    }

    #[test]
    fn analog_wait_succeeds_once_done_flag_set() {
        let (device, io) = analog_device();
        io.set_bool("TST:MOT1:DONE", true);
        device.move_to("In").unwrap();
        device.wait().unwrap();
    }

    #[test]
    fn assign_target_flags_limits_violation() {
        let (device, io) = analog_device();
        io.set_f64("TST:MOT1:RBV", 100.0);
        let err = device.assign_target("In", (-1.0, 1.0)).unwrap_err();
        assert!(matches!(err, DeviceError::LimitsViolated { .. }));
    }

    #[test]
    fn assign_target_within_tolerance_band_succeeds() {
        let (device, io) = analog_device();
        io.set_f64("TST:MOT1:RBV", 10.3);
        device.assign_target("In", (-1.0, 1.0)).unwrap();
        assert!(device.in_band());
    }

    #[test]
    fn two_position_done_matches_last_commanded() {
        let io = SimIo::new();
        let valve = TwoPositionActuator::new("TST:VLV1", io.clone());
        let device = Device::new("valve", Duration::from_millis(100), DeviceKind::TwoPosition(valve));

        io.set_u32("TST:VLV1:STATUS", 0);
        device.move_to("Open").unwrap();
        assert!(!device.done());

        io.set_u32("TST:VLV1:STATUS", 1);
        assert!(device.done());
    }
}
