// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Abstraction over the live control-system channels a device talks to.
//!
//! The real bus (EPICS/Tango/whatever the deployment uses) is out of scope
//! for this crate; [`ChannelIo`] is the seam a real transport would plug
//! into, mirroring the connection-state pattern in the teacher's
//! `midi_device.rs` (shared connection state behind an `Arc`, explicit
//! `connected()` query rather than connect/disconnect callbacks).

use std::sync::{Arc, Mutex};

use crate::error::DeviceError;

/// Primitive channel operations a non-Dummy device variant needs.
///
/// Implementations are expected to be cheap to clone (an `Arc` around
/// shared state) since a [`crate::device::Device`] holds one per channel.
pub trait ChannelIo: Send + Sync {
    fn write_f64(&self, channel: &str, value: f64) -> Result<(), DeviceError>;
    fn read_f64(&self, channel: &str) -> Result<f64, DeviceError>;
    fn read_bool(&self, channel: &str) -> Result<bool, DeviceError>;
    fn read_u32(&self, channel: &str) -> Result<u32, DeviceError>;
    fn connected(&self) -> bool;
}

/// In-memory test double. Every channel is just a named cell; `connected`
/// defaults to true and can be toggled to exercise `DISCONNECT` handling.
#[derive(Default)]
pub struct SimIo {
    state: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    floats: std::collections::HashMap<String, f64>,
    bools: std::collections::HashMap<String, bool>,
    u32s: std::collections::HashMap<String, u32>,
    connected: bool,
}

impl SimIo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SimState {
                connected: true,
                ..Default::default()
            }),
        })
    }

    pub fn set_f64(&self, channel: &str, value: f64) {
        self.state.lock().unwrap().floats.insert(channel.to_string(), value);
    }

    pub fn set_bool(&self, channel: &str, value: bool) {
        self.state.lock().unwrap().bools.insert(channel.to_string(), value);
    }

    pub fn set_u32(&self, channel: &str, value: u32) {
        self.state.lock().unwrap().u32s.insert(channel.to_string(), value);
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().unwrap().connected = connected;
    }
}

impl ChannelIo for SimIo {
    fn write_f64(&self, channel: &str, value: f64) -> Result<(), DeviceError> {
        self.set_f64(channel, value);
        Ok(())
    }

    fn read_f64(&self, channel: &str) -> Result<f64, DeviceError> {
        Ok(*self
            .state
            .lock()
            .unwrap()
            .floats
            .get(channel)
            .unwrap_or(&0.0))
    }

    fn read_bool(&self, channel: &str) -> Result<bool, DeviceError> {
        Ok(*self
            .state
            .lock()
            .unwrap()
            .bools
            .get(channel)
            .unwrap_or(&false))
    }

    fn read_u32(&self, channel: &str) -> Result<u32, DeviceError> {
        Ok(*self.state.lock().unwrap().u32s.get(channel).unwrap_or(&0))
    }

    fn connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_io_round_trips_values() {
        let io = SimIo::new();
        io.write_f64("setpoint", 12.5).unwrap();
        assert_eq!(io.read_f64("setpoint").unwrap(), 12.5);
    }

    #[test]
    fn sim_io_defaults_connected() {
        let io = SimIo::new();
        assert!(io.connected());
        io.set_connected(false);
        assert!(!io.connected());
    }
}
