// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! `AnalogPositioner`: a continuous-position actuator such as a motor
//! record. Channel layout and the `0x4000` homed bit are grounded in
//! `components.py::Motor`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DeviceError;

use super::io::ChannelIo;

const HOMED_BIT: u32 = 0x4000;

pub struct AnalogPositioner {
    pv: String,
    pub tolerance: f64,
    pub positions: HashMap<String, f64>,
    io: Arc<dyn ChannelIo>,
}

impl AnalogPositioner {
    pub fn new(
        pv: impl Into<String>,
        tolerance: f64,
        positions: HashMap<String, f64>,
        io: Arc<dyn ChannelIo>,
    ) -> Self {
        Self {
            pv: pv.into(),
            tolerance,
            positions,
            io,
        }
    }

    fn channel(&self, suffix: &str) -> String {
        format!("{}:{}", self.pv, suffix)
    }

    pub fn write_setpoint(&self, value: f64) -> Result<(), DeviceError> {
        self.io.write_f64(&self.channel("SP"), value)
    }

    pub fn live_value(&self) -> Result<f64, DeviceError> {
        self.io.read_f64(&self.channel("RBV"))
    }

    pub fn done(&self) -> Result<bool, DeviceError> {
        self.io.read_bool(&self.channel("DONE"))
    }

    pub fn stop(&self) -> Result<(), DeviceError> {
        self.io.write_f64(&self.channel("STOP"), 1.0)
    }

    pub fn connected(&self) -> bool {
        self.io.connected()
    }

    pub fn homed(&self) -> Result<bool, DeviceError> {
        Ok(self.io.read_u32(&self.channel("STATUS"))? & HOMED_BIT != 0)
    }

    /// Resolve a position name to its setpoint, falling back to a literal
    /// value if the name is not declared (`positions.get(target, target)`
    /// in the original).
    pub fn resolve(&self, name_or_value: &str) -> f64 {
        self.positions
            .get(name_or_value)
            .copied()
            .unwrap_or_else(|| name_or_value.parse().unwrap_or(0.0))
    }
}
