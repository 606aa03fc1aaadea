// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! `TwoPositionActuator`: a binary actuator such as a valve. Positions are
//! fixed at `Open = 1`, `Closed = 0` (`components.py::Valve.positions`);
//! moving to any other name fails. `stop` is a no-op — there's no motion to
//! interrupt, only a commanded open/close.

use std::sync::Arc;

use crate::error::DeviceError;

use super::io::ChannelIo;

pub struct TwoPositionActuator {
    pv: String,
    io: Arc<dyn ChannelIo>,
}

impl TwoPositionActuator {
    pub fn new(pv: impl Into<String>, io: Arc<dyn ChannelIo>) -> Self {
        Self { pv: pv.into(), io }
    }

    fn channel(&self, suffix: &str) -> String {
        format!("{}:{}", self.pv, suffix)
    }

    /// The fixed position table: `Open -> 1`, `Closed -> 0`.
    pub fn resolve(&self, name: &str) -> Option<u32> {
        match name {
            "Open" => Some(1),
            "Closed" => Some(0),
            _ => None,
        }
    }

    pub fn command(&self, name: &str) -> Result<(), DeviceError> {
        match name {
            "Open" => self.io.write_f64(&self.channel("OPEN"), 1.0),
            "Closed" => self.io.write_f64(&self.channel("CLOSE"), 1.0),
            other => Err(DeviceError::UnknownPosition {
                device: self.pv.clone(),
                position: other.to_string(),
            }),
        }
    }

    pub fn reported_position(&self) -> Result<u32, DeviceError> {
        self.io.read_u32(&self.channel("STATUS"))
    }

    pub fn connected(&self) -> bool {
        self.io.connected()
    }

    pub fn stop(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::io::SimIo;

    #[test]
    fn resolve_is_fixed_open_closed() {
        let io = SimIo::new();
        let valve = TwoPositionActuator::new("TST:VLV1", io);
        assert_eq!(valve.resolve("Open"), Some(1));
        assert_eq!(valve.resolve("Closed"), Some(0));
        assert_eq!(valve.resolve("Ajar"), None);
    }

    #[test]
    fn command_rejects_unknown_position() {
        let io = SimIo::new();
        let valve = TwoPositionActuator::new("TST:VLV1", io);
        assert!(valve.command("Ajar").is_err());
    }

    #[test]
    fn stop_is_a_no_op() {
        let io = SimIo::new();
        let valve = TwoPositionActuator::new("TST:VLV1", io);
        assert!(valve.stop().is_ok());
    }
}
