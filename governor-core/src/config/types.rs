// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Configuration types for the Governor.
//!
//! These mirror the on-disk TOML schema 1:1: a [`GovernorConfig`] carries a
//! name, an `init_state`, a table of [`DeviceConfig`], a table of
//! [`StateConfig`], and a table of transitions keyed by origin state name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration for a single Governor (one engine, one config
/// file).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GovernorConfig {
    /// Name of this governor, used as its PV/channel prefix.
    pub name: String,
    /// The state a fresh or faulted engine resets to.
    pub init_state: String,
    /// Devices this governor drives, keyed by name.
    pub devices: HashMap<String, DeviceConfig>,
    /// Declared operating states, keyed by name.
    pub states: HashMap<String, StateConfig>,
    /// Declared transitions: origin -> destination -> move sequence.
    ///
    /// The implicit reset edge to `init_state` from every other origin is
    /// synthesized at load time (see [`crate::config::loader`]) and is not
    /// expected to appear in the file itself.
    #[serde(default)]
    pub transitions: HashMap<String, HashMap<String, Vec<SequenceStep>>>,
}

/// A device declaration. The `type` tag selects the variant and therefore
/// which fields are mandatory, mirroring the per-type `REQUIRED_FIELDS`
/// tuples of the original Python device classes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum DeviceConfig {
    /// All moves complete immediately and successfully; no hardware touched.
    Dummy { name: String, timeout: f64 },
    /// A continuous-position actuator (e.g. a motor record).
    AnalogPositioner {
        name: String,
        timeout: f64,
        pv: String,
        tolerance: f64,
        positions: HashMap<String, f64>,
    },
    /// A two-position actuator (e.g. a valve): fixed `Open`/`Closed` setpoints.
    TwoPositionActuator {
        name: String,
        timeout: f64,
        pv: String,
    },
}

impl DeviceConfig {
    /// The type tag as it appears in the config file, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DeviceConfig::Dummy { .. } => "Dummy",
            DeviceConfig::AnalogPositioner { .. } => "AnalogPositioner",
            DeviceConfig::TwoPositionActuator { .. } => "TwoPositionActuator",
        }
    }

    pub fn timeout(&self) -> f64 {
        match self {
            DeviceConfig::Dummy { timeout, .. }
            | DeviceConfig::AnalogPositioner { timeout, .. }
            | DeviceConfig::TwoPositionActuator { timeout, .. } => *timeout,
        }
    }

    /// Declared positions, if this device type enumerates them.
    pub fn declared_positions(&self) -> Option<&HashMap<String, f64>> {
        match self {
            DeviceConfig::AnalogPositioner { positions, .. } => Some(positions),
            DeviceConfig::Dummy { .. } | DeviceConfig::TwoPositionActuator { .. } => None,
        }
    }
}

/// A declared operating state: a fullname and a target per device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    /// Human-readable name; falls back to the state's key if absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Per-device desired target for this state.
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// The per-(state, device) description of a desired position.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// A declared position name on the device, or a literal setpoint value
    /// if the device does not enumerate positions.
    pub target: String,
    /// Relative `(lower, upper)` offsets from the position's setpoint.
    pub limits: (f64, f64),
    /// If true, the device's live value is written back as the position's
    /// new setpoint when the governor leaves this state.
    #[serde(default, rename = "updateAfter")]
    pub update_after: bool,
}

/// One element of a transition's move sequence: a single device moved
/// alone, or a set of devices moved in parallel as one step.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SequenceStep {
    Single(String),
    Parallel(Vec<String>),
}

impl SequenceStep {
    /// The devices named by this step, in declaration order.
    pub fn devices(&self) -> Vec<&str> {
        match self {
            SequenceStep::Single(name) => vec![name.as_str()],
            SequenceStep::Parallel(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Optional cross-engine position synchronization file: device name ->
/// list of position names that must be kept numerically equal across every
/// loaded governor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SyncConfig(pub HashMap<String, Vec<String>>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_step_single_deserializes_from_string() {
        let step: SequenceStep = toml::from_str("step = \"valve\"")
            .map(|t: toml::Table| t["step"].clone().try_into().unwrap())
            .unwrap();
        assert_eq!(step.devices(), vec!["valve"]);
    }

    #[test]
    fn sequence_step_parallel_deserializes_from_array() {
        let step: SequenceStep = toml::from_str("step = [\"motorA\", \"motorB\"]")
            .map(|t: toml::Table| t["step"].clone().try_into().unwrap())
            .unwrap();
        assert_eq!(step.devices(), vec!["motorA", "motorB"]);
    }

    #[test]
    fn device_config_reports_type_name() {
        let dummy = DeviceConfig::Dummy {
            name: "d".into(),
            timeout: 1.0,
        };
        assert_eq!(dummy.type_name(), "Dummy");
    }
}
