// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Layered error types for the Governor engine.
//!
//! Errors are layered the way the rest of the crate is layered: validation
//! failures bubble into [`ConfigError`], device-level failures into
//! [`DeviceError`], and both get wrapped by [`EngineError`] at the operation
//! boundary. [`GovernorError`] is the outermost error seen by a registry
//! holding multiple engines.

use std::path::PathBuf;
use thiserror::Error;

/// A single configuration schema violation.
///
/// `ConfigStore::validate` collects every instance of these in one pass
/// instead of stopping at the first failure, so a user fixing a config sees
/// every problem at once.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing mandatory root key '{0}'")]
    MissingRootKey(&'static str),

    #[error("init_state '{0}' is not a declared state")]
    UnknownInitState(String),

    #[error("device '{0}' is missing mandatory field '{1}'")]
    MissingDeviceField(String, &'static str),

    #[error("device '{0}' has unknown type '{1}'")]
    UnknownDeviceType(String, String),

    #[error("state '{state}' references unknown device '{device}'")]
    UnknownTargetDevice { state: String, device: String },

    #[error("state '{state}' device '{device}' is missing mandatory field '{field}'")]
    MissingTargetField {
        state: String,
        device: String,
        field: &'static str,
    },

    #[error("state '{state}' device '{device}' targets undeclared position '{position}'")]
    UnknownTargetPosition {
        state: String,
        device: String,
        position: String,
    },

    #[error(
        "state '{state}' device '{device}' target '{position}' has lower limit {low} greater than upper limit {high}"
    )]
    InvertedLimits {
        state: String,
        device: String,
        position: String,
        low: f64,
        high: f64,
    },

    #[error("transition references unknown state '{0}'")]
    UnknownTransitionState(String),

    #[error("transition from '{0}' to itself is not allowed")]
    SameStateTransition(String),

    #[error("transition {origin}->{destination} references undeclared device '{device}'")]
    TransitionUnknownDevice {
        origin: String,
        destination: String,
        device: String,
    },

    #[error(
        "transition {origin}->{destination} moves device '{device}' which is not part of the destination state"
    )]
    TransitionDeviceNotInDestination {
        origin: String,
        destination: String,
        device: String,
    },
}

/// Failures in loading, validating, or committing a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config as TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{} configuration error(s) found", .0.len())]
    Validation(Vec<ValidationError>),
}

/// Failures reported by a [`crate::device::Device`] during its operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    #[error("device '{0}' is not connected")]
    NotConnected(String),

    #[error("device '{0}' timed out waiting for motion to complete")]
    Timeout(String),

    #[error("device '{device}' moved outside its limits band (live={live}, band=[{low},{high}])")]
    LimitsViolated {
        device: String,
        live: f64,
        low: f64,
        high: f64,
    },

    #[error("device '{device}' has no declared position '{position}'")]
    UnknownPosition { device: String, position: String },

    #[error("channel I/O error on device '{device}' channel '{channel}': {message}")]
    ChannelIo {
        device: String,
        channel: String,
        message: String,
    },
}

/// Failures raised by [`crate::engine::GovernorEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("state '{0}' is not reachable from the current state")]
    UnreachableState(String),

    #[error("engine is disabled")]
    Disabled,

    #[error("engine is busy running a transition")]
    Busy,

    #[error("no value supplied for device '{device}' position '{position}'")]
    MissingPositionValue { device: String, position: String },

    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error(
        "lower limit {low} exceeds upper limit {high} for device '{device}' in state '{state}'"
    )]
    InvertedLimits {
        state: String,
        device: String,
        low: f64,
        high: f64,
    },
}

/// Top-level error surfaced by a [`crate::registry::GovernorRegistry`].
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown engine '{0}'")]
    UnknownEngine(String),

    #[error("engine '{0}' is busy, can't switch active engine")]
    EngineBusy(String),
}
