// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Governor: a configuration-driven hardware state-machine supervisor.
//!
//! A governor drives a set of [`device::Device`]s through declared
//! [`config::StateConfig`]s along declared transitions, under the
//! supervision of a fault-detecting health scan. The engine
//! ([`engine::GovernorEngine`]) owns its devices and state/transition
//! catalog exclusively; a [`registry::GovernorRegistry`] owns multiple
//! engines and enforces that exactly one is active at a time; a
//! [`registry::BusAdapter`] translates engine snapshots into named
//! control-bus channels.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use governor_core::config::ConfigStore;
//! use governor_core::engine::GovernorEngine;
//!
//! let store = ConfigStore::load("governor.toml")?;
//! let engine = GovernorEngine::spawn(store, None);
//! engine.do_transition("On")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;

pub use config::{ConfigStore, GovernorConfig};
pub use device::Device;
pub use engine::{
    DeviceView, EngineStatus, GovernorEngine, GovernorSnapshot, ObserverSink, StateView,
    TransitionView,
};
pub use error::{ConfigError, DeviceError, EngineError, GovernorError, ValidationError};
pub use logging::{LoggingConfig, init_logging};
pub use registry::{BusAdapter, BusTransport, GovernorRegistry};
