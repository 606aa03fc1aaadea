// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Configuration module for the Governor.
//!
//! Organized into:
//!
//! - **types**: the on-disk schema (`GovernorConfig`, `DeviceConfig`, `StateConfig`,
//!   `TargetConfig`, `SequenceStep`, `SyncConfig`)
//! - **loader**: loading, validating, and atomically committing configuration files
//!
//! # Example
//!
//! ```rust,no_run
//! use governor_core::config::ConfigStore;
//!
//! let store = ConfigStore::load("governor.toml")?;
//! println!("loaded governor '{}'", store.config().name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod loader;
pub mod types;

pub use loader::ConfigStore;
pub use types::{
    DeviceConfig, GovernorConfig, SequenceStep, StateConfig, SyncConfig, TargetConfig,
};
