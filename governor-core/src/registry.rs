// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! `GovernorRegistry` and `BusAdapter`: the multi-engine layer sitting
//! between the control bus and individual [`GovernorEngine`]s.
//!
//! The registry holds every configured engine in declaration order and
//! enforces the "exactly one active" invariant; the adapter translates
//! engine snapshots into named bus channels and routes incoming writes,
//! including the cross-engine position synchronization feature and the
//! global kill/active-gate commands carried over from the original driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::SyncConfig;
use crate::engine::{EngineStatus, GovernorEngine, GovernorSnapshot, ObserverSink};
use crate::error::GovernorError;

/// Holds every configured engine, enforcing that at most one is active.
pub struct GovernorRegistry {
    order: Vec<String>,
    engines: HashMap<String, Arc<GovernorEngine>>,
    active: Mutex<Option<String>>,
    sync: SyncConfig,
    globally_active: AtomicBool,
}

impl GovernorRegistry {
    pub fn new(sync: SyncConfig) -> Self {
        Self {
            order: Vec::new(),
            engines: HashMap::new(),
            active: Mutex::new(None),
            sync,
            globally_active: AtomicBool::new(true),
        }
    }

    /// Register an engine. The first engine registered becomes active by
    /// default; every other engine starts disabled.
    pub fn register(&mut self, name: impl Into<String>, engine: Arc<GovernorEngine>) {
        let name = name.into();
        if self.order.is_empty() {
            let _ = engine.set_enabled(true);
            *self.active.lock().unwrap() = Some(name.clone());
        } else {
            let _ = engine.set_enabled(false);
        }
        self.order.push(name.clone());
        self.engines.insert(name, engine);
    }

    /// Engine names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn engine(&self, name: &str) -> Option<&Arc<GovernorEngine>> {
        self.engines.get(name)
    }

    pub fn active_name(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }

    /// Switch the active engine. Rejected if the current active engine is
    /// Busy. The newly-active engine is always forced back to its
    /// `init_state`, matching the original's unconditional reset on enable.
    pub fn set_active(&self, name: &str) -> Result<(), GovernorError> {
        if !self.engines.contains_key(name) {
            return Err(GovernorError::UnknownEngine(name.to_string()));
        }

        let mut active = self.active.lock().unwrap();
        if active.as_deref() == Some(name) {
            return Ok(());
        }

        if let Some(current) = active.as_ref() {
            let current_engine = self
                .engines
                .get(current)
                .expect("active engine name always registered");
            if current_engine.status() == EngineStatus::Busy {
                return Err(GovernorError::EngineBusy(current.clone()));
            }
            current_engine.set_enabled(false)?;
        }

        let next_engine = self.engines.get(name).expect("checked above");
        next_engine.set_enabled(true)?;
        *active = Some(name.to_string());
        Ok(())
    }

    /// Stop every engine's background threads. Used for the global kill
    /// command, which terminates the whole process after this returns.
    pub fn kill_all(&self) {
        for engine in self.engines.values() {
            engine.abort();
            engine.shutdown();
        }
    }

    pub fn set_globally_active(&self, active: bool) {
        self.globally_active.store(active, Ordering::SeqCst);
    }

    /// Gates whether any write besides Abort/Kill is accepted, independent
    /// of which engine is active.
    pub fn is_globally_active(&self) -> bool {
        self.globally_active.load(Ordering::SeqCst)
    }

    /// Apply a `set_device_position` write, routing it to every engine if
    /// `(device, position)` is a synchronized pair, otherwise only to the
    /// named engine.
    pub fn set_device_position(
        &self,
        name: &str,
        device: &str,
        position: &str,
        value: Option<f64>,
    ) -> Result<(), GovernorError> {
        let synchronized = self
            .sync
            .0
            .get(device)
            .is_some_and(|positions| positions.iter().any(|p| p == position));

        if synchronized {
            for engine in self.engines.values() {
                engine.set_device_position(device, position, value)?;
            }
            Ok(())
        } else {
            let engine = self
                .engines
                .get(name)
                .ok_or_else(|| GovernorError::UnknownEngine(name.to_string()))?;
            engine.set_device_position(device, position, value)?;
            Ok(())
        }
    }
}

/// A value published to one named channel.
#[derive(Debug, Clone)]
pub enum ChannelValue {
    Enum(String),
    Str(String),
    Float(f64),
    Bool(bool),
}

/// The actual pub/sub transport is out of scope; this is the seam a real
/// bus binding (EPICS/Tango/whatever) would implement.
pub trait BusTransport: Send + Sync {
    fn publish(&self, channel: &str, value: ChannelValue);
}

/// Translates one engine's snapshots into its named bus channels.
///
/// One `BusAdapter` is attached as the observer of exactly one
/// [`GovernorEngine`]; the registry's global channels (`{Gov}Active-Sel`,
/// `{Gov}Cmd:Kill-Cmd`, …) are handled by the registry/CLI layer directly
/// since they aren't scoped to a single engine.
pub struct BusAdapter {
    governor_name: String,
    transport: Arc<dyn BusTransport>,
}

impl BusAdapter {
    pub fn new(governor_name: impl Into<String>, transport: Arc<dyn BusTransport>) -> Self {
        Self {
            governor_name: governor_name.into(),
            transport,
        }
    }

    fn engine_channel(&self, suffix: &str) -> String {
        format!("{{Gov:{}}}{}", self.governor_name, suffix)
    }

    fn device_channel(&self, device: &str, suffix: &str) -> String {
        format!("{{Gov:{}-Dev:{}}}{}", self.governor_name, device, suffix)
    }

    fn state_channel(&self, state: &str, suffix: &str) -> String {
        format!("{{Gov:{}-St:{}}}{}", self.governor_name, state, suffix)
    }

    fn transition_channel(&self, origin: &str, destination: &str, suffix: &str) -> String {
        format!(
            "{{Gov:{}-Tr:{}-{}}}{}",
            self.governor_name, origin, destination, suffix
        )
    }
}

impl ObserverSink for BusAdapter {
    fn update(&self, snapshot: GovernorSnapshot) {
        self.transport.publish(
            &self.engine_channel("Sts:Status-Sts"),
            ChannelValue::Enum(format!("{:?}", snapshot.status)),
        );
        self.transport.publish(
            &self.engine_channel("Sts:Msg-Sts"),
            ChannelValue::Str(snapshot.status_message.clone()),
        );
        self.transport.publish(
            &self.engine_channel("Sts:State-I"),
            ChannelValue::Str(snapshot.current_state.clone()),
        );
        self.transport.publish(
            &self.engine_channel("Sts:States-I"),
            ChannelValue::Float(snapshot.states.len() as f64),
        );
        self.transport.publish(
            &self.engine_channel("Sts:Devs-I"),
            ChannelValue::Float(snapshot.devices.len() as f64),
        );
        let reachable_count = snapshot.states.iter().filter(|s| s.reachable).count();
        self.transport.publish(
            &self.engine_channel("Sts:Reach-I"),
            ChannelValue::Float(reachable_count as f64),
        );
        self.transport.publish(
            &self.engine_channel("Sts:Busy-Sts"),
            ChannelValue::Bool(snapshot.status == EngineStatus::Busy),
        );

        for state in &snapshot.states {
            self.transport.publish(
                &self.state_channel(&state.name, "Sts:Active-Sts"),
                ChannelValue::Bool(state.active),
            );
            self.transport.publish(
                &self.state_channel(&state.name, "Sts:Reach-Sts"),
                ChannelValue::Bool(state.reachable),
            );
            for (device, (low, high)) in &state.device_limits {
                self.transport.publish(
                    &self.state_channel(&state.name, &format!("LLim:{device}-Pos")),
                    ChannelValue::Float(*low),
                );
                self.transport.publish(
                    &self.state_channel(&state.name, &format!("HLim:{device}-Pos")),
                    ChannelValue::Float(*high),
                );
            }
        }

        for transition in &snapshot.transitions {
            self.transport.publish(
                &self.transition_channel(&transition.origin, &transition.destination, "Sts:Active-Sts"),
                ChannelValue::Bool(transition.active),
            );
            self.transport.publish(
                &self.transition_channel(&transition.origin, &transition.destination, "Sts:Reach-Sts"),
                ChannelValue::Bool(transition.reachable),
            );
        }

        for device in &snapshot.devices {
            self.transport.publish(
                &self.device_channel(&device.name, "Sts:Tgts-I"),
                ChannelValue::Float(device.target_count as f64),
            );
            for (position, value) in &device.positions {
                self.transport.publish(
                    &self.device_channel(&device.name, &format!("Pos:{position}-Pos")),
                    ChannelValue::Float(*value),
                );
            }
        }
    }
}

/// Names of the registry-wide (not per-engine) control channels.
pub mod global_channels {
    pub const ACTIVE_SEL: &str = "{Gov}Active-Sel";
    pub const CONFIG_SEL: &str = "{Gov}Config-Sel";
    pub const ABORT_CMD: &str = "{Gov}Cmd:Abort-Cmd";
    pub const KILL_CMD: &str = "{Gov}Cmd:Kill-Cmd";
}
