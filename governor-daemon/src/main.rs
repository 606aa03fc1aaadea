// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Governor daemon: loads one or more governor configs, starts an engine per
//! config under a shared registry, and blocks for the process lifetime.
//!
//! The real control-bus binding (EPICS/Tango/whatever) is out of scope; this
//! binary wires each engine's [`BusAdapter`] to a logging [`BusTransport`] so
//! the channel-naming scheme can still be observed end to end.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use governor_core::config::ConfigStore;
use governor_core::engine::GovernorEngine;
use governor_core::logging::{LoggingConfig, init_logging};
use governor_core::registry::{BusAdapter, BusTransport, ChannelValue, GovernorRegistry};
use governor_daemon::load_sync_config;
use tracing::{error, info};

/// The Governor: a configuration-driven hardware state-machine supervisor.
#[derive(Parser, Debug)]
#[command(name = "governor")]
#[command(version)]
#[command(about = "Governor hardware state-machine supervisor", long_about = None)]
struct Args {
    /// Configuration files to load, one governor per file.
    #[arg(short, long = "config", required = true, num_args = 1..)]
    config: Vec<PathBuf>,

    /// Check configuration files for errors and exit without starting.
    #[arg(long)]
    check_config: bool,

    /// Log level.
    #[arg(
        short,
        long = "log_level",
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    log_level: String,

    /// Prefix applied to every governor's PV names.
    #[arg(long, default_value = "")]
    prefix: String,

    /// Synchronization config file mapping device positions shared
    /// across every loaded governor.
    #[arg(short, long)]
    sync: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let logging = LoggingConfig::default().with_level(&map_log_level(&args.log_level));
    if let Err(err) = init_logging(&logging) {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }

    info!("The Governor");

    let mut stores = Vec::with_capacity(args.config.len());
    let mut had_error = false;
    for path in &args.config {
        match ConfigStore::load(path) {
            Ok(store) => stores.push(store),
            Err(err) => {
                error!("invalid config file {}: {}", path.display(), err);
                had_error = true;
            }
        }
    }

    if had_error {
        std::process::exit(1);
    }

    info!("configuration files {:?} loaded", args.config);
    if args.check_config {
        std::process::exit(0);
    }

    let sync = match &args.sync {
        Some(path) => match load_sync_config(path) {
            Ok(sync) => sync,
            Err(err) => {
                error!("failed to load sync file {}: {}", path.display(), err);
                std::process::exit(1);
            }
        },
        None => Default::default(),
    };

    let mut registry = GovernorRegistry::new(sync);
    let transport: Arc<dyn BusTransport> = Arc::new(LoggingTransport);

    for store in stores {
        let name = store.config().name.clone();
        let adapter = Arc::new(BusAdapter::new(
            format!("{}{}", args.prefix, name),
            transport.clone(),
        ));
        let engine = GovernorEngine::spawn(store, Some(adapter));
        registry.register(name, engine);
    }

    info!("governors running: {:?}", registry.names());

    // The real bus transport would drive incoming commands from here; with
    // none wired in, the process just waits to be killed.
    park_forever();
}

fn park_forever() -> ! {
    loop {
        std::thread::park();
    }
}

/// Map the original tool's Python `logging` level names onto the five
/// levels `tracing` understands.
fn map_log_level(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        _ => "info",
    }
}

struct LoggingTransport;

impl BusTransport for LoggingTransport {
    fn publish(&self, channel: &str, value: ChannelValue) {
        match value {
            ChannelValue::Enum(v) | ChannelValue::Str(v) => {
                tracing::debug!(channel, value = %v, "publish")
            }
            ChannelValue::Float(v) => tracing::debug!(channel, value = v, "publish"),
            ChannelValue::Bool(v) => tracing::debug!(channel, value = v, "publish"),
        }
    }
}
