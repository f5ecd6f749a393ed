//! # Tildagon
//!
//! Event bus runtime for the Tildagon badge.
//!
//! ## Architecture
//!
//! The runtime is organized as a workspace:
//!
//! 1. **tildagon-core** - Events, app identity, handler registry, delivery
//!    queue, dispatch loop and failure containment
//! 2. **tildagon** - This crate: logging setup, the system services that
//!    react to bus requests, demo apps and the binary that wires them
//!
//! ## Features
//!
//! - **Typed events** with a base type hierarchy for subscription
//! - **Sync and async handlers**, delivered in two phases per event
//! - **Focus filtering** for input events
//! - **Failure containment**: a faulting app is stopped and the user notified

use std::path::Path;

pub mod demo;
pub mod system;

pub use system::{AppLifecycle, NotificationLog};
pub use tildagon_core::{
    App, AppEvent, AppHandle, BasicApp, BusStats, Error, EventBus, EventBusConfig, EventType,
    Result,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load the bus configuration, falling back to defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<EventBusConfig> {
    match path {
        Some(path) => Ok(EventBusConfig::load(path)?),
        None => Ok(EventBusConfig::default()),
    }
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
