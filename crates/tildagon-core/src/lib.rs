//! # Tildagon Core
//!
//! Core types for the Tildagon badge runtime: the event bus that connects
//! apps to each other and to the system, app identity, configuration and
//! error types.

pub mod app;
pub mod config;
pub mod error;
pub mod event_bus;

pub use app::{App, AppHandle, BasicApp};
pub use config::EventBusConfig;
pub use error::{ConfigError, Error, FaultCause, HandlerFault, Result};

// Re-export event bus for convenience
pub use event_bus::{
    AppEvent, AsyncHandler, BusStats, EventBus, EventType, Handler, HandlerMode, HandlerResult,
    SyncHandler, WeakEventBus,
};
