//! # Event Bus Module
//!
//! Publish/subscribe dispatcher that decouples apps from each other and from
//! the system layer.
//!
//! ## Overview
//!
//! - Producers publish typed [`AppEvent`]s without knowing who listens
//! - Apps register sync or async handlers per [`EventType`]; a handler for a
//!   base type also sees its subtypes
//! - Events that require focus only reach the focused app
//! - A faulting handler gets its app stopped and the user notified, while
//!   delivery to every other app carries on
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tildagon_core::event_bus::{AppEvent, EmoteEvent, EventBus, EventType};
//! use tildagon_core::app::{AppHandle, BasicApp};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let leds = AppHandle::new(BasicApp::new("leds"));
//!
//! let handler = bus.on_async(&leds, EventType::Emote, "flash", |event| async move {
//!     println!("flash for {}", event.description());
//!     Ok(())
//! });
//!
//! bus.publish(AppEvent::Emote(EmoteEvent::Positive));
//! bus.drain().await;
//!
//! bus.unregister(&leds, EventType::Emote, &handler);
//! # }
//! ```

mod bus;
mod containment;
mod dispatch;
mod events;
mod handler;
mod queue;
mod registry;

pub use bus::*;
pub use containment::crash_message;
pub use events::*;
pub use handler::*;
pub use queue::DeliveryQueue;
pub use registry::{AppEntry, HandlerRegistry, HandlerTable, RegistrySnapshot};
