//! Event Bus implementation.
//!
//! Provides the [`EventBus`] handle: publishing, handler registration and
//! introspection. The dispatch loop lives in `dispatch.rs` and failure
//! containment in `containment.rs`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

use super::events::{AppEvent, EventType};
use super::handler::{AsyncHandler, Handler, HandlerMode, HandlerResult, SyncHandler};
use super::queue::DeliveryQueue;
use super::registry::HandlerRegistry;
use crate::app::AppHandle;
use crate::config::EventBusConfig;

/// Point-in-time copy of the bus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Events handed to `publish` or `publish_async`.
    pub published: u64,
    /// Events that finished both delivery phases.
    pub dispatched: u64,
    /// Synchronous handler calls.
    pub sync_invocations: u64,
    /// Asynchronous handler tasks spawned.
    pub async_tasks: u64,
    /// Faults contained, one per app per event.
    pub handler_faults: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) published: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) sync_invocations: AtomicU64,
    pub(crate) async_tasks: AtomicU64,
    pub(crate) handler_faults: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            sync_invocations: self.sync_invocations.load(Ordering::Relaxed),
            async_tasks: self.async_tasks.load(Ordering::Relaxed),
            handler_faults: self.handler_faults.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub(crate) struct BusShared {
    pub(crate) registry: HandlerRegistry,
    pub(crate) queue: DeliveryQueue<AppEvent>,
    pub(crate) stats: StatsCounters,
    pub(crate) config: EventBusConfig,
}

/// Central event bus connecting apps and system services.
///
/// `EventBus` is a cheap handle; clones share the same registry and queue.
/// Construct one per system and pass it to whatever needs it.
#[derive(Clone)]
pub struct EventBus {
    pub(crate) shared: Arc<BusShared>,
}

/// Non-owning handle, for handlers that need to reach the bus that owns them
#[derive(Clone, Debug)]
pub struct WeakEventBus {
    shared: Weak<BusShared>,
}

impl WeakEventBus {
    /// Get the bus back if it is still alive
    pub fn upgrade(&self) -> Option<EventBus> {
        self.shared.upgrade().map(|shared| EventBus { shared })
    }
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                registry: HandlerRegistry::new(),
                queue: DeliveryQueue::new(config.queue_capacity),
                stats: StatsCounters::default(),
                config,
            }),
        }
    }

    /// Downgrade to a handle that does not keep the bus alive
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Queue an event for dispatch without waiting.
    ///
    /// Never fails and never blocks, even when a queue capacity is set.
    pub fn publish(&self, event: impl Into<AppEvent>) {
        let event = event.into();
        debug!(event = %event.description(), "Event published");
        StatsCounters::bump(&self.shared.stats.published);
        self.shared.queue.push(event);
    }

    /// Queue an event, waiting while a bounded queue is full
    pub async fn publish_async(&self, event: impl Into<AppEvent>) {
        let event = event.into();
        debug!(event = %event.description(), "Event published");
        StatsCounters::bump(&self.shared.stats.published);
        self.shared.queue.push_wait(event).await;
    }

    /// Register a handler for `event_type` on behalf of `app`.
    ///
    /// The same handler may be registered more than once; each registration
    /// is invoked separately.
    pub fn register(&self, app: &AppHandle, event_type: EventType, handler: impl Into<Handler>) {
        let handler = handler.into();
        debug!(
            event_type = %event_type,
            app = %app,
            handler = handler.name(),
            mode = %handler.mode(),
            "Registered event handler"
        );
        self.shared.registry.register(app, event_type, handler);
    }

    /// Register a synchronous closure and return it for later removal
    pub fn on<F>(
        &self,
        app: &AppHandle,
        event_type: EventType,
        name: impl Into<String>,
        func: F,
    ) -> Handler
    where
        F: Fn(&AppEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let handler = Handler::Sync(SyncHandler::new(name, func));
        self.register(app, event_type, handler.clone());
        handler
    }

    /// Register an asynchronous closure and return it for later removal
    pub fn on_async<F, Fut>(
        &self,
        app: &AppHandle,
        event_type: EventType,
        name: impl Into<String>,
        func: F,
    ) -> Handler
    where
        F: Fn(Arc<AppEvent>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = Handler::Async(AsyncHandler::new(name, func));
        self.register(app, event_type, handler.clone());
        handler
    }

    /// Remove one registration of `handler`.
    ///
    /// Unknown apps, types or handlers are ignored. Returns true if a
    /// registration was removed.
    pub fn unregister(&self, app: &AppHandle, event_type: EventType, handler: &Handler) -> bool {
        let removed = self.shared.registry.unregister(app, &event_type, handler);
        if removed {
            debug!(
                event_type = %event_type,
                app = %app,
                handler = handler.name(),
                mode = %handler.mode(),
                "Removed event handler"
            );
        }
        removed
    }

    /// Remove every handler owned by `app`, sync and async alike
    pub fn deregister(&self, app: &AppHandle) -> bool {
        let removed = self.shared.registry.deregister(app);
        if removed {
            debug!(app = %app, "Deregistered app");
        }
        removed
    }

    /// Number of registered handlers of one mode
    pub fn handler_count(&self, mode: HandlerMode) -> usize {
        self.shared.registry.handler_count(mode)
    }

    /// Number of apps owning at least one handler
    pub fn app_count(&self) -> usize {
        self.shared.registry.app_count()
    }

    /// Whether `app` owns any handler
    pub fn is_registered(&self, app: &AppHandle) -> bool {
        self.shared.registry.is_registered(app)
    }

    /// Number of events waiting for dispatch
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Current counters
    pub fn stats(&self) -> BusStats {
        self.shared.stats.snapshot()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.shared.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("apps", &self.app_count())
            .field("sync_handlers", &self.handler_count(HandlerMode::Sync))
            .field("async_handlers", &self.handler_count(HandlerMode::Async))
            .field("pending", &self.pending())
            .field("config", &self.shared.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BasicApp;
    use crate::event_bus::events::{EmoteEvent, HexpansionEvent};

    #[test]
    fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.app_count(), 0);
        assert_eq!(bus.pending(), 0);
        assert_eq!(bus.stats(), BusStats::default());
    }

    #[test]
    fn test_register_and_unregister() {
        let bus = EventBus::new();
        let app = AppHandle::new(BasicApp::new("leds"));

        let handler = bus.on(&app, EventType::Emote, "flash", |_| Ok(()));
        assert_eq!(bus.handler_count(HandlerMode::Sync), 1);
        assert!(bus.is_registered(&app));

        assert!(bus.unregister(&app, EventType::Emote, &handler));
        assert_eq!(bus.handler_count(HandlerMode::Sync), 0);

        // Double unregister is a no-op
        assert!(!bus.unregister(&app, EventType::Emote, &handler));
    }

    #[test]
    fn test_publish_queues_in_order() {
        let bus = EventBus::new();
        bus.publish(AppEvent::Emote(EmoteEvent::Positive));
        bus.publish(AppEvent::Hexpansion(HexpansionEvent::Insertion { port: 2 }));
        assert_eq!(bus.pending(), 2);
        assert_eq!(bus.stats().published, 2);

        let first = bus.shared.queue.try_pop().expect("first event");
        assert!(matches!(first, AppEvent::Emote(EmoteEvent::Positive)));
    }

    #[test]
    fn test_weak_handle_does_not_keep_bus_alive() {
        let bus = EventBus::new();
        let weak = bus.downgrade();
        assert!(weak.upgrade().is_some());
        drop(bus);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_publish_async_respects_capacity() {
        let bus = EventBus::with_config(EventBusConfig {
            queue_capacity: Some(1),
            ..Default::default()
        });
        bus.publish_async(AppEvent::Emote(EmoteEvent::Positive)).await;

        let producer = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish_async(AppEvent::Emote(EmoteEvent::Negative)).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(bus.pending(), 1);

        // The non-waiting path ignores the bound
        bus.publish(AppEvent::Emote(EmoteEvent::Negative));
        assert_eq!(bus.pending(), 2);

        let drained = bus.drain().await;
        producer.await.expect("producer task");
        assert_eq!(drained + bus.drain().await, 3);
        assert_eq!(bus.stats().dispatched, 3);
    }
}
