//! System services that answer requests published on the bus.
//!
//! These are minimal stand-ins for the badge scheduler and notification
//! overlay: the lifecycle service unloads an app by removing all of its
//! handlers, and the notification service records and logs messages instead
//! of drawing them.

use parking_lot::Mutex;
use std::sync::Arc;
use tildagon_core::event_bus::{AppEvent, EventBus, EventType, NotificationEvent, SchedulerEvent};
use tildagon_core::{AppHandle, BasicApp};
use tracing::{debug, info, warn};

/// Handles `RequestStopApp` by deregistering the app from the bus
#[derive(Debug, Clone)]
pub struct AppLifecycle {
    handle: AppHandle,
    stopped: Arc<Mutex<Vec<String>>>,
}

impl AppLifecycle {
    /// Register the stop handler on `bus`
    pub fn install(bus: &EventBus) -> Self {
        let handle = AppHandle::new(BasicApp::new("lifecycle"));
        let stopped = Arc::new(Mutex::new(Vec::new()));

        let weak = bus.downgrade();
        let record = Arc::clone(&stopped);
        bus.on(&handle, EventType::RequestStopApp, "stop_app", move |event| {
            let AppEvent::Scheduler(SchedulerEvent::RequestStopApp { app }) = event else {
                return Ok(());
            };
            if let Some(bus) = weak.upgrade() {
                if bus.deregister(app) {
                    info!(app = %app, "Stopped app");
                } else {
                    debug!(app = %app, "Stop requested for an app with no handlers");
                }
            }
            record.lock().push(app.name().to_string());
            Ok(())
        });

        Self { handle, stopped }
    }

    /// The service's own registration identity
    pub fn handle(&self) -> &AppHandle {
        &self.handle
    }

    /// Names of apps stopped so far, in order
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }
}

/// Handles `ShowNotification` by logging the message
#[derive(Debug, Clone)]
pub struct NotificationLog {
    handle: AppHandle,
    messages: Arc<Mutex<Vec<String>>>,
}

impl NotificationLog {
    /// Register the notification handler on `bus`
    pub fn install(bus: &EventBus) -> Self {
        let handle = AppHandle::new(BasicApp::new("notifications"));
        let messages = Arc::new(Mutex::new(Vec::new()));

        let record = Arc::clone(&messages);
        bus.on(&handle, EventType::ShowNotification, "show", move |event| {
            if let AppEvent::Notification(NotificationEvent::Show { message }) = event {
                warn!(message = %message, "Notification");
                record.lock().push(message.clone());
            }
            Ok(())
        });

        Self { handle, messages }
    }

    /// The service's own registration identity
    pub fn handle(&self) -> &AppHandle {
        &self.handle
    }

    /// Messages shown so far, in order
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}
