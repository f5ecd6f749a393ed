//! Failure containment.
//!
//! A faulting app is reported, not handled here: the bus publishes a stop
//! request for the scheduler and a crash notification for the user, and both
//! are delivered on a later turn of the dispatch loop like any other event.

use tracing::error;

use super::bus::{EventBus, StatsCounters};
use super::events::{AppEvent, NotificationEvent, SchedulerEvent};
use crate::app::AppHandle;
use crate::error::HandlerFault;

impl EventBus {
    /// Log `fault` and publish the follow-up events for its app.
    ///
    /// Runs on the dispatch loop, so it only uses the non-waiting publish.
    pub(crate) fn contain(&self, fault: HandlerFault, event: &AppEvent) {
        error!(
            app = %fault.app,
            handler = %fault.handler,
            mode = %fault.mode,
            event = %event.description(),
            error = %fault.cause,
            "Event handler faulted, stopping app"
        );
        StatsCounters::bump(&self.shared.stats.handler_faults);

        let message = crash_message(&fault.app);
        self.publish(AppEvent::Scheduler(SchedulerEvent::RequestStopApp { app: fault.app }));
        self.publish(AppEvent::Notification(NotificationEvent::Show { message }));
    }
}

/// Text of the notification shown when `app` faults
pub fn crash_message(app: &AppHandle) -> String {
    format!("{} has crashed", app.name())
}
