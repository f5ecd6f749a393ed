//! Dispatch loop.
//!
//! Each event goes through two phases. The synchronous phase calls every
//! eligible sync handler inline; the first fault for an app skips the rest of
//! that app's handlers. The asynchronous phase spawns every eligible async
//! handler as a task, one `JoinSet` per app, then drains the groups in app
//! order. A failed task marks its app as faulted but its siblings still run
//! to completion.
//!
//! Both phases iterate a registry snapshot, so registrations made by handlers
//! only take effect for later events.
//!
//! Everything that runs app code on the loop is guarded with `catch_unwind`:
//! sync handlers, the async handler call that builds the future, and the
//! app's focus check. A panic there is contained like any other fault.

use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, trace, warn};

use super::bus::{EventBus, StatsCounters};
use super::events::AppEvent;
use super::handler::{HandlerMode, HandlerResult, SyncHandler};
use super::registry::AppEntry;
use crate::app::AppHandle;
use crate::error::{FaultCause, HandlerFault};

type TaskOutcome = (Arc<str>, Result<HandlerResult, String>);

impl EventBus {
    /// Run the dispatch loop forever.
    ///
    /// Only returns if the task running it is dropped or aborted.
    pub async fn run(&self) {
        info!("Event bus dispatch loop started");
        loop {
            self.dispatch_next().await;
        }
    }

    /// Wait for the next event and deliver it
    pub async fn dispatch_next(&self) {
        let event = self.shared.queue.pop().await;
        self.dispatch(Arc::new(event)).await;
    }

    /// Deliver queued events until the queue is empty.
    ///
    /// Events published while draining, including containment follow-ups, are
    /// delivered too. Returns the number of events dispatched.
    pub async fn drain(&self) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.shared.queue.try_pop() {
            self.dispatch(Arc::new(event)).await;
            dispatched += 1;
        }
        dispatched
    }

    async fn dispatch(&self, event: Arc<AppEvent>) {
        let requires_focus = event.requires_focus();
        trace!(event = %event.description(), requires_focus, "Dispatching event");

        self.dispatch_sync(&event, requires_focus);
        self.dispatch_async(&event, requires_focus).await;

        StatsCounters::bump(&self.shared.stats.dispatched);
    }

    fn dispatch_sync(&self, event: &AppEvent, requires_focus: bool) {
        let timer = PhaseTimer::start("synchronous", self.shared.config.slow_phase_warning());
        let snapshot = self.shared.registry.sync_snapshot();

        for entry in snapshot.entries() {
            let outcome = match check_eligible(entry, requires_focus, HandlerMode::Sync) {
                Ok(true) => self.invoke_sync(entry, event),
                Ok(false) => continue,
                Err(fault) => Err(fault),
            };
            if let Err(fault) = outcome {
                self.contain(fault, event);
            }
        }

        timer.finish(event);
    }

    /// Call `entry`'s matching handlers in order, stopping at the first fault
    fn invoke_sync(
        &self,
        entry: &AppEntry<SyncHandler>,
        event: &AppEvent,
    ) -> Result<(), HandlerFault> {
        for handler in entry.matching(event) {
            StatsCounters::bump(&self.shared.stats.sync_invocations);
            let cause = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => FaultCause::Error(error),
                Err(payload) => FaultCause::Panic(panic_message(payload.as_ref())),
            };
            return Err(HandlerFault {
                app: entry.app().clone(),
                handler: handler.name_arc(),
                mode: HandlerMode::Sync,
                cause,
            });
        }
        Ok(())
    }

    async fn dispatch_async(&self, event: &Arc<AppEvent>, requires_focus: bool) {
        let timer = PhaseTimer::start("asynchronous", self.shared.config.slow_phase_warning());
        let snapshot = self.shared.registry.async_snapshot();

        // Schedule every app's handlers before waiting on any of them.
        let mut groups: Vec<TaskGroup> = Vec::new();
        for entry in snapshot.entries() {
            match check_eligible(entry, requires_focus, HandlerMode::Async) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(fault) => {
                    self.contain(fault, event);
                    continue;
                }
            }
            let mut group = TaskGroup {
                app: entry.app().clone(),
                tasks: JoinSet::new(),
                first_fault: None,
            };
            for handler in entry.matching(event) {
                StatsCounters::bump(&self.shared.stats.async_tasks);
                let name = handler.name_arc();
                let future = match panic::catch_unwind(AssertUnwindSafe(|| {
                    handler.call(Arc::clone(event))
                })) {
                    Ok(future) => future,
                    Err(payload) => {
                        group.record(name, FaultCause::Panic(panic_message(payload.as_ref())));
                        continue;
                    }
                };
                group.tasks.spawn(async move {
                    let outcome = AssertUnwindSafe(future)
                        .catch_unwind()
                        .await
                        .map_err(|payload| panic_message(payload.as_ref()));
                    (name, outcome)
                });
            }
            if !group.tasks.is_empty() || group.first_fault.is_some() {
                groups.push(group);
            }
        }

        for mut group in groups {
            while let Some(joined) = group.tasks.join_next().await {
                let (handler, cause) = match joined {
                    Ok((_, Ok(Ok(())))) => continue,
                    Ok((name, Ok(Err(error)))) => (name, FaultCause::Error(error)),
                    Ok((name, Err(message))) => (name, FaultCause::Panic(message)),
                    Err(join_error) => {
                        (Arc::from("<task>"), FaultCause::Panic(join_error.to_string()))
                    }
                };
                group.record(handler, cause);
            }
            if let Some(fault) = group.first_fault {
                self.contain(fault, event);
            }
        }

        timer.finish(event);
    }
}

/// Async tasks of one app for one event
struct TaskGroup {
    app: AppHandle,
    tasks: JoinSet<TaskOutcome>,
    first_fault: Option<HandlerFault>,
}

impl TaskGroup {
    /// Keep the first fault; later ones are only traced
    fn record(&mut self, handler: Arc<str>, cause: FaultCause) {
        if self.first_fault.is_some() {
            trace!(app = %self.app, handler = %handler, "Additional async fault ignored");
            return;
        }
        self.first_fault = Some(HandlerFault {
            app: self.app.clone(),
            handler,
            mode: HandlerMode::Async,
            cause,
        });
    }
}

/// Run the app's focus check, turning a panic into a fault
fn check_eligible<H>(
    entry: &AppEntry<H>,
    requires_focus: bool,
    mode: HandlerMode,
) -> Result<bool, HandlerFault> {
    panic::catch_unwind(AssertUnwindSafe(|| entry.is_eligible(requires_focus))).map_err(|payload| {
        HandlerFault {
            app: entry.app().clone(),
            handler: Arc::from("is_focused"),
            mode,
            cause: FaultCause::Panic(panic_message(payload.as_ref())),
        }
    })
}

/// Extract the message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Times one delivery phase
struct PhaseTimer {
    phase: &'static str,
    started: Instant,
    warn_after: Duration,
}

impl PhaseTimer {
    fn start(phase: &'static str, warn_after: Duration) -> Self {
        Self {
            phase,
            started: Instant::now(),
            warn_after,
        }
    }

    fn finish(self, event: &AppEvent) {
        let elapsed = self.started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if elapsed > self.warn_after {
            warn!(
                phase = self.phase,
                elapsed_ms,
                event = %event.description(),
                "Slow event handler phase"
            );
        } else {
            trace!(phase = self.phase, elapsed_ms, "Event handler phase complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BasicApp;
    use crate::event_bus::events::{
        Button, CustomEvent, EmoteEvent, EventType, InputEvent, NotificationEvent, SchedulerEvent,
    };
    use crate::app::App;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn app(name: &str) -> AppHandle {
        AppHandle::new(BasicApp::new(name))
    }

    /// App whose focus state cannot be read
    struct BrokenFocus(&'static str);

    impl App for BrokenFocus {
        fn name(&self) -> &str {
            self.0
        }

        fn is_focused(&self) -> bool {
            panic!("focus state unavailable")
        }
    }

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn explode() -> HandlerResult {
        panic!("async panic")
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_sync_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let owner = app("owner");
        let log = recorder();

        for name in ["one", "two", "three"] {
            let log = Arc::clone(&log);
            bus.on(&owner, EventType::Emote, name, move |_| {
                log.lock().push(name.to_string());
                Ok(())
            });
        }

        bus.publish(AppEvent::Emote(EmoteEvent::Positive));
        assert_eq!(bus.drain().await, 1);
        assert_eq!(*log.lock(), vec!["one", "two", "three"]);
        assert_eq!(bus.stats().sync_invocations, 3);
    }

    #[tokio::test]
    async fn test_sync_fault_skips_rest_of_app() {
        let bus = EventBus::new();
        let owner = app("owner");
        let log = recorder();

        let before = Arc::clone(&log);
        bus.on(&owner, EventType::Emote, "before", move |_| {
            before.lock().push("before".into());
            Ok(())
        });
        bus.on(&owner, EventType::Emote, "broken", |_| {
            anyhow::bail!("broken handler")
        });
        let after = Arc::clone(&log);
        bus.on(&owner, EventType::Emote, "after", move |_| {
            after.lock().push("after".into());
            Ok(())
        });

        bus.publish(AppEvent::Emote(EmoteEvent::Negative));
        bus.dispatch_next().await;

        assert_eq!(*log.lock(), vec!["before"]);
        assert_eq!(bus.stats().handler_faults, 1);
        // Stop request and notification are queued, not delivered yet
        assert_eq!(bus.pending(), 2);
    }

    #[tokio::test]
    async fn test_sync_panic_is_contained() {
        let bus = EventBus::new();
        let owner = app("panicky");
        bus.on(&owner, EventType::Any, "explode", |_| panic!("handler exploded"));

        bus.publish(CustomEvent::new("ping"));
        bus.dispatch_next().await;

        assert_eq!(bus.stats().handler_faults, 1);
        let stop = bus.shared.queue.try_pop().expect("stop request");
        assert!(matches!(
            stop,
            AppEvent::Scheduler(SchedulerEvent::RequestStopApp { ref app }) if *app == owner
        ));
        let note = bus.shared.queue.try_pop().expect("notification");
        assert!(matches!(
            note,
            AppEvent::Notification(NotificationEvent::Show { ref message }) if message == "panicky has crashed"
        ));
    }

    #[tokio::test]
    async fn test_async_siblings_finish_after_fault() {
        let bus = EventBus::new();
        let owner = app("owner");
        let log = recorder();

        bus.on_async(&owner, EventType::Emote, "fails", |_| async {
            anyhow::bail!("async failure")
        });
        bus.on_async(&owner, EventType::Emote, "also fails", |_| async { explode() });
        let slow = Arc::clone(&log);
        bus.on_async(&owner, EventType::Emote, "slow", move |_| {
            let slow = Arc::clone(&slow);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                slow.lock().push("slow done".into());
                Ok(())
            }
        });

        bus.publish(AppEvent::Emote(EmoteEvent::Positive));
        bus.dispatch_next().await;

        assert_eq!(*log.lock(), vec!["slow done"]);
        assert_eq!(bus.stats().async_tasks, 3);
        assert_eq!(bus.stats().handler_faults, 1);
        assert_eq!(bus.pending(), 2);
    }

    #[tokio::test]
    async fn test_focus_is_read_at_dispatch_time() {
        let bus = EventBus::new();
        let shared = Arc::new(BasicApp::new("menu"));
        let owner = AppHandle::from(Arc::clone(&shared));
        let log = recorder();

        let seen = Arc::clone(&log);
        bus.on(&owner, EventType::Input, "press", move |event| {
            seen.lock().push(event.description());
            Ok(())
        });

        let press = || {
            AppEvent::Input(InputEvent::ButtonDown {
                button: Button::Confirm,
            })
        };
        bus.publish(press());
        bus.drain().await;
        assert!(log.lock().is_empty());

        shared.set_focused(true);
        bus.publish(press());
        bus.drain().await;
        assert_eq!(*log.lock(), vec!["Button down: Confirm"]);
    }

    #[tokio::test]
    async fn test_deregister_during_sync_phase_hides_async_handlers() {
        let bus = EventBus::new();
        let owner = app("owner");
        let log = recorder();

        let weak = bus.downgrade();
        let target = owner.clone();
        bus.on(&owner, EventType::Emote, "quit", move |_| {
            if let Some(bus) = weak.upgrade() {
                bus.deregister(&target);
            }
            Ok(())
        });
        let ran = Arc::clone(&log);
        bus.on_async(&owner, EventType::Emote, "late", move |_| {
            let ran = Arc::clone(&ran);
            async move {
                ran.lock().push("late".into());
                Ok(())
            }
        });

        bus.publish(AppEvent::Emote(EmoteEvent::Positive));
        bus.drain().await;

        // The async snapshot is taken after the sync phase
        assert!(log.lock().is_empty());
        assert!(!bus.is_registered(&owner));
    }

    #[tokio::test]
    async fn test_async_handler_panic_before_future_is_contained() {
        let bus = EventBus::new();
        let faulty = app("faulty");
        let good = app("good");
        let log = recorder();
        let calls = Arc::new(AtomicUsize::new(0));

        let ports: Vec<u8> = vec![1, 2];
        bus.on_async(&faulty, EventType::Emote, "lookup", move |_| {
            let port = ports[3];
            async move {
                anyhow::ensure!(port > 0, "port zero");
                Ok(())
            }
        });
        let sibling = Arc::clone(&log);
        bus.on_async(&faulty, EventType::Emote, "sibling", move |_| {
            let sibling = Arc::clone(&sibling);
            async move {
                sibling.lock().push("sibling".into());
                Ok(())
            }
        });
        let counter = Arc::clone(&calls);
        bus.on_async(&good, EventType::Emote, "count", move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        bus.publish(AppEvent::Emote(EmoteEvent::Positive));
        bus.dispatch_next().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock(), vec!["sibling"]);
        assert_eq!(bus.stats().handler_faults, 1);
        assert_eq!(bus.stats().dispatched, 1);

        let stop = bus.shared.queue.try_pop().expect("stop request");
        assert!(matches!(
            stop,
            AppEvent::Scheduler(SchedulerEvent::RequestStopApp { ref app }) if *app == faulty
        ));
        let note = bus.shared.queue.try_pop().expect("notification");
        assert!(matches!(
            note,
            AppEvent::Notification(NotificationEvent::Show { ref message }) if message == "faulty has crashed"
        ));
        assert_eq!(bus.pending(), 0);
    }

    #[tokio::test]
    async fn test_focus_check_panic_is_contained() {
        let bus = EventBus::new();
        let broken_sync = AppHandle::new(BrokenFocus("broken_sync"));
        let broken_async = AppHandle::new(BrokenFocus("broken_async"));
        let focused = AppHandle::new(BasicApp::focused("focused"));
        let log = recorder();

        bus.on(&broken_sync, EventType::Input, "press", |_| Ok(()));
        bus.on_async(&broken_async, EventType::Input, "press", |_| async { Ok(()) });
        let seen = Arc::clone(&log);
        bus.on(&focused, EventType::Input, "press", move |event| {
            seen.lock().push(event.description());
            Ok(())
        });

        bus.publish(AppEvent::Input(InputEvent::ButtonDown {
            button: Button::Confirm,
        }));
        bus.dispatch_next().await;

        assert_eq!(*log.lock(), vec!["Button down: Confirm"]);
        assert_eq!(bus.stats().sync_invocations, 1);
        assert_eq!(bus.stats().async_tasks, 0);
        assert_eq!(bus.stats().handler_faults, 2);

        let mut stopped = Vec::new();
        while let Some(event) = bus.shared.queue.try_pop() {
            if let AppEvent::Scheduler(SchedulerEvent::RequestStopApp { app }) = event {
                stopped.push(app);
            }
        }
        assert_eq!(stopped, vec![broken_sync, broken_async]);
    }

    #[tokio::test]
    async fn test_focus_is_not_read_for_unrestricted_events() {
        let bus = EventBus::new();
        let broken = AppHandle::new(BrokenFocus("broken"));
        let log = recorder();

        let seen = Arc::clone(&log);
        bus.on(&broken, EventType::Emote, "smile", move |_| {
            seen.lock().push("smile".into());
            Ok(())
        });

        bus.publish(AppEvent::Emote(EmoteEvent::Positive));
        bus.drain().await;

        assert_eq!(*log.lock(), vec!["smile"]);
        assert_eq!(bus.stats().handler_faults, 0);
    }
}
