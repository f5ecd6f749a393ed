//! Handler registry.
//!
//! Registrations are kept per app, in the order apps first registered, then
//! per event type in registration order, then as an ordered handler list.
//! Duplicates are allowed. Sync and async handlers live in separate tables
//! that sit behind one lock so deregistering an app is a single write.
//!
//! Tables are copy-on-write: a snapshot is just another reference to the
//! current table, and writers clone it only while a snapshot is alive. The
//! dispatch loop iterates snapshots, so handlers can register or remove
//! handlers while they run without disturbing the event in flight.

use parking_lot::RwLock;
use std::sync::Arc;

use super::events::{AppEvent, EventType};
use super::handler::{AsyncHandler, Handler, HandlerMode, SyncHandler};
use crate::app::AppHandle;

/// Immutable view of one handler table
pub type RegistrySnapshot<H> = Arc<HandlerTable<H>>;

/// Registrations of one app
#[derive(Debug, Clone)]
pub struct AppEntry<H> {
    app: AppHandle,
    types: Vec<(EventType, Vec<H>)>,
}

impl<H> AppEntry<H> {
    /// Owning app
    pub fn app(&self) -> &AppHandle {
        &self.app
    }

    /// Handlers whose registered type matches `event`, in registration order
    pub fn matching<'a>(&'a self, event: &'a AppEvent) -> impl Iterator<Item = &'a H> + 'a {
        self.types
            .iter()
            .filter(move |(ty, _)| event.is_a(ty))
            .flat_map(|(_, handlers)| handlers.iter())
    }

    /// Registered event types and their handlers
    pub fn types(&self) -> impl Iterator<Item = (&EventType, &[H])> {
        self.types.iter().map(|(ty, handlers)| (ty, handlers.as_slice()))
    }

    /// Whether the app may receive an event with the given focus requirement
    pub fn is_eligible(&self, requires_focus: bool) -> bool {
        !requires_focus || self.app.is_focused()
    }
}

/// Ordered app → event type → handlers table
#[derive(Debug, Clone)]
pub struct HandlerTable<H> {
    apps: Vec<AppEntry<H>>,
}

impl<H> Default for HandlerTable<H> {
    fn default() -> Self {
        Self { apps: Vec::new() }
    }
}

impl<H: PartialEq> HandlerTable<H> {
    /// Apps in first-registration order
    pub fn entries(&self) -> &[AppEntry<H>] {
        &self.apps
    }

    /// Total number of handler entries, duplicates included
    pub fn handler_count(&self) -> usize {
        self.apps
            .iter()
            .flat_map(|entry| entry.types.iter())
            .map(|(_, handlers)| handlers.len())
            .sum()
    }

    /// Number of apps with an entry
    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    /// Whether `app` has an entry
    pub fn contains_app(&self, app: &AppHandle) -> bool {
        self.apps.iter().any(|entry| &entry.app == app)
    }

    fn push(&mut self, app: &AppHandle, ty: EventType, handler: H) {
        let index = match self.apps.iter().position(|entry| &entry.app == app) {
            Some(index) => index,
            None => {
                self.apps.push(AppEntry {
                    app: app.clone(),
                    types: Vec::new(),
                });
                self.apps.len() - 1
            }
        };
        let entry = &mut self.apps[index];
        match entry.types.iter_mut().find(|(registered, _)| *registered == ty) {
            Some((_, handlers)) => handlers.push(handler),
            None => entry.types.push((ty, vec![handler])),
        }
    }

    fn remove(&mut self, app: &AppHandle, ty: &EventType, handler: &H) -> bool {
        let Some(entry) = self.apps.iter_mut().find(|entry| &entry.app == app) else {
            return false;
        };
        let Some((_, handlers)) = entry.types.iter_mut().find(|(registered, _)| registered == ty)
        else {
            return false;
        };
        match handlers.iter().position(|h| h == handler) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    fn remove_app(&mut self, app: &AppHandle) -> bool {
        let before = self.apps.len();
        self.apps.retain(|entry| &entry.app != app);
        self.apps.len() != before
    }

    fn find(&self, app: &AppHandle, ty: &EventType, handler: &H) -> bool {
        self.apps
            .iter()
            .filter(|entry| &entry.app == app)
            .flat_map(|entry| entry.types.iter())
            .filter(|(registered, _)| registered == ty)
            .any(|(_, handlers)| handlers.contains(handler))
    }
}

#[derive(Debug, Default)]
struct Tables {
    sync: Arc<HandlerTable<SyncHandler>>,
    asynchronous: Arc<HandlerTable<AsyncHandler>>,
}

/// Live registry shared by the bus and everything that registers handlers
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    tables: RwLock<Tables>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to `(app, ty)` in the table matching its mode
    pub fn register(&self, app: &AppHandle, ty: EventType, handler: Handler) {
        let mut tables = self.tables.write();
        match handler {
            Handler::Sync(h) => Arc::make_mut(&mut tables.sync).push(app, ty, h),
            Handler::Async(h) => Arc::make_mut(&mut tables.asynchronous).push(app, ty, h),
        }
    }

    /// Remove the first occurrence of `handler` from `(app, ty)`.
    ///
    /// Returns `false` if nothing matched.
    pub fn unregister(&self, app: &AppHandle, ty: &EventType, handler: &Handler) -> bool {
        // A miss must not clone a table that a snapshot still holds.
        if !self.contains(app, ty, handler) {
            return false;
        }
        let mut tables = self.tables.write();
        match handler {
            Handler::Sync(h) => Arc::make_mut(&mut tables.sync).remove(app, ty, h),
            Handler::Async(h) => Arc::make_mut(&mut tables.asynchronous).remove(app, ty, h),
        }
    }

    /// Remove every registration of `app` from both tables.
    ///
    /// Returns `false` if the app had none.
    pub fn deregister(&self, app: &AppHandle) -> bool {
        let mut tables = self.tables.write();
        let in_sync = tables.sync.contains_app(app);
        let in_async = tables.asynchronous.contains_app(app);
        if in_sync {
            Arc::make_mut(&mut tables.sync).remove_app(app);
        }
        if in_async {
            Arc::make_mut(&mut tables.asynchronous).remove_app(app);
        }
        in_sync || in_async
    }

    /// Current sync table
    pub fn sync_snapshot(&self) -> RegistrySnapshot<SyncHandler> {
        Arc::clone(&self.tables.read().sync)
    }

    /// Current async table
    pub fn async_snapshot(&self) -> RegistrySnapshot<AsyncHandler> {
        Arc::clone(&self.tables.read().asynchronous)
    }

    /// Number of handler entries in one table
    pub fn handler_count(&self, mode: HandlerMode) -> usize {
        let tables = self.tables.read();
        match mode {
            HandlerMode::Sync => tables.sync.handler_count(),
            HandlerMode::Async => tables.asynchronous.handler_count(),
        }
    }

    /// Number of distinct apps with at least one entry in either table
    pub fn app_count(&self) -> usize {
        let tables = self.tables.read();
        let async_only = tables
            .asynchronous
            .entries()
            .iter()
            .filter(|entry| !tables.sync.contains_app(entry.app()))
            .count();
        tables.sync.app_count() + async_only
    }

    /// Whether `app` has an entry in either table
    pub fn is_registered(&self, app: &AppHandle) -> bool {
        let tables = self.tables.read();
        tables.sync.contains_app(app) || tables.asynchronous.contains_app(app)
    }

    fn contains(&self, app: &AppHandle, ty: &EventType, handler: &Handler) -> bool {
        let tables = self.tables.read();
        match handler {
            Handler::Sync(h) => tables.sync.find(app, ty, h),
            Handler::Async(h) => tables.asynchronous.find(app, ty, h),
        }
    }
}
