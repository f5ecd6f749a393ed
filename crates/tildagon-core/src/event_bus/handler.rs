//! Event handler types.
//!
//! Handlers are reference counted closures. Cloning a handler keeps its
//! identity, so the clone returned from registration can later be used to
//! remove exactly that handler.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use super::events::AppEvent;

/// Outcome of a single handler invocation. `Err` counts as a handler fault.
pub type HandlerResult = anyhow::Result<()>;

type SyncFn = dyn Fn(&AppEvent) -> HandlerResult + Send + Sync;
type AsyncFn = dyn Fn(Arc<AppEvent>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// Execution mode of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerMode {
    /// Runs to completion on the dispatch loop.
    Sync,
    /// Spawned as a task and awaited per app.
    Async,
}

impl std::fmt::Display for HandlerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerMode::Sync => write!(f, "sync"),
            HandlerMode::Async => write!(f, "async"),
        }
    }
}

/// Handler invoked inline by the dispatch loop. It must not block.
#[derive(Clone)]
pub struct SyncHandler {
    name: Arc<str>,
    func: Arc<SyncFn>,
}

impl SyncHandler {
    /// Create a named handler
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&AppEvent) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    /// Handler name, used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn call(&self, event: &AppEvent) -> HandlerResult {
        (self.func)(event)
    }
}

impl PartialEq for SyncHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl std::fmt::Debug for SyncHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SyncHandler").field(&self.name).finish()
    }
}

/// Handler whose future is spawned as its own task
#[derive(Clone)]
pub struct AsyncHandler {
    name: Arc<str>,
    func: Arc<AsyncFn>,
}

impl AsyncHandler {
    /// Create a named handler from a closure returning a future
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arc<AppEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(move |event: Arc<AppEvent>| func(event).boxed()),
        }
    }

    /// Handler name, used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn call(&self, event: Arc<AppEvent>) -> BoxFuture<'static, HandlerResult> {
        (self.func)(event)
    }
}

impl PartialEq for AsyncHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl std::fmt::Debug for AsyncHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AsyncHandler").field(&self.name).finish()
    }
}

/// A handler of either mode
#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    /// Synchronous handler.
    Sync(SyncHandler),
    /// Asynchronous handler.
    Async(AsyncHandler),
}

impl Handler {
    /// Handler name
    pub fn name(&self) -> &str {
        match self {
            Handler::Sync(h) => h.name(),
            Handler::Async(h) => h.name(),
        }
    }

    /// Execution mode
    pub fn mode(&self) -> HandlerMode {
        match self {
            Handler::Sync(_) => HandlerMode::Sync,
            Handler::Async(_) => HandlerMode::Async,
        }
    }
}

impl From<SyncHandler> for Handler {
    fn from(handler: SyncHandler) -> Self {
        Handler::Sync(handler)
    }
}

impl From<AsyncHandler> for Handler {
    fn from(handler: AsyncHandler) -> Self {
        Handler::Async(handler)
    }
}
