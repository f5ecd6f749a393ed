//! App identity as seen by the event bus.
//!
//! The bus never creates or destroys apps. It only needs to tell them apart
//! and, for focus-restricted events, ask whether an app currently holds input
//! focus. Focus itself is owned by whoever schedules the apps.

use serde::{Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Anything that can own event handler registrations
pub trait App: Send + Sync {
    /// Name used in logs and crash notifications
    fn name(&self) -> &str;

    /// Whether the app currently has input focus
    fn is_focused(&self) -> bool {
        false
    }
}

/// Shared handle to an app.
///
/// Two handles are equal only if they point at the same app instance.
#[derive(Clone)]
pub struct AppHandle(Arc<dyn App>);

impl AppHandle {
    /// Wrap an app in a new handle
    pub fn new<A: App + 'static>(app: A) -> Self {
        Self(Arc::new(app))
    }

    /// App name
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Current focus state of the app
    pub fn is_focused(&self) -> bool {
        self.0.is_focused()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<A: App + 'static> From<Arc<A>> for AppHandle {
    fn from(app: Arc<A>) -> Self {
        Self(app)
    }
}

impl PartialEq for AppHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for AppHandle {}

impl Hash for AppHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("name", &self.name())
            .field("addr", &self.addr())
            .finish()
    }
}

impl std::fmt::Display for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AppHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Minimal [`App`] with a settable focus flag
#[derive(Debug)]
pub struct BasicApp {
    name: String,
    focused: AtomicBool,
}

impl BasicApp {
    /// Create an unfocused app
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            focused: AtomicBool::new(false),
        }
    }

    /// Create an app that starts out focused
    pub fn focused(name: impl Into<String>) -> Self {
        let app = Self::new(name);
        app.set_focused(true);
        app
    }

    /// Update the focus flag
    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }
}

impl App for BasicApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}
