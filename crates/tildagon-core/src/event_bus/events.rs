//! Event type definitions for the event bus.
//!
//! Events are grouped by the subsystem that produces them. Each concrete
//! event maps to a leaf [`EventType`], and event types form a small
//! hierarchy rooted at [`EventType::Any`] so that a handler registered for a
//! base type also receives every subtype.

use serde::Serialize;
use std::sync::Arc;

use crate::app::AppHandle;

/// Root event enum for everything that travels over the bus
#[derive(Debug, Clone, Serialize)]
pub enum AppEvent {
    /// Front panel button input
    Input(InputEvent),
    /// Emotion reactions triggered by the user
    Emote(EmoteEvent),
    /// Hexpansion port hotplug
    Hexpansion(HexpansionEvent),
    /// Requests addressed to the app scheduler
    Scheduler(SchedulerEvent),
    /// User-visible notifications
    Notification(NotificationEvent),
    /// Producer-defined events
    Custom(CustomEvent),
}

impl AppEvent {
    /// Get the concrete (leaf) type of this event
    pub fn event_type(&self) -> EventType {
        match self {
            AppEvent::Input(InputEvent::ButtonDown { .. }) => EventType::ButtonDown,
            AppEvent::Input(InputEvent::ButtonUp { .. }) => EventType::ButtonUp,
            AppEvent::Emote(EmoteEvent::Positive) => EventType::EmotePositive,
            AppEvent::Emote(EmoteEvent::Negative) => EventType::EmoteNegative,
            AppEvent::Hexpansion(HexpansionEvent::Insertion { .. }) => {
                EventType::HexpansionInsertion
            }
            AppEvent::Hexpansion(HexpansionEvent::Removal { .. }) => EventType::HexpansionRemoval,
            AppEvent::Scheduler(SchedulerEvent::RequestStopApp { .. }) => EventType::RequestStopApp,
            AppEvent::Scheduler(SchedulerEvent::RequestForegroundPush { .. }) => {
                EventType::RequestForegroundPush
            }
            AppEvent::Scheduler(SchedulerEvent::RequestForegroundPop { .. }) => {
                EventType::RequestForegroundPop
            }
            AppEvent::Notification(NotificationEvent::Show { .. }) => EventType::ShowNotification,
            AppEvent::Custom(custom) => EventType::Custom(Arc::clone(&custom.name)),
        }
    }

    /// Whether this event is an instance of `ty`, either directly or through
    /// one of its base types.
    pub fn is_a(&self, ty: &EventType) -> bool {
        self.event_type().is_a(ty)
    }

    /// Whether only the focused app may receive this event
    pub fn requires_focus(&self) -> bool {
        match self {
            AppEvent::Input(_) => true,
            AppEvent::Custom(custom) => custom.requires_focus,
            _ => false,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Input(e) => e.description(),
            AppEvent::Emote(e) => e.description(),
            AppEvent::Hexpansion(e) => e.description(),
            AppEvent::Scheduler(e) => e.description(),
            AppEvent::Notification(e) => e.description(),
            AppEvent::Custom(e) => e.description(),
        }
    }
}

/// Event types, including the abstract base types used for matching.
///
/// `Custom` types hang directly off [`EventType::Any`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    /// Base of every event.
    Any,
    /// Base of button events.
    Input,
    /// A button was pressed.
    ButtonDown,
    /// A button was released.
    ButtonUp,
    /// Base of emote events.
    Emote,
    /// Positive emote.
    EmotePositive,
    /// Negative emote.
    EmoteNegative,
    /// Base of hexpansion events.
    Hexpansion,
    /// A hexpansion was inserted.
    HexpansionInsertion,
    /// A hexpansion was removed.
    HexpansionRemoval,
    /// Base of scheduler requests.
    Scheduler,
    /// Stop and unload an app.
    RequestStopApp,
    /// Bring an app to the foreground.
    RequestForegroundPush,
    /// Remove an app from the foreground.
    RequestForegroundPop,
    /// Base of notification events.
    Notification,
    /// Show a notification to the user.
    ShowNotification,
    /// Producer-defined event type, identified by name.
    Custom(Arc<str>),
}

impl EventType {
    /// Producer-defined type with the given name
    pub fn custom(name: impl Into<Arc<str>>) -> Self {
        EventType::Custom(name.into())
    }

    /// Direct base type, `None` for [`EventType::Any`]
    pub fn parent(&self) -> Option<EventType> {
        match self {
            EventType::Any => None,
            EventType::Input
            | EventType::Emote
            | EventType::Hexpansion
            | EventType::Scheduler
            | EventType::Notification
            | EventType::Custom(_) => Some(EventType::Any),
            EventType::ButtonDown | EventType::ButtonUp => Some(EventType::Input),
            EventType::EmotePositive | EventType::EmoteNegative => Some(EventType::Emote),
            EventType::HexpansionInsertion | EventType::HexpansionRemoval => {
                Some(EventType::Hexpansion)
            }
            EventType::RequestStopApp
            | EventType::RequestForegroundPush
            | EventType::RequestForegroundPop => Some(EventType::Scheduler),
            EventType::ShowNotification => Some(EventType::Notification),
        }
    }

    /// Whether `self` equals `base` or descends from it
    pub fn is_a(&self, base: &EventType) -> bool {
        if self == base {
            return true;
        }
        match self.parent() {
            Some(parent) => parent.is_a(base),
            None => false,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Custom(name) => write!(f, "Custom({})", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Front panel buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Button {
    /// Up.
    Up,
    /// Right.
    Right,
    /// Confirm.
    Confirm,
    /// Down.
    Down,
    /// Left.
    Left,
    /// Cancel.
    Cancel,
}

/// Button events. These always require focus.
#[derive(Debug, Clone, Serialize)]
pub enum InputEvent {
    /// Button pressed.
    ButtonDown {
        /// The button that went down.
        button: Button,
    },
    /// Button released.
    ButtonUp {
        /// The button that went up.
        button: Button,
    },
}

impl InputEvent {
    fn description(&self) -> String {
        match self {
            InputEvent::ButtonDown { button } => format!("Button down: {:?}", button),
            InputEvent::ButtonUp { button } => format!("Button up: {:?}", button),
        }
    }
}

/// Emote events
#[derive(Debug, Clone, Serialize)]
pub enum EmoteEvent {
    /// Positive reaction.
    Positive,
    /// Negative reaction.
    Negative,
}

impl EmoteEvent {
    fn description(&self) -> String {
        match self {
            EmoteEvent::Positive => "Emote: positive".to_string(),
            EmoteEvent::Negative => "Emote: negative".to_string(),
        }
    }
}

/// Hexpansion hotplug events
#[derive(Debug, Clone, Serialize)]
pub enum HexpansionEvent {
    /// A hexpansion was inserted.
    Insertion {
        /// Port number, 1-based.
        port: u8,
    },
    /// A hexpansion was removed.
    Removal {
        /// Port number, 1-based.
        port: u8,
    },
}

impl HexpansionEvent {
    fn description(&self) -> String {
        match self {
            HexpansionEvent::Insertion { port } => format!("Hexpansion inserted in port {}", port),
            HexpansionEvent::Removal { port } => format!("Hexpansion removed from port {}", port),
        }
    }
}

/// Requests consumed by the app scheduler
#[derive(Debug, Clone, Serialize)]
pub enum SchedulerEvent {
    /// Stop and unload an app.
    RequestStopApp {
        /// The app to stop.
        app: AppHandle,
    },
    /// Bring an app to the foreground.
    RequestForegroundPush {
        /// The app to focus.
        app: AppHandle,
    },
    /// Remove an app from the foreground.
    RequestForegroundPop {
        /// The app to unfocus.
        app: AppHandle,
    },
}

impl SchedulerEvent {
    fn description(&self) -> String {
        match self {
            SchedulerEvent::RequestStopApp { app } => format!("Request stop app {}", app),
            SchedulerEvent::RequestForegroundPush { app } => {
                format!("Request foreground push {}", app)
            }
            SchedulerEvent::RequestForegroundPop { app } => {
                format!("Request foreground pop {}", app)
            }
        }
    }
}

/// Notification events
#[derive(Debug, Clone, Serialize)]
pub enum NotificationEvent {
    /// Show a message to the user.
    Show {
        /// Human readable text.
        message: String,
    },
}

impl NotificationEvent {
    fn description(&self) -> String {
        match self {
            NotificationEvent::Show { message } => format!("Notification: {}", message),
        }
    }
}

/// A producer-defined event.
///
/// Its type is `EventType::Custom(name)`, so handlers subscribe to it by name.
#[derive(Debug, Clone, Serialize)]
pub struct CustomEvent {
    /// Type name used for matching.
    pub name: Arc<str>,
    /// Whether only the focused app may receive it.
    pub requires_focus: bool,
    /// Free-form payload.
    pub payload: serde_json::Value,
}

impl CustomEvent {
    /// Create an event with no payload that does not require focus
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            requires_focus: false,
            payload: serde_json::Value::Null,
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Restrict delivery to the focused app
    pub fn requiring_focus(mut self) -> Self {
        self.requires_focus = true;
        self
    }

    fn description(&self) -> String {
        if self.payload.is_null() {
            format!("Custom event {}", self.name)
        } else {
            format!("Custom event {}: {}", self.name, self.payload)
        }
    }
}

impl From<CustomEvent> for AppEvent {
    fn from(event: CustomEvent) -> Self {
        AppEvent::Custom(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BasicApp;

    #[test]
    fn test_leaf_types_descend_from_their_base() {
        assert!(EventType::ButtonDown.is_a(&EventType::Input));
        assert!(EventType::ButtonDown.is_a(&EventType::Any));
        assert!(EventType::EmoteNegative.is_a(&EventType::Emote));
        assert!(EventType::RequestStopApp.is_a(&EventType::Scheduler));
        assert!(EventType::custom("ping").is_a(&EventType::Any));
    }

    #[test]
    fn test_unrelated_types_do_not_match() {
        assert!(!EventType::ButtonDown.is_a(&EventType::Emote));
        assert!(!EventType::Input.is_a(&EventType::ButtonDown));
        assert!(!EventType::custom("ping").is_a(&EventType::custom("pong")));
        assert!(!EventType::Any.is_a(&EventType::Input));
    }

    #[test]
    fn test_requires_focus_defaults() {
        let press = AppEvent::Input(InputEvent::ButtonDown {
            button: Button::Confirm,
        });
        assert!(press.requires_focus());
        assert!(!AppEvent::Emote(EmoteEvent::Positive).requires_focus());
        assert!(!AppEvent::from(CustomEvent::new("ping")).requires_focus());
        assert!(AppEvent::from(CustomEvent::new("ping").requiring_focus()).requires_focus());
    }

    #[test]
    fn test_event_type_of_scheduler_request() {
        let app = AppHandle::new(BasicApp::new("menu"));
        let event = AppEvent::Scheduler(SchedulerEvent::RequestStopApp { app });
        assert_eq!(event.event_type(), EventType::RequestStopApp);
        assert!(event.is_a(&EventType::Scheduler));
        assert_eq!(event.description(), "Request stop app menu");
    }

    #[test]
    fn test_custom_event_serializes_payload() {
        let event = AppEvent::from(
            CustomEvent::new("score").with_payload(serde_json::json!({ "points": 3 })),
        );
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["Custom"]["name"], "score");
        assert_eq!(json["Custom"]["payload"]["points"], 3);
        assert_eq!(EventType::custom("score").to_string(), "Custom(score)");
    }

    #[test]
    fn test_custom_type_named_at_runtime() {
        let name = format!("level-{}", 2);
        let event = AppEvent::from(CustomEvent::new(name.as_str()));
        assert_eq!(event.event_type(), EventType::custom(name.clone()));
        assert!(event.is_a(&EventType::custom(name)));
        assert!(!event.is_a(&EventType::custom("level-3")));
    }
}
