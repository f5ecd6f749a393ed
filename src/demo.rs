//! Demo apps for the binary.
//!
//! [`EmoteLeds`] mirrors the badge's back LED app: it flashes the back LEDs
//! on emotes and tracks which hexpansion ports are populated. [`Snake`] is a
//! focused game with an unchecked board boundary, so it faults once it is
//! steered off the board.

use anyhow::ensure;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tildagon_core::event_bus::{
    AppEvent, Button, EventBus, EventType, HexpansionEvent, InputEvent,
};
use tildagon_core::{App, AppHandle, HandlerResult};
use tracing::info;

/// Number of back LEDs, one per hexpansion port
pub const BACK_LEDS: usize = 6;

/// LED colour
pub type Rgb = (u8, u8, u8);

const OFF: Rgb = (0, 0, 0);
const GREEN: Rgb = (0, 255, 0);
const RED: Rgb = (255, 0, 0);

/// Back LED reactions to emotes and hexpansion hotplug
#[derive(Debug)]
pub struct EmoteLeds {
    flash_for: Duration,
    // Held for the whole flash so overlapping emotes take turns
    leds: tokio::sync::Mutex<[Rgb; BACK_LEDS]>,
    active_ports: Mutex<[bool; BACK_LEDS]>,
    flashes: AtomicUsize,
}

impl EmoteLeds {
    /// Create the app; each emote lights the LEDs for `flash_for`
    pub fn new(flash_for: Duration) -> Arc<Self> {
        Arc::new(Self {
            flash_for,
            leds: tokio::sync::Mutex::new([OFF; BACK_LEDS]),
            active_ports: Mutex::new([false; BACK_LEDS]),
            flashes: AtomicUsize::new(0),
        })
    }

    /// Register the app's async handlers and return its handle
    pub fn install(self: &Arc<Self>, bus: &EventBus) -> AppHandle {
        let handle = AppHandle::from(Arc::clone(self));

        for (event_type, name, colour) in [
            (EventType::EmotePositive, "positive", GREEN),
            (EventType::EmoteNegative, "negative", RED),
        ] {
            let app = Arc::clone(self);
            bus.on_async(&handle, event_type, name, move |_| {
                let app = Arc::clone(&app);
                async move {
                    app.flash(colour).await;
                    Ok(())
                }
            });
        }

        let app = Arc::clone(self);
        bus.on_async(&handle, EventType::Hexpansion, "hotplug", move |event| {
            let app = Arc::clone(&app);
            async move { app.track_port(&event) }
        });

        handle
    }

    async fn flash(&self, colour: Rgb) {
        let mut leds = self.leds.lock().await;
        *leds = [colour; BACK_LEDS];
        tokio::time::sleep(self.flash_for).await;
        *leds = [OFF; BACK_LEDS];
        self.flashes.fetch_add(1, Ordering::Relaxed);
    }

    fn track_port(&self, event: &AppEvent) -> HandlerResult {
        let (port, present) = match event {
            AppEvent::Hexpansion(HexpansionEvent::Insertion { port }) => (*port, true),
            AppEvent::Hexpansion(HexpansionEvent::Removal { port }) => (*port, false),
            _ => return Ok(()),
        };
        let index = usize::from(port)
            .checked_sub(1)
            .filter(|index| *index < BACK_LEDS);
        let Some(index) = index else {
            anyhow::bail!("no back LED for hexpansion port {}", port);
        };
        let mut ports = self.active_ports.lock();
        ports[index] = present;
        info!(port, present, active = ?*ports, "Hexpansion ports changed");
        Ok(())
    }

    /// Ports currently holding a hexpansion
    pub fn active_ports(&self) -> [bool; BACK_LEDS] {
        *self.active_ports.lock()
    }

    /// Completed emote flashes
    pub fn flashes(&self) -> usize {
        self.flashes.load(Ordering::Relaxed)
    }
}

impl App for EmoteLeds {
    fn name(&self) -> &str {
        "emote_leds"
    }
}

/// A snake on a square board, steered with the direction buttons
#[derive(Debug)]
pub struct Snake {
    size: i32,
    head: Mutex<(i32, i32)>,
}

impl Snake {
    /// Create a snake in the top left corner of a `size` x `size` board
    pub fn new(size: i32) -> Arc<Self> {
        Arc::new(Self {
            size,
            head: Mutex::new((0, 0)),
        })
    }

    /// Register the app's button handler and return its handle
    pub fn install(self: &Arc<Self>, bus: &EventBus) -> AppHandle {
        let handle = AppHandle::from(Arc::clone(self));
        let app = Arc::clone(self);
        bus.on(&handle, EventType::ButtonDown, "steer", move |event| {
            match event {
                AppEvent::Input(InputEvent::ButtonDown { button }) => app.steer(*button),
                _ => Ok(()),
            }
        });
        handle
    }

    fn steer(&self, button: Button) -> HandlerResult {
        let (dx, dy) = match button {
            Button::Up => (0, -1),
            Button::Down => (0, 1),
            Button::Left => (-1, 0),
            Button::Right => (1, 0),
            Button::Confirm | Button::Cancel => return Ok(()),
        };
        let mut head = self.head.lock();
        let next = (head.0 + dx, head.1 + dy);
        ensure!(
            (0..self.size).contains(&next.0) && (0..self.size).contains(&next.1),
            "snake left the board at {:?}",
            next
        );
        *head = next;
        Ok(())
    }

    /// Current head position
    pub fn head(&self) -> (i32, i32) {
        *self.head.lock()
    }
}

impl App for Snake {
    fn name(&self) -> &str {
        "snake"
    }

    fn is_focused(&self) -> bool {
        true
    }
}
