use std::path::PathBuf;
use std::time::Duration;

use tildagon::demo::{EmoteLeds, Snake};
use tildagon::{init_logging, load_config, AppLifecycle, EventBus, NotificationLog};
use tildagon_core::event_bus::{AppEvent, Button, EmoteEvent, HexpansionEvent, InputEvent};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    info!(version = tildagon::VERSION, ?config, "Starting Tildagon event bus");

    let bus = EventBus::with_config(config);
    let lifecycle = AppLifecycle::install(&bus);
    let notifications = NotificationLog::install(&bus);

    let leds = EmoteLeds::new(Duration::from_millis(500));
    leds.install(&bus);
    let snake = Snake::new(4);
    snake.install(&bus);

    let press = |button| AppEvent::Input(InputEvent::ButtonDown { button });
    bus.publish(AppEvent::Hexpansion(HexpansionEvent::Insertion { port: 2 }));
    bus.publish(AppEvent::Emote(EmoteEvent::Positive));
    for _ in 0..4 {
        bus.publish(press(Button::Right));
    }
    bus.publish(press(Button::Down));
    bus.publish(AppEvent::Emote(EmoteEvent::Negative));
    bus.publish(AppEvent::Hexpansion(HexpansionEvent::Removal { port: 2 }));

    let dispatched = bus.drain().await;

    info!(
        dispatched,
        stats = ?bus.stats(),
        stopped = ?lifecycle.stopped(),
        notifications = ?notifications.messages(),
        snake_head = ?snake.head(),
        active_ports = ?leds.active_ports(),
        "Event bus idle"
    );

    Ok(())
}
