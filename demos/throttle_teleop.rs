// Keyboard thruster teleop: W/S throttle up/down, Space stop, Q quit
//
// Usage: cargo run --example throttle_teleop
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rov_esc_runtime::config::TOPIC_CMD_THRUSTER;
use rov_esc_runtime::messages::ThrottleMessage;
use std::time::Duration;
use tracing::info;

const STEP: i32 = 5; // percent per key press

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_THRUSTER).await?;

    info!("Controls: W/S=throttle +/-{}%, Space=stop, Q=quit", STEP);

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut throttle: i32 = 0;

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        throttle = (throttle + STEP).min(100);
                        info!("Throttle: {}%", throttle);
                    }
                    KeyCode::Char('s') if pressed => {
                        throttle = (throttle - STEP).max(-100);
                        info!("Throttle: {}%", throttle);
                    }
                    KeyCode::Char(' ') if pressed => {
                        throttle = 0;
                        info!("Throttle: stop");
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Always publish at ~50Hz so the runtime watchdog stays fed
        let cmd = ThrottleMessage { throttle };
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    // Leave the thruster stopped
    publisher
        .put(serde_json::to_string(&ThrottleMessage { throttle: 0 })?)
        .await?;

    Ok(())
}
