// ESC monitor: READ-ONLY dump of status frames coming back from the ESC
//
// This tool does NOT write anything to the ESC - the thruster will not move.
//
// Usage: cargo run --example esc_monitor -- [port]
// Example: cargo run --example esc_monitor -- /dev/ttyUSB0

use rov_esc_runtime::config::ESC_PORT;
use rov_esc_runtime::esc::{EscStatus, FrameDecoder, PeripheralBus, SerialBus};
use std::thread::sleep;
use std::time::{Duration, Instant};

const LISTEN_FOR: Duration = Duration::from_secs(10);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    // Get port from args or use default
    let port = std::env::args().nth(1).unwrap_or_else(|| ESC_PORT.to_string());

    println!("ESC monitor (read-only)");
    println!("Serial port: {}", port);
    println!();

    println!("Opening serial port...");
    let mut bus = match SerialBus::open(&port) {
        Ok(bus) => {
            println!("  ✓ Serial port opened successfully");
            bus
        }
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the ESC is powered and the adapter is connected");
            return Err(e.into());
        }
    };
    println!();

    println!("Listening for {}s...", LISTEN_FOR.as_secs());
    let mut decoder = FrameDecoder::new();
    let mut frames = 0;
    let started = Instant::now();

    while started.elapsed() < LISTEN_FOR {
        match bus.read_available()? {
            Some(byte) => {
                if let Some(status) = decoder.on_byte(byte) {
                    frames += 1;
                    print_status(&status);
                }
            }
            None => sleep(Duration::from_millis(5)),
        }
    }

    println!();
    println!(
        "{} valid frames, {} dropped for bad checksum",
        frames,
        decoder.checksum_errors()
    );
    if frames == 0 {
        println!("⚠ No status frames received. Check baud rate and wiring.");
    }

    Ok(())
}

fn print_status(status: &EscStatus) {
    match status {
        EscStatus::MotorControl { running, closed_loop } => {
            println!("  motor: running={} closed_loop={}", running, closed_loop)
        }
        EscStatus::Parameter { parameter, value, raw } => {
            println!("  param 0x{:02X} = {} (raw 0x{:08X})", parameter, value, raw)
        }
        EscStatus::Unknown { code, raw } => {
            println!("  unknown command 0x{:02X} (raw 0x{:08X})", code, raw)
        }
    }
}
