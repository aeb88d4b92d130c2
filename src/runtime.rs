// 50 Hz control loop with watchdog
// Note: if the pilot's command stream stops, the watchdog drops the throttle to
// zero so the ESC is disabled instead of holding the last setpoint forever.

use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};
use zenoh::pubsub::Publisher;

// local imports
use crate::config::{
    Args, CMD_TIMEOUT, LOOP_HZ, MAX_INBOUND_BYTES_PER_TICK, TOPIC_CMD_THRUSTER, TOPIC_ESC_STATUS,
    TOPIC_HEALTH, TOPIC_RT_THRUSTER,
};
use crate::esc::{
    EscDriver, EscStatus, FrameDecoder, PeripheralBus, RecordingBus, SerialBus, TickOutcome,
};
use crate::messages::{EscCommand, RuntimeHealth, ThrottleMessage, ThrottlePercent};

pub struct Runtime {
    target: ThrottlePercent,
    cmd_received_at: Option<Instant>,
    health: RuntimeHealth,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            target: ThrottlePercent::ZERO,
            cmd_received_at: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process a validated command
    pub fn on_command(&mut self, cmd: EscCommand, now: Instant) {
        match cmd {
            EscCommand::Throttle(percent) => {
                if percent != self.target {
                    info!("Throttle target {}%", percent.percent());
                }
                self.target = percent;
            }
        }
        self.cmd_received_at = Some(now);
    }

    /// Process a raw JSON payload. Out-of-range throttle values are ignored.
    pub fn on_payload(&mut self, payload: &[u8], now: Instant) {
        match serde_json::from_slice::<ThrottleMessage>(payload) {
            Ok(msg) => match EscCommand::try_from(&msg) {
                Ok(cmd) => self.on_command(cmd, now),
                Err(value) => debug!("Ignoring out-of-range throttle {}", value),
            },
            Err(e) => warn!("Failed to parse command: {}", e),
        }
    }

    /// Throttle fraction for this tick (includes watchdog logic)
    pub fn compute_throttle(&mut self, now: Instant) -> f32 {
        let fresh = self
            .cmd_received_at
            .map(|at| now.saturating_duration_since(at) <= CMD_TIMEOUT)
            .unwrap_or(false);

        if fresh {
            self.health = RuntimeHealth::Ok;
            self.target.as_fraction()
        } else {
            // Watchdog triggered (or no command ever received) - stop the thruster
            if self.health != RuntimeHealth::CmdStale {
                warn!("Throttle command stale, stopping thruster");
            }
            self.health = RuntimeHealth::CmdStale;
            0.0
        }
    }
}

/// One ESC service pass: run the control tick, then decode whatever status
/// bytes the ESC has sent since the last pass. Only recognised statuses are
/// returned.
pub fn service_esc<B: PeripheralBus>(
    driver: &mut EscDriver<B>,
    decoder: &mut FrameDecoder,
    throttle: f32,
) -> (TickOutcome, Vec<EscStatus>) {
    let outcome = driver.on_tick(throttle);

    let mut statuses = Vec::new();
    for _ in 0..MAX_INBOUND_BYTES_PER_TICK {
        match driver.bus_mut().read_available() {
            // Unknown codes are logged by the decoder and go no further
            Ok(Some(byte)) => statuses.extend(decoder.on_byte(byte).filter(EscStatus::is_known)),
            Ok(None) => break,
            Err(e) => {
                warn!("ESC read failed: {}", e);
                break;
            }
        }
    }

    (outcome, statuses)
}

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tuning = args.esc_tuning()?;

    if args.simulate {
        info!("Simulation mode: ESC frames go to an in-memory bus");
        drive(EscDriver::with_tuning(RecordingBus::new(), tuning)).await
    } else {
        info!("Opening ESC on {} at {} baud", args.port, args.baud);
        let bus = SerialBus::open_with_baudrate(&args.port, args.baud)?;
        drive(EscDriver::with_tuning(bus, tuning)).await
    }
}

async fn drive<B: PeripheralBus>(
    mut driver: EscDriver<B>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("ESC tuning: {:?}", driver.tuning());
    let failed = driver.initialize();
    if failed > 0 {
        warn!("ESC init handshake lost {} frames, continuing", failed);
    }

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_THRUSTER).await?;
    let pub_outcome = session.declare_publisher(TOPIC_RT_THRUSTER).await?;
    let pub_status = session.declare_publisher(TOPIC_ESC_STATUS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut decoder = FrameDecoder::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_THRUSTER);
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_THRUSTER, TOPIC_ESC_STATUS, TOPIC_HEALTH
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut ctrl_c => {
                info!("Shutdown requested");
                break;
            }
        }

        // 1. Drain all pending commands (non-blocking), keep latest
        let now = Instant::now();
        while let Ok(Some(sample)) = subscriber.try_recv() {
            runtime.on_payload(&sample.payload().to_bytes(), now);
        }

        // 2. Drive the ESC and collect its status
        let throttle = runtime.compute_throttle(now);
        let (outcome, statuses) = service_esc(&mut driver, &mut decoder, throttle);

        // 3. Publish tick outcome and decoded status
        publish(&pub_outcome, &outcome).await;
        for status in &statuses {
            publish(&pub_status, status).await;
        }

        // 4. Publish health
        publish(&pub_health, &runtime.health()).await;
    }

    // Dropping the driver disables the ESC
    drop(driver);
    Ok(())
}

/// Publish one telemetry message. Failures are logged and the loop keeps
/// driving the ESC.
async fn publish<T: Serialize>(publisher: &Publisher<'_>, message: &T) {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize {}: {}", publisher.key_expr(), e);
            return;
        }
    };
    if let Err(e) = publisher.put(json).await {
        warn!("Failed to publish {}: {}", publisher.key_expr(), e);
    }
}
