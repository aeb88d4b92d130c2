// Timeouts, topics, ESC configuration
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::esc::{bus::DEFAULT_BAUDRATE, EscTuning};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Upper bound on status bytes decoded per tick (115200 baud is ~230 bytes per 20ms)
pub const MAX_INBOUND_BYTES_PER_TICK: usize = 512;

// Zenoh topics
pub const TOPIC_CMD_THRUSTER: &str = "rov/cmd/thruster"; // commands
pub const TOPIC_RT_THRUSTER: &str = "rov/rt/thruster"; // per-tick outcome
pub const TOPIC_ESC_STATUS: &str = "rov/state/esc"; // decoded ESC status
pub const TOPIC_HEALTH: &str = "rov/state/health"; // health status

// Serial port the ESC is attached to
pub const ESC_PORT: &str = "/dev/ttyUSB0";

/// Command-line overrides
#[derive(Debug, Clone, Parser)]
#[command(name = "rov-esc-runtime", about = "Thruster ESC runtime")]
pub struct Args {
    /// Serial port of the ESC
    #[arg(long, default_value = ESC_PORT)]
    pub port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud: u32,

    /// Run without hardware; frames go to an in-memory bus
    #[arg(long)]
    pub simulate: bool,

    /// JSON file with setpoint tuning (missing fields keep their defaults)
    #[arg(long)]
    pub tuning: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid tuning in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Rejected tuning in {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Load setpoint tuning from a JSON file
pub fn load_tuning(path: &Path) -> Result<EscTuning, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let tuning: EscTuning = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tuning.validate().map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    info!("Loaded ESC tuning from {}: {:?}", path.display(), tuning);
    Ok(tuning)
}

impl Args {
    /// Tuning from `--tuning`, or the defaults
    pub fn esc_tuning(&self) -> Result<EscTuning, ConfigError> {
        match &self.tuning {
            Some(path) => load_tuning(path),
            None => Ok(EscTuning::default()),
        }
    }
}
