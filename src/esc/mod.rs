// ESC control module for the ROV thruster
//
// Provides:
// - Q16.16 fixed-point codec for setpoints
// - 9-byte frame protocol (encoder and resynchronizing decoder)
// - Regime classification and setpoint mapping
// - High-level driver that sequences enable/disable/direction/setpoint frames

pub mod bus;
pub mod decoder;
mod driver;
pub mod fixed;
mod link;
pub mod protocol;
pub mod regime;
pub mod setpoint;

pub use bus::{PeripheralBus, RecordingBus, SerialBus};
pub use decoder::{EscStatus, FrameDecoder};
pub use driver::{ControlState, EscAction, EscDriver, TickOutcome};
pub use fixed::Fix16;
pub use link::EscLink;
pub use protocol::{EscError, Result};
pub use regime::{classify, Direction, Regime, Transition};
pub use setpoint::{EscTuning, Setpoints};
