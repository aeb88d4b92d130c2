// Outbound side of the ESC protocol: builds frames and writes them to the bus

use tracing::{debug, warn};

use super::bus::PeripheralBus;
use super::fixed::Fix16;
use super::protocol::{build_frame, Command, Parameter, Result, MOTOR_CLOSED_LOOP, MOTOR_RUN};
use super::regime::Direction;

/// Frame encoder bound to a peripheral bus
pub struct EscLink<B: PeripheralBus> {
    bus: B,
}

impl<B: PeripheralBus> EscLink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Build one frame and write it. There is no acknowledgement, so a
    /// failure is logged and returned but never retried.
    pub fn send(&mut self, command: Command, parameter: Parameter, value: u32) -> Result<()> {
        let frame = build_frame(command, parameter, value);
        debug!(
            "Send {:?} {:?} value=0x{:08X}: {:02X?}",
            command, parameter, value, frame
        );

        self.bus.write(&frame).map_err(|e| {
            warn!("ESC write failed ({:?} {:?}): {}", command, parameter, e);
            e
        })
    }

    // === High-level convenience methods ===

    /// Stop driving the motor
    pub fn disable(&mut self) -> Result<()> {
        self.send(Command::MotorControl, Parameter::Unused, 0)
    }

    /// Start driving the motor with the selected control law
    pub fn enable(&mut self, closed_loop: bool) -> Result<()> {
        let mut flags = MOTOR_RUN;
        if closed_loop {
            flags |= MOTOR_CLOSED_LOOP;
        }
        self.send(Command::MotorControl, Parameter::Unused, flags)
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        let value = match direction {
            Direction::Normal => 0,
            Direction::Reverse => 1,
        };
        self.send(Command::ParameterWrite, Parameter::Reverse, value)
    }

    pub fn set_open_loop_setpoint(&mut self, setpoint: Fix16) -> Result<()> {
        self.send(
            Command::ParameterWrite,
            Parameter::OpenLoopSetpoint,
            setpoint.to_wire(),
        )
    }

    pub fn set_closed_loop_setpoint(&mut self, setpoint: Fix16) -> Result<()> {
        self.send(
            Command::ParameterWrite,
            Parameter::ClosedLoopSetpoint,
            setpoint.to_wire(),
        )
    }
}
