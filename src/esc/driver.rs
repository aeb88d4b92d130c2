// High-level ESC driver
//
// Turns one throttle value per tick into the ordered frame sequence the ESC
// needs for the regime/direction change that throttle implies.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::bus::PeripheralBus;
use super::fixed::Fix16;
use super::link::EscLink;
use super::protocol::Result;
use super::regime::{classify, Direction, Regime, Transition};
use super::setpoint::{EscTuning, Setpoints};

/// One step of an action sequence, in the order it was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscAction {
    Disable,
    UpdateSetpoints,
    SetDirection(Direction),
    Enable { closed_loop: bool },
}

/// Everything the driver knows about the motor between ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlState {
    pub magnitude: f32,
    pub regime: Regime,
    pub previous_regime: Regime,
    pub direction: Direction,
    pub previous_direction: Direction,
    /// Direction last written to the ESC
    pub commanded_direction: Direction,
    pub setpoints: Setpoints,
}

/// Result of one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub regime: Regime,
    pub transition: Transition,
    pub direction: Direction,
    pub reversed: bool,
    pub setpoints: Setpoints,
    pub actions: Vec<EscAction>,
    pub failed_writes: usize,
}

/// ESC driver: owns the control state and the frame encoder
pub struct EscDriver<B: PeripheralBus> {
    link: EscLink<B>,
    tuning: EscTuning,
    state: ControlState,
}

impl<B: PeripheralBus> EscDriver<B> {
    /// Create a new driver with default tuning
    pub fn new(bus: B) -> Self {
        Self::with_tuning(bus, EscTuning::default())
    }

    /// Create with custom setpoint tuning
    pub fn with_tuning(bus: B, tuning: EscTuning) -> Self {
        Self {
            link: EscLink::new(bus),
            tuning,
            state: ControlState::default(),
        }
    }

    /// Put the ESC into a known stopped state.
    ///
    /// Sent once at startup: disable, direction normal, zero setpoints. Every
    /// frame is attempted even if an earlier one fails, and the local state is
    /// reset either way. Returns the number of frames that were not delivered.
    pub fn initialize(&mut self) -> usize {
        info!("Initializing ESC: disable, normal direction, zero setpoints");

        let results = [
            self.link.disable(),
            self.link.set_direction(Direction::Normal),
            self.link.set_open_loop_setpoint(Fix16::ZERO),
            self.link.set_closed_loop_setpoint(Fix16::ZERO),
        ];
        let failed = results.iter().filter(|r| r.is_err()).count();

        self.state = ControlState::default();
        if failed == 0 {
            info!("ESC initialized");
        } else {
            warn!("ESC initialized with {} undelivered frames", failed);
        }
        failed
    }

    /// Run one control tick for a throttle in [-1.0, 1.0].
    ///
    /// A non-finite or out-of-range throttle is skipped: nothing is sent and
    /// the state is left as it was.
    pub fn on_tick(&mut self, throttle: f32) -> TickOutcome {
        let previous = self.state;

        if !throttle.is_finite() || throttle.abs() > 1.0 {
            debug!("Skipping invalid throttle {}", throttle);
            return TickOutcome {
                regime: previous.regime,
                transition: Transition::None,
                direction: previous.direction,
                reversed: false,
                setpoints: previous.setpoints,
                actions: Vec::new(),
                failed_writes: 0,
            };
        }

        let direction = Direction::from_throttle(throttle);
        let reversed = direction != previous.direction;
        let magnitude = throttle.abs();
        let (regime, transition) = classify(magnitude, previous.regime);
        let setpoints = self.tuning.map_setpoints(magnitude, regime);

        if transition != Transition::None || (reversed && regime.is_on()) {
            info!(
                "ESC {:?} -> {:?} ({:?}, reversed={})",
                previous.regime, regime, transition, reversed
            );
        }

        let actions = plan_actions(
            transition,
            regime,
            direction,
            reversed || direction != previous.commanded_direction,
        );

        let mut failed_writes = 0;
        let mut commanded_direction = previous.commanded_direction;
        for &action in &actions {
            let result = match action {
                EscAction::Disable => self.link.disable(),
                EscAction::UpdateSetpoints => self.send_setpoints(&setpoints),
                EscAction::SetDirection(d) => {
                    commanded_direction = d;
                    self.link.set_direction(d)
                }
                EscAction::Enable { closed_loop } => self.link.enable(closed_loop),
            };
            // Fire-and-forget: the next tick proceeds from the intended state
            if let Err(e) = result {
                failed_writes += 1;
                warn!("ESC {:?} not delivered: {}", action, e);
            }
        }

        if !actions.is_empty() {
            debug!("ESC actions: {:?}", actions);
        }

        self.state = ControlState {
            magnitude,
            regime,
            previous_regime: previous.regime,
            direction,
            previous_direction: previous.direction,
            commanded_direction,
            setpoints,
        };

        TickOutcome {
            regime,
            transition,
            direction,
            reversed,
            setpoints,
            actions,
            failed_writes,
        }
    }

    /// Stop the motor, regardless of the current regime
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping ESC");
        self.link.disable()
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn tuning(&self) -> &EscTuning {
        &self.tuning
    }

    pub fn bus(&self) -> &B {
        self.link.bus()
    }

    pub fn bus_mut(&mut self) -> &mut B {
        self.link.bus_mut()
    }

    /// Write both setpoints; the first error is returned after both are tried
    fn send_setpoints(&mut self, setpoints: &Setpoints) -> Result<()> {
        let open = self.link.set_open_loop_setpoint(setpoints.open_loop_fixed);
        let closed = self.link.set_closed_loop_setpoint(setpoints.closed_loop_fixed);
        open.and(closed)
    }
}

impl<B: PeripheralBus> Drop for EscDriver<B> {
    fn drop(&mut self) {
        // Try to stop the motor when driver is dropped
        if let Err(e) = self.stop() {
            warn!("Failed to stop ESC on drop: {}", e);
        }
    }
}

/// Ordered actions for a tick.
///
/// `resync_direction` is set when the throttle sign flipped since the last
/// tick or the ESC was last told a different direction.
fn plan_actions(
    transition: Transition,
    regime: Regime,
    direction: Direction,
    resync_direction: bool,
) -> Vec<EscAction> {
    use EscAction::*;

    let enable = Enable {
        closed_loop: regime == Regime::ClosedLoop,
    };
    let full_resequence = vec![Disable, UpdateSetpoints, SetDirection(direction), enable];

    match transition {
        Transition::None if !regime.is_on() => Vec::new(),
        Transition::None if resync_direction => full_resequence,
        Transition::None => vec![UpdateSetpoints],
        Transition::OffToOn if resync_direction => {
            vec![UpdateSetpoints, SetDirection(direction), enable]
        }
        Transition::OffToOn => vec![UpdateSetpoints, enable],
        Transition::OnToOff => vec![Disable],
        Transition::OpenToClosed | Transition::ClosedToOpen if resync_direction => full_resequence,
        Transition::OpenToClosed | Transition::ClosedToOpen => vec![UpdateSetpoints, enable],
    }
}
