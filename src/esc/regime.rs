// Control regime classification
//
// Throttle magnitude selects which control law drives the motor:
//   [0, DEADZONE)                -> Off
//   [DEADZONE, TRANSITION_POINT) -> OpenLoop
//   [TRANSITION_POINT, ..)       -> ClosedLoop

use serde::Serialize;

/// Below this magnitude the motor is off
pub const DEADZONE: f32 = 0.02;

/// At or above this magnitude the ESC runs closed-loop
pub const TRANSITION_POINT: f32 = 0.125;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    #[default]
    Off,
    OpenLoop,
    ClosedLoop,
}

impl Regime {
    pub fn from_magnitude(magnitude: f32) -> Self {
        if magnitude < DEADZONE {
            Regime::Off
        } else if magnitude < TRANSITION_POINT {
            Regime::OpenLoop
        } else {
            Regime::ClosedLoop
        }
    }

    pub fn is_on(self) -> bool {
        self != Regime::Off
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    None,
    OffToOn,
    OnToOff,
    OpenToClosed,
    ClosedToOpen,
}

impl Transition {
    /// Transition from `previous` to `current`. Defined for every pair.
    pub fn between(previous: Regime, current: Regime) -> Self {
        use Regime::*;

        match (previous, current) {
            (Off, Off) | (OpenLoop, OpenLoop) | (ClosedLoop, ClosedLoop) => Transition::None,
            (Off, OpenLoop) | (Off, ClosedLoop) => Transition::OffToOn,
            (OpenLoop, Off) | (ClosedLoop, Off) => Transition::OnToOff,
            (OpenLoop, ClosedLoop) => Transition::OpenToClosed,
            (ClosedLoop, OpenLoop) => Transition::ClosedToOpen,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Normal,
    Reverse,
}

impl Direction {
    pub fn from_throttle(throttle: f32) -> Self {
        if throttle < 0.0 {
            Direction::Reverse
        } else {
            Direction::Normal
        }
    }
}

/// Classify a throttle magnitude against the previous tick's regime
pub fn classify(magnitude: f32, previous: Regime) -> (Regime, Transition) {
    let regime = Regime::from_magnitude(magnitude);
    (regime, Transition::between(previous, regime))
}
