// Throttle magnitude -> ESC setpoints
//
// Both setpoints are computed every tick so the ESC always has a fresh value
// for whichever control law it is running.

use serde::{Deserialize, Serialize};

use super::fixed::Fix16;
use super::regime::Regime;

/// Setpoint ranges for the two control laws.
///
/// Open-loop values are a fraction of supply voltage, closed-loop values are rpm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscTuning {
    pub open_loop_min: f32,
    pub open_loop_max: f32,
    /// Safety ceiling, below `open_loop_max`
    pub open_loop_ceiling: f32,
    pub closed_loop_min: f32,
    pub closed_loop_max: f32,
    /// Lowest speed the closed-loop controller is stable at
    pub closed_loop_floor: f32,
}

impl Default for EscTuning {
    fn default() -> Self {
        Self {
            open_loop_min: 0.0,
            open_loop_max: 1.0,
            open_loop_ceiling: 0.3,
            closed_loop_min: 0.0,
            closed_loop_max: 4000.0,
            closed_loop_floor: 500.0,
        }
    }
}

/// Setpoints for one tick, as real values and as wire values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Setpoints {
    pub open_loop: f32,
    pub closed_loop: f32,
    pub open_loop_fixed: Fix16,
    pub closed_loop_fixed: Fix16,
}

impl Setpoints {
    fn new(open_loop: f32, closed_loop: f32) -> Self {
        Self {
            open_loop,
            closed_loop,
            open_loop_fixed: Fix16::from_f32(open_loop),
            closed_loop_fixed: Fix16::from_f32(closed_loop),
        }
    }
}

/// Linear map of `x` from [0, 1] onto [min, max]
fn lerp(x: f32, min: f32, max: f32) -> f32 {
    min + x * (max - min)
}

impl EscTuning {
    /// Check the ranges make sense: all finite, each min no larger than its
    /// max, the open-loop ceiling below the open-loop max and a positive
    /// closed-loop floor.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("open_loop_min", self.open_loop_min),
            ("open_loop_max", self.open_loop_max),
            ("open_loop_ceiling", self.open_loop_ceiling),
            ("closed_loop_min", self.closed_loop_min),
            ("closed_loop_max", self.closed_loop_max),
            ("closed_loop_floor", self.closed_loop_floor),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{} is not finite ({})", name, value));
        }
        if self.open_loop_min > self.open_loop_max {
            return Err(format!(
                "open_loop_min {} exceeds open_loop_max {}",
                self.open_loop_min, self.open_loop_max
            ));
        }
        if self.closed_loop_min > self.closed_loop_max {
            return Err(format!(
                "closed_loop_min {} exceeds closed_loop_max {}",
                self.closed_loop_min, self.closed_loop_max
            ));
        }
        if self.open_loop_ceiling >= self.open_loop_max {
            return Err(format!(
                "open_loop_ceiling {} must be below open_loop_max {}",
                self.open_loop_ceiling, self.open_loop_max
            ));
        }
        if self.closed_loop_floor <= 0.0 {
            return Err(format!(
                "closed_loop_floor {} must be above zero",
                self.closed_loop_floor
            ));
        }
        Ok(())
    }

    /// Setpoints for a throttle magnitude. Zero when the regime is Off.
    pub fn map_setpoints(&self, magnitude: f32, regime: Regime) -> Setpoints {
        if regime == Regime::Off {
            return Setpoints::default();
        }

        let open_loop = lerp(magnitude, self.open_loop_min, self.open_loop_max)
            .min(self.open_loop_ceiling);
        let closed_loop = lerp(magnitude, self.closed_loop_min, self.closed_loop_max)
            .max(self.closed_loop_floor);

        Setpoints::new(open_loop, closed_loop)
    }
}
