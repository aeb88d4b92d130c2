// Message types exchanged with the rest of the vehicle

use serde::{Deserialize, Serialize};

// Throttle command from the pilot/scripts -> runtime, as it arrives on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleMessage {
    /// Percent of full scale, -100..=100
    pub throttle: i32,
}

/// Throttle percentage that has passed range validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePercent(i8);

impl ThrottlePercent {
    pub const ZERO: ThrottlePercent = ThrottlePercent(0);

    /// `None` for anything outside -100..=100
    pub fn new(percent: i32) -> Option<Self> {
        if (-100..=100).contains(&percent) {
            Some(ThrottlePercent(percent as i8))
        } else {
            None
        }
    }

    pub fn percent(self) -> i8 {
        self.0
    }

    /// Throttle as a fraction in [-1.0, 1.0]
    pub fn as_fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

/// Validated command for the ESC runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscCommand {
    Throttle(ThrottlePercent),
}

impl TryFrom<&ThrottleMessage> for EscCommand {
    type Error = i32;

    /// Fails with the offending value when it is out of range
    fn try_from(msg: &ThrottleMessage) -> Result<Self, Self::Error> {
        ThrottlePercent::new(msg.throttle)
            .map(EscCommand::Throttle)
            .ok_or(msg.throttle)
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_range() {
        assert_eq!(ThrottlePercent::new(100).map(|t| t.percent()), Some(100));
        assert_eq!(ThrottlePercent::new(-100).map(|t| t.percent()), Some(-100));
        assert_eq!(ThrottlePercent::new(101), None);
        assert_eq!(ThrottlePercent::new(-101), None);
        assert_eq!(ThrottlePercent::new(i32::MAX), None);
    }

    #[test]
    fn test_fraction() {
        assert_eq!(ThrottlePercent::new(50).unwrap().as_fraction(), 0.5);
        assert_eq!(ThrottlePercent::new(-25).unwrap().as_fraction(), -0.25);
        assert_eq!(ThrottlePercent::ZERO.as_fraction(), 0.0);
    }

    #[test]
    fn test_command_from_json() {
        let msg: ThrottleMessage = serde_json::from_str(r#"{"throttle": -30}"#).unwrap();
        assert_eq!(
            EscCommand::try_from(&msg),
            Ok(EscCommand::Throttle(ThrottlePercent::new(-30).unwrap()))
        );

        let msg: ThrottleMessage = serde_json::from_str(r#"{"throttle": 150}"#).unwrap();
        assert_eq!(EscCommand::try_from(&msg), Err(150));
    }

    #[test]
    fn test_health_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(), r#""cmd_stale""#);
    }
}
