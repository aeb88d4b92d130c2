// Q16.16 fixed-point codec used for every setpoint on the ESC wire
//
// The ESC firmware stores setpoints as signed 32-bit Q16.16 values. On the wire
// the raw i32 is sent as its two's-complement u32 bit pattern, big-endian.

use serde::Serialize;

/// Number of fractional bits
const FRAC_BITS: u32 = 16;

/// 1.0 in Q16.16
const ONE: f64 = (1u32 << FRAC_BITS) as f64;

/// A Q16.16 fixed-point number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Fix16(i32);

impl Fix16 {
    pub const ZERO: Fix16 = Fix16(0);

    /// Smallest representable step (one unit of quantization)
    pub const EPSILON: f32 = (1.0 / ONE) as f32;

    /// Convert a real value, rounding half away from zero.
    /// Values outside the Q16.16 range saturate.
    pub fn from_f32(value: f32) -> Self {
        // `as` saturates on overflow and maps NaN to 0
        Fix16((value as f64 * ONE).round() as i32)
    }

    pub fn to_f32(self) -> f32 {
        (self.0 as f64 / ONE) as f32
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    /// Bit pattern sent in the 32-bit value field of a frame
    pub fn to_wire(self) -> u32 {
        self.0 as u32
    }

    pub fn from_wire(value: u32) -> Self {
        Fix16(value as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(Fix16::from_f32(1.0).raw(), 0x0001_0000);
        assert_eq!(Fix16::from_f32(0.5).raw(), 0x0000_8000);
        assert_eq!(Fix16::from_f32(-1.0).raw(), -0x0001_0000);
        assert_eq!(Fix16::from_f32(500.0).raw(), 500 << 16);
    }

    #[test]
    fn test_round_trip_within_one_quantum() {
        for &v in &[0.0f32, 0.02, 0.125, 0.3, 1.0, 437.5, 1234.567, 4000.0, -0.75] {
            let back = Fix16::from_f32(v).to_f32();
            assert!(
                (back - v).abs() <= Fix16::EPSILON,
                "{} came back as {}",
                v,
                back
            );
        }
    }

    #[test]
    fn test_wire_is_twos_complement() {
        let neg = Fix16::from_f32(-1.0);
        assert_eq!(neg.to_wire(), 0xFFFF_0000);
        assert_eq!(Fix16::from_wire(0xFFFF_0000), neg);
    }

    #[test]
    fn test_saturates() {
        assert_eq!(Fix16::from_f32(1.0e9).raw(), i32::MAX);
        assert_eq!(Fix16::from_f32(-1.0e9).raw(), i32::MIN);
        assert_eq!(Fix16::from_f32(f32::NAN), Fix16::ZERO);
    }
}
