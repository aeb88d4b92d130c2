// ESC serial protocol: fixed 9-byte frames
//
// Frame format: [Start, Command, Parameter, 0x00, Value (u32 BE, 4 bytes), Checksum]
// Checksum is the sum of the first 8 bytes modulo 256.

/// Every frame in either direction is exactly this long
pub const FRAME_LEN: usize = 9;

/// Start byte of frames we send to the ESC
pub const START_OUTBOUND: u8 = 0x89;

/// Start byte of status frames the ESC sends back
pub const START_INBOUND: u8 = 0xEE;

/// Inbound command codes are offset by this amount
pub const INBOUND_COMMAND_OFFSET: u8 = 0x80;

/// Motor-control bitmask bits
pub const MOTOR_RUN: u32 = 1 << 0;
pub const MOTOR_CLOSED_LOOP: u32 = 1 << 1;

/// Command set
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ParameterWrite = 0x06,
    MotorControl = 0x08,
}

impl Command {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x06 => Some(Command::ParameterWrite),
            0x08 => Some(Command::MotorControl),
            _ => None,
        }
    }
}

/// Parameter addresses written with `Command::ParameterWrite`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Unused parameter field of motor-control frames
    Unused = 0x00,
    OpenLoopSetpoint = 0x0C, // Q16.16, fraction of supply
    ClosedLoopSetpoint = 0x0E, // Q16.16, rpm
    Reverse = 0x63,          // 0=normal, 1=reverse
}

impl Parameter {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Parameter::Unused),
            0x0C => Some(Parameter::OpenLoopSetpoint),
            0x0E => Some(Parameter::ClosedLoopSetpoint),
            0x63 => Some(Parameter::Reverse),
            _ => None,
        }
    }
}

/// Error types for ESC communication
#[derive(Debug, thiserror::Error)]
pub enum EscError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Peripheral bus is closed")]
    BusClosed,
}

pub type Result<T> = std::result::Result<T, EscError>;

/// A raw 9-byte frame
pub type Frame = [u8; FRAME_LEN];

/// Sum of the first 8 bytes modulo 256
pub fn checksum(data: &[u8]) -> u8 {
    data.iter()
        .take(FRAME_LEN - 1)
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build an outbound frame
pub fn build_frame(command: Command, parameter: Parameter, value: u32) -> Frame {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = START_OUTBOUND;
    frame[1] = command as u8;
    frame[2] = parameter as u8;
    // frame[3] is reserved
    frame[4..8].copy_from_slice(&value.to_be_bytes());
    frame[8] = checksum(&frame);
    frame
}

/// True if the last byte matches the checksum of the first 8
pub fn checksum_valid(frame: &Frame) -> bool {
    checksum(frame) == frame[FRAME_LEN - 1]
}

/// The 32-bit big-endian value field
pub fn frame_value(frame: &Frame) -> u32 {
    u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // 0x89 + 0x08 + 0x00 + 0x00 + 0x00 + 0x00 + 0x00 + 0x01 = 0x92
        let data = [0x89u8, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(checksum(&data), 0x92);
    }

    #[test]
    fn test_checksum_wraps() {
        let data = [0xFFu8; 8];
        // 8 * 255 = 2040 = 0x7F8
        assert_eq!(checksum(&data), 0xF8);
    }

    #[test]
    fn test_checksum_ignores_trailing_byte() {
        let mut frame = [1u8; FRAME_LEN];
        assert_eq!(checksum(&frame), 8);
        frame[8] = 0xAA;
        assert_eq!(checksum(&frame), 8);
    }

    #[test]
    fn test_build_frame() {
        let frame = build_frame(Command::ParameterWrite, Parameter::Reverse, 1);
        assert_eq!(frame.len(), 9);
        assert_eq!(frame[0], 0x89);
        assert_eq!(frame[1], 0x06);
        assert_eq!(frame[2], 0x63);
        assert_eq!(frame[3], 0x00);
        assert_eq!(&frame[4..8], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(frame[8], 0x89u8.wrapping_add(0x06).wrapping_add(0x63).wrapping_add(1));
        assert!(checksum_valid(&frame));
    }

    #[test]
    fn test_value_is_big_endian() {
        let frame = build_frame(
            Command::ParameterWrite,
            Parameter::ClosedLoopSetpoint,
            0x1234_5678,
        );
        assert_eq!(&frame[4..8], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(frame_value(&frame), 0x1234_5678);
    }

    #[test]
    fn test_single_bit_flip_fails_validation() {
        let frame = build_frame(Command::ParameterWrite, Parameter::OpenLoopSetpoint, 0x0000_4CCD);
        for byte in 0..FRAME_LEN {
            for bit in 0..8 {
                let mut corrupted = frame;
                corrupted[byte] ^= 1 << bit;
                assert!(
                    !checksum_valid(&corrupted),
                    "flip of bit {} in byte {} went undetected",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_code_lookup() {
        assert_eq!(Command::from_code(0x08), Some(Command::MotorControl));
        assert_eq!(Command::from_code(0x07), None);
        assert_eq!(Parameter::from_code(0x0E), Some(Parameter::ClosedLoopSetpoint));
        assert_eq!(Parameter::from_code(0x42), None);
    }
}
