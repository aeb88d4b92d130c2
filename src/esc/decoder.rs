// Inbound side of the ESC protocol
//
// The ESC streams status frames asynchronously. Bytes are fed in one at a time;
// anything before a 0xEE start byte is dropped, so a corrupted or truncated
// frame resynchronizes on the next start byte.

use serde::Serialize;
use tracing::{debug, warn};

use super::fixed::Fix16;
use super::protocol::{
    checksum_valid, frame_value, Command, Frame, Parameter, FRAME_LEN, INBOUND_COMMAND_OFFSET,
    MOTOR_CLOSED_LOOP, MOTOR_RUN, START_INBOUND,
};

/// Decoded status reported by the ESC
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscStatus {
    /// Current motor-control flags
    MotorControl { running: bool, closed_loop: bool },
    /// Current value of a parameter, interpreted as Q16.16
    Parameter { parameter: u8, raw: u32, value: f32 },
    /// Command code we do not know
    Unknown { code: u8, raw: u32 },
}

impl EscStatus {
    /// Interpret a checksum-valid frame
    pub fn from_frame(frame: &Frame) -> Self {
        let code = frame[1].wrapping_sub(INBOUND_COMMAND_OFFSET);
        let raw = frame_value(frame);

        match Command::from_code(code) {
            Some(Command::MotorControl) => EscStatus::MotorControl {
                running: raw & MOTOR_RUN != 0,
                closed_loop: raw & MOTOR_CLOSED_LOOP != 0,
            },
            Some(Command::ParameterWrite) => EscStatus::Parameter {
                parameter: frame[2],
                raw,
                value: Fix16::from_wire(raw).to_f32(),
            },
            None => EscStatus::Unknown { code, raw },
        }
    }

    /// False for frames carrying a command code we do not know
    pub fn is_known(&self) -> bool {
        !matches!(self, EscStatus::Unknown { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Seeking,
    Accumulating,
}

/// Byte-at-a-time frame accumulator
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    buffer: Frame,
    len: usize,
    checksum_errors: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Seeking,
            buffer: [0u8; FRAME_LEN],
            len: 0,
            checksum_errors: 0,
        }
    }

    /// Feed one byte. Returns the decoded status when this byte completes a
    /// valid frame.
    pub fn on_byte(&mut self, byte: u8) -> Option<EscStatus> {
        match self.state {
            DecoderState::Seeking => {
                if byte == START_INBOUND {
                    self.buffer[0] = byte;
                    self.len = 1;
                    self.state = DecoderState::Accumulating;
                }
                None
            }
            DecoderState::Accumulating => {
                self.buffer[self.len] = byte;
                self.len += 1;
                if self.len < FRAME_LEN {
                    return None;
                }

                self.reset();
                if !checksum_valid(&self.buffer) {
                    self.checksum_errors = self.checksum_errors.wrapping_add(1);
                    debug!("Dropping status frame with bad checksum: {:02X?}", self.buffer);
                    return None;
                }

                let status = EscStatus::from_frame(&self.buffer);
                log_status(&status);
                Some(status)
            }
        }
    }

    /// Feed a slice, collecting every completed status
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<EscStatus> {
        bytes.iter().filter_map(|&b| self.on_byte(b)).collect()
    }

    /// True while waiting for a start byte
    pub fn is_seeking(&self) -> bool {
        self.state == DecoderState::Seeking
    }

    /// Frames dropped for a checksum mismatch since creation
    pub fn checksum_errors(&self) -> u32 {
        self.checksum_errors
    }

    fn reset(&mut self) {
        self.state = DecoderState::Seeking;
        self.len = 0;
    }
}

fn log_status(status: &EscStatus) {
    match *status {
        EscStatus::MotorControl { running, closed_loop } => {
            debug!("ESC status: running={} closed_loop={}", running, closed_loop)
        }
        EscStatus::Parameter { parameter, value, .. } => match Parameter::from_code(parameter) {
            Some(p) => debug!("ESC status: {:?} = {}", p, value),
            None => debug!("ESC status: parameter 0x{:02X} = {}", parameter, value),
        },
        EscStatus::Unknown { code, raw } => {
            warn!("ESC status with unknown command 0x{:02X} (value 0x{:08X})", code, raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esc::protocol::checksum;

    fn status_frame(command: u8, parameter: u8, value: u32) -> Frame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = START_INBOUND;
        frame[1] = command.wrapping_add(INBOUND_COMMAND_OFFSET);
        frame[2] = parameter;
        frame[4..8].copy_from_slice(&value.to_be_bytes());
        frame[8] = checksum(&frame);
        frame
    }

    #[test]
    fn test_garbage_without_sentinel_never_completes() {
        let mut decoder = FrameDecoder::new();
        let garbage: Vec<u8> = (0..=255u8)
            .filter(|&b| b != START_INBOUND)
            .cycle()
            .take(2000)
            .collect();
        assert!(decoder.feed(&garbage).is_empty());
        assert!(decoder.is_seeking());
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut decoder = FrameDecoder::new();
        let mut stream = vec![0x00, 0x13, 0x89, 0xFF, 0x42];
        stream.extend_from_slice(&status_frame(0x08, 0x00, MOTOR_RUN));

        let statuses = decoder.feed(&stream);
        assert_eq!(
            statuses,
            vec![EscStatus::MotorControl { running: true, closed_loop: false }]
        );
        assert!(decoder.is_seeking());
    }

    #[test]
    fn test_frame_completes_on_last_byte_only() {
        let mut decoder = FrameDecoder::new();
        let frame = status_frame(0x08, 0x00, MOTOR_RUN | MOTOR_CLOSED_LOOP);
        for &b in &frame[..FRAME_LEN - 1] {
            assert_eq!(decoder.on_byte(b), None);
        }
        assert_eq!(
            decoder.on_byte(frame[FRAME_LEN - 1]),
            Some(EscStatus::MotorControl { running: true, closed_loop: true })
        );
    }

    #[test]
    fn test_bad_checksum_is_dropped() {
        let mut decoder = FrameDecoder::new();
        let mut frame = status_frame(0x06, 0x0E, 0x01F4_0000);
        frame[8] ^= 0x01;

        assert!(decoder.feed(&frame).is_empty());
        assert_eq!(decoder.checksum_errors(), 1);
        assert!(decoder.is_seeking());

        // The next good frame still decodes
        let good = status_frame(0x06, 0x0E, 0x01F4_0000);
        assert_eq!(decoder.feed(&good).len(), 1);
    }

    #[test]
    fn test_parameter_status_is_fixed_point() {
        let mut decoder = FrameDecoder::new();
        let statuses = decoder.feed(&status_frame(0x06, 0x0E, 0x01F4_0000));
        assert_eq!(
            statuses,
            vec![EscStatus::Parameter { parameter: 0x0E, raw: 0x01F4_0000, value: 500.0 }]
        );
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let mut decoder = FrameDecoder::new();
        let statuses = decoder.feed(&status_frame(0x21, 0x00, 7));
        assert_eq!(statuses, vec![EscStatus::Unknown { code: 0x21, raw: 7 }]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut decoder = FrameDecoder::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(&status_frame(0x08, 0x00, 0));
        stream.extend_from_slice(&status_frame(0x06, 0x63, 1));
        assert_eq!(decoder.feed(&stream).len(), 2);
    }
}
