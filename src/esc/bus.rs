// Peripheral bus: byte-level transport between the runtime and the ESC

use serialport::{self, SerialPort};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use super::protocol::{EscError, Result};

/// Default serial configuration for the ESC
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 10;

/// Byte transport to the ESC.
///
/// Implementations must not block: `write` sends one whole frame and
/// `read_available` returns `Ok(None)` when nothing is pending.
pub trait PeripheralBus {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn read_available(&mut self) -> Result<Option<u8>>;
}

/// ESC attached to a serial port
pub struct SerialBus {
    port: Box<dyn SerialPort>,
}

impl SerialBus {
    /// Open a new connection to the ESC
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }
}

impl PeripheralBus for SerialBus {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Option<u8>> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Ok(Some(byte[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(EscError::Io(e)),
        }
    }
}

/// Frames kept by `RecordingBus` before the oldest are dropped
pub const RECORD_LIMIT: usize = 1024;

/// In-memory bus used for simulation and tests.
///
/// Records written frames (up to `RECORD_LIMIT`) and replays queued inbound bytes.
#[derive(Debug, Default)]
pub struct RecordingBus {
    written: VecDeque<Vec<u8>>,
    inbound: VecDeque<u8>,
    fail_writes: bool,
    fail_write_at: Option<usize>,
    write_attempts: usize,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far, oldest first
    pub fn written(&self) -> &VecDeque<Vec<u8>> {
        &self.written
    }

    /// Drain recorded frames
    pub fn take_written(&mut self) -> Vec<Vec<u8>> {
        Vec::from(std::mem::take(&mut self.written))
    }

    /// Queue bytes to be returned by `read_available`
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Make every subsequent write fail (nothing is recorded)
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Fail only the write attempt with this index (0 = the next write)
    pub fn fail_write_at(&mut self, index: usize) {
        self.fail_write_at = Some(self.write_attempts + index);
    }
}

impl PeripheralBus for RecordingBus {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let attempt = self.write_attempts;
        self.write_attempts += 1;
        if self.fail_writes || self.fail_write_at == Some(attempt) {
            return Err(EscError::BusClosed);
        }
        if self.written.len() == RECORD_LIMIT {
            self.written.pop_front();
        }
        self.written.push_back(bytes.to_vec());
        Ok(())
    }

    fn read_available(&mut self) -> Result<Option<u8>> {
        Ok(self.inbound.pop_front())
    }
}

impl<B: PeripheralBus + ?Sized> PeripheralBus for &mut B {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_available(&mut self) -> Result<Option<u8>> {
        (**self).read_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_bus_records_writes() {
        let mut bus = RecordingBus::new();
        bus.write(&[1, 2, 3]).unwrap();
        bus.write(&[4]).unwrap();
        assert_eq!(bus.written(), &[vec![1u8, 2, 3], vec![4u8]]);
        assert_eq!(bus.take_written().len(), 2);
        assert!(bus.written().is_empty());
    }

    #[test]
    fn test_recording_bus_replays_inbound() {
        let mut bus = RecordingBus::new();
        assert_eq!(bus.read_available().unwrap(), None);
        bus.push_inbound(&[0xEE, 0x01]);
        assert_eq!(bus.read_available().unwrap(), Some(0xEE));
        assert_eq!(bus.read_available().unwrap(), Some(0x01));
        assert_eq!(bus.read_available().unwrap(), None);
    }

    #[test]
    fn test_recording_bus_is_bounded() {
        let mut bus = RecordingBus::new();
        for i in 0..RECORD_LIMIT + 10 {
            bus.write(&(i as u32).to_be_bytes()).unwrap();
        }
        assert_eq!(bus.written().len(), RECORD_LIMIT);
        assert_eq!(bus.written()[0], 10u32.to_be_bytes().to_vec());
    }

    #[test]
    fn test_recording_bus_fails_one_write() {
        let mut bus = RecordingBus::new();
        bus.write(&[0]).unwrap();
        bus.fail_write_at(1);
        bus.write(&[1]).unwrap();
        assert!(bus.write(&[2]).is_err());
        bus.write(&[3]).unwrap();
        assert_eq!(bus.take_written(), vec![vec![0u8], vec![1u8], vec![3u8]]);
    }

    #[test]
    fn test_recording_bus_failing_writes() {
        let mut bus = RecordingBus::new();
        bus.set_fail_writes(true);
        assert!(matches!(bus.write(&[1]), Err(EscError::BusClosed)));
        assert!(bus.written().is_empty());
    }
}
