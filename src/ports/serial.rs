//! Serial port traits
//!
//! Split into two traits:
//! - `SerialFactory`: static methods for listing and opening ports
//! - `SerialConnection`: instance methods for reading/writing data

use std::time::Duration;

use crate::domain::{RigError, RigResult, SerialPortInfo};

/// Read attempts before a short reply is reported. Each attempt is bounded
/// by the port's own read timeout.
const REPLY_READ_ATTEMPTS: usize = 3;

/// Factory for creating serial connections.
pub trait SerialFactory {
    /// List available serial ports on the system
    fn list_ports() -> RigResult<Vec<SerialPortInfo>>;

    /// Open a serial port at 8N1, no flow control, returning a boxed connection
    fn open(port: &str, baud_rate: u32, timeout: Duration) -> RigResult<Box<dyn SerialConnection>>;
}

/// Trait for an open serial port connection.
/// Only requires `Send` (not `Sync`); always accessed behind a Mutex.
pub trait SerialConnection: Send {
    /// Write bytes to the port
    fn write(&mut self, data: &[u8]) -> RigResult<usize>;

    /// Read bytes from the port (with timeout)
    fn read(&mut self, buffer: &mut [u8]) -> RigResult<usize>;

    /// Write every byte of `data`, failing if the port accepts fewer
    fn write_all(&mut self, data: &[u8]) -> RigResult<()> {
        let n = self.write(data)?;
        if n != data.len() {
            return Err(RigError::Io(format!(
                "Short write: {n} of {} bytes accepted",
                data.len()
            )));
        }
        Ok(())
    }

    /// Read exactly `len` reply bytes.
    ///
    /// A single serial read may return fewer bytes than asked for, so keep
    /// reading until the reply is complete or the attempts run out.
    fn read_reply(&mut self, len: usize) -> RigResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut total = 0;

        for _ in 0..REPLY_READ_ATTEMPTS {
            if total == len {
                break;
            }
            match self.read(&mut buf[total..])? {
                0 => {} // Zero bytes: read timed out, try again
                n => total += n,
            }
        }

        if total != len {
            return Err(RigError::Protocol(format!(
                "Expected {len} reply byte(s), got {total}"
            )));
        }
        Ok(buf)
    }

    /// Close the connection
    fn close(&mut self) -> RigResult<()>;

    /// Check if the port is still connected
    fn is_connected(&self) -> bool;
}
