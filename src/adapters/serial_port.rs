//! Serial line adapter using the `serialport` crate
//!
//! The AR7030 remote port runs 1200 baud 8N1 with no handshake lines.
//! `SerialPortFactory` has no instance data, just associated functions for
//! listing and opening ports.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPortType, StopBits};

use crate::domain::{RigError, RigResult, SerialPortInfo};
use crate::ports::{SerialConnection, SerialFactory};

pub struct SerialPortFactory;

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => match &info.product {
            Some(product) => format!("USB {product} ({:04X}:{:04X})", info.vid, info.pid),
            None => format!("USB ({:04X}:{:04X})", info.vid, info.pid),
        },
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "Native".to_string(),
    }
}

impl SerialFactory for SerialPortFactory {
    fn list_ports() -> RigResult<Vec<SerialPortInfo>> {
        let ports = serialport::available_ports()
            .map_err(|e| RigError::Io(format!("Failed to list ports: {e}")))?;
        log::debug!("Found {} serial port(s)", ports.len());

        Ok(ports
            .into_iter()
            .map(|p| SerialPortInfo {
                port_type: describe(&p.port_type),
                name: p.port_name,
            })
            .collect())
    }

    fn open(port: &str, baud_rate: u32, timeout: Duration) -> RigResult<Box<dyn SerialConnection>> {
        let line = serialport::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| RigError::Io(format!("Failed to open {port}: {e}")))?;

        // Bytes left over from an earlier session would be taken as replies
        line.clear(ClearBuffer::All)
            .map_err(|e| RigError::Io(format!("Failed to clear {port}: {e}")))?;

        log::info!("Opened {port} at {baud_rate} baud 8N1, timeout {timeout:?}");

        Ok(Box::new(SerialPortConnection {
            name: port.to_string(),
            line: Some(line),
        }))
    }
}

/// An open serial line. `None` once closed.
pub struct SerialPortConnection {
    name: String,
    line: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialPortConnection {
    fn line(&mut self) -> RigResult<&mut Box<dyn serialport::SerialPort>> {
        self.line
            .as_mut()
            .ok_or_else(|| RigError::Io(format!("{} is closed", self.name)))
    }
}

impl SerialConnection for SerialPortConnection {
    fn write(&mut self, data: &[u8]) -> RigResult<usize> {
        let line = self.line()?;
        let n = line
            .write(data)
            .map_err(|e| RigError::Io(format!("Write failed: {e}")))?;
        // Each opcode must be on the wire before the post-write delay starts
        line.flush()
            .map_err(|e| RigError::Io(format!("Flush failed: {e}")))?;
        Ok(n)
    }

    fn read(&mut self, buffer: &mut [u8]) -> RigResult<usize> {
        match self.line()?.read(buffer) {
            Ok(n) => Ok(n),
            // Timed out with nothing to read; read_reply decides whether to retry
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(RigError::Io(format!("Read failed: {e}"))),
        }
    }

    fn close(&mut self) -> RigResult<()> {
        if self.line.take().is_some() {
            log::info!("Closed {}", self.name);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.line.is_some()
    }
}
