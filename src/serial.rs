// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::io::Write;
use std::time::Duration;
use serialport::{DataBits, Parity, StopBits};
use crate::error::LoadError;

// ============================================================================
// SerialPort Trait
// ============================================================================

/// The only operation the loader needs from a transport: a blocking write
/// that returns once every byte has been handed to the driver.
pub trait SerialPort: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;
}

// ============================================================================
// Line Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for LineSettings {
    fn default() -> Self {
        LineSettings {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl LineSettings {
    pub fn parse(data_bits: u8, parity: &str, stop_bits: u8) -> Result<Self, LoadError> {
        let data_bits = match data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            _ => return Err(invalid("data bits", format!("{}. Must be 5, 6, 7, or 8", data_bits))),
        };

        let parity = match parity.to_lowercase().as_str() {
            "none" => Parity::None,
            "odd" => Parity::Odd,
            "even" => Parity::Even,
            _ => return Err(invalid("parity", format!("{}. Must be 'none', 'odd', or 'even'", parity))),
        };

        let stop_bits = match stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            _ => return Err(invalid("stop bits", format!("{}. Must be 1 or 2", stop_bits))),
        };

        Ok(LineSettings { data_bits, parity, stop_bits })
    }
}

fn invalid(name: &'static str, reason: String) -> LoadError {
    LoadError::InvalidArgument { name, reason }
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Wraps a port opened through the serialport crate
pub struct RealSerialPort {
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    pub fn open(device: &str, baud_rate: u32, line: LineSettings) -> Result<Self, LoadError> {
        let port = serialport::new(device, baud_rate)
            .data_bits(line.data_bits)
            .parity(line.parity)
            .stop_bits(line.stop_bits)
            .timeout(Duration::from_secs(2))
            .open()
            .map_err(|source| LoadError::TransportOpen {
                device: device.to_string(),
                source,
            })?;

        log::debug!("opened {} at {} baud ({:?}, {:?}, {:?})",
            device, baud_rate, line.data_bits, line.parity, line.stop_bits);
        Ok(RealSerialPort { port })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

#[cfg(test)]
pub struct MockSerialPort {
    // One entry per successful write_all call
    write_log: Vec<Vec<u8>>,
    expected_writes: Vec<Vec<u8>>,
    // Zero-based write call that returns an error
    fail_at: Option<usize>,
    calls: usize,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(expected_writes: Vec<Vec<u8>>) -> Self {
        MockSerialPort {
            write_log: Vec::new(),
            expected_writes,
            fail_at: None,
            calls: 0,
        }
    }

    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }
}

#[cfg(test)]
impl SerialPort for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Mock write failure",
            ));
        }
        self.write_log.push(buf.to_vec());
        Ok(())
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockSerialPort write log mismatch!\nExpected {} writes:\n{:02X?}\nGot {} writes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );
    }
}
