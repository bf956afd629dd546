//! Serial link to the clicker receiver
//!
//! Port discovery by vendor string, the byte source the bridge polls, and
//! line reassembly across bounded reads.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::{ErrorKind, Read};
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{BridgeError, Result};

/// Source of raw bytes polled by the bridge
pub trait ByteSource {
    /// Number of bytes ready to read without blocking
    fn bytes_waiting(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes; a timeout reads nothing
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl ByteSource for Box<dyn SerialPort> {
    fn bytes_waiting(&mut self) -> Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_or_timeout(self, buf)
    }
}

/// Read into `buf`, treating a timeout as zero bytes read
pub fn read_or_timeout<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    match reader.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Whether a port's name or USB descriptors contain `vendor`
pub fn port_matches(info: &SerialPortInfo, vendor: &str) -> bool {
    let needle = vendor.to_lowercase();
    let contains = |s: &str| s.to_lowercase().contains(&needle);

    if contains(&info.port_name) {
        return true;
    }

    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            usb.manufacturer.as_deref().is_some_and(contains)
                || usb.product.as_deref().is_some_and(contains)
                || contains(&format!("{:04X}:{:04X}", usb.vid, usb.pid))
        }
        _ => false,
    }
}

/// Human-readable description of a port, for listings
pub fn describe_port(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} [USB {:04X}:{:04X}] {} {}",
            info.port_name,
            usb.vid,
            usb.pid,
            usb.manufacturer.as_deref().unwrap_or(""),
            usb.product.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string(),
        SerialPortType::PciPort => format!("{} [PCI]", info.port_name),
        SerialPortType::BluetoothPort => format!("{} [Bluetooth]", info.port_name),
        SerialPortType::Unknown => info.port_name.clone(),
    }
}

/// List the serial ports present on the system
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    Ok(serialport::available_ports()?)
}

/// First port among `ports` matching `vendor`
pub fn find_port<'a>(ports: &'a [SerialPortInfo], vendor: &str) -> Option<&'a SerialPortInfo> {
    ports.iter().find(|info| port_matches(info, vendor))
}

/// Locate and open the clicker's serial port
pub fn open(config: &SerialConfig) -> Result<Box<dyn SerialPort>> {
    let path = match &config.port {
        Some(path) => path.clone(),
        None => {
            let ports = list_ports()?;
            debug!("Found {} serial ports", ports.len());
            find_port(&ports, &config.vendor)
                .map(|info| info.port_name.clone())
                .ok_or_else(|| BridgeError::SerialNotFound {
                    port: config.vendor.clone(),
                })?
        }
    };

    info!("Opening serial port {} at {} baud", path, config.baud_rate);

    serialport::new(&path, config.baud_rate)
        .timeout(config.read_timeout())
        .open()
        .map_err(|e| open_error(&path, e))
}

/// A missing device is reported as absent hardware, anything else as transport
fn open_error(path: &str, e: serialport::Error) -> BridgeError {
    match e.kind() {
        serialport::ErrorKind::NoDevice
        | serialport::ErrorKind::Io(ErrorKind::NotFound) => BridgeError::SerialNotFound {
            port: path.to_string(),
        },
        _ => e.into(),
    }
}

/// Reassembles newline-terminated lines from arbitrary byte chunks
///
/// Bytes after the last newline are held until the next chunk completes
/// them. A line that is not valid UTF-8 is dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_pending: usize,
}

impl LineSplitter {
    /// Partial lines longer than `max_pending` bytes are discarded
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending,
        }
    }

    /// Feed a chunk and return every line it completes, without the newline
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            let raw = std::mem::take(&mut self.pending);
            match String::from_utf8(raw) {
                Ok(line) => lines.push(line),
                Err(e) => debug!("Skipping line with invalid UTF-8: {}", e),
            }
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        if self.max_pending > 0 && self.pending.len() > self.max_pending {
            debug!(
                "Discarding {} bytes without a line break",
                self.pending.len()
            );
            self.pending.clear();
        }

        lines
    }

    /// Bytes held while waiting for a newline
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}
