// src/io/mod.rs
//
// Serial link plumbing: the event types flowing from the ingest worker to
// the dispatcher, and system port enumeration.

pub mod reader;

pub use reader::{SerialReader, SessionConfig};

use serde::Serialize;
use std::fmt;

use crate::error::LinkError;

/// Fixed baud rate of the survey firmware's serial console.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Link lifecycle status, as reported by the ingest worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum LinkStatus {
    Connected { port: String, baud: u32 },
    /// Terminal status for a session — emitted exactly once per worker,
    /// on clean stop and on fatal read fault alike.
    Disconnected,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Connected { port, baud } => {
                write!(f, "Connected to {} @ {}", port, baud)
            }
            LinkStatus::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Event from the ingest worker to the dispatcher. The worker is a pure
/// producer; this channel is its only outward communication.
#[derive(Clone, Debug, PartialEq)]
pub enum ReaderEvent {
    Status(LinkStatus),
    /// Connection-level fault. Implies the session ended (or never began).
    Error(String),
    /// One decoded, trimmed, non-empty telemetry line.
    Line(String),
}

/// An available serial port, reduced to what the operator needs to pick
/// one: the name plus enough USB metadata to tell boards apart.
#[derive(Clone, Debug, Serialize)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// Enumerate the system's serial ports.
pub fn list_ports() -> Result<Vec<PortInfo>, LinkError> {
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;

    Ok(ports
        .into_iter()
        // macOS exposes each device twice; keep the /dev/cu.* side only
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product) = match p.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    ("USB".to_string(), usb.manufacturer, usb.product)
                }
                serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None),
                serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None),
                serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None),
            };
            PortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
