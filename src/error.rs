// src/error.rs
//
// Error taxonomy for the logger core.
// Parse-level faults are deliberately absent: a malformed field degrades
// to an empty value inside the parser and never becomes an error.

use thiserror::Error;

/// Errors surfaced to the operator by the logger core.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial port could not be opened. Reported once; the worker
    /// never enters its read loop after this.
    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// A connect request arrived while a previous session was still
    /// active or draining. Reconnects are rejected until the prior
    /// session's terminal status has been observed.
    #[error("A serial session is already active on {0}; wait for it to disconnect")]
    Busy(String),

    /// A disconnect or session operation with no session to act on.
    #[error("No active serial session")]
    NotConnected,

    /// Enumerating the system's serial ports failed.
    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    /// CSV export or append failed. The row store is untouched; there is
    /// no partial-write recovery for the target file.
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
