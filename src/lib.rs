// src/lib.rs
//
// rssilog — serial RSSI telemetry logger core.
// Reads AVG telemetry lines from an RFM69 survey device over a serial
// port, accumulates them in an in-memory row store, and exports to CSV.
// The GUI shell (or the bundled CLI) is an external collaborator that
// drives the dispatcher and renders its state.

pub mod logging;

pub mod dispatch;
pub mod error;
pub mod export;
pub mod io;
pub mod store;
pub mod telemetry;

pub use dispatch::{Dispatcher, TickSummary};
pub use error::LinkError;
pub use export::{CsvAppender, BATCH_COLUMNS, EXPORT_COLUMNS};
pub use io::{list_ports, LinkStatus, PortInfo, ReaderEvent, SerialReader, DEFAULT_BAUD};
pub use store::{LogRow, LogStore, RenderedRow};
pub use telemetry::{parse_avg_line, MeasurementRecord};
