// src/io/reader.rs
//
// Serial ingest worker. Owns the device handle for its lifetime and runs
// blocking serial I/O on a dedicated blocking task; everything it learns
// flows out through the event channel. Cancellation is cooperative: a
// shared flag checked each loop iteration, so a stop request takes effect
// with read-timeout granularity rather than instantaneously.

use std::io::Read;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::LinkError;
use crate::io::{LinkStatus, ReaderEvent};

/// Blocking read timeout. Bounds how long a stop request can go unnoticed.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Many boards reset the MCU when the port opens; wait this long before
/// discarding the boot chatter.
const RESET_SETTLE: Duration = Duration::from_millis(1500);

/// Lines longer than this are firmware gone wrong; drop the buffer rather
/// than grow without bound.
const MAX_LINE_BYTES: usize = 4096;

/// One connect attempt: port name and baud rate.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub port: String,
    pub baud: u32,
}

/// Handle to a running ingest worker.
///
/// The worker owns the serial handle exclusively; this handle only carries
/// the stop flag and the task join handle. Dropping it does not stop the
/// worker — call [`SerialReader::stop`] and wait for the terminal
/// `Disconnected` status on the event channel.
pub struct SerialReader {
    config: SessionConfig,
    cancel_flag: Arc<AtomicBool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SerialReader {
    /// Start a worker for one connect attempt. Events (status, error, raw
    /// lines) are delivered on `events`; the sender is dropped when the
    /// worker finishes, closing the channel from the producer side.
    pub fn spawn(config: SessionConfig, events: UnboundedSender<ReaderEvent>) -> Self {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let flag = cancel_flag.clone();
        let cfg = config.clone();
        let events_on_panic = events.clone();

        let task_handle = tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || run_reader_blocking(cfg, flag, events)).await;
            if let Err(e) = result {
                crate::tlog!("[serial] Reader task panicked: {:?}", e);
                // Keep the terminal-status contract even on panic
                let _ = events_on_panic.send(ReaderEvent::Status(LinkStatus::Disconnected));
            }
        });

        Self {
            config,
            cancel_flag,
            task_handle: Some(task_handle),
        }
    }

    pub fn port(&self) -> &str {
        &self.config.port
    }

    /// Request a cooperative stop. Takes effect within one read timeout.
    pub fn stop(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker to finish. The terminal `Disconnected` status
    /// is on the event channel by the time this returns.
    pub async fn join(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }
}

/// Blocking worker body: open, settle, read lines until stopped or the
/// port faults, then emit the terminal status exactly once.
fn run_reader_blocking(
    config: SessionConfig,
    cancel_flag: Arc<AtomicBool>,
    events: UnboundedSender<ReaderEvent>,
) {
    let mut port = match serialport::new(&config.port, config.baud)
        .timeout(READ_TIMEOUT)
        .open()
    {
        Ok(p) => p,
        Err(e) => {
            // Open failure never enters the read loop: one error event,
            // no terminal status, no further events.
            let _ = events.send(ReaderEvent::Error(
                LinkError::Open {
                    port: config.port.clone(),
                    source: e,
                }
                .to_string(),
            ));
            return;
        }
    };

    crate::tlog!("[serial] Opened {} @ {}", config.port, config.baud);
    let _ = events.send(ReaderEvent::Status(LinkStatus::Connected {
        port: config.port.clone(),
        baud: config.baud,
    }));

    // Opening the port resets most Arduino-class boards; let the boot
    // finish, then discard whatever it printed. Best effort only.
    std::thread::sleep(RESET_SETTLE);
    let _ = port.clear(serialport::ClearBuffer::Input);

    let mut read_buf = [0u8; 256];
    let mut line_buf: Vec<u8> = Vec::with_capacity(128);

    while !cancel_flag.load(Ordering::Relaxed) {
        match port.read(&mut read_buf) {
            Ok(0) => {}
            Ok(n) => {
                for &byte in &read_buf[..n] {
                    if byte == b'\n' || byte == b'\r' {
                        emit_line(&mut line_buf, &events);
                    } else {
                        line_buf.push(byte);
                        if line_buf.len() > MAX_LINE_BYTES {
                            line_buf.clear();
                        }
                    }
                }
            }
            // A timed-out read is not an error: no data this interval,
            // loop around and recheck the stop flag.
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                crate::tlog!("[serial] Read error on {}: {}", config.port, e);
                let _ = events.send(ReaderEvent::Error(format!(
                    "Read error on {}: {}",
                    config.port, e
                )));
                break;
            }
        }
    }

    // Close is best-effort; the terminal status still fires.
    drop(port);
    crate::tlog!("[serial] Closed {}", config.port);
    let _ = events.send(ReaderEvent::Status(LinkStatus::Disconnected));
}

/// Decode and emit a completed line. Undecodable bytes become replacement
/// characters; lines that trim to empty are dropped without emission.
fn emit_line(line_buf: &mut Vec<u8>, events: &UnboundedSender<ReaderEvent>) {
    if line_buf.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(line_buf);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        let _ = events.send(ReaderEvent::Line(trimmed.to_string()));
    }
    line_buf.clear();
}

// ============================================================================
// Tests
// ============================================================================
