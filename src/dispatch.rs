// src/dispatch.rs
//
// Single-consumer event loop over the ingest worker's channel.
// The dispatcher is the only writer of the row store and of the display
// state; the caller (GUI shell or CLI) decides the polling cadence and
// reads the results back between ticks. Intended cadence is ~100 ms.

use std::path::Path;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::LinkError;
use crate::export;
use crate::io::reader::{SerialReader, SessionConfig};
use crate::io::{LinkStatus, ReaderEvent};
use crate::store::LogStore;
use crate::telemetry::parse_avg_line;

/// What a single tick did, for the caller to reflect.
#[derive(Debug, Default)]
pub struct TickSummary {
    /// Raw lines seen this tick, in arrival order.
    pub lines: Vec<String>,
    /// Rows appended to the store this tick.
    pub rows_appended: usize,
    /// Connection-level errors to surface to the operator.
    pub errors: Vec<String>,
    /// True once the session is over — terminal status observed, or an
    /// error ended it. Connecting again is allowed after this.
    pub session_ended: bool,
}

/// Where the current session is in its lifecycle.
///
/// The worker's event protocol is phase-dependent: an error before the
/// `Connected` status means the open failed and nothing follows; an error
/// after it means the read loop died and the terminal `Disconnected` is
/// still in flight. Connect requests are rejected in every phase but
/// `Idle`, so a draining session's terminal event can never land on a
/// successor session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkPhase {
    /// No session; connecting is allowed.
    Idle,
    /// Worker spawned, `Connected` status not yet observed.
    Opening,
    /// `Connected` status observed; the read loop is live.
    Active,
    /// The session is over but its terminal status has not arrived yet.
    Draining,
}

/// Event loop state: channel, row store, operator fields, display state,
/// and the handle of the active worker (if any).
pub struct Dispatcher {
    events_tx: UnboundedSender<ReaderEvent>,
    events_rx: UnboundedReceiver<ReaderEvent>,
    reader: Option<SerialReader>,
    phase: LinkPhase,
    store: LogStore,
    /// Operator-entered fields, read at the moment each record is
    /// appended — not cached at device-read time.
    location: String,
    notes: String,
    status: String,
    last_line: String,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx,
            reader: None,
            phase: LinkPhase::Idle,
            store: LogStore::new(),
            location: String::new(),
            notes: String::new(),
            status: "Not connected".to_string(),
            last_line: String::new(),
        }
    }

    /// Start an ingest worker for `port`.
    ///
    /// Rejected while a previous session is active or still draining: the
    /// prior worker's terminal status must be observed by a tick before a
    /// new connect is accepted, so two workers can never race on the port.
    pub fn connect(&mut self, port: &str, baud: u32) -> Result<(), LinkError> {
        if self.phase != LinkPhase::Idle {
            let held = self
                .reader
                .as_ref()
                .map(|r| r.port().to_string())
                .unwrap_or_else(|| "serial link".to_string());
            return Err(LinkError::Busy(held));
        }
        let config = SessionConfig {
            port: port.to_string(),
            baud,
        };
        self.status = format!("Connecting to {}...", port);
        self.reader = Some(SerialReader::spawn(config, self.events_tx.clone()));
        self.phase = LinkPhase::Opening;
        Ok(())
    }

    /// Request a cooperative stop of the active worker. The session stays
    /// "draining" until its terminal status arrives on the channel.
    pub fn disconnect(&mut self) -> Result<(), LinkError> {
        match &self.reader {
            Some(reader) => {
                reader.stop();
                Ok(())
            }
            None => Err(LinkError::NotConnected),
        }
    }

    /// Drain every queued event, in arrival order, without blocking.
    pub fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary::default();
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event, &mut summary);
        }
        summary
    }

    fn dispatch(&mut self, event: ReaderEvent, summary: &mut TickSummary) {
        match event {
            ReaderEvent::Status(status) => {
                self.status = status.to_string();
                match status {
                    LinkStatus::Connected { .. } => {
                        self.phase = LinkPhase::Active;
                    }
                    LinkStatus::Disconnected => {
                        // Idempotent: a second terminal status (or one after
                        // an error already ended the session) changes nothing.
                        self.reader = None;
                        self.phase = LinkPhase::Idle;
                        summary.session_ended = true;
                    }
                }
            }
            ReaderEvent::Error(message) => {
                self.status = message.clone();
                summary.errors.push(message);
                match self.phase {
                    // Before the Connected status this is an open failure:
                    // the worker never entered its read loop and will emit
                    // nothing more, so the session is over now.
                    LinkPhase::Opening => {
                        self.reader = None;
                        self.phase = LinkPhase::Idle;
                        summary.session_ended = true;
                    }
                    // Mid-session the read loop died, but the worker still
                    // holds the port until its terminal status arrives.
                    // Keep draining so a reconnect cannot race it and the
                    // terminal event cannot land on a successor session.
                    LinkPhase::Active => {
                        self.phase = LinkPhase::Draining;
                    }
                    LinkPhase::Draining | LinkPhase::Idle => {}
                }
            }
            ReaderEvent::Line(line) => {
                self.last_line = line.clone();
                if let Some(record) = parse_avg_line(&line) {
                    self.store.append(record, &self.location, &self.notes);
                    summary.rows_appended += 1;
                }
                summary.lines.push(line);
            }
        }
    }

    /// Export the current store snapshot. The store is untouched either way.
    pub fn export_csv(&self, path: &Path) -> Result<(), LinkError> {
        export::export_rows(path, self.store.rows())
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_line(&self) -> &str {
        &self.last_line
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.notes = notes.to_string();
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Mutable store access for collaborator-driven edits (delete, clear,
    /// rebuild-from-view). The dispatcher and its caller live on the same
    /// thread, so this needs no locking.
    pub fn store_mut(&mut self) -> &mut LogStore {
        &mut self.store
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DEFAULT_BAUD;

    fn send(d: &Dispatcher, event: ReaderEvent) {
        d.events_tx.send(event).unwrap();
    }

    #[tokio::test]
    async fn test_line_events_append_with_current_operator_fields() {
        let mut d = Dispatcher::new();
        d.set_location("2E lab corner");
        d.set_notes("first pass");

        send(&d, ReaderEvent::Line("boot banner".to_string()));
        send(&d, ReaderEvent::Line("AVG,ms=10,n=5".to_string()));

        let summary = d.tick();
        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.rows_appended, 1);
        assert_eq!(d.last_line(), "AVG,ms=10,n=5");
        assert_eq!(d.store().len(), 1);
        assert_eq!(d.store().rows()[0].location, "2E lab corner");

        // Fields are read at append time, not at device-read time
        d.set_location("roof");
        send(&d, ReaderEvent::Line("AVG,ms=20,n=6".to_string()));
        d.tick();
        assert_eq!(d.store().rows()[1].location, "roof");
    }

    #[tokio::test]
    async fn test_events_processed_in_arrival_order() {
        let mut d = Dispatcher::new();
        send(&d, ReaderEvent::Line("AVG,n=1".to_string()));
        send(&d, ReaderEvent::Line("AVG,n=2".to_string()));
        send(&d, ReaderEvent::Line("AVG,n=3".to_string()));

        let summary = d.tick();
        assert_eq!(summary.rows_appended, 3);
        let ns: Vec<i64> = d.store().rows().iter().filter_map(|r| r.record.n).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_status_and_error_reset_control_state() {
        let mut d = Dispatcher::new();
        d.connect("/dev/nonexistent-rssilog-test", DEFAULT_BAUD)
            .unwrap();
        assert!(d.is_connected());

        // Reconnect while the session is active (or draining) is rejected
        assert!(matches!(
            d.connect("/dev/other", DEFAULT_BAUD),
            Err(LinkError::Busy(_))
        ));

        // The bogus port fails to open; the worker emits one error
        if let Some(reader) = d.reader.as_mut() {
            reader.join().await;
        }
        let summary = d.tick();
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.session_ended);
        assert!(!d.is_connected());

        // With the terminal event observed, connecting is allowed again
        d.connect("/dev/nonexistent-rssilog-test", DEFAULT_BAUD)
            .unwrap();
    }

    #[tokio::test]
    async fn test_midsession_error_defers_reconnect_until_terminal() {
        let mut d = Dispatcher::new();
        send(
            &d,
            ReaderEvent::Status(LinkStatus::Connected {
                port: "COM32".to_string(),
                baud: DEFAULT_BAUD,
            }),
        );
        d.tick();

        // Read loop dies mid-session: the error arrives first, the
        // terminal status only after the worker has released the port.
        send(&d, ReaderEvent::Error("Read error on COM32: unplugged".to_string()));
        let summary = d.tick();
        assert_eq!(summary.errors.len(), 1);
        assert!(!summary.session_ended);

        // The dead session still owns the port; a reconnect in the gap
        // between its error and its terminal status must be rejected.
        assert!(matches!(
            d.connect("/dev/other", DEFAULT_BAUD),
            Err(LinkError::Busy(_))
        ));

        // Once the terminal status is observed, connecting is allowed and
        // no stale event is left behind to wipe the new session's state.
        send(&d, ReaderEvent::Status(LinkStatus::Disconnected));
        let summary = d.tick();
        assert!(summary.session_ended);
        d.connect("/dev/nonexistent-rssilog-test", DEFAULT_BAUD)
            .unwrap();
        assert!(d.is_connected());
    }

    #[tokio::test]
    async fn test_terminal_status_is_idempotent() {
        let mut d = Dispatcher::new();
        send(
            &d,
            ReaderEvent::Status(LinkStatus::Connected {
                port: "COM32".to_string(),
                baud: DEFAULT_BAUD,
            }),
        );
        send(&d, ReaderEvent::Status(LinkStatus::Disconnected));
        send(&d, ReaderEvent::Status(LinkStatus::Disconnected));

        let summary = d.tick();
        assert!(summary.session_ended);
        assert_eq!(d.status(), "Disconnected");
        assert!(!d.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_an_error() {
        let mut d = Dispatcher::new();
        assert!(matches!(d.disconnect(), Err(LinkError::NotConnected)));
    }
}
