// src/store.rs
//
// In-memory table of accepted measurements.
// The store is the authoritative ordered row collection; a table widget
// (or any other rendered view) is a derived copy that can be reconciled
// back into the store after external edits.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::telemetry::{parse_float_field, parse_int_field, MeasurementRecord};

/// One logged row: a measurement plus capture metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    /// Wall-clock capture time, ISO-8601 at seconds precision,
    /// assigned when the record was accepted.
    pub pc_time: String,
    /// Operator-entered location, snapshotted at accept time.
    pub location: String,
    /// Operator-entered notes, snapshotted at accept time.
    pub notes: String,
    pub record: MeasurementRecord,
}

/// A row as rendered by an external view (table widget, IPC payload).
/// Ten string cells in the fixed display/export column order; numeric
/// cells are empty when the value is absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedRow {
    pub pc_time: String,
    pub location: String,
    pub notes: String,
    pub arduino_ms: String,
    pub dur_ms: String,
    pub mean: String,
    pub std: String,
    pub n: String,
    pub min: String,
    pub max: String,
}

impl LogRow {
    /// Render this row for display. Floats are shown at two decimals,
    /// ints verbatim, absent values as empty cells.
    pub fn render(&self) -> RenderedRow {
        RenderedRow {
            pc_time: self.pc_time.clone(),
            location: self.location.clone(),
            notes: self.notes.clone(),
            arduino_ms: fmt_int(self.record.arduino_ms),
            dur_ms: fmt_int(self.record.dur_ms),
            mean: fmt_float(self.record.mean),
            std: fmt_float(self.record.std),
            n: fmt_int(self.record.n),
            min: fmt_int(self.record.min),
            max: fmt_int(self.record.max),
        }
    }
}

fn fmt_int(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_float(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// Ordered collection of accepted rows.
///
/// A row's identity is its position: a dense `0..N-1` range reassigned on
/// every structural change. Identities are only valid until the next
/// mutation — callers must re-fetch after delete or rebuild.
#[derive(Debug, Default)]
pub struct LogStore {
    rows: Vec<LogRow>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a record, stamping the capture time now. Never rejects.
    /// Returns the identity of the new row.
    pub fn append(&mut self, record: MeasurementRecord, location: &str, notes: &str) -> usize {
        self.rows.push(LogRow {
            pc_time: now_iso_seconds(),
            location: location.trim().to_string(),
            notes: notes.trim().to_string(),
            record,
        });
        self.rows.len() - 1
    }

    /// Remove exactly the named rows. Survivors keep their relative order
    /// and are re-identified as a dense `0..N-1` range. Out-of-range
    /// identities are ignored.
    pub fn delete(&mut self, identities: &[usize]) {
        let doomed: HashSet<usize> = identities.iter().copied().collect();
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
    }

    /// Empty the store unconditionally. Any confirmation step happens
    /// before this is called.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Replace the entire store from an externally rendered (possibly
    /// edited) view. Numeric cells are re-parsed with the same per-field
    /// tolerance as the line parser — a cell that no longer parses becomes
    /// absent rather than failing the rebuild. Identities are re-issued
    /// dense even when nothing changed.
    pub fn rebuild_from_view(&mut self, rendered: &[RenderedRow]) {
        self.rows = rendered
            .iter()
            .map(|r| LogRow {
                pc_time: r.pc_time.clone(),
                location: r.location.clone(),
                notes: r.notes.clone(),
                record: MeasurementRecord {
                    arduino_ms: parse_int_field(&r.arduino_ms),
                    dur_ms: parse_int_field(&r.dur_ms),
                    mean: parse_float_field(&r.mean),
                    std: parse_float_field(&r.std),
                    n: parse_int_field(&r.n),
                    min: parse_int_field(&r.min),
                    max: parse_int_field(&r.max),
                },
            })
            .collect();
    }

    /// Render the whole store in identity order.
    pub fn render(&self) -> Vec<RenderedRow> {
        self.rows.iter().map(LogRow::render).collect()
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Wall-clock timestamp at seconds precision, e.g. `2026-08-28T14:07:03`.
pub fn now_iso_seconds() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: i64) -> MeasurementRecord {
        MeasurementRecord {
            arduino_ms: Some(n * 1000),
            dur_ms: Some(10001),
            mean: Some(-72.4),
            std: Some(3.1),
            n: Some(n),
            min: Some(-90),
            max: Some(-60),
        }
    }

    #[test]
    fn test_append_assigns_dense_identities() {
        let mut store = LogStore::new();
        assert_eq!(store.append(record(1), "lab", "first"), 0);
        assert_eq!(store.append(record(2), "lab", ""), 1);
        assert_eq!(store.append(record(3), "", ""), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_delete_subset_preserves_order() {
        let mut store = LogStore::new();
        for i in 0..5 {
            store.append(record(i), "", "");
        }
        store.delete(&[1, 3]);
        assert_eq!(store.len(), 3);
        let ns: Vec<i64> = store.rows().iter().filter_map(|r| r.record.n).collect();
        assert_eq!(ns, vec![0, 2, 4]);
        // Identities re-densified: appending lands at index 3
        assert_eq!(store.append(record(9), "", ""), 3);
    }

    #[test]
    fn test_delete_ignores_out_of_range() {
        let mut store = LogStore::new();
        store.append(record(1), "", "");
        store.delete(&[5, 0, 7]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_empties_unconditionally() {
        let mut store = LogStore::new();
        store.append(record(1), "", "");
        store.clear();
        assert!(store.is_empty());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_rebuild_from_own_render_is_idempotent() {
        let mut store = LogStore::new();
        store.append(record(1), "2E lab corner", "window side");
        store.append(
            MeasurementRecord {
                mean: Some(-80.0),
                ..Default::default()
            },
            "",
            "partial record",
        );

        let before = store.render();
        store.rebuild_from_view(&before);
        assert_eq!(store.render(), before);
        assert_eq!(store.rows()[0].record, record(1));
        assert_eq!(store.rows()[1].record.arduino_ms, None);
        assert_eq!(store.rows()[1].record.mean, Some(-80.0));
    }

    #[test]
    fn test_rebuild_maps_unparseable_cells_to_absent() {
        let mut store = LogStore::new();
        store.rebuild_from_view(&[RenderedRow {
            pc_time: "2026-08-28T12:00:00".into(),
            location: "roof".into(),
            notes: "edited by hand".into(),
            arduino_ms: "oops".into(),
            dur_ms: "10001.0".into(),
            mean: "-70.25".into(),
            std: "".into(),
            n: "86".into(),
            min: "-91".into(),
            max: "not a number".into(),
        }]);
        assert_eq!(store.len(), 1);
        let row = &store.rows()[0];
        assert_eq!(row.record.arduino_ms, None);
        assert_eq!(row.record.dur_ms, Some(10001));
        assert_eq!(row.record.mean, Some(-70.25));
        assert_eq!(row.record.std, None);
        assert_eq!(row.record.max, None);
        assert_eq!(row.location, "roof");
    }

    #[test]
    fn test_rebuild_replaces_previous_contents() {
        let mut store = LogStore::new();
        store.append(record(1), "", "");
        store.append(record(2), "", "");
        let kept = vec![store.rows()[1].render()];
        store.rebuild_from_view(&kept);
        assert_eq!(store.len(), 1);
        assert_eq!(store.rows()[0].record.n, Some(2));
    }

    #[test]
    fn test_capture_time_shape() {
        let stamp = now_iso_seconds();
        // 2026-08-28T14:07:03 — seconds precision, no fraction
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], "T");
        assert!(!stamp.contains('.'));
    }
}
