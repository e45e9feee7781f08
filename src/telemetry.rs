// src/telemetry.rs
//
// AVG line parser for the RFM69 survey firmware's telemetry protocol.
// Wire format, one ASCII line per sampling window:
//
//   AVG,ms=123456,dur_ms=10001,mean=-72.40,std=3.10,n=86,min=-90,max=-60
//
// Keys may appear in any order, unknown keys are ignored, and any field
// may be missing or garbled independently of the others.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One decoded sampling-window measurement.
///
/// Every field is optional: device telemetry is lossy and a record with a
/// corrupt field is still worth keeping. Absence means the key was missing
/// or its value failed to parse.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Device-relative timestamp (millis since MCU boot).
    pub arduino_ms: Option<i64>,
    /// Sampling window duration in milliseconds.
    pub dur_ms: Option<i64>,
    /// Mean RSSI over the window, dBm.
    pub mean: Option<f64>,
    /// RSSI standard deviation over the window, dB.
    pub std: Option<f64>,
    /// Number of samples in the window.
    pub n: Option<i64>,
    /// Minimum RSSI in the window, dBm.
    pub min: Option<i64>,
    /// Maximum RSSI in the window, dBm.
    pub max: Option<i64>,
}

/// Parse an integer field, accepting float spellings like `"10001.0"`.
///
/// The value is parsed as f64 first and truncated toward zero, so the
/// firmware emitting a float where an int is expected does not lose the
/// field. Returns `None` on any failure (including NaN/inf).
pub fn parse_int_field(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

/// Parse a float field. Returns `None` on failure.
pub fn parse_float_field(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Parse one raw telemetry line into a measurement record.
///
/// Returns `None` for anything that is not an `AVG,` line — boot banners
/// and debug chatter are normal, not errors. For a recognised line, each
/// field is extracted independently; a bad value empties that field and
/// never fails the record.
pub fn parse_avg_line(line: &str) -> Option<MeasurementRecord> {
    let rest = line.trim().strip_prefix("AVG,")?;

    // key=value tokens; tokens without '=' are ignored, last key wins
    let mut kv: HashMap<&str, &str> = HashMap::new();
    for token in rest.split(',') {
        if let Some((key, value)) = token.split_once('=') {
            kv.insert(key.trim(), value.trim());
        }
    }

    Some(MeasurementRecord {
        arduino_ms: kv.get("ms").copied().and_then(parse_int_field),
        dur_ms: kv.get("dur_ms").copied().and_then(parse_int_field),
        mean: kv.get("mean").copied().and_then(parse_float_field),
        std: kv.get("std").copied().and_then(parse_float_field),
        n: kv.get("n").copied().and_then(parse_int_field),
        min: kv.get("min").copied().and_then(parse_int_field),
        max: kv.get("max").copied().and_then(parse_int_field),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let rec =
            parse_avg_line("AVG,ms=123456,dur_ms=10001,mean=-72.40,std=3.10,n=86,min=-90,max=-60")
                .unwrap();
        assert_eq!(rec.arduino_ms, Some(123456));
        assert_eq!(rec.dur_ms, Some(10001));
        assert_eq!(rec.mean, Some(-72.40));
        assert_eq!(rec.std, Some(3.10));
        assert_eq!(rec.n, Some(86));
        assert_eq!(rec.min, Some(-90));
        assert_eq!(rec.max, Some(-60));
    }

    #[test]
    fn test_parse_non_avg_lines() {
        assert!(parse_avg_line("RFM69 init ok").is_none());
        assert!(parse_avg_line("AVGX,ms=1").is_none());
        assert!(parse_avg_line("avg,ms=1").is_none());
        assert!(parse_avg_line("").is_none());
        // Bare prefix without the comma is chatter too
        assert!(parse_avg_line("AVG").is_none());
    }

    #[test]
    fn test_parse_bad_field_does_not_fail_record() {
        let rec = parse_avg_line("AVG,ms=abc,mean=-72.40,n=86").unwrap();
        assert_eq!(rec.arduino_ms, None);
        assert_eq!(rec.mean, Some(-72.40));
        assert_eq!(rec.n, Some(86));
        assert_eq!(rec.dur_ms, None);
        assert_eq!(rec.std, None);
        assert_eq!(rec.min, None);
        assert_eq!(rec.max, None);
    }

    #[test]
    fn test_parse_int_truncates_float_spelling() {
        let rec = parse_avg_line("AVG,dur_ms=10001.0,n=86.9,min=-90.7").unwrap();
        assert_eq!(rec.dur_ms, Some(10001));
        assert_eq!(rec.n, Some(86));
        // Truncation is toward zero, not floor
        assert_eq!(rec.min, Some(-90));
    }

    #[test]
    fn test_parse_fields_in_any_order_with_unknown_keys() {
        let rec = parse_avg_line("AVG,max=-60,freq=915,min=-90,mean=-72.4").unwrap();
        assert_eq!(rec.min, Some(-90));
        assert_eq!(rec.max, Some(-60));
        assert_eq!(rec.mean, Some(-72.4));
        assert_eq!(rec.arduino_ms, None);
    }

    #[test]
    fn test_parse_duplicate_key_last_wins() {
        let rec = parse_avg_line("AVG,n=1,n=2").unwrap();
        assert_eq!(rec.n, Some(2));
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_bare_tokens() {
        let rec = parse_avg_line("  AVG, ms = 5 ,garbage, n=3 \r\n").unwrap();
        assert_eq!(rec.arduino_ms, Some(5));
        assert_eq!(rec.n, Some(3));
    }

    #[test]
    fn test_parse_int_field_rejects_non_finite() {
        assert_eq!(parse_int_field("nan"), None);
        assert_eq!(parse_int_field("inf"), None);
        assert_eq!(parse_int_field(""), None);
        assert_eq!(parse_int_field("-90"), Some(-90));
        assert_eq!(parse_int_field("10001.0"), Some(10001));
    }
}
