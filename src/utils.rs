//! Small shared helpers for timestamps and identifier hashing.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_time_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current wall-clock time as a UTC timestamp.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Align a timestamp down to the start of its `interval` bucket.
///
/// Buckets are anchored at the Unix epoch, so `truncate(12:00:01.500, 2s)`
/// yields `12:00:00.000`. An `interval` of zero returns `ts` unchanged.
pub fn truncate_to_interval(ts: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let interval_ms = interval.as_millis() as i64;
    if interval_ms <= 0 {
        return ts;
    }
    let ms = ts.timestamp_millis();
    let aligned = ms - ms.rem_euclid(interval_ms);
    match Utc.timestamp_millis_opt(aligned) {
        chrono::LocalResult::Single(t) => t,
        _ => ts,
    }
}

/// DJB2-style string hash used for opaque snapshot checksums.
///
/// Consumers must treat the value as opaque: it covers the event identity
/// (`symbol|type|sequence`), not the payload contents.
pub fn djb2_checksum(input: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in input.bytes() {
        hash = hash.wrapping_mul(33) ^ u32::from(byte);
    }
    hash
}

/// Symbol with venue separators removed, as used in event and order ids
/// (`BTC-USDT` becomes `BTCUSDT`).
pub fn compact_symbol(symbol: &str) -> String {
    symbol.chars().filter(|c| *c != '-').collect()
}
