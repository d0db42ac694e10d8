//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the unit of data everywhere in the cache: archive decoding,
//! Parquet fragments, merging, and resampling all speak [`Bar`].

use chrono::{DateTime, Utc};

/// A single OHLCV bar for a given timestamp (UTC, minute precision at the
/// native timeframe).
///
/// `low <= min(open, close) <= max(open, close) <= high` is expected of
/// well-formed data but is not enforced on decode; the provider's rows are
/// passed through as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    /// The timestamp for this bar (UTC). For resampled bars this is the
    /// bucket start.
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Units traded during the bar interval.
    pub volume: u64,
}
