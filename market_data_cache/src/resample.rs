//! Derivation of coarser bars from a minute-level series.
//!
//! Bucket mapping uses one stable epoch (Unix, 1970-01-01T00:00:00Z):
//! second-based math for fixed-width frames (5m/15m/1h/1d), a Monday anchor
//! of 1969-12-29 for weeks, and linear (year, month) indexing for calendar
//! months. Fixed-width buckets land on hour and day boundaries by
//! construction since the widths divide them evenly. All math is UTC.
//!
//! [`resample`] is pure and stateless: no I/O, safe to call repeatedly and in
//! parallel across instruments.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::models::{bar::Bar, timeframe::Timeframe};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;

/// shift so Monday 1969-12-29 00:00Z becomes week index 0
const WEEK_MONDAY_ANCHOR_OFFSET_SECS: i64 = 3 * SECS_PER_DAY;

/// Aggregates a sorted minute series into `target` buckets.
///
/// Within each non-empty bucket: open = first bar's open, high = max, low =
/// min, close = last bar's close, volume = sum. Empty buckets produce no
/// output row; there is no synthetic fill-forward. The output bar timestamp
/// is the bucket start, output sorted ascending.
///
/// The caller guarantees sorted input (the store's `load` contract); the
/// native timeframe passes bars through unchanged.
pub fn resample(bars: &[Bar], target: Timeframe) -> Vec<Bar> {
    if target.is_native() {
        return bars.to_vec();
    }

    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<(i64, Bar)> = None;

    for bar in bars {
        let id = bucket_id(bar.timestamp, target);
        match &mut current {
            Some((open_id, acc)) if *open_id == id => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
            }
            _ => {
                if let Some((_, done)) = current.take() {
                    out.push(done);
                }
                current = Some((
                    id,
                    Bar {
                        timestamp: bucket_start(id, target),
                        ..*bar
                    },
                ));
            }
        }
    }
    if let Some((_, done)) = current {
        out.push(done);
    }
    out
}

fn bucket_id(ts: DateTime<Utc>, target: Timeframe) -> i64 {
    match target {
        Timeframe::Min1 => id_fixed(ts, SECS_PER_MINUTE),
        Timeframe::Min5 => id_fixed(ts, 5 * SECS_PER_MINUTE),
        Timeframe::Min15 => id_fixed(ts, 15 * SECS_PER_MINUTE),
        Timeframe::Hour1 => id_fixed(ts, SECS_PER_HOUR),
        Timeframe::Day1 => id_fixed(ts, SECS_PER_DAY),
        Timeframe::Week1 => {
            (ts.timestamp() + WEEK_MONDAY_ANCHOR_OFFSET_SECS).div_euclid(SECS_PER_WEEK)
        }
        Timeframe::Month1 => {
            // Linear month index relative to 1970-01 (index 0).
            (ts.year() as i64 - 1970) * 12 + (ts.month() as i64 - 1)
        }
    }
}

fn bucket_start(id: i64, target: Timeframe) -> DateTime<Utc> {
    match target {
        Timeframe::Min1 => start_fixed(id, SECS_PER_MINUTE),
        Timeframe::Min5 => start_fixed(id, 5 * SECS_PER_MINUTE),
        Timeframe::Min15 => start_fixed(id, 15 * SECS_PER_MINUTE),
        Timeframe::Hour1 => start_fixed(id, SECS_PER_HOUR),
        Timeframe::Day1 => start_fixed(id, SECS_PER_DAY),
        Timeframe::Week1 => start_fixed(id, SECS_PER_WEEK) - Duration::seconds(WEEK_MONDAY_ANCHOR_OFFSET_SECS),
        Timeframe::Month1 => {
            let year = 1970 + id.div_euclid(12);
            let month = (id.rem_euclid(12) + 1) as u32;
            Utc.with_ymd_and_hms(year as i32, month, 1, 0, 0, 0)
                .single()
                .expect("first of month is a valid timestamp")
        }
    }
}

fn id_fixed(ts: DateTime<Utc>, bucket_secs: i64) -> i64 {
    ts.timestamp().div_euclid(bucket_secs)
}

fn start_fixed(id: i64, bucket_secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(id * bucket_secs)
}
