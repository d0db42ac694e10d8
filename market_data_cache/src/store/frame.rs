//! `Bar` ↔ `DataFrame` conversion for the Parquet fragment files.
//!
//! The fragment schema is fixed: a millisecond-precision UTC `timestamp`
//! column plus `open`/`high`/`low`/`close` as `f64` and `volume` as `u64`.
//! Columns the provider ships that the cache does not use are dropped before
//! this point.

use chrono::{DateTime, Utc};
use polars::prelude::*;
use snafu::ResultExt;

use super::{ConversionSnafu, PolarsSnafu, StorageError};
use crate::models::bar::Bar;

pub(crate) fn bars_to_frame(bars: &[Bar]) -> Result<DataFrame, StorageError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .context(PolarsSnafu)?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .context(PolarsSnafu)
}

pub(crate) fn frame_to_bars(df: &DataFrame) -> Result<Vec<Bar>, StorageError> {
    // Normalize the time unit before reading; Parquet round-trips may come
    // back in a different precision.
    let ts_col = df
        .column("timestamp")
        .and_then(|c| c.cast(&DataType::Datetime(TimeUnit::Milliseconds, None)))
        .context(PolarsSnafu)?;
    let ts_ca = ts_col.datetime().context(PolarsSnafu)?;
    let open_ca = df.column("open").and_then(|c| c.f64()).context(PolarsSnafu)?;
    let high_ca = df.column("high").and_then(|c| c.f64()).context(PolarsSnafu)?;
    let low_ca = df.column("low").and_then(|c| c.f64()).context(PolarsSnafu)?;
    let close_ca = df.column("close").and_then(|c| c.f64()).context(PolarsSnafu)?;
    let volume_ca = df.column("volume").and_then(|c| c.u64()).context(PolarsSnafu)?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let millis = ts_ca.get(i).ok_or_else(|| {
            ConversionSnafu {
                message: format!("null timestamp at row {i}"),
            }
            .build()
        })?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            ConversionSnafu {
                message: format!("timestamp out of range at row {i}: {millis}"),
            }
            .build()
        })?;
        bars.push(Bar {
            timestamp,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: volume_ca.get(i).unwrap_or(0),
        });
    }
    Ok(bars)
}
