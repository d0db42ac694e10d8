//! On-disk persistence of per-instrument bar series.
//!
//! The store owns two parallel directory trees under its base directory:
//!
//! - `raw_data/{ticker}/{id}_{year}.zip` — provider archives as received,
//!   kept for inspection and re-decoding without a refetch;
//! - `processed_data/{ticker}/{stamp}_{seq}_{ticker}_{start}_{end}_{uuid}.parquet`
//!   — decoded minute-bar fragments, one per successful backfill.
//!
//! Fragments are append-only: a save never rewrites earlier fragments, so a
//! partial failure cannot lose history. `load` replays all fragments in
//! creation order and dedupes by timestamp with last-write-wins, which makes
//! the duplicate-resolution rule "most recently fetched value wins" explicit.
//!
//! All filesystem mutation in the crate happens here.

mod frame;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, Utc};
use polars::prelude::{ParquetReader, ParquetWriter, SerReader};
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::debug;
use uuid::Uuid;

use crate::models::{bar::Bar, date_range::DateRange, identifier::InstrumentId};

const RAW_DIR: &str = "raw_data";
const PROCESSED_DIR: &str = "processed_data";

/// Errors from the dataset store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// A filesystem operation failed.
    #[snafu(display("I/O error: {source}"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// A Polars read, write, or cast failed.
    #[snafu(display("Polars operation failed: {source}"))]
    Polars {
        source: polars::prelude::PolarsError,
        backtrace: Backtrace,
    },

    /// A fragment row could not be converted back into a bar.
    #[snafu(display("Data conversion error: {message}"))]
    Conversion {
        message: String,
        backtrace: Backtrace,
    },
}

/// Owns the on-disk cache for all instruments.
pub struct DatasetStore {
    base_dir: PathBuf,
    /// Tiebreaker for fragments written within one clock millisecond.
    fragment_seq: AtomicU64,
}

impl DatasetStore {
    /// Opens (creating if needed) a store rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(base_dir.join(RAW_DIR)).context(IoSnafu)?;
        fs::create_dir_all(base_dir.join(PROCESSED_DIR)).context(IoSnafu)?;
        Ok(Self {
            base_dir,
            fragment_seq: AtomicU64::new(0),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn raw_dir(&self, ticker: &str) -> PathBuf {
        self.base_dir.join(RAW_DIR).join(ticker)
    }

    fn processed_dir(&self, ticker: &str) -> PathBuf {
        self.base_dir.join(PROCESSED_DIR).join(ticker)
    }

    /// Persists a provider archive exactly as received.
    pub fn store_raw_archive(
        &self,
        ticker: &str,
        id: &InstrumentId,
        year: i32,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir = self.raw_dir(ticker);
        fs::create_dir_all(&dir).context(IoSnafu)?;
        let path = dir.join(format!("{}_{year}.zip", id.as_str()));
        fs::write(&path, bytes).context(IoSnafu)?;
        Ok(path)
    }

    /// Persists a series fragment as a new Parquet file.
    ///
    /// The file name starts with a creation stamp plus a per-store sequence
    /// number so that `load` can replay fragments in the order they were
    /// written even when two land in the same millisecond, and carries the
    /// covered date span for operator inspection. Writes go to a temp file
    /// first and are renamed into place. An empty fragment is a no-op.
    pub fn save_fragment(
        &self,
        ticker: &str,
        bars: &[Bar],
    ) -> Result<Option<PathBuf>, StorageError> {
        if bars.is_empty() {
            return Ok(None);
        }
        let dir = self.processed_dir(ticker);
        fs::create_dir_all(&dir).context(IoSnafu)?;

        let start = bars.iter().map(|b| b.timestamp.date_naive()).min().unwrap();
        let end = bars.iter().map(|b| b.timestamp.date_naive()).max().unwrap();
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let seq = self.fragment_seq.fetch_add(1, Ordering::Relaxed);
        let name = format!("{stamp}_{seq:06}_{ticker}_{start}_{end}_{}.parquet", Uuid::new_v4());
        let path = dir.join(name);
        let tmp_path = path.with_extension("parquet.tmp");

        let mut df = frame::bars_to_frame(bars)?;
        let file = File::create(&tmp_path).context(IoSnafu)?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .context(PolarsSnafu)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            e
        }).context(IoSnafu)?;

        debug!(ticker, rows = bars.len(), path = %path.display(), "saved fragment");
        Ok(Some(path))
    }

    /// Loads the merged series for a ticker: all fragments concatenated in
    /// creation order, deduplicated by timestamp (last write wins), sorted
    /// ascending. `None` when nothing is persisted.
    pub fn load(&self, ticker: &str) -> Result<Option<Vec<Bar>>, StorageError> {
        let dir = self.processed_dir(ticker);
        if !dir.exists() {
            return Ok(None);
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir).context(IoSnafu)? {
            let path = entry.context(IoSnafu)?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Ok(None);
        }
        // Names are stamp-prefixed, so lexicographic order is creation order.
        paths.sort();

        let mut merged: BTreeMap<i64, Bar> = BTreeMap::new();
        for path in &paths {
            let file = File::open(path).context(IoSnafu)?;
            let df = ParquetReader::new(file).finish().context(PolarsSnafu)?;
            for bar in frame::frame_to_bars(&df)? {
                merged.insert(bar.timestamp.timestamp_millis(), bar);
            }
        }
        debug!(ticker, fragments = paths.len(), rows = merged.len(), "loaded series");
        Ok(Some(merged.into_values().collect()))
    }

    /// Date sub-ranges of `requested` not covered by the persisted extent.
    pub fn missing_ranges(
        &self,
        ticker: &str,
        requested: &DateRange,
    ) -> Result<Vec<DateRange>, StorageError> {
        let extent = self.load(ticker)?.as_deref().and_then(series_extent);
        Ok(boundary_gaps(extent, requested))
    }
}

/// First and last covered days of a sorted series.
pub fn series_extent(bars: &[Bar]) -> Option<(NaiveDate, NaiveDate)> {
    let first = bars.first()?;
    let last = bars.last()?;
    Some((first.timestamp.date_naive(), last.timestamp.date_naive()))
}

/// Missing sub-ranges of `requested` given the persisted extent.
///
/// With no persisted data the whole request is missing. Otherwise up to two
/// ranges come back: before the earliest persisted day and after the latest,
/// each sharing its inner endpoint with the extent. Interior gaps within the
/// extent are deliberately not detected; backfills are assumed to extend the
/// series at its boundaries, matching the reference behavior.
pub fn boundary_gaps(
    extent: Option<(NaiveDate, NaiveDate)>,
    requested: &DateRange,
) -> Vec<DateRange> {
    let Some((earliest, latest)) = extent else {
        return vec![*requested];
    };
    let mut gaps = Vec::new();
    if requested.start < earliest {
        gaps.push(DateRange {
            start: requested.start,
            end: earliest,
        });
    }
    if requested.end > latest {
        gaps.push(DateRange {
            start: latest,
            end: requested.end,
        });
    }
    gaps
}

/// Union of an existing series and freshly fetched bars, deduplicated by
/// timestamp with the fetched value winning, sorted ascending.
pub fn merge_bars(existing: Vec<Bar>, fetched: Vec<Bar>) -> Vec<Bar> {
    let mut merged: BTreeMap<i64, Bar> = BTreeMap::new();
    for bar in existing.into_iter().chain(fetched) {
        merged.insert(bar.timestamp.timestamp_millis(), bar);
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).unwrap()
    }

    fn bar(y: i32, m: u32, d: u32, h: u32, min: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        }
    }

    #[test]
    fn absent_dataset_yields_single_full_range() {
        let requested = range(day(2023, 1, 1), day(2023, 12, 31));
        assert_eq!(boundary_gaps(None, &requested), vec![requested]);
    }

    #[test]
    fn gaps_on_both_boundaries() {
        let requested = range(day(2023, 1, 1), day(2023, 12, 31));
        let extent = Some((day(2023, 1, 10), day(2023, 6, 30)));
        assert_eq!(
            boundary_gaps(extent, &requested),
            vec![
                range(day(2023, 1, 1), day(2023, 1, 10)),
                range(day(2023, 6, 30), day(2023, 12, 31)),
            ]
        );
    }

    #[test]
    fn fully_covered_request_has_no_gaps() {
        let requested = range(day(2023, 2, 1), day(2023, 5, 1));
        let extent = Some((day(2023, 1, 10), day(2023, 6, 30)));
        assert!(boundary_gaps(extent, &requested).is_empty());
    }

    #[test]
    fn merge_prefers_fetched_value_on_shared_timestamps() {
        let existing = vec![bar(2023, 3, 1, 9, 0, 10.0), bar(2023, 3, 1, 9, 1, 11.0)];
        let fetched = vec![bar(2023, 3, 1, 9, 1, 99.0), bar(2023, 3, 1, 9, 2, 12.0)];
        let merged = merge_bars(existing, fetched);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].close, 99.0);
        assert!(merged.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
