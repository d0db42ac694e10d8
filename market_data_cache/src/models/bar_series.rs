//! A collection of time-series bars for a specific ticker and timeframe.

use crate::models::{bar::Bar, timeframe::Timeframe};

/// A complete set of time-series data for a single instrument.
///
/// Groups a vector of [`Bar`]s with their ticker and [`Timeframe`], making the
/// data set self-describing. Bars are sorted ascending by timestamp with no
/// duplicate timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The ticker this data represents (e.g., "SBER").
    pub ticker: String,
    /// The time interval for each bar in the series.
    pub timeframe: Timeframe,
    /// The collection of OHLCV bars.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    /// An empty series is a valid result meaning "no data for this
    /// instrument/range", not an error.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
