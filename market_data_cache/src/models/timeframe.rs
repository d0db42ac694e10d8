//! Aggregation targets for a minute-level series.
//!
//! A [`Timeframe`] is never stored with a series fragment; coarser intervals
//! are always derived on read from the native minute bars.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// The bucket width used when aggregating minute bars.
///
/// `Min1` is the native resolution of persisted data; every other variant is
/// derived by [`resample`](crate::resample::resample).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    /// Native 1-minute bars, returned as persisted.
    Min1,
    /// 5-minute buckets, aligned to the hour.
    Min5,
    /// 15-minute buckets, aligned to the hour.
    Min15,
    /// Hourly buckets, aligned to the day.
    Hour1,
    /// Calendar days (UTC).
    Day1,
    /// Monday-based weeks (UTC).
    Week1,
    /// Calendar months (UTC).
    Month1,
}

impl Timeframe {
    /// Whether this is the native persisted resolution (no aggregation).
    pub fn is_native(&self) -> bool {
        matches!(self, Timeframe::Min1)
    }
}

#[derive(Debug, Error)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(String);

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Min1 => "1min",
            Timeframe::Min5 => "5min",
            Timeframe::Min15 => "15min",
            Timeframe::Hour1 => "1h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1M",
        };
        f.write_str(s)
    }
}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(Timeframe::Min1),
            "5min" => Ok(Timeframe::Min5),
            "15min" => Ok(Timeframe::Min15),
            "1h" => Ok(Timeframe::Hour1),
            "1d" => Ok(Timeframe::Day1),
            "1w" => Ok(Timeframe::Week1),
            "1M" => Ok(Timeframe::Month1),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        for tf in [
            Timeframe::Min1,
            Timeframe::Min5,
            Timeframe::Min15,
            Timeframe::Hour1,
            Timeframe::Day1,
            Timeframe::Week1,
            Timeframe::Month1,
        ] {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!("2min".parse::<Timeframe>().is_err());
        assert!("".parse::<Timeframe>().is_err());
    }
}
