//! Backfill fetching: per-year archive downloads for one instrument.
//!
//! The fetcher walks every calendar year overlapping a requested range,
//! picks which identifier to ask for (a validated one when the allow-list
//! has one, otherwise candidates in figi → isin → uid order), retries
//! rate-limit responses with a bounded exponential backoff, and hands both
//! the raw archives and the decoded bars to the dataset store.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Error;
use crate::models::{bar::Bar, date_range::DateRange, identifier::InstrumentId};
use crate::provider::{ArchiveSource, FetchOutcome, RateLimitExhaustedSnafu, decode};
use crate::resolver::{IdCandidates, ValidatedIds};
use crate::store::DatasetStore;

/// Retry policy for rate-limited (identifier, year) fetches.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Retries after the first rate-limit response before giving up.
    pub max_rate_limit_retries: u32,
    /// Base delay of the exponential backoff (doubled per retry).
    pub backoff_base: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

/// Bars fetched for one missing range, with decode statistics.
#[derive(Debug, Default)]
pub struct FetchedRange {
    /// Sorted ascending, already filtered to the requested range.
    pub bars: Vec<Bar>,
    /// Rows dropped because they could not be decoded.
    pub skipped_rows: usize,
}

/// Downloads per-year archives from an [`ArchiveSource`].
pub struct RemoteFetcher<S> {
    source: S,
    config: FetcherConfig,
}

impl<S: ArchiveSource> RemoteFetcher<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, FetcherConfig::default())
    }

    pub fn with_config(source: S, config: FetcherConfig) -> Self {
        Self { source, config }
    }

    /// Fetches all bars for `range`, persisting raw archives along the way.
    ///
    /// A year with no data is skipped silently; identifier ambiguity is
    /// resolved per year by taking the first candidate that yields an
    /// archive. Identifier candidates are cheap to brute-force relative to
    /// network latency, so no cleverer policy is warranted.
    pub async fn fetch_range(
        &self,
        ticker: &str,
        candidates: &IdCandidates,
        validated: &ValidatedIds,
        range: &DateRange,
        store: &DatasetStore,
        cancel: &CancellationToken,
    ) -> Result<FetchedRange, Error> {
        let ordered = candidates.in_preference_order();
        if ordered.is_empty() {
            return Err(Error::NoIdentifierFound {
                ticker: ticker.to_string(),
            });
        }
        let known_valid = ordered.iter().find(|id| validated.contains(id));
        if let Some(id) = known_valid {
            debug!(ticker, %id, "using validated identifier");
        }

        let mut fetched = FetchedRange::default();
        for year in range.years() {
            let archive = match known_valid {
                Some(id) => self
                    .fetch_year_with_retry(id, year, cancel)
                    .await?
                    .map(|bytes| (id, bytes)),
                None => self.try_candidates(&ordered, year, cancel).await?,
            };
            let Some((id, bytes)) = archive else {
                debug!(ticker, year, "no data for year");
                continue;
            };

            store.store_raw_archive(ticker, id, year, &bytes)?;
            let decoded = decode::unpack_archive(&bytes)?;
            if decoded.skipped > 0 {
                warn!(ticker, year, skipped = decoded.skipped, "skipped malformed rows");
            }
            fetched.skipped_rows += decoded.skipped;
            fetched.bars.extend(decoded.bars);
        }

        fetched.bars.retain(|b| range.contains_timestamp(b.timestamp));
        fetched.bars.sort_by_key(|b| b.timestamp);
        info!(ticker, %range, rows = fetched.bars.len(), "fetched range");
        Ok(fetched)
    }

    /// Tries each candidate in order until one yields an archive for `year`.
    async fn try_candidates<'a>(
        &self,
        ordered: &'a [InstrumentId],
        year: i32,
        cancel: &CancellationToken,
    ) -> Result<Option<(&'a InstrumentId, Vec<u8>)>, Error> {
        for id in ordered {
            if let Some(bytes) = self.fetch_year_with_retry(id, year, cancel).await? {
                return Ok(Some((id, bytes)));
            }
        }
        Ok(None)
    }

    /// One (identifier, year) fetch with bounded backoff on rate limiting.
    async fn fetch_year_with_retry(
        &self,
        id: &InstrumentId,
        year: i32,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.source.fetch_year(id, year).await? {
                FetchOutcome::Archive(bytes) => return Ok(Some(bytes)),
                FetchOutcome::NoData => return Ok(None),
                FetchOutcome::RateLimited => {
                    if attempt >= self.config.max_rate_limit_retries {
                        return Err(RateLimitExhaustedSnafu { attempts: attempt }.build().into());
                    }
                    let delay = self.config.backoff_base * 2u32.saturating_pow(attempt);
                    warn!(%id, year, attempt, ?delay, "rate limited, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}
