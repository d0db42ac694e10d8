//! Top-level orchestration: cached reads with incremental backfill.
//!
//! For one instrument and date range, `get_data` loads whatever is already
//! persisted, fetches only the missing boundary ranges, merges and persists
//! after each one, then filters and optionally resamples. The load → fetch →
//! merge → persist cycle runs under a per-instrument async lock so two
//! concurrent requests for the same ticker cannot interleave their writes
//! and silently drop an update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::CacheConfig;
use crate::errors::Error;
use crate::fetcher::{FetcherConfig, RemoteFetcher};
use crate::models::{
    bar::Bar, bar_series::BarSeries, date_range::DateRange, timeframe::Timeframe,
};
use crate::provider::{ArchiveSource, HistoryClient};
use crate::resample::resample;
use crate::resolver::{InstrumentResolver, ValidatedIds};
use crate::store::{self, DatasetStore};

/// The result of a `get_data` call.
///
/// `missing` lists requested sub-ranges that could not be backfilled; a
/// non-empty list means the series is best-effort partial, and callers must
/// not treat it as complete. An empty series with empty `missing` is a valid
/// "no data for this instrument/range" result.
#[derive(Debug)]
pub struct SeriesReport {
    pub series: BarSeries,
    /// Requested sub-ranges still uncovered after fetching.
    pub missing: Vec<DateRange>,
    /// Malformed provider rows dropped while decoding.
    pub skipped_rows: usize,
}

impl SeriesReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Serializes writers per instrument.
///
/// The on-disk cache for one ticker is a single-writer resource: the lock is
/// held for the whole load-merge-persist cycle.
#[derive(Default)]
struct InstrumentLocks {
    inner: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InstrumentLocks {
    async fn acquire(&self, ticker: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("instrument lock map poisoned");
            Arc::clone(map.entry(ticker.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// The cache entry point for a single data source.
pub struct CacheOrchestrator<S> {
    store: DatasetStore,
    fetcher: RemoteFetcher<S>,
    resolver: Arc<dyn InstrumentResolver>,
    validated: ValidatedIds,
    locks: InstrumentLocks,
    pub(crate) concurrency: usize,
}

impl CacheOrchestrator<HistoryClient> {
    /// Builds an orchestrator over the real HTTP client from a config.
    pub fn from_config(
        config: &CacheConfig,
        resolver: Arc<dyn InstrumentResolver>,
    ) -> Result<Self, Error> {
        let client = HistoryClient::new(&config.endpoint)
            .map_err(|e| Error::Config(e.to_string()))?;
        let validated = match &config.validated_ids_file {
            Some(path) => ValidatedIds::from_file(path)
                .map_err(|e| Error::Config(format!("allow-list {}: {e}", path.display())))?,
            None => ValidatedIds::empty(),
        };
        let fetcher_config = FetcherConfig {
            max_rate_limit_retries: config.max_rate_limit_retries,
            backoff_base: config.backoff_base(),
        };
        Ok(Self::new(
            DatasetStore::new(&config.base_dir)?,
            RemoteFetcher::with_config(client, fetcher_config),
            resolver,
            validated,
        )
        .with_concurrency(config.concurrency))
    }
}

impl<S: ArchiveSource> CacheOrchestrator<S> {
    pub fn new(
        store: DatasetStore,
        fetcher: RemoteFetcher<S>,
        resolver: Arc<dyn InstrumentResolver>,
        validated: ValidatedIds,
    ) -> Self {
        Self {
            store,
            fetcher,
            resolver,
            validated,
            locks: InstrumentLocks::default(),
            concurrency: 5,
        }
    }

    /// Default worker-pool bound used by `get_many`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Returns bars for `ticker` over `range` at `timeframe`, backfilling
    /// missing data from the provider.
    ///
    /// With `force_refresh` the cache is bypassed and the full range is
    /// fetched fresh (and persisted). Fetch failures for individual missing
    /// sub-ranges do not discard progress: already-merged data is returned
    /// and the uncovered ranges are reported in the result.
    pub async fn get_data(
        &self,
        ticker: &str,
        range: DateRange,
        timeframe: Timeframe,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<SeriesReport, Error> {
        let _guard = self.locks.acquire(ticker).await;

        let candidates = self.resolver.candidates(ticker);
        let mut missing = Vec::new();
        let mut skipped_rows = 0;

        let working: Vec<Bar> = if force_refresh {
            let fetched = self
                .fetcher
                .fetch_range(ticker, &candidates, &self.validated, &range, &self.store, cancel)
                .await?;
            self.store.save_fragment(ticker, &fetched.bars)?;
            skipped_rows = fetched.skipped_rows;
            // Archives can repeat a timestamp; dedup matches the load path.
            store::merge_bars(Vec::new(), fetched.bars)
        } else {
            match self.store.load(ticker)? {
                None => {
                    let fetched = self
                        .fetcher
                        .fetch_range(
                            ticker,
                            &candidates,
                            &self.validated,
                            &range,
                            &self.store,
                            cancel,
                        )
                        .await?;
                    self.store.save_fragment(ticker, &fetched.bars)?;
                    skipped_rows = fetched.skipped_rows;
                    store::merge_bars(Vec::new(), fetched.bars)
                }
                Some(existing) => {
                    let gaps = store::boundary_gaps(store::series_extent(&existing), &range);
                    let mut working = existing;
                    // Strictly ordered: each merge builds on the previous
                    // persisted state, and a crash loses at most one
                    // sub-range of progress.
                    for gap in gaps {
                        match self
                            .fetcher
                            .fetch_range(
                                ticker,
                                &candidates,
                                &self.validated,
                                &gap,
                                &self.store,
                                cancel,
                            )
                            .await
                        {
                            Ok(fetched) => {
                                self.store.save_fragment(ticker, &fetched.bars)?;
                                skipped_rows += fetched.skipped_rows;
                                working = store::merge_bars(working, fetched.bars);
                            }
                            Err(Error::Cancelled) => return Err(Error::Cancelled),
                            Err(e @ Error::NoIdentifierFound { .. }) => return Err(e),
                            Err(e) => {
                                warn!(ticker, %gap, error = %e, "backfill failed for sub-range");
                                missing.push(gap);
                            }
                        }
                    }
                    working
                }
            }
        };

        let mut bars: Vec<Bar> = working
            .into_iter()
            .filter(|b| range.contains_timestamp(b.timestamp))
            .collect();
        if !timeframe.is_native() {
            bars = resample(&bars, timeframe);
        }
        if !missing.is_empty() {
            info!(ticker, uncovered = missing.len(), "returning partial series");
        }
        Ok(SeriesReport {
            series: BarSeries {
                ticker: ticker.to_string(),
                timeframe,
                bars,
            },
            missing,
            skipped_rows,
        })
    }
}
