//! Bounded fan-out of `get_data` across many instruments.
//!
//! Each instrument is an independent resource: one ticker failing (or
//! resolving to nothing) is reported as that ticker's result and never
//! aborts the others. Completion order is unspecified; the returned mapping
//! is complete and in request order.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cache::{CacheOrchestrator, SeriesReport};
use crate::errors::Error;
use crate::models::{date_range::DateRange, timeframe::Timeframe};
use crate::provider::ArchiveSource;

impl<S: ArchiveSource + 'static> CacheOrchestrator<S> {
    /// Runs `get_data` for every ticker under a worker pool bounded by
    /// `concurrency_limit` (0 means the orchestrator's configured default).
    ///
    /// Duplicate tickers collapse to one entry. Cancelling `cancel` aborts
    /// in-flight fetches; affected tickers report `Error::Cancelled`.
    pub async fn get_many(
        self: &Arc<Self>,
        tickers: &[String],
        range: DateRange,
        timeframe: Timeframe,
        concurrency_limit: usize,
        cancel: &CancellationToken,
    ) -> IndexMap<String, Result<SeriesReport, Error>> {
        let limit = if concurrency_limit == 0 {
            self.concurrency
        } else {
            concurrency_limit
        };
        let semaphore = Arc::new(Semaphore::new(limit));

        let mut unique: Vec<String> = Vec::new();
        for ticker in tickers {
            if !unique.contains(ticker) {
                unique.push(ticker.clone());
            }
        }

        let mut tasks = JoinSet::new();
        for ticker in unique.clone() {
            let orchestrator = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("batch semaphore closed");
                let result = orchestrator
                    .get_data(&ticker, range, timeframe, false, &cancel)
                    .await;
                (ticker, result)
            });
        }

        let mut done: HashMap<String, Result<SeriesReport, Error>> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ticker, result)) => {
                    done.insert(ticker, result);
                }
                Err(e) => warn!(error = %e, "batch worker did not complete"),
            }
        }

        // The mapping is complete even when a worker panicked or was aborted.
        let mut results = IndexMap::with_capacity(unique.len());
        for ticker in unique {
            let entry = done
                .remove(&ticker)
                .unwrap_or_else(|| Err(Error::TaskJoin(format!("worker for {ticker} lost"))));
            results.insert(ticker, entry);
        }
        results
    }
}
