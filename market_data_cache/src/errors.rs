use thiserror::Error;

use crate::{provider::ProviderError, store::StorageError};

/// The unified error type for the `market_data_cache` crate.
///
/// An empty series is never an error: a ticker with no data for the requested
/// range comes back as an empty, complete result. Partial backfills are not
/// errors either; they are reported through
/// [`SeriesReport::missing`](crate::cache::SeriesReport).
#[derive(Debug, Error)]
pub enum Error {
    /// The ticker resolved to no usable provider identifier.
    #[error("no provider identifier found for ticker {ticker}")]
    NoIdentifierFound { ticker: String },

    /// An error from the remote provider (network, API, retry exhaustion).
    #[error("provider error")]
    Provider(#[from] ProviderError),

    /// An error from the on-disk dataset store.
    #[error("storage error")]
    Storage(#[from] StorageError),

    /// An error related to configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation was aborted via its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// A batch worker task panicked or was aborted.
    #[error("batch task failed: {0}")]
    TaskJoin(String),
}
