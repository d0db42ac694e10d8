//! A local, gap-free cache of historical minute bars.
//!
//! The crate backfills per-instrument OHLCV series incrementally from a
//! remote archive provider, persists them as append-only Parquet fragments,
//! and derives coarser timeframes on read. Entry point:
//! [`cache::CacheOrchestrator`] (`get_data` for one instrument, `get_many`
//! for a bounded-concurrency batch).

pub mod batch;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod provider;
pub mod resample;
pub mod resolver;
pub mod store;

pub use cache::{CacheOrchestrator, SeriesReport};
pub use config::CacheConfig;
pub use errors::Error;
