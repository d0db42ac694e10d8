#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use market_data_cache::models::{date_range::DateRange, identifier::InstrumentId};
use market_data_cache::provider::{ArchiveSource, FetchOutcome, ProviderError};
use market_data_cache::resolver::{InstrumentDirectory, InstrumentRecord};
use zip::write::SimpleFileOptions;

/// Builds a provider-style zip archive holding one CSV member.
pub fn archive(rows: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("bars.csv", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(rows.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// One provider CSV row (`timestamp;open;close;low;high;volume;unused`).
pub fn row(ts: &str, open: f64, close: f64, low: f64, high: f64, volume: u64) -> String {
    format!("{ts};{open};{close};{low};{high};{volume};0\n")
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
    DateRange::new(day(start.0, start.1, start.2), day(end.0, end.1, end.2)).unwrap()
}

/// A one-ticker directory resolving to a single figi.
pub fn single_figi_directory(ticker: &str, figi: &str) -> InstrumentDirectory {
    InstrumentDirectory::new(vec![InstrumentRecord {
        ticker: ticker.to_string(),
        figi: figi.to_string(),
        isin: format!("{figi}-isin"),
        uid: format!("{figi}-uid"),
    }])
}

/// Scripted responses for one (identifier, year) pair, consumed in order.
/// Once the script runs out the source answers `NoData`.
pub enum Planned {
    Archive(Vec<u8>),
    NoData,
    RateLimited,
}

#[derive(Clone, Default)]
pub struct StubSource {
    inner: Arc<StubInner>,
}

#[derive(Default)]
struct StubInner {
    plan: Mutex<HashMap<(String, i32), Vec<Planned>>>,
    calls: Mutex<Vec<(String, i32)>>,
    delay: Mutex<Duration>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, id: &str, year: i32, outcome: Planned) {
        self.inner
            .plan
            .lock()
            .unwrap()
            .entry((id.to_string(), year))
            .or_default()
            .push(outcome);
    }

    /// Adds artificial latency to every `fetch_year` call, keeping requests
    /// in flight long enough for concurrent callers to overlap.
    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, i32)> {
        self.inner.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveSource for StubSource {
    async fn fetch_year(
        &self,
        id: &InstrumentId,
        year: i32,
    ) -> Result<FetchOutcome, ProviderError> {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push((id.as_str().to_string(), year));
        let delay = *self.inner.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = {
            let mut plan = self.inner.plan.lock().unwrap();
            match plan.get_mut(&(id.as_str().to_string(), year)) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            }
        };
        Ok(match next {
            Some(Planned::Archive(bytes)) => FetchOutcome::Archive(bytes),
            Some(Planned::RateLimited) => FetchOutcome::RateLimited,
            Some(Planned::NoData) | None => FetchOutcome::NoData,
        })
    }
}
