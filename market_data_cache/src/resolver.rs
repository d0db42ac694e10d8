//! Instrument resolution: ticker → provider identifier candidates.
//!
//! Resolution itself is an external concern; this module only fixes the
//! interface and provides an in-memory implementation backed by an immutable
//! directory table. The directory is constructed once by the caller and
//! injected wherever it is needed; there is no process-wide instrument state.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::models::identifier::InstrumentId;

/// Identifier candidates for one ticker, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdCandidates {
    pub figis: Vec<String>,
    pub isins: Vec<String>,
    pub uids: Vec<String>,
}

impl IdCandidates {
    pub fn is_empty(&self) -> bool {
        self.figis.is_empty() && self.isins.is_empty() && self.uids.is_empty()
    }

    /// All candidates in fallback order: figi, then isin, then uid.
    pub fn in_preference_order(&self) -> Vec<InstrumentId> {
        let mut out = Vec::with_capacity(self.figis.len() + self.isins.len() + self.uids.len());
        out.extend(self.figis.iter().cloned().map(InstrumentId::Figi));
        out.extend(self.isins.iter().cloned().map(InstrumentId::Isin));
        out.extend(self.uids.iter().cloned().map(InstrumentId::Uid));
        out
    }
}

/// Maps a ticker to its provider identifier candidates.
pub trait InstrumentResolver: Send + Sync {
    /// Candidates for `ticker`. Empty candidates mean the ticker is unknown
    /// to the provider.
    fn candidates(&self, ticker: &str) -> IdCandidates;
}

/// One row of the instrument directory.
#[derive(Debug, Clone)]
pub struct InstrumentRecord {
    pub ticker: String,
    pub figi: String,
    pub isin: String,
    pub uid: String,
}

/// An immutable ticker → identifiers lookup table.
///
/// A ticker may appear in several rows (e.g. multiple listings); all of its
/// identifiers become candidates, in row order.
#[derive(Debug, Clone, Default)]
pub struct InstrumentDirectory {
    rows: Vec<InstrumentRecord>,
}

impl InstrumentDirectory {
    pub fn new(rows: Vec<InstrumentRecord>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl InstrumentResolver for InstrumentDirectory {
    fn candidates(&self, ticker: &str) -> IdCandidates {
        let mut out = IdCandidates::default();
        for row in self.rows.iter().filter(|r| r.ticker == ticker) {
            out.figis.push(row.figi.clone());
            out.isins.push(row.isin.clone());
            out.uids.push(row.uid.clone());
        }
        out
    }
}

/// Externally maintained allow-list of identifiers known to yield data.
///
/// When a candidate appears in this list the fetcher uses it alone instead of
/// brute-forcing every candidate per year.
#[derive(Debug, Clone, Default)]
pub struct ValidatedIds {
    ids: HashSet<String>,
}

impl ValidatedIds {
    /// Loads the allow-list from a file with one identifier per line.
    /// Blank lines are skipped.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut ids = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                ids.insert(trimmed.to_string());
            }
        }
        Ok(Self { ids })
    }

    /// An empty list; every fetch falls back to candidate brute-force.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.ids.contains(id.as_str())
    }
}
