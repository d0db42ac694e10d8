//! Typed provider identifiers.
//!
//! The remote provider keys archives by instrument identifier, and one ticker
//! can resolve to several of them. Keeping the identifier kind in the type
//! makes the fallback-candidate logic in the fetcher explicit instead of
//! shuffling untyped strings around.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A provider-specific instrument key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentId {
    /// Primary identifier; preferred when validated.
    Figi(String),
    /// Alternate identifier, tried second.
    Isin(String),
    /// Provider-internal identifier, tried last.
    Uid(String),
}

impl InstrumentId {
    /// The raw identifier string sent to the provider.
    pub fn as_str(&self) -> &str {
        match self {
            InstrumentId::Figi(s) | InstrumentId::Isin(s) | InstrumentId::Uid(s) => s,
        }
    }

    /// Short code for the identifier kind, used in log lines and file names.
    pub fn kind(&self) -> &'static str {
        match self {
            InstrumentId::Figi(_) => "figi",
            InstrumentId::Isin(_) => "isin",
            InstrumentId::Uid(_) => "uid",
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}
