//! Decoding of provider archives into bars.
//!
//! An archive is a zip of CSV files with `;`-delimited rows:
//!
//! ```text
//! timestamp;open;close;low;high;volume;<ignored>
//! ```
//!
//! Malformed rows are skipped and counted rather than failing the whole
//! archive; the provider's yearly exports occasionally contain truncated
//! lines.

use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use snafu::ResultExt;
use tracing::warn;
use zip::ZipArchive;

use super::{BadArchiveSnafu, ProviderError};
use crate::models::bar::Bar;

/// Bars decoded from one archive, plus the count of rows that were skipped.
#[derive(Debug, Default)]
pub struct DecodedRows {
    pub bars: Vec<Bar>,
    pub skipped: usize,
}

/// Unpacks a provider zip archive into bars.
///
/// Every `.csv` member is decoded; other members are ignored. Bars come back
/// in file order, not necessarily sorted.
pub fn unpack_archive(bytes: &[u8]) -> Result<DecodedRows, ProviderError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context(BadArchiveSnafu)?;
    let mut decoded = DecodedRows::default();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).context(BadArchiveSnafu)?;
        if !file.name().ends_with(".csv") {
            continue;
        }
        // A member that cannot be read is logged, not counted: `skipped`
        // counts individual rows only.
        let mut contents = String::new();
        if file.read_to_string(&mut contents).is_err() {
            warn!(member = file.name(), "unreadable archive member, skipping");
            continue;
        }
        decode_rows(&contents, &mut decoded);
    }
    Ok(decoded)
}

fn decode_rows(contents: &str, decoded: &mut DecodedRows) {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(contents.as_bytes());

    for record in reader.records() {
        match record {
            Ok(record) => match parse_row(&record) {
                Some(bar) => decoded.bars.push(bar),
                None => decoded.skipped += 1,
            },
            Err(_) => decoded.skipped += 1,
        }
    }
}

/// Field layout: `timestamp;open;close;low;high;volume;<ignored>`.
fn parse_row(record: &StringRecord) -> Option<Bar> {
    let timestamp = DateTime::parse_from_rfc3339(record.get(0)?)
        .ok()?
        .with_timezone(&Utc);
    Some(Bar {
        timestamp,
        open: record.get(1)?.parse().ok()?,
        close: record.get(2)?.parse().ok()?,
        low: record.get(3)?.parse().ok()?,
        high: record.get(4)?.parse().ok()?,
        volume: record.get(5)?.parse().ok()?,
    })
}
