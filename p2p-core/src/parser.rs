//! Raw record parsing.
//!
//! Turns loosely-typed rows (field name to raw value) into [`Observation`]s.
//! A bad row is excluded and reported; only a structurally unusable batch
//! fails as a whole.

use crate::{AnalysisConfig, CanonicalZone, Observation, QuoteError, QuoteSides, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

pub type RawRow = serde_json::Map<String, Value>;

// Offset-bearing layouts, tried after RFC 3339.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

// Wall-clock layouts, interpreted in the source zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

// Epoch values above this are taken to be milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

// Smallest epoch (2001-09-09) accepted from a text cell.
const MIN_STRING_EPOCH: f64 = 1e9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExclusionReason {
    MissingTimestamp,
    InvalidTimestamp(String),
    MissingPrice,
    InvalidPrice(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::MissingTimestamp => write!(f, "missing timestamp"),
            ExclusionReason::InvalidTimestamp(raw) => write!(f, "unparsable timestamp {:?}", raw),
            ExclusionReason::MissingPrice => write!(f, "missing price"),
            ExclusionReason::InvalidPrice(raw) => write!(f, "invalid price {:?}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowExclusion {
    /// Zero-based position of the row in the input batch.
    pub row: usize,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone)]
pub struct ParsedBatch {
    pub observations: Vec<Observation>,
    pub excluded: Vec<RowExclusion>,
    pub total_rows: usize,
}

impl ParsedBatch {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}

#[derive(Debug, Clone)]
pub struct RecordParser {
    timestamp_fields: Vec<String>,
    price_field: String,
    source_zone: CanonicalZone,
}

impl RecordParser {
    pub fn new(
        timestamp_fields: Vec<String>,
        price_field: impl Into<String>,
        source_zone: CanonicalZone,
    ) -> Self {
        Self {
            timestamp_fields,
            price_field: price_field.into(),
            source_zone,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self::new(
            config.timestamp_fields.clone(),
            config.price_field.clone(),
            config.source_zone()?,
        ))
    }

    /// Parses a batch of rows.
    ///
    /// Fails with [`QuoteError::MalformedInput`] when the batch is empty,
    /// when no row carries a timestamp or price column at all, or when no row
    /// survives parsing. Otherwise every bad row is listed in
    /// [`ParsedBatch::excluded`].
    pub fn parse(&self, rows: &[RawRow]) -> Result<ParsedBatch> {
        if rows.is_empty() {
            return Err(QuoteError::MalformedInput("input contains no rows".to_string()));
        }

        let has_timestamp_column = rows
            .iter()
            .any(|row| self.timestamp_fields.iter().any(|f| row.contains_key(f)));
        if !has_timestamp_column {
            return Err(QuoteError::MalformedInput(format!(
                "no timestamp column found (expected one of {:?})",
                self.timestamp_fields
            )));
        }

        if !rows.iter().any(|row| row.contains_key(&self.price_field)) {
            return Err(QuoteError::MalformedInput(format!(
                "no price column found (expected {:?})",
                self.price_field
            )));
        }

        let mut observations = Vec::with_capacity(rows.len());
        let mut excluded = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            match self.parse_row(row) {
                Ok(observation) => observations.push(observation),
                Err(reason) => {
                    debug!("Excluding row {}: {}", index, reason);
                    excluded.push(RowExclusion { row: index, reason });
                }
            }
        }

        if observations.is_empty() {
            return Err(QuoteError::MalformedInput(format!(
                "none of the {} rows could be parsed",
                rows.len()
            )));
        }

        if !excluded.is_empty() {
            warn!(
                "Excluded {} of {} rows during parsing",
                excluded.len(),
                rows.len()
            );
        }

        Ok(ParsedBatch {
            observations,
            excluded,
            total_rows: rows.len(),
        })
    }

    fn parse_row(&self, row: &RawRow) -> std::result::Result<Observation, ExclusionReason> {
        let raw_timestamp = self
            .timestamp_fields
            .iter()
            .filter_map(|f| row.get(f))
            .find(|v| !is_blank(v))
            .ok_or(ExclusionReason::MissingTimestamp)?;

        let timestamp = parse_timestamp(raw_timestamp, self.source_zone)
            .ok_or_else(|| ExclusionReason::InvalidTimestamp(raw_text(raw_timestamp)))?;

        let raw_price = row
            .get(&self.price_field)
            .filter(|v| !is_blank(v))
            .ok_or(ExclusionReason::MissingPrice)?;

        let price = parse_number(raw_price)
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| ExclusionReason::InvalidPrice(raw_text(raw_price)))?;

        let aux = |field: &str| row.get(field).and_then(parse_number).filter(|v| v.is_finite());

        Ok(Observation {
            timestamp,
            price,
            asset: row.get("asset").and_then(text),
            fiat: row.get("fiat").and_then(text),
            quotes: QuoteSides {
                buy_min: aux("buy_min"),
                buy_max: aux("buy_max"),
                buy_median: aux("buy_median"),
                buy_avg: aux("buy_avg"),
                sell_min: aux("sell_min"),
                sell_max: aux("sell_max"),
                sell_median: aux("sell_median"),
                sell_avg: aux("sell_avg"),
            },
        })
    }
}

/// Parses a raw timestamp value.
///
/// Strings may be RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]±HH:MM`, a wall-clock
/// layout (interpreted in `source_zone`), a bare date, or a Unix epoch of at
/// least ten digits. Numbers are Unix epochs in seconds, or milliseconds above
/// 1e12.
pub fn parse_timestamp(value: &Value, source_zone: CanonicalZone) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?, source_zone),
        Value::String(s) => parse_timestamp_str(s.trim(), source_zone),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str, source_zone: CanonicalZone) -> Option<DateTime<FixedOffset>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }

    for format in ZONED_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(s, format) {
            return source_zone.from_local(local);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return source_zone.from_local(date.and_hms_opt(0, 0, 0)?);
    }

    // Short digit runs such as "20251005" are compact dates, not epochs.
    if !s.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    s.parse::<f64>()
        .ok()
        .filter(|epoch| *epoch >= MIN_STRING_EPOCH)
        .and_then(|epoch| from_epoch(epoch, source_zone))
}

fn from_epoch(epoch: f64, zone: CanonicalZone) -> Option<DateTime<FixedOffset>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }

    let utc = if epoch > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch.round() as i64)?
    } else {
        let secs = epoch.trunc();
        let nanos = ((epoch - secs) * 1e9).round() as u32;
        DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))?
    };

    Some(zone.convert(&utc))
}

pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
