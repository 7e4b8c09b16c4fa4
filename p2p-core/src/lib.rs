pub mod model;
pub mod normalize;
pub mod parser;
pub mod zone;

pub use model::{Observation, QuoteSides, Series};
pub use normalize::Normalizer;
pub use parser::{ExclusionReason, ParsedBatch, RawRow, RecordParser, RowExclusion};
pub use zone::CanonicalZone;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuoteError {
    /// The batch as a whole is unusable; no partial result is produced.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QuoteError>;

/// Inclusive range of local calendar dates in the canonical zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Longest accepted moving-average window, in observations.
pub const MAX_WINDOW: usize = 10_000;
/// Longest accepted trailing duration for the alert, in days.
pub const MAX_TRAILING_DAYS: i64 = 3_650;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Zone every observation is converted to before ordering and display.
    pub canonical_timezone: String,
    /// Zone assumed for timestamps that carry no offset of their own.
    pub source_timezone: String,
    pub windows: Vec<usize>,
    pub short_window: usize,
    pub long_window: usize,
    pub trailing_days: i64,
    pub flat_threshold: f64,
    pub date_range: Option<DateRange>,
    pub timestamp_fields: Vec<String>,
    pub price_field: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            canonical_timezone: "America/La_Paz".to_string(),
            source_timezone: "UTC".to_string(),
            windows: vec![7, 14, 30],
            short_window: 7,
            long_window: 30,
            trailing_days: 7,
            flat_threshold: 0.002,
            date_range: None,
            timestamp_fields: vec!["timestamp".to_string(), "datetime_utc".to_string()],
            price_field: "market_median".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn canonical_zone(&self) -> Result<CanonicalZone> {
        self.canonical_timezone.parse()
    }

    pub fn source_zone(&self) -> Result<CanonicalZone> {
        self.source_timezone.parse()
    }

    pub fn validate(&self) -> Result<()> {
        self.canonical_zone()?;
        self.source_zone()?;

        if self.windows.is_empty() {
            return Err(QuoteError::Configuration(
                "No moving average windows configured".to_string(),
            ));
        }

        if let Some(window) = self
            .windows
            .iter()
            .chain([&self.short_window, &self.long_window])
            .find(|w| **w == 0 || **w > MAX_WINDOW)
        {
            return Err(QuoteError::Configuration(format!(
                "Moving average window must be between 1 and {}, got {}",
                MAX_WINDOW, window
            )));
        }

        if self.short_window == 0 || self.short_window >= self.long_window {
            return Err(QuoteError::Configuration(format!(
                "Short window ({}) must be positive and smaller than long window ({})",
                self.short_window, self.long_window
            )));
        }

        if self.trailing_days <= 0 || self.trailing_days > MAX_TRAILING_DAYS {
            return Err(QuoteError::Configuration(format!(
                "Trailing duration must be between 1 and {} days, got {}",
                MAX_TRAILING_DAYS, self.trailing_days
            )));
        }

        if !self.flat_threshold.is_finite() || self.flat_threshold < 0.0 {
            return Err(QuoteError::Configuration(format!(
                "Flat threshold must be a non-negative number, got {}",
                self.flat_threshold
            )));
        }

        if let Some(range) = &self.date_range {
            if range.start > range.end {
                return Err(QuoteError::Configuration(format!(
                    "Date range start {} is after end {}",
                    range.start, range.end
                )));
            }
        }

        if self.timestamp_fields.is_empty() || self.price_field.is_empty() {
            return Err(QuoteError::Configuration(
                "Timestamp and price field names must be configured".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analysis_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.windows, vec![7, 14, 30]);
        assert_eq!(config.trailing_days, 7);
        assert!((config.flat_threshold - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = AnalysisConfig {
            windows: vec![7, 0],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(QuoteError::Configuration(_))));
    }

    #[test]
    fn test_rejects_oversized_windows() {
        let config = AnalysisConfig {
            windows: vec![7, MAX_WINDOW + 1],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(QuoteError::Configuration(_))));

        let config = AnalysisConfig {
            short_window: 7,
            long_window: usize::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            windows: vec![MAX_WINDOW],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_huge_trailing_duration() {
        let config = AnalysisConfig {
            trailing_days: 1_000_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(QuoteError::Configuration(_))));

        let config = AnalysisConfig {
            trailing_days: MAX_TRAILING_DAYS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_windows() {
        let config = AnalysisConfig {
            short_window: 30,
            long_window: 7,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let config = AnalysisConfig {
            canonical_timezone: "Mars/Olympus_Mons".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
        let range = DateRange::new(start, end);

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2025, 10, 4).unwrap()));
    }

    #[test]
    fn test_rejects_reversed_date_range() {
        let config = AnalysisConfig {
            date_range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2025, 10, 5).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            )),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
