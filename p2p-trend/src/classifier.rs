use crate::metrics::{latest_sma, TrailingAverage};
use chrono::{DateTime, FixedOffset};
use p2p_core::{Observation, QuoteError, Result, Series};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    Rising,
    Falling,
    Flat,
    InsufficientData,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrendLabel::Rising => "rising",
            TrendLabel::Falling => "falling",
            TrendLabel::Flat => "flat",
            TrendLabel::InsufficientData => "insufficient data",
        };
        f.write_str(label)
    }
}

pub trait TrendClassifier {
    fn classify(&self, series: &Series) -> TrendLabel;
}

/// Compares the last two prices. Equal prices count as falling.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoPointClassifier;

impl TrendClassifier for TwoPointClassifier {
    fn classify(&self, series: &Series) -> TrendLabel {
        match series.last_two() {
            Some((previous, latest)) if latest.price > previous.price => TrendLabel::Rising,
            Some(_) => TrendLabel::Falling,
            None => TrendLabel::InsufficientData,
        }
    }
}

/// Compares a short moving average against a long one.
///
/// The relative difference `(short - long) / long` is Rising above the
/// threshold, Falling below its negation and Flat in between.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverageClassifier {
    short_window: usize,
    long_window: usize,
    threshold: f64,
}

impl MovingAverageClassifier {
    pub fn new(short_window: usize, long_window: usize, threshold: f64) -> Result<Self> {
        if short_window == 0 || long_window == 0 {
            return Err(QuoteError::Configuration(
                "Moving average windows must be positive".to_string(),
            ));
        }

        if !threshold.is_finite() || threshold < 0.0 {
            return Err(QuoteError::Configuration(format!(
                "Invalid trend threshold: {}",
                threshold
            )));
        }

        Ok(Self {
            short_window,
            long_window,
            threshold,
        })
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }

    /// Latest short and long averages; both `None` for an empty series.
    pub fn averages(&self, series: &Series) -> (Option<f64>, Option<f64>) {
        // Windows are validated in `new`, so the SMA cannot fail here.
        let short = latest_sma(series, self.short_window).ok().flatten();
        let long = latest_sma(series, self.long_window).ok().flatten();
        (short, long)
    }

    pub fn classify_averages(&self, short_avg: Option<f64>, long_avg: Option<f64>) -> TrendLabel {
        let (short, long) = match (short_avg, long_avg) {
            (Some(short), Some(long)) if long != 0.0 => (short, long),
            _ => return TrendLabel::InsufficientData,
        };

        let relative = (short - long) / long;
        if relative > self.threshold {
            TrendLabel::Rising
        } else if relative < -self.threshold {
            TrendLabel::Falling
        } else {
            TrendLabel::Flat
        }
    }
}

impl TrendClassifier for MovingAverageClassifier {
    fn classify(&self, series: &Series) -> TrendLabel {
        let (short, long) = self.averages(series);
        self.classify_averages(short, long)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSignal {
    /// Latest price is below the trailing average.
    Opportunity,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityAlert {
    pub signal: AlertSignal,
    pub timestamp: DateTime<FixedOffset>,
    pub latest_price: f64,
    pub trailing_average: f64,
    pub trailing_count: usize,
    pub percentage_change: Option<f64>,
    pub description: String,
}

/// Compares the latest price against the trailing-duration average.
///
/// No alert is produced when there is no trailing average.
pub fn opportunity_alert(
    latest: &Observation,
    trailing: Option<&TrailingAverage>,
) -> Option<OpportunityAlert> {
    let trailing = trailing?;

    let signal = if latest.price < trailing.mean {
        AlertSignal::Opportunity
    } else {
        AlertSignal::Neutral
    };

    let percentage_change = if trailing.mean > 0.0 {
        Some((latest.price - trailing.mean) / trailing.mean * 100.0)
    } else {
        None
    };

    let days = (trailing.to - trailing.from).num_days();
    let description = match signal {
        AlertSignal::Opportunity => format!(
            "Opportunity: current value ({:.3}) is below the {}-day average ({:.3})",
            latest.price, days, trailing.mean
        ),
        AlertSignal::Neutral => format!(
            "Current value ({:.3}) is at or above the {}-day average ({:.3})",
            latest.price, days, trailing.mean
        ),
    };

    if signal == AlertSignal::Opportunity {
        info!("{}", description);
    }

    Some(OpportunityAlert {
        signal,
        timestamp: latest.timestamp,
        latest_price: latest.price,
        trailing_average: trailing.mean,
        trailing_count: trailing.count,
        percentage_change,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::trailing_mean;
    use chrono::{TimeDelta, TimeZone, Utc};
    use p2p_core::Normalizer;

    fn series_of(prices: &[f64]) -> Series {
        let observations = prices
            .iter()
            .enumerate()
            .map(|(i, price)| {
                let ts = Utc.with_ymd_and_hms(2025, 10, 1, i as u32, 0, 0).unwrap();
                Observation::new(ts.fixed_offset(), *price)
            })
            .collect();
        Normalizer::default().normalize(observations)
    }

    fn classifier() -> MovingAverageClassifier {
        MovingAverageClassifier::new(7, 30, 0.002).unwrap()
    }

    #[test]
    fn test_two_point_rising() {
        assert_eq!(
            TwoPointClassifier.classify(&series_of(&[99.0, 100.0, 105.0])),
            TrendLabel::Rising
        );
    }

    #[test]
    fn test_two_point_falling() {
        assert_eq!(
            TwoPointClassifier.classify(&series_of(&[99.0, 105.0, 100.0])),
            TrendLabel::Falling
        );
        assert_eq!(
            TwoPointClassifier.classify(&series_of(&[100.0, 100.0])),
            TrendLabel::Falling
        );
    }

    #[test]
    fn test_two_point_insufficient() {
        assert_eq!(
            TwoPointClassifier.classify(&series_of(&[100.0])),
            TrendLabel::InsufficientData
        );
        assert_eq!(
            TwoPointClassifier.classify(&series_of(&[])),
            TrendLabel::InsufficientData
        );
    }

    #[test]
    fn test_average_threshold() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify_averages(Some(101.0), Some(100.0)),
            TrendLabel::Rising
        );
        assert_eq!(
            classifier.classify_averages(Some(100.1), Some(100.0)),
            TrendLabel::Flat
        );
        assert_eq!(
            classifier.classify_averages(Some(99.0), Some(100.0)),
            TrendLabel::Falling
        );
        assert_eq!(
            classifier.classify_averages(Some(99.9), Some(100.0)),
            TrendLabel::Flat
        );
    }

    #[test]
    fn test_average_missing_or_zero_long() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify_averages(Some(1.0), Some(0.0)),
            TrendLabel::InsufficientData
        );
        assert_eq!(
            classifier.classify_averages(Some(1.0), None),
            TrendLabel::InsufficientData
        );
        assert_eq!(
            classifier.classify(&series_of(&[])),
            TrendLabel::InsufficientData
        );
    }

    #[test]
    fn test_average_classification_over_series() {
        let classifier = MovingAverageClassifier::new(2, 4, 0.002).unwrap();

        // short = (110 + 120) / 2 = 115, long = (100 + 100 + 110 + 120) / 4 = 107.5
        let series = series_of(&[100.0, 100.0, 110.0, 120.0]);
        let (short, long) = classifier.averages(&series);
        assert!((short.unwrap() - 115.0).abs() < 1e-9);
        assert!((long.unwrap() - 107.5).abs() < 1e-9);
        assert_eq!(classifier.classify(&series), TrendLabel::Rising);
    }

    #[test]
    fn test_classifications_can_disagree() {
        // Long decline followed by a single uptick.
        let series = series_of(&[120.0, 118.0, 115.0, 110.0, 105.0, 100.0, 101.0]);
        let classifier = MovingAverageClassifier::new(2, 7, 0.002).unwrap();

        assert_eq!(TwoPointClassifier.classify(&series), TrendLabel::Rising);
        assert_eq!(classifier.classify(&series), TrendLabel::Falling);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(MovingAverageClassifier::new(0, 30, 0.002).is_err());
        assert!(MovingAverageClassifier::new(7, 30, -0.1).is_err());
        assert!(MovingAverageClassifier::new(7, 30, f64::NAN).is_err());
    }

    #[test]
    fn test_opportunity_alert() {
        let series = series_of(&[7.0, 7.1, 7.2, 6.9]);
        let trailing = trailing_mean(&series, TimeDelta::days(7));
        let alert = opportunity_alert(series.last().unwrap(), trailing.as_ref()).unwrap();

        assert_eq!(alert.signal, AlertSignal::Opportunity);
        assert!((alert.trailing_average - 7.05).abs() < 1e-9);
        assert_eq!(alert.trailing_count, 4);
        assert!(alert.percentage_change.unwrap() < 0.0);
        assert!(alert.description.starts_with("Opportunity"));
    }

    #[test]
    fn test_neutral_alert_at_average() {
        let series = series_of(&[7.0, 7.0]);
        let trailing = trailing_mean(&series, TimeDelta::days(7));
        let alert = opportunity_alert(series.last().unwrap(), trailing.as_ref()).unwrap();

        assert_eq!(alert.signal, AlertSignal::Neutral);
        assert_eq!(alert.percentage_change, Some(0.0));
    }

    #[test]
    fn test_no_alert_without_trailing_average() {
        let series = series_of(&[7.0]);
        assert!(opportunity_alert(series.last().unwrap(), None).is_none());
    }
}
