pub mod analyzer;
pub mod classifier;
pub mod metrics;

pub use analyzer::{QuoteAnalyzer, Summary, TrendReport};
pub use classifier::{
    opportunity_alert, AlertSignal, MovingAverageClassifier, OpportunityAlert, TrendClassifier,
    TrendLabel, TwoPointClassifier,
};
pub use metrics::{Extrema, PricePoint, RollingStats, TrailingAverage};

use serde::{Deserialize, Serialize};

/// Moving-average trend plus the values it was derived from.
///
/// Every input that may be missing is an `Option`, so an absent average is
/// never confused with a real zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub label: TrendLabel,
    pub short_avg: Option<f64>,
    pub long_avg: Option<f64>,
    pub latest_price: Option<f64>,
    pub recent_window_avg: Option<f64>,
}

impl TrendResult {
    /// Relative gap between the short and long averages, when both exist and
    /// the long one is non-zero.
    pub fn relative_difference(&self) -> Option<f64> {
        match (self.short_avg, self.long_avg) {
            (Some(short), Some(long)) if long != 0.0 => Some((short - long) / long),
            _ => None,
        }
    }
}
