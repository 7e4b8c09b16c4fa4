use crate::{
    classifier::{
        opportunity_alert, MovingAverageClassifier, OpportunityAlert, TrendClassifier, TrendLabel,
        TwoPointClassifier,
    },
    metrics::{extrema, trailing_mean, Extrema, PricePoint, RollingStats, TrailingAverage},
    TrendResult,
};
use chrono::TimeDelta;
use p2p_core::{
    AnalysisConfig, CanonicalZone, Normalizer, QuoteError, RawRow, RecordParser, Result,
    RowExclusion, Series,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub latest: Option<PricePoint>,
    /// Taken over the full history, independent of any date filter.
    pub extrema: Option<Extrema>,
    pub observations: usize,
    pub filtered_observations: usize,
    pub total_rows: usize,
    pub excluded_rows: usize,
}

/// Everything one refresh produces. Built fresh on every call to
/// [`QuoteAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    /// Date-filtered series for charting and tables.
    pub series: Series,
    /// Moving averages aligned with `series`.
    pub rolling: RollingStats,
    pub summary: Summary,
    /// Short/long moving-average trend over the full history.
    pub trend: TrendResult,
    /// Last-two-points direction over the filtered series.
    pub two_point: TrendLabel,
    pub trailing: Option<TrailingAverage>,
    pub alert: Option<OpportunityAlert>,
    pub excluded: Vec<RowExclusion>,
}

impl TrendReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs the parse, normalize, statistics and classification pipeline.
///
/// Holds only configuration; each call to [`analyze`](Self::analyze) starts
/// from scratch.
#[derive(Debug, Clone)]
pub struct QuoteAnalyzer {
    config: AnalysisConfig,
    parser: RecordParser,
    normalizer: Normalizer,
    moving_average: MovingAverageClassifier,
    trailing: TimeDelta,
}

impl QuoteAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let parser = RecordParser::from_config(&config)?;
        let normalizer = Normalizer::from_config(&config)?;
        let moving_average = MovingAverageClassifier::new(
            config.short_window,
            config.long_window,
            config.flat_threshold,
        )?;
        let trailing = TimeDelta::try_days(config.trailing_days).ok_or_else(|| {
            QuoteError::Configuration(format!(
                "Trailing duration out of range: {} days",
                config.trailing_days
            ))
        })?;

        Ok(Self {
            config,
            parser,
            normalizer,
            moving_average,
            trailing,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn zone(&self) -> CanonicalZone {
        self.normalizer.zone()
    }

    pub fn analyze(&self, rows: &[RawRow]) -> Result<TrendReport> {
        let batch = self.parser.parse(rows)?;
        let excluded_rows = batch.excluded_count();
        let history = self.normalizer.normalize(batch.observations);

        debug!(
            "Normalized {} observations from {} rows",
            history.len(),
            batch.total_rows
        );

        let series = match &self.config.date_range {
            Some(range) => history.filter_dates(range),
            None => history.clone(),
        };

        let rolling = RollingStats::compute(&series, &self.config.windows)?;

        let (short_avg, long_avg) = self.moving_average.averages(&history);
        let trailing = trailing_mean(&history, self.trailing);
        let latest = history.last();

        let trend = TrendResult {
            label: self.moving_average.classify_averages(short_avg, long_avg),
            short_avg,
            long_avg,
            latest_price: latest.map(|obs| obs.price),
            recent_window_avg: trailing.as_ref().map(|t| t.mean),
        };

        let two_point = TwoPointClassifier.classify(&series);
        let alert = latest.and_then(|obs| opportunity_alert(obs, trailing.as_ref()));

        let summary = Summary {
            latest: latest.map(PricePoint::from),
            extrema: extrema(&history),
            observations: history.len(),
            filtered_observations: series.len(),
            total_rows: batch.total_rows,
            excluded_rows,
        };

        info!(
            "Analyzed {} observations ({} shown, {} rows excluded): trend {}, last move {}",
            summary.observations,
            summary.filtered_observations,
            summary.excluded_rows,
            trend.label,
            two_point
        );

        Ok(TrendReport {
            series,
            rolling,
            summary,
            trend,
            two_point,
            trailing,
            alert,
            excluded: batch.excluded,
        })
    }
}
