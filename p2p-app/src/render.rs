use p2p_core::{CanonicalZone, Observation};
use p2p_trend::{PricePoint, TrendReport};
use std::fmt;

/// Plain-text view of a [`TrendReport`]: headline figures, both trend
/// readings, the alert and a newest-first table of the shown records.
pub struct TextReport<'a> {
    report: &'a TrendReport,
    zone: CanonicalZone,
    limit: Option<usize>,
}

impl<'a> TextReport<'a> {
    pub fn new(report: &'a TrendReport, zone: CanonicalZone) -> Self {
        Self {
            report,
            zone,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn write_point(f: &mut fmt::Formatter<'_>, label: &str, point: Option<&PricePoint>) -> fmt::Result {
        match point {
            Some(point) => writeln!(
                f,
                "{:<14}{:>10.3}   {}",
                label,
                point.price,
                point.timestamp.format("%Y-%m-%d %H:%M")
            ),
            None => writeln!(f, "{:<14}{:>10}", label, "-"),
        }
    }

    fn write_row(f: &mut fmt::Formatter<'_>, obs: &Observation) -> fmt::Result {
        let quotes = &obs.quotes;
        write!(
            f,
            "{:<10}  {:<8}  {:<5}  {:<4}",
            obs.local_date(),
            obs.local_time(),
            obs.asset.as_deref().unwrap_or("-"),
            obs.fiat.as_deref().unwrap_or("-"),
        )?;

        for value in [
            quotes.buy_min,
            quotes.buy_max,
            quotes.buy_median,
            quotes.buy_avg,
            quotes.sell_min,
            quotes.sell_max,
            quotes.sell_median,
            quotes.sell_avg,
            Some(obs.price),
        ] {
            write!(f, "  {:>9}", cell(value))?;
        }
        writeln!(f)
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let summary = &report.summary;

        writeln!(f, "P2P quotes ({})", self.zone)?;
        writeln!(
            f,
            "{} observations, {} shown, {} of {} rows excluded",
            summary.observations,
            summary.filtered_observations,
            summary.excluded_rows,
            summary.total_rows
        )?;
        writeln!(f)?;

        Self::write_point(f, "Latest", summary.latest.as_ref())?;
        Self::write_point(f, "Historic max", summary.extrema.as_ref().map(|e| &e.max))?;
        Self::write_point(f, "Historic min", summary.extrema.as_ref().map(|e| &e.min))?;
        writeln!(f)?;

        writeln!(f, "Last move:     {}", report.two_point)?;
        match (
            report.trend.short_avg,
            report.trend.long_avg,
            report.trend.relative_difference(),
        ) {
            (Some(short), Some(long), Some(relative)) => writeln!(
                f,
                "Trend:         {} (short {:.3}, long {:.3}, {:+.2}%)",
                report.trend.label,
                short,
                long,
                relative * 100.0
            )?,
            _ => writeln!(f, "Trend:         {}", report.trend.label)?,
        }

        if let Some(alert) = &report.alert {
            writeln!(f, "{}", alert.description)?;
        }

        writeln!(f)?;
        write!(f, "{:<10}  {:<8}  {:<5}  {:<4}", "Date", "Time", "Asset", "Fiat")?;
        for column in COLUMNS {
            write!(f, "  {:>9}", column)?;
        }
        writeln!(f)?;

        let shown = self.limit.unwrap_or(report.series.len());
        for obs in report.series.iter().rev().take(shown) {
            Self::write_row(f, obs)?;
        }

        if report.series.is_empty() {
            writeln!(f, "(no records in the selected range)")?;
        }

        Ok(())
    }
}

const COLUMNS: [&str; 9] = [
    "Buy min", "Buy max", "Buy med", "Buy avg", "Sell min", "Sell max", "Sell med", "Sell avg",
    "Market",
];

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}
