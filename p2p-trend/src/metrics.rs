//! Rolling statistics over a [`Series`].
//!
//! Everything here is a pure function of its input series; nothing is cached
//! between calls.

use chrono::{DateTime, FixedOffset, TimeDelta};
use p2p_core::{Observation, QuoteError, Result, Series};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use ta::indicators::SimpleMovingAverage;
use ta::Next;
use tracing::debug;

/// Simple moving average aligned with `series`.
///
/// Entry `i` is the mean of the last `min(window, i + 1)` prices, so the
/// first points average over whatever history exists so far.
pub fn sma(series: &Series, window: usize) -> Result<Vec<f64>> {
    let mut indicator = SimpleMovingAverage::new(window).map_err(|e| {
        QuoteError::Configuration(format!("Invalid moving average window {}: {:?}", window, e))
    })?;

    Ok(series.iter().map(|obs| indicator.next(obs.price)).collect())
}

/// SMA value at the last index, or `None` for an empty series.
pub fn latest_sma(series: &Series, window: usize) -> Result<Option<f64>> {
    Ok(sma(series, window)?.last().copied())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    windows: BTreeMap<usize, Vec<f64>>,
}

impl RollingStats {
    pub fn compute(series: &Series, windows: &[usize]) -> Result<Self> {
        let mut computed = BTreeMap::new();

        for &window in windows {
            if !computed.contains_key(&window) {
                computed.insert(window, sma(series, window)?);
            }
        }

        debug!(
            "Computed {} moving averages over {} observations",
            computed.len(),
            series.len()
        );

        Ok(Self { windows: computed })
    }

    pub fn get(&self, window: usize) -> Option<&[f64]> {
        self.windows.get(&window).map(Vec::as_slice)
    }

    pub fn latest(&self, window: usize) -> Option<f64> {
        self.get(window).and_then(|values| values.last().copied())
    }

    pub fn windows(&self) -> impl Iterator<Item = usize> + '_ {
        self.windows.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingAverage {
    pub mean: f64,
    pub count: usize,
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
}

/// Mean price over `[latest - duration, latest]`.
///
/// Returns `None` when no observation falls in that interval.
pub fn trailing_mean(series: &Series, duration: TimeDelta) -> Option<TrailingAverage> {
    let to = series.last()?.timestamp;
    let from = to.checked_sub_signed(duration)?;

    let prices: Vec<f64> = series
        .iter()
        .rev()
        .take_while(|obs| obs.timestamp >= from)
        .map(|obs| obs.price)
        .collect();

    if prices.is_empty() {
        return None;
    }

    Some(TrailingAverage {
        mean: prices.iter().mean(),
        count: prices.len(),
        from,
        to,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: DateTime<FixedOffset>,
}

impl From<&Observation> for PricePoint {
    fn from(obs: &Observation) -> Self {
        Self {
            price: obs.price,
            timestamp: obs.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrema {
    pub max: PricePoint,
    pub min: PricePoint,
}

/// Historical maximum and minimum price across the whole series.
pub fn extrema(series: &Series) -> Option<Extrema> {
    let max = series.iter().max_by(|a, b| a.price.total_cmp(&b.price))?;
    let min = series.iter().min_by(|a, b| a.price.total_cmp(&b.price))?;

    Some(Extrema {
        max: max.into(),
        min: min.into(),
    })
}
