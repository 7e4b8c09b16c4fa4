use crate::DateRange;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Bid/ask aggregates carried through from the source for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSides {
    pub buy_min: Option<f64>,
    pub buy_max: Option<f64>,
    pub buy_median: Option<f64>,
    pub buy_avg: Option<f64>,
    pub sell_min: Option<f64>,
    pub sell_max: Option<f64>,
    pub sell_median: Option<f64>,
    pub sell_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<FixedOffset>,
    pub price: f64,
    pub asset: Option<String>,
    pub fiat: Option<String>,
    pub quotes: QuoteSides,
}

impl Observation {
    pub fn new(timestamp: DateTime<FixedOffset>, price: f64) -> Self {
        Self {
            timestamp,
            price,
            asset: None,
            fiat: None,
            quotes: QuoteSides::default(),
        }
    }

    /// Calendar date in the zone the timestamp is expressed in.
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn local_time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Observations in strictly ascending timestamp order with no duplicates.
///
/// Only the normalizer builds a `Series`; there is no API to mutate one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    pub(crate) fn from_sorted(observations: Vec<Observation>) -> Self {
        debug_assert!(observations
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Observation> + ExactSizeIterator {
        self.observations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// The two most recent observations, oldest first.
    pub fn last_two(&self) -> Option<(&Observation, &Observation)> {
        match self.observations.as_slice() {
            [.., previous, latest] => Some((previous, latest)),
            _ => None,
        }
    }

    pub fn prices(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.price).collect()
    }

    /// Observations whose local date falls inside `range`. A subsequence of a
    /// valid series is still a valid series.
    pub fn filter_dates(&self, range: &DateRange) -> Series {
        Series {
            observations: self
                .observations
                .iter()
                .filter(|o| range.contains(o.local_date()))
                .cloned()
                .collect(),
        }
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }
}
