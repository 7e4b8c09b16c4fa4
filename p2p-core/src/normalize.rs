use crate::{AnalysisConfig, CanonicalZone, Observation, Result, Series};
use tracing::debug;

/// Converts observations to the canonical zone and freezes them into a
/// [`Series`].
///
/// Ordering is a stable sort by instant. When several observations share an
/// instant the one seen last in the input replaces the earlier ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    zone: CanonicalZone,
}

impl Normalizer {
    pub fn new(zone: CanonicalZone) -> Self {
        Self { zone }
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self::new(config.canonical_zone()?))
    }

    pub fn zone(&self) -> CanonicalZone {
        self.zone
    }

    pub fn normalize(&self, observations: Vec<Observation>) -> Series {
        let mut converted: Vec<Observation> = observations
            .into_iter()
            .map(|mut obs| {
                obs.timestamp = self.zone.convert(&obs.timestamp);
                obs
            })
            .collect();

        converted.sort_by_key(|obs| obs.timestamp);

        let mut frozen: Vec<Observation> = Vec::with_capacity(converted.len());
        let mut replaced = 0usize;

        for obs in converted {
            match frozen.last_mut() {
                Some(last) if last.timestamp == obs.timestamp => {
                    *last = obs;
                    replaced += 1;
                }
                _ => frozen.push(obs),
            }
        }

        if replaced > 0 {
            debug!("Replaced {} observations with duplicate timestamps", replaced);
        }

        Series::from_sorted(frozen)
    }

    /// Runs an existing series through normalization again.
    pub fn renormalize(&self, series: Series) -> Series {
        self.normalize(series.into_observations())
    }
}
