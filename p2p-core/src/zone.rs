//! Canonical timezone resolution.
//!
//! Zones are resolved to a fixed UTC offset. Only zones without daylight
//! saving are accepted by name, so a single offset is exact for them.

use crate::{QuoteError, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

// IANA zones with a constant offset (seconds east of UTC).
const FIXED_ZONES: &[(&str, i32)] = &[
    ("America/La_Paz", -4 * 3600),
    ("America/Caracas", -4 * 3600),
    ("America/Manaus", -4 * 3600),
    ("America/Lima", -5 * 3600),
    ("America/Bogota", -5 * 3600),
    ("America/Guayaquil", -5 * 3600),
    ("America/Argentina/Buenos_Aires", -3 * 3600),
    ("America/Montevideo", -3 * 3600),
    ("America/Sao_Paulo", -3 * 3600),
    ("Asia/Kolkata", 5 * 3600 + 1800),
    ("Asia/Dubai", 4 * 3600),
    ("Asia/Shanghai", 8 * 3600),
    ("Asia/Singapore", 8 * 3600),
    ("Asia/Tokyo", 9 * 3600),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalZone {
    offset: FixedOffset,
}

impl CanonicalZone {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn from_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Re-expresses an instant in this zone. The instant itself is unchanged,
    /// so converting an already-converted timestamp is a no-op.
    pub fn convert<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> DateTime<FixedOffset> {
        timestamp.with_timezone(&self.offset)
    }

    /// Interprets a wall-clock time as local time in this zone.
    pub fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        let shift = TimeDelta::seconds(i64::from(self.offset.local_minus_utc()));
        let utc = local.checked_sub_signed(shift)?;
        Some(DateTime::from_naive_utc_and_offset(utc, self.offset))
    }
}

impl Default for CanonicalZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for CanonicalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTC{}", self.offset)
    }
}

impl FromStr for CanonicalZone {
    type Err = QuoteError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim();

        if let Some((_, seconds)) = FIXED_ZONES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(id))
        {
            return east(*seconds, s);
        }

        let upper = id.to_ascii_uppercase();
        if matches!(upper.as_str(), "UTC" | "Z" | "GMT" | "ETC/UTC" | "ETC/GMT") {
            return Ok(Self::utc());
        }

        let offset = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper);

        match parse_offset_seconds(offset) {
            Some(seconds) => east(seconds, s),
            None => Err(QuoteError::Configuration(format!(
                "Unknown timezone identifier: {}",
                s
            ))),
        }
    }
}

fn east(seconds: i32, id: &str) -> Result<CanonicalZone> {
    FixedOffset::east_opt(seconds)
        .map(CanonicalZone::from_offset)
        .ok_or_else(|| QuoteError::Configuration(format!("Offset out of range: {}", id)))
}

// Accepts "+HH", "-H", "+HH:MM" and "+HHMM".
fn parse_offset_seconds(s: &str) -> Option<i32> {
    let (sign, rest) = match s.chars().next()? {
        '+' => (1, &s[1..]),
        '-' => (-1, &s[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() > 2 => rest.split_at(rest.len() - 2),
        None => (rest, "0"),
    };

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }

    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_named_zone() {
        let zone: CanonicalZone = "America/La_Paz".parse().unwrap();
        assert_eq!(zone.offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_numeric_offsets() {
        let cases = [
            ("UTC", 0),
            ("-04:00", -4 * 3600),
            ("+0530", 5 * 3600 + 1800),
            ("UTC-4", -4 * 3600),
            ("GMT+5:30", 5 * 3600 + 1800),
        ];

        for (id, expected) in cases {
            let zone: CanonicalZone = id.parse().unwrap();
            assert_eq!(zone.offset().local_minus_utc(), expected, "zone {}", id);
        }
    }

    #[test]
    fn test_unknown_zone_is_rejected() {
        assert!("Europe/Nowhere".parse::<CanonicalZone>().is_err());
        assert!("+25:00".parse::<CanonicalZone>().is_err());
    }

    #[test]
    fn test_convert_is_idempotent() {
        let zone: CanonicalZone = "America/La_Paz".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 10, 5, 12, 0, 0).unwrap();

        let once = zone.convert(&instant);
        let twice = zone.convert(&once);

        assert_eq!(once, twice);
        assert_eq!(once.offset(), twice.offset());
        assert_eq!(once.format("%H:%M").to_string(), "08:00");
    }

    #[test]
    fn test_from_local() {
        let zone: CanonicalZone = "-04:00".parse().unwrap();
        let local = NaiveDate::from_ymd_opt(2025, 10, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();

        let ts = zone.from_local(local).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 10, 5, 12, 0, 0).unwrap());
    }
}
