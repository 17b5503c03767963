//! Timeframe descriptors: `<N>t` for tick bars, or a fixed duration token

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StreamerError};

/// Supported bucket widths in milliseconds
const DURATIONS: &[(&str, i64)] = &[
    ("5s", 5_000),
    ("1m", 60_000),
    ("5m", 300_000),
    ("15m", 900_000),
    ("30m", 1_800_000),
    ("1h", 3_600_000),
    ("4h", 14_400_000),
    ("1d", 86_400_000),
    ("1w", 604_800_000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Timeframe {
    /// A bar closes after this many ticks
    Ticks(u64),
    /// A bar covers one fixed-width bucket
    Duration { token: &'static str, millis: i64 },
}

impl Timeframe {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || StreamerError::InvalidTimeframe(descriptor.to_string());

        if let Some(count) = descriptor.strip_suffix('t') {
            let ticks: u64 = count.parse().map_err(|_| invalid())?;
            if ticks == 0 {
                return Err(invalid());
            }
            return Ok(Timeframe::Ticks(ticks));
        }

        DURATIONS
            .iter()
            .find(|(token, _)| *token == descriptor)
            .map(|&(token, millis)| Timeframe::Duration { token, millis })
            .ok_or_else(invalid)
    }

    /// Floor `timestamp` (epoch ms) to its bucket start
    ///
    /// `None` in tick mode, or when the bucket start is not representable.
    pub fn bucket_start(&self, timestamp: i64) -> Option<i64> {
        match self {
            Timeframe::Ticks(_) => None,
            Timeframe::Duration { millis, .. } => {
                timestamp.div_euclid(*millis).checked_mul(*millis)
            }
        }
    }

    pub fn is_tick_based(&self) -> bool {
        matches!(self, Timeframe::Ticks(_))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Ticks(n) => write!(f, "{n}t"),
            Timeframe::Duration { token, .. } => f.write_str(token),
        }
    }
}

impl FromStr for Timeframe {
    type Err = StreamerError;

    fn from_str(s: &str) -> Result<Self> {
        Timeframe::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_timeframes() {
        assert_eq!(Timeframe::parse("1t").unwrap(), Timeframe::Ticks(1));
        assert_eq!(Timeframe::parse("250t").unwrap(), Timeframe::Ticks(250));
        assert!(Timeframe::parse("0t").is_err());
        assert!(Timeframe::parse("t").is_err());
        assert!(Timeframe::parse("-3t").is_err());
    }

    #[test]
    fn test_parse_durations() {
        for (token, millis) in DURATIONS {
            let timeframe = Timeframe::parse(token).unwrap();
            assert_eq!(timeframe.bucket_start(*millis), Some(*millis));
            assert_eq!(timeframe.to_string(), *token);
        }
    }

    #[test]
    fn test_unknown_token_fails() {
        for token in ["2m", "1M", "", "1 m", "60s", "1y"] {
            assert!(
                matches!(Timeframe::parse(token), Err(StreamerError::InvalidTimeframe(t)) if t == token),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_bucket_floor() {
        let minute = Timeframe::parse("1m").unwrap();
        assert_eq!(minute.bucket_start(0), Some(0));
        assert_eq!(minute.bucket_start(59_999), Some(0));
        assert_eq!(minute.bucket_start(60_000), Some(60_000));
        assert_eq!(minute.bucket_start(119_999), Some(60_000));
        assert_eq!(minute.bucket_start(120_001), Some(120_000));
        assert_eq!(Timeframe::Ticks(5).bucket_start(1_000), None);
    }

    #[test]
    fn test_bucket_floor_at_range_edges() {
        let minute = Timeframe::parse("1m").unwrap();
        assert_eq!(minute.bucket_start(-1), Some(-60_000));
        assert_eq!(minute.bucket_start(i64::MIN), None);
        assert_eq!(
            minute.bucket_start(i64::MAX),
            Some(i64::MAX.div_euclid(60_000) * 60_000)
        );
    }
}
