use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M5 => Duration::from_secs(300),
            Timeframe::M15 => Duration::from_secs(900),
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Timeframe> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "m1" => Some(Timeframe::M1),
            "5m" | "m5" => Some(Timeframe::M5),
            "15m" | "m15" => Some(Timeframe::M15),
            _ => None,
        }
    }

    pub fn as_seconds(&self) -> i64 {
        self.as_duration().as_secs() as i64
    }

    /// Start of the bucket containing `ts`, floor-aligned to the timeframe.
    pub fn bucket_start(&self, ts: f64) -> i64 {
        let secs = self.as_seconds();
        (ts.floor() as i64).div_euclid(secs) * secs
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_start_floors_to_timeframe() {
        assert_eq!(Timeframe::M1.bucket_start(1_700_000_059.9), 1_700_000_040);
        assert_eq!(Timeframe::M5.bucket_start(1_700_000_000.0), 1_699_999_800);
        assert_eq!(Timeframe::M15.bucket_start(900.0), 900);
        assert_eq!(Timeframe::M15.bucket_start(1799.99), 900);
    }

    #[test]
    fn loose_parsing() {
        assert_eq!(Timeframe::from_str_loose("M5"), Some(Timeframe::M5));
        assert_eq!(Timeframe::from_str_loose("15m"), Some(Timeframe::M15));
        assert_eq!(Timeframe::from_str_loose("1h"), None);
    }
}
