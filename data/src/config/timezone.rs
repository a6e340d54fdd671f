use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

const DAY_MS: u64 = 86_400_000;

/// منطقه زمانی برچسب‌های محور زمان
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UserTimezone {
    #[default]
    Utc,
    Local,
}

impl UserTimezone {
    /// قالب‌بندی زمان (میلی‌ثانیه یونیکس) برای محور دسته‌ای که فاصله کندل‌های آن
    /// `interval` میلی‌ثانیه است
    pub fn format_timestamp(&self, timestamp_millis: u64, interval: u64) -> String {
        let Some(datetime) = i64::try_from(timestamp_millis)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
        else {
            return String::new();
        };

        match self {
            UserTimezone::Local => {
                Self::format_by_interval(&datetime.with_timezone(&chrono::Local), interval)
            }
            UserTimezone::Utc => {
                Self::format_by_interval(&datetime.with_timezone(&chrono::Utc), interval)
            }
        }
    }

    fn format_by_interval<Tz: chrono::TimeZone>(datetime: &DateTime<Tz>, interval: u64) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        if interval < 10_000 {
            datetime.format("%H:%M:%S").to_string()
        } else if interval >= DAY_MS {
            datetime.format("%Y-%m-%d").to_string()
        } else {
            datetime.format("%m-%d %H:%M").to_string()
        }
    }
}

impl fmt::Display for UserTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserTimezone::Utc => write!(f, "UTC"),
            UserTimezone::Local => {
                let local_offset = chrono::Local::now().offset().local_minus_utc();
                let hours = local_offset / 3600;
                let minutes = (local_offset % 3600) / 60;
                write!(f, "Local (UTC {hours:+03}:{minutes:02})")
            }
        }
    }
}

impl<'de> Deserialize<'de> for UserTimezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let timezone_str = String::deserialize(deserializer)?;
        match timezone_str.to_lowercase().as_str() {
            "utc" => Ok(UserTimezone::Utc),
            "local" => Ok(UserTimezone::Local),
            _ => Err(serde::de::Error::custom("Invalid UserTimezone")),
        }
    }
}

impl Serialize for UserTimezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            UserTimezone::Utc => serializer.serialize_str("UTC"),
            UserTimezone::Local => serializer.serialize_str("Local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_labels_follow_candle_interval() {
        let ts = 1_704_067_260_000; // 2024-01-01 00:01:00 UTC

        assert_eq!(UserTimezone::Utc.format_timestamp(ts, 1_000), "00:01:00");
        assert_eq!(UserTimezone::Utc.format_timestamp(ts, 60_000), "01-01 00:01");
        assert_eq!(UserTimezone::Utc.format_timestamp(ts, DAY_MS), "2024-01-01");
    }

    #[test]
    fn parses_case_insensitively() {
        let tz: UserTimezone = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(tz, UserTimezone::Local);
        assert!(serde_json::from_str::<UserTimezone>("\"mars\"").is_err());
    }
}
