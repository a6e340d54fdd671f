use serde::{Deserialize, Serialize};

use crate::util::ok_or_default;

pub mod timezone;

pub use timezone::UserTimezone;

pub const DEFAULT_VISIBLE_CANDLES: usize = 10;
pub const DEFAULT_PRICE_WINDOW_TICKS: i64 = 48;

/// تنظیمات کاربر که به صورت JSON در پوشه داده‌ها ذخیره می‌شود
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "ok_or_default")]
    pub timezone: UserTimezone,
    /// تعداد کندل‌های قابل مشاهده در پنجره افقی اولیه
    #[serde(deserialize_with = "ok_or_default_visible")]
    pub visible_candles: usize,
    /// ارتفاع پنجره عمودی اولیه بر حسب گام قیمت
    #[serde(deserialize_with = "ok_or_default_ticks")]
    pub price_window_ticks: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: UserTimezone::default(),
            visible_candles: DEFAULT_VISIBLE_CANDLES,
            price_window_ticks: DEFAULT_PRICE_WINDOW_TICKS,
        }
    }
}

fn ok_or_default_visible<'a, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'a>,
{
    let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
    Ok(usize::deserialize(v)
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_VISIBLE_CANDLES))
}

fn ok_or_default_ticks<'a, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'a>,
{
    let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
    Ok(i64::deserialize(v)
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PRICE_WINDOW_TICKS))
}
