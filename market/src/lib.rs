pub mod load;
pub mod util;

pub use load::Error;
pub use util::{Price, PriceStep};

use serde::{Deserialize, Serialize};
use std::fmt;

/// کلید اتصال یک کندل به سطرهای دفتر سفارش ثبت‌شده در آن
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandleId(String);

impl CandleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CandleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// یک سطح قیمت از تصویر دفتر سفارش یک کندل
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub time: u64,     // زمان باز شدن کندل (میلی‌ثانیه یونیکس)
    pub price: Price,
    pub bid_size: f64,
    pub ask_size: f64,
    pub candle_id: Option<CandleId>,
    /// عدم تعادل از پیش محاسبه‌شده؛ اگر در همه سطرها باشد بدون تغییر استفاده می‌شود
    pub imbalance: Option<f64>,
}

impl OrderRow {
    pub fn new(time: u64, price: f64, bid_size: f64, ask_size: f64) -> Self {
        Self {
            time,
            price: Price::from_f64(price),
            bid_size,
            ask_size,
            candle_id: None,
            imbalance: None,
        }
    }

    pub fn with_candle_id(mut self, id: impl Into<CandleId>) -> Self {
        self.candle_id = Some(id.into());
        self
    }

    pub fn with_imbalance(mut self, imbalance: f64) -> Self {
        self.imbalance = Some(imbalance);
        self
    }

    pub fn total_size(&self) -> f64 {
        self.bid_size + self.ask_size
    }
}

/// داده‌های OHLC یک بازه زمانی
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub time: u64, // زمان باز شدن (میلی‌ثانیه یونیکس)
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub candle_id: Option<CandleId>,
}

impl Candle {
    pub fn new(time: u64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open: Price::from_f64(open),
            high: Price::from_f64(high),
            low: Price::from_f64(low),
            close: Price::from_f64(close),
            candle_id: None,
        }
    }

    pub fn with_candle_id(mut self, id: impl Into<CandleId>) -> Self {
        self.candle_id = Some(id.into());
        self
    }

    /// کندل بدون تغییر صعودی حساب می‌شود
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}
