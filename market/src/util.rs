use serde::{Deserialize, Serialize};

/// ساختار قیمت با دقت ثابت (Fixed Atomic Unit Scale)
/// کوچکترین واحد قابل ذخیره 10^-PRICE_SCALE است.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct Price {
    /// تعداد واحدهای اتمی (هر واحد اتمی = 10^-PRICE_SCALE)
    pub units: i64,
}

impl Price {
    /// تعداد ارقام اعشار واحد اتمی (10^-8)
    pub const PRICE_SCALE: i32 = 8;

    /// گرد کردن به نزدیک‌ترین واحد اتمی
    pub fn from_f64(v: f64) -> Self {
        let scale = 10f64.powi(Self::PRICE_SCALE);
        Self {
            units: (v * scale).round() as i64,
        }
    }

    pub fn to_f64(self) -> f64 {
        let scale = 10f64.powi(Self::PRICE_SCALE);
        (self.units as f64) / scale
    }

    /// ساخت قیمت از واحدهای اتمی خام (بدون گرد کردن)
    pub fn from_units(units: i64) -> Self {
        Self { units }
    }

    pub fn add_steps(self, steps: i64, step: PriceStep) -> Self {
        Self::from_units(
            self.units
                .saturating_add(steps.saturating_mul(step.units)),
        )
    }

    /// فاصله مطلق دو قیمت به صورت گام؛ اگر برابر باشند None
    pub fn step_between(a: Price, b: Price) -> Option<PriceStep> {
        let units = a.units.checked_sub(b.units)?.checked_abs()?;
        (units > 0).then_some(PriceStep { units })
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            units: self.units.saturating_add(rhs.units),
        }
    }
}

impl std::ops::Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            units: self.units.saturating_sub(rhs.units),
        }
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // plain numeric so tables stay readable on the far side
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = f64::deserialize(deserializer)?;
        if !v.is_finite() {
            return Err(serde::de::Error::custom("price must be finite"));
        }
        Ok(Self::from_f64(v))
    }
}

/// گام تغییر قیمت (Price Step)، همیشه مثبت
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PriceStep {
    /// اندازه گام بر اساس واحدهای اتمی (10^-PRICE_SCALE)
    pub units: i64,
}

impl PriceStep {
    pub fn to_f64(self) -> f64 {
        Price::from_units(self.units).to_f64()
    }

    /// Lossy: rounds to the nearest atomic unit, None if that is not positive
    pub fn from_f64(step: f64) -> Option<Self> {
        let units = Price::from_f64(step).units;
        (units > 0).then_some(Self { units })
    }
}
