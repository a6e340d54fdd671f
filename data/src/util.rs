use serde::{Deserialize, Deserializer};

/// متن نمایش مقدار ناموجود
pub const NULL_TEXT: &str = "nan";

/// دی‌سریال‌سازی `T` و بازگشت به مقدار پیش‌فرض در صورت ناسازگاری مقدار
pub fn ok_or_default<'a, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Deserialize<'a> + Default,
    D: Deserializer<'a>,
{
    let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
    Ok(T::deserialize(v).unwrap_or_default())
}

/// بخش صحیح یک حجم در حداکثر `width` کاراکتر؛ اگر ارقام جا نشوند
/// با پسوندهای k/m/b/t خلاصه می‌شود
pub fn compact_size(value: f64, width: usize) -> String {
    const UNITS: [(f64, &str); 5] = [
        (1.0, ""),
        (1_000.0, "k"),
        (1_000_000.0, "m"),
        (1_000_000_000.0, "b"),
        (1_000_000_000_000.0, "t"),
    ];

    let whole = value.trunc();
    for (scale, suffix) in UNITS {
        let s = format!("{}{suffix}", (whole / scale).trunc() as i64);
        if s.len() <= width {
            return s;
        }
    }

    // بیشتر از 10^16، هیچ سطح دفتر سفارشی به این حجم نمی‌رسد
    format!("{whole:.0e}").chars().take(width).collect()
}

/// مقدار خام شاخص به شکل نمایش در برچسب‌ها
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => NULL_TEXT.to_string(),
    }
}

pub fn round_to_decimal_places(value: f64, places: u32) -> f64 {
    let factor = 10.0f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_keeps_small_numbers_intact() {
        assert_eq!(compact_size(0.0, 4), "0");
        assert_eq!(compact_size(7.9, 4), "7");
        assert_eq!(compact_size(9999.0, 4), "9999");
    }

    #[test]
    fn compact_size_abbreviates_to_width() {
        assert_eq!(compact_size(12_345.0, 4), "12k");
        assert_eq!(compact_size(999_999.0, 4), "999k");
        assert_eq!(compact_size(1_000_000.0, 4), "1m");
        assert_eq!(compact_size(4_200_000_000.0, 4), "4b");
        assert!(compact_size(1e20, 4).len() <= 4);
    }

    #[test]
    fn format_value_uses_null_text() {
        assert_eq!(format_value(None), NULL_TEXT);
        assert_eq!(format_value(Some(f64::NAN)), NULL_TEXT);
        assert_eq!(format_value(Some(-3.5)), "-3.5");
        assert_eq!(format_value(Some(12.0)), "12");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to_decimal_places(12.345_67, 2), 12.35);
        assert_eq!(round_to_decimal_places(-0.004, 2), 0.0);
    }
}
