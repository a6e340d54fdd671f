use super::ImbalanceRow;

use market::{CandleId, Price};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// فاصله نوارها از برچسب‌های محور قیمت
const BAR_PADDING: &str = "                    ";
const BAR_CHAR: &str = "█";
/// طول نوار پرحجم‌ترین سطح یک کندل
const BAR_SCALE: f64 = 10.0;

/// متن پروفایل حجم برای یک سطح قیمت
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub candle_id: CandleId,
    pub time: u64,
    pub price: Price,
    /// حجم سطح نسبت به پرحجم‌ترین سطح کندل، در بازه [0, 1]
    pub sum: f64,
    pub text: String,
}

pub fn annotate(rows: &[ImbalanceRow]) -> Vec<AnnotationRow> {
    let mut group_max: FxHashMap<&CandleId, f64> = FxHashMap::default();
    for row in rows {
        let entry = group_max.entry(&row.candle_id).or_insert(0.0);
        *entry = entry.max(row.sum);
    }

    rows.iter()
        .map(|row| {
            let max = group_max.get(&row.candle_id).copied().unwrap_or(0.0);
            let sum = if max > 0.0 { row.sum / max } else { 0.0 };

            AnnotationRow {
                candle_id: row.candle_id.clone(),
                time: row.time,
                price: row.price,
                sum,
                text: volume_bar(sum),
            }
        })
        .collect()
}

pub fn volume_bar(normalized: f64) -> String {
    let len = (normalized * BAR_SCALE).floor().max(0.0) as usize;
    format!("{BAR_PADDING}{}", BAR_CHAR.repeat(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::imbalance::size_text;

    fn row(id: &str, price: f64, bid: f64, ask: f64) -> ImbalanceRow {
        ImbalanceRow {
            candle_id: CandleId::from(id),
            time: 0,
            price: Price::from_f64(price),
            bid_size: bid,
            ask_size: ask,
            sum: bid + ask,
            text: size_text(bid, ask),
            size: 0.0,
        }
    }

    fn bar_len(text: &str) -> usize {
        text.chars().filter(|c| *c == '█').count()
    }

    #[test]
    fn normalizes_within_each_candle() {
        let rows = vec![
            row("a", 10.0, 10.0, 10.0),
            row("a", 9.0, 3.0, 2.0),
            row("b", 10.0, 1.0, 0.0),
            row("b", 9.0, 0.5, 1.5),
        ];

        let profile = annotate(&rows);
        let sums: Vec<f64> = profile.iter().map(|r| r.sum).collect();
        assert_eq!(sums, vec![1.0, 0.25, 0.5, 1.0]);

        let bars: Vec<usize> = profile.iter().map(|r| bar_len(&r.text)).collect();
        assert_eq!(bars, vec![10, 2, 5, 10]);
    }

    #[test]
    fn bars_are_padded() {
        let text = volume_bar(0.39);
        assert!(text.starts_with(BAR_PADDING));
        assert_eq!(text.chars().count(), BAR_PADDING.len() + 3);
    }

    #[test]
    fn silent_candle_has_empty_bars() {
        let profile = annotate(&[row("a", 10.0, 0.0, 0.0)]);

        assert_eq!(profile[0].sum, 0.0);
        assert_eq!(profile[0].text, BAR_PADDING);
    }
}
