use super::{CandleRow, ImbalanceRow, InputError};
use crate::util::{format_value, round_to_decimal_places};

use enum_map::{Enum, EnumMap};
use market::CandleId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// تعداد کندل‌های جمع‌شده در دلتای تجمعی
pub const CUM_DELTA_WINDOW: usize = 10;
const ROC_DECIMALS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Delta,
    CumDelta,
    Roc,
    Volume,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Delta,
        MetricKind::CumDelta,
        MetricKind::Roc,
        MetricKind::Volume,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Delta => "delta",
            MetricKind::CumDelta => "cum_delta",
            MetricKind::Roc => "roc",
            MetricKind::Volume => "volume",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub candle_id: CandleId,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// `tanh` مقدار خام؛ اگر مقدار خام null باشد null است
    pub value: Option<f64>,
    /// مقدار خام
    pub text: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    bid: f64,
    ask: f64,
}

/// چهار سطر شاخص برای هر کندل، کندل‌ها به ترتیب زمانی
pub fn calculate(
    rows: &[ImbalanceRow],
    candles: &[CandleRow],
) -> Result<Vec<MetricRow>, InputError> {
    let mut totals: FxHashMap<&CandleId, Totals> = FxHashMap::default();
    for row in rows {
        let entry = totals.entry(&row.candle_id).or_default();
        entry.bid += row.bid_size;
        entry.ask += row.ask_size;
    }

    let ordered = candles
        .iter()
        .map(|candle| {
            totals
                .get(&candle.candle_id)
                .copied()
                .ok_or_else(|| InputError::EmptyCandle(candle.candle_id.clone()))
        })
        .collect::<Result<Vec<Totals>, _>>()?;

    let delta: Vec<f64> = ordered.iter().map(|t| t.ask - t.bid).collect();
    let cum_delta = rolling_sum(&delta, CUM_DELTA_WINDOW);
    let roc = rate_of_change(&cum_delta);

    let mut metrics = Vec::with_capacity(candles.len() * MetricKind::ALL.len());
    for (i, candle) in candles.iter().enumerate() {
        let values: EnumMap<MetricKind, Option<f64>> = EnumMap::from_fn(|kind| match kind {
            MetricKind::Delta => Some(delta[i]),
            MetricKind::CumDelta => cum_delta[i],
            MetricKind::Roc => Some(roc[i]),
            MetricKind::Volume => Some(ordered[i].ask + ordered[i].bid),
        });

        metrics.extend(values.into_iter().map(|(kind, raw)| MetricRow {
            candle_id: candle.candle_id.clone(),
            kind,
            value: raw.map(f64::tanh),
            text: format_value(raw),
        }));
    }

    log::debug!("Computed {} metric rows", metrics.len());
    Ok(metrics)
}

/// مجموع `window` مقدار آخر؛ تا پر شدن پنجره null است
pub fn rolling_sum(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| (i + 1 >= window).then(|| values[i + 1 - window..=i].iter().sum::<f64>()))
        .collect()
}

/// درصد تغییر نسبت به مقدار قبلی، گردشده. گام‌های تعریف‌نشده 0 هستند.
fn rate_of_change(values: &[Option<f64>]) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let prev = i.checked_sub(1).and_then(|p| values[p]);
            match (values[i], prev) {
                (Some(current), Some(prev)) => {
                    let roc = (current - prev) / prev * 100.0;
                    if roc.is_finite() {
                        round_to_decimal_places(roc, ROC_DECIMALS)
                    } else {
                        // مقدار قبلی صفر: JSON مقدار inf را نگه نمی‌دارد و وضعیت ذخیره‌شده
                        // باید دوباره خوانده شود، پس به جای inf صفر ثبت می‌شود
                        0.0
                    }
                }
                _ => 0.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::imbalance::size_text;
    use market::Price;

    fn candle(sequence: usize) -> CandleRow {
        CandleRow {
            candle_id: CandleId::new(format!("c{sequence}")),
            sequence,
            time: sequence as u64 * 60_000,
            open: Price::from_f64(1.0),
            high: Price::from_f64(1.0),
            low: Price::from_f64(1.0),
            close: Price::from_f64(1.0),
        }
    }

    fn level(candle: &CandleRow, bid: f64, ask: f64) -> ImbalanceRow {
        ImbalanceRow {
            candle_id: candle.candle_id.clone(),
            time: candle.time,
            price: Price::from_f64(1.0),
            bid_size: bid,
            ask_size: ask,
            sum: bid + ask,
            text: size_text(bid, ask),
            size: 0.0,
        }
    }

    fn series(metrics: &[MetricRow], kind: MetricKind) -> Vec<&MetricRow> {
        metrics.iter().filter(|m| m.kind == kind).collect()
    }

    #[test]
    fn rolling_window_needs_ten_candles() {
        let delta: Vec<f64> = (1..=15).map(f64::from).collect();
        let cum = rolling_sum(&delta, CUM_DELTA_WINDOW);

        assert!(cum[..9].iter().all(Option::is_none));
        assert_eq!(cum[9], Some(55.0));
        assert_eq!(cum[10], Some(65.0));
        assert_eq!(cum[14], Some(105.0));
    }

    #[test]
    fn cum_delta_is_null_text_until_window_fills() {
        let candles: Vec<CandleRow> = (0..15).map(candle).collect();
        let rows: Vec<ImbalanceRow> = candles
            .iter()
            .enumerate()
            .map(|(i, c)| level(c, 0.0, i as f64 + 1.0))
            .collect();

        let metrics = calculate(&rows, &candles).unwrap();
        let cum = series(&metrics, MetricKind::CumDelta);

        assert_eq!(cum.len(), 15);
        for row in &cum[..9] {
            assert_eq!(row.text, "nan");
            assert_eq!(row.value, None);
        }
        assert_eq!(cum[9].text, "55");
        assert_eq!(cum[9].value, Some(55f64.tanh()));

        let roc = series(&metrics, MetricKind::Roc);
        assert!(roc[..10].iter().all(|r| r.text == "0"));
        assert_eq!(roc[10].text, "18.18");
    }

    #[test]
    fn delta_and_volume_per_candle() {
        let candles = vec![candle(0), candle(1)];
        let rows = vec![
            level(&candles[0], 10.0, 4.0),
            level(&candles[0], 6.0, 8.0),
            level(&candles[1], 3.0, 12.0),
        ];

        let metrics = calculate(&rows, &candles).unwrap();
        assert_eq!(metrics.len(), 8);

        let kinds: Vec<MetricKind> = metrics[..4].iter().map(|m| m.kind).collect();
        assert_eq!(kinds, MetricKind::ALL);

        let delta = series(&metrics, MetricKind::Delta);
        assert_eq!(delta[0].text, "-4");
        assert_eq!(delta[1].text, "9");

        let volume = series(&metrics, MetricKind::Volume);
        assert_eq!(volume[0].text, "28");
        assert_eq!(volume[1].value, Some(15f64.tanh()));
    }

    #[test]
    fn values_are_bounded() {
        let candles: Vec<CandleRow> = (0..12).map(candle).collect();
        let rows: Vec<ImbalanceRow> = candles
            .iter()
            .map(|c| level(c, 1e6 * c.sequence as f64, 3.0))
            .collect();

        for row in calculate(&rows, &candles).unwrap() {
            if let Some(v) = row.value {
                assert!((-1.0..=1.0).contains(&v), "{} {}", row.kind, v);
            }
        }
    }

    #[test]
    fn candle_without_rows_is_rejected() {
        let candles = vec![candle(0), candle(1)];
        let rows = vec![level(&candles[0], 1.0, 1.0)];

        assert_eq!(
            calculate(&rows, &candles),
            Err(InputError::EmptyCandle(CandleId::from("c1")))
        );
    }

    #[test]
    fn roc_from_zero_is_zero() {
        let roc = rate_of_change(&[Some(0.0), Some(5.0), Some(0.0), None, Some(2.0)]);

        assert_eq!(roc, vec![0.0, 0.0, -100.0, 0.0, 0.0]);
        assert!(roc.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn kind_serializes_as_type_label() {
        let row = MetricRow {
            candle_id: CandleId::from("a"),
            kind: MetricKind::CumDelta,
            value: None,
            text: "nan".to_string(),
        };
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["type"], "cum_delta");
        assert!(json["value"].is_null());
    }
}
