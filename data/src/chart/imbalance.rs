use super::InputError;
use crate::util::compact_size;

use market::{CandleId, OrderRow, Price};
use serde::{Deserialize, Serialize};

/// تعداد کاراکتر هر سمت در متن خانه خرید/فروش
pub const SIZE_WIDTH: usize = 4;
const SIZE_SEPARATOR: &str = "  ";

/// یک خانه نقشه حرارتی: یک سطح قیمت از یک کندل
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceRow {
    pub candle_id: CandleId,
    pub time: u64,
    pub price: Price,
    pub bid_size: f64,
    pub ask_size: f64,
    pub sum: f64,
    /// `bid  ask` با عرض ثابت
    pub text: String,
    /// عدم تعادل، رنگ خانه را تعیین می‌کند
    pub size: f64,
}

/// حجم خرید راست‌چین و حجم فروش چپ‌چین با دو فاصله بین آن‌ها
pub fn size_text(bid_size: f64, ask_size: f64) -> String {
    let bid = compact_size(bid_size, SIZE_WIDTH);
    let ask = compact_size(ask_size, SIZE_WIDTH);

    format!(
        "{bid:>width$}{SIZE_SEPARATOR}{ask:<width$}",
        width = SIZE_WIDTH
    )
}

/// ساخت جدول نقشه حرارتی. `row_ids` کندل هر سطر را نگه می‌دارد.
pub fn calculate(rows: &[OrderRow], row_ids: &[CandleId]) -> Result<Vec<ImbalanceRow>, InputError> {
    if let Some(row) = rows.iter().position(|r| !valid_size(r.bid_size) || !valid_size(r.ask_size)) {
        return Err(InputError::InvalidSize { row });
    }

    let sizes = imbalance(rows)?;

    Ok(rows
        .iter()
        .zip(row_ids)
        .zip(sizes)
        .map(|((row, candle_id), size)| ImbalanceRow {
            candle_id: candle_id.clone(),
            time: row.time,
            price: row.price,
            bid_size: row.bid_size,
            ask_size: row.ask_size,
            sum: row.total_size(),
            text: size_text(row.bid_size, row.ask_size),
            size,
        })
        .collect())
}

fn valid_size(size: f64) -> bool {
    size.is_finite() && size >= 0.0
}

fn imbalance(rows: &[OrderRow]) -> Result<Vec<f64>, InputError> {
    let supplied = rows.iter().filter(|r| r.imbalance.is_some()).count();

    if supplied == 0 {
        log::info!("Calculating imbalance, no imbalance values were supplied");
        return Ok(derive_imbalance(rows));
    }
    if supplied < rows.len() {
        return Err(InputError::PartialImbalance);
    }

    log::info!("Using supplied imbalance values");
    rows.iter()
        .enumerate()
        .map(|(row, r)| match r.imbalance {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(InputError::InvalidImbalance { row }),
        })
        .collect()
}

/// `(bid - prev_ask) / (bid + prev_ask)` که در آن `prev_ask` حجم فروش سطر قبلی
/// جدول است. سطر اول از حجم فروش خودش استفاده می‌کند. نتایج تعریف‌نشده
/// (سطرهای خالی) نزدیک‌ترین مقدار تعریف‌شده را می‌گیرند، اول از عقب.
pub fn derive_imbalance(rows: &[OrderRow]) -> Vec<f64> {
    let raw = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let prev_ask = rows[i.saturating_sub(1)].ask_size;
            let value = (row.bid_size - prev_ask) / (row.bid_size + prev_ask);
            (!value.is_nan()).then_some(value)
        })
        .collect();

    fill_gaps(raw)
}

/// پر کردن رو به جلو و سپس رو به عقب. ستون بدون هیچ مقداری متعادل (0) است.
fn fill_gaps(mut values: Vec<Option<f64>>) -> Vec<f64> {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }

    values.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<CandleId> {
        (0..n).map(|_| CandleId::from("a")).collect()
    }

    #[test]
    fn text_is_always_ten_characters() {
        let sizes = [0.0, 1.0, 9.99, 42.0, 512.4, 9_999.0, 10_000.0, 123_456.7, 9.9e9, 3.2e13];

        for bid in sizes {
            for ask in sizes {
                let text = size_text(bid, ask);
                assert_eq!(text.chars().count(), 10, "{bid} / {ask}: {text:?}");
            }
        }
    }

    #[test]
    fn text_aligns_bid_right_and_ask_left() {
        assert_eq!(size_text(12.0, 7.0), "  12  7   ");
        assert_eq!(size_text(1234.9, 56789.0), "1234  56k ");
    }

    #[test]
    fn derived_imbalance_uses_lagged_ask() {
        let rows = vec![
            OrderRow::new(0, 10.0, 6.0, 2.0),
            OrderRow::new(0, 9.0, 1.0, 3.0),
            OrderRow::new(0, 8.0, 9.0, 0.0),
        ];

        let sizes = derive_imbalance(&rows);
        assert_eq!(sizes, vec![(6.0 - 2.0) / 8.0, (1.0 - 2.0) / 3.0, (9.0 - 3.0) / 12.0]);
    }

    #[test]
    fn empty_levels_are_filled_from_neighbours() {
        let rows = vec![
            OrderRow::new(0, 10.0, 0.0, 0.0),
            OrderRow::new(0, 9.0, 0.0, 0.0),
            OrderRow::new(0, 8.0, 3.0, 1.0),
            OrderRow::new(0, 7.0, 0.0, 0.0),
        ];

        // دو سطح اول 0/0 هستند و مقدار تعریف‌شده بعدی را می‌گیرند
        let sizes = derive_imbalance(&rows);
        assert_eq!(sizes, vec![1.0, 1.0, 1.0, -1.0]);

        let silent = vec![OrderRow::new(0, 10.0, 0.0, 0.0); 3];
        assert_eq!(derive_imbalance(&silent), vec![0.0; 3]);
    }

    #[test]
    fn derived_imbalance_is_bounded() {
        let rows: Vec<OrderRow> = (0..200)
            .map(|i| {
                let bid = ((i * 37) % 101) as f64;
                let ask = ((i * 53) % 89) as f64 + 0.5;
                OrderRow::new(0, 100.0 - i as f64, bid, ask)
            })
            .collect();

        let table = calculate(&rows, &ids(rows.len())).unwrap();
        for row in table {
            assert!((-1.0..=1.0).contains(&row.size), "{}", row.size);
        }
    }

    #[test]
    fn supplied_imbalance_passes_through() {
        let rows = vec![
            OrderRow::new(0, 10.0, 6.0, 2.0).with_imbalance(3.5),
            OrderRow::new(0, 9.0, 1.0, 3.0).with_imbalance(-0.25),
        ];

        let table = calculate(&rows, &ids(2)).unwrap();
        let sizes: Vec<f64> = table.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![3.5, -0.25]);
        assert_eq!(table[0].sum, 8.0);
    }

    #[test]
    fn rejects_partial_or_invalid_input() {
        let partial = vec![
            OrderRow::new(0, 10.0, 6.0, 2.0).with_imbalance(0.1),
            OrderRow::new(0, 9.0, 1.0, 3.0),
        ];
        assert_eq!(calculate(&partial, &ids(2)), Err(InputError::PartialImbalance));

        let negative = vec![OrderRow::new(0, 10.0, 6.0, 2.0), OrderRow::new(0, 9.0, -1.0, 3.0)];
        assert_eq!(
            calculate(&negative, &ids(2)),
            Err(InputError::InvalidSize { row: 1 })
        );
    }
}
