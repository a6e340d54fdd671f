//! سایه‌ها و بدنه‌های کندل به صورت خطوط شکسته.
//!
//! هر کندل به شکل `start, end, gap` رسم می‌شود: یک پاره‌خط دو نقطه‌ای و سپس
//! یک نقطه خالی، تا یک خط بتواند همه کندل‌های یک جهت را بدون اتصال
//! به کندل‌های کناری رسم کند.
use super::CandleRow;

use market::{CandleId, Price};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// هر سطر در موقعیت فرد تکرار می‌شود
const DUPLICATE_STRIDE: usize = 2;
/// پس از تکرار، هر سطر سوم به فاصله خالی تبدیل می‌شود
const GAP_STRIDE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// سایه‌ها
    HighLow,
    /// بدنه‌ها
    OpenClose,
}

impl RangeKind {
    fn ends(self, candle: &CandleRow) -> (Price, Price) {
        match self {
            RangeKind::HighLow => (candle.low, candle.high),
            RangeKind::OpenClose => (candle.open, candle.close),
        }
    }
}

/// نقطه‌ای از سری خطی. نقاط خالی فقط شناسه کندل را نگه می‌دارند.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub candle_id: CandleId,
    pub price: Option<Price>,
    pub sequence: Option<usize>,
    pub time: Option<u64>,
}

impl LinePoint {
    fn new(candle: &CandleRow, price: Price) -> Self {
        Self {
            candle_id: candle.candle_id.clone(),
            price: Some(price),
            sequence: Some(candle.sequence),
            time: Some(candle.time),
        }
    }

    pub fn is_gap(&self) -> bool {
        self.price.is_none()
    }

    fn clear(&mut self) {
        self.price = None;
        self.sequence = None;
        self.time = None;
    }

    fn sort_key(&self) -> (Option<u64>, Option<usize>) {
        (self.time, self.sequence)
    }
}

/// هر دو سر همه کندل‌ها، ابتدا همه سرهای اول و سپس سرهای دوم،
/// و در نهایت مرتب‌شده بر اساس زمان
pub fn shape(candles: &[CandleRow], kind: RangeKind) -> Vec<LinePoint> {
    let firsts = candles.iter().map(|c| LinePoint::new(c, kind.ends(c).0));
    let seconds = candles.iter().map(|c| LinePoint::new(c, kind.ends(c).1));

    let mut points: Vec<LinePoint> = firsts.chain(seconds).collect();
    points.sort_by_key(LinePoint::sort_key);
    points
}

/// جدا کردن نقاط به (صعودی، نزولی) بر اساس جهت کندل
pub fn split_by_direction(
    points: Vec<LinePoint>,
    candles: &[CandleRow],
) -> (Vec<LinePoint>, Vec<LinePoint>) {
    let up: FxHashSet<&CandleId> = candles
        .iter()
        .filter(|c| c.is_up())
        .map(|c| &c.candle_id)
        .collect();

    points
        .into_iter()
        .partition(|point| up.contains(&point.candle_id))
}

/// تبدیل جفت‌های `[start, end]` به سه‌تایی‌های `[start, end, gap]`.
///
/// پس از مرتب‌سازی بر اساس (time, sequence, price)، نقطه دوم هر کندل در جای خود
/// تکرار می‌شود و پس از مرتب‌سازی پایدار دوباره، هر نقطه سوم خالی می‌شود.
/// تغییر هر کدام از گام‌ها پاره‌خط‌ها را به کندل بعدی وصل می‌کند.
pub fn interleave(mut points: Vec<LinePoint>) -> Vec<LinePoint> {
    points.sort_by(|a, b| (a.sort_key(), a.price).cmp(&(b.sort_key(), b.price)));

    let mut out = Vec::with_capacity(points.len() + points.len() / DUPLICATE_STRIDE);
    for (i, point) in points.into_iter().enumerate() {
        if i % DUPLICATE_STRIDE == 1 {
            out.push(point.clone());
        }
        out.push(point);
    }

    out.sort_by_key(LinePoint::sort_key);

    for point in out.iter_mut().skip(GAP_STRIDE - 1).step_by(GAP_STRIDE) {
        point.clear();
    }
    out
}

/// سری‌های خطی (صعودی، نزولی) برای یک نوع بازه
pub fn candle_lines(candles: &[CandleRow], kind: RangeKind) -> (Vec<LinePoint>, Vec<LinePoint>) {
    let (up, down) = split_by_direction(shape(candles, kind), candles);
    (interleave(up), interleave(down))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(sequence: usize, open: f64, high: f64, low: f64, close: f64) -> CandleRow {
        CandleRow {
            candle_id: CandleId::new(format!("c{sequence}")),
            sequence,
            time: sequence as u64 * 60_000,
            open: Price::from_f64(open),
            high: Price::from_f64(high),
            low: Price::from_f64(low),
            close: Price::from_f64(close),
        }
    }

    fn candles(n: usize) -> Vec<CandleRow> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                if i % 3 == 1 {
                    candle(i, base + 1.0, base + 2.0, base - 1.0, base)
                } else {
                    candle(i, base, base + 2.0, base - 1.0, base + 1.0)
                }
            })
            .collect()
    }

    #[test]
    fn shape_emits_two_ends_per_candle_in_time_order() {
        let candles = candles(3);
        let points = shape(&candles, RangeKind::HighLow);

        assert_eq!(points.len(), 6);
        for (pair, candle) in points.chunks(2).zip(&candles) {
            assert_eq!(pair[0].candle_id, candle.candle_id);
            assert_eq!(pair[0].price, Some(candle.low));
            assert_eq!(pair[1].price, Some(candle.high));
            assert_eq!(pair[0].sequence, pair[1].sequence);
        }
    }

    #[test]
    fn interleave_yields_one_gap_per_candle() {
        for n in [1, 2, 5, 6, 11] {
            let candles = candles(n);
            let lines = interleave(shape(&candles, RangeKind::OpenClose));

            assert_eq!(lines.len(), 3 * n);
            for (pos, point) in lines.iter().enumerate() {
                assert_eq!(point.is_gap(), pos % 3 == 2, "n={n} pos={pos}");
            }

            for (triple, candle) in lines.chunks(3).zip(&candles) {
                let (lo, hi) = if candle.open <= candle.close {
                    (candle.open, candle.close)
                } else {
                    (candle.close, candle.open)
                };
                assert!(triple.iter().all(|p| p.candle_id == candle.candle_id));
                assert_eq!(triple[0].price, Some(lo));
                assert_eq!(triple[1].price, Some(hi));
                assert_eq!(triple[0].sequence, triple[1].sequence);
                assert!(triple[2].is_gap());
            }
        }
    }

    #[test]
    fn interleave_of_nothing_is_nothing() {
        assert!(interleave(Vec::new()).is_empty());
    }

    #[test]
    fn every_candle_lands_in_exactly_one_direction() {
        let candles = candles(10);

        for kind in [RangeKind::HighLow, RangeKind::OpenClose] {
            let (up, down) = candle_lines(&candles, kind);

            for candle in &candles {
                let in_up = up.iter().any(|p| p.candle_id == candle.candle_id);
                let in_down = down.iter().any(|p| p.candle_id == candle.candle_id);

                assert!(in_up ^ in_down, "{} is in up={in_up} down={in_down}", candle.candle_id);
                assert_eq!(in_up, candle.is_up());
            }
        }
    }

    #[test]
    fn flat_candles_count_as_up() {
        let flat = vec![candle(0, 5.0, 6.0, 4.0, 5.0)];
        let (up, down) = candle_lines(&flat, RangeKind::OpenClose);

        assert_eq!(up.len(), 3);
        assert!(down.is_empty());
    }
}
