use super::CandleRow;
use crate::Config;

use market::{CandleId, Price, PriceStep};
use serde::{Deserialize, Serialize};

/// محدوده نمایش اولیه و برچسب‌های محور افقی
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRange {
    pub price_top: Price,
    pub price_bottom: Price,
    /// موقعیت اولین کندل قابل مشاهده
    pub x_start: usize,
    /// یکی بعد از آخرین کندل
    pub x_end: usize,
    pub tick_vals: Vec<CandleId>,
    pub tick_text: Vec<String>,
}

/// برای جدول کندل خالی None برمی‌گرداند.
///
/// پنجره عمودی یک گام بالاتر از سقف آخرین کندل شروع می‌شود و
/// به اندازه `config.price_window_ticks` گام به پایین ادامه دارد.
pub fn plot_range(
    candles: &[CandleRow],
    granularity: PriceStep,
    config: &Config,
) -> Option<PlotRange> {
    let last = candles.iter().max_by_key(|c| c.sequence)?;

    let price_top = last.high.add_steps(1, granularity);
    let price_bottom = price_top.add_steps(-config.price_window_ticks, granularity);

    let x_end = candles.len();
    let x_start = x_end.saturating_sub(config.visible_candles);

    let interval = candle_interval(candles);
    let (tick_vals, tick_text) = candles
        .iter()
        .map(|c| {
            (
                c.candle_id.clone(),
                config.timezone.format_timestamp(c.time, interval),
            )
        })
        .unzip();

    Some(PlotRange {
        price_top,
        price_bottom,
        x_start,
        x_end,
        tick_vals,
        tick_text,
    })
}

/// کوچکترین فاصله مثبت بین کندل‌های متوالی (برای یک کندل 0)
fn candle_interval(candles: &[CandleRow]) -> u64 {
    candles
        .windows(2)
        .filter_map(|w| w[1].time.checked_sub(w[0].time))
        .filter(|gap| *gap > 0)
        .min()
        .unwrap_or(0)
}
