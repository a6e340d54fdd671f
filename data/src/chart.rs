pub mod annotation;
pub mod identifier;
pub mod imbalance;
pub mod metrics;
pub mod range;
pub mod shape;

use crate::Config;
use crate::state::{FlatState, StateError};

pub use annotation::AnnotationRow;
pub use identifier::{IdSource, RandomUuid, Sequential};
pub use imbalance::ImbalanceRow;
pub use metrics::{MetricKind, MetricRow};
pub use range::PlotRange;
pub use shape::{LinePoint, RangeKind};

use market::{Candle, CandleId, OrderRow, Price, PriceStep};
use serde::{Deserialize, Serialize};

use std::cell::OnceCell;

/// خطاهای ساختاری جدول‌های ورودی
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("candle table is empty")]
    NoCandles,
    #[error("at least two order rows are needed to derive the price granularity")]
    TooFewRows,
    #[error("price granularity must be positive, the first two order rows are both at {0}")]
    ZeroGranularity(Price),
    #[error("order row {row}: bid and ask sizes must be finite and non-negative")]
    InvalidSize { row: usize },
    #[error("order row {row}: supplied imbalance must be finite")]
    InvalidImbalance { row: usize },
    #[error("imbalance values are present on some order rows but not all")]
    PartialImbalance,
    #[error("candle identifiers are present on some {0} but not all")]
    PartialIdentifiers(&'static str),
    #[error("order rows carry candle identifiers but the candles don't")]
    UnkeyedCandles,
    #[error("duplicate candle identifier {0}")]
    DuplicateCandleId(CandleId),
    #[error("two candles open at {0}, order rows can't be matched to them by time")]
    DuplicateCandleTime(u64),
    #[error("order row {row} at {time} matches no candle")]
    UnmatchedOrderRow { row: usize, time: u64 },
    #[error("order row {row} references unknown candle {id}")]
    UnknownCandleId { row: usize, id: CandleId },
    #[error("candle {0} has no order rows")]
    EmptyCandle(CandleId),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("data processing failed, check the structure of the order flow and candle tables")]
    Processing(#[source] InputError),
    #[error("processed state is unusable")]
    Range(#[source] InputError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// جدول کندل در وضعیت پردازش‌شده: با شناسه و رتبه زمانی
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRow {
    pub candle_id: CandleId,
    /// رتبه زمانی، 0 برای قدیمی‌ترین کندل
    pub sequence: usize,
    pub time: u64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
}

impl CandleRow {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// همه جدول‌های مورد نیاز رسم نمودار که یک بار محاسبه می‌شوند
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedState {
    /// خانه‌های نقشه حرارتی خرید/فروش
    pub imbalance: Vec<ImbalanceRow>,
    /// نوار حجم نرمال‌شده برای هر سطح قیمت
    pub volume_profile: Vec<AnnotationRow>,
    pub up_wicks: Vec<LinePoint>,
    pub down_wicks: Vec<LinePoint>,
    pub up_bodies: Vec<LinePoint>,
    pub down_bodies: Vec<LinePoint>,
    pub metrics: Vec<MetricRow>,
    pub candles: Vec<CandleRow>,
}

impl ProcessedState {
    /// گام قیمت داده‌ها بر اساس دو سطر اول
    pub fn granularity(&self) -> Result<PriceStep, InputError> {
        granularity(self.imbalance.iter().map(|row| row.price))
    }

    pub fn plot_range(&self, config: &Config) -> Result<PlotRange, InputError> {
        let granularity = self.granularity()?;
        range::plot_range(&self.candles, granularity, config).ok_or(InputError::NoCandles)
    }
}

/// اختلاف مطلق قیمت دو سطر اول
pub fn granularity(prices: impl IntoIterator<Item = Price>) -> Result<PriceStep, InputError> {
    let mut prices = prices.into_iter();

    let (Some(first), Some(second)) = (prices.next(), prices.next()) else {
        return Err(InputError::TooFewRows);
    };

    Price::step_between(first, second).ok_or(InputError::ZeroGranularity(first))
}

/// اجرای کامل مراحل پردازش روی داده‌های خام
pub fn process(
    rows: &[OrderRow],
    candles: &[Candle],
    ids: &dyn IdSource,
) -> Result<ProcessedState, InputError> {
    let step = granularity(rows.iter().map(|row| row.price))?;
    log::debug!("Price granularity: {}", step.to_f64());

    let keyed = identifier::assign(rows, candles, ids)?;

    let imbalance = imbalance::calculate(rows, &keyed.row_ids)?;
    let volume_profile = annotation::annotate(&imbalance);

    let (up_wicks, down_wicks) = shape::candle_lines(&keyed.candles, RangeKind::HighLow);
    let (up_bodies, down_bodies) = shape::candle_lines(&keyed.candles, RangeKind::OpenClose);

    let metrics = metrics::calculate(&imbalance, &keyed.candles)?;

    log::debug!(
        "Processed {} order rows over {} candles ({} up, {} down)",
        imbalance.len(),
        keyed.candles.len(),
        keyed.candles.iter().filter(|c| c.is_up()).count(),
        keyed.candles.iter().filter(|c| !c.is_up()).count(),
    );

    Ok(ProcessedState {
        imbalance,
        volume_profile,
        up_wicks,
        down_wicks,
        up_bodies,
        down_bodies,
        metrics,
        candles: keyed.candles,
    })
}

struct RawInput {
    rows: Vec<OrderRow>,
    candles: Vec<Candle>,
    ids: Box<dyn IdSource>,
}

/// داده‌های نمودار جریان سفارش: ورودی خام که در اولین دسترسی پردازش و ذخیره می‌شود.
///
/// ورودی‌ها پس از ساخت تغییر نمی‌کنند، پس وضعیت ذخیره‌شده هیچ‌وقت کهنه نمی‌شود.
/// برای داده زنده، هر به‌روزرسانی یک نمودار جدید می‌سازد.
pub struct OrderFlowChart {
    raw: RawInput,
    state: OnceCell<ProcessedState>,
}

impl OrderFlowChart {
    pub fn new(rows: Vec<OrderRow>, candles: Vec<Candle>) -> Self {
        Self {
            raw: RawInput {
                rows,
                candles,
                ids: Box::new(Sequential::default()),
            },
            state: OnceCell::new(),
        }
    }

    /// تعویض منبع شناسه برای کندل‌های بدون شناسه
    pub fn with_id_source(mut self, ids: impl IdSource + 'static) -> Self {
        self.raw.ids = Box::new(ids);
        self
    }

    /// بدون نیاز به پردازش
    pub fn from_processed(state: ProcessedState) -> Self {
        Self {
            raw: RawInput {
                rows: Vec::new(),
                candles: Vec::new(),
                ids: Box::new(Sequential::default()),
            },
            state: OnceCell::from(state),
        }
    }

    pub fn from_flat(flat: FlatState) -> Result<Self, Error> {
        Ok(Self::from_processed(ProcessedState::from_flat(flat)?))
    }

    pub fn is_processed(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn processed(&self) -> Result<&ProcessedState, Error> {
        if let Some(state) = self.state.get() {
            return Ok(state);
        }

        let state = process(&self.raw.rows, &self.raw.candles, self.raw.ids.as_ref())
            .map_err(|err| {
                log::error!("Order flow processing failed: {err}");
                Error::Processing(err)
            })?;

        Ok(self.state.get_or_init(|| state))
    }

    pub fn to_flat(&self) -> Result<FlatState, Error> {
        Ok(self.processed()?.to_flat()?)
    }

    pub fn plot_range(&self, config: &Config) -> Result<PlotRange, Error> {
        self.processed()?.plot_range(config).map_err(Error::Range)
    }
}
