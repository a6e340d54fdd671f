use super::{CandleRow, InputError};

use market::{Candle, CandleId, OrderRow};
use rustc_hash::{FxHashMap, FxHashSet};

/// منبع شناسه برای کندل‌هایی که شناسه ندارند
pub trait IdSource {
    /// `rank` موقعیت زمانی کندل است
    fn candle_id(&self, rank: usize, candle: &Candle) -> CandleId;
}

/// شناسه‌های قطعی `c000000`، `c000001` و ...
#[derive(Debug, Clone)]
pub struct Sequential {
    prefix: String,
}

impl Sequential {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new("c")
    }
}

impl IdSource for Sequential {
    fn candle_id(&self, rank: usize, _candle: &Candle) -> CandleId {
        CandleId::new(format!("{}{rank:06}", self.prefix))
    }
}

/// شناسه‌های تصادفی UUID v4 که بین مجموعه‌داده‌ها یکتا می‌مانند
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUuid;

impl IdSource for RandomUuid {
    fn candle_id(&self, _rank: usize, _candle: &Candle) -> CandleId {
        CandleId::new(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// کندل‌ها به ترتیب زمانی و شناسه کندل هر سطر سفارش
/// (به همان ترتیب سطرهای ورودی)
#[derive(Debug)]
pub struct Keyed {
    pub candles: Vec<CandleRow>,
    pub row_ids: Vec<CandleId>,
}

/// مرتب‌سازی کندل‌ها بر اساس زمان، تعیین شناسه و یافتن کندل هر سطر سفارش.
///
/// یا همه کندل‌ها و سطرها شناسه دارند یا هیچ‌کدام. سطرهای بدون شناسه
/// به کندلی که در همان زمان باز شده متصل می‌شوند.
pub fn assign(
    rows: &[OrderRow],
    candles: &[Candle],
    ids: &dyn IdSource,
) -> Result<Keyed, InputError> {
    if candles.is_empty() {
        return Err(InputError::NoCandles);
    }

    let mut ordered: Vec<&Candle> = candles.iter().collect();
    ordered.sort_by_key(|c| c.time);

    let keyed_candles = ordered.iter().filter(|c| c.candle_id.is_some()).count();
    let candle_ids: Vec<CandleId> = if keyed_candles == ordered.len() {
        ordered.iter().filter_map(|c| c.candle_id.clone()).collect()
    } else if keyed_candles == 0 {
        log::debug!("Generating identifiers for {} candles", ordered.len());
        ordered
            .iter()
            .enumerate()
            .map(|(rank, candle)| ids.candle_id(rank, candle))
            .collect()
    } else {
        return Err(InputError::PartialIdentifiers("candles"));
    };

    let mut known: FxHashSet<&CandleId> = FxHashSet::default();
    for id in &candle_ids {
        if !known.insert(id) {
            return Err(InputError::DuplicateCandleId(id.clone()));
        }
    }

    let keyed_rows = rows.iter().filter(|r| r.candle_id.is_some()).count();
    let row_ids: Vec<CandleId> = if keyed_rows == 0 {
        let mut by_time: FxHashMap<u64, &CandleId> = FxHashMap::default();
        for (candle, id) in ordered.iter().zip(&candle_ids) {
            if by_time.insert(candle.time, id).is_some() {
                return Err(InputError::DuplicateCandleTime(candle.time));
            }
        }

        rows.iter()
            .enumerate()
            .map(|(row, order)| {
                by_time
                    .get(&order.time)
                    .map(|id| (*id).clone())
                    .ok_or(InputError::UnmatchedOrderRow {
                        row,
                        time: order.time,
                    })
            })
            .collect::<Result<_, _>>()?
    } else if keyed_candles == 0 {
        return Err(InputError::UnkeyedCandles);
    } else {
        rows.iter()
            .enumerate()
            .map(|(row, order)| match &order.candle_id {
                Some(id) if known.contains(id) => Ok(id.clone()),
                Some(id) => Err(InputError::UnknownCandleId {
                    row,
                    id: id.clone(),
                }),
                None => Err(InputError::PartialIdentifiers("order rows")),
            })
            .collect::<Result<_, _>>()?
    };

    let populated: FxHashSet<&CandleId> = row_ids.iter().collect();
    if let Some(empty) = candle_ids.iter().find(|id| !populated.contains(id)) {
        return Err(InputError::EmptyCandle(empty.clone()));
    }

    let candles = ordered
        .into_iter()
        .zip(candle_ids)
        .enumerate()
        .map(|(sequence, (candle, candle_id))| CandleRow {
            candle_id,
            sequence,
            time: candle.time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
        })
        .collect();

    Ok(Keyed { candles, row_ids })
}
