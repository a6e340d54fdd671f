//! وضعیت پردازش‌شده به صورت جدول‌های ستونی ساده.
//!
//! هر جدول به `column -> values` و یک نگاشت `column -> dtype` تبدیل می‌شود تا
//! بتوان آن را به صورت JSON ذخیره کرد و بدون محاسبه مجدد بازسازی کرد.
//! سلول‌ها نوع JSON خود را حفظ می‌کنند و هنگام ورود با نوع اعلام‌شده بررسی می‌شوند.
use crate::chart::{
    AnnotationRow, CandleRow, ImbalanceRow, LinePoint, MetricRow, ProcessedState,
};

use market::CandleId;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use std::collections::BTreeMap;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("table `{0}` is missing")]
    MissingTable(String),
    #[error("table `{table}` has no column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("column `{table}.{column}` is declared {found}, expected {expected}")]
    ColumnType {
        table: String,
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },
    #[error("column `{table}.{column}` has {found} values, expected {expected}")]
    Length {
        table: String,
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("column `{table}.{column}` row {row}: {value} is not a {expected} value")]
    Cell {
        table: String,
        column: String,
        row: usize,
        expected: ColumnType,
        value: Value,
    },
    #[error("table `{table}` row {row} can't be decoded")]
    Row {
        table: String,
        row: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("table `{0}` row did not flatten into columns")]
    NotARecord(String),
    #[error("table `{table}` references candle {id} which is not in the candle table")]
    UnknownCandle { table: String, id: CandleId },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// نوع اعلام‌شده یک ستون
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "float64")]
    Float,
    #[serde(rename = "int64")]
    Int,
    #[serde(rename = "str")]
    Text,
    /// میلی‌ثانیه یونیکس
    #[serde(rename = "datetime64[ms]")]
    Timestamp,
}

impl ColumnType {
    /// مقدار null با همه انواع سازگار است؛ رمزگشای سطر آن را در فیلدهای اجباری رد می‌کند
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Float, Value::Number(_)) => true,
            (ColumnType::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ColumnType::Timestamp, Value::Number(n)) => n.is_u64(),
            (ColumnType::Text, Value::String(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ColumnType::Float => "float64",
            ColumnType::Int => "int64",
            ColumnType::Text => "str",
            ColumnType::Timestamp => "datetime64[ms]",
        };
        write!(f, "{label}")
    }
}

/// نوع سطر یک جدول قابل تبدیل به ستون
pub trait Record: Serialize + DeserializeOwned {
    const COLUMNS: &'static [(&'static str, ColumnType)];

    fn candle_id(&self) -> &CandleId;
}

impl Record for ImbalanceRow {
    const COLUMNS: &'static [(&'static str, ColumnType)] = &[
        ("candle_id", ColumnType::Text),
        ("time", ColumnType::Timestamp),
        ("price", ColumnType::Float),
        ("bid_size", ColumnType::Float),
        ("ask_size", ColumnType::Float),
        ("sum", ColumnType::Float),
        ("text", ColumnType::Text),
        ("size", ColumnType::Float),
    ];

    fn candle_id(&self) -> &CandleId {
        &self.candle_id
    }
}

impl Record for AnnotationRow {
    const COLUMNS: &'static [(&'static str, ColumnType)] = &[
        ("candle_id", ColumnType::Text),
        ("time", ColumnType::Timestamp),
        ("price", ColumnType::Float),
        ("sum", ColumnType::Float),
        ("text", ColumnType::Text),
    ];

    fn candle_id(&self) -> &CandleId {
        &self.candle_id
    }
}

impl Record for LinePoint {
    const COLUMNS: &'static [(&'static str, ColumnType)] = &[
        ("candle_id", ColumnType::Text),
        ("price", ColumnType::Float),
        ("sequence", ColumnType::Int),
        ("time", ColumnType::Timestamp),
    ];

    fn candle_id(&self) -> &CandleId {
        &self.candle_id
    }
}

impl Record for MetricRow {
    const COLUMNS: &'static [(&'static str, ColumnType)] = &[
        ("candle_id", ColumnType::Text),
        ("type", ColumnType::Text),
        ("value", ColumnType::Float),
        ("text", ColumnType::Text),
    ];

    fn candle_id(&self) -> &CandleId {
        &self.candle_id
    }
}

impl Record for CandleRow {
    const COLUMNS: &'static [(&'static str, ColumnType)] = &[
        ("candle_id", ColumnType::Text),
        ("sequence", ColumnType::Int),
        ("time", ColumnType::Timestamp),
        ("open", ColumnType::Float),
        ("high", ColumnType::Float),
        ("low", ColumnType::Float),
        ("close", ColumnType::Float),
    ];

    fn candle_id(&self) -> &CandleId {
        &self.candle_id
    }
}

/// یک جدول به شکل ستونی
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatTable {
    pub columns: BTreeMap<String, Vec<Value>>,
    pub dtypes: BTreeMap<String, ColumnType>,
}

impl FlatTable {
    pub fn from_records<T: Record>(table: &str, rows: &[T]) -> Result<Self, StateError> {
        let mut columns: BTreeMap<String, Vec<Value>> = T::COLUMNS
            .iter()
            .map(|(name, _)| (name.to_string(), Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let Value::Object(mut fields) = serde_json::to_value(row)? else {
                return Err(StateError::NotARecord(table.to_string()));
            };

            for (name, values) in columns.iter_mut() {
                let cell = fields.remove(name).ok_or_else(|| StateError::MissingColumn {
                    table: table.to_string(),
                    column: name.clone(),
                })?;
                values.push(cell);
            }
        }

        let dtypes = T::COLUMNS
            .iter()
            .map(|(name, ty)| (name.to_string(), *ty))
            .collect();

        Ok(Self { columns, dtypes })
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// بررسی ساختار اعلام‌شده و تک‌تک سلول‌ها و سپس رمزگشایی سطرها.
    /// ستون‌هایی که `T` نمی‌شناسد نادیده گرفته می‌شوند.
    pub fn into_records<T: Record>(mut self, table: &str) -> Result<Vec<T>, StateError> {
        let missing = |column: &str| StateError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        };

        let mut columns = Vec::with_capacity(T::COLUMNS.len());
        for (name, expected) in T::COLUMNS {
            let found = *self.dtypes.get(*name).ok_or_else(|| missing(name))?;
            if found != *expected {
                return Err(StateError::ColumnType {
                    table: table.to_string(),
                    column: name.to_string(),
                    expected: *expected,
                    found,
                });
            }

            let values = self.columns.remove(*name).ok_or_else(|| missing(name))?;
            columns.push((*name, *expected, values));
        }

        let len = columns.first().map_or(0, |(_, _, values)| values.len());
        for (name, ty, values) in &columns {
            if values.len() != len {
                return Err(StateError::Length {
                    table: table.to_string(),
                    column: name.to_string(),
                    expected: len,
                    found: values.len(),
                });
            }

            if let Some((row, value)) = values.iter().enumerate().find(|(_, v)| !ty.accepts(v)) {
                return Err(StateError::Cell {
                    table: table.to_string(),
                    column: name.to_string(),
                    row,
                    expected: *ty,
                    value: value.clone(),
                });
            }
        }

        let mut cells: Vec<(&str, std::vec::IntoIter<Value>)> = columns
            .into_iter()
            .map(|(name, _, values)| (name, values.into_iter()))
            .collect();

        (0..len)
            .map(|row| {
                let fields: serde_json::Map<String, Value> = cells
                    .iter_mut()
                    .map(|(name, values)| (name.to_string(), values.next().unwrap_or(Value::Null)))
                    .collect();

                serde_json::from_value(Value::Object(fields)).map_err(|source| StateError::Row {
                    table: table.to_string(),
                    row,
                    source,
                })
            })
            .collect()
    }
}

pub const IMBALANCE_TABLE: &str = "imbalance";
pub const VOLUME_PROFILE_TABLE: &str = "volume_profile";
pub const UP_WICKS_TABLE: &str = "up_wicks";
pub const DOWN_WICKS_TABLE: &str = "down_wicks";
pub const UP_BODIES_TABLE: &str = "up_bodies";
pub const DOWN_BODIES_TABLE: &str = "down_bodies";
pub const METRICS_TABLE: &str = "metrics";
pub const CANDLES_TABLE: &str = "candles";

/// همه جدول‌های وضعیت پردازش‌شده بر اساس نام
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatState {
    pub tables: BTreeMap<String, FlatTable>,
}

impl FlatState {
    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("Processed state saved to {path:?}");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StateError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn insert<T: Record>(&mut self, name: &str, rows: &[T]) -> Result<(), StateError> {
        self.tables
            .insert(name.to_string(), FlatTable::from_records(name, rows)?);
        Ok(())
    }

    fn take<T: Record>(&mut self, name: &str) -> Result<Vec<T>, StateError> {
        self.tables
            .remove(name)
            .ok_or_else(|| StateError::MissingTable(name.to_string()))?
            .into_records(name)
    }
}

impl ProcessedState {
    pub fn to_flat(&self) -> Result<FlatState, StateError> {
        let mut flat = FlatState::default();

        flat.insert(IMBALANCE_TABLE, &self.imbalance)?;
        flat.insert(VOLUME_PROFILE_TABLE, &self.volume_profile)?;
        flat.insert(UP_WICKS_TABLE, &self.up_wicks)?;
        flat.insert(DOWN_WICKS_TABLE, &self.down_wicks)?;
        flat.insert(UP_BODIES_TABLE, &self.up_bodies)?;
        flat.insert(DOWN_BODIES_TABLE, &self.down_bodies)?;
        flat.insert(METRICS_TABLE, &self.metrics)?;
        flat.insert(CANDLES_TABLE, &self.candles)?;

        Ok(flat)
    }

    /// بازسازی وضعیت و بررسی ارجاع همه جدول‌ها به کندل‌های موجود
    pub fn from_flat(mut flat: FlatState) -> Result<Self, StateError> {
        let state = ProcessedState {
            imbalance: flat.take(IMBALANCE_TABLE)?,
            volume_profile: flat.take(VOLUME_PROFILE_TABLE)?,
            up_wicks: flat.take(UP_WICKS_TABLE)?,
            down_wicks: flat.take(DOWN_WICKS_TABLE)?,
            up_bodies: flat.take(UP_BODIES_TABLE)?,
            down_bodies: flat.take(DOWN_BODIES_TABLE)?,
            metrics: flat.take(METRICS_TABLE)?,
            candles: flat.take(CANDLES_TABLE)?,
        };

        if !flat.tables.is_empty() {
            log::warn!(
                "Ignoring unknown tables in processed state: {:?}",
                flat.tables.keys().collect::<Vec<_>>()
            );
        }

        let known: FxHashSet<&CandleId> = state.candles.iter().map(|c| &c.candle_id).collect();

        check_candles(IMBALANCE_TABLE, &state.imbalance, &known)?;
        check_candles(VOLUME_PROFILE_TABLE, &state.volume_profile, &known)?;
        check_candles(UP_WICKS_TABLE, &state.up_wicks, &known)?;
        check_candles(DOWN_WICKS_TABLE, &state.down_wicks, &known)?;
        check_candles(UP_BODIES_TABLE, &state.up_bodies, &known)?;
        check_candles(DOWN_BODIES_TABLE, &state.down_bodies, &known)?;
        check_candles(METRICS_TABLE, &state.metrics, &known)?;

        Ok(state)
    }
}

fn check_candles<T: Record>(
    table: &str,
    rows: &[T],
    known: &FxHashSet<&CandleId>,
) -> Result<(), StateError> {
    match rows.iter().find(|row| !known.contains(row.candle_id())) {
        Some(row) => Err(StateError::UnknownCandle {
            table: table.to_string(),
            id: row.candle_id().clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Sequential, process};
    use market::{Candle, OrderRow};

    fn state() -> ProcessedState {
        let candles: Vec<Candle> = (0..12)
            .map(|i| {
                let base = 100.0 + (i % 4) as f64 * 0.75;
                if i % 3 == 0 {
                    Candle::new(i * 60_000, base + 0.5, base + 1.0, base - 0.25, base)
                } else {
                    Candle::new(i * 60_000, base, base + 1.0, base - 0.25, base + 0.5)
                }
            })
            .collect();

        let rows: Vec<OrderRow> = (0..12u64)
            .flat_map(|i| {
                (0..3).map(move |level| {
                    let bid = ((i * 7 + level * 13) % 11) as f64 + 0.1;
                    let ask = ((i * 5 + level * 3) % 9) as f64 / 3.0;
                    OrderRow::new(i * 60_000, 101.0 - level as f64 * 0.25, bid, ask)
                })
            })
            .collect();

        process(&rows, &candles, &Sequential::default()).unwrap()
    }

    #[test]
    fn round_trip_through_json_is_exact() {
        let state = state();
        assert!(state.metrics.iter().any(|m| m.value.is_none()));
        assert!(state.up_wicks.iter().any(LinePoint::is_gap));

        let json = state.to_flat().unwrap().to_json().unwrap();
        let restored = ProcessedState::from_flat(FlatState::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored, state);
    }

    #[test]
    fn dtypes_are_declared_per_column() {
        let flat = state().to_flat().unwrap();

        let imbalance = &flat.tables[IMBALANCE_TABLE];
        assert_eq!(imbalance.dtypes["time"], ColumnType::Timestamp);
        assert_eq!(imbalance.dtypes["text"], ColumnType::Text);
        assert_eq!(imbalance.columns["size"].len(), imbalance.len());

        let json = serde_json::to_value(&flat).unwrap();
        assert_eq!(json["up_wicks"]["dtypes"]["sequence"], "int64");
        assert_eq!(json["metrics"]["dtypes"]["value"], "float64");
        assert!(json["up_wicks"]["columns"]["price"][2].is_null());
    }

    #[test]
    fn missing_table_is_named() {
        let mut flat = state().to_flat().unwrap();
        flat.tables.remove(METRICS_TABLE);

        let err = ProcessedState::from_flat(flat).unwrap_err();
        assert!(matches!(err, StateError::MissingTable(name) if name == METRICS_TABLE));
    }

    #[test]
    fn declared_type_must_match() {
        let mut flat = state().to_flat().unwrap();
        if let Some(table) = flat.tables.get_mut(CANDLES_TABLE) {
            table.dtypes.insert("open".to_string(), ColumnType::Text);
        }

        let err = ProcessedState::from_flat(flat).unwrap_err();
        assert!(matches!(
            err,
            StateError::ColumnType { expected: ColumnType::Float, found: ColumnType::Text, .. }
        ));
    }

    #[test]
    fn cells_are_checked_against_their_type() {
        let mut flat = state().to_flat().unwrap();
        if let Some(table) = flat.tables.get_mut(IMBALANCE_TABLE) {
            table.columns.get_mut("bid_size").unwrap()[3] = Value::from("12");
        }

        let err = ProcessedState::from_flat(flat).unwrap_err();
        assert!(matches!(err, StateError::Cell { row: 3, .. }), "{err}");
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let mut flat = state().to_flat().unwrap();
        if let Some(table) = flat.tables.get_mut(VOLUME_PROFILE_TABLE) {
            table.columns.get_mut("text").unwrap().pop();
        }

        let err = ProcessedState::from_flat(flat).unwrap_err();
        assert!(matches!(err, StateError::Length { .. }), "{err}");
    }

    #[test]
    fn null_in_required_column_fails_decoding() {
        let mut flat = state().to_flat().unwrap();
        if let Some(table) = flat.tables.get_mut(CANDLES_TABLE) {
            table.columns.get_mut("close").unwrap()[0] = Value::Null;
        }

        let err = ProcessedState::from_flat(flat).unwrap_err();
        assert!(matches!(err, StateError::Row { row: 0, .. }), "{err}");
    }

    #[test]
    fn derived_rows_must_reference_candles() {
        let mut state = state();
        state.metrics[0].candle_id = CandleId::from("ghost");

        let flat = state.to_flat().unwrap();
        let err = ProcessedState::from_flat(flat).unwrap_err();
        assert!(matches!(err, StateError::UnknownCandle { id, .. } if id.as_str() == "ghost"));
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = std::env::temp_dir().join(format!("orderflow-state-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");

        let flat = state().to_flat().unwrap();
        flat.save(&path).unwrap();

        let loaded = FlatState::load(&path).unwrap();
        assert_eq!(loaded, flat);
        assert_eq!(ProcessedState::from_flat(loaded).unwrap(), state());

        assert!(matches!(
            FlatState::load(&dir.join("missing.json")),
            Err(StateError::Io(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
