//! خواندن دو جدول ورودی از فایل CSV.
//!
//! Order rows: `time,price,bid_size,ask_size[,candle_id][,imbalance]`
//! Candles: `time,open,high,low,close[,candle_id]`
//!
//! ستون `time` یا میلی‌ثانیه یونیکس است یا زمان UTC
//! (`2024-01-01T00:00:00Z`, `2024-01-01 00:00:00`).
use crate::{Candle, CandleId, OrderRow, Price};

use chrono::{DateTime, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;

use std::{fs::File, io, path::Path};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open {path}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed record {line}")]
    Record {
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("record {line}: invalid timestamp {value:?}")]
    Timestamp { line: u64, value: String },
    #[error("record {line}: {field} must be a finite number")]
    NonFinite { line: u64, field: &'static str },
}

#[derive(Deserialize)]
struct OrderRecord {
    time: String,
    price: f64,
    bid_size: f64,
    ask_size: f64,
    #[serde(default)]
    candle_id: Option<String>,
    #[serde(default)]
    imbalance: Option<f64>,
}

#[derive(Deserialize)]
struct CandleRecord {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    candle_id: Option<String>,
}

pub fn order_rows_from_path(path: impl AsRef<Path>) -> Result<Vec<OrderRow>, Error> {
    read_order_rows(open(path.as_ref())?)
}

pub fn candles_from_path(path: impl AsRef<Path>) -> Result<Vec<Candle>, Error> {
    read_candles(open(path.as_ref())?)
}

pub fn read_order_rows<R: io::Read>(reader: R) -> Result<Vec<OrderRow>, Error> {
    let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();

    for (idx, record) in csv_reader.deserialize::<OrderRecord>().enumerate() {
        let line = idx as u64 + 2;
        let record = record.map_err(|source| Error::Record { line, source })?;

        finite(line, "price", record.price)?;
        finite(line, "bid_size", record.bid_size)?;
        finite(line, "ask_size", record.ask_size)?;

        rows.push(OrderRow {
            time: parse_time(line, &record.time)?,
            price: Price::from_f64(record.price),
            bid_size: record.bid_size,
            ask_size: record.ask_size,
            candle_id: non_empty(record.candle_id),
            imbalance: record.imbalance,
        });
    }

    log::debug!("Loaded {} order rows", rows.len());
    Ok(rows)
}

pub fn read_candles<R: io::Read>(reader: R) -> Result<Vec<Candle>, Error> {
    let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles = Vec::new();

    for (idx, record) in csv_reader.deserialize::<CandleRecord>().enumerate() {
        let line = idx as u64 + 2;
        let record = record.map_err(|source| Error::Record { line, source })?;

        finite(line, "open", record.open)?;
        finite(line, "high", record.high)?;
        finite(line, "low", record.low)?;
        finite(line, "close", record.close)?;

        candles.push(Candle {
            time: parse_time(line, &record.time)?,
            open: Price::from_f64(record.open),
            high: Price::from_f64(record.high),
            low: Price::from_f64(record.low),
            close: Price::from_f64(record.close),
            candle_id: non_empty(record.candle_id),
        });
    }

    log::debug!("Loaded {} candles", candles.len());
    Ok(candles)
}

fn open(path: &Path) -> Result<File, Error> {
    File::open(path).map_err(|source| Error::Open {
        path: path.display().to_string(),
        source,
    })
}

fn finite(line: u64, field: &'static str, value: f64) -> Result<(), Error> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::NonFinite { line, field })
    }
}

fn non_empty(id: Option<String>) -> Option<CandleId> {
    id.filter(|s| !s.is_empty()).map(CandleId::from)
}

/// میلی‌ثانیه یونیکس، RFC 3339 یا زمان بدون منطقه (به عنوان UTC)
pub fn parse_time(line: u64, value: &str) -> Result<u64, Error> {
    let invalid = || Error::Timestamp {
        line,
        value: value.to_string(),
    };

    if let Ok(ms) = value.parse::<u64>() {
        return Ok(ms);
    }

    let millis = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.timestamp_millis()
    } else {
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|naive| naive.and_utc().timestamp_millis())
            .ok_or_else(invalid)?
    };

    u64::try_from(millis).map_err(|_| invalid())
}
