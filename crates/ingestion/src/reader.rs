//! Tick file loading.
//!
//! Two encodings are recognized: Apache Parquet (by `.parquet` extension) and
//! delimited text for everything else. Both produce ticks sorted by
//! timestamp.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMillisecondType};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use ticklab_core::{Error, Result, Tick, TimestampMs};
use tracing::info;

/// Encoding of a tick file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFormat {
    /// Columnar binary (Apache Parquet).
    Parquet,
    /// Delimited text with a header row.
    Csv,
}

impl TickFormat {
    /// Pick the encoding from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => TickFormat::Parquet,
            _ => TickFormat::Csv,
        }
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a timestamp string into epoch milliseconds.
///
/// Accepts integer epoch milliseconds, RFC 3339, and naive date-times
/// (interpreted as UTC).
pub fn parse_timestamp(text: &str) -> Option<TimestampMs> {
    let text = text.trim();
    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ndt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc().timestamp_millis())
}

/// Load ticks from a Parquet or CSV file, sorted ascending by timestamp.
///
/// The sort is stable, so the result is a reordering of the file's rows.
pub fn load_ticks(path: impl AsRef<Path>) -> Result<Vec<Tick>> {
    let path = path.as_ref();
    let format = TickFormat::from_path(path);
    let mut ticks = match format {
        TickFormat::Parquet => read_parquet(path)?,
        TickFormat::Csv => read_csv(path)?,
    };
    ticks.sort_by_key(|t| t.ts_ms);
    info!("Loaded {} ticks from {} ({:?})", ticks.len(), path.display(), format);
    Ok(ticks)
}

/// One CSV row as found on disk.
#[derive(Debug, Deserialize)]
struct TickRecord {
    timestamp: String,
    bid: f64,
    ask: f64,
    bid_size: f64,
    ask_size: f64,
    #[serde(default)]
    mid_price: Option<f64>,
    #[serde(alias = "trade_size")]
    size: f64,
}

impl TickRecord {
    fn into_tick(self) -> Option<Tick> {
        let ts_ms = parse_timestamp(&self.timestamp)?;
        let mut tick = Tick {
            ts_ms,
            bid: self.bid,
            ask: self.ask,
            bid_size: self.bid_size,
            ask_size: self.ask_size,
            mid_price: 0.0,
            trade_size: self.size,
        };
        tick.mid_price = self.mid_price.unwrap_or_else(|| tick.book_mid());
        Some(tick)
    }
}

fn read_csv(path: &Path) -> Result<Vec<Tick>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| format_error(path, e))?;

    let mut ticks = Vec::new();
    for (line, record) in reader.deserialize::<TickRecord>().enumerate() {
        let record = record.map_err(|e| format_error(path, e))?;
        let raw_ts = record.timestamp.clone();
        let tick = record.into_tick().ok_or_else(|| {
            format_error(path, format!("row {}: unparseable timestamp {:?}", line + 1, raw_ts))
        })?;
        ticks.push(tick);
    }
    Ok(ticks)
}

fn read_parquet(path: &Path) -> Result<Vec<Tick>> {
    let file = File::open(path).map_err(|e| format_error(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| format_error(path, e))?;

    let mut ticks = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| format_error(path, e))?;
        append_batch(&batch, &mut ticks).map_err(|e| match e {
            Error::Format(msg) => format_error(path, msg),
            other => other,
        })?;
    }
    Ok(ticks)
}

pub(crate) fn format_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::format(format!("{}: {}", path.display(), err))
}

fn append_batch(batch: &RecordBatch, ticks: &mut Vec<Tick>) -> Result<()> {
    let ts = timestamp_column(batch)?;
    let bid = float_column(batch, &["bid"])?;
    let ask = float_column(batch, &["ask"])?;
    let bid_size = float_column(batch, &["bid_size"])?;
    let ask_size = float_column(batch, &["ask_size"])?;
    let size = float_column(batch, &["size", "trade_size"])?;
    let mid = match batch.column_by_name("mid_price") {
        Some(_) => Some(float_column(batch, &["mid_price"])?),
        None => None,
    };

    ticks.reserve(batch.num_rows());
    for i in 0..batch.num_rows() {
        let mut tick = Tick {
            ts_ms: ts[i],
            bid: bid[i],
            ask: ask[i],
            bid_size: bid_size[i],
            ask_size: ask_size[i],
            mid_price: 0.0,
            trade_size: size[i],
        };
        tick.mid_price = match &mid {
            Some(m) => m[i],
            None => tick.book_mid(),
        };
        ticks.push(tick);
    }
    Ok(())
}

fn lookup<'a>(batch: &'a RecordBatch, names: &[&str]) -> Result<&'a ArrayRef> {
    names
        .iter()
        .find_map(|n| batch.column_by_name(n))
        .ok_or_else(|| Error::format(format!("missing column {}", names.join("|"))))
}

fn float_column(batch: &RecordBatch, names: &[&str]) -> Result<Vec<f64>> {
    let column = lookup(batch, names)?;
    if column.null_count() > 0 {
        return Err(Error::format(format!("column {} contains nulls", names[0])));
    }
    let values = cast(column, &DataType::Float64)
        .map_err(|e| Error::format(format!("column {}: {}", names[0], e)))?;
    Ok(values.as_primitive::<Float64Type>().values().to_vec())
}

fn timestamp_column(batch: &RecordBatch) -> Result<Vec<TimestampMs>> {
    let column = lookup(batch, &["timestamp"])?;
    if column.null_count() > 0 {
        return Err(Error::format("column timestamp contains nulls"));
    }
    let cast_err = |e: arrow::error::ArrowError| Error::format(format!("column timestamp: {}", e));

    match column.data_type() {
        DataType::Timestamp(_, tz) => {
            // Keep the zone so values stay UTC epoch offsets.
            let target = DataType::Timestamp(TimeUnit::Millisecond, tz.clone());
            let values = cast(column, &target).map_err(cast_err)?;
            Ok(values.as_primitive::<TimestampMillisecondType>().values().to_vec())
        }
        DataType::Int64 | DataType::Int32 | DataType::UInt32 | DataType::UInt64 => {
            let values = cast(column, &DataType::Int64).map_err(cast_err)?;
            Ok(values.as_primitive::<Int64Type>().values().to_vec())
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let values = cast(column, &DataType::Utf8).map_err(cast_err)?;
            values
                .as_string::<i32>()
                .iter()
                .map(|s| {
                    s.and_then(parse_timestamp).ok_or_else(|| {
                        Error::format(format!("unparseable timestamp {:?}", s.unwrap_or_default()))
                    })
                })
                .collect()
        }
        other => Err(Error::format(format!("unsupported timestamp type {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TickFormat::from_path(Path::new("a/b.parquet")), TickFormat::Parquet);
        assert_eq!(TickFormat::from_path(Path::new("a/b.PARQUET")), TickFormat::Parquet);
        assert_eq!(TickFormat::from_path(Path::new("a/b.csv")), TickFormat::Csv);
        assert_eq!(TickFormat::from_path(Path::new("ticks")), TickFormat::Csv);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1609493400000"), Some(1_609_493_400_000));
        assert_eq!(parse_timestamp("2021-01-01 09:30:00"), Some(1_609_493_400_000));
        assert_eq!(parse_timestamp("2021-01-01 09:30:00.250"), Some(1_609_493_400_250));
        assert_eq!(parse_timestamp("2021-01-01T09:30:00.5"), Some(1_609_493_400_500));
        assert_eq!(parse_timestamp("2021-01-01T10:30:00+01:00"), Some(1_609_493_400_000));
        assert_eq!(parse_timestamp("2021-01-01"), Some(1_609_459_200_000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_load_csv_sorts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "ticks.csv",
            "timestamp,bid,ask,bid_size,ask_size,mid_price,size\n\
             2021-01-01 09:30:02,99.9,100.1,10,20,100.0,3\n\
             2021-01-01 09:30:00,99.8,100.0,11,21,99.9,1\n\
             2021-01-01 09:30:01,99.7,99.9,12,22,99.8,2\n",
        );

        let ticks = load_ticks(&path).unwrap();

        assert_eq!(ticks.len(), 3);
        assert!(ticks.windows(2).all(|w| w[0].ts_ms <= w[1].ts_ms));
        let sizes: Vec<f64> = ticks.iter().map(|t| t.trade_size).collect();
        assert_eq!(sizes, vec![1.0, 2.0, 3.0]);
        assert!((ticks[0].mid_price - 99.9).abs() < 1e-10);
    }

    #[test]
    fn test_load_csv_without_mid_uses_book_mid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "ticks.csv",
            "timestamp,bid,ask,bid_size,ask_size,trade_size\n\
             1000,99.0,101.0,1,1,5\n",
        );

        let ticks = load_ticks(&path).unwrap();

        assert!((ticks[0].mid_price - 100.0).abs() < 1e-10);
        assert!((ticks[0].trade_size - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_malformed_csv_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad_number = write_file(
            &dir,
            "bad.csv",
            "timestamp,bid,ask,bid_size,ask_size,size\n1000,abc,101,1,1,1\n",
        );
        assert!(matches!(load_ticks(&bad_number), Err(Error::Format(_))));

        let bad_ts = write_file(
            &dir,
            "bad_ts.csv",
            "timestamp,bid,ask,bid_size,ask_size,size\nnot-a-time,99,101,1,1,1\n",
        );
        assert!(matches!(load_ticks(&bad_ts), Err(Error::Format(_))));

        let missing = write_file(&dir, "missing.csv", "timestamp,bid\n1000,99\n");
        assert!(matches!(load_ticks(&missing), Err(Error::Format(_))));
    }

    #[test]
    fn test_garbage_parquet_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "ticks.parquet", "definitely not parquet");
        assert!(matches!(load_ticks(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_unreadable_file_is_format_error() {
        assert!(matches!(load_ticks("/nonexistent/dir/ticks.parquet"), Err(Error::Format(_))));
        assert!(matches!(load_ticks("/nonexistent/dir/ticks.csv"), Err(Error::Format(_))));
    }
}
