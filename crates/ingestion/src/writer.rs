//! Tick and feature table writers.

use crate::reader::{format_error, TickFormat};
use arrow::array::{ArrayRef, Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use ticklab_core::{FeatureFrame, Result, Tick, TimestampMs};
use tracing::info;

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM:SS.fff` (UTC).
pub fn format_timestamp(ts_ms: TimestampMs) -> String {
    match DateTime::from_timestamp_millis(ts_ms) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => ts_ms.to_string(),
    }
}

/// Write ticks; the encoding follows the path's extension.
pub fn write_ticks(path: impl AsRef<Path>, ticks: &[Tick]) -> Result<()> {
    let path = path.as_ref();
    match TickFormat::from_path(path) {
        TickFormat::Parquet => write_parquet(path, ticks)?,
        TickFormat::Csv => write_csv(path, ticks)?,
    }
    info!("Wrote {} ticks to {}", ticks.len(), path.display());
    Ok(())
}

#[derive(Serialize)]
struct TickRow {
    timestamp: String,
    bid: f64,
    ask: f64,
    bid_size: f64,
    ask_size: f64,
    mid_price: f64,
    size: f64,
}

fn write_csv(path: &Path, ticks: &[Tick]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| format_error(path, e))?;
    for tick in ticks {
        writer
            .serialize(TickRow {
                timestamp: format_timestamp(tick.ts_ms),
                bid: tick.bid,
                ask: tick.ask,
                bid_size: tick.bid_size,
                ask_size: tick.ask_size,
                mid_price: tick.mid_price,
                size: tick.trade_size,
            })
            .map_err(|e| format_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, ticks: &[Tick]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("timestamp", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("bid", DataType::Float64, false),
        Field::new("ask", DataType::Float64, false),
        Field::new("bid_size", DataType::Float64, false),
        Field::new("ask_size", DataType::Float64, false),
        Field::new("mid_price", DataType::Float64, false),
        Field::new("size", DataType::Float64, false),
    ]));

    let float = |f: fn(&Tick) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(ticks.iter().map(f).collect::<Vec<_>>()))
    };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMillisecondArray::from(
            ticks.iter().map(|t| t.ts_ms).collect::<Vec<_>>(),
        )),
        float(|t| t.bid),
        float(|t| t.ask),
        float(|t| t.bid_size),
        float(|t| t.ask_size),
        float(|t| t.mid_price),
        float(|t| t.trade_size),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns).map_err(|e| format_error(path, e))?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None).map_err(|e| format_error(path, e))?;
    writer.write(&batch).map_err(|e| format_error(path, e))?;
    writer.close().map_err(|e| format_error(path, e))?;
    Ok(())
}

/// Write a feature table as CSV with a leading `timestamp` column.
pub fn write_frame_csv(path: impl AsRef<Path>, frame: &FeatureFrame) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path).map_err(|e| format_error(path, e))?;

    let mut header = vec!["timestamp".to_string()];
    header.extend(frame.columns().iter().cloned());
    writer.write_record(&header).map_err(|e| format_error(path, e))?;

    let values = frame.values();
    for (i, ts) in frame.index().iter().enumerate() {
        let mut record = vec![format_timestamp(*ts)];
        record.extend(values.row(i).iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(|e| format_error(path, e))?;
    }
    writer.flush()?;
    info!("Wrote {} feature rows to {}", frame.len(), path.display());
    Ok(())
}
