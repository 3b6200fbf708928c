use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::data::model::{CellValue, NormalizedRow, PlateId};
use crate::data::table::NormalizedTable;
use crate::data::well::WellCoordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Parquet => write!(f, "parquet"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            other => Err(format!("unknown export format '{other}' (expected csv, json or parquet)")),
        }
    }
}

/// Flat view of a normalized row. Non-finite numbers become gaps.
#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    plate: PlateId,
    well: WellCoordinate,
    sample: &'a str,
    induction: &'a CellValue,
    replicate: Option<&'a str>,
    group: &'a str,
    date: Option<NaiveDate>,
    firefly: Option<f64>,
    renilla: Option<f64>,
    ratio: Option<f64>,
    normalized: Option<f64>,
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

impl<'a> From<&'a NormalizedRow> for ExportRecord<'a> {
    fn from(r: &'a NormalizedRow) -> Self {
        ExportRecord {
            plate: r.row.plate,
            well: r.row.well,
            sample: &r.row.sample,
            induction: &r.row.induction,
            replicate: r.row.replicate.as_deref(),
            group: &r.row.group,
            date: r.row.date,
            firefly: finite(r.row.firefly),
            renilla: finite(r.row.renilla),
            ratio: finite(r.ratio),
            normalized: finite(r.normalized),
        }
    }
}

/// Write the table to `path` in the given format.
pub fn write_table(path: &Path, table: &NormalizedTable, format: ExportFormat) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match format {
        ExportFormat::Csv => write_csv(BufWriter::new(file), table),
        ExportFormat::Json => write_json(BufWriter::new(file), table),
        ExportFormat::Parquet => write_parquet(file, table),
    }
    .with_context(|| format!("writing {format} to {}", path.display()))?;
    info!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn write_csv<W: Write>(writer: W, table: &NormalizedTable) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in table {
        writer.serialize(ExportRecord::from(row)).context("serializing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

pub fn write_json<W: Write>(mut writer: W, table: &NormalizedTable) -> Result<()> {
    let records: Vec<ExportRecord> = table.iter().map(ExportRecord::from).collect();
    serde_json::to_writer_pretty(&mut writer, &records).context("serializing JSON")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_parquet<W: Write + Send>(writer: W, table: &NormalizedTable) -> Result<()> {
    let batch = to_record_batch(table)?;
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Columnar form of the table. Induction is stored as text so mixed
/// numeric and label levels share one column.
pub fn to_record_batch(table: &NormalizedTable) -> Result<RecordBatch> {
    let records: Vec<ExportRecord> = table.iter().map(ExportRecord::from).collect();

    let text = |v: &CellValue| (!v.is_empty()).then(|| v.to_string());

    let schema = Arc::new(Schema::new(vec![
        Field::new("plate", DataType::UInt32, false),
        Field::new("well", DataType::Utf8, false),
        Field::new("sample", DataType::Utf8, false),
        Field::new("induction", DataType::Utf8, true),
        Field::new("replicate", DataType::Utf8, true),
        Field::new("group", DataType::Utf8, false),
        Field::new("date", DataType::Date32, true),
        Field::new("firefly", DataType::Float64, true),
        Field::new("renilla", DataType::Float64, true),
        Field::new("ratio", DataType::Float64, true),
        Field::new("normalized", DataType::Float64, true),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from(records.iter().map(|r| r.plate.0).collect::<Vec<_>>())),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.well.to_string()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(records.iter().map(|r| r.sample).collect::<Vec<_>>())),
        Arc::new(StringArray::from(
            records.iter().map(|r| text(r.induction)).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(records.iter().map(|r| r.replicate).collect::<Vec<_>>())),
        Arc::new(StringArray::from(records.iter().map(|r| r.group).collect::<Vec<_>>())),
        Arc::new(Date32Array::from(
            records.iter().map(|r| r.date.map(days_since_epoch)).collect::<Vec<_>>(),
        )),
        floats(&records, |r| r.firefly),
        floats(&records, |r| r.renilla),
        floats(&records, |r| r.ratio),
        floats(&records, |r| r.normalized),
    ];

    RecordBatch::try_new(schema, columns).context("building record batch")
}

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

fn floats(records: &[ExportRecord], value: impl Fn(&ExportRecord) -> Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(records.iter().map(value).collect::<Vec<_>>()))
}
