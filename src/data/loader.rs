use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDateTime, NaiveTime};
use log::debug;

use super::grid::{CellRef, Grid};
use super::model::CellValue;
use crate::error::{Error, Location, Result};

// ---------------------------------------------------------------------------
// GridSource – the spreadsheet decoding collaborator
// ---------------------------------------------------------------------------

/// Turns a named file into a grid of cells.
///
/// The engine only ever talks to this trait, so tests and callers with their
/// own decoders can swap the default [`WorkbookReader`] out.
pub trait GridSource {
    fn read_grid(&self, path: &Path) -> Result<Grid>;
}

/// Default decoder: first worksheet of a workbook, or a delimited text file.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookReader;

impl GridSource for WorkbookReader {
    fn read_grid(&self, path: &Path) -> Result<Grid> {
        load_grid(path)
    }
}

/// Load a grid from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods` – first worksheet
/// * `.csv` – comma separated
/// * `.tsv` / `.txt` – tab separated (the reader's plain-text export)
pub fn load_grid(path: &Path) -> Result<Grid> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let grid = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path),
        "csv" => load_delimited(path, b','),
        "tsv" | "txt" => load_delimited(path, b'\t'),
        other => Err(Error::format(
            path.display().to_string(),
            Location::Workbook,
            format!("unsupported file extension .{other}"),
        )),
    }?;
    debug!("{}: decoded {} rows", path.display(), grid.height());
    Ok(grid)
}

// ---------------------------------------------------------------------------
// Workbook loader
// ---------------------------------------------------------------------------

fn load_workbook(path: &Path) -> Result<Grid> {
    let file = path.display().to_string();
    let decode = |e: calamine::Error| Error::format(file.clone(), Location::Workbook, e.to_string());

    // A workbook that cannot be opened at all is an I/O error, not a format one.
    File::open(path).map_err(|source| Error::Io {
        file: file.clone(),
        source,
    })?;
    let mut workbook = open_workbook_auto(path).map_err(decode)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::format(file.clone(), Location::Workbook, "workbook has no worksheets"))?
        .map_err(decode)?;

    // Ranges start at the first used cell; pad so cell references stay absolute.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col_offset];
        cells.extend(row.iter().map(cell_from_workbook));
        rows.push(cells);
    }
    Ok(Grid::new(rows))
}

fn cell_from_workbook(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.trim().to_string()),
        Data::DateTime(dt) if !dt.is_duration() => match dt.as_datetime() {
            Some(ts) => CellValue::Text(timestamp_text(ts)),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::Text(s.replacen('T', " ", 1)),
        // Durations and error cells are only ever labels here.
        other => CellValue::Text(other.to_string()),
    }
}

/// `2021-03-04` for a whole day, `2021-03-04 10:20:00` otherwise; the forms
/// the plate header reader understands.
fn timestamp_text(ts: NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.date().format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

fn load_delimited(path: &Path, delimiter: u8) -> Result<Grid> {
    let file = path.display().to_string();
    let handle = File::open(path).map_err(|source| Error::Io {
        file: file.clone(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(handle);

    // Instrument exports are not always UTF-8 (Latin-1 units in the header),
    // so fields are decoded lossily one by one.
    let mut rows = Vec::new();
    for (row_no, result) in reader.byte_records().enumerate() {
        let record = result.map_err(|e| {
            Error::format(
                file.clone(),
                Location::Cell(CellRef::new(row_no, 0)),
                e.to_string(),
            )
        })?;
        rows.push(
            record
                .iter()
                .map(|field| CellValue::guess(&String::from_utf8_lossy(field)))
                .collect(),
        );
    }
    Ok(Grid::new(rows))
}
