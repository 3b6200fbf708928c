//! Plate reader export decoding.
//!
//! Two layouts are recognised:
//!
//! ```text
//!  plate map                      well list
//!  <>   1     2     3   ...       Well  Value
//!  A    812   903   OVER          A1    812
//!  B    1002  Error 955           A2    903
//!  ...                            ...
//! ```
//!
//! Both end at the first row whose label cell is empty.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;

use super::grid::{CellRef, Grid};
use super::model::{CellValue, Channel, PlateInfo, PlateReading};
use super::well::WellCoordinate;
use crate::error::{Error, Location, Result};

/// Marker in the top-left corner of a plate map block.
const PLATE_MAP_ANCHOR: &str = "<>";
/// Header of the label column in a well list export.
const WELL_LIST_ANCHOR: &str = "well";
/// Instrument marker for a saturated detector.
const OVERFLOW_MARKER: &str = "OVER";
/// How far right of a header label its value may sit.
const HEADER_SPAN: usize = 4;

/// Decode one source grid into the readings of one plate/channel.
pub fn parse_plate(grid: &Grid, source: &str, channel: Channel) -> Result<PlateReading> {
    let info = read_header(grid);

    let wells = if let Some(anchor) = grid.find(|c| c.as_text() == Some(PLATE_MAP_ANCHOR)) {
        parse_plate_map(grid, source, anchor)?
    } else if let Some(anchor) =
        grid.find(|c| c.as_text().is_some_and(|t| t.eq_ignore_ascii_case(WELL_LIST_ANCHOR)))
    {
        parse_well_list(grid, source, anchor)?
    } else {
        return Err(Error::format(
            source,
            Location::Workbook,
            "no plate block found (expected a '<>' plate map or a 'Well' column)",
        ));
    };

    let missing = wells.values().filter(|v| v.is_none()).count();
    debug!(
        "{source}: {} wells on {channel}, {missing} without a value",
        wells.len()
    );

    Ok(PlateReading {
        source: Arc::from(source),
        channel,
        info,
        wells,
    })
}

/// Interpret one data cell. Instrument error markers are missing, not zero.
pub fn read_intensity(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Integer(i) => Some(*i as f64),
        CellValue::Float(v) if !v.is_nan() => Some(*v),
        CellValue::Text(t) if t.eq_ignore_ascii_case(OVERFLOW_MARKER) => Some(f64::INFINITY),
        CellValue::Text(t) => t.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
        _ => None,
    }
}

fn parse_plate_map(
    grid: &Grid,
    source: &str,
    anchor: CellRef,
) -> Result<BTreeMap<WellCoordinate, Option<f64>>> {
    // Column headers run right of the anchor up to the first empty cell.
    let mut columns = Vec::new();
    let mut seen_columns = BTreeSet::new();
    for col in anchor.column + 1.. {
        let at = CellRef::new(anchor.row, col);
        let cell = grid.at(at);
        if cell.is_empty() {
            break;
        }
        let number = cell
            .as_integer()
            .filter(|n| *n > 0 && *n <= i64::from(u32::MAX))
            .ok_or_else(|| {
                Error::format(
                    source,
                    Location::Cell(at),
                    format!("column header '{cell}' is not a column number"),
                )
            })? as u32;
        if !seen_columns.insert(number) {
            return Err(Error::integrity(
                source,
                Location::Cell(at),
                format!("column {number} appears twice"),
            ));
        }
        columns.push((col, number));
    }
    if columns.is_empty() {
        return Err(Error::format(
            source,
            Location::Cell(anchor),
            "plate map has no column headers",
        ));
    }

    let mut wells = BTreeMap::new();
    let mut seen_rows = BTreeSet::new();
    for row in anchor.row + 1.. {
        let at = CellRef::new(row, anchor.column);
        let label = grid.at(at);
        if label.is_empty() {
            break;
        }
        let row_number = label
            .as_text()
            .and_then(WellCoordinate::parse_row_label)
            .ok_or_else(|| {
                Error::format(
                    source,
                    Location::Cell(at),
                    format!("'{label}' is not a row label"),
                )
            })?;
        if !seen_rows.insert(row_number) {
            return Err(Error::integrity(
                source,
                Location::Cell(at),
                format!("row {label} appears twice"),
            ));
        }
        for &(col, number) in &columns {
            // Both are non-zero here, so the coordinate always exists.
            if let Some(well) = WellCoordinate::new(row_number, number) {
                wells.insert(well, read_intensity(grid.cell(row, col)));
            }
        }
    }
    if wells.is_empty() {
        return Err(Error::format(
            source,
            Location::Cell(anchor),
            "plate map has no rows",
        ));
    }
    Ok(wells)
}

fn parse_well_list(
    grid: &Grid,
    source: &str,
    anchor: CellRef,
) -> Result<BTreeMap<WellCoordinate, Option<f64>>> {
    let value_column = grid.row(anchor.row)[anchor.column + 1..]
        .iter()
        .position(|c| !c.is_empty())
        .map(|offset| anchor.column + 1 + offset)
        .ok_or_else(|| {
            Error::format(
                source,
                Location::Cell(anchor),
                "well list has no value column",
            )
        })?;

    let mut wells = BTreeMap::new();
    for row in anchor.row + 1.. {
        let at = CellRef::new(row, anchor.column);
        let label = grid.at(at);
        if label.is_empty() {
            break;
        }
        let well: WellCoordinate = label
            .to_string()
            .parse()
            .map_err(|e: super::well::WellParseError| {
                Error::format(source, Location::Cell(at), e.to_string())
            })?;
        match wells.entry(well) {
            Entry::Vacant(slot) => {
                slot.insert(read_intensity(grid.cell(row, value_column)));
            }
            Entry::Occupied(_) => {
                return Err(Error::integrity(
                    source,
                    Location::Cell(at),
                    format!("well {well} appears twice"),
                ));
            }
        }
    }
    if wells.is_empty() {
        return Err(Error::format(
            source,
            Location::Cell(anchor),
            "well list has no wells",
        ));
    }
    Ok(wells)
}

/// Collect the instrument header labels from the first column.
fn read_header(grid: &Grid) -> PlateInfo {
    let mut info = PlateInfo::default();
    for row in 0..grid.height() {
        let at = CellRef::new(row, 0);
        let Some(label) = grid.at(at).as_text() else {
            continue;
        };
        if let Some(device) = label.strip_prefix("Device: ") {
            info.device.get_or_insert_with(|| device.trim().to_string());
            continue;
        }
        let slot = match label {
            "Date:" => &mut info.date,
            "Time:" => &mut info.time,
            "Start Time:" => &mut info.start,
            "End Time:" => &mut info.end,
            _ => continue,
        };
        if slot.is_none() {
            *slot = grid.next_to(at, HEADER_SPAN).map(|v| v.to_string());
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well(s: &str) -> WellCoordinate {
        s.parse().unwrap()
    }

    fn plate_map() -> Grid {
        Grid::from_text([
            vec!["Application: Tecan i-control"],
            vec!["Device: infinite 200Pro"],
            vec!["Date:", "", "2021-03-04"],
            vec!["Time:", "10:15:00 AM"],
            vec![""],
            vec!["<>", "1", "2", "3"],
            vec!["A", "100", "200", "OVER"],
            vec!["b", "Error", "", "12.5"],
            vec![""],
            vec!["End Time:", "3/4/2021 10:20:00 AM"],
        ])
    }

    #[test]
    fn plate_map_reads_every_well() {
        let reading = parse_plate(&plate_map(), "p1.csv", Channel::Firefly).unwrap();
        assert_eq!(reading.wells.len(), 6);
        assert_eq!(reading.wells[&well("A1")], Some(100.0));
        assert_eq!(reading.wells[&well("A3")], Some(f64::INFINITY));
        assert_eq!(reading.wells[&well("B1")], None);
        assert_eq!(reading.wells[&well("B2")], None);
        assert_eq!(reading.wells[&well("B3")], Some(12.5));
        assert_eq!(&*reading.source, "p1.csv");
    }

    #[test]
    fn header_fields_are_collected() {
        let info = parse_plate(&plate_map(), "p1.csv", Channel::Firefly)
            .unwrap()
            .info;
        assert_eq!(info.device.as_deref(), Some("infinite 200Pro"));
        assert_eq!(info.date.as_deref(), Some("2021-03-04"));
        assert_eq!(info.time.as_deref(), Some("10:15:00 AM"));
        assert_eq!(info.end.as_deref(), Some("3/4/2021 10:20:00 AM"));
        assert!(info.start.is_none());
    }

    #[test]
    fn leading_zero_column_headers_are_canonical() {
        let grid = Grid::from_text([vec!["<>", "01", "02"], vec!["a", "1", "2"]]);
        let reading = parse_plate(&grid, "p.csv", Channel::Renilla).unwrap();
        assert_eq!(reading.wells[&well("A2")], Some(2.0));
    }

    #[test]
    fn bad_row_label_reports_the_cell() {
        let grid = Grid::from_text([vec!["<>", "1"], vec!["A", "1"], vec!["7", "2"]]);
        let err = parse_plate(&grid, "p.csv", Channel::Firefly).unwrap_err();
        match err {
            Error::FileFormat { file, location, .. } => {
                assert_eq!(file, "p.csv");
                assert_eq!(location, Location::Cell(CellRef::new(2, 0)));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn bad_column_header_reports_the_cell() {
        let grid = Grid::from_text([vec!["<>", "1", "x"], vec!["A", "1", "2"]]);
        let err = parse_plate(&grid, "p.csv", Channel::Firefly).unwrap_err();
        assert_eq!(err.to_string(), "p.csv: cell C1: column header 'x' is not a column number");
    }

    #[test]
    fn duplicate_rows_are_integrity_errors() {
        let grid = Grid::from_text([vec!["<>", "1"], vec!["A", "1"], vec!["a", "2"]]);
        let err = parse_plate(&grid, "p.csv", Channel::Firefly).unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
    }

    #[test]
    fn well_list_layout() {
        let grid = Grid::from_text([
            vec!["Well", "", "Value"],
            vec!["a01", "", "5"],
            vec!["H12", "", "INVALID"],
        ]);
        let reading = parse_plate(&grid, "list.csv", Channel::Renilla).unwrap();
        assert_eq!(reading.wells[&well("A1")], Some(5.0));
        assert_eq!(reading.wells[&well("H12")], None);
    }

    #[test]
    fn duplicate_wells_in_a_list_are_integrity_errors() {
        let grid = Grid::from_text([vec!["Well", "Value"], vec!["A1", "5"], vec!["a1", "6"]]);
        let err = parse_plate(&grid, "list.csv", Channel::Renilla).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity { location: Location::Cell(CellRef { row: 2, column: 0 }), .. }
        ));
    }

    #[test]
    fn grid_without_a_block_is_rejected() {
        let grid = Grid::from_text([vec!["nothing", "here"]]);
        let err = parse_plate(&grid, "empty.csv", Channel::Firefly).unwrap_err();
        assert!(matches!(err, Error::FileFormat { location: Location::Workbook, .. }));
    }

    #[test]
    fn intensity_markers() {
        assert_eq!(read_intensity(&CellValue::Empty), None);
        assert_eq!(read_intensity(&CellValue::Integer(0)), Some(0.0));
        assert_eq!(read_intensity(&CellValue::Text("over".into())), Some(f64::INFINITY));
        assert_eq!(read_intensity(&CellValue::Text("NaN".into())), None);
        assert_eq!(read_intensity(&CellValue::Float(f64::NAN)), None);
    }
}
