use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use super::grid::{CellRef, Grid};
use super::model::{CellValue, MetadataRecord, PlateId};
use super::well::WellCoordinate;
use crate::error::{Error, Location, Result};

const PLATE: &str = "plate";
const SAMPLE: &str = "sample";
const INDUCTION: &[&str] = &["induction", "treatment"];
const GROUP: &str = "group";
const WELL: &str = "well";
const REPLICATE: &str = "replicate";

/// Well-level annotations for a whole experiment, keyed by (plate, well).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    records: BTreeMap<(PlateId, WellCoordinate), MetadataRecord>,
}

impl Metadata {
    pub fn get(&self, plate: PlateId, well: WellCoordinate) -> Option<&MetadataRecord> {
        self.records.get(&(plate, well))
    }

    /// Records of one plate in well order.
    pub fn plate(&self, plate: PlateId) -> impl Iterator<Item = (WellCoordinate, &MetadataRecord)> {
        self.records
            .range((plate, WellCoordinate::FIRST)..)
            .take_while(move |((p, _), _)| *p == plate)
            .map(|((_, w), r)| (*w, r))
    }

    pub fn plates(&self) -> BTreeSet<PlateId> {
        self.records.keys().map(|(p, _)| *p).collect()
    }

    /// Highest plate number referenced, which must match the plate count.
    pub fn max_plate(&self) -> Option<PlateId> {
        self.records.keys().next_back().map(|(p, _)| *p)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(PlateId, WellCoordinate), &MetadataRecord)> {
        self.records.iter()
    }

    /// Insert a record; identical repeats collapse, conflicting ones fail.
    pub fn insert(
        &mut self,
        plate: PlateId,
        well: WellCoordinate,
        record: MetadataRecord,
    ) -> std::result::Result<(), MetadataRecord> {
        match self.records.entry((plate, well)) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
            Entry::Occupied(slot) if *slot.get() == record => Ok(()),
            Entry::Occupied(slot) => Err(slot.get().clone()),
        }
    }
}

impl FromIterator<((PlateId, WellCoordinate), MetadataRecord)> for Metadata {
    fn from_iter<T: IntoIterator<Item = ((PlateId, WellCoordinate), MetadataRecord)>>(iter: T) -> Self {
        Metadata {
            records: iter.into_iter().collect(),
        }
    }
}

/// Column positions resolved from the header row.
struct Columns {
    plate: usize,
    sample: usize,
    induction: usize,
    group: usize,
    replicate: Option<usize>,
    /// `(column, header)`: one entry in the long layout, one per replicate in the wide layout.
    wells: Vec<(usize, String)>,
    wide: bool,
    extra: Vec<(usize, String)>,
}

impl Columns {
    fn resolve(headers: &[String], source: &str) -> Result<Self> {
        let find = |names: &[&str]| headers.iter().position(|h| names.iter().any(|n| h == n));
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| {
                Error::config(format!(
                    "metadata {source} is missing required column '{}'",
                    names[0]
                ))
            })
        };

        let plate = require(&[PLATE])?;
        let sample = require(&[SAMPLE])?;
        let induction = require(INDUCTION)?;
        let group = require(&[GROUP])?;
        let replicate = find(&[REPLICATE]);

        let (wells, wide) = match find(&[WELL]) {
            Some(col) => (vec![(col, headers[col].clone())], false),
            None => {
                let wide: Vec<(usize, String)> = headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| h.contains(WELL))
                    .map(|(i, h)| (i, h.clone()))
                    .collect();
                if wide.is_empty() {
                    return Err(Error::config(format!(
                        "metadata {source} is missing required column '{WELL}'"
                    )));
                }
                (wide, true)
            }
        };

        let known: BTreeSet<usize> = [Some(plate), Some(sample), Some(induction), Some(group), replicate]
            .into_iter()
            .flatten()
            .chain(wells.iter().map(|(i, _)| *i))
            .collect();
        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| !known.contains(i) && !h.is_empty())
            .map(|(i, h)| (i, h.clone()))
            .collect();

        Ok(Columns {
            plate,
            sample,
            induction,
            group,
            replicate,
            wells,
            wide,
            extra,
        })
    }
}

/// Parse the metadata sheet into (plate, well) → record.
///
/// The first non-empty row is the header. Either a `well` column (one row per
/// well) or several columns whose name contains `well` (one row per
/// condition, one column per replicate) must be present.
pub fn load_metadata(grid: &Grid, source: &str) -> Result<Metadata> {
    let header_row = (0..grid.height())
        .find(|&r| grid.row(r).iter().any(|c| !c.is_empty()))
        .ok_or_else(|| Error::format(source, Location::Workbook, "metadata sheet is empty"))?;
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|c| c.to_string().trim().to_lowercase())
        .collect();
    let columns = Columns::resolve(&headers, source)?;

    let mut metadata = Metadata::default();
    for row in header_row + 1..grid.height() {
        if grid.row(row).iter().all(CellValue::is_empty) {
            continue;
        }
        let plate = read_plate(grid, source, CellRef::new(row, columns.plate))?;
        let sample = read_label(grid, source, CellRef::new(row, columns.sample), SAMPLE)?;
        let group = read_label(grid, source, CellRef::new(row, columns.group), GROUP)?;
        let induction = grid.cell(row, columns.induction).clone().canonical();
        let replicate_column = columns
            .replicate
            .map(|col| grid.cell(row, col).clone().canonical())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string());
        let extra: BTreeMap<String, CellValue> = columns
            .extra
            .iter()
            .map(|(col, name)| (name.clone(), grid.cell(row, *col).clone().canonical()))
            .collect();

        for (col, header) in &columns.wells {
            let at = CellRef::new(row, *col);
            let cell = grid.at(at);
            if cell.is_empty() {
                continue;
            }
            let well: WellCoordinate = cell
                .to_string()
                .parse()
                .map_err(|e: super::well::WellParseError| {
                    Error::format(source, Location::Cell(at), e.to_string())
                })?;
            let replicate = match (&replicate_column, columns.wide) {
                (Some(r), _) => Some(r.clone()),
                (None, true) => Some(header.clone()),
                (None, false) => None,
            };
            let record = MetadataRecord {
                sample: sample.clone(),
                induction: induction.clone(),
                replicate,
                group: group.clone(),
                extra: extra.clone(),
            };
            if let Err(existing) = metadata.insert(plate, well, record) {
                return Err(Error::integrity(
                    source,
                    Location::Cell(at),
                    format!(
                        "conflicting metadata for plate {plate} well {well} (already sample '{}', group '{}')",
                        existing.sample, existing.group
                    ),
                ));
            }
        }
    }

    info!(
        "{source}: metadata for {} wells on {} plate(s){}",
        metadata.len(),
        metadata.plates().len(),
        if columns.wide { " (replicate columns)" } else { "" }
    );
    debug!("{source}: extra metadata columns {:?}", columns.extra);
    Ok(metadata)
}

fn read_plate(grid: &Grid, source: &str, at: CellRef) -> Result<PlateId> {
    let cell = grid.at(at);
    cell.as_integer()
        .filter(|n| *n > 0 && *n <= i64::from(u32::MAX))
        .map(|n| PlateId(n as u32))
        .ok_or_else(|| {
            Error::format(
                source,
                Location::Cell(at),
                format!("plate '{cell}' is not a positive plate number"),
            )
        })
}

fn read_label(grid: &Grid, source: &str, at: CellRef, column: &str) -> Result<String> {
    let label = grid.at(at).clone().canonical().to_string();
    if label.is_empty() {
        return Err(Error::format(
            source,
            Location::Cell(at),
            format!("empty {column}"),
        ));
    }
    Ok(label)
}
