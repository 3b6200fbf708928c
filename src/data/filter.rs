use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{CellValue, ExperimentRow, NormalizedRow, PlateId};
use super::well::WellCoordinate;

// ---------------------------------------------------------------------------
// Fields rows can be indexed, sorted and filtered by
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Plate,
    Well,
    Sample,
    Induction,
    Replicate,
    Group,
    Date,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Plate,
        Field::Well,
        Field::Sample,
        Field::Induction,
        Field::Replicate,
        Field::Group,
        Field::Date,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Plate => "plate",
            Field::Well => "well",
            Field::Sample => "sample",
            Field::Induction => "induction",
            Field::Replicate => "replicate",
            Field::Group => "group",
            Field::Date => "date",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.to_string() == wanted)
            .ok_or_else(|| format!("unknown field '{s}' (expected one of plate, well, sample, induction, replicate, group, date)"))
    }
}

/// The value of one [`Field`] in one row. Plates and wells keep their own
/// ordering (numeric plate, row-then-column well) instead of text order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldValue {
    Plate(PlateId),
    Well(WellCoordinate),
    Date(Option<NaiveDate>),
    Value(CellValue),
}

impl FieldValue {
    pub fn text(s: &str) -> Self {
        FieldValue::Value(CellValue::Text(s.to_string()))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Plate(p) => write!(f, "{p}"),
            FieldValue::Well(w) => write!(f, "{w}"),
            FieldValue::Date(Some(d)) => write!(f, "{d}"),
            FieldValue::Date(None) => Ok(()),
            FieldValue::Value(v) => write!(f, "{v}"),
        }
    }
}

/// Rows that expose their metadata fields.
pub trait Keyed {
    fn value(&self, field: Field) -> FieldValue;

    /// Values of several fields, in the order given.
    fn key(&self, fields: &[Field]) -> Vec<FieldValue> {
        fields.iter().map(|f| self.value(*f)).collect()
    }
}

impl Keyed for ExperimentRow {
    fn value(&self, field: Field) -> FieldValue {
        match field {
            Field::Plate => FieldValue::Plate(self.plate),
            Field::Well => FieldValue::Well(self.well),
            Field::Sample => FieldValue::text(&self.sample),
            Field::Induction => FieldValue::Value(self.induction.clone()),
            Field::Replicate => FieldValue::Value(
                self.replicate
                    .as_deref()
                    .map(CellValue::from)
                    .unwrap_or_default(),
            ),
            Field::Group => FieldValue::text(&self.group),
            Field::Date => FieldValue::Date(self.date),
        }
    }
}

impl Keyed for NormalizedRow {
    fn value(&self, field: Field) -> FieldValue {
        self.row.value(field)
    }
}

// ---------------------------------------------------------------------------
// Filter predicate: which values are selected per field
// ---------------------------------------------------------------------------

/// Per-field selection state: maps field → set of selected values.
/// If a field is absent it is unconstrained; an empty set hides every row.
pub type FilterState = BTreeMap<Field, BTreeSet<FieldValue>>;

/// Initialise a [`FilterState`] with every value of every field selected.
pub fn init_filter_state<R: Keyed>(rows: &[R]) -> FilterState {
    let mut state = FilterState::new();
    for row in rows {
        for field in Field::ALL {
            state.entry(field).or_default().insert(row.value(field));
        }
    }
    state
}

/// Return indices of rows that pass all active filters.
pub fn filtered_indices<R: Keyed>(rows: &[R], filters: &FilterState) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| {
            filters
                .iter()
                .all(|(field, selected)| selected.contains(&row.value(*field)))
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(plate: u32, well: &str, sample: &str, group: &str) -> ExperimentRow {
        ExperimentRow {
            plate: PlateId(plate),
            well: well.parse().unwrap(),
            sample: sample.into(),
            induction: CellValue::Integer(10),
            replicate: None,
            group: group.into(),
            date: None,
            firefly: Some(1.0),
            renilla: Some(1.0),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn field_names_parse_case_insensitively() {
        assert_eq!("Induction".parse::<Field>(), Ok(Field::Induction));
        assert!("colour".parse::<Field>().is_err());
        for f in Field::ALL {
            assert_eq!(f.to_string().parse::<Field>(), Ok(f));
        }
    }

    #[test]
    fn filters_select_by_value() {
        let rows = vec![
            row(1, "A1", "X", "treated"),
            row(1, "A2", "Y", "treated"),
            row(2, "A1", "X", "background"),
        ];
        let mut filters = FilterState::new();
        filters.insert(Field::Sample, [FieldValue::text("X")].into());
        assert_eq!(filtered_indices(&rows, &filters), vec![0, 2]);

        filters.insert(Field::Plate, [FieldValue::Plate(PlateId(2))].into());
        assert_eq!(filtered_indices(&rows, &filters), vec![2]);

        filters.insert(Field::Group, BTreeSet::new());
        assert!(filtered_indices(&rows, &filters).is_empty());
    }

    #[test]
    fn initial_state_selects_everything() {
        let rows = vec![row(1, "A1", "X", "treated"), row(2, "B1", "Y", "background")];
        let state = init_filter_state(&rows);
        assert_eq!(state[&Field::Sample].len(), 2);
        assert_eq!(state[&Field::Replicate].len(), 1);
        assert_eq!(filtered_indices(&rows, &state), vec![0, 1]);
    }
}
