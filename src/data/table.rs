use std::collections::{BTreeMap, BTreeSet};

use super::filter::{filtered_indices, Field, FieldValue, FilterState, Keyed};
use super::model::{ExperimentRow, NormalizedRow};

/// An ordered, immutable table of rows. Every operation returns a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    rows: Vec<R>,
}

/// The assembled experiment: one row per (plate, well) with metadata.
pub type ExperimentTable = Table<ExperimentRow>;

/// The experiment with ratio and normalized signal.
pub type NormalizedTable = Table<NormalizedRow>;

impl<R> Default for Table<R> {
    fn default() -> Self {
        Table { rows: Vec::new() }
    }
}

impl<R> FromIterator<R> for Table<R> {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        Table::new(iter.into_iter().collect())
    }
}

impl<R> Table<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Table { rows }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

impl<'a, R> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<R: Keyed + Clone> Table<R> {
    /// Stable sort by the given fields, first field most significant.
    pub fn sorted_by(&self, fields: &[Field]) -> Self {
        let mut keyed: Vec<(Vec<FieldValue>, &R)> =
            self.rows.iter().map(|r| (r.key(fields), r)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// Rows passing every active filter, in their current order.
    pub fn filtered(&self, filters: &FilterState) -> Self {
        filtered_indices(&self.rows, filters)
            .into_iter()
            .map(|i| self.rows[i].clone())
            .collect()
    }

    /// Sorted set of the values a field takes.
    pub fn unique_values(&self, field: Field) -> BTreeSet<FieldValue> {
        self.rows.iter().map(|r| r.value(field)).collect()
    }

    /// Label-indexed lookup: key of the given fields → rows, keys in order.
    pub fn index_by(&self, fields: &[Field]) -> BTreeMap<Vec<FieldValue>, Vec<&R>> {
        let mut index: BTreeMap<Vec<FieldValue>, Vec<&R>> = BTreeMap::new();
        for row in &self.rows {
            index.entry(row.key(fields)).or_default().push(row);
        }
        index
    }
}

impl Table<NormalizedRow> {
    /// Rows whose normalized value is present and finite, ready for plotting.
    pub fn normalized_only(&self) -> Self {
        self.rows
            .iter()
            .filter(|r| r.normalized.is_some_and(f64::is_finite))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, PlateId};

    fn row(plate: u32, well: &str, sample: &str, induction: i64, normalized: Option<f64>) -> NormalizedRow {
        NormalizedRow {
            row: ExperimentRow {
                plate: PlateId(plate),
                well: well.parse().unwrap(),
                sample: sample.into(),
                induction: CellValue::Integer(induction),
                replicate: None,
                group: "treated".into(),
                date: None,
                firefly: Some(1.0),
                renilla: Some(1.0),
                extra: Default::default(),
            },
            ratio: Some(1.0),
            normalized,
        }
    }

    fn table() -> NormalizedTable {
        Table::new(vec![
            row(2, "A10", "X", 100, Some(1.0)),
            row(1, "A2", "Y", 10, None),
            row(1, "A10", "X", 10, Some(f64::INFINITY)),
            row(1, "A1", "X", 100, Some(0.5)),
        ])
    }

    fn wells(t: &NormalizedTable) -> Vec<String> {
        t.iter().map(|r| format!("{}:{}", r.row.plate, r.row.well)).collect()
    }

    #[test]
    fn sort_uses_numeric_plate_and_well_order() {
        let sorted = table().sorted_by(&[Field::Plate, Field::Well]);
        assert_eq!(wells(&sorted), ["1:A1", "1:A2", "1:A10", "2:A10"]);
    }

    #[test]
    fn sort_is_stable_and_leaves_the_source_alone() {
        let t = table();
        let sorted = t.sorted_by(&[Field::Sample]);
        assert_eq!(wells(&sorted), ["2:A10", "1:A10", "1:A1", "1:A2"]);
        assert_eq!(wells(&t), ["2:A10", "1:A2", "1:A10", "1:A1"]);
    }

    #[test]
    fn normalized_only_drops_gaps_and_non_finite_values() {
        assert_eq!(wells(&table().normalized_only()), ["2:A10", "1:A1"]);
    }

    #[test]
    fn index_by_groups_rows_under_label_keys() {
        let t = table();
        let index = t.index_by(&[Field::Induction, Field::Sample]);
        let keys: Vec<String> = index
            .keys()
            .map(|k| k.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("/"))
            .collect();
        assert_eq!(keys, ["10/X", "10/Y", "100/X"]);
        assert_eq!(
            index[&vec![FieldValue::Value(CellValue::Integer(100)), FieldValue::text("X")]].len(),
            2
        );
        assert_eq!(t.unique_values(Field::Plate).len(), 2);
    }

    #[test]
    fn rows_sort_and_index_by_measurement_day() {
        let day = |d| chrono::NaiveDate::from_ymd_opt(2021, 3, d);
        let mut rows = table().into_rows();
        rows[0].row.date = day(5);
        rows[1].row.date = day(4);
        rows[3].row.date = day(4);
        let t = Table::new(rows);

        let sorted = t.sorted_by(&[Field::Date, Field::Well]);
        assert_eq!(wells(&sorted), ["1:A10", "1:A1", "1:A2", "2:A10"]);

        let index = t.index_by(&[Field::Date]);
        assert_eq!(index[&vec![FieldValue::Date(day(4))]].len(), 2);
        assert_eq!(index[&vec![FieldValue::Date(None)]].len(), 1);
        assert_eq!(FieldValue::Date(day(4)).to_string(), "2021-03-04");
    }
}
