use std::fmt;

use super::model::CellValue;

static EMPTY: CellValue = CellValue::Empty;

/// A 0-based cell address, displayed spreadsheet-style (`row 6, column 1` → `B7`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: usize,
    pub column: usize,
}

impl CellRef {
    pub fn new(row: usize, column: usize) -> Self {
        CellRef { row, column }
    }

    fn column_letters(&self) -> String {
        let mut n = self.column + 1;
        let mut letters = Vec::new();
        while n > 0 {
            letters.push(b'A' + ((n - 1) % 26) as u8);
            n = (n - 1) / 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row + 1)
    }
}

/// One decoded worksheet. Rows may be ragged; anything outside the populated
/// area reads as [`CellValue::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Grid { rows }
    }

    /// Build a grid from text cells, typing each one with [`CellValue::guess`].
    pub fn from_text<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Grid::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|c| CellValue::guess(c.as_ref())).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }

    pub fn at(&self, at: CellRef) -> &CellValue {
        self.cell(at.row, at.column)
    }

    /// First cell, in row-major order, matching `pred`.
    pub fn find(&self, pred: impl Fn(&CellValue) -> bool) -> Option<CellRef> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|c| pred(c))
                .map(|c| CellRef::new(r, c))
        })
    }

    /// First non-empty cell to the right of `at`, looking at most `span` columns.
    pub fn next_to(&self, at: CellRef, span: usize) -> Option<&CellValue> {
        (1..=span)
            .map(|offset| self.cell(at.row, at.column + offset))
            .find(|c| !c.is_empty())
    }
}
