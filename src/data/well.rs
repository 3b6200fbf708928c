use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// A well position: row letters (`A`, ..., `Z`, `AA`, ...) and a 1-based column.
///
/// Ordered by row, then column, so `A2 < A10 < B1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellCoordinate {
    row: u32,
    column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a well label")]
pub struct WellParseError(pub String);

impl WellCoordinate {
    /// `A1`, the smallest coordinate.
    pub const FIRST: WellCoordinate = WellCoordinate { row: 1, column: 1 };

    /// `row` and `column` are both 1-based; `None` if either is zero.
    pub fn new(row: u32, column: u32) -> Option<Self> {
        (row > 0 && column > 0).then_some(WellCoordinate { row, column })
    }

    /// 1-based row number (`A` = 1).
    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Row letters in canonical (uppercase) form.
    pub fn row_label(&self) -> String {
        let mut n = self.row;
        let mut letters = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }

    /// Parse row letters, case-insensitively. At most three letters.
    pub fn parse_row_label(label: &str) -> Option<u32> {
        let label = label.trim();
        if label.is_empty() || label.len() > 3 || !label.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(label.bytes().fold(0u32, |acc, b| {
            acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1)
        }))
    }
}

impl FromStr for WellCoordinate {
    type Err = WellParseError;

    /// Accepts `A1`, `a01`, ` H12 `; rejects anything else.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| WellParseError(s.to_string()))?;
        let (letters, digits) = trimmed.split_at(split);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(WellParseError(s.to_string()));
        }
        let row = Self::parse_row_label(letters).ok_or_else(|| WellParseError(s.to_string()))?;
        let column = digits
            .parse::<u32>()
            .map_err(|_| WellParseError(s.to_string()))?;
        WellCoordinate::new(row, column).ok_or_else(|| WellParseError(s.to_string()))
    }
}

impl fmt::Display for WellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_label(), self.column)
    }
}

impl Serialize for WellCoordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well(s: &str) -> WellCoordinate {
        s.parse().unwrap()
    }

    #[test]
    fn labels_are_canonicalized() {
        assert_eq!(well("a01").to_string(), "A1");
        assert_eq!(well(" h12 ").to_string(), "H12");
        assert_eq!(well("AF48").to_string(), "AF48");
        assert_eq!(well("a01"), well("A1"));
    }

    #[test]
    fn ordering_is_row_then_numeric_column() {
        let mut wells = vec![well("B1"), well("A10"), well("A2"), well("AA1"), well("Z3")];
        wells.sort();
        let labels: Vec<String> = wells.iter().map(|w| w.to_string()).collect();
        assert_eq!(labels, ["A2", "A10", "B1", "Z3", "AA1"]);
    }

    #[test]
    fn rejects_malformed_labels() {
        for bad in ["", "12", "A", "A0", "A1B", "1A", "A-1", "ABCD1", "Ä1"] {
            assert!(bad.parse::<WellCoordinate>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn row_label_round_trips_past_z() {
        for row in [1, 26, 27, 52, 53, 702, 703] {
            let w = WellCoordinate::new(row, 1).unwrap();
            assert_eq!(WellCoordinate::parse_row_label(&w.row_label()), Some(row));
        }
    }
}
