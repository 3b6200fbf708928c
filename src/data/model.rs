use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

use super::well::WellCoordinate;

// ---------------------------------------------------------------------------
// CellValue – a single decoded spreadsheet cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as produced by the spreadsheet readers.
/// Metadata labels (induction levels, extra columns) keep this type so they
/// sort numerically when they are numbers, hence the manual `Ord`.
#[derive(Debug, Clone, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

// -- Manual Eq/Ord so we can put CellValue in BTreeMap keys --

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Empty => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Empty => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Empty => Ok(()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) => serializer.serialize_f64(*v),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl CellValue {
    /// Type a raw text cell (CSV field, spreadsheet string) by guessing.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::Text(s.to_string())
    }

    /// Integral floats become integers so `10` and `10.0` label the same level.
    pub fn canonical(self) -> Self {
        match self {
            CellValue::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
                CellValue::Integer(v as i64)
            }
            CellValue::Text(s) if s.trim().is_empty() => CellValue::Empty,
            CellValue::Text(s) => CellValue::Text(s.trim().to_string()),
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Interpret the cell as a whole number (plate ids, column headers).
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Plate and channel identity
// ---------------------------------------------------------------------------

/// One of the two measured reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Primary reporter.
    Firefly,
    /// Normalization reporter.
    Renilla,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Firefly => write!(f, "firefly"),
            Channel::Renilla => write!(f, "renilla"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firefly" | "primary" => Ok(Channel::Firefly),
            "renilla" | "normalization" => Ok(Channel::Renilla),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

/// 1-based positional plate number shared by the metadata `plate` column and
/// the caller's ordered list of plate file groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlateId(pub u32);

impl PlateId {
    /// Plate id for the `index`-th (0-based) file group.
    pub fn from_index(index: usize) -> Self {
        PlateId(index as u32 + 1)
    }

    /// Position of this plate in the caller's file group lists.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for PlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Which file a value came from and its position in the redo ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub file: Arc<str>,
    /// 0 for the first file of a group, 1 for the first redo, ...
    pub attempt: usize,
}

/// A merged intensity with its provenance. `value` is `None` when every file
/// that reported the well had no usable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: Option<f64>,
    pub provenance: Provenance,
}

const DATE_FORMATS: [&str; 4] = ["%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y", "%Y-%m-%d"];
const TIMESTAMP_FORMATS: [&str; 2] = ["%m/%d/%Y %I:%M:%S %p", "%Y-%m-%d %H:%M:%S"];

/// Read a header date or timestamp in any of the instrument formats.
pub fn parse_measurement_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|ts| ts.date())
        })
}

/// Instrument header fields found above the plate block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlateInfo {
    pub device: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl PlateInfo {
    /// Fill the fields this header lacks from a later file's header.
    pub fn fill_from(&mut self, other: &PlateInfo) {
        for (mine, theirs) in [
            (&mut self.device, &other.device),
            (&mut self.date, &other.date),
            (&mut self.time, &other.time),
            (&mut self.start, &other.start),
            (&mut self.end, &other.end),
        ] {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }

    /// Day the plate was read: the `Date:` line, else the start timestamp.
    pub fn measured_on(&self) -> Option<NaiveDate> {
        [&self.date, &self.start]
            .into_iter()
            .flatten()
            .find_map(|text| parse_measurement_date(text))
    }
}

/// The readings decoded from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
    pub source: Arc<str>,
    pub channel: Channel,
    pub info: PlateInfo,
    /// Every well the file reports; `None` marks an instrument error.
    pub wells: BTreeMap<WellCoordinate, Option<f64>>,
}

/// One canonical reading set per (plate, channel) after folding redo files.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedPlateReading {
    pub plate: PlateId,
    pub channel: Channel,
    pub info: PlateInfo,
    /// Source files in fold order.
    pub sources: Vec<Arc<str>>,
    pub wells: BTreeMap<WellCoordinate, Reading>,
}

impl MergedPlateReading {
    /// The merged value for a well; `None` if absent or missing.
    pub fn value(&self, well: &WellCoordinate) -> Option<f64> {
        self.wells.get(well).and_then(|r| r.value)
    }
}

// ---------------------------------------------------------------------------
// Metadata and experiment rows
// ---------------------------------------------------------------------------

/// Experimental annotations for one (plate, well).
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub sample: String,
    pub induction: CellValue,
    pub replicate: Option<String>,
    /// Background-group label.
    pub group: String,
    /// Every other metadata column, keyed by lowercase header.
    pub extra: BTreeMap<String, CellValue>,
}

/// Metadata joined with both merged channels for one (plate, well).
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRow {
    pub plate: PlateId,
    pub well: WellCoordinate,
    pub sample: String,
    pub induction: CellValue,
    pub replicate: Option<String>,
    pub group: String,
    /// Measurement day of the plate's firefly read.
    pub date: Option<NaiveDate>,
    pub firefly: Option<f64>,
    pub renilla: Option<f64>,
    pub extra: BTreeMap<String, CellValue>,
}

/// An experiment row with its channel ratio and background-corrected value.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row: ExperimentRow,
    pub ratio: Option<f64>,
    pub normalized: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_sort_before_text_and_numerically() {
        let mut levels = vec![
            CellValue::Text("high".into()),
            CellValue::Integer(100),
            CellValue::Integer(10),
            CellValue::Empty,
        ];
        levels.sort();
        assert_eq!(
            levels,
            vec![
                CellValue::Empty,
                CellValue::Integer(10),
                CellValue::Integer(100),
                CellValue::Text("high".into()),
            ]
        );
    }

    #[test]
    fn guess_and_canonical_agree_on_integral_levels() {
        assert_eq!(CellValue::guess(" 10 "), CellValue::Integer(10));
        assert_eq!(CellValue::Float(10.0).canonical(), CellValue::Integer(10));
        assert_eq!(CellValue::Float(0.5).canonical(), CellValue::Float(0.5));
        assert_eq!(CellValue::Text("  ".into()).canonical(), CellValue::Empty);
        assert_eq!(CellValue::guess("IPTG"), CellValue::Text("IPTG".into()));
    }

    #[test]
    fn as_integer_reads_text_digits() {
        assert_eq!(CellValue::Text("03".into()).as_integer(), Some(3));
        assert_eq!(CellValue::Float(2.0).as_integer(), Some(2));
        assert_eq!(CellValue::Float(2.5).as_integer(), None);
    }

    #[test]
    fn plate_info_fill_keeps_first_values() {
        let mut first = PlateInfo {
            device: Some("infinite 200Pro".into()),
            ..PlateInfo::default()
        };
        let redo = PlateInfo {
            device: Some("other".into()),
            date: Some("2021-03-04".into()),
            ..PlateInfo::default()
        };
        first.fill_from(&redo);
        assert_eq!(first.device.as_deref(), Some("infinite 200Pro"));
        assert_eq!(first.date.as_deref(), Some("2021-03-04"));
    }

    #[test]
    fn measurement_day_comes_from_date_or_start() {
        let day = NaiveDate::from_ymd_opt(2021, 3, 4);
        for text in ["3/4/2021", "2021-03-04", "2021/03/04", "03-04-2021", "2021-03-04 10:20:00"] {
            assert_eq!(parse_measurement_date(text), day, "{text}");
        }
        assert_eq!(parse_measurement_date("Thursday"), None);

        let info = PlateInfo {
            date: Some("not a date".into()),
            start: Some("3/4/2021 10:20:00 AM".into()),
            ..PlateInfo::default()
        };
        assert_eq!(info.measured_on(), day);
        assert_eq!(PlateInfo::default().measured_on(), None);
    }

    #[test]
    fn plate_id_is_one_based() {
        assert_eq!(PlateId::from_index(0), PlateId(1));
        assert_eq!(PlateId(3).index(), 2);
    }
}
