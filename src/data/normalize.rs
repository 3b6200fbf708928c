use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::diagnostics::{BackgroundIssue, Diagnostic};
use super::filter::{Field, FieldValue, Keyed};
use super::model::NormalizedRow;
use super::table::{ExperimentTable, NormalizedTable};
use crate::error::{Error, Result};

/// How a row's ratio is corrected against its partition's background mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// `ratio - background_mean`
    #[default]
    Subtract,
    /// `ratio / background_mean`
    Divide,
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMode::Subtract => write!(f, "subtract"),
            NormalizationMode::Divide => write!(f, "divide"),
        }
    }
}

impl FromStr for NormalizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subtract" | "difference" => Ok(NormalizationMode::Subtract),
            "divide" | "ratio" => Ok(NormalizationMode::Divide),
            other => Err(format!("unknown normalization mode '{other}' (expected subtract or divide)")),
        }
    }
}

/// Grouping key, background label and correction form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationOptions {
    /// Fields defining a replicate family. Empty means one global partition.
    pub group_by: Vec<Field>,
    /// Group label of the background / negative control rows.
    pub background: String,
    pub mode: NormalizationMode,
}

impl Default for NormalizationOptions {
    fn default() -> Self {
        Self {
            group_by: vec![Field::Plate, Field::Sample, Field::Induction],
            background: "background".to_string(),
            mode: NormalizationMode::Subtract,
        }
    }
}

impl NormalizationOptions {
    pub fn validate(&self) -> Result<()> {
        if self.group_by.contains(&Field::Group) {
            return Err(Error::config(
                "'group' cannot be part of the grouping key: background rows would never share a partition with the rows they correct",
            ));
        }
        if self.background.trim().is_empty() {
            return Err(Error::config("background label is empty"));
        }
        Ok(())
    }
}

/// The normalized table and the partitions whose background was undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: NormalizedTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// `primary / normalization`, missing when either side is missing, the
/// normalization signal is exactly zero, or the quotient is not a number.
/// The last case only arises when both channels overflowed (`inf / inf`).
pub fn ratio(primary: Option<f64>, normalization: Option<f64>) -> Option<f64> {
    let (p, n) = (primary?, normalization?);
    if n == 0.0 {
        return None;
    }
    Some(p / n).filter(|r| !r.is_nan())
}

/// Mean of the present, finite values; `None` if there are none.
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn correct(ratio: Option<f64>, background: f64, mode: NormalizationMode) -> Option<f64> {
    let r = ratio?;
    let v = match mode {
        NormalizationMode::Subtract => r - background,
        NormalizationMode::Divide => r / background,
    };
    (!v.is_nan()).then_some(v)
}

/// Partition → background mean → per-row correction.
pub fn normalize(table: &ExperimentTable, options: &NormalizationOptions) -> Result<Normalized> {
    options.validate()?;

    let ratios: Vec<Option<f64>> = table.iter().map(|r| ratio(r.firefly, r.renilla)).collect();

    let mut partitions: BTreeMap<Vec<FieldValue>, Vec<usize>> = BTreeMap::new();
    for (i, row) in table.iter().enumerate() {
        partitions.entry(row.key(&options.group_by)).or_default().push(i);
    }

    let mut normalized: Vec<Option<f64>> = vec![None; table.len()];
    let mut diagnostics = Vec::new();

    for (key, members) in &partitions {
        let background: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| table.rows()[i].group == options.background)
            .collect();

        for &i in &background {
            if ratios[i].is_some_and(|r| !r.is_finite()) {
                let row = &table.rows()[i];
                let diagnostic = Diagnostic::BackgroundExcluded {
                    plate: row.plate,
                    well: row.well,
                };
                warn!("{diagnostic}");
                diagnostics.push(diagnostic);
            }
        }

        let outcome = if background.is_empty() {
            Err(BackgroundIssue::NoBackgroundRows)
        } else {
            match mean(background.iter().map(|&i| ratios[i])) {
                None => Err(BackgroundIssue::AllMissing),
                Some(m) if m == 0.0 && options.mode == NormalizationMode::Divide => {
                    Err(BackgroundIssue::ZeroMean)
                }
                Some(m) => Ok(m),
            }
        };

        match outcome {
            Ok(background_mean) => {
                debug!(
                    "partition {:?}: background mean {background_mean} over {} row(s)",
                    key,
                    background.len()
                );
                for &i in members {
                    normalized[i] = correct(ratios[i], background_mean, options.mode);
                }
            }
            Err(issue) => {
                let partition: Vec<(Field, FieldValue)> =
                    options.group_by.iter().copied().zip(key.iter().cloned()).collect();
                let diagnostic = Diagnostic::BackgroundUndefined { partition, issue };
                warn!("{diagnostic}");
                diagnostics.push(diagnostic);
            }
        }
    }

    let rows = table
        .iter()
        .zip(ratios)
        .zip(normalized)
        .map(|((row, ratio), normalized)| NormalizedRow {
            row: row.clone(),
            ratio,
            normalized,
        })
        .collect();

    debug!(
        "normalized {} rows in {} partition(s) ({} mode, background '{}')",
        table.len(),
        partitions.len(),
        options.mode,
        options.background
    );
    Ok(Normalized {
        table: NormalizedTable::new(rows),
        diagnostics,
    })
}
