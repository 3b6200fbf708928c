use std::fmt;

use super::filter::{Field, FieldValue};
use super::model::{Channel, PlateId};
use super::well::WellCoordinate;

/// Why a partition has no usable background mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundIssue {
    /// No row in the partition carries the background label.
    NoBackgroundRows,
    /// Background rows exist but none has a usable ratio.
    AllMissing,
    /// The mean is zero and the mode divides by it.
    ZeroMean,
}

impl fmt::Display for BackgroundIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundIssue::NoBackgroundRows => write!(f, "no background rows"),
            BackgroundIssue::AllMissing => write!(f, "every background ratio is missing"),
            BackgroundIssue::ZeroMean => write!(f, "background mean is zero"),
        }
    }
}

/// A non-fatal data completeness condition, returned next to the result.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A measured well has no metadata; its row was left out.
    MissingMetadata { plate: PlateId, well: WellCoordinate },
    /// A well with metadata has no value on a channel; its row keeps a gap.
    MissingReading {
        plate: PlateId,
        well: WellCoordinate,
        channel: Channel,
    },
    /// A plate was supplied but the metadata never mentions it.
    PlateWithoutMetadata { plate: PlateId },
    /// A background well with an infinite ratio (overflowed read) was left
    /// out of its partition's mean.
    BackgroundExcluded { plate: PlateId, well: WellCoordinate },
    /// The partition's normalized values were left missing.
    BackgroundUndefined {
        partition: Vec<(Field, FieldValue)>,
        issue: BackgroundIssue,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingMetadata { plate, well } => {
                write!(f, "plate {plate} well {well}: no metadata, row dropped")
            }
            Diagnostic::MissingReading {
                plate,
                well,
                channel,
            } => write!(f, "plate {plate} well {well}: no {channel} reading"),
            Diagnostic::PlateWithoutMetadata { plate } => {
                write!(f, "plate {plate}: no metadata for any well")
            }
            Diagnostic::BackgroundExcluded { plate, well } => {
                write!(f, "plate {plate} well {well}: background ratio is not finite, left out of the mean")
            }
            Diagnostic::BackgroundUndefined { partition, issue } => {
                write!(f, "partition [")?;
                for (i, (field, value)) in partition.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}={value}")?;
                }
                write!(f, "]: {issue}, normalized values left missing")
            }
        }
    }
}

/// Per-kind counts, for one-line summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    pub missing_metadata: usize,
    pub missing_readings: usize,
    pub plates_without_metadata: usize,
    pub excluded_backgrounds: usize,
    pub undefined_backgrounds: usize,
}

impl DiagnosticSummary {
    pub fn of<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Self {
        diagnostics
            .into_iter()
            .fold(DiagnosticSummary::default(), |mut s, d| {
                match d {
                    Diagnostic::MissingMetadata { .. } => s.missing_metadata += 1,
                    Diagnostic::MissingReading { .. } => s.missing_readings += 1,
                    Diagnostic::PlateWithoutMetadata { .. } => s.plates_without_metadata += 1,
                    Diagnostic::BackgroundExcluded { .. } => s.excluded_backgrounds += 1,
                    Diagnostic::BackgroundUndefined { .. } => s.undefined_backgrounds += 1,
                }
                s
            })
    }

    pub fn is_clean(&self) -> bool {
        *self == DiagnosticSummary::default()
    }
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} wells without metadata, {} missing readings, {} plates without metadata, {} excluded background wells, {} undefined backgrounds",
            self.missing_metadata,
            self.missing_readings,
            self.plates_without_metadata,
            self.excluded_backgrounds,
            self.undefined_backgrounds
        )
    }
}
