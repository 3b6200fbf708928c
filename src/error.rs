use std::fmt;
use std::io;

use thiserror::Error;

use crate::data::grid::CellRef;

/// Where inside a source file a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The file as a whole (unreadable workbook, missing plate block, ...).
    Workbook,
    Cell(CellRef),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Workbook => write!(f, "workbook"),
            Location::Cell(cell) => write!(f, "cell {cell}"),
        }
    }
}

/// Fatal errors raised while reading, assembling or normalizing an experiment.
///
/// Non-fatal conditions are reported as [`crate::data::diagnostics::Diagnostic`]s
/// next to the result instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A source or metadata file cannot be decoded into the expected grid shape.
    #[error("{file}: {location}: {message}")]
    FileFormat {
        file: String,
        location: Location,
        message: String,
    },
    /// Duplicate well keys within one file, or conflicting metadata records.
    #[error("{file}: {location}: integrity violation: {message}")]
    Integrity {
        file: String,
        location: Location,
        message: String,
    },
    /// Inputs that do not line up (plate counts, required columns, options).
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cannot open {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn format(
        file: impl Into<String>,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Error::FileFormat {
            file: file.into(),
            location,
            message: message.into(),
        }
    }

    pub(crate) fn integrity(
        file: impl Into<String>,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Error::Integrity {
            file: file.into(),
            location,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// The file the error refers to, when there is one.
    pub fn file(&self) -> Option<&str> {
        match self {
            Error::FileFormat { file, .. } | Error::Integrity { file, .. } | Error::Io { file, .. } => {
                Some(file)
            }
            Error::Configuration(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_format_message_names_file_and_cell() {
        let err = Error::format(
            "plate1.xlsx",
            Location::Cell(CellRef { row: 6, column: 1 }),
            "'?' is not a row label",
        );
        assert_eq!(
            err.to_string(),
            "plate1.xlsx: cell B7: '?' is not a row label"
        );
        assert_eq!(err.file(), Some("plate1.xlsx"));
    }

    #[test]
    fn configuration_has_no_file() {
        let err = Error::config("2 firefly groups but 3 renilla groups");
        assert!(err.file().is_none());
        assert!(err.to_string().starts_with("configuration error"));
    }
}
