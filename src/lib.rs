//! Dual-luciferase plate reader engine.
//!
//! Reads per-plate firefly and renilla exports (with redo files for failed
//! wells), joins them with well metadata and computes a background-corrected
//! ratio per replicate family.
//!
//! ```no_run
//! use std::path::PathBuf;
//! use dual_luciferase::{ExperimentReader, NormalizationOptions};
//!
//! let firefly = vec![vec![PathBuf::from("ff1.xlsx"), PathBuf::from("ff1_redo.xlsx")]];
//! let renilla = vec![vec![PathBuf::from("rn1.xlsx")]];
//! let experiment = ExperimentReader::new().read("metadata.xlsx", &firefly, &renilla)?;
//! let normalized = experiment.normalize(&NormalizationOptions::default())?;
//! for row in normalized.table.normalized_only().iter() {
//!     println!("{} {} {:?}", row.row.plate, row.row.well, row.normalized);
//! }
//! # Ok::<(), dual_luciferase::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod export;

pub use data::diagnostics::{Diagnostic, DiagnosticSummary};
pub use data::experiment::{Experiment, ExperimentReader, PlateSourceGroup};
pub use data::filter::{Field, FieldValue, FilterState};
pub use data::model::{Channel, ExperimentRow, NormalizedRow, PlateId};
pub use data::normalize::{NormalizationMode, NormalizationOptions, Normalized};
pub use data::table::{ExperimentTable, NormalizedTable};
pub use data::well::WellCoordinate;
pub use error::{Error, Result};
