use std::path::{Path, PathBuf};

use log::info;

use super::assemble::{assemble, validate_alignment};
use super::diagnostics::{Diagnostic, DiagnosticSummary};
use super::loader::{GridSource, WorkbookReader};
use super::metadata::{load_metadata, Metadata};
use super::model::{Channel, MergedPlateReading, PlateId, PlateReading};
use super::normalize::{normalize, Normalized, NormalizationOptions};
use super::plate::parse_plate;
use super::redo::merge_redo;
use super::table::ExperimentTable;
use crate::error::{Error, Result};

/// Ordered source files for one (plate, channel); later files are redos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateSourceGroup {
    pub plate: PlateId,
    pub channel: Channel,
    pub files: Vec<PathBuf>,
}

impl PlateSourceGroup {
    /// Groups for one channel from the caller's positional list.
    pub fn from_list<G: AsRef<[PathBuf]>>(channel: Channel, groups: &[G]) -> Vec<Self> {
        groups
            .iter()
            .enumerate()
            .map(|(i, files)| PlateSourceGroup {
                plate: PlateId::from_index(i),
                channel,
                files: files.as_ref().to_vec(),
            })
            .collect()
    }
}

/// A loaded experiment. Owns every intermediate stage so it can be
/// re-normalized with other options without touching the files again.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub metadata: Metadata,
    pub firefly: Vec<MergedPlateReading>,
    pub renilla: Vec<MergedPlateReading>,
    pub table: ExperimentTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl Experiment {
    /// Join already merged readings with metadata.
    pub fn assemble(
        metadata: Metadata,
        firefly: Vec<MergedPlateReading>,
        renilla: Vec<MergedPlateReading>,
    ) -> Result<Self> {
        let assembled = assemble(&firefly, &renilla, &metadata)?;
        Ok(Experiment {
            metadata,
            firefly,
            renilla,
            table: assembled.table,
            diagnostics: assembled.diagnostics,
        })
    }

    pub fn normalize(&self, options: &NormalizationOptions) -> Result<Normalized> {
        normalize(&self.table, options)
    }

    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary::of(&self.diagnostics)
    }
}

/// File-level entry point: metadata workbook plus per-plate file groups.
#[derive(Debug, Clone, Default)]
pub struct ExperimentReader<S = WorkbookReader> {
    source: S,
}

impl ExperimentReader<WorkbookReader> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: GridSource> ExperimentReader<S> {
    pub fn with_source(source: S) -> Self {
        ExperimentReader { source }
    }

    /// Read a dual-luciferase experiment.
    ///
    /// `firefly[i]` and `renilla[i]` are the ordered files of plate `i + 1`.
    /// List alignment is checked before any plate file is opened.
    pub fn read<G: AsRef<[PathBuf]>>(
        &self,
        metadata: impl AsRef<Path>,
        firefly: &[G],
        renilla: &[G],
    ) -> Result<Experiment> {
        if firefly.len() != renilla.len() {
            return Err(Error::config(format!(
                "{} firefly plate group(s) but {} renilla plate group(s)",
                firefly.len(),
                renilla.len()
            )));
        }
        let firefly = PlateSourceGroup::from_list(Channel::Firefly, firefly);
        let renilla = PlateSourceGroup::from_list(Channel::Renilla, renilla);
        if let Some(empty) = firefly.iter().chain(&renilla).find(|g| g.files.is_empty()) {
            return Err(Error::config(format!(
                "plate {} has no {} files",
                empty.plate, empty.channel
            )));
        }

        let metadata = self.read_metadata(metadata.as_ref())?;
        validate_alignment(&metadata, firefly.len(), renilla.len())?;

        let firefly = firefly
            .iter()
            .map(|g| self.read_group(g))
            .collect::<Result<Vec<_>>>()?;
        let renilla = renilla
            .iter()
            .map(|g| self.read_group(g))
            .collect::<Result<Vec<_>>>()?;

        let experiment = Experiment::assemble(metadata, firefly, renilla)?;
        info!(
            "read {} plate(s): {} rows ({})",
            experiment.firefly.len(),
            experiment.table.len(),
            experiment.summary()
        );
        Ok(experiment)
    }

    pub fn read_metadata(&self, path: &Path) -> Result<Metadata> {
        let grid = self.source.read_grid(path)?;
        load_metadata(&grid, &path.display().to_string())
    }

    pub fn read_plate(&self, path: &Path, channel: Channel) -> Result<PlateReading> {
        let grid = self.source.read_grid(path)?;
        parse_plate(&grid, &path.display().to_string(), channel)
    }

    /// Parse every file of a group in order, then fold them.
    pub fn read_group(&self, group: &PlateSourceGroup) -> Result<MergedPlateReading> {
        let files = group
            .files
            .iter()
            .map(|path| self.read_plate(path, group.channel))
            .collect::<Result<Vec<_>>>()?;
        merge_redo(group.plate, &files)
    }
}
