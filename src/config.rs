use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::normalize::NormalizationOptions;

/// One plate's files for one channel: a single export, or the first read
/// followed by its redos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlateFiles {
    Single(PathBuf),
    Redo(Vec<PathBuf>),
}

impl PlateFiles {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            PlateFiles::Single(path) => std::slice::from_ref(path),
            PlateFiles::Redo(paths) => paths,
        }
    }
}

/// Experiment description read by the command line tool.
///
/// ```json
/// {
///   "metadata": "metadata.xlsx",
///   "firefly": [["ff1.xlsx", "ff1_redo.xlsx"], "ff2.xlsx"],
///   "renilla": ["rn1.xlsx", "rn2.xlsx"],
///   "normalization": { "background": "neg", "mode": "divide" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub metadata: PathBuf,
    pub firefly: Vec<PlateFiles>,
    pub renilla: Vec<PlateFiles>,
    #[serde(default)]
    pub normalization: NormalizationOptions,
}

impl Manifest {
    /// Read a manifest; relative paths are taken relative to its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let manifest = manifest.resolved(base);
        manifest.check()?;
        Ok(manifest)
    }

    /// Anchor every relative path at `base`.
    pub fn resolved(self, base: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        let group = |files: PlateFiles| match files {
            PlateFiles::Single(p) => PlateFiles::Single(anchor(p)),
            PlateFiles::Redo(ps) => PlateFiles::Redo(ps.into_iter().map(anchor).collect()),
        };
        Manifest {
            metadata: anchor(self.metadata),
            firefly: self.firefly.into_iter().map(group).collect(),
            renilla: self.renilla.into_iter().map(group).collect(),
            normalization: self.normalization,
        }
    }

    fn check(&self) -> Result<()> {
        if self.firefly.is_empty() {
            bail!("manifest lists no firefly plates");
        }
        if self.firefly.len() != self.renilla.len() {
            bail!(
                "manifest lists {} firefly plate(s) but {} renilla plate(s)",
                self.firefly.len(),
                self.renilla.len()
            );
        }
        Ok(())
    }

    pub fn firefly_groups(&self) -> Vec<Vec<PathBuf>> {
        self.firefly.iter().map(|g| g.paths().to_vec()).collect()
    }

    pub fn renilla_groups(&self) -> Vec<Vec<PathBuf>> {
        self.renilla.iter().map(|g| g.paths().to_vec()).collect()
    }
}
