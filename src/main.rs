use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use dual_luciferase::config::Manifest;
use dual_luciferase::export::{write_csv, write_table, ExportFormat};
use dual_luciferase::{DiagnosticSummary, ExperimentReader, Field, NormalizationMode};

/// Read a dual-luciferase experiment and write the normalized table.
#[derive(Debug, Parser)]
#[command(name = "dual-luciferase", version, about)]
struct Args {
    /// JSON manifest naming the metadata workbook and per-plate files.
    manifest: PathBuf,

    /// Output file; the table goes to stdout as CSV when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format, inferred from the output extension by default.
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// Group label of the background rows.
    #[arg(long)]
    background: Option<String>,

    /// Replicate family fields, e.g. `plate,sample,induction`.
    #[arg(long, value_delimiter = ',')]
    group_by: Option<Vec<Field>>,

    /// Background correction: subtract or divide.
    #[arg(long)]
    mode: Option<NormalizationMode>,

    /// Keep rows whose normalized value is missing.
    #[arg(long)]
    all_rows: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let manifest = Manifest::load(&args.manifest)?;
    let mut options = manifest.normalization.clone();
    if let Some(background) = args.background {
        options.background = background;
    }
    if let Some(group_by) = args.group_by {
        options.group_by = group_by;
    }
    if let Some(mode) = args.mode {
        options.mode = mode;
    }

    let experiment = ExperimentReader::new()
        .read(&manifest.metadata, &manifest.firefly_groups(), &manifest.renilla_groups())
        .with_context(|| format!("reading experiment {}", args.manifest.display()))?;
    let normalized = experiment.normalize(&options).context("normalizing")?;

    let summary = DiagnosticSummary::of(experiment.diagnostics.iter().chain(&normalized.diagnostics));
    if !summary.is_clean() {
        warn!("{summary}");
    }

    let table = if args.all_rows {
        normalized.table
    } else {
        normalized.table.normalized_only()
    };
    info!(
        "{} rows ({} group_by [{}], background '{}')",
        table.len(),
        options.mode,
        options.group_by.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","),
        options.background
    );

    match args.output {
        Some(path) => {
            let format = match args.format.or_else(|| ExportFormat::from_path(&path)) {
                Some(format) => format,
                None => bail!("cannot infer an export format from {}; pass --format", path.display()),
            };
            write_table(&path, &table, format)?;
        }
        None => {
            if args.format.is_some_and(|f| f != ExportFormat::Csv) {
                bail!("only CSV can be written to stdout; pass --output");
            }
            write_csv(io::stdout().lock(), &table)?;
        }
    }
    Ok(())
}
