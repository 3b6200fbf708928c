/// Data layer: decoding, redo merging, joining and normalization.
///
/// Architecture:
/// ```text
///  metadata + firefly/renilla files (redos last)
///        │
///        ▼
///   ┌────────────┐
///   │ loader     │  file → Grid (calamine / csv)
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ plate      │  Grid → PlateReading (plate map or well list)
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ redo       │  PlateReading per file → MergedPlateReading
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ metadata   │  Grid → (plate, well) → MetadataRecord
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ assemble   │  (plate, well) join → ExperimentTable
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ normalize  │  ratio, background mean → NormalizedTable
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ table      │  sort / filter / index_by rows for charting
///   └────────────┘
/// ```

pub mod assemble;
pub mod diagnostics;
pub mod experiment;
pub mod filter;
pub mod grid;
pub mod loader;
pub mod metadata;
pub mod model;
pub mod normalize;
pub mod plate;
pub mod redo;
pub mod table;
pub mod well;
