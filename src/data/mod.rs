/// Data layer: result-file parsing and cross-run aggregation.
///
/// Architecture:
/// ```text
///  run.csv (static or churn)
///        │
///        ▼
///   ┌──────────┐
///   │ metadata  │  `#key,value` lines → MetadataRecord
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  rows + metadata → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  summary  │  RunInfo of every Dataset → SummarySeries
///   └──────────┘
/// ```

pub mod loader;
pub mod metadata;
pub mod model;
pub mod summary;
