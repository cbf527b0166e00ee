use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::data::loader::{load_file, LoadError};
use crate::data::model::{MetadataIssue, RowDiagnostic, RunInfo, Schema};
use crate::data::summary::{summarize, Statistic, UndefinedStat};
use crate::render::plot::{PlotSink, RenderError};
use crate::render::request::{dataset_request, summary_request};

// ---------------------------------------------------------------------------
// BatchReport – what one run produced and ran into
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiagnostics {
    pub path: PathBuf,
    pub skipped_rows: Vec<RowDiagnostic>,
    pub metadata_issues: Vec<MetadataIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Charts written, in render order.
    pub outputs: Vec<PathBuf>,
    /// Files that loaded but had rows skipped or odd metadata.
    pub diagnostics: Vec<FileDiagnostics>,
    /// Files left out of the batch.
    pub failures: Vec<FileFailure>,
    /// Runs missing from a summary chart.
    pub undefined_stats: Vec<UndefinedStat>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.failures.is_empty() && self.undefined_stats.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch aborted: {source}")]
    Load {
        #[source]
        source: LoadError,
        /// Everything produced before the failure.
        report: BatchReport,
    },
    #[error("batch aborted: {source}")]
    Render {
        #[source]
        source: RenderError,
        report: BatchReport,
    },
}

impl BatchError {
    pub fn report(&self) -> &BatchReport {
        match self {
            BatchError::Load { report, .. } | BatchError::Render { report, .. } => report,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Load every file in order, drawing its per-node chart as soon as it is
/// parsed, then draw one summary chart per statistic of `schema`.
///
/// A file with a bad count is recorded as a failure and skipped. Any other
/// load error, or a render error, stops the batch.
pub fn run_batch<S: PlotSink>(
    paths: &[PathBuf],
    schema: Schema,
    outdir: &Path,
    sink: &mut S,
) -> Result<BatchReport, BatchError> {
    let mut report = BatchReport::default();
    let mut infos: Vec<RunInfo> = Vec::with_capacity(paths.len());

    for path in paths {
        let dataset = match load_file(path, schema) {
            Ok(ds) => ds,
            Err(e) if !e.aborts_batch() => {
                warn!("skipping {}: {e}", path.display());
                report.failures.push(FileFailure {
                    path: path.clone(),
                    message: e.to_string(),
                });
                continue;
            }
            Err(source) => return Err(BatchError::Load { source, report }),
        };

        if !dataset.diagnostics.is_empty() || !dataset.metadata_issues.is_empty() {
            report.diagnostics.push(FileDiagnostics {
                path: path.clone(),
                skipped_rows: dataset.diagnostics.clone(),
                metadata_issues: dataset.metadata_issues.clone(),
            });
        }

        let request = dataset_request(&dataset, outdir);
        if let Err(source) = sink.render(&request) {
            return Err(BatchError::Render { source, report });
        }
        info!("[OK] Wrote {}", request.output.display());
        report.outputs.push(request.output);
        infos.push(dataset.info);
    }

    if infos.is_empty() {
        warn!("no {schema} files loaded; skipping summary charts");
        return Ok(report);
    }

    for &statistic in Statistic::for_schema(schema) {
        let series = summarize(&infos, statistic);
        for undefined in &series.undefined {
            warn!(
                "{statistic} undefined for algo={}: {}",
                undefined.algo, undefined.reason
            );
        }
        let request = summary_request(&series, outdir);
        if let Err(source) = sink.render(&request) {
            return Err(BatchError::Render { source, report });
        }
        info!("[OK] Wrote {}", request.output.display());
        report.outputs.push(request.output);
        report.undefined_stats.extend(series.undefined);
    }

    Ok(report)
}
