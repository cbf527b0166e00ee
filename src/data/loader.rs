use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use super::metadata::extract_metadata;
use super::model::{
    ChurnRow, Dataset, LoadStats, MetaNumber, MetadataIssue, NodeRows, RowDiagnostic,
    RunInfo, Schema, SkipReason, StaticRow,
};

/// Relative tolerance when comparing declared `mean`/`max` with the rows.
const MISMATCH_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{} does not look like a {schema} result file (missing column(s): {})",
        path.display(),
        missing.join(", ")
    )]
    Schema {
        path: PathBuf,
        schema: Schema,
        missing: Vec<String>,
    },

    #[error("{}:{line}: {column} value '{token}' is not a non-negative integer", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        token: String,
    },

    #[error("reading CSV rows of {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl LoadError {
    /// Whether the failure should stop the remaining batch, not just this file.
    pub fn aborts_batch(&self) -> bool {
        !matches!(self, LoadError::Parse { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Schema { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::Csv { path, .. } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one simulator result file as `schema`.
pub fn load_file(path: &Path, schema: Schema) -> Result<Dataset, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dataset(path, &text, schema)
}

/// Parse the full text of a result file. `path` is only used for reporting.
pub fn parse_dataset(path: &Path, text: &str, schema: Schema) -> Result<Dataset, LoadError> {
    let metadata = extract_metadata(text.lines());
    let info = RunInfo::from_metadata(schema, &metadata);

    let mut rows = RowCollector::new(path);
    let node_rows = match schema {
        Schema::Static => NodeRows::Static(rows.static_rows(text)?),
        Schema::Churn => NodeRows::Churn(rows.churn_rows(text)?),
    };

    let mut dataset = Dataset {
        path: path.to_path_buf(),
        metadata,
        info,
        rows: node_rows,
        diagnostics: rows.diagnostics,
        metadata_issues: Vec::new(),
    };
    dataset.metadata_issues = metadata_issues(&dataset);

    for diag in &dataset.diagnostics {
        warn!(
            "{}:{}: skipped row '{}': {}",
            path.display(),
            diag.line,
            diag.raw,
            diag.reason
        );
    }
    for issue in &dataset.metadata_issues {
        warn!("{}: {issue}", path.display());
    }
    if dataset.rows.is_empty() {
        warn!("{}: no {schema} rows found", path.display());
    }
    debug!(
        "{}: {} rows, {} metadata keys",
        path.display(),
        dataset.rows.len(),
        dataset.metadata.len()
    );

    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .comment(Some(b'#'))
        .from_reader(text.as_bytes())
}

/// One CSV record and the source line it was read from.
struct SourceRow<'t> {
    line: u64,
    raw: &'t str,
    record: csv::StringRecord,
}

/// Records paired with their 1-based line numbers. Without quoting every
/// record is exactly one `\n`-terminated line, and the reader drops empty
/// and `#` lines, so the same lines are dropped here.
fn source_rows(text: &str) -> impl Iterator<Item = Result<SourceRow<'_>, csv::Error>> + '_ {
    let lines = text
        .split('\n')
        .zip(1u64..)
        .filter(|(raw, _)| !raw.is_empty() && !raw.starts_with('#'));
    csv_reader(text)
        .into_records()
        .zip(lines)
        .map(|(record, (raw, line))| {
            record.map(|record| SourceRow {
                line,
                raw: raw.strip_suffix('\r').unwrap_or(raw),
                record,
            })
        })
}

struct RowCollector<'p> {
    path: &'p Path,
    seen: HashSet<String>,
    diagnostics: Vec<RowDiagnostic>,
}

impl<'p> RowCollector<'p> {
    fn new(path: &'p Path) -> Self {
        Self {
            path,
            seen: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn csv_error(&self, source: csv::Error) -> LoadError {
        LoadError::Csv {
            path: self.path.to_path_buf(),
            source,
        }
    }

    fn skip(&mut self, row: &SourceRow<'_>, reason: SkipReason) {
        self.diagnostics.push(RowDiagnostic {
            line: row.line,
            raw: row.raw.to_string(),
            reason,
        });
    }

    /// Record `node_id` as seen; `false` (plus a diagnostic) for a repeat.
    fn claim(&mut self, row: &SourceRow<'_>, node_id: &str) -> bool {
        if self.seen.insert(node_id.to_string()) {
            return true;
        }
        self.skip(
            row,
            SkipReason::DuplicateNode {
                node_id: node_id.to_string(),
            },
        );
        false
    }

    fn count(&self, row: &SourceRow<'_>, idx: usize, column: &str) -> Result<u64, LoadError> {
        let token = row.record.get(idx).unwrap_or("");
        token.trim().parse::<u64>().map_err(|_| LoadError::Parse {
            path: self.path.to_path_buf(),
            line: row.line,
            column: column.to_string(),
            token: token.to_string(),
        })
    }

    /// `node_id,count` rows. Rows with any other field count are skipped.
    fn static_rows(&mut self, text: &str) -> Result<Vec<StaticRow>, LoadError> {
        let mut out = Vec::new();
        for row in source_rows(text) {
            let row = row.map_err(|e| self.csv_error(e))?;
            let record = &row.record;
            if is_blank(record) {
                continue;
            }
            if record.len() != 2 {
                self.skip(
                    &row,
                    SkipReason::FieldCount {
                        expected: 2,
                        found: record.len(),
                    },
                );
                continue;
            }
            let node_id = &record[0];
            if node_id == Schema::HEADER_TOKEN {
                continue;
            }
            let count = self.count(&row, 1, "count")?;
            if self.claim(&row, node_id) {
                out.push(StaticRow {
                    node_id: node_id.to_string(),
                    count,
                });
            }
        }
        Ok(out)
    }

    /// Rows addressed by column name, so column order and extra columns do
    /// not matter. The header is the first non-blank row and must name every
    /// required column.
    fn churn_rows(&mut self, text: &str) -> Result<Vec<ChurnRow>, LoadError> {
        let mut rows = source_rows(text);
        let mut headers = csv::StringRecord::new();
        for row in rows.by_ref() {
            let row = row.map_err(|e| self.csv_error(e))?;
            if !is_blank(&row.record) {
                headers = row.record;
                break;
            }
        }
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = Schema::Churn
            .required_columns()
            .iter()
            .filter(|&&name| column(name).is_none())
            .map(|name| name.to_string())
            .collect();
        let (Some(id_idx), Some(before_idx), Some(after_idx)) = (
            column("node_id"),
            column("count_before"),
            column("count_after"),
        ) else {
            return Err(LoadError::Schema {
                path: self.path.to_path_buf(),
                schema: Schema::Churn,
                missing,
            });
        };
        let width = id_idx.max(before_idx).max(after_idx) + 1;

        let mut out = Vec::new();
        for row in rows {
            let row = row.map_err(|e| self.csv_error(e))?;
            let record = &row.record;
            if is_blank(record) || record.get(0) == Some(Schema::HEADER_TOKEN) {
                continue;
            }
            if record.len() < width {
                self.skip(
                    &row,
                    SkipReason::FieldCount {
                        expected: headers.len(),
                        found: record.len(),
                    },
                );
                continue;
            }
            let count_before = self.count(&row, before_idx, "count_before")?;
            let count_after = self.count(&row, after_idx, "count_after")?;
            let node_id = &record[id_idx];
            if self.claim(&row, node_id) {
                out.push(ChurnRow {
                    node_id: node_id.to_string(),
                    count_before,
                    count_after,
                });
            }
        }
        Ok(out)
    }
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Metadata checks
// ---------------------------------------------------------------------------

fn metadata_issues(dataset: &Dataset) -> Vec<MetadataIssue> {
    let mut issues: Vec<MetadataIssue> = dataset
        .info
        .invalid_numbers()
        .into_iter()
        .map(|(key, raw)| MetadataIssue::InvalidNumber {
            key: key.to_string(),
            raw: raw.to_string(),
        })
        .collect();

    if let (RunInfo::Static(info), NodeRows::Static(rows)) = (&dataset.info, &dataset.rows) {
        if rows.is_empty() {
            return issues;
        }
        let counts: Vec<u64> = rows.iter().map(|r| r.count).collect();
        let observed = LoadStats::from_counts(&counts);
        check_declared(&mut issues, "mean", &info.mean, observed.mean);
        check_declared(&mut issues, "max", &info.max, observed.max as f64);
    }
    issues
}

fn check_declared(issues: &mut Vec<MetadataIssue>, key: &str, declared: &MetaNumber, observed: f64) {
    let Some(declared) = declared.as_f64() else {
        return;
    };
    if (declared - observed).abs() > MISMATCH_TOLERANCE * observed.abs().max(1.0) {
        issues.push(MetadataIssue::Mismatch {
            key: key.to_string(),
            declared,
            observed,
        });
    }
}
