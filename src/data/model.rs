use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Fallback for identifier fields (`algo`, `churn_op`) missing from a file.
pub const UNKNOWN: &str = "unknown";
/// Fallback for numeric display fields (node counts, `zipf_s`, ...).
pub const MISSING: &str = "?";

// ---------------------------------------------------------------------------
// Schema – which result-file layout a loader expects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// `node_id,count` – one distribution snapshot.
    Static,
    /// `node_id,count_before,count_after` – before/after a churn event.
    Churn,
}

impl Schema {
    /// First-field value that marks a header row.
    pub const HEADER_TOKEN: &'static str = "node_id";

    /// Columns a file of this schema must expose.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Schema::Static => &["node_id", "count"],
            Schema::Churn => &["node_id", "count_before", "count_after"],
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Static => write!(f, "static"),
            Schema::Churn => write!(f, "churn"),
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataRecord – raw `#key,value` pairs
// ---------------------------------------------------------------------------

/// Raw metadata of one result file. Later duplicates of a key overwrite
/// earlier ones; keys nothing reads are kept anyway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataRecord(BTreeMap<String, String>);

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Interpret `key` as a float, keeping absence and bad text apart.
    pub fn number(&self, key: &str) -> MetaNumber {
        match self.get(key) {
            None => MetaNumber::Missing,
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => MetaNumber::Value(v),
                _ => MetaNumber::Invalid(raw.to_string()),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MetaNumber – a numeric metadata field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MetaNumber {
    Missing,
    Value(f64),
    /// Present, but not a finite number. Holds the raw text.
    Invalid(String),
}

impl MetaNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaNumber::Value(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed run metadata
// ---------------------------------------------------------------------------

/// Metadata of a static distribution run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticInfo {
    pub algo: Option<String>,
    pub nodes: Option<String>,
    pub keys: Option<String>,
    pub zipf_s: Option<String>,
    pub mean: MetaNumber,
    pub max: MetaNumber,
    pub cv: MetaNumber,
}

/// Metadata of a churn (before/after) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnInfo {
    pub algo: Option<String>,
    pub churn_op: Option<String>,
    pub nodes_before: Option<String>,
    pub nodes_after: Option<String>,
    pub zipf_s: Option<String>,
    pub moved_ratio: MetaNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "schema", rename_all = "lowercase")]
pub enum RunInfo {
    Static(StaticInfo),
    Churn(ChurnInfo),
}

fn text(meta: &MetadataRecord, key: &str) -> Option<String> {
    meta.get(key).map(str::to_string)
}

impl RunInfo {
    pub fn from_metadata(schema: Schema, meta: &MetadataRecord) -> Self {
        match schema {
            Schema::Static => RunInfo::Static(StaticInfo {
                algo: text(meta, "algo"),
                // Some runs only write `nodes_before`.
                nodes: text(meta, "nodes").or_else(|| text(meta, "nodes_before")),
                keys: text(meta, "keys"),
                zipf_s: text(meta, "zipf_s"),
                mean: meta.number("mean"),
                max: meta.number("max"),
                cv: meta.number("cv"),
            }),
            Schema::Churn => RunInfo::Churn(ChurnInfo {
                algo: text(meta, "algo"),
                churn_op: text(meta, "churn_op"),
                nodes_before: text(meta, "nodes_before"),
                nodes_after: text(meta, "nodes_after"),
                zipf_s: text(meta, "zipf_s"),
                moved_ratio: meta.number("moved_ratio"),
            }),
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            RunInfo::Static(_) => Schema::Static,
            RunInfo::Churn(_) => Schema::Churn,
        }
    }

    pub fn algo(&self) -> &str {
        let algo = match self {
            RunInfo::Static(s) => s.algo.as_deref(),
            RunInfo::Churn(c) => c.algo.as_deref(),
        };
        algo.unwrap_or(UNKNOWN)
    }

    /// `None` for static runs; the fallback applies only to churn runs.
    pub fn churn_op(&self) -> Option<&str> {
        match self {
            RunInfo::Static(_) => None,
            RunInfo::Churn(c) => Some(c.churn_op.as_deref().unwrap_or(UNKNOWN)),
        }
    }

    /// Numeric fields that are present but unreadable, as `(key, raw)`.
    pub fn invalid_numbers(&self) -> Vec<(&'static str, &str)> {
        let fields: Vec<(&'static str, &MetaNumber)> = match self {
            RunInfo::Static(s) => vec![("mean", &s.mean), ("max", &s.max), ("cv", &s.cv)],
            RunInfo::Churn(c) => vec![("moved_ratio", &c.moved_ratio)],
        };
        fields
            .into_iter()
            .filter_map(|(key, n)| match n {
                MetaNumber::Invalid(raw) => Some((key, raw.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Display helper for optional numeric-ish fields.
pub fn or_missing(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or(MISSING)
}

// ---------------------------------------------------------------------------
// Node rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticRow {
    pub node_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChurnRow {
    pub node_id: String,
    pub count_before: u64,
    pub count_after: u64,
}

/// The per-node rows of one file. One variant per schema, so a dataset can
/// never mix row shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRows {
    Static(Vec<StaticRow>),
    Churn(Vec<ChurnRow>),
}

impl NodeRows {
    pub fn len(&self) -> usize {
        match self {
            NodeRows::Static(rows) => rows.len(),
            NodeRows::Churn(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Node ids in file order.
    pub fn node_ids(&self) -> Vec<&str> {
        match self {
            NodeRows::Static(rows) => rows.iter().map(|r| r.node_id.as_str()).collect(),
            NodeRows::Churn(rows) => rows.iter().map(|r| r.node_id.as_str()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadStats – statistics observed from the rows themselves
// ---------------------------------------------------------------------------

/// Aggregate load over a set of per-node counts. Standard deviation is the
/// population one; `cv` is zero when the mean is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoadStats {
    pub count: usize,
    pub sum: u64,
    pub mean: f64,
    pub max: u64,
    pub std: f64,
    pub cv: f64,
}

impl LoadStats {
    pub fn from_counts(counts: &[u64]) -> Self {
        let n = counts.len();
        if n == 0 {
            return LoadStats::default();
        }
        let sum: u64 = counts.iter().sum();
        let max = counts.iter().copied().max().unwrap_or(0);
        let mean = sum as f64 / n as f64;
        let std = if n > 1 {
            let sq: f64 = counts
                .iter()
                .map(|&c| {
                    let d = c as f64 - mean;
                    d * d
                })
                .sum();
            (sq / n as f64).sqrt()
        } else {
            0.0
        };
        let cv = if mean != 0.0 { std / mean } else { 0.0 };
        LoadStats {
            count: n,
            sum,
            mean,
            max,
            std,
            cv,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – one loaded result file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub path: PathBuf,
    pub metadata: MetadataRecord,
    pub info: RunInfo,
    pub rows: NodeRows,
    /// Rows that were skipped while loading.
    pub diagnostics: Vec<RowDiagnostic>,
    pub metadata_issues: Vec<MetadataIssue>,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    FieldCount { expected: usize, found: usize },
    DuplicateNode { node_id: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            SkipReason::DuplicateNode { node_id } => write!(f, "duplicate node id '{node_id}'"),
        }
    }
}

/// A data row the loader dropped, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    /// 1-based line number in the source file.
    pub line: u64,
    pub raw: String,
    pub reason: SkipReason,
}

/// Something off about a file's metadata that does not stop it loading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetadataIssue {
    InvalidNumber { key: String, raw: String },
    /// The declared value disagrees with what the rows add up to.
    Mismatch {
        key: String,
        declared: f64,
        observed: f64,
    },
}

impl fmt::Display for MetadataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataIssue::InvalidNumber { key, raw } => {
                write!(f, "metadata '{key}' is not a number: '{raw}'")
            }
            MetadataIssue::Mismatch {
                key,
                declared,
                observed,
            } => write!(f, "metadata '{key}' declares {declared} but rows give {observed}"),
        }
    }
}
