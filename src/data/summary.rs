use std::fmt;

use serde::Serialize;

use super::model::{MetaNumber, RunInfo, Schema};

// ---------------------------------------------------------------------------
// Statistic – what a summary chart compares
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Coefficient of variation of per-node load.
    Cv,
    /// Hottest node relative to the average.
    MaxOverAvg,
    /// Fraction of keys reassigned by a churn event.
    MovedRatio,
}

impl Statistic {
    /// Statistics summarised for a batch of the given schema, in render order.
    pub fn for_schema(schema: Schema) -> &'static [Statistic] {
        match schema {
            Schema::Static => &[Statistic::Cv, Statistic::MaxOverAvg],
            Schema::Churn => &[Statistic::MovedRatio],
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Statistic::Cv => "cv",
            Statistic::MaxOverAvg => "max_over_avg",
            Statistic::MovedRatio => "moved_ratio",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Guarded derivation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndefinedReason {
    ZeroMean,
    InvalidNumber { key: String, raw: String },
    NotApplicable { schema: Schema },
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::ZeroMean => write!(f, "mean is zero"),
            UndefinedReason::InvalidNumber { key, raw } => {
                write!(f, "'{key}' is not a number: '{raw}'")
            }
            UndefinedReason::NotApplicable { schema } => {
                write!(f, "not defined for {schema} runs")
            }
        }
    }
}

/// A run whose statistic could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedStat {
    pub algo: String,
    pub statistic: Statistic,
    pub reason: UndefinedReason,
}

fn number_or(n: &MetaNumber, key: &str, default: f64) -> Result<f64, UndefinedReason> {
    match n {
        MetaNumber::Missing => Ok(default),
        MetaNumber::Value(v) => Ok(*v),
        MetaNumber::Invalid(raw) => Err(UndefinedReason::InvalidNumber {
            key: key.to_string(),
            raw: raw.clone(),
        }),
    }
}

/// Derive `statistic` for one run.
///
/// Absent fields fall back to `cv = 0`, `max = 0`, `mean = 1`,
/// `moved_ratio = 0`. A present zero mean makes `max_over_avg` undefined.
pub fn stat_value(info: &RunInfo, statistic: Statistic) -> Result<f64, UndefinedStat> {
    let value = match (statistic, info) {
        (Statistic::Cv, RunInfo::Static(s)) => number_or(&s.cv, "cv", 0.0),
        (Statistic::MaxOverAvg, RunInfo::Static(s)) => {
            number_or(&s.max, "max", 0.0).and_then(|max| {
                let mean = number_or(&s.mean, "mean", 1.0)?;
                if mean == 0.0 {
                    Err(UndefinedReason::ZeroMean)
                } else {
                    Ok(max / mean)
                }
            })
        }
        (Statistic::MovedRatio, RunInfo::Churn(c)) => {
            number_or(&c.moved_ratio, "moved_ratio", 0.0)
        }
        (_, info) => Err(UndefinedReason::NotApplicable {
            schema: info.schema(),
        }),
    };
    value.map_err(|reason| UndefinedStat {
        algo: info.algo().to_string(),
        statistic,
        reason,
    })
}

// ---------------------------------------------------------------------------
// SummarySeries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryPoint {
    pub algo: String,
    pub value: f64,
}

/// One statistic across a batch, ordered by algorithm name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarySeries {
    pub statistic: Statistic,
    pub points: Vec<SummaryPoint>,
    /// Runs left out because their value is undefined.
    pub undefined: Vec<UndefinedStat>,
    /// Churn operation shared by every run, if there is exactly one.
    pub churn_op: Option<String>,
}

impl SummarySeries {
    pub fn algos(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.algo.as_str()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// The churn operation common to all runs. `None` when runs disagree, when
/// any run is static, or when there are no runs at all.
pub fn shared_churn_op(infos: &[RunInfo]) -> Option<String> {
    let mut ops = infos.iter().map(RunInfo::churn_op);
    let first = ops.next()??;
    ops.all(|op| op == Some(first)).then(|| first.to_string())
}

/// Build the series for `statistic`. Points are sorted by `algo` with a
/// stable sort, so runs sharing an algorithm keep their input order.
pub fn summarize(infos: &[RunInfo], statistic: Statistic) -> SummarySeries {
    let mut points = Vec::with_capacity(infos.len());
    let mut undefined = Vec::new();
    for info in infos {
        match stat_value(info, statistic) {
            Ok(value) => points.push(SummaryPoint {
                algo: info.algo().to_string(),
                value,
            }),
            Err(u) => undefined.push(u),
        }
    }
    points.sort_by(|a, b| a.algo.cmp(&b.algo));

    SummarySeries {
        statistic,
        points,
        undefined,
        churn_op: shared_churn_op(infos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::MetadataRecord;

    fn info(schema: Schema, pairs: &[(&str, &str)]) -> RunInfo {
        let mut m = MetadataRecord::new();
        for (k, v) in pairs {
            m.insert(*k, *v);
        }
        RunInfo::from_metadata(schema, &m)
    }

    #[test]
    fn max_over_avg_divides_declared_values() {
        let i = info(Schema::Static, &[("algo", "chbl"), ("mean", "200"), ("max", "300")]);
        assert_eq!(stat_value(&i, Statistic::MaxOverAvg).unwrap(), 1.5);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let i = info(Schema::Static, &[("max", "7")]);
        assert_eq!(stat_value(&i, Statistic::MaxOverAvg).unwrap(), 7.0);
        assert_eq!(stat_value(&i, Statistic::Cv).unwrap(), 0.0);
        let c = info(Schema::Churn, &[]);
        assert_eq!(stat_value(&c, Statistic::MovedRatio).unwrap(), 0.0);
    }

    #[test]
    fn zero_mean_is_undefined_not_a_fault() {
        let i = info(Schema::Static, &[("algo", "ring"), ("mean", "0"), ("max", "5")]);
        let err = stat_value(&i, Statistic::MaxOverAvg).unwrap_err();
        assert_eq!(err.algo, "ring");
        assert_eq!(err.reason, UndefinedReason::ZeroMean);
    }

    #[test]
    fn invalid_number_is_undefined() {
        let i = info(Schema::Static, &[("cv", "high")]);
        let err = stat_value(&i, Statistic::Cv).unwrap_err();
        assert_eq!(
            err.reason,
            UndefinedReason::InvalidNumber { key: "cv".into(), raw: "high".into() }
        );
    }

    #[test]
    fn statistic_must_match_schema() {
        let c = info(Schema::Churn, &[("algo", "jump")]);
        let err = stat_value(&c, Statistic::Cv).unwrap_err();
        assert_eq!(err.reason, UndefinedReason::NotApplicable { schema: Schema::Churn });
    }

    #[test]
    fn series_is_sorted_by_algo() {
        let infos = vec![
            info(Schema::Static, &[("algo", "chbl"), ("cv", "0.2")]),
            info(Schema::Static, &[("algo", "anchor"), ("cv", "0.1")]),
        ];
        let s = summarize(&infos, Statistic::Cv);
        assert_eq!(s.algos(), vec!["anchor", "chbl"]);
        assert_eq!(s.values(), vec![0.1, 0.2]);
        assert_eq!(s.churn_op, None);
    }

    #[test]
    fn equal_algos_keep_input_order() {
        let infos = vec![
            info(Schema::Static, &[("algo", "maglev"), ("cv", "0.3")]),
            info(Schema::Static, &[("algo", "jump"), ("cv", "0.9")]),
            info(Schema::Static, &[("algo", "maglev"), ("cv", "0.1")]),
        ];
        let s = summarize(&infos, Statistic::Cv);
        assert_eq!(s.algos(), vec!["jump", "maglev", "maglev"]);
        assert_eq!(s.values(), vec![0.9, 0.3, 0.1]);
    }

    #[test]
    fn undefined_points_are_set_aside() {
        let infos = vec![
            info(Schema::Static, &[("algo", "a"), ("mean", "0"), ("max", "3")]),
            info(Schema::Static, &[("algo", "b"), ("mean", "2"), ("max", "3")]),
        ];
        let s = summarize(&infos, Statistic::MaxOverAvg);
        assert_eq!(s.algos(), vec!["b"]);
        assert_eq!(s.undefined.len(), 1);
        assert_eq!(s.undefined[0].algo, "a");
    }

    #[test]
    fn uniform_churn_op_is_shared() {
        let infos: Vec<RunInfo> = ["jump", "maglev", "ring"]
            .iter()
            .map(|&a| info(Schema::Churn, &[("algo", a), ("churn_op", "remove")]))
            .collect();
        let s = summarize(&infos, Statistic::MovedRatio);
        assert_eq!(s.churn_op.as_deref(), Some("remove"));
    }

    #[test]
    fn mixed_churn_op_is_not_shared() {
        let infos = vec![
            info(Schema::Churn, &[("churn_op", "remove")]),
            info(Schema::Churn, &[("churn_op", "remove")]),
            info(Schema::Churn, &[("churn_op", "add")]),
        ];
        assert_eq!(shared_churn_op(&infos), None);
    }

    #[test]
    fn absent_churn_op_shares_the_fallback() {
        let infos = vec![info(Schema::Churn, &[]), info(Schema::Churn, &[])];
        assert_eq!(shared_churn_op(&infos).as_deref(), Some("unknown"));
        assert_eq!(shared_churn_op(&[]), None);
    }
}
