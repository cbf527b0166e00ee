use std::path::{Path, PathBuf};

use loadplot::batch::BatchError;
use loadplot::data::loader::{load_file, LoadError};
use loadplot::render::plot::MemorySink;
use loadplot::render::request::ChartKind;
use loadplot::{run_batch, Schema};
use proptest::prelude::*;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn static_run(algo: &str, counts: &[u64], mean: &str, max: &str, cv: &str) -> String {
    let mut text = String::from("node_id,count\n");
    for (i, c) in counts.iter().enumerate() {
        text.push_str(&format!("node-{i},{c}\n"));
    }
    text.push_str(&format!(
        "#algo,{algo}\n#nodes,{}\n#keys,1000\n#zipf_s,1.200\n#mean,{mean}\n#max,{max}\n#cv,{cv}\n",
        counts.len()
    ));
    text
}

fn churn_run(algo: &str, op: &str, moved: &str) -> String {
    format!(
        "#algo,{algo}\n#churn_op,{op}\n#nodes_before,3\n#nodes_after,2\n#zipf_s,1.0\n#moved_ratio,{moved}\n\
         node_id,count_before,count_after\nnode-0,10,15\nnode-1,10,15\nnode-2,10,0\n"
    )
}

fn names(outputs: &[PathBuf]) -> Vec<String> {
    outputs
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn static_batch_renders_per_file_then_summaries() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("plots");
    let chbl = write(&dir, "b.csv", &static_run("chbl", &[100, 300], "200", "300", "0.5"));
    let anchor = write(&dir, "a.csv", &static_run("anchor", &[190, 210], "200", "210", "0.05"));

    let mut sink = MemorySink::default();
    let report = run_batch(&[chbl, anchor], Schema::Static, &out, &mut sink).unwrap();

    assert_eq!(
        names(&report.outputs),
        vec![
            "per_node_chbl_nodes2_zipf1.200.png",
            "per_node_anchor_nodes2_zipf1.200.png",
            "summary_cv_vs_algo.png",
            "summary_maxoveravg_vs_algo.png",
        ]
    );
    assert!(report.outputs.iter().all(|p| p.starts_with(&out)));
    assert!(report.is_clean());

    let cv = &sink.requests[2];
    assert_eq!(cv.kind, ChartKind::Lines);
    assert_eq!(cv.title, "cv vs algorithm");
    assert_eq!(cv.categories, vec!["anchor", "chbl"]);
    assert_eq!(cv.series[0].values, vec![0.05, 0.5]);

    let max_over_avg = &sink.requests[3];
    assert_eq!(max_over_avg.categories, vec!["anchor", "chbl"]);
    assert_eq!(max_over_avg.series[0].values, vec![1.05, 1.5]);
}

#[test]
fn zero_mean_leaves_run_out_of_ratio_chart() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.csv", &static_run("idle", &[0, 0], "0", "0", "0"));
    let b = write(&dir, "b.csv", &static_run("jump", &[1, 3], "2", "3", "0.5"));

    let mut sink = MemorySink::default();
    let report = run_batch(&[a, b], Schema::Static, dir.path(), &mut sink).unwrap();

    assert_eq!(report.undefined_stats.len(), 1);
    assert_eq!(report.undefined_stats[0].algo, "idle");
    let ratio = sink.requests.last().unwrap();
    assert_eq!(ratio.categories, vec!["jump"]);
    // cv is still defined for the idle run.
    assert_eq!(sink.requests[2].categories, vec!["idle", "jump"]);
}

#[test]
fn uniform_churn_op_is_annotated() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<PathBuf> = ["ring", "jump", "maglev"]
        .iter()
        .map(|algo| write(&dir, &format!("{algo}.csv"), &churn_run(algo, "remove", "0.33")))
        .collect();

    let mut sink = MemorySink::default();
    let report = run_batch(&paths, Schema::Churn, dir.path(), &mut sink).unwrap();

    assert_eq!(report.outputs.len(), 4);
    let summary = sink.requests.last().unwrap();
    assert_eq!(
        summary.title,
        "Fraction of keys moved vs algorithm (churn_op=remove)"
    );
    assert_eq!(summary.categories, vec!["jump", "maglev", "ring"]);
    assert_eq!(
        names(&report.outputs)[0],
        "churn_per_node_ring_remove_nb3_na2_zipf1.0.png"
    );
}

#[test]
fn mixed_churn_op_is_not_annotated() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write(&dir, "a.csv", &churn_run("a", "remove", "0.3")),
        write(&dir, "b.csv", &churn_run("b", "remove", "0.3")),
        write(&dir, "c.csv", &churn_run("c", "add", "0.2")),
    ];

    let mut sink = MemorySink::default();
    run_batch(&paths, Schema::Churn, dir.path(), &mut sink).unwrap();

    let summary = sink.requests.last().unwrap();
    assert_eq!(summary.title, "Fraction of keys moved vs algorithm");
    assert!(!summary.title.contains("remove"));
    assert!(!summary.title.contains("add"));
}

#[test]
fn missing_churn_column_aborts_batch_with_partial_report() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.csv", &churn_run("jump", "add", "0.1"));
    let bad = write(
        &dir,
        "bad.csv",
        "#algo,ring\nnode_id,count_before\nnode-0,10\n",
    );
    let never = write(&dir, "never.csv", &churn_run("maglev", "add", "0.1"));

    let mut sink = MemorySink::default();
    let err = run_batch(&[good, bad.clone(), never], Schema::Churn, dir.path(), &mut sink)
        .unwrap_err();

    match &err {
        BatchError::Load {
            source: LoadError::Schema { path, missing, .. },
            report,
        } => {
            assert_eq!(path, &bad);
            assert_eq!(missing, &vec!["count_after".to_string()]);
            assert_eq!(report.outputs.len(), 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("bad.csv"));
    // Only the file before the failure was drawn; no summary.
    assert_eq!(sink.requests.len(), 1);
}

#[test]
fn bad_count_skips_only_that_file() {
    let dir = TempDir::new().unwrap();
    let bad = write(&dir, "bad.csv", "node_id,count\nnode-0,ten\n#algo,x\n");
    let good = write(&dir, "good.csv", &static_run("jump", &[1, 3], "2", "3", "0.5"));

    let mut sink = MemorySink::default();
    let report = run_batch(&[bad.clone(), good], Schema::Static, dir.path(), &mut sink).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, bad);
    assert!(report.failures[0].message.contains(":2:"));
    assert_eq!(report.outputs.len(), 3);
    assert_eq!(sink.requests[1].categories, vec!["jump"]);
}

#[test]
fn report_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.csv", "node-0,1\nnode-0,2\n#algo,a\n#mean,oops\n");

    let mut sink = MemorySink::default();
    let report = run_batch(&[a], Schema::Static, dir.path(), &mut sink).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    let file = &json["diagnostics"][0];
    assert_eq!(file["skipped_rows"][0]["reason"]["kind"], "duplicate_node");
    assert_eq!(file["metadata_issues"][0]["kind"], "invalid_number");
    assert_eq!(json["undefined_stats"][0]["reason"]["kind"], "invalid_number");
}

fn load_twice(path: &Path) -> bool {
    load_file(path, Schema::Static).unwrap() == load_file(path, Schema::Static).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn static_loading_is_idempotent(counts in prop::collection::vec(0u64..100_000, 0..20)) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "run.csv", &static_run("p", &counts, "1", "1", "0"));
        prop_assert!(load_twice(&path));
    }
}
