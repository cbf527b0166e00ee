use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use loadplot::config::RenderConfig;
use loadplot::render::plot::{BitmapSink, MemorySink};
use loadplot::{run_batch, BatchReport, Schema};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// `node_id,count` distribution files
    Static,
    /// `node_id,count_before,count_after` churn files
    Churn,
}

impl From<Mode> for Schema {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Static => Schema::Static,
            Mode::Churn => Schema::Churn,
        }
    }
}

/// Render per-node and summary charts from simulator result files.
#[derive(Debug, Parser)]
#[command(name = "loadplot", version, about)]
struct Cli {
    /// Result files written by the simulator
    #[arg(long, num_args = 1.., required = true)]
    csv: Vec<PathBuf>,

    /// Directory the charts are written to (created if missing)
    #[arg(long)]
    outdir: PathBuf,

    /// Layout of the input files
    #[arg(long, value_enum, default_value = "static")]
    mode: Mode,

    /// TOML file with chart sizes and fonts
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON report of outputs and diagnostics to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Parse and aggregate only; list the charts that would be drawn
    #[arg(long)]
    dry_run: bool,
}

fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = RenderConfig::load(cli.config.as_deref()).context("loading chart config")?;
    let schema = Schema::from(cli.mode);

    let result = if cli.dry_run {
        let mut sink = MemorySink::default();
        let result = run_batch(&cli.csv, schema, &cli.outdir, &mut sink);
        for request in &sink.requests {
            println!("{}\t{}", request.output.display(), request.title);
        }
        result
    } else {
        std::fs::create_dir_all(&cli.outdir)
            .with_context(|| format!("creating {}", cli.outdir.display()))?;
        let mut sink = BitmapSink::new(config);
        run_batch(&cli.csv, schema, &cli.outdir, &mut sink)
    };

    let report = match &result {
        Ok(report) => report,
        Err(e) => e.report(),
    };
    if let Some(path) = &cli.report {
        write_report(path, report)?;
    }
    for failure in &report.failures {
        warn!("{}: {}", failure.path.display(), failure.message);
    }
    info!(
        "{} chart(s), {} file(s) with diagnostics, {} failed file(s)",
        report.outputs.len(),
        report.diagnostics.len(),
        report.failures.len()
    );

    result?;
    Ok(())
}
