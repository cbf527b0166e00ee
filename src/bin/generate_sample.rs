use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use loadplot::data::model::LoadStats;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const KEYS: u64 = 100_000;
const ZIPF_S: f64 = 1.2;

/// Per-node spread of each sample algorithm, relative to a perfect split.
const ALGORITHMS: [(&str, f64); 4] = [
    ("chbl", 0.02),
    ("jump", 0.01),
    ("maglev", 0.03),
    ("ringch", 0.12),
];

/// Fraction of keys each algorithm moves when one node leaves.
fn moved_fraction(algo: &str, nodes_before: usize) -> f64 {
    let ideal = 1.0 / nodes_before as f64;
    match algo {
        "maglev" => ideal * 1.15,
        "ringch" => ideal * 1.05,
        _ => ideal,
    }
}

fn spread_counts(nodes: usize, spread: f64, rng: &mut SimpleRng) -> Vec<u64> {
    let share = KEYS as f64 / nodes as f64;
    (0..nodes)
        .map(|_| rng.gauss(share, share * spread).max(0.0).round() as u64)
        .collect()
}

fn static_file(algo: &str, counts: &[u64]) -> String {
    let st = LoadStats::from_counts(counts);
    let mut out = String::from("node_id,count\n");
    for (i, c) in counts.iter().enumerate() {
        let _ = writeln!(out, "node-{i},{c}");
    }
    let _ = writeln!(out, "#algo,{algo}");
    let _ = writeln!(out, "#nodes,{}", counts.len());
    let _ = writeln!(out, "#keys,{KEYS}");
    let _ = writeln!(out, "#zipf_s,{ZIPF_S:.3}");
    let _ = writeln!(out, "#mean,{:.3}", st.mean);
    let _ = writeln!(out, "#max,{}", st.max);
    let _ = writeln!(out, "#std,{:.3}", st.std);
    let _ = writeln!(out, "#cv,{:.5}", st.cv);
    out
}

fn churn_file(algo: &str, before: &[u64], after: &[u64], moved_ratio: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#algo,{algo}");
    let _ = writeln!(out, "#churn_op,remove");
    let _ = writeln!(out, "#nodes_before,{}", before.len());
    let _ = writeln!(out, "#nodes_after,{}", before.len() - 1);
    let _ = writeln!(out, "#zipf_s,{ZIPF_S:.3}");
    let _ = writeln!(out, "#moved_ratio,{moved_ratio:.5}");
    out.push_str("node_id,count_before,count_after\n");
    for (i, (b, a)) in before.iter().zip(after).enumerate() {
        let _ = writeln!(out, "node-{i},{b},{a}");
    }
    out
}

fn write(dir: &Path, name: &str, text: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let outdir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_runs"));
    std::fs::create_dir_all(&outdir).with_context(|| format!("creating {}", outdir.display()))?;

    let mut rng = SimpleRng::new(42);
    let nodes = 16;

    for (algo, spread) in ALGORITHMS {
        let before = spread_counts(nodes, spread, &mut rng);
        write(&outdir, &format!("static_{algo}.csv"), &static_file(algo, &before))?;

        // The last node leaves; its keys and the moved share spread over the rest.
        let mut after = spread_counts(nodes - 1, spread, &mut rng);
        after.push(0);
        let moved = moved_fraction(algo, nodes);
        write(
            &outdir,
            &format!("churn_{algo}.csv"),
            &churn_file(algo, &before, &after, moved),
        )?;
    }
    Ok(())
}
