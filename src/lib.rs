//! Post-processing for load-distribution simulator result files: parse
//! static and churn runs, aggregate them across algorithms, and render
//! per-node and summary charts.

pub mod batch;
pub mod color;
pub mod config;
pub mod data;
pub mod render;

pub use batch::{run_batch, BatchError, BatchReport};
pub use data::model::{Dataset, Schema};
