use std::error::Error;
use std::path::PathBuf;

use log::debug;
use plotters::prelude::*;
use thiserror::Error;

use super::request::{ChartKind, RenderRequest};
use crate::color::generate_palette;
use crate::config::{FontConfig, RenderConfig};

// ---------------------------------------------------------------------------
// PlotSink – where render requests go
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing {}: {message}", path.display())]
    Draw { path: PathBuf, message: String },
}

/// Turns declarative chart requests into output files.
pub trait PlotSink {
    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError>;
}

/// Keeps requests in memory instead of drawing them. Backs `--dry-run`.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub requests: Vec<RenderRequest>,
}

impl PlotSink for MemorySink {
    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError> {
        self.requests.push(request.clone());
        Ok(())
    }
}

/// Draws PNG files with `plotters`.
#[derive(Debug, Clone, Default)]
pub struct BitmapSink {
    config: RenderConfig,
}

impl BitmapSink {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl PlotSink for BitmapSink {
    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError> {
        let size = match request.kind {
            ChartKind::Bars { .. } => (self.config.per_node.width, self.config.per_node.height),
            ChartKind::Lines => (self.config.summary.width, self.config.summary.height),
        };
        debug!("drawing {} at {}x{}", request.output.display(), size.0, size.1);
        draw(request, size, &self.config.font).map_err(|e| RenderError::Draw {
            path: request.output.clone(),
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// Category name for an x position, or nothing between categories.
fn category_label(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

fn draw(request: &RenderRequest, size: (u32, u32), font: &FontConfig) -> Result<(), Box<dyn Error>> {
    let family = font.family.as_str();
    let root = BitMapBackend::new(&request.output, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut area = root.titled(&request.title, (family, font.caption_size))?;
    if let Some(subtitle) = &request.subtitle {
        area = area.titled(subtitle, (family, font.label_size))?;
    }

    let n = request.categories.len();
    let y_max = request
        .series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0.0f64, f64::max);
    let y_top = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };
    let x_range = -0.5f64..(n.max(1) as f64 - 0.5);

    let mut chart = ChartBuilder::on(&area)
        .margin(10)
        .x_label_area_size(70)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, 0.0f64..y_top)?;

    let categories = &request.categories;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.max(1))
        .x_label_formatter(&|x| category_label(categories, *x))
        .x_label_style((family, font.label_size))
        .y_label_style((family, font.label_size))
        .x_desc(request.x_label.as_str())
        .y_desc(request.y_label.as_str())
        .draw()?;

    let palette = generate_palette(request.series.len());
    let m = request.series.len() as f64;
    for (k, (series, colour)) in request.series.iter().zip(palette).enumerate() {
        let anno = match request.kind {
            ChartKind::Bars { width } => {
                let offset = (k as f64 - (m - 1.0) / 2.0) * width;
                chart.draw_series(series.values.iter().enumerate().map(|(i, &v)| {
                    let centre = i as f64 + offset;
                    Rectangle::new(
                        [(centre - width / 2.0, 0.0), (centre + width / 2.0, v)],
                        colour.filled(),
                    )
                }))?
            }
            ChartKind::Lines => {
                let points: Vec<(f64, f64)> = series
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (i as f64, v))
                    .collect();
                chart.draw_series(
                    points
                        .iter()
                        .map(|&p| Circle::new(p, 4, colour.filled())),
                )?;
                chart.draw_series(LineSeries::new(points, colour.stroke_width(2)))?
            }
        };
        if let Some(label) = &series.label {
            anno.label(label.as_str()).legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 10, y + 5)], colour.filled())
            });
        }
    }

    if request.series.iter().any(|s| s.label.is_some()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}
