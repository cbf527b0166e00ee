use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Chart settings, loaded from an optional TOML file.
///
/// ```toml
/// [per_node]
/// width = 1600
///
/// [summary]
/// height = 600
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RenderConfig {
    pub per_node: ChartSize,
    pub summary: SummaryChartSize,
    pub font: FontConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

/// Summary charts default to a smaller canvas than per-node ones.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummaryChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SummaryChartSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    pub caption_size: u32,
    pub label_size: u32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            caption_size: 22,
            label_size: 14,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} must be at least {min} pixels, got {value}")]
    TooSmall {
        field: &'static str,
        min: u32,
        value: u32,
    },
}

/// Smallest canvas edge that still leaves room for axes and a caption.
const MIN_EDGE: u32 = 200;

impl RenderConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: RenderConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let edges = [
            ("per_node.width", self.per_node.width),
            ("per_node.height", self.per_node.height),
            ("summary.width", self.summary.width),
            ("summary.height", self.summary.height),
        ];
        for (field, value) in edges {
            if value < MIN_EDGE {
                return Err(ConfigError::TooSmall {
                    field,
                    min: MIN_EDGE,
                    value,
                });
            }
        }
        Ok(())
    }
}
