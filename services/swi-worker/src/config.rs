//! Overlay deployment configuration.
//!
//! One YAML file describes one regional overlay. Every field carries a
//! compiled-in default reproducing the Great Lakes deployment, so the
//! worker also runs with no file at all.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use swi_common::BoundingBox;
use swi_index::TemperatureSource;
use tracing::debug;

/// Root configuration for one overlay run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Geographic extent of the overlay.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    #[serde(default = "default_bbox")]
    pub bbox: BoundingBox,
}

/// Upstream retrieval settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// GRIB filter endpoint for the 0.25 degree model
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Forecast-hour offset of the consumed frame (0 = analysis)
    #[serde(default)]
    pub forecast_hour: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How many 6-hour cycles to probe backward before giving up
    #[serde(default = "default_max_probes")]
    pub max_probes: u32,
    /// Retry attempts for the subset download after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial retry delay in seconds (doubles each retry)
    #[serde(default = "default_initial_retry_delay_secs")]
    pub initial_retry_delay_secs: u64,
    /// Retry delay cap in seconds
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,
}

/// Index derivation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Base temperature field for the lookup strategy's ΔT
    #[serde(default)]
    pub temperature_source: TemperatureSource,
    /// Robust-scaling quantiles for convergence normalization
    #[serde(default = "default_quantile_low")]
    pub quantile_low: f64,
    #[serde(default = "default_quantile_high")]
    pub quantile_high: f64,
    /// Substituted when a lookup lands outside the calibration domain
    #[serde(default)]
    pub sentinel: f64,
    /// Calibration CSV path (lookup strategy only)
    #[serde(default = "default_calibration_table")]
    pub calibration_table: PathBuf,
}

/// Which derivation strategy this deployment runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Physical,
    Lookup,
}

/// Classification breakpoints and palette.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleConfig {
    #[serde(default = "default_levels")]
    pub levels: Vec<f64>,
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,
}

/// Artifact destinations.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_image_path")]
    pub image: PathBuf,
    #[serde(default = "default_metadata_path")]
    pub metadata: PathBuf,
}

fn default_bbox() -> BoundingBox {
    BoundingBox {
        west: -92.0,
        east: -74.0,
        south: 40.5,
        north: 49.5,
    }
}

fn default_endpoint() -> String {
    "https://nomads.ncep.noaa.gov/cgi-bin/filter_gfs_0p25.pl".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_probes() -> u32 {
    12 // 3 days of 6-hour cycles
}

fn default_max_retries() -> u32 {
    4
}

fn default_initial_retry_delay_secs() -> u64 {
    2
}

fn default_max_retry_delay_secs() -> u64 {
    60
}

fn default_quantile_low() -> f64 {
    0.05
}

fn default_quantile_high() -> f64 {
    0.95
}

fn default_calibration_table() -> PathBuf {
    PathBuf::from("config/swi_calibration.csv")
}

fn default_levels() -> Vec<f64> {
    vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 70.0]
}

fn default_colors() -> Vec<String> {
    [
        "#00000000", "#4cc9f0", "#4895ef", "#4361ee", "#f59e0b", "#ef4444", "#b91c1c",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_image_path() -> PathBuf {
    PathBuf::from("web/swi_overlay.png")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("web/swi_meta.json")
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            bbox: default_bbox(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            forecast_hour: 0,
            request_timeout_secs: default_timeout_secs(),
            max_probes: default_max_probes(),
            max_retries: default_max_retries(),
            initial_retry_delay_secs: default_initial_retry_delay_secs(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            temperature_source: TemperatureSource::default(),
            quantile_low: default_quantile_low(),
            quantile_high: default_quantile_high(),
            sentinel: 0.0,
            calibration_table: default_calibration_table(),
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            colors: default_colors(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image: default_image_path(),
            metadata: default_metadata_path(),
        }
    }
}

impl OverlayConfig {
    /// Load a configuration from a YAML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: OverlayConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        debug!(path = %path.display(), "Loaded overlay config");
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.region
            .bbox
            .validate()
            .context("Invalid region.bbox")?;

        let (low, high) = (self.index.quantile_low, self.index.quantile_high);
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
            return Err(anyhow!(
                "Invalid quantiles: require 0 <= low < high <= 1, got ({}, {})",
                low,
                high
            ));
        }

        if self.source.max_probes == 0 {
            return Err(anyhow!("source.max_probes must be at least 1"));
        }

        Ok(())
    }
}
