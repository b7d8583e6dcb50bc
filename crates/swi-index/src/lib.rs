//! Severe-weather index derivation.
//!
//! Two interchangeable strategies turn raw model fields into the index
//! field: a closed-form physical formula and an empirical calibration
//! lookup. Both consume normalized [`GriddedField`]s and return an
//! index field on the same grid.

pub mod calibration;
pub mod lookup;
pub mod physical;

pub use calibration::CalibrationTable;
pub use lookup::{LookupStrategy, TemperatureSource};
pub use physical::PhysicalStrategy;

use std::path::PathBuf;

use swi_common::{GridError, GriddedField};
use thiserror::Error;

pub const KELVIN_OFFSET: f64 = 273.15;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("required input field missing: {0}")]
    MissingInput(&'static str),

    #[error("input fields are on different grids")]
    GridMismatch,

    #[error("grid too small for finite differences ({nlat}x{nlon})")]
    GridTooSmall { nlat: usize, nlon: usize },

    #[error("failed to read calibration table {path}")]
    CalibrationIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("calibration table line {line}: {reason}")]
    CalibrationParse { line: usize, reason: String },

    #[error("calibration table is not a complete grid: {0}")]
    CalibrationGrid(String),

    #[error("grid construction: {0}")]
    Grid(#[from] GridError),
}

/// Upstream variables a strategy needs fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchVariable {
    SurfaceTemp,
    Temp850,
    Wind10m,
    Cape,
    WaterTemp,
}

/// Decoded model fields handed to a strategy. Only the fields the
/// chosen strategy listed as required are guaranteed present.
#[derive(Debug, Default, Clone)]
pub struct IndexInputs {
    pub surface_temp: Option<GriddedField>,
    pub temp_850: Option<GriddedField>,
    pub wind_u10: Option<GriddedField>,
    pub wind_v10: Option<GriddedField>,
    pub cape: Option<GriddedField>,
    pub water_temp: Option<GriddedField>,
}

/// One way of turning raw model fields into the index field.
pub trait IndexStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Variables the fetcher must retrieve for this strategy.
    fn required_variables(&self) -> Vec<FetchVariable>;

    /// Derive the index field. The result shares the inputs' grid;
    /// non-finite inputs yield non-finite or sentinel outputs, never a
    /// panic.
    fn derive(&self, inputs: &IndexInputs) -> Result<GriddedField, IndexError>;
}

pub(crate) fn require<'a>(
    field: &'a Option<GriddedField>,
    name: &'static str,
) -> Result<&'a GriddedField, IndexError> {
    field.as_ref().ok_or(IndexError::MissingInput(name))
}

pub(crate) fn celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Cloud-depth proxy in kilometres: sqrt(max(CAPE, 0)) / 10.
/// NaN stays NaN; `f64::max` would otherwise swallow it.
pub(crate) fn depth_km(cape: f64) -> f64 {
    if cape.is_nan() {
        return f64::NAN;
    }
    cape.max(0.0).sqrt() / 10.0
}
