//! Calibration-lookup index strategy.
//!
//! Maps each grid cell's (ΔT, ΔZ) coordinate through the calibration
//! table. ΔZ is the CAPE-derived cloud-depth proxy converted to feet
//! to match the table's units.

use serde::{Deserialize, Serialize};
use swi_common::GriddedField;
use tracing::debug;

use crate::{
    celsius, depth_km, require, CalibrationTable, FetchVariable, IndexError, IndexInputs,
    IndexStrategy,
};

pub const KM_TO_FEET: f64 = 3280.84;

/// Which field supplies the base temperature for ΔT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureSource {
    #[default]
    Surface,
    Water,
}

pub struct LookupStrategy {
    table: CalibrationTable,
    source: TemperatureSource,
    /// Substituted when (ΔT, ΔZ) falls outside the sampled rectangle.
    sentinel: f64,
}

impl LookupStrategy {
    pub fn new(table: CalibrationTable, source: TemperatureSource, sentinel: f64) -> Self {
        Self {
            table,
            source,
            sentinel,
        }
    }
}

impl IndexStrategy for LookupStrategy {
    fn name(&self) -> &'static str {
        "lookup"
    }

    fn required_variables(&self) -> Vec<FetchVariable> {
        let base = match self.source {
            TemperatureSource::Surface => FetchVariable::SurfaceTemp,
            TemperatureSource::Water => FetchVariable::WaterTemp,
        };
        vec![base, FetchVariable::Temp850, FetchVariable::Cape]
    }

    fn derive(&self, inputs: &IndexInputs) -> Result<GriddedField, IndexError> {
        let base = match self.source {
            TemperatureSource::Surface => require(&inputs.surface_temp, "surface temperature")?,
            TemperatureSource::Water => require(&inputs.water_temp, "water temperature")?,
        };
        let t_850 = require(&inputs.temp_850, "850 mb temperature")?;
        let cape = require(&inputs.cape, "CAPE")?;

        if !base.same_axes(t_850) || !base.same_axes(cape) {
            return Err(IndexError::GridMismatch);
        }

        let mut misses = 0usize;
        let values: Vec<f64> = base
            .values()
            .iter()
            .zip(t_850.values())
            .zip(cape.values())
            .map(|((&low, &upper), &cape)| {
                let dt = celsius(low) - celsius(upper);
                let dz_ft = depth_km(cape) * KM_TO_FEET;
                self.table.sample(dt, dz_ft).unwrap_or_else(|| {
                    misses += 1;
                    self.sentinel
                })
            })
            .collect();

        if misses > 0 {
            debug!(misses, "calibration domain misses substituted with sentinel");
        }

        Ok(GriddedField::new(
            base.longitudes().to_vec(),
            base.latitudes().to_vec(),
            values,
        )?)
    }
}
