//! Physical-formula index strategy.
//!
//! index = ΔT × depth_km × normalized convergence, where ΔT is the
//! surface-to-850 mb temperature differential in Celsius, depth_km a
//! CAPE-derived cloud-depth proxy, and convergence the negated
//! horizontal wind divergence scaled into [0, 1] by robust quantiles.

use swi_common::GriddedField;
use tracing::debug;

use crate::{celsius, depth_km, require, FetchVariable, IndexError, IndexInputs, IndexStrategy};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub struct PhysicalStrategy {
    quantile_low: f64,
    quantile_high: f64,
}

impl PhysicalStrategy {
    pub fn new(quantile_low: f64, quantile_high: f64) -> Self {
        Self {
            quantile_low,
            quantile_high,
        }
    }
}

impl Default for PhysicalStrategy {
    fn default() -> Self {
        Self::new(0.05, 0.95)
    }
}

impl IndexStrategy for PhysicalStrategy {
    fn name(&self) -> &'static str {
        "physical"
    }

    fn required_variables(&self) -> Vec<FetchVariable> {
        vec![
            FetchVariable::SurfaceTemp,
            FetchVariable::Temp850,
            FetchVariable::Wind10m,
            FetchVariable::Cape,
        ]
    }

    fn derive(&self, inputs: &IndexInputs) -> Result<GriddedField, IndexError> {
        let t_surface = require(&inputs.surface_temp, "surface temperature")?;
        let t_850 = require(&inputs.temp_850, "850 mb temperature")?;
        let u10 = require(&inputs.wind_u10, "10 m U wind")?;
        let v10 = require(&inputs.wind_v10, "10 m V wind")?;
        let cape = require(&inputs.cape, "CAPE")?;

        for other in [t_850, u10, v10, cape] {
            if !t_surface.same_axes(other) {
                return Err(IndexError::GridMismatch);
            }
        }

        let convergence = convergence(u10, v10)?;
        let conv01 = scale_to_unit(&convergence, self.quantile_low, self.quantile_high);

        let values: Vec<f64> = t_surface
            .values()
            .iter()
            .zip(t_850.values())
            .zip(cape.values())
            .zip(&conv01)
            .map(|(((&sfc, &upper), &cape), &conv)| {
                let dt = celsius(sfc) - celsius(upper);
                dt * depth_km(cape) * conv
            })
            .collect();

        debug!(
            nlat = t_surface.nlat(),
            nlon = t_surface.nlon(),
            "derived physical index field"
        );

        Ok(GriddedField::new(
            t_surface.longitudes().to_vec(),
            t_surface.latitudes().to_vec(),
            values,
        )?)
    }
}

/// Negated horizontal divergence of the 10 m wind.
///
/// Finite differences are taken in index space (centered at interior
/// points, one-sided at the edges) and converted to metric spacing:
/// dx = Δlon_rad · R · cos(lat), dy = Δlat_rad · R.
fn convergence(u: &GriddedField, v: &GriddedField) -> Result<Vec<f64>, IndexError> {
    let nlat = u.nlat();
    let nlon = u.nlon();
    if nlat < 2 || nlon < 2 {
        return Err(IndexError::GridTooSmall { nlat, nlon });
    }

    let lats = u.latitudes();
    let lons = u.longitudes();
    let dlon = lons[1] - lons[0];
    let dlat = lats[1] - lats[0];

    let dy = dlat.to_radians() * EARTH_RADIUS_M;
    let dx_per_row: Vec<f64> = lats
        .iter()
        .map(|lat| dlon.to_radians() * EARTH_RADIUS_M * lat.to_radians().cos())
        .collect();

    let mut result = vec![0.0; nlat * nlon];
    for j in 0..nlat {
        for i in 0..nlon {
            let dudx = gradient_lon(u, j, i) / dx_per_row[j];
            let dvdy = gradient_lat(v, j, i) / dy;
            result[u.index(j, i)] = -(dudx + dvdy);
        }
    }

    Ok(result)
}

/// Index-space slope along the longitude axis.
fn gradient_lon(field: &GriddedField, j: usize, i: usize) -> f64 {
    let last = field.nlon() - 1;
    if i == 0 {
        field.get(j, 1) - field.get(j, 0)
    } else if i == last {
        field.get(j, last) - field.get(j, last - 1)
    } else {
        (field.get(j, i + 1) - field.get(j, i - 1)) / 2.0
    }
}

/// Index-space slope along the latitude axis.
fn gradient_lat(field: &GriddedField, j: usize, i: usize) -> f64 {
    let last = field.nlat() - 1;
    if j == 0 {
        field.get(1, i) - field.get(0, i)
    } else if j == last {
        field.get(last, i) - field.get(last - 1, i)
    } else {
        (field.get(j + 1, i) - field.get(j - 1, i)) / 2.0
    }
}

/// Quantile of a sorted slice with linear interpolation between order
/// statistics.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64)
}

/// Robust rescale into [0, 1]: (x - q_lo) / (q_hi - q_lo + 1e-9),
/// clipped. Quantiles are taken over finite values only; NaN inputs
/// stay NaN.
fn scale_to_unit(values: &[f64], q_low: f64, q_high: f64) -> Vec<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(f64::total_cmp);

    let lo = quantile(&finite, q_low);
    let hi = quantile(&finite, q_high);
    let span = hi - lo + 1e-9;

    values
        .iter()
        .map(|&v| ((v - lo) / span).clamp(0.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(values: Vec<f64>) -> GriddedField {
        GriddedField::new(
            vec![-92.0, -91.0, -90.0],
            vec![40.0, 41.0, 42.0],
            values,
        )
        .unwrap()
    }

    fn inputs(
        t_surface: Vec<f64>,
        t_850: Vec<f64>,
        u: Vec<f64>,
        v: Vec<f64>,
        cape: Vec<f64>,
    ) -> IndexInputs {
        IndexInputs {
            surface_temp: Some(field(t_surface)),
            temp_850: Some(field(t_850)),
            wind_u10: Some(field(u)),
            wind_v10: Some(field(v)),
            cape: Some(field(cape)),
            water_temp: None,
        }
    }

    #[test]
    fn test_quantile_matches_linear_interpolation() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();

        assert!((quantile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&sorted, 1.0) - 10.0).abs() < 1e-12);
        assert!((quantile(&sorted, 0.5) - 5.5).abs() < 1e-12);
        // h = 9 * 0.05 = 0.45 between the first two order statistics
        assert!((quantile(&sorted, 0.05) - 1.45).abs() < 1e-12);
    }

    #[test]
    fn test_scale_to_unit_clips_and_skips_nan() {
        let values = vec![0.0, 10.0, f64::NAN];
        let scaled = scale_to_unit(&values, 0.05, 0.95);

        // lo = 0.5, hi = 9.5 for the two finite values
        assert_eq!(scaled[0], 0.0);
        assert_eq!(scaled[1], 1.0);
        assert!(scaled[2].is_nan());
    }

    #[test]
    fn test_derive_matches_hand_computed_reference() {
        // u constant kills the longitude term. v = j^2 per row gives
        // index-space slopes [1, 2, 3] along latitude, so convergence
        // is constant within each row: -1/dy, -2/dy, -3/dy.
        let t_surface = vec![283.15; 9];
        let t_850 = vec![277.15; 9]; // dt = 6 C
        let u = vec![3.0; 9];
        let v = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 4.0, 4.0, 4.0];
        let cape = vec![400.0; 9]; // depth = 2 km

        let index = PhysicalStrategy::default()
            .derive(&inputs(t_surface, t_850, u, v, cape))
            .unwrap();

        // Quantiles land on the row extremes, so rows scale to
        // [1, 0.5, 0] (up to the 1e-9 denominator guard) and the
        // index is 6 * 2 * that.
        for i in 0..3 {
            assert!((index.get(0, i) - 12.0).abs() < 5e-3, "{}", index.get(0, i));
            assert!((index.get(1, i) - 6.0).abs() < 5e-3, "{}", index.get(1, i));
            assert_eq!(index.get(2, i), 0.0);
        }
    }

    #[test]
    fn test_flat_temperature_differential_yields_zero() {
        let v = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 4.0, 4.0, 4.0];
        let index = PhysicalStrategy::default()
            .derive(&inputs(
                vec![280.0; 9],
                vec![280.0; 9],
                vec![3.0; 9],
                v,
                vec![400.0; 9],
            ))
            .unwrap();

        for &value in index.values() {
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn test_nan_cape_propagates() {
        let mut cape = vec![400.0; 9];
        cape[4] = f64::NAN;

        let v = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 4.0, 4.0, 4.0];
        let index = PhysicalStrategy::default()
            .derive(&inputs(
                vec![283.15; 9],
                vec![277.15; 9],
                vec![3.0; 9],
                v,
                cape,
            ))
            .unwrap();

        assert!(index.get(1, 1).is_nan());
        assert!(index.get(0, 0).is_finite());
    }

    #[test]
    fn test_missing_wind_is_reported() {
        let mut inputs = inputs(
            vec![283.15; 9],
            vec![277.15; 9],
            vec![3.0; 9],
            vec![0.0; 9],
            vec![400.0; 9],
        );
        inputs.wind_v10 = None;

        let err = PhysicalStrategy::default().derive(&inputs).unwrap_err();
        assert!(matches!(err, IndexError::MissingInput("10 m V wind")));
    }

    #[test]
    fn test_mismatched_grids_are_rejected() {
        let mut inputs = inputs(
            vec![283.15; 9],
            vec![277.15; 9],
            vec![3.0; 9],
            vec![0.0; 9],
            vec![400.0; 9],
        );
        inputs.cape = Some(
            GriddedField::new(vec![0.0, 1.0, 2.0], vec![40.0, 41.0, 42.0], vec![400.0; 9]).unwrap(),
        );

        let err = PhysicalStrategy::default().derive(&inputs).unwrap_err();
        assert!(matches!(err, IndexError::GridMismatch));
    }

    #[test]
    fn test_single_row_grid_is_rejected() {
        let tiny = GriddedField::new(vec![-92.0, -91.0], vec![40.0], vec![1.0, 2.0]).unwrap();
        let inputs = IndexInputs {
            surface_temp: Some(tiny.clone()),
            temp_850: Some(tiny.clone()),
            wind_u10: Some(tiny.clone()),
            wind_v10: Some(tiny.clone()),
            cape: Some(tiny),
            water_temp: None,
        };

        let err = PhysicalStrategy::default().derive(&inputs).unwrap_err();
        assert!(matches!(err, IndexError::GridTooSmall { nlat: 1, nlon: 2 }));
    }
}
