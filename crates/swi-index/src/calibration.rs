//! Calibration table loading and interpolation.
//!
//! The table is a CSV of (ΔT, ΔZ) → index samples. Loading validates
//! that the samples form a complete rectilinear grid over the cross
//! product of the distinct ΔT and ΔZ coordinates, which makes bilinear
//! interpolation well defined everywhere inside the sampled rectangle.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::IndexError;

const REQUIRED_COLUMNS: [&str; 3] = ["dt_c", "dz_ft", "swi"];

/// Validated rectilinear (ΔT, ΔZ) → index sample grid.
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    dt_axis: Vec<f64>,
    dz_axis: Vec<f64>,
    /// Row-major over [dt][dz].
    values: Vec<f64>,
}

impl CalibrationTable {
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let text = fs::read_to_string(path).map_err(|source| IndexError::CalibrationIo {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse(&text)?;
        info!(
            path = %path.display(),
            dt_steps = table.dt_axis.len(),
            dz_steps = table.dz_axis.len(),
            "loaded calibration table"
        );
        Ok(table)
    }

    /// Parse CSV text: a header naming at least `dt_c`, `dz_ft` and
    /// `swi` (any column order), then one sample per line. Empty lines
    /// and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, IndexError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (header_line, header) = lines
            .next()
            .ok_or_else(|| IndexError::CalibrationParse {
                line: 0,
                reason: "empty table".to_string(),
            })?;

        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let mut indices = [0usize; 3];
        for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = columns.iter().position(|&c| c == name).ok_or_else(|| {
                IndexError::CalibrationParse {
                    line: header_line,
                    reason: format!("missing column {}", name),
                }
            })?;
        }
        let [dt_col, dz_col, swi_col] = indices;

        let mut samples = Vec::new();
        for (line_no, line) in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let mut parse = |col: usize, name: &str| -> Result<f64, IndexError> {
                fields
                    .get(col)
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IndexError::CalibrationParse {
                        line: line_no,
                        reason: format!("bad {} value", name),
                    })
            };

            let dt = parse(dt_col, "dt_c")?;
            let dz = parse(dz_col, "dz_ft")?;
            let swi = parse(swi_col, "swi")?;
            samples.push((dt, dz, swi));
        }

        Self::from_samples(samples)
    }

    fn from_samples(samples: Vec<(f64, f64, f64)>) -> Result<Self, IndexError> {
        if samples.is_empty() {
            return Err(IndexError::CalibrationGrid("no samples".to_string()));
        }

        let dt_axis = distinct_sorted(samples.iter().map(|s| s.0));
        let dz_axis = distinct_sorted(samples.iter().map(|s| s.1));

        let expected = dt_axis.len() * dz_axis.len();
        if samples.len() != expected {
            return Err(IndexError::CalibrationGrid(format!(
                "{} samples for a {}x{} coordinate grid",
                samples.len(),
                dt_axis.len(),
                dz_axis.len()
            )));
        }

        let mut values = vec![None; expected];
        for (dt, dz, swi) in samples {
            // Coordinates came out of the axis vectors, so exact
            // equality finds them.
            let i = dt_axis.iter().position(|&a| a == dt).unwrap_or(0);
            let j = dz_axis.iter().position(|&a| a == dz).unwrap_or(0);
            let slot = &mut values[i * dz_axis.len() + j];
            if slot.is_some() {
                return Err(IndexError::CalibrationGrid(format!(
                    "duplicate sample at dt={}, dz={}",
                    dt, dz
                )));
            }
            *slot = Some(swi);
        }

        let values = values
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                IndexError::CalibrationGrid("missing grid combinations".to_string())
            })?;

        Ok(Self {
            dt_axis,
            dz_axis,
            values,
        })
    }

    /// Bilinear interpolation at (ΔT, ΔZ). `None` outside the sampled
    /// rectangle or for non-finite queries; a query exactly on a
    /// sample node returns that sample's value.
    pub fn sample(&self, dt: f64, dz: f64) -> Option<f64> {
        let (i0, i1, tx) = bracket(&self.dt_axis, dt)?;
        let (j0, j1, ty) = bracket(&self.dz_axis, dz)?;

        let v00 = self.value(i0, j0);
        let v10 = self.value(i1, j0);
        let v01 = self.value(i0, j1);
        let v11 = self.value(i1, j1);

        let low = lerp(v00, v10, tx);
        let high = lerp(v01, v11, tx);
        Some(lerp(low, high, ty))
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.dz_axis.len() + j]
    }
}

fn distinct_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.collect();
    out.sort_by(f64::total_cmp);
    out.dedup();
    out
}

/// Find the axis interval containing `x` and the interpolation weight
/// within it.
fn bracket(axis: &[f64], x: f64) -> Option<(usize, usize, f64)> {
    let last = axis.len() - 1;
    if !x.is_finite() || x < axis[0] || x > axis[last] {
        return None;
    }
    if axis.len() == 1 {
        return Some((0, 0, 0.0));
    }

    let hi = axis.partition_point(|&a| a < x).clamp(1, last);
    let lo = hi - 1;
    let span = axis[hi] - axis[lo];
    let t = if span == 0.0 { 0.0 } else { (x - axis[lo]) / span };
    Some((lo, hi, t))
}

/// Endpoint-exact linear interpolation.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}
