//! Gridded scalar fields on a regular latitude/longitude grid.

use crate::error::{GridError, GridResult};

/// Direction of a strictly monotonic axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisOrder {
    Ascending,
    Descending,
}

/// A scalar field sampled on a rectilinear lat/lon grid.
///
/// Values are stored row-major, latitude-outermost: index `j * nlon + i`
/// holds the sample at `(latitudes[j], longitudes[i])`. Missing samples are
/// NaN. Both axes are strictly monotonic; construction accepts either
/// direction, and [`GriddedField::normalized`] reorders to ascending axes
/// with longitudes in the -180..180 convention.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    longitudes: Vec<f64>,
    latitudes: Vec<f64>,
    values: Vec<f64>,
}

impl GriddedField {
    pub fn new(
        longitudes: Vec<f64>,
        latitudes: Vec<f64>,
        values: Vec<f64>,
    ) -> GridResult<Self> {
        if longitudes.is_empty() {
            return Err(GridError::EmptyAxis { axis: "longitude" });
        }
        if latitudes.is_empty() {
            return Err(GridError::EmptyAxis { axis: "latitude" });
        }
        if values.len() != longitudes.len() * latitudes.len() {
            return Err(GridError::ShapeMismatch {
                nlat: latitudes.len(),
                nlon: longitudes.len(),
                nvalues: values.len(),
            });
        }
        axis_order(&longitudes, "longitude")?;
        axis_order(&latitudes, "latitude")?;

        Ok(Self {
            longitudes,
            latitudes,
            values,
        })
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn nlon(&self) -> usize {
        self.longitudes.len()
    }

    pub fn nlat(&self) -> usize {
        self.latitudes.len()
    }

    /// Flat index of grid position (latitude row `j`, longitude column `i`).
    pub fn index(&self, j: usize, i: usize) -> usize {
        j * self.longitudes.len() + i
    }

    /// Sample at latitude row `j`, longitude column `i`.
    pub fn get(&self, j: usize, i: usize) -> f64 {
        self.values[self.index(j, i)]
    }

    /// Whether two fields share identical axes (and therefore shape).
    pub fn same_axes(&self, other: &Self) -> bool {
        self.longitudes == other.longitudes && self.latitudes == other.latitudes
    }

    /// Reorder to strictly ascending axes with -180..180 longitudes.
    ///
    /// Model output scans north to south with 0-360 longitudes; downstream
    /// consumers require ascending axes aligned with the configured bounding
    /// box. Longitudes above 180 are rebased by -360 first, then rows and
    /// columns are flipped as needed. Fails if an axis is not strictly
    /// monotonic after rebasing (e.g. a subset crossing the antimeridian).
    pub fn normalized(mut self) -> GridResult<Self> {
        for lon in &mut self.longitudes {
            if *lon > 180.0 {
                *lon -= 360.0;
            }
        }

        if axis_order(&self.longitudes, "longitude")? == AxisOrder::Descending {
            self.longitudes.reverse();
            let nlon = self.longitudes.len();
            for row in self.values.chunks_mut(nlon) {
                row.reverse();
            }
        }

        if axis_order(&self.latitudes, "latitude")? == AxisOrder::Descending {
            self.latitudes.reverse();
            let nlon = self.longitudes.len();
            let nlat = self.latitudes.len();
            for j in 0..nlat / 2 {
                let (top, bottom) = self.values.split_at_mut((nlat - 1 - j) * nlon);
                top[j * nlon..(j + 1) * nlon].swap_with_slice(&mut bottom[..nlon]);
            }
        }

        Ok(self)
    }
}

/// Determine the direction of a strictly monotonic axis.
fn axis_order(axis: &[f64], name: &'static str) -> GridResult<AxisOrder> {
    if axis.len() < 2 {
        return Ok(AxisOrder::Ascending);
    }

    let ascending = axis[1] > axis[0];
    let strict = axis
        .windows(2)
        .all(|w| if ascending { w[1] > w[0] } else { w[1] < w[0] });

    if !strict {
        return Err(GridError::NonMonotonicAxis { axis: name });
    }

    Ok(if ascending {
        AxisOrder::Ascending
    } else {
        AxisOrder::Descending
    })
}
