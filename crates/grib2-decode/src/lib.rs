//! GRIB2 decoding (WMO FM 92 GRIB Edition 2).
//!
//! Decodes the subset responses served by the NOMADS grib-filter
//! endpoint: one or more concatenated messages, each a regular lat/lon
//! grid (template 3.0) with simple packing (template 5.0). A message
//! can be read section by section or turned directly into a normalized
//! [`GriddedField`].

pub mod error;
pub mod sections;
pub mod unpack;

pub use error::Grib2Error;
pub use unpack::unpack_simple;

use bytes::Bytes;
use swi_common::GriddedField;
use tracing::debug;

use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};

/// One decoded GRIB2 message.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid: GridDefinition,
    pub product: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
}

impl Grib2Message {
    fn parse(message: &[u8]) -> Result<Self, Grib2Error> {
        let indicator = sections::parse_indicator(message)?;
        let identification = sections::parse_identification(message)?;
        let grid = sections::parse_grid_definition(message)?;
        let product = sections::parse_product_definition(message, indicator.discipline)?;
        let data_representation = sections::parse_data_representation(message)?;
        let bitmap = sections::parse_bitmap(message)?;
        let data_section = sections::parse_data_section(message)?;

        Ok(Self {
            indicator,
            identification,
            grid,
            product,
            data_representation,
            bitmap,
            data_section,
        })
    }

    pub fn discipline(&self) -> u8 {
        self.indicator.discipline
    }

    /// Parameter short name, e.g. `TMP` or `CAPE`.
    pub fn parameter(&self) -> &str {
        &self.product.parameter_short_name
    }

    /// Grid dimensions as (rows, columns).
    pub fn grid_dims(&self) -> (usize, usize) {
        (
            self.grid.num_points_latitude as usize,
            self.grid.num_points_longitude as usize,
        )
    }

    /// Unpack the data section into one value per grid point, in the
    /// message's native scan order. Missing points are `None`.
    pub fn values(&self) -> Result<Vec<Option<f32>>, Grib2Error> {
        if self.data_representation.packing_template != 0 {
            return Err(Grib2Error::UnsupportedPacking {
                template: self.data_representation.packing_template,
            });
        }

        let (nj, ni) = self.grid_dims();
        let grid_points = nj * ni;

        // Without a bitmap the packed point count must cover the grid.
        if self.bitmap.is_none() && (self.data_representation.num_data_points as usize) != grid_points
        {
            return Err(Grib2Error::InvalidSection {
                section: 5,
                reason: format!(
                    "{} data points for a {}x{} grid",
                    self.data_representation.num_data_points, nj, ni
                ),
            });
        }

        unpack::unpack_simple(
            &self.data_section.data,
            grid_points,
            self.data_representation.bits_per_value,
            self.data_representation.reference_value,
            self.data_representation.binary_scale_factor,
            self.data_representation.decimal_scale_factor,
            self.bitmap.as_ref().map(|b| b.data.as_ref()),
        )
    }

    /// Decode into a [`GriddedField`] with ascending axes and
    /// longitudes in -180..180. Missing points become NaN.
    pub fn to_field(&self) -> Result<GriddedField, Grib2Error> {
        if !self.grid.is_row_major() {
            return Err(Grib2Error::InvalidSection {
                section: 3,
                reason: "only row-major scan order is supported".to_string(),
            });
        }

        let values: Vec<f64> = self
            .values()?
            .into_iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect();

        let field = GriddedField::new(
            self.grid.longitude_axis(),
            self.grid.latitude_axis(),
            values,
        )?;

        Ok(field.normalized()?)
    }
}

/// Sequential reader over a buffer of concatenated GRIB2 messages.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
}

impl Grib2Reader {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Decode the next message, or `Ok(None)` once the buffer holds no
    /// further `GRIB` indicator.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        let remaining = &self.data[self.offset.min(self.data.len())..];

        let start = match remaining.windows(4).position(|w| w == b"GRIB") {
            Some(pos) => self.offset + pos,
            None => return Ok(None),
        };

        let indicator = sections::parse_indicator(&self.data[start..])?;

        // Shortest possible message: 16-byte indicator plus the final
        // 7777 marker.
        if indicator.message_length < 20 {
            return Err(Grib2Error::InvalidFormat(format!(
                "message length {} is too short",
                indicator.message_length
            )));
        }

        let end = start + indicator.message_length;
        if end > self.data.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "message claims {} bytes but only {} remain",
                indicator.message_length,
                self.data.len() - start
            )));
        }
        if &self.data[end - 4..end] != b"7777" {
            return Err(Grib2Error::InvalidFormat(
                "message does not end with 7777".to_string(),
            ));
        }

        let message = Grib2Message::parse(&self.data[start..end])?;
        self.offset = end;

        debug!(
            parameter = %message.product.parameter_short_name,
            level = %message.product.level_description,
            forecast_hour = message.product.forecast_hour,
            "decoded GRIB2 message"
        );

        Ok(Some(message))
    }
}
