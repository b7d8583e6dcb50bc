//! GRIB2 section parsing.
//!
//! A GRIB2 message is a sequence of numbered sections between the
//! `GRIB` indicator and the `7777` end marker. These parsers cover the
//! sections the grib-filter endpoint actually emits: identification,
//! lat/lon grid definition (template 3.0), product definition
//! (template 4.0), simple packing (template 5.0), bitmap, and data.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Grib2Error;

/// Section 0: Indicator (16 bytes).
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: usize,
}

/// Section 1: Identification.
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub reference_time: DateTime<Utc>,
}

/// Section 3: Grid Definition, template 3.0 (regular lat/lon).
///
/// Coordinates are converted from the wire's microdegrees to degrees.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    /// Ni, points along a parallel.
    pub num_points_longitude: u32,
    /// Nj, points along a meridian.
    pub num_points_latitude: u32,
    pub first_latitude: f64,
    pub first_longitude: f64,
    pub last_latitude: f64,
    pub last_longitude: f64,
    pub lon_increment: f64,
    pub lat_increment: f64,
    pub scanning_mode: u8,
}

impl GridDefinition {
    /// Longitude of each column, following the i-scan direction flag.
    pub fn longitude_axis(&self) -> Vec<f64> {
        let step = if self.scanning_mode & 0x80 != 0 {
            -self.lon_increment
        } else {
            self.lon_increment
        };
        (0..self.num_points_longitude)
            .map(|i| self.first_longitude + step * f64::from(i))
            .collect()
    }

    /// Latitude of each row. Flag bit 0x40 clear means rows scan
    /// north to south, the usual model output order.
    pub fn latitude_axis(&self) -> Vec<f64> {
        let step = if self.scanning_mode & 0x40 != 0 {
            self.lat_increment
        } else {
            -self.lat_increment
        };
        (0..self.num_points_latitude)
            .map(|j| self.first_latitude + step * f64::from(j))
            .collect()
    }

    /// Whether adjacent points in the i direction are consecutive in
    /// the data stream.
    pub fn is_row_major(&self) -> bool {
        self.scanning_mode & 0x20 == 0
    }
}

/// Section 4: Product Definition.
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub level_type: u8,
    pub level_value: u32,
    pub level_description: String,
    pub forecast_hour: u32,
}

/// Section 5: Data Representation.
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub packing_template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap (only present when some grid points carry no value).
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub data: Bytes,
}

/// Section 7: Data.
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

/// Parse Section 0 from the start of a message.
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "missing GRIB magic bytes".to_string(),
        ));
    }

    // Octet 7: discipline, octet 8: edition, octets 9-16: total
    // message length as a 64-bit big-endian integer.
    let discipline = data[6];
    let edition = data[7];
    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]) as usize;

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "expected GRIB edition 2, got {}",
            edition
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification).
pub fn parse_identification(message: &[u8]) -> Result<Identification, Grib2Error> {
    let offset = find_section(message, 1)?;
    let section = &message[offset..];

    if section.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "not enough data".to_string(),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte).
    let body = &section[5..];

    let center = u16::from_be_bytes([body[0], body[1]]);
    let sub_center = u16::from_be_bytes([body[2], body[3]]);

    let year = u16::from_be_bytes([body[7], body[8]]);
    let month = body[9];
    let day = body[10];
    let hour = body[11];
    let minute = body[12];
    let second = body[13];

    let reference_time = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "invalid reference time: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
    })
}

/// Parse Section 3 (Grid Definition). Only template 3.0 is accepted;
/// the subset endpoint never returns anything else for this model.
pub fn parse_grid_definition(message: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let offset = find_section(message, 3)?;
    let section = &message[offset..];

    if section.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "not enough data".to_string(),
        });
    }

    let template = u16::from_be_bytes([section[12], section[13]]);
    if template != 0 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("unsupported grid definition template 3.{}", template),
        });
    }

    // Template 3.0 layout, offsets relative to the template start:
    //   16-19  Ni (points along a parallel)
    //   20-23  Nj (points along a meridian)
    //   32-35  La1, first latitude (microdegrees, signed)
    //   36-39  Lo1, first longitude
    //   41-44  La2, last latitude
    //   45-48  Lo2, last longitude
    //   49-52  Di, i increment
    //   53-56  Dj, j increment
    //   57     scanning mode flags
    let gd = &section[14..];
    if gd.len() < 58 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("template 3.0 needs 58 bytes, got {}", gd.len()),
        });
    }

    let ni = u32::from_be_bytes([gd[16], gd[17], gd[18], gd[19]]);
    let nj = u32::from_be_bytes([gd[20], gd[21], gd[22], gd[23]]);
    let la1 = i32::from_be_bytes([gd[32], gd[33], gd[34], gd[35]]);
    let lo1 = i32::from_be_bytes([gd[36], gd[37], gd[38], gd[39]]);
    let la2 = i32::from_be_bytes([gd[41], gd[42], gd[43], gd[44]]);
    let lo2 = i32::from_be_bytes([gd[45], gd[46], gd[47], gd[48]]);
    let di = u32::from_be_bytes([gd[49], gd[50], gd[51], gd[52]]);
    let dj = u32::from_be_bytes([gd[53], gd[54], gd[55], gd[56]]);
    let scanning_mode = gd[57];

    const MICRO: f64 = 1e-6;

    Ok(GridDefinition {
        num_points_longitude: ni,
        num_points_latitude: nj,
        first_latitude: f64::from(la1) * MICRO,
        first_longitude: f64::from(lo1) * MICRO,
        last_latitude: f64::from(la2) * MICRO,
        last_longitude: f64::from(lo2) * MICRO,
        lon_increment: f64::from(di) * MICRO,
        lat_increment: f64::from(dj) * MICRO,
        scanning_mode,
    })
}

/// Parse Section 4 (Product Definition).
pub fn parse_product_definition(
    message: &[u8],
    discipline: u8,
) -> Result<ProductDefinition, Grib2Error> {
    let offset = find_section(message, 4)?;
    let section = &message[offset..];

    if section.len() < 28 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "not enough data".to_string(),
        });
    }

    // Template 4.0 layout:
    //   9      parameter category
    //   10     parameter number
    //   18-21  forecast time in units from octet 18 (hours here)
    //   22     type of first fixed surface
    //   23     scale factor of first fixed surface
    //   24-27  scaled value of first fixed surface
    let parameter_category = section[9];
    let parameter_number = section[10];
    let forecast_hour = u32::from_be_bytes([section[18], section[19], section[20], section[21]]);
    let level_type = section[22];
    let scaled_value = u32::from_be_bytes([section[24], section[25], section[26], section[27]]);

    // Scale factor is zero for every level this pipeline requests, so
    // the scaled value is the level value.
    let level_value = scaled_value;

    Ok(ProductDefinition {
        parameter_category,
        parameter_number,
        parameter_short_name: parameter_short_name(discipline, parameter_category, parameter_number),
        level_type,
        level_value,
        level_description: level_description(level_type, level_value),
        forecast_hour,
    })
}

/// Parse Section 5 (Data Representation).
pub fn parse_data_representation(message: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let offset = find_section(message, 5)?;
    let section = &message[offset..];

    if section.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "not enough data".to_string(),
        });
    }

    let num_data_points = u32::from_be_bytes([section[5], section[6], section[7], section[8]]);
    let packing_template = u16::from_be_bytes([section[9], section[10]]);

    // Template 5.0 fields. For other templates these bytes are
    // meaningless, but the reader refuses to unpack them anyway.
    let body = &section[11..];
    let reference_value = f32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    let binary_scale_factor = i16::from_be_bytes([body[4], body[5]]);
    let decimal_scale_factor = i16::from_be_bytes([body[6], body[7]]);
    let bits_per_value = body[8];

    Ok(DataRepresentation {
        num_data_points,
        packing_template,
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value,
    })
}

/// Parse Section 6 (Bitmap). Indicator 255 means every grid point has
/// a value, which is the normal case for model subset output.
pub fn parse_bitmap(message: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let offset = find_section(message, 6)?;
    let section = &message[offset..];

    if section.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "not enough data".to_string(),
        });
    }

    let length = u32::from_be_bytes([section[0], section[1], section[2], section[3]]) as usize;
    let indicator = section[5];

    match indicator {
        255 => Ok(None),
        0 => {
            let data = if length > 6 {
                Bytes::copy_from_slice(&section[6..length])
            } else {
                Bytes::new()
            };
            Ok(Some(Bitmap { data }))
        }
        other => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("unsupported bitmap indicator {}", other),
        }),
    }
}

/// Parse Section 7 (Data).
pub fn parse_data_section(message: &[u8]) -> Result<DataSection, Grib2Error> {
    let offset = find_section(message, 7)?;
    let section = &message[offset..];

    if section.len() < 5 {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "not enough data".to_string(),
        });
    }

    let length = u32::from_be_bytes([section[0], section[1], section[2], section[3]]) as usize;
    if length > section.len() {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "section length exceeds available data".to_string(),
        });
    }

    let data = if length > 5 {
        Bytes::copy_from_slice(&section[5..length])
    } else {
        Bytes::new()
    };

    Ok(DataSection { data })
}

/// Walk the section chain looking for a section number.
fn find_section(message: &[u8], wanted: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16;

    while offset + 5 <= message.len() {
        if &message[offset..offset + 4] == b"7777" {
            break;
        }

        let length = u32::from_be_bytes([
            message[offset],
            message[offset + 1],
            message[offset + 2],
            message[offset + 3],
        ]) as usize;

        if length < 5 || offset + length > message.len() {
            return Err(Grib2Error::InvalidSection {
                section: wanted,
                reason: "bad section length".to_string(),
            });
        }

        if message[offset + 4] == wanted {
            return Ok(offset);
        }

        offset += length;
    }

    Err(Grib2Error::InvalidSection {
        section: wanted,
        reason: "section not present".to_string(),
    })
}

/// Short name for the parameters this pipeline works with.
fn parameter_short_name(discipline: u8, category: u8, number: u8) -> String {
    match (discipline, category, number) {
        // Discipline 0: meteorological products
        (0, 0, 0) => "TMP".to_string(),
        (0, 0, 6) => "DPT".to_string(),
        (0, 1, 1) => "RH".to_string(),
        (0, 2, 2) => "UGRD".to_string(),
        (0, 2, 3) => "VGRD".to_string(),
        (0, 2, 22) => "GUST".to_string(),
        (0, 3, 0) => "PRES".to_string(),
        (0, 3, 1) => "PRMSL".to_string(),
        (0, 7, 6) => "CAPE".to_string(),
        (0, 7, 7) => "CIN".to_string(),
        // Discipline 10: oceanographic products
        (10, 3, 0) => "WTMP".to_string(),
        _ => format!("P{}_{}_{}", discipline, category, number),
    }
}

/// Human-readable level description.
fn level_description(level_type: u8, level_value: u32) -> String {
    match level_type {
        1 => "surface".to_string(),
        // Isobaric levels carry the value in Pa.
        100 => format!("{} mb", level_value / 100),
        101 => "mean sea level".to_string(),
        102 => format!("{} m above MSL", level_value),
        103 => format!("{} m above ground", level_value),
        _ => format!("level type {} value {}", level_type, level_value),
    }
}
