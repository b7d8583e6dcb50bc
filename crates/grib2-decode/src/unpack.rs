//! Simple packing (template 5.0) unpacking.
//!
//! Unpacking formula: value = (R + X * 2^E) * 10^(-D), where R is the
//! reference value, X the packed integer, E the binary scale factor
//! and D the decimal scale factor.

use crate::error::Grib2Error;

/// Unpack simple-packed data into one value per grid point.
///
/// `grid_points` is the full grid size (Ni * Nj). When a bitmap is
/// present, the packed stream holds values only for points flagged
/// present; missing points come back as `None`. With zero bits per
/// value every present point is the reference value.
pub fn unpack_simple(
    packed: &[u8],
    grid_points: usize,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<Option<f32>>, Grib2Error> {
    if bits_per_value > 32 {
        return Err(Grib2Error::Unpacking(format!(
            "{} bits per value exceeds the 32-bit limit",
            bits_per_value
        )));
    }

    let binary_scale = 2.0_f32.powi(i32::from(binary_scale_factor));
    let decimal_scale = 10.0_f32.powi(-i32::from(decimal_scale_factor));
    let width = bits_per_value as usize;

    let mut values = Vec::with_capacity(grid_points);
    let mut bit_position = 0;

    for point in 0..grid_points {
        if !bitmap_has_value(bitmap, point) {
            values.push(None);
            continue;
        }

        let value = if width == 0 {
            reference_value * decimal_scale
        } else {
            let packed_value = read_bits(packed, bit_position, width)?;
            bit_position += width;
            (reference_value + packed_value as f32 * binary_scale) * decimal_scale
        };
        values.push(Some(value));
    }

    Ok(values)
}

/// Whether the bitmap flags a grid point as carrying a value.
/// No bitmap means every point does.
fn bitmap_has_value(bitmap: Option<&[u8]>, point: usize) -> bool {
    match bitmap {
        Some(bm) => {
            let byte = point / 8;
            byte < bm.len() && (bm[byte] >> (7 - point % 8)) & 1 == 1
        }
        None => true,
    }
}

/// Read an MSB-first bit field of up to 32 bits.
fn read_bits(data: &[u8], start_bit: usize, width: usize) -> Result<u32, Grib2Error> {
    debug_assert!(width > 0 && width <= 32);

    let end_bit = start_bit + width;
    let first_byte = start_bit / 8;
    let last_byte = (end_bit + 7) / 8;

    if last_byte > data.len() {
        return Err(Grib2Error::Unpacking(format!(
            "packed data ends at byte {} but bit {} was requested",
            data.len(),
            end_bit
        )));
    }

    // A 32-bit field spans at most five bytes, which fits in a u64.
    let mut acc = 0u64;
    for &byte in &data[first_byte..last_byte] {
        acc = (acc << 8) | u64::from(byte);
    }

    let trailing = last_byte * 8 - end_bit;
    Ok(((acc >> trailing) & ((1u64 << width) - 1)) as u32)
}
