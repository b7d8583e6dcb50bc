//! Indexed PNG encoding (color type 3).
//!
//! One palette index per pixel with PLTE/tRNS carrying the colors and
//! alpha. The small fixed palette of the classification scheme makes
//! this both the smallest and the simplest encoding for overlay
//! rasters.

use std::io::Write;

use crate::color::Rgba;
use crate::RenderError;

/// Encode an indexed PNG.
///
/// `indices` are palette positions in scanline order (row 0 first),
/// exactly `width * height` of them.
pub fn encode_indexed(
    width: usize,
    height: usize,
    palette: &[Rgba],
    indices: &[u8],
) -> Result<Vec<u8>, RenderError> {
    if indices.len() != width * height {
        return Err(RenderError::DimensionMismatch {
            indices: indices.len(),
            width,
            height,
        });
    }

    let mut png = Vec::new();

    // PNG signature
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    // IHDR
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth: 8 bits per palette index
    ihdr.push(3); // color type: indexed
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    // PLTE
    let mut plte = Vec::with_capacity(palette.len() * 3);
    for color in palette {
        plte.push(color.r);
        plte.push(color.g);
        plte.push(color.b);
    }
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS, only when some entry is not fully opaque
    if palette.iter().any(|c| c.a < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c.a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    // IDAT
    let idat = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);

    // IEND
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Prefix each scanline with filter type 0 and zlib-compress.
fn deflate_scanlines(indices: &[u8], width: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    let mut raw = Vec::with_capacity(height * (1 + width));
    for y in 0..height {
        raw.push(0); // filter: none
        raw.extend_from_slice(&indices[y * width..(y + 1) * width]);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// Write one PNG chunk: length, type, data, CRC over type + data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
