//! Classification and rasterization of the index field.
//!
//! Maps a continuous [`swi_common::GriddedField`] through an ordered
//! color classification and encodes the result as an indexed PNG with
//! an alpha palette. Encoding is deterministic: the same field and
//! scheme always produce byte-identical output.

pub mod classify;
pub mod color;
pub mod png;
pub mod raster;

pub use classify::ClassificationScheme;
pub use color::Rgba;
pub use raster::render_field;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid hex color: {0}")]
    InvalidColor(String),

    #[error("levels and colors must have equal nonzero length ({levels} levels, {colors} colors)")]
    SchemeLengthMismatch { levels: usize, colors: usize },

    #[error("classification levels must be strictly ascending")]
    LevelsNotAscending,

    #[error("the first color must be fully transparent")]
    OpaqueFirstColor,

    #[error("at most 256 classes are supported, got {0}")]
    TooManyClasses(usize),

    #[error("{indices} indices for a {width}x{height} raster")]
    DimensionMismatch {
        indices: usize,
        width: usize,
        height: usize,
    },

    #[error("IDAT compression failed: {0}")]
    Compression(#[from] std::io::Error),
}
