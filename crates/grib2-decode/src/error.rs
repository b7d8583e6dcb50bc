//! Error types for GRIB2 decoding.

use swi_common::GridError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Grib2Error {
    #[error("invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("unsupported data representation template 5.{template}")]
    UnsupportedPacking { template: u16 },

    #[error("unpacking failed: {0}")]
    Unpacking(String),

    #[error("grid construction: {0}")]
    Grid(#[from] GridError),
}
