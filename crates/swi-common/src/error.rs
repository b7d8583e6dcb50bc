//! Shared error types for gridded-field handling.

use thiserror::Error;

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;

/// Errors raised when constructing or normalizing a gridded field.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Grid shape mismatch: {nlat} latitudes x {nlon} longitudes != {nvalues} values")]
    ShapeMismatch {
        nlat: usize,
        nlon: usize,
        nvalues: usize,
    },

    #[error("Grid {axis} axis is empty")]
    EmptyAxis { axis: &'static str },

    #[error("Grid {axis} axis is not strictly monotonic")]
    NonMonotonicAxis { axis: &'static str },
}
