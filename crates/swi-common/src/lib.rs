//! Common types shared across the SWI overlay pipeline.

pub mod bbox;
pub mod cycle;
pub mod error;
pub mod grid;
pub mod metadata;

pub use bbox::BoundingBox;
pub use cycle::{ForecastCycle, CYCLE_STEP_HOURS};
pub use error::{GridError, GridResult};
pub use grid::GriddedField;
pub use metadata::{Bounds, OverlayMetadata};
