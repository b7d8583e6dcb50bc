//! Placement metadata published alongside the overlay raster.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Geographic bounds of the overlay, keyed for map-client consumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lon_w: f64,
    pub lon_e: f64,
    pub lat_s: f64,
    pub lat_n: f64,
}

impl From<&BoundingBox> for Bounds {
    fn from(bbox: &BoundingBox) -> Self {
        Self {
            lon_w: bbox.west,
            lon_e: bbox.east,
            lat_s: bbox.south,
            lat_n: bbox.north,
        }
    }
}

/// Sidecar document that tells a map client where and how to drape the
/// overlay: generation and cycle timestamps, geographic bounds, and the
/// classification thresholds the palette encodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMetadata {
    pub generated_utc: String,
    pub cycle_utc: String,
    pub bounds: Bounds,
    pub levels: Vec<f64>,
}

impl OverlayMetadata {
    pub fn new(
        generated: DateTime<Utc>,
        cycle: DateTime<Utc>,
        bbox: &BoundingBox,
        levels: Vec<f64>,
    ) -> Self {
        Self {
            generated_utc: iso8601_seconds(generated),
            cycle_utc: iso8601_seconds(cycle),
            bounds: Bounds::from(bbox),
            levels,
        }
    }

    /// Pretty-printed JSON bytes for publication.
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// ISO-8601 with seconds precision and a `Z` suffix.
fn iso8601_seconds(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}
