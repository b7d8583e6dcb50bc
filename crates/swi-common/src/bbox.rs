//! Geographic bounding box for subset requests and overlay placement.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
///
/// Longitudes use the -180..180 convention; the box must not cross the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Create a bounding box, validating edge ordering and latitude range.
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, BboxError> {
        let bbox = Self {
            west,
            east,
            south,
            north,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse a "west,east,south,north" string (the `--bbox` CLI form).
    pub fn from_arg_string(s: &str) -> Result<Self, BboxError> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(BboxError::InvalidFormat(s.to_string()));
        }

        let mut edges = [0.0_f64; 4];
        for (slot, part) in edges.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| BboxError::InvalidNumber(part.trim().to_string()))?;
        }

        Self::new(edges[0], edges[1], edges[2], edges[3])
    }

    /// Check edge ordering and latitude range.
    pub fn validate(&self) -> Result<(), BboxError> {
        if self.west >= self.east {
            return Err(BboxError::EmptyExtent("west must be less than east"));
        }
        if self.south >= self.north {
            return Err(BboxError::EmptyExtent("south must be less than north"));
        }
        if self.south < -90.0 || self.north > 90.0 {
            return Err(BboxError::EmptyExtent("latitudes must lie in [-90, 90]"));
        }
        Ok(())
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Check whether a point falls inside the box (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxError {
    #[error("Invalid bbox format: {0}. Expected 'west,east,south,north'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),

    #[error("Degenerate bbox: {0}")]
    EmptyExtent(&'static str),
}
