//! Ordered value classification.

use crate::color::Rgba;
use crate::RenderError;

/// Equal-length breakpoints and colors. Color `k` owns the half-open
/// interval `[levels[k], levels[k+1])`; the last class is unbounded
/// above. Values below `levels[0]` and non-finite values fall into
/// class 0, which is required to be fully transparent.
#[derive(Debug, Clone)]
pub struct ClassificationScheme {
    levels: Vec<f64>,
    colors: Vec<Rgba>,
}

impl ClassificationScheme {
    pub fn new<S: AsRef<str>>(levels: Vec<f64>, colors: &[S]) -> Result<Self, RenderError> {
        if levels.is_empty() || levels.len() != colors.len() {
            return Err(RenderError::SchemeLengthMismatch {
                levels: levels.len(),
                colors: colors.len(),
            });
        }
        if levels.len() > 256 {
            return Err(RenderError::TooManyClasses(levels.len()));
        }
        if !levels.windows(2).all(|w| w[1] > w[0]) {
            return Err(RenderError::LevelsNotAscending);
        }

        let colors = colors
            .iter()
            .map(|hex| {
                Rgba::from_hex(hex.as_ref())
                    .ok_or_else(|| RenderError::InvalidColor(hex.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !colors[0].is_transparent() {
            return Err(RenderError::OpaqueFirstColor);
        }

        Ok(Self { levels, colors })
    }

    /// Class index for a value. A breakpoint belongs to the class it
    /// opens: with levels [0, 10, 20], the value 10 is class 1.
    pub fn classify(&self, value: f64) -> usize {
        if !value.is_finite() || value < self.levels[0] {
            return 0;
        }
        self.levels.partition_point(|&level| level <= value) - 1
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn palette(&self) -> &[Rgba] {
        &self.colors
    }

    pub fn class_count(&self) -> usize {
        self.levels.len()
    }
}
