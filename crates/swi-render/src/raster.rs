//! Field-to-raster conversion.

use swi_common::GriddedField;
use tracing::debug;

use crate::classify::ClassificationScheme;
use crate::png;
use crate::RenderError;

/// Classify every grid cell into palette indices in image scanline
/// order: one pixel per cell, image row 0 at the northernmost
/// latitude. The field's latitude axis is ascending, so rows are
/// walked in reverse.
pub fn classify_field(field: &GriddedField, scheme: &ClassificationScheme) -> Vec<u8> {
    let nlat = field.nlat();
    let nlon = field.nlon();

    let mut indices = Vec::with_capacity(nlat * nlon);
    for y in 0..nlat {
        let j = nlat - 1 - y;
        for i in 0..nlon {
            indices.push(scheme.classify(field.get(j, i)) as u8);
        }
    }
    indices
}

/// Render the index field to indexed PNG bytes.
pub fn render_field(
    field: &GriddedField,
    scheme: &ClassificationScheme,
) -> Result<Vec<u8>, RenderError> {
    let indices = classify_field(field, scheme);
    let image = png::encode_indexed(field.nlon(), field.nlat(), scheme.palette(), &indices)?;

    debug!(
        width = field.nlon(),
        height = field.nlat(),
        classes = scheme.class_count(),
        bytes = image.len(),
        "encoded overlay raster"
    );

    Ok(image)
}
