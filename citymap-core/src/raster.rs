use crate::{
    constants::{RASTER_CROP_ZOOM, RASTER_SIZE},
    error::RasterError,
};

use std::path::Path;

use tiny_skia::{Pixmap, Transform};
use tracing::{Level, event};

#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Edge length of the square bitmap, in pixels.
    pub size: u32,
    pub crop_zoom: f32,
    pub load_system_fonts: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        RasterOptions {
            size: RASTER_SIZE,
            crop_zoom: RASTER_CROP_ZOOM,
            load_system_fonts: true,
        }
    }
}

/// Fits the document into a square bitmap, scaled up by `crop_zoom` about
/// the center and cropped back to the bitmap size.
pub fn rasterize(markup: &str, options: &RasterOptions) -> Result<Pixmap, RasterError> {
    let opt = {
        let mut opt = usvg::Options::default();

        if options.load_system_fonts {
            opt.fontdb_mut().load_system_fonts();
        }

        opt
    };

    let tree = usvg::Tree::from_str(markup, &opt)?;

    let size = options.size;
    let mut pixmap = Pixmap::new(size, size).ok_or(RasterError::Pixmap {
        width: size,
        height: size,
    })?;

    let tree_size = tree.size();
    let zoom = if options.crop_zoom > 0.0 { options.crop_zoom } else { 1.0 };
    let scale = (size as f32 / tree_size.width()).min(size as f32 / tree_size.height()) * zoom;

    let half = size as f32 / 2.0;
    let transform = Transform::from_scale(scale, scale).post_translate(
        half - tree_size.width() * scale / 2.0,
        half - tree_size.height() * scale / 2.0,
    );

    resvg::render(&tree, transform, &mut pixmap.as_mut());

    event!(Level::DEBUG, "Rasterized {}x{} at scale {}", size, size, scale);

    Ok(pixmap)
}

pub fn save_png(markup: &str, path: &Path, options: &RasterOptions) -> Result<(), RasterError> {
    let pixmap = rasterize(markup, options)?;

    pixmap
        .save_png(path)
        .map_err(|err| RasterError::Encode(err.to_string()))
}
