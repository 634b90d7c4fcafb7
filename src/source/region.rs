//! Oriented region reads.
//!
//! [`RegionReader`] turns a logical rectangle into correctly oriented
//! canonical pixels: it maps the rectangle into physical space, decodes
//! it, normalizes the buffer, and re-orients it when the source carries a
//! non-identity EXIF orientation. At most one region is held in memory.

use image::DynamicImage;

use crate::error::TileError;
use crate::orientation::{apply_transform, physical_to_logical, to_physical, Orientation};
use crate::pyramid::geometry::Rect;

use super::decoder::RegionDecoder;
use super::pixels::{classify, normalize, PixelFormat};

/// Reads logical rectangles from a physically oriented source.
///
/// The canonical pixel form is classified from the first decoded region
/// and fixed for every subsequent read, so all tiles of a pyramid share
/// one form.
pub struct RegionReader<'a, D: RegionDecoder> {
    decoder: &'a mut D,
    orientation: Orientation,
    logical_width: u32,
    logical_height: u32,
    format: Option<PixelFormat>,
}

impl<'a, D: RegionDecoder> RegionReader<'a, D> {
    /// Create a reader over `decoder` with the given orientation and
    /// logical dimensions.
    pub fn new(
        decoder: &'a mut D,
        orientation: Orientation,
        logical_width: u32,
        logical_height: u32,
    ) -> Self {
        RegionReader {
            decoder,
            orientation,
            logical_width,
            logical_height,
            format: None,
        }
    }

    /// The canonical pixel form, once a region has been read.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.format
    }

    /// Read a logical rectangle as an oriented, canonical pixel buffer.
    ///
    /// The returned buffer has exactly `rect`'s dimensions.
    pub fn read(&mut self, rect: Rect) -> Result<DynamicImage, TileError> {
        let physical = to_physical(self.logical_width, self.logical_height, rect, self.orientation);
        let decoded = self.decoder.read_region(physical)?;
        let format = match self.format {
            Some(format) => format,
            None => {
                let format = classify(&decoded);
                self.format = Some(format);
                format
            }
        };
        let normalized = normalize(decoded, format);
        match physical_to_logical(self.orientation, physical.width, physical.height) {
            Some(transform) => apply_transform(&transform, &normalized, rect.width, rect.height),
            None => Ok(normalized),
        }
    }
}
