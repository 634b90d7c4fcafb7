//! Pyramid construction.
//!
//! Both build strategies share one outer contract: for every zoom level
//! from `Z` down to 0, produce all tiles of that level in row-major order,
//! halving the level image with bicubic resampling and ceiling dimensions
//! between levels. Level 0 always produces exactly one tile.
//!
//! # Strategies
//!
//! - **In-memory**: one full-image oriented read; every lower level is the
//!   halved predecessor; tiles are sub-views of the level image. Simple,
//!   and fine as long as the decoded image fits in memory.
//!
//! - **Memory-saving**: the full-resolution level is never materialized.
//!   The source is read in horizontal megatile strips which stream through
//!   a cascade of per-level accumulators (see [`super::strip`]). Tile
//!   count and per-tile pixel content match the in-memory strategy within
//!   resampling noise.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};

use crate::error::TileError;
use crate::source::{RegionDecoder, RegionReader};

use super::geometry::{tile_bounds, tiles_across, zoom_levels, Rect, TILE_SIZE};
use super::strip::StripCascade;

/// Rows per megatile strip at the full-resolution level.
///
/// A power-of-two multiple of [`TILE_SIZE`], large enough to amortise
/// decoder setup per strip and small enough to bound memory.
pub const MEGA_STRIP_ROWS: u32 = 4 * TILE_SIZE;

/// Default pixel count above which the memory-saving strategy is used.
///
/// 4096 x 4096. The exact value is not part of the behavioural contract;
/// both strategies produce equivalent pyramids.
pub const DEFAULT_MEMORY_SAVING_THRESHOLD: u64 = 4096 * 4096;

/// Receives finished tiles from a build run.
///
/// Implemented by the archive packager; any error aborts the build.
pub trait TileSink {
    /// Write the tile at `(z, x, y)`. The buffer is already oriented,
    /// canonical, and trimmed to the image extent.
    fn write_tile(&mut self, z: u32, x: u32, y: u32, tile: &DynamicImage)
        -> Result<(), TileError>;
}

/// How a pyramid is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Decode the whole image once and slice levels in memory.
    InMemory,
    /// Stream the full-resolution level in horizontal strips.
    MemorySaving {
        /// Strip height in pixels at the full-resolution level.
        mega_strip_rows: u32,
    },
}

impl Strategy {
    /// Select a strategy for an image of the given logical dimensions.
    pub fn select(width: u32, height: u32, threshold: u64) -> Strategy {
        if width as u64 * height as u64 > threshold {
            Strategy::MemorySaving {
                mega_strip_rows: MEGA_STRIP_ROWS,
            }
        } else {
            Strategy::InMemory
        }
    }
}

/// Drives the zoom-level loop for one image.
pub struct PyramidBuilder {
    logical_width: u32,
    logical_height: u32,
    strategy: Strategy,
}

impl PyramidBuilder {
    /// Create a builder for an image of the given logical dimensions.
    pub fn new(logical_width: u32, logical_height: u32, strategy: Strategy) -> Self {
        PyramidBuilder {
            logical_width,
            logical_height,
            strategy,
        }
    }

    /// Build every level, feeding each finished tile to `sink`.
    pub fn build<D: RegionDecoder, S: TileSink>(
        &self,
        reader: &mut RegionReader<'_, D>,
        sink: &mut S,
    ) -> Result<(), TileError> {
        let levels = zoom_levels(self.logical_width, self.logical_height);
        info!("Will generate {levels} zoom levels.");
        match self.strategy {
            Strategy::InMemory => self.build_in_memory(reader, sink, levels),
            Strategy::MemorySaving { mega_strip_rows } => {
                self.build_memory_saving(reader, sink, mega_strip_rows)
            }
        }
    }

    fn build_in_memory<D: RegionDecoder, S: TileSink>(
        &self,
        reader: &mut RegionReader<'_, D>,
        sink: &mut S,
        levels: u32,
    ) -> Result<(), TileError> {
        let mut level_image = reader.read(Rect::new(
            0,
            0,
            self.logical_width,
            self.logical_height,
        ))?;
        for z in (0..=levels).rev() {
            info!("Generating zoom level {z}");
            emit_level_tiles(&level_image, z, sink)?;
            if z > 0 {
                level_image = halve(&level_image);
            }
        }
        Ok(())
    }

    fn build_memory_saving<D: RegionDecoder, S: TileSink>(
        &self,
        reader: &mut RegionReader<'_, D>,
        sink: &mut S,
        mega_strip_rows: u32,
    ) -> Result<(), TileError> {
        let mut cascade = StripCascade::new(self.logical_width, self.logical_height);
        let mut row = 0;
        while row < self.logical_height {
            let strip_height = mega_strip_rows.min(self.logical_height - row);
            debug!(
                "Reading megatile strip at row {row} ({}x{strip_height})",
                self.logical_width
            );
            let strip = reader.read(Rect::new(0, row, self.logical_width, strip_height))?;
            cascade.push_strip(strip, sink)?;
            row += strip_height;
        }
        cascade.finish(sink)
    }
}

/// Emit all tiles of a fully materialized level in row-major order.
pub(crate) fn emit_level_tiles<S: TileSink>(
    image: &DynamicImage,
    z: u32,
    sink: &mut S,
) -> Result<(), TileError> {
    let tiles_y = tiles_across(image.height());
    let tiles_x = tiles_across(image.width());
    for y in 0..tiles_y {
        for x in 0..tiles_x {
            let bounds = tile_bounds(image.width(), image.height(), x, y);
            if bounds.is_empty() {
                continue;
            }
            let tile = image.crop_imm(bounds.x, bounds.y, bounds.width, bounds.height);
            sink.write_tile(z, x, y, &tile)?;
        }
    }
    Ok(())
}

/// Shrink an image to half size with ceiling dimensions.
pub(crate) fn halve(image: &DynamicImage) -> DynamicImage {
    let new_width = image.width().div_ceil(2);
    let new_height = image.height().div_ceil(2);
    debug!(
        "Scaling {}x{} to {new_width}x{new_height}",
        image.width(),
        image.height()
    );
    image.resize_exact(new_width, new_height, FilterType::CatmullRom)
}
