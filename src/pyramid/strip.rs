//! Megatile strip cascade.
//!
//! The memory-saving strategy never materializes a full level. Strips of
//! the full-resolution level stream into a cascade of per-level
//! accumulators: each accumulator gathers rows of its level, and whenever
//! a complete tile-row band ([`TILE_SIZE`] rows) is available it emits
//! that band's tiles, halves the band, and feeds the result to the level
//! below. A level whose height is odd ends in a band with a single
//! trailing row (the "1-pixel megatile rest") which is halved on its
//! own so the next level still receives its full ceiling height.
//!
//! Bands always start at a multiple of [`TILE_SIZE`], so tile rows and
//! halving pairs stay aligned without any padding.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::TileError;

use super::builder::{halve, TileSink};
use super::geometry::{tile_bounds, tiles_across, zoom_levels, TILE_SIZE};

/// Rows per emitted band. Bands align with tile rows.
const FLUSH_ROWS: u32 = TILE_SIZE;

/// A contiguous run of rows of one level, starting at `start_row`.
struct Band {
    image: DynamicImage,
    start_row: u32,
}

/// Streaming accumulator pipeline over all levels of a pyramid.
pub struct StripCascade {
    /// Indexed by zoom level; the last entry is the full-resolution level.
    accumulators: Vec<LevelAccumulator>,
}

impl StripCascade {
    /// Create a cascade for an image of the given logical dimensions.
    pub fn new(logical_width: u32, logical_height: u32) -> Self {
        let top = zoom_levels(logical_width, logical_height);
        let mut dims = vec![(logical_width, logical_height)];
        for _ in 0..top {
            let (w, h) = dims[dims.len() - 1];
            dims.push((w.div_ceil(2), h.div_ceil(2)));
        }
        // dims[i] holds level top-i; accumulators are indexed by level.
        dims.reverse();
        let accumulators = dims
            .into_iter()
            .enumerate()
            .map(|(level, (width, height))| LevelAccumulator {
                level: level as u32,
                width,
                height,
                next_row: 0,
                pending: None,
            })
            .collect();
        StripCascade { accumulators }
    }

    fn top_level(&self) -> u32 {
        self.accumulators.len() as u32 - 1
    }

    /// Feed a strip of full-resolution rows into the cascade.
    ///
    /// Emits every tile that becomes complete, at this level and below.
    pub fn push_strip<S: TileSink>(
        &mut self,
        strip: DynamicImage,
        sink: &mut S,
    ) -> Result<(), TileError> {
        self.push(self.top_level(), strip, sink)
    }

    fn push<S: TileSink>(
        &mut self,
        level: u32,
        band: DynamicImage,
        sink: &mut S,
    ) -> Result<(), TileError> {
        let mut carry = Some((level, band));
        while let Some((level, band)) = carry.take() {
            let accumulator = &mut self.accumulators[level as usize];
            accumulator.append(band)?;
            let mut halved = Vec::new();
            while let Some(chunk) = accumulator.take_band(false)? {
                emit_band_tiles(&chunk, level, sink)?;
                if level > 0 {
                    halved.push(halve(&chunk.image));
                }
            }
            if let Some(merged) = merge_bands(halved)? {
                carry = Some((level - 1, merged));
            }
        }
        Ok(())
    }

    /// Flush every remaining band, top level first.
    ///
    /// After this call every level has emitted exactly its tile rows; the
    /// level-0 accumulator holds at most one tile by construction.
    pub fn finish<S: TileSink>(&mut self, sink: &mut S) -> Result<(), TileError> {
        for level in (0..self.accumulators.len()).rev() {
            let mut halved = Vec::new();
            let accumulator = &mut self.accumulators[level];
            while let Some(chunk) = accumulator.take_band(true)? {
                emit_band_tiles(&chunk, level as u32, sink)?;
                if level > 0 {
                    halved.push(halve(&chunk.image));
                }
            }
            if accumulator.next_row != accumulator.height {
                return Err(TileError::Internal(format!(
                    "level {level} incomplete: {} of {} rows emitted",
                    accumulator.next_row, accumulator.height
                )));
            }
            if level > 0 {
                if let Some(merged) = merge_bands(halved)? {
                    self.accumulators[level - 1].append(merged)?;
                }
            }
        }
        Ok(())
    }
}

/// Rows gathered for a single level.
struct LevelAccumulator {
    level: u32,
    width: u32,
    height: u32,
    /// First row not yet emitted.
    next_row: u32,
    pending: Option<DynamicImage>,
}

impl LevelAccumulator {
    fn append(&mut self, band: DynamicImage) -> Result<(), TileError> {
        if band.width() != self.width {
            return Err(TileError::Internal(format!(
                "level {}: band width {} does not match level width {}",
                self.level,
                band.width(),
                self.width
            )));
        }
        let pending_height = self.pending.as_ref().map_or(0, DynamicImage::height);
        if self.next_row + pending_height + band.height() > self.height {
            return Err(TileError::Internal(format!(
                "level {}: accumulated rows exceed level height {}",
                self.level, self.height
            )));
        }
        self.pending = Some(match self.pending.take() {
            None => band,
            Some(pending) => vconcat(&pending, &band)?,
        });
        Ok(())
    }

    /// Split off the next band: a full tile row, or on the final flush the
    /// trailing partial row band (the 1-pixel rest in the extreme case).
    fn take_band(&mut self, final_flush: bool) -> Result<Option<Band>, TileError> {
        let pending_height = match &self.pending {
            Some(pending) => pending.height(),
            None => return Ok(None),
        };
        let is_last = self.next_row + pending_height == self.height;
        let band_height = if pending_height >= FLUSH_ROWS {
            FLUSH_ROWS
        } else if final_flush && is_last {
            pending_height
        } else {
            return Ok(None);
        };
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let band = pending.crop_imm(0, 0, self.width, band_height);
        let rest = pending_height - band_height;
        if rest > 0 {
            self.pending = Some(pending.crop_imm(0, band_height, self.width, rest));
        }
        let start_row = self.next_row;
        self.next_row += band_height;
        Ok(Some(Band {
            image: band,
            start_row,
        }))
    }
}

/// Emit the tiles of one band in ascending x order.
fn emit_band_tiles<S: TileSink>(band: &Band, level: u32, sink: &mut S) -> Result<(), TileError> {
    if band.start_row % TILE_SIZE != 0 {
        return Err(TileError::Internal(format!(
            "band at row {} is not tile-aligned",
            band.start_row
        )));
    }
    let tile_y = band.start_row / TILE_SIZE;
    let width = band.image.width();
    let height = band.image.height();
    for x in 0..tiles_across(width) {
        let bounds = tile_bounds(width, height, x, 0);
        if bounds.is_empty() {
            continue;
        }
        let tile = band
            .image
            .crop_imm(bounds.x, bounds.y, bounds.width, bounds.height);
        sink.write_tile(level, x, tile_y, &tile)?;
    }
    Ok(())
}

/// Concatenate bands vertically into one image.
fn merge_bands(bands: Vec<DynamicImage>) -> Result<Option<DynamicImage>, TileError> {
    let mut bands = bands.into_iter();
    let Some(first) = bands.next() else {
        return Ok(None);
    };
    let mut merged = first;
    for band in bands {
        merged = vconcat(&merged, &band)?;
    }
    Ok(Some(merged))
}

/// Stack `bottom` below `top`. Both must share one canonical form.
fn vconcat(top: &DynamicImage, bottom: &DynamicImage) -> Result<DynamicImage, TileError> {
    let width = top.width();
    let height = top.height() + bottom.height();
    match (top, bottom) {
        (DynamicImage::ImageLuma8(t), DynamicImage::ImageLuma8(b)) => {
            let mut canvas = GrayImage::new(width, height);
            image::imageops::replace(&mut canvas, t, 0, 0);
            image::imageops::replace(&mut canvas, b, 0, t.height() as i64);
            Ok(DynamicImage::ImageLuma8(canvas))
        }
        (DynamicImage::ImageRgb8(t), DynamicImage::ImageRgb8(b)) => {
            let mut canvas = RgbImage::new(width, height);
            image::imageops::replace(&mut canvas, t, 0, 0);
            image::imageops::replace(&mut canvas, b, 0, t.height() as i64);
            Ok(DynamicImage::ImageRgb8(canvas))
        }
        _ => Err(TileError::Internal(
            "strip cascade received mixed pixel formats".into(),
        )),
    }
}
