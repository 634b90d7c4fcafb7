//! Tile pyramid geometry and construction.

pub mod geometry;

mod builder;
mod strip;

pub use builder::{
    PyramidBuilder, Strategy, TileSink, DEFAULT_MEMORY_SAVING_THRESHOLD, MEGA_STRIP_ROWS,
};
pub use geometry::{tile_bounds, tile_count, tiles_across, zoom_levels, Rect, TILE_SIZE};
