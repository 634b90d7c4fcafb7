//! iview-tiler - A tile pyramid generator for deep-zoom viewers.
//!
//! This library converts a single raster image into a multi-resolution
//! tile pyramid packaged as one `.iview2` archive: a ZIP container of
//! 256x256 JPEG tiles named `z/y/x.jpg` plus an `imageinfo.xml` manifest.

pub mod archive;
pub mod config;
pub mod error;
pub mod orientation;
pub mod pyramid;
pub mod source;
pub mod tiler;

// Re-export commonly used types
pub use archive::{
    derivate_base_dir, read_manifest, tiled_file_path, write_manifest, ArchiveWriter,
    PyramidProps, TileEncoder, TilePackager, ARCHIVE_SUFFIX, IMAGEINFO_XML, JPEG_QUALITY,
};
pub use config::Config;
pub use error::TileError;
pub use orientation::{
    apply_transform, physical_to_logical, to_physical, Affine, Orientation,
};
pub use pyramid::{
    tile_bounds, tile_count, tiles_across, zoom_levels, PyramidBuilder, Rect, Strategy,
    TileSink, DEFAULT_MEMORY_SAVING_THRESHOLD, MEGA_STRIP_ROWS, TILE_SIZE,
};
pub use source::{
    classify, normalize, read_exif_orientation, ImageFileDecoder, PixelFormat, RegionDecoder,
    RegionReader,
};
pub use tiler::{resolve_cli_input, ImageTiler, TileEventHandler};
