//! Tiling orchestration.
//!
//! [`ImageTiler`] is the public entry point: it probes the EXIF
//! orientation, opens the decoder, selects a build strategy, streams
//! tiles into the archive packager, and appends the manifest. One call
//! produces one `.iview2` archive; no state survives between calls.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::archive::{tiled_file_path, write_manifest, ArchiveWriter, PyramidProps, TilePackager};
use crate::error::TileError;
use crate::pyramid::{zoom_levels, PyramidBuilder, Strategy, DEFAULT_MEMORY_SAVING_THRESHOLD};
use crate::source::{read_exif_orientation, ImageFileDecoder, RegionDecoder, RegionReader};

/// Lifecycle hook invoked around decoder acquisition.
///
/// Both callbacks fire exactly once per [`ImageTiler::tile_with`] call;
/// `post_image_reader_created` fires even when opening the decoder fails.
/// All methods default to no-ops.
pub trait TileEventHandler {
    /// Called before the image decoder is created.
    fn pre_image_reader_created(&self) {}

    /// Called after decoder creation was attempted, successful or not.
    fn post_image_reader_created(&self) {}
}

/// Tiles one source image into a pyramid archive.
pub struct ImageTiler {
    image_file: PathBuf,
    derivate: Option<String>,
    image_path: String,
    tile_dir: PathBuf,
    threshold: u64,
}

impl ImageTiler {
    /// Create a tiler for `image_file`.
    ///
    /// `derivate` is the derivative the image belongs to (if any) and
    /// `image_path` its path relative to the derivative root; both feed
    /// the output path resolution and the manifest.
    pub fn new(image_file: PathBuf, derivate: Option<String>, image_path: String) -> Self {
        ImageTiler {
            image_file,
            derivate,
            image_path,
            tile_dir: PathBuf::from("."),
            threshold: DEFAULT_MEMORY_SAVING_THRESHOLD,
        }
    }

    /// Set the base directory the archive is resolved against.
    pub fn set_tile_dir(&mut self, tile_dir: PathBuf) {
        self.tile_dir = tile_dir;
    }

    /// Override the pixel-count threshold for strategy selection.
    pub fn set_memory_saving_threshold(&mut self, threshold: u64) {
        self.threshold = threshold;
    }

    /// The archive path this tiler writes to.
    pub fn tiled_file(&self) -> PathBuf {
        tiled_file_path(&self.tile_dir, self.derivate.as_deref(), &self.image_path)
    }

    /// Tile the image. Same as [`Self::tile_with`] without a hook.
    pub fn tile(&self) -> Result<PyramidProps, TileError> {
        self.tile_with(None)
    }

    /// Tile the image, invoking `hook` around decoder acquisition.
    ///
    /// Returns the pyramid properties that were also written to the
    /// manifest. On failure the partially written archive may remain on
    /// disk; callers delete and retry.
    pub fn tile_with(
        &self,
        hook: Option<&dyn TileEventHandler>,
    ) -> Result<PyramidProps, TileError> {
        let start = Instant::now();
        info!(
            "Start tiling of {}:{}",
            self.derivate.as_deref().unwrap_or(""),
            self.image_path
        );

        let orientation = read_exif_orientation(&self.image_file);

        if let Some(hook) = hook {
            hook.pre_image_reader_created();
        }
        let opened = ImageFileDecoder::open(&self.image_file);
        if let Some(hook) = hook {
            hook.post_image_reader_created();
        }
        let mut decoder = opened?;

        let (physical_width, physical_height) = decoder.dimensions()?;
        let (logical_width, logical_height) =
            orientation.logical_dimensions(physical_width, physical_height);
        let zoom_level = zoom_levels(logical_width, logical_height);

        let archive = ArchiveWriter::create(&self.tiled_file())?;
        let mut packager = TilePackager::new(archive);
        let mut reader =
            RegionReader::new(&mut decoder, orientation, logical_width, logical_height);
        let strategy = Strategy::select(logical_width, logical_height, self.threshold);
        PyramidBuilder::new(logical_width, logical_height, strategy)
            .build(&mut reader, &mut packager)?;

        let props = PyramidProps {
            width: logical_width,
            height: logical_height,
            zoom_level,
            tiles_count: packager.tiles_written(),
        };
        let manifest = write_manifest(&props, self.derivate.as_deref(), &self.image_path)?;
        packager.finish(&manifest)?;

        let elapsed = start.elapsed();
        let pixels = logical_width as u64 * logical_height as u64;
        let throughput = pixels as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1e6;
        info!(
            "Finished tiling of {}:{} in {:.0} ms ({throughput:.0} MPixel/s).",
            self.derivate.as_deref().unwrap_or(""),
            self.image_path,
            elapsed.as_secs_f64() * 1e3
        );
        Ok(props)
    }
}

/// Derive the CLI's tile directory and relative image path for an input.
///
/// Absolute inputs tile next to the image using the bare filename;
/// relative inputs tile into the current directory using the input path
/// verbatim.
pub fn resolve_cli_input(image_file: &Path) -> (PathBuf, String) {
    if image_file.is_absolute() {
        let file_name = image_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = image_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (parent, file_name)
    } else {
        (
            PathBuf::from("."),
            image_file.to_string_lossy().into_owned(),
        )
    }
}
