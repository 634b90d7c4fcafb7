//! Configuration for the tiler CLI.
//!
//! Options come from command-line arguments via clap, with environment
//! fallbacks under an `IVIEW_` prefix and sensible defaults everywhere
//! else.
//!
//! # Environment Variables
//!
//! - `IVIEW_TILE_DIR` - Base directory for generated archives
//! - `IVIEW_THRESHOLD` - Pixel count above which the memory-saving
//!   strategy is used

use std::path::PathBuf;

use clap::Parser;

use crate::pyramid::DEFAULT_MEMORY_SAVING_THRESHOLD;

/// Tile a raster image into a deep-zoom pyramid archive (`.iview2`).
///
/// The archive lands next to an absolute input image, or under the
/// current directory for a relative input; `--tile-dir` overrides either.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path of the image to tile.
    pub image: Option<PathBuf>,

    /// Derivative identifier the image belongs to.
    pub derivate: Option<String>,

    /// Base directory for the generated archive.
    ///
    /// Defaults to the image's parent directory for absolute inputs and
    /// the current directory otherwise.
    #[arg(long, env = "IVIEW_TILE_DIR")]
    pub tile_dir: Option<PathBuf>,

    /// Pixel count above which the memory-saving strategy is selected.
    #[arg(long, default_value_t = DEFAULT_MEMORY_SAVING_THRESHOLD, env = "IVIEW_THRESHOLD")]
    pub threshold: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.image.is_none() {
            return Err("Please specify an image to tile.".to_string());
        }
        if self.threshold == 0 {
            return Err("threshold must be greater than 0".to_string());
        }
        Ok(())
    }
}
