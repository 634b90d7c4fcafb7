use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while tiling an image into a pyramid archive.
#[derive(Debug, Error)]
pub enum TileError {
    /// No decoder accepts the source image.
    #[error("no image decoder accepts {path:?}: {message}")]
    InputNotDecodable { path: PathBuf, message: String },

    /// Filesystem error while reading the source or writing the archive.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive container could not be written.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A tile could not be encoded to JPEG.
    #[error("JPEG encoding failed for tile {context}: {message}")]
    Encode { context: String, message: String },

    /// The decoded pixel buffer is of a form the adapter cannot resolve.
    #[error("unsupported pixel format: {message}")]
    PixelFormat { message: String },

    /// The archive manifest could not be written or parsed.
    #[error("manifest error: {message}")]
    Manifest { message: String },

    /// A broken internal invariant (impossible orientation code, misaligned
    /// strip boundary). These indicate a bug, not a bad input.
    #[error("internal error: {0}")]
    Internal(String),
}
