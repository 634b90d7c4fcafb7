//! Archive packaging.
//!
//! Tiles are JPEG-encoded and appended to a ZIP container under
//! `z/y/x.jpg` entry names, followed by the manifest as the final entry.
//! Entry names use forward slashes regardless of host OS, and tile
//! entries are stored uncompressed since the payloads are already JPEG.
//!
//! One [`TileEncoder`] instance is reused for every tile of a run; a
//! single failed tile aborts the whole operation (the partially written
//! archive stays on disk, callers delete and retry).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::TileError;
use crate::pyramid::TileSink;

use super::manifest::IMAGEINFO_XML;

/// JPEG compression quality for tile payloads (percent).
pub const JPEG_QUALITY: u8 = 75;

// =============================================================================
// Tile Encoder
// =============================================================================

/// JPEG encoder for tile buffers.
///
/// The encoder only accepts canonical buffers (8-bit gray or 24-bit RGB);
/// anything else escaped the pixel adapter and is rejected. Progressive
/// output is not available in the underlying encoder, so tiles are
/// baseline JPEG.
#[derive(Debug, Clone)]
pub struct TileEncoder {
    quality: u8,
}

impl TileEncoder {
    /// Create an encoder at the standard tile quality.
    pub fn new() -> Self {
        TileEncoder {
            quality: JPEG_QUALITY,
        }
    }

    /// Encode one tile to JPEG.
    ///
    /// `context` names the tile (`z/y/x`) for error reporting.
    ///
    /// # Errors
    ///
    /// [`TileError::PixelFormat`] for non-canonical buffers,
    /// [`TileError::Encode`] when the encoder itself fails.
    pub fn encode(&self, tile: &DynamicImage, context: &str) -> Result<Bytes, TileError> {
        if !matches!(
            tile,
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)
        ) {
            return Err(TileError::PixelFormat {
                message: format!("cannot encode buffer of type {:?}", tile.color()),
            });
        }
        let mut output = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
        tile.write_with_encoder(encoder)
            .map_err(|e| TileError::Encode {
                context: context.to_string(),
                message: e.to_string(),
            })?;
        Ok(Bytes::from(output))
    }
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Archive Writer
// =============================================================================

/// Append-only writer for a pyramid archive.
pub struct ArchiveWriter {
    zip: ZipWriter<BufWriter<File>>,
    options: SimpleFileOptions,
}

impl ArchiveWriter {
    /// Create the archive file, including missing parent directories.
    pub fn create(path: &Path) -> Result<Self, TileError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        info!("Saving tiles in {}", path.display());
        let file = File::create(path)?;
        Ok(ArchiveWriter {
            zip: ZipWriter::new(BufWriter::new(file)),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        })
    }

    /// Append one named entry.
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<(), TileError> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(data)?;
        Ok(())
    }

    /// Append the manifest as the final entry and close the archive.
    pub fn finish(mut self, manifest_xml: &str) -> Result<(), TileError> {
        self.add_entry(IMAGEINFO_XML, manifest_xml.as_bytes())?;
        let mut inner = self.zip.finish()?;
        inner.flush()?;
        Ok(())
    }
}

// =============================================================================
// Tile Packager
// =============================================================================

/// [`TileSink`] that encodes tiles and appends them to the archive.
///
/// The tile counter is atomic: the write path is single-threaded today,
/// but the counter is the piece a per-level parallelization would share.
pub struct TilePackager {
    archive: ArchiveWriter,
    encoder: TileEncoder,
    tiles_written: AtomicU32,
}

impl TilePackager {
    /// Wrap an open archive.
    pub fn new(archive: ArchiveWriter) -> Self {
        TilePackager {
            archive,
            encoder: TileEncoder::new(),
            tiles_written: AtomicU32::new(0),
        }
    }

    /// Number of tiles written so far.
    pub fn tiles_written(&self) -> u32 {
        self.tiles_written.load(Ordering::Relaxed)
    }

    /// Append the manifest and close the archive.
    pub fn finish(self, manifest_xml: &str) -> Result<(), TileError> {
        self.archive.finish(manifest_xml)
    }
}

impl TileSink for TilePackager {
    fn write_tile(
        &mut self,
        z: u32,
        x: u32,
        y: u32,
        tile: &DynamicImage,
    ) -> Result<(), TileError> {
        let name = format!("{z}/{y}/{x}.jpg");
        let data = self.encoder.encode(tile, &name)?;
        self.archive.add_entry(&name, &data)?;
        self.tiles_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
