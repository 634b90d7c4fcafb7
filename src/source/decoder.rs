//! Source image decoding.
//!
//! This module defines the [`RegionDecoder`] trait, the contract the tiler
//! consumes for pixel access: report physical dimensions and decode
//! arbitrary sub-rectangles at native resolution. [`ImageFileDecoder`]
//! implements it on top of the image crate for every format that crate
//! registers.
//!
//! EXIF orientation is probed separately ([`read_exif_orientation`]) and
//! degrades to the identity orientation on any failure; a missing or
//! broken EXIF block never fails a tiling run.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use tracing::{error, info, warn};

use crate::error::TileError;
use crate::orientation::Orientation;
use crate::pyramid::geometry::Rect;

// =============================================================================
// RegionDecoder Trait
// =============================================================================

/// Pixel access contract consumed by the tiling engine.
///
/// Coordinates are *physical*: the pixel space the decoder stores, before
/// any orientation correction. Implementations are positioned on a single
/// image (no multi-frame handling).
pub trait RegionDecoder {
    /// Physical `(width, height)` of the source image.
    fn dimensions(&mut self) -> Result<(u32, u32), TileError>;

    /// Decode the given physical rectangle at native resolution.
    ///
    /// The rectangle must lie within [`Self::dimensions`].
    fn read_region(&mut self, region: Rect) -> Result<DynamicImage, TileError>;
}

// =============================================================================
// Image Crate Decoder
// =============================================================================

/// [`RegionDecoder`] backed by the image crate.
///
/// Dimensions come from the format header without decoding pixels. The
/// frame itself is decoded on the first region request and kept for the
/// lifetime of the decoder; region reads are sub-rect views of it. Whether
/// a region read touches more than the requested pixels is a property of
/// the format plugin behind this contract; the tiling strategies bound
/// every buffer they own regardless.
pub struct ImageFileDecoder {
    path: PathBuf,
    dimensions: (u32, u32),
    frame: Option<DynamicImage>,
}

impl ImageFileDecoder {
    /// Open a source image and read its dimensions.
    ///
    /// # Errors
    ///
    /// [`TileError::InputNotDecodable`] when no registered decoder accepts
    /// the file, [`TileError::Io`] when the file cannot be read at all.
    pub fn open(path: &Path) -> Result<Self, TileError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        if reader.format().is_none() {
            return Err(TileError::InputNotDecodable {
                path: path.to_path_buf(),
                message: "unrecognized image format".into(),
            });
        }
        let dimensions = reader
            .into_dimensions()
            .map_err(|e| TileError::InputNotDecodable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(ImageFileDecoder {
            path: path.to_path_buf(),
            dimensions,
            frame: None,
        })
    }

    fn frame(&mut self) -> Result<&DynamicImage, TileError> {
        if self.frame.is_none() {
            let decoded = ImageReader::open(&self.path)?
                .with_guessed_format()?
                .decode()
                .map_err(|e| TileError::InputNotDecodable {
                    path: self.path.clone(),
                    message: e.to_string(),
                })?;
            self.frame = Some(decoded);
        }
        match &self.frame {
            Some(frame) => Ok(frame),
            None => Err(TileError::Internal("decoded frame not retained".into())),
        }
    }
}

impl RegionDecoder for ImageFileDecoder {
    fn dimensions(&mut self) -> Result<(u32, u32), TileError> {
        Ok(self.dimensions)
    }

    fn read_region(&mut self, region: Rect) -> Result<DynamicImage, TileError> {
        let (width, height) = self.dimensions;
        if region.x + region.width > width || region.y + region.height > height {
            return Err(TileError::Internal(format!(
                "region {region:?} exceeds physical bounds {width}x{height}"
            )));
        }
        let frame = self.frame()?;
        Ok(frame.crop_imm(region.x, region.y, region.width, region.height))
    }
}

// =============================================================================
// EXIF Orientation Probe
// =============================================================================

/// Read the EXIF orientation of a source file.
///
/// Returns [`Orientation::TopLeft`] when the file carries no EXIF block,
/// the tag is absent, or reading fails for any reason. Metadata problems
/// degrade, they never abort a tiling run.
pub fn read_exif_orientation(path: &Path) -> Orientation {
    let orientation = match probe_exif_orientation(path) {
        Ok(Some(value)) => Orientation::from_exif(value).unwrap_or_else(|| {
            warn!("Ignoring out-of-range EXIF orientation {value} in {}", path.display());
            Orientation::TopLeft
        }),
        Ok(None) => Orientation::TopLeft,
        Err(e) => {
            error!("Error while reading image orientation of {}: {e}", path.display());
            Orientation::TopLeft
        }
    };
    info!("Orientation for {}: {orientation}", path.display());
    orientation
}

fn probe_exif_orientation(path: &Path) -> Result<Option<u32>, exif::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let metadata = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(metadata) => metadata,
        // A source without any EXIF block is the common case, not an error.
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(metadata
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0)))
}
