//! Pixel buffer canonicalization.
//!
//! Decoded buffers arrive in whatever form the decoder produces: 16-bit
//! TIFF samples, RGBA, palette-expanded indexed colour. Before encoding,
//! every buffer is coerced to one of two canonical forms: 8-bit gray or
//! 24-bit RGB. The target form is classified once per source image and
//! then applied to every region, so a pyramid never mixes forms.

use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

/// Canonical pixel forms a pyramid is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit single-channel gray.
    Gray8,
    /// 8-bit three-channel RGB.
    Rgb8,
}

/// Classify the canonical form for a decoded buffer.
///
/// Gray when the buffer is single-component (any bit depth), or when an
/// 8-bit RGB buffer is "fake gray": every pixel has R = G = B, the
/// palette-expanded shape of an indexed image whose colour map only holds
/// gray entries. Everything else becomes 24-bit RGB, including buffers
/// with more than 8 bits per channel.
pub fn classify(image: &DynamicImage) -> PixelFormat {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => PixelFormat::Gray8,
        DynamicImage::ImageRgb8(buffer) if is_fake_gray(buffer) => {
            info!("Image is gray scale but uses a colour map. Converting to gray scale");
            PixelFormat::Gray8
        }
        other => {
            let color = other.color();
            if color.bits_per_pixel() > 24 {
                info!(
                    "Converting image to 24 bit colour depth: colour depth {}",
                    color.bits_per_pixel()
                );
            }
            PixelFormat::Rgb8
        }
    }
}

/// Coerce a buffer to the canonical target form.
///
/// A no-op when the buffer already matches; otherwise converts through the
/// sRGB-targeted conversions of the image crate.
pub fn normalize(image: DynamicImage, target: PixelFormat) -> DynamicImage {
    match (target, &image) {
        (PixelFormat::Gray8, DynamicImage::ImageLuma8(_)) => image,
        (PixelFormat::Rgb8, DynamicImage::ImageRgb8(_)) => image,
        (PixelFormat::Gray8, _) => {
            debug!("Coercing {:?} buffer to 8 bit gray", image.color());
            DynamicImage::ImageLuma8(image.to_luma8())
        }
        (PixelFormat::Rgb8, _) => {
            debug!("Coercing {:?} buffer to 24 bit RGB", image.color());
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
    }
}

/// Whether every pixel of an RGB buffer has identical channel values.
fn is_fake_gray(buffer: &RgbImage) -> bool {
    buffer
        .pixels()
        .all(|pixel| pixel[0] == pixel[1] && pixel[1] == pixel[2])
}
