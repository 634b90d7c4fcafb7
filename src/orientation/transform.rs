//! Logical/physical coordinate transforms.
//!
//! Region reads are planned in logical coordinates and executed in the
//! decoder's physical coordinate space. Two operations bridge the gap:
//!
//! - [`to_physical`] maps a logical rectangle to the physical rectangle
//!   that must be decoded to cover it.
//! - [`physical_to_logical`] yields the affine transform that re-orients
//!   the decoded physical pixels into logical order; [`apply_transform`]
//!   executes it with bilinear sampling.
//!
//! The eight orientation cases are fixed scale/translate/rotate
//! compositions. [`Affine`] concatenates operations the way transform
//! stacks conventionally do (right multiplication), and quadrant rotations
//! stay exact so re-orientation is a pure pixel permutation.

use image::DynamicImage;

use crate::error::TileError;
use crate::pyramid::geometry::Rect;

use super::Orientation;

// =============================================================================
// Affine Transform
// =============================================================================

/// A 2D affine transform.
///
/// Points map as `x' = m00*x + m01*y + m02`, `y' = m10*x + m11*y + m12`.
/// The mutating operations concatenate on the right: after `t.scale(..);
/// t.translate(..)`, applying `t` scales the result of the translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    m00: f64,
    m10: f64,
    m01: f64,
    m11: f64,
    m02: f64,
    m12: f64,
}

impl Affine {
    /// The identity transform.
    pub fn identity() -> Self {
        Affine {
            m00: 1.0,
            m10: 0.0,
            m01: 0.0,
            m11: 1.0,
            m02: 0.0,
            m12: 0.0,
        }
    }

    /// Concatenate a translation.
    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.m02 += self.m00 * tx + self.m01 * ty;
        self.m12 += self.m10 * tx + self.m11 * ty;
    }

    /// Concatenate a scale.
    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.m00 *= sx;
        self.m10 *= sx;
        self.m01 *= sy;
        self.m11 *= sy;
    }

    /// Concatenate a counter-clockwise rotation by `theta` radians.
    ///
    /// Quadrant rotations (where the sine or cosine is exactly ±1) take an
    /// exact path so the orientation compositions contain no rounding
    /// residue.
    pub fn rotate(&mut self, theta: f64) {
        let sin = theta.sin();
        if sin == 1.0 {
            self.rotate_quadrant(0.0, 1.0);
        } else if sin == -1.0 {
            self.rotate_quadrant(0.0, -1.0);
        } else {
            let cos = theta.cos();
            if cos == -1.0 {
                self.rotate_quadrant(-1.0, 0.0);
            } else if cos != 1.0 {
                self.rotate_quadrant(cos, sin);
            }
        }
    }

    fn rotate_quadrant(&mut self, cos: f64, sin: f64) {
        let m00 = self.m00;
        let m10 = self.m10;
        self.m00 = m00 * cos + self.m01 * sin;
        self.m01 = self.m01 * cos - m00 * sin;
        self.m10 = m10 * cos + self.m11 * sin;
        self.m11 = self.m11 * cos - m10 * sin;
    }

    /// Map a point through the transform.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m00 * x + self.m01 * y + self.m02,
            self.m10 * x + self.m11 * y + self.m12,
        )
    }

    /// The inverse transform, or `None` if the transform is singular.
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.m00 * self.m11 - self.m01 * self.m10;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Affine {
            m00: self.m11 / det,
            m01: -self.m01 / det,
            m02: (self.m01 * self.m12 - self.m11 * self.m02) / det,
            m10: -self.m10 / det,
            m11: self.m00 / det,
            m12: (self.m10 * self.m02 - self.m00 * self.m12) / det,
        })
    }
}

// =============================================================================
// Logical -> Physical Rectangle Mapping
// =============================================================================

/// Map a logical rectangle to the physical rectangle to decode.
///
/// `logical_width` and `logical_height` are the full logical image
/// dimensions; `logical` must lie within them. Width and height swap for
/// 90/270 rotations, mirroring flips the x origin, and each rotation case
/// shifts the origin against the logical extents.
pub fn to_physical(
    logical_width: u32,
    logical_height: u32,
    logical: Rect,
    orientation: Orientation,
) -> Rect {
    if orientation == Orientation::TopLeft {
        return logical;
    }
    let mut x = logical.x;
    let mut y = logical.y;
    let mut width = logical.width;
    let mut height = logical.height;
    if orientation.swaps_dimensions() {
        width = logical.height;
        height = logical.width;
    }
    if orientation.mirrored() {
        x = logical_width - (logical.x + logical.width);
    }
    match orientation.rotation_degrees() {
        0 => {}
        90 => {
            y = logical_width - logical.width - x;
            x = logical.y;
        }
        180 => {
            x = logical_width - logical.width - x;
            y = logical_height - logical.height - logical.y;
        }
        270 => {
            y = x;
            x = logical_height - logical.height - logical.y;
        }
        degrees => unreachable!("unsupported rotation: {degrees}"),
    }
    Rect::new(x, y, width, height)
}

// =============================================================================
// Physical -> Logical Pixel Transform
// =============================================================================

/// The affine transform that re-orients a decoded physical region.
///
/// `width` and `height` are the *physical* region dimensions (after the
/// swap applied by [`to_physical`]). Returns `None` when no transform is
/// required (EXIF 1).
pub fn physical_to_logical(orientation: Orientation, width: u32, height: u32) -> Option<Affine> {
    let w = width as f64;
    let h = height as f64;
    let mut transform = Affine::identity();
    match orientation {
        Orientation::TopLeft => return None,
        Orientation::TopRight => {
            transform.scale(-1.0, 1.0);
            transform.translate(-w, 0.0);
        }
        Orientation::BottomRight => {
            transform.translate(w, h);
            transform.rotate(std::f64::consts::PI);
        }
        Orientation::BottomLeft => {
            transform.scale(1.0, -1.0);
            transform.translate(0.0, -h);
        }
        Orientation::LeftTop => {
            transform.rotate(-std::f64::consts::FRAC_PI_2);
            transform.scale(-1.0, 1.0);
        }
        Orientation::RightTop => {
            transform.translate(h, 0.0);
            transform.rotate(std::f64::consts::FRAC_PI_2);
        }
        Orientation::RightBottom => {
            transform.scale(-1.0, 1.0);
            transform.translate(-h, 0.0);
            transform.translate(0.0, w);
            transform.rotate(1.5 * std::f64::consts::PI);
        }
        Orientation::LeftBottom => {
            transform.translate(0.0, w);
            transform.rotate(1.5 * std::f64::consts::PI);
        }
    }
    Some(transform)
}

/// Apply an affine transform to a decoded region with bilinear sampling.
///
/// The output buffer has the logical rectangle's dimensions. Destination
/// pixel centres are inverse-mapped into the source; for the quadrant
/// compositions above this degenerates to an exact permutation of the
/// source pixels.
///
/// # Errors
///
/// Returns [`TileError::Internal`] for a singular transform and
/// [`TileError::PixelFormat`] when the buffer is not in a canonical form.
pub fn apply_transform(
    transform: &Affine,
    source: &DynamicImage,
    out_width: u32,
    out_height: u32,
) -> Result<DynamicImage, TileError> {
    let inverse = transform
        .inverse()
        .ok_or_else(|| TileError::Internal("orientation transform is not invertible".into()))?;
    match source {
        DynamicImage::ImageLuma8(buffer) => {
            let samples = warp_plane(
                buffer.as_raw(),
                buffer.width(),
                buffer.height(),
                1,
                &inverse,
                out_width,
                out_height,
            );
            image::GrayImage::from_raw(out_width, out_height, samples)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| TileError::Internal("warped gray buffer has wrong size".into()))
        }
        DynamicImage::ImageRgb8(buffer) => {
            let samples = warp_plane(
                buffer.as_raw(),
                buffer.width(),
                buffer.height(),
                3,
                &inverse,
                out_width,
                out_height,
            );
            image::RgbImage::from_raw(out_width, out_height, samples)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| TileError::Internal("warped RGB buffer has wrong size".into()))
        }
        other => Err(TileError::PixelFormat {
            message: format!(
                "cannot re-orient non-canonical buffer {:?}",
                other.color()
            ),
        }),
    }
}

/// Inverse-map destination pixel centres and sample bilinearly.
fn warp_plane(
    samples: &[u8],
    src_width: u32,
    src_height: u32,
    channels: usize,
    inverse: &Affine,
    out_width: u32,
    out_height: u32,
) -> Vec<u8> {
    let mut out = vec![0u8; out_width as usize * out_height as usize * channels];
    let max_x = (src_width - 1) as f64;
    let max_y = (src_height - 1) as f64;
    for oy in 0..out_height {
        for ox in 0..out_width {
            let (sx, sy) = inverse.apply(ox as f64 + 0.5, oy as f64 + 0.5);
            let fx = (sx - 0.5).clamp(0.0, max_x);
            let fy = (sy - 0.5).clamp(0.0, max_y);
            let x0 = fx.floor() as u32;
            let y0 = fy.floor() as u32;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);
            let dx = fx - x0 as f64;
            let dy = fy - y0 as f64;
            let base = (oy as usize * out_width as usize + ox as usize) * channels;
            for channel in 0..channels {
                let at = |x: u32, y: u32| {
                    samples[(y as usize * src_width as usize + x as usize) * channels + channel]
                        as f64
                };
                let value = at(x0, y0) * (1.0 - dx) * (1.0 - dy)
                    + at(x1, y0) * dx * (1.0 - dy)
                    + at(x0, y1) * (1.0 - dx) * dy
                    + at(x1, y1) * dx * dy;
                out[base + channel] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}
