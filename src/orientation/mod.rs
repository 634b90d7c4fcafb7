//! EXIF orientation handling.
//!
//! Cameras record the sensor pixels as captured and note the camera's
//! position in the EXIF `Orientation` tag (1..8). The tiler works in
//! *logical* coordinates (the image as the viewer sees it) and maps region
//! reads back into the decoder's *physical* coordinate space.
//!
//! This module defines the [`Orientation`] enum; [`transform`] holds the
//! rectangle mapping and the affine transform that re-orients decoded
//! pixels.

mod transform;

pub use transform::{apply_transform, physical_to_logical, to_physical, Affine};

/// Image orientation as encoded by the EXIF `Orientation` tag.
///
/// Each variant carries a rotation (clockwise degrees) and a horizontal
/// mirror flag. The discriminants equal the EXIF tag values 1..8, so the
/// ordinal invariant `Orientation::from_exif(k).exif_value() == k` holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Orientation {
    /// Row 0 at the visual top, column 0 at the visual left. No transform.
    #[default]
    TopLeft = 1,
    /// Mirrored horizontally.
    TopRight = 2,
    /// Rotated 180 degrees.
    BottomRight = 3,
    /// Mirrored horizontally and rotated 180 degrees.
    BottomLeft = 4,
    /// Mirrored horizontally and rotated 90 degrees clockwise.
    LeftTop = 5,
    /// Rotated 90 degrees clockwise.
    RightTop = 6,
    /// Mirrored horizontally and rotated 270 degrees clockwise.
    RightBottom = 7,
    /// Rotated 270 degrees clockwise.
    LeftBottom = 8,
}

impl Orientation {
    /// All variants in EXIF order (1..8).
    pub const VALUES: [Orientation; 8] = [
        Orientation::TopLeft,
        Orientation::TopRight,
        Orientation::BottomRight,
        Orientation::BottomLeft,
        Orientation::LeftTop,
        Orientation::RightTop,
        Orientation::RightBottom,
        Orientation::LeftBottom,
    ];

    /// Convert an EXIF orientation value to an `Orientation`.
    ///
    /// Returns `None` for values outside 1..8; the caller decides whether
    /// that degrades to [`Orientation::TopLeft`] (a missing or unreadable
    /// tag does) or is treated as an error.
    pub fn from_exif(value: u32) -> Option<Self> {
        if !(1..=8).contains(&value) {
            return None;
        }
        Some(Self::VALUES[(value - 1) as usize])
    }

    /// The EXIF tag value (1..8).
    pub fn exif_value(self) -> u32 {
        self as u32
    }

    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub fn rotation_degrees(self) -> u32 {
        match self {
            Orientation::TopLeft | Orientation::TopRight => 0,
            Orientation::BottomRight | Orientation::BottomLeft => 180,
            Orientation::LeftTop | Orientation::RightTop => 90,
            Orientation::RightBottom | Orientation::LeftBottom => 270,
        }
    }

    /// Whether the image is mirrored horizontally.
    pub fn mirrored(self) -> bool {
        matches!(
            self,
            Orientation::TopRight
                | Orientation::BottomLeft
                | Orientation::LeftTop
                | Orientation::RightBottom
        )
    }

    /// Whether this orientation swaps width and height (90/270 rotation).
    pub fn swaps_dimensions(self) -> bool {
        self.rotation_degrees() % 180 != 0
    }

    /// Logical (display) dimensions for the given physical dimensions.
    pub fn logical_dimensions(self, physical_width: u32, physical_height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (physical_height, physical_width)
        } else {
            (physical_width, physical_height)
        }
    }

    /// Whether pixels need no re-orientation.
    pub fn is_identity(self) -> bool {
        matches!(self, Orientation::TopLeft)
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.exif_value())
    }
}
