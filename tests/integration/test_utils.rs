//! Shared helpers for integration tests: synthetic fixture images, EXIF
//! tagging, and archive inspection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

use iview_tiler::PyramidProps;

/// A smooth RGB gradient, cheap to generate at any size.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// A slow gradient with no hard edges, for pixel-level comparisons that
/// must tolerate only resampling noise.
pub fn smooth_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x / 4).min(255) as u8,
            (y / 4).min(255) as u8,
            ((x + y) / 8).min(255) as u8,
        ])
    }))
}

/// A square image of three equal horizontal colour bands.
pub fn striped_image(size: u32, top: Rgb<u8>, middle: Rgb<u8>, bottom: Rgb<u8>) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |_, y| {
        if y < size / 3 {
            top
        } else if y < 2 * size / 3 {
            middle
        } else {
            bottom
        }
    }))
}

/// Quadrant colours used by [`quadrant_image`], clockwise from top-left.
pub const QUADRANTS: [Rgb<u8>; 4] = [
    Rgb([200, 40, 40]),
    Rgb([40, 180, 60]),
    Rgb([40, 60, 200]),
    Rgb([220, 200, 40]),
];

/// Four solid colour quadrants: top-left, top-right, bottom-left,
/// bottom-right. Makes any rotation or mirror visible.
pub fn quadrant_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        match (x < width / 2, y < height / 2) {
            (true, true) => QUADRANTS[0],
            (false, true) => QUADRANTS[1],
            (true, false) => QUADRANTS[2],
            (false, false) => QUADRANTS[3],
        }
    }))
}

/// Encode an image as a high-quality JPEG carrying an EXIF orientation.
pub fn save_jpeg_with_orientation(image: &DynamicImage, path: &Path, orientation: u16) {
    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, 100);
    image.write_with_encoder(encoder).unwrap();
    std::fs::write(path, with_exif_orientation(&jpeg, orientation)).unwrap();
}

/// Splice a minimal EXIF APP1 segment with the given orientation into a
/// JPEG stream, right after the SOI marker.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG stream");
    let mut app1 = Vec::new();
    app1.extend_from_slice(b"Exif\0\0");
    // Little-endian TIFF header, IFD0 at offset 8.
    app1.extend_from_slice(&[b'I', b'I', 0x2A, 0x00]);
    app1.extend_from_slice(&8u32.to_le_bytes());
    // One IFD entry: tag 0x0112 (Orientation), type SHORT, count 1.
    app1.extend_from_slice(&1u16.to_le_bytes());
    app1.extend_from_slice(&0x0112u16.to_le_bytes());
    app1.extend_from_slice(&3u16.to_le_bytes());
    app1.extend_from_slice(&1u32.to_le_bytes());
    app1.extend_from_slice(&orientation.to_le_bytes());
    app1.extend_from_slice(&[0, 0]);
    // No further IFDs.
    app1.extend_from_slice(&0u32.to_le_bytes());

    let mut out = Vec::with_capacity(jpeg.len() + app1.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((app1.len() as u16 + 2).to_be_bytes()));
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// All entry names of an archive, in stored order.
pub fn archive_entry_names(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// The pyramid properties stored in an archive's manifest.
pub fn manifest_of(path: &Path) -> PyramidProps {
    PyramidProps::from_archive(path).unwrap()
}

/// Decode one tile entry of an archive.
pub fn decode_entry(path: &Path, name: &str) -> DynamicImage {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    image::load_from_memory(&data).unwrap()
}

/// Assert two colours match within a per-channel tolerance.
pub fn assert_rgb_close(actual: Rgb<u8>, expected: Rgb<u8>, tolerance: u8, context: &str) {
    for channel in 0..3 {
        let diff = (actual[channel] as i16 - expected[channel] as i16).unsigned_abs();
        assert!(
            diff <= tolerance as u16,
            "{context}: channel {channel} differs by {diff} (got {actual:?}, want {expected:?})"
        );
    }
}
