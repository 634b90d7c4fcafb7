//! End-to-end pyramid generation tests.
//!
//! Tests verify:
//! - Archive existence, entry naming and canonical order
//! - Manifest contents against the geometry closed forms
//! - Both build strategies produce equivalent pyramids
//! - The 1-pixel megatile rest case completes and counts match
//! - Colour fidelity of the thumbnail
//! - Lifecycle hook ordering

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::Rgb;
use tempfile::TempDir;

use iview_tiler::{
    tile_count, ImageTiler, PyramidProps, TileError, TileEventHandler, IMAGEINFO_XML,
};

use super::test_utils::{
    archive_entry_names, assert_rgb_close, decode_entry, gradient_image, manifest_of,
    smooth_image, striped_image,
};

fn tile_image(
    source: &Path,
    tile_dir: PathBuf,
    threshold: Option<u64>,
) -> (PyramidProps, PathBuf) {
    let file_name = source.file_name().unwrap().to_string_lossy().into_owned();
    let mut tiler = ImageTiler::new(
        source.to_path_buf(),
        Some("derivateID".to_string()),
        format!("imagePath/{file_name}"),
    );
    tiler.set_tile_dir(tile_dir);
    if let Some(threshold) = threshold {
        tiler.set_memory_saving_threshold(threshold);
    }
    let props = tiler.tile().unwrap();
    (props, tiler.tiled_file())
}

#[test]
fn test_small_landscape_pyramid() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("landscape.png");
    gradient_image(800, 600).save(&source).unwrap();

    let (props, archive) = tile_image(&source, dir.path().join("tiles"), None);
    assert_eq!(
        props,
        PyramidProps {
            width: 800,
            height: 600,
            zoom_level: 2,
            tiles_count: tile_count(800, 600),
        }
    );
    assert!(archive.exists(), "archive missing: {}", archive.display());

    let names = archive_entry_names(&archive);
    assert_eq!(names.len() as u32, props.tiles_count + 1);
    assert_eq!(names.last().map(String::as_str), Some(IMAGEINFO_XML));
    assert_eq!(manifest_of(&archive), props);

    // The full level starts the archive and its first tile is full-size.
    assert_eq!(names.first().map(String::as_str), Some("2/0/0.jpg"));
    let full_tile = decode_entry(&archive, "2/0/0.jpg");
    assert_eq!((full_tile.width(), full_tile.height()), (256, 256));

    // The thumbnail fits one tile.
    let thumbnail = decode_entry(&archive, "0/0/0.jpg");
    assert_eq!((thumbnail.width(), thumbnail.height()), (200, 150));
}

#[test]
fn test_canonical_entry_order_in_memory() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("ordered.png");
    gradient_image(700, 520).save(&source).unwrap();

    let (_, archive) = tile_image(&source, dir.path().join("tiles"), None);
    let names = archive_entry_names(&archive);

    let mut tiles: Vec<(u32, u32, u32)> = names[..names.len() - 1]
        .iter()
        .map(|name| {
            let parts: Vec<u32> = name
                .trim_end_matches(".jpg")
                .split('/')
                .map(|p| p.parse().unwrap())
                .collect();
            (parts[0], parts[1], parts[2])
        })
        .collect();
    let stored = tiles.clone();
    tiles.sort_by_key(|&(z, y, x)| (std::cmp::Reverse(z), y, x));
    assert_eq!(stored, tiles, "tiles must be stored z desc, y asc, x asc");
}

#[test]
fn test_strategies_produce_equivalent_archives() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("both.png");
    smooth_image(700, 520).save(&source).unwrap();

    let (props_a, archive_a) = tile_image(&source, dir.path().join("in-memory"), None);
    let (props_b, archive_b) = tile_image(&source, dir.path().join("streamed"), Some(1));

    assert_eq!(props_a, props_b);
    let mut names_a = archive_entry_names(&archive_a);
    let mut names_b = archive_entry_names(&archive_b);
    names_a.sort();
    names_b.sort();
    assert_eq!(names_a, names_b, "entry sets must not depend on strategy");

    // Same tile, same decoded dimensions, close pixel content.
    for name in ["2/0/0.jpg", "0/0/0.jpg"] {
        let tile_a = decode_entry(&archive_a, name).to_rgb8();
        let tile_b = decode_entry(&archive_b, name).to_rgb8();
        assert_eq!(tile_a.dimensions(), tile_b.dimensions());
        for (pixel_a, pixel_b) in tile_a.pixels().zip(tile_b.pixels()) {
            assert_rgb_close(*pixel_a, *pixel_b, 24, name);
        }
    }
}

#[test]
fn test_one_pixel_megatile_rest() {
    // 1025 rows leave a single-row rest after the first 1024-row strip;
    // every level below has an odd height too.
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("rest.png");
    gradient_image(300, 1025).save(&source).unwrap();

    let (props, archive) = tile_image(&source, dir.path().join("tiles"), Some(1));
    assert_eq!(props.tiles_count, tile_count(300, 1025));
    let names = archive_entry_names(&archive);
    assert_eq!(names.len() as u32, props.tiles_count + 1);
    assert_eq!(manifest_of(&archive), props);

    // The rest row became a one-pixel-tall tile.
    let rest_tile = decode_entry(&archive, "3/4/0.jpg");
    assert_eq!((rest_tile.width(), rest_tile.height()), (256, 1));
}

#[test]
fn test_striped_thumbnail_colour_bands() {
    let top = Rgb([134, 49, 68]);
    let middle = Rgb([255, 255, 255]);
    let bottom = Rgb([36, 52, 83]);
    for threshold in [None, Some(1)] {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stripes.png");
        striped_image(3000, top, middle, bottom).save(&source).unwrap();

        let (props, archive) = tile_image(&source, dir.path().join("tiles"), threshold);
        assert_eq!(props.zoom_level, 4);
        assert_eq!(props.tiles_count, tile_count(3000, 3000));

        let thumbnail = decode_entry(&archive, "0/0/0.jpg").to_rgb8();
        let (w, h) = thumbnail.dimensions();
        assert!(w <= 256 && h <= 256);
        let x = w / 2;
        let context = format!("threshold {threshold:?}");
        assert_rgb_close(*thumbnail.get_pixel(x, h / 6), top, 20, &context);
        assert_rgb_close(*thumbnail.get_pixel(x, h / 2), middle, 20, &context);
        assert_rgb_close(*thumbnail.get_pixel(x, h - h / 6), bottom, 20, &context);
    }
}

#[test]
fn test_gray_source_produces_gray_tiles() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("gray.png");
    gradient_image(600, 400).to_luma8().save(&source).unwrap();

    let (props, archive) = tile_image(&source, dir.path().join("tiles"), None);
    assert_eq!(props.tiles_count, tile_count(600, 400));
    let tile = decode_entry(&archive, "1/0/0.jpg");
    assert_eq!(tile.color(), image::ColorType::L8);
}

#[test]
fn test_deep_colour_source_is_coerced_to_rgb() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("deep.png");
    image::DynamicImage::ImageRgb16(image::ImageBuffer::from_fn(400, 300, |x, y| {
        image::Rgb([(x * 100) as u16, (y * 150) as u16, 30_000])
    }))
    .save(&source)
    .unwrap();

    let (props, archive) = tile_image(&source, dir.path().join("tiles"), None);
    assert_eq!(props.tiles_count, tile_count(400, 300));
    let tile = decode_entry(&archive, "1/0/0.jpg");
    assert_eq!(tile.color(), image::ColorType::Rgb8);
}

#[test]
fn test_extra_small_image() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("tiny.png");
    gradient_image(5, 5).save(&source).unwrap();

    let (props, archive) = tile_image(&source, dir.path().join("tiles"), None);
    assert_eq!(props.zoom_level, 0);
    assert_eq!(props.tiles_count, 1);
    let thumbnail = decode_entry(&archive, "0/0/0.jpg");
    assert_eq!((thumbnail.width(), thumbnail.height()), (5, 5));
}

// =============================================================================
// Lifecycle Hook
// =============================================================================

#[derive(Default)]
struct RecordingHook {
    events: RefCell<Vec<&'static str>>,
}

impl TileEventHandler for RecordingHook {
    fn pre_image_reader_created(&self) {
        self.events.borrow_mut().push("pre");
    }

    fn post_image_reader_created(&self) {
        self.events.borrow_mut().push("post");
    }
}

#[test]
fn test_lifecycle_hook_fires_once_in_order() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("hooked.png");
    gradient_image(300, 200).save(&source).unwrap();

    let mut tiler = ImageTiler::new(source, None, "hooked.png".to_string());
    tiler.set_tile_dir(dir.path().join("tiles"));
    let hook = RecordingHook::default();
    tiler.tile_with(Some(&hook)).unwrap();
    assert_eq!(*hook.events.borrow(), vec!["pre", "post"]);
}

#[test]
fn test_lifecycle_hook_post_fires_on_decoder_failure() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("broken.png");
    std::fs::write(&source, [0u8; 32]).unwrap();

    let mut tiler = ImageTiler::new(source, None, "broken.png".to_string());
    tiler.set_tile_dir(dir.path().join("tiles"));
    let hook = RecordingHook::default();
    let result = tiler.tile_with(Some(&hook));
    assert!(matches!(result, Err(TileError::InputNotDecodable { .. })));
    assert_eq!(*hook.events.borrow(), vec!["pre", "post"]);
}
