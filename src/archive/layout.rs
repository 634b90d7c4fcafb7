//! Output path resolution.
//!
//! Pyramid archives live under a shared base directory, fanned out by the
//! derivative identifier so a single directory never accumulates millions
//! of entries. A derivative `junit_derivate_00000001` with image path
//! `foo/bar.tif` resolves to
//! `<base>/junit/derivate/00/01/junit_derivate_00000001/foo/bar.iview2`.

use std::path::{Path, PathBuf};

use tracing::info;

/// Length of one fan-out directory segment.
const DIRECTORY_PART_LEN: usize = 2;

/// Derivative id tails at most this long are used as a segment verbatim.
const MIN_FILENAME_SUFFIX_LEN: usize = 3;

/// File suffix of pyramid archives.
pub const ARCHIVE_SUFFIX: &str = ".iview2";

/// Base directory for all images of one derivative.
///
/// Without a derivative the tile directory itself is the base. Otherwise
/// the derivative id is split on `_`; all parts but the last become
/// directory segments, the last part contributes its two two-character
/// tail segments (or itself when it is three characters or shorter), and
/// the full id closes the chain.
pub fn derivate_base_dir(tile_dir: &Path, derivate: Option<&str>) -> PathBuf {
    let Some(derivate) = derivate else {
        info!(
            "No derivate ID given. Using {} as base directory.",
            tile_dir.display()
        );
        return tile_dir.to_path_buf();
    };
    let mut base = tile_dir.to_path_buf();
    let parts: Vec<&str> = derivate.split('_').collect();
    for part in &parts[..parts.len() - 1] {
        base.push(part);
    }
    let last = parts[parts.len() - 1];
    if last.len() > MIN_FILENAME_SUFFIX_LEN {
        base.push(&last[last.len() - 2 * DIRECTORY_PART_LEN..last.len() - DIRECTORY_PART_LEN]);
        base.push(&last[last.len() - DIRECTORY_PART_LEN..]);
    } else {
        base.push(last);
    }
    base.push(derivate);
    base
}

/// Resolve the archive path for an image of a derivative.
///
/// `image_path` is the image's path relative to the derivative root; a
/// leading `/` is ignored and the last extension is replaced by
/// [`ARCHIVE_SUFFIX`].
pub fn tiled_file_path(tile_dir: &Path, derivate: Option<&str>, image_path: &str) -> PathBuf {
    let base = derivate_base_dir(tile_dir, derivate);
    let start = usize::from(image_path.starts_with('/'));
    let end = match image_path.rfind('.') {
        Some(position) if position > 0 => position,
        _ => image_path.len(),
    };
    let relative = &image_path[start..end.max(start)];
    base.join(format!("{relative}{ARCHIVE_SUFFIX}"))
}
