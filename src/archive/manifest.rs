//! Pyramid manifest (`imageinfo.xml`).
//!
//! Every archive ends with a single-element XML manifest describing the
//! pyramid:
//!
//! ```xml
//! <imageinfo derivate="…" path="…" tiles="…" zoomLevel="…" height="…" width="…"/>
//! ```
//!
//! The writer emits attributes in a fixed order, but consumers must parse
//! by attribute name; the order is not part of the contract.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::TileError;

/// Name of the manifest entry, always the last entry of an archive.
pub const IMAGEINFO_XML: &str = "imageinfo.xml";

/// Properties of a generated tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidProps {
    /// Logical image width in pixels.
    pub width: u32,
    /// Logical image height in pixels.
    pub height: u32,
    /// Highest zoom level (0 = single-tile pyramid).
    pub zoom_level: u32,
    /// Total number of tiles in the archive.
    pub tiles_count: u32,
}

impl PyramidProps {
    /// Read the properties of an existing archive from its manifest.
    pub fn from_archive(path: &Path) -> Result<PyramidProps, TileError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name(IMAGEINFO_XML)?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        read_manifest(xml.as_bytes())
    }
}

/// Serialize the manifest for a pyramid.
///
/// `path` is the image path relative to the derivative root and may be
/// empty; the `derivate` attribute is omitted when no derivative context
/// exists.
pub fn write_manifest(
    props: &PyramidProps,
    derivate: Option<&str>,
    path: &str,
) -> Result<String, TileError> {
    let mut writer = Writer::new(Vec::new());
    let mut element = BytesStart::new("imageinfo");
    if let Some(derivate) = derivate {
        element.push_attribute(("derivate", derivate));
    }
    element.push_attribute(("path", path));
    element.push_attribute(("tiles", props.tiles_count.to_string().as_str()));
    element.push_attribute(("zoomLevel", props.zoom_level.to_string().as_str()));
    element.push_attribute(("height", props.height.to_string().as_str()));
    element.push_attribute(("width", props.width.to_string().as_str()));
    writer
        .write_event(Event::Empty(element))
        .map_err(|e| TileError::Manifest {
            message: format!("write error: {e}"),
        })?;
    String::from_utf8(writer.into_inner()).map_err(|e| TileError::Manifest {
        message: format!("manifest is not UTF-8: {e}"),
    })
}

/// Parse a manifest, by attribute name.
pub fn read_manifest(xml: &[u8]) -> Result<PyramidProps, TileError> {
    let text = std::str::from_utf8(xml).map_err(|e| TileError::Manifest {
        message: format!("manifest is not UTF-8: {e}"),
    })?;
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event().map_err(|e| TileError::Manifest {
            message: format!("parse error: {e}"),
        })? {
            Event::Empty(element) | Event::Start(element)
                if element.name().as_ref() == b"imageinfo" =>
            {
                return props_from_element(&element);
            }
            Event::Eof => {
                return Err(TileError::Manifest {
                    message: "no imageinfo element found".into(),
                })
            }
            _ => {}
        }
    }
}

fn props_from_element(element: &BytesStart<'_>) -> Result<PyramidProps, TileError> {
    let mut width = None;
    let mut height = None;
    let mut zoom_level = None;
    let mut tiles_count = None;
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| TileError::Manifest {
            message: format!("bad attribute: {e}"),
        })?;
        let value = attribute.unescape_value().map_err(|e| TileError::Manifest {
            message: format!("bad attribute value: {e}"),
        })?;
        let slot = match attribute.key.as_ref() {
            b"width" => &mut width,
            b"height" => &mut height,
            b"zoomLevel" => &mut zoom_level,
            b"tiles" => &mut tiles_count,
            _ => continue,
        };
        *slot = Some(value.parse::<u32>().map_err(|e| TileError::Manifest {
            message: format!("non-numeric attribute: {e}"),
        })?);
    }
    match (width, height, zoom_level, tiles_count) {
        (Some(width), Some(height), Some(zoom_level), Some(tiles_count)) => Ok(PyramidProps {
            width,
            height,
            zoom_level,
            tiles_count,
        }),
        _ => Err(TileError::Manifest {
            message: "imageinfo element is missing required attributes".into(),
        }),
    }
}
