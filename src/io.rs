use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::TileCanvas;
use crate::grid::{LayerId, TileGrid};
use crate::point::Point;
use crate::tile::{decode_region, DecodeError, Tile, TileMeta};

/// Error type for map export/import operations.
#[derive(Debug)]
pub enum MapError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Malformed persisted data (bad layer key, negative source coords, …).
    InvalidFormat(String),
    /// A sub-rectangle re-decode failed; the whole load is aborted.
    Decode(DecodeError),
    Image(image::ImageError),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::Io(e) => write!(f, "I/O error: {}", e),
            MapError::Json(e) => write!(f, "JSON error: {}", e),
            MapError::InvalidFormat(e) => write!(f, "Invalid map format: {}", e),
            MapError::Decode(e) => write!(f, "Tile decode error: {}", e),
            MapError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl From<std::io::Error> for MapError {
    fn from(e: std::io::Error) -> Self {
        MapError::Io(e)
    }
}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        MapError::Json(e)
    }
}

impl From<DecodeError> for MapError {
    fn from(e: DecodeError) -> Self {
        MapError::Decode(e)
    }
}

impl From<image::ImageError> for MapError {
    fn from(e: image::ImageError) -> Self {
        MapError::Image(e)
    }
}

/// Logical pixel dimensions of the grid at export time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: u32,
    pub height: u32,
}

/// The persisted metadata: per-cell provenance keyed by the canonical
/// `"<row>|<col>"` layer key, plus the grid's logical size.
///
/// `sourceSrc` is informational — on import the caller resolves and supplies
/// the actual sheet image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileMapFile {
    #[serde(rename = "tileHash")]
    pub tile_hash: HashMap<String, TileMeta>,
    #[serde(rename = "tileMapSize")]
    pub tile_map_size: MapSize,
}

/// The two export artifacts: a content-only raster and the provenance JSON.
pub struct TileMapExport {
    pub image: RgbaImage,
    pub meta: TileMapFile,
}

/// Snapshot the canvas: rasterize the content layer (no grid lines, no
/// hover) at the current surface resolution and collect every content cell's
/// provenance.
pub fn export(canvas: &mut TileCanvas) -> TileMapExport {
    let image = canvas.render_content();
    let mut tile_hash = HashMap::new();
    if let Some(grid) = canvas.grid() {
        for (key, tile) in grid.cells(LayerId::Content) {
            tile_hash.insert(key.to_key(), tile.meta());
        }
    }
    let (width, height) = image.dimensions();
    TileMapExport {
        image,
        meta: TileMapFile { tile_hash, tile_map_size: MapSize { width, height } },
    }
}

/// Rebuild a grid's content layer from persisted metadata plus the decoded
/// source sheet.
///
/// Each entry's sub-rectangle at `sourceCoords × tileSize` is re-decoded;
/// decodes run in parallel and join all-or-nothing, and the grid is mutated
/// only after every entry has resolved — one failure fails the whole load
/// and leaves the grid untouched.
pub fn import(grid: &mut TileGrid, file: &TileMapFile, source: &RgbaImage) -> Result<(), MapError> {
    let (tw, th) = grid.tile_size();
    let (tw, th) = (tw.round() as u32, th.round() as u32);

    let tiles: Vec<(Point, Arc<Tile>)> = file
        .tile_hash
        .par_iter()
        .map(|(key, meta)| {
            let point = Point::from_key(key)
                .ok_or_else(|| MapError::InvalidFormat(format!("bad layer key {:?}", key)))?;
            let coords = meta.source_coords;
            if coords.x < 0 || coords.y < 0 {
                return Err(MapError::InvalidFormat(format!(
                    "negative source coords ({}, {}) for key {:?}",
                    coords.x, coords.y, key
                )));
            }
            let bitmap =
                decode_region(source, coords.x as u32 * tw, coords.y as u32 * th, tw, th)?;
            Ok((point, Arc::new(Tile::new(bitmap, meta.source_src.clone(), coords))))
        })
        .collect::<Result<_, MapError>>()?;

    for (point, tile) in tiles {
        grid.paint_cell(point.x, point.y, LayerId::Content, Some(&tile));
    }
    Ok(())
}

// ============================================================================
// DISK HELPERS
// ============================================================================

/// Write the export raster as a lossless PNG.
pub fn save_map_image(image: &RgbaImage, path: &Path) -> Result<(), MapError> {
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Write the map metadata JSON.
pub fn save_map_meta(meta: &TileMapFile, path: &Path) -> Result<(), MapError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, meta)?;
    Ok(())
}

/// Read map metadata JSON back from disk.
pub fn load_map_meta(path: &Path) -> Result<TileMapFile, MapError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Decode a sheet or exported raster into RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, MapError> {
    Ok(image::open(path)?.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Capability, TileCanvasBuilder};
    use crate::tile::TileSet;
    use image::Rgba;

    fn sheet() -> RgbaImage {
        // 2×2 tiles of 16px, distinct solid colors.
        RgbaImage::from_fn(32, 32, |x, y| {
            Rgba([if x < 16 { 200 } else { 40 }, if y < 16 { 200 } else { 40 }, 90, 255])
        })
    }

    fn painted_canvas() -> TileCanvas {
        let mut canvas = TileCanvasBuilder::new()
            .size(256.0, 256.0)
            .tile_size(16, 16)
            .capability(Capability::Tileable)
            .capability(Capability::Drawable)
            .build()
            .unwrap();
        let set = TileSet::parse(sheet(), "sheet.png", (16, 16)).unwrap();
        let grid = canvas.grid_mut().unwrap();
        grid.paint_cell(0, 0, LayerId::Content, Some(set.get(0, 0).unwrap()));
        grid.paint_cell(3, 1, LayerId::Content, Some(set.get(1, 0).unwrap()));
        grid.paint_cell(-2, 5, LayerId::Content, Some(set.get(1, 1).unwrap()));
        canvas
    }

    #[test]
    fn export_shape_matches_wire_format() {
        let mut canvas = painted_canvas();
        let snapshot = export(&mut canvas);
        let value = serde_json::to_value(&snapshot.meta).unwrap();

        assert_eq!(value["tileMapSize"]["width"], 256);
        assert_eq!(value["tileMapSize"]["height"], 256);
        let cell = &value["tileHash"]["1|3"];
        assert_eq!(cell["sourceSrc"], "sheet.png");
        assert_eq!(cell["sourceCoords"]["x"], 1);
        assert_eq!(cell["sourceCoords"]["y"], 0);
        // Negative coordinates persist through the same key form.
        assert!(value["tileHash"].get("5|-2").is_some());
    }

    #[test]
    fn round_trip_reproduces_keys_provenance_and_pixels() {
        let mut canvas = painted_canvas();
        let snapshot = export(&mut canvas);

        let mut restored = TileGrid::new((16, 16));
        import(&mut restored, &snapshot.meta, &sheet()).unwrap();

        let original = canvas.grid().unwrap();
        assert_eq!(restored.len(LayerId::Content), original.len(LayerId::Content));
        for (key, tile) in original.cells(LayerId::Content) {
            let got = restored.get_cell(key.x, key.y, LayerId::Content).expect("key survives");
            assert_eq!(got.meta(), tile.meta());
            assert_eq!(got.bitmap().as_raw(), tile.bitmap().as_raw());
        }
    }

    #[test]
    fn erased_cell_is_absent_from_export() {
        let mut canvas = painted_canvas();
        canvas.grid_mut().unwrap().paint_cell(3, 1, LayerId::Content, None);
        let snapshot = export(&mut canvas);
        assert!(snapshot.meta.tile_hash.get("1|3").is_none());
        assert_eq!(snapshot.meta.tile_hash.len(), 2);
    }

    #[test]
    fn import_is_all_or_nothing() {
        let mut meta = TileMapFile {
            tile_hash: HashMap::new(),
            tile_map_size: MapSize { width: 256, height: 256 },
        };
        meta.tile_hash.insert(
            "0|0".into(),
            TileMeta { source_src: "sheet.png".into(), source_coords: Point::new(0, 0) },
        );
        // Out of range for a 32×32 sheet with 16px tiles.
        meta.tile_hash.insert(
            "0|1".into(),
            TileMeta { source_src: "sheet.png".into(), source_coords: Point::new(7, 7) },
        );

        let mut grid = TileGrid::new((16, 16));
        assert!(matches!(import(&mut grid, &meta, &sheet()), Err(MapError::Decode(_))));
        // One failure fails the whole load; no partial layer state.
        assert!(grid.is_empty(LayerId::Content));
    }

    #[test]
    fn import_rejects_malformed_keys_and_coords() {
        let sheet = sheet();
        let mut grid = TileGrid::new((16, 16));

        let mut meta = TileMapFile {
            tile_hash: HashMap::new(),
            tile_map_size: MapSize { width: 32, height: 32 },
        };
        meta.tile_hash.insert(
            "not-a-key".into(),
            TileMeta { source_src: "s".into(), source_coords: Point::new(0, 0) },
        );
        assert!(matches!(import(&mut grid, &meta, &sheet), Err(MapError::InvalidFormat(_))));

        meta.tile_hash.clear();
        meta.tile_hash.insert(
            "0|0".into(),
            TileMeta { source_src: "s".into(), source_coords: Point::new(-1, 0) },
        );
        assert!(matches!(import(&mut grid, &meta, &sheet), Err(MapError::InvalidFormat(_))));
    }

    #[test]
    fn disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("tilemap.png");
        let json = dir.path().join("tilemap.json");

        let mut canvas = painted_canvas();
        let snapshot = export(&mut canvas);
        save_map_image(&snapshot.image, &png).unwrap();
        save_map_meta(&snapshot.meta, &json).unwrap();

        let meta = load_map_meta(&json).unwrap();
        assert_eq!(meta.tile_map_size, snapshot.meta.tile_map_size);
        assert_eq!(meta.tile_hash.len(), snapshot.meta.tile_hash.len());

        let raster = load_image(&png).unwrap();
        assert_eq!(raster.dimensions(), (256, 256));
        assert_eq!(raster.as_raw(), snapshot.image.as_raw());
    }

    #[test]
    fn load_map_meta_surfaces_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load_map_meta(&path), Err(MapError::Json(_))));
        assert!(matches!(load_map_meta(&dir.path().join("missing.json")), Err(MapError::Io(_))));
    }
}
