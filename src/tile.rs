use std::collections::BTreeMap;
use std::sync::Arc;

use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::point::Point;

/// Fill color of the translucent hover-highlight tile (10% black).
const HOVER_FILL: Rgba<u8> = Rgba([0, 0, 0, 26]);

/// Error type for image slicing and re-decode operations.
///
/// Any decode failure is fatal to the enclosing operation (tile-set parse,
/// map import) — there are no partial tile sets.
#[derive(Debug)]
pub enum DecodeError {
    /// Requested sub-rectangle falls outside the source image.
    RegionOutOfBounds {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        image_w: u32,
        image_h: u32,
    },
    /// Tile size of zero on either axis.
    ZeroTileSize,
    /// The source image itself failed to decode.
    Image(image::ImageError),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::RegionOutOfBounds { x, y, w, h, image_w, image_h } => write!(
                f,
                "region {}×{} at ({}, {}) is outside the {}×{} source image",
                w, h, x, y, image_w, image_h
            ),
            DecodeError::ZeroTileSize => write!(f, "tile size must be non-zero on both axes"),
            DecodeError::Image(e) => write!(f, "image decode error: {}", e),
        }
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(e: image::ImageError) -> Self {
        DecodeError::Image(e)
    }
}

/// Per-cell provenance persisted in the map metadata: which source sheet,
/// and which tile coordinates inside it, produced this cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMeta {
    #[serde(rename = "sourceSrc")]
    pub source_src: String,
    #[serde(rename = "sourceCoords")]
    pub source_coords: Point,
}

/// An immutable decoded image fragment plus its provenance.
///
/// Tiles are created once (by the tile-set parser or by map import) and never
/// mutated; a single tile is shared by `Arc` across every grid cell it was
/// painted into.
#[derive(Debug)]
pub struct Tile {
    bitmap: Arc<RgbaImage>,
    size: (u32, u32),
    source_src: String,
    source_coords: Point,
}

impl Tile {
    pub fn new(
        bitmap: RgbaImage,
        source_src: impl Into<String>,
        source_coords: Point,
    ) -> Self {
        let size = bitmap.dimensions();
        Self {
            bitmap: Arc::new(bitmap),
            size,
            source_src: source_src.into(),
            source_coords,
        }
    }

    /// The fixed translucent tile used for the hover highlight.
    /// It never carries meaningful provenance and is never persisted.
    pub fn hover(tile_size: (u32, u32)) -> Self {
        let bitmap = RgbaImage::from_pixel(tile_size.0.max(1), tile_size.1.max(1), HOVER_FILL);
        Self::new(bitmap, "", Point::OUTSIDE)
    }

    pub fn bitmap(&self) -> &Arc<RgbaImage> {
        &self.bitmap
    }

    /// Tile pixel size at source resolution.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn source_src(&self) -> &str {
        &self.source_src
    }

    /// Source coordinates in tile units (column, row) into the source sheet.
    pub fn source_coords(&self) -> Point {
        self.source_coords
    }

    pub fn meta(&self) -> TileMeta {
        TileMeta {
            source_src: self.source_src.clone(),
            source_coords: self.source_coords,
        }
    }
}

/// Copy a sub-rectangle out of a decoded source image.
///
/// Bounds are checked up front: the `image` crate's crop silently clamps,
/// which would turn an out-of-range import entry into a truncated tile
/// instead of the required hard failure.
pub fn decode_region(
    source: &RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Result<RgbaImage, DecodeError> {
    if w == 0 || h == 0 {
        return Err(DecodeError::ZeroTileSize);
    }
    let (image_w, image_h) = source.dimensions();
    if x.checked_add(w).map_or(true, |r| r > image_w) || y.checked_add(h).map_or(true, |b| b > image_h) {
        return Err(DecodeError::RegionOutOfBounds { x, y, w, h, image_w, image_h });
    }
    Ok(imageops::crop_imm(source, x, y, w, h).to_image())
}

/// A sprite sheet sliced into a row/column-indexed collection of tiles.
pub struct TileSet {
    tiles: Vec<Arc<Tile>>,
    columns: u32,
    rows: u32,
    tile_size: (u32, u32),
    src: String,
    sheet: Arc<RgbaImage>,
}

impl TileSet {
    /// Slice `sheet` into `floor(h/tile_h)` rows × `floor(w/tile_w)` columns
    /// of tiles. Sub-rectangle decodes run in parallel and are joined with an
    /// all-or-nothing barrier: one failure aborts the whole parse.
    pub fn parse(
        sheet: RgbaImage,
        src: impl Into<String>,
        tile_size: (u32, u32),
    ) -> Result<Self, DecodeError> {
        let (tw, th) = tile_size;
        if tw == 0 || th == 0 {
            return Err(DecodeError::ZeroTileSize);
        }
        let src = src.into();
        let (sheet_w, sheet_h) = sheet.dimensions();
        let columns = sheet_w / tw;
        let rows = sheet_h / th;

        let sheet = Arc::new(sheet);
        let tiles: Vec<Arc<Tile>> = (0..(rows * columns))
            .into_par_iter()
            .map(|i| {
                let col = i % columns;
                let row = i / columns;
                let bitmap = decode_region(&sheet, col * tw, row * th, tw, th)?;
                Ok(Arc::new(Tile::new(
                    bitmap,
                    src.clone(),
                    Point::new(col as i32, row as i32),
                )))
            })
            .collect::<Result<_, DecodeError>>()?;

        Ok(Self { tiles, columns, rows, tile_size, src, sheet })
    }

    pub fn get(&self, col: u32, row: u32) -> Option<&Arc<Tile>> {
        if col >= self.columns || row >= self.rows {
            return None;
        }
        self.tiles.get((row * self.columns + col) as usize)
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_size(&self) -> (u32, u32) {
        self.tile_size
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// The full decoded sheet (the tile-set browser renders it directly
    /// instead of re-compositing every tile).
    pub fn sheet(&self) -> &Arc<RgbaImage> {
        &self.sheet
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tile>> {
        self.tiles.iter()
    }
}

/// The tile or rectangular stamp currently selected for painting.
///
/// A stamp maps *relative* grid offsets (origin at the stamp's top-left,
/// non-negative) to tiles. Brushes are replaced wholesale on each selection
/// and are read-only to the grid.
#[derive(Clone, Debug)]
pub enum Brush {
    Single(Arc<Tile>),
    Stamp(BTreeMap<Point, Arc<Tile>>),
}

impl Brush {
    /// Number of cells covered (stamp entries, or 1).
    pub fn len(&self) -> usize {
        match self {
            Brush::Single(_) => 1,
            Brush::Stamp(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column/row extent of the brush rectangle: `(max offset + 1)` per axis.
    pub fn bounds(&self) -> (u32, u32) {
        match self {
            Brush::Single(_) => (1, 1),
            Brush::Stamp(map) => {
                let mut max_x = 0;
                let mut max_y = 0;
                for p in map.keys() {
                    max_x = max_x.max(p.x);
                    max_y = max_y.max(p.y);
                }
                ((max_x + 1) as u32, (max_y + 1) as u32)
            }
        }
    }

    /// Iterate `(relative offset, tile)` pairs; a single-tile brush is one
    /// cell at the origin.
    pub fn cells(&self) -> Vec<(Point, &Arc<Tile>)> {
        match self {
            Brush::Single(tile) => vec![(Point::new(0, 0), tile)],
            Brush::Stamp(map) => map.iter().map(|(p, t)| (*p, t)).collect(),
        }
    }

    /// Rasterize the brush into a `width`×`height` preview, each tile scaled
    /// to its cell with nearest-neighbour sampling. With `contain`, both axes
    /// share the larger cell count so the stamp keeps its aspect ratio.
    pub fn preview(&self, width: u32, height: u32, contain: bool) -> RgbaImage {
        let mut out = RgbaImage::new(width.max(1), height.max(1));
        let (x_count, y_count) = self.bounds();
        if x_count == 0 || y_count == 0 {
            return out;
        }
        let max_axis = x_count.max(y_count);
        let cell_w = (out.width() / if contain { max_axis } else { x_count }).max(1);
        let cell_h = (out.height() / if contain { max_axis } else { y_count }).max(1);
        for (offset, tile) in self.cells() {
            let scaled = imageops::resize(
                tile.bitmap().as_ref(),
                cell_w,
                cell_h,
                imageops::FilterType::Nearest,
            );
            imageops::overlay(
                &mut out,
                &scaled,
                (offset.x as u32 * cell_w) as i64,
                (offset.y as u32 * cell_h) as i64,
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2×2 tiles of 4px, each a solid distinct color.
    fn test_sheet() -> RgbaImage {
        let colors = [
            Rgba([255, 0, 0, 255]),
            Rgba([0, 255, 0, 255]),
            Rgba([0, 0, 255, 255]),
            Rgba([255, 255, 0, 255]),
        ];
        RgbaImage::from_fn(8, 8, |x, y| {
            let col = x / 4;
            let row = y / 4;
            colors[(row * 2 + col) as usize]
        })
    }

    #[test]
    fn parse_slices_every_cell_with_provenance() {
        let set = TileSet::parse(test_sheet(), "sheet.png", (4, 4)).unwrap();
        assert_eq!((set.columns(), set.rows()), (2, 2));
        assert_eq!(set.iter().count(), 4);

        let tile = set.get(1, 0).unwrap();
        assert_eq!(tile.source_src(), "sheet.png");
        assert_eq!(tile.source_coords(), Point::new(1, 0));
        assert_eq!(tile.size(), (4, 4));
        assert_eq!(*tile.bitmap().get_pixel(0, 0), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn parse_floors_partial_edges() {
        // 10×7 sheet with 4px tiles → 2 columns, 1 row; the remainder is dropped.
        let sheet = RgbaImage::new(10, 7);
        let set = TileSet::parse(sheet, "s.png", (4, 4)).unwrap();
        assert_eq!((set.columns(), set.rows()), (2, 1));
        assert!(set.get(2, 0).is_none());
        assert!(set.get(0, 1).is_none());
    }

    #[test]
    fn parse_rejects_zero_tile_size() {
        assert!(matches!(
            TileSet::parse(RgbaImage::new(8, 8), "s.png", (0, 4)),
            Err(DecodeError::ZeroTileSize)
        ));
    }

    #[test]
    fn decode_region_bounds_are_hard_errors() {
        let sheet = RgbaImage::new(8, 8);
        assert!(decode_region(&sheet, 0, 0, 8, 8).is_ok());
        assert!(matches!(
            decode_region(&sheet, 5, 0, 4, 4),
            Err(DecodeError::RegionOutOfBounds { .. })
        ));
        assert!(matches!(
            decode_region(&sheet, 0, 8, 1, 1),
            Err(DecodeError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn brush_bounds_scan_all_keys() {
        let set = TileSet::parse(test_sheet(), "s.png", (4, 4)).unwrap();
        let tile = set.get(0, 0).unwrap().clone();
        let mut map = BTreeMap::new();
        // Sparse stamp: only corners present.
        map.insert(Point::new(0, 0), tile.clone());
        map.insert(Point::new(2, 1), tile.clone());
        let brush = Brush::Stamp(map);
        assert_eq!(brush.bounds(), (3, 2));
        assert_eq!(brush.len(), 2);

        assert_eq!(Brush::Single(tile).bounds(), (1, 1));
    }

    #[test]
    fn preview_is_requested_size() {
        let set = TileSet::parse(test_sheet(), "s.png", (4, 4)).unwrap();
        let brush = Brush::Single(set.get(0, 0).unwrap().clone());
        let img = brush.preview(64, 64, true);
        assert_eq!(img.dimensions(), (64, 64));
        assert_eq!(*img.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn tiles_share_by_reference() {
        let set = TileSet::parse(test_sheet(), "s.png", (4, 4)).unwrap();
        let a = set.get(0, 0).unwrap().clone();
        let b = set.get(0, 0).unwrap().clone();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
