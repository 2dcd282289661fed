use std::collections::HashMap;
use std::sync::Arc;

use crate::point::Point;
use crate::tile::{Brush, Tile};

/// The three z-ordered sparse planes of the grid.
///
/// Only `Content` is persisted. `Foreground` holds the single transient
/// hover-highlight cell. `Background` is plumbed through the render pass but
/// no current operation writes to it (reserved for underlays).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerId {
    Background,
    Content,
    Foreground,
}

impl LayerId {
    /// Back-to-front draw order.
    pub const Z_ORDER: [LayerId; 3] = [LayerId::Background, LayerId::Content, LayerId::Foreground];
}

type Layer = HashMap<Point, Arc<Tile>>;

/// The layered tile grid: three sparse maps from grid key to shared tile,
/// plus the authoritative tile pixel size (mutable under zoom) and the
/// column/row counts derived from it.
pub struct TileGrid {
    background: Layer,
    content: Layer,
    foreground: Layer,
    hover_tile: Arc<Tile>,
    tile_size: (f32, f32),
    columns: u32,
    rows: u32,
    /// Set on any layer mutation, consumed by the render scheduler.
    dirty: bool,
    /// Bumped on every content-layer mutation; lets the host detect unsaved
    /// changes without hashing the layer.
    content_revision: u64,
}

impl TileGrid {
    pub fn new(tile_size: (u32, u32)) -> Self {
        Self {
            background: HashMap::new(),
            content: HashMap::new(),
            foreground: HashMap::new(),
            hover_tile: Arc::new(Tile::hover(tile_size)),
            tile_size: (tile_size.0 as f32, tile_size.1 as f32),
            columns: 0,
            rows: 0,
            dirty: true,
            content_revision: 0,
        }
    }

    fn layer(&self, id: LayerId) -> &Layer {
        match id {
            LayerId::Background => &self.background,
            LayerId::Content => &self.content,
            LayerId::Foreground => &self.foreground,
        }
    }

    fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        match id {
            LayerId::Background => &mut self.background,
            LayerId::Content => &mut self.content,
            LayerId::Foreground => &mut self.foreground,
        }
    }

    /// Place `tile` at `(x, y)`, or erase the cell when `tile` is `None`.
    ///
    /// Re-painting the cell with the identical shared tile is a no-op so a
    /// held-down stroke over one cell does not keep marking the grid dirty;
    /// erasing an absent cell likewise.
    pub fn paint_cell(&mut self, x: i32, y: i32, layer: LayerId, tile: Option<&Arc<Tile>>) {
        let key = Point::new(x, y);
        match tile {
            Some(tile) => {
                if let Some(existing) = self.layer(layer).get(&key) {
                    if Arc::ptr_eq(existing, tile) {
                        return;
                    }
                }
                self.layer_mut(layer).insert(key, tile.clone());
            }
            None => {
                if self.layer_mut(layer).remove(&key).is_none() {
                    return;
                }
            }
        }
        self.dirty = true;
        if layer == LayerId::Content {
            self.content_revision += 1;
        }
    }

    /// Stamp the whole brush anchored at `(anchor_x, anchor_y)`: every
    /// relative offset in the brush paints one cell, translated by the anchor.
    pub fn paint_brush(&mut self, anchor_x: i32, anchor_y: i32, layer: LayerId, brush: &Brush) {
        for (offset, tile) in brush.cells() {
            self.paint_cell(anchor_x + offset.x, anchor_y + offset.y, layer, Some(tile));
        }
    }

    pub fn get_cell(&self, x: i32, y: i32, layer: LayerId) -> Option<&Arc<Tile>> {
        self.layer(layer).get(&Point::new(x, y))
    }

    /// Move the hover highlight to `(x, y)`.
    ///
    /// Clears any previous foreground entry first; the outside sentinel
    /// `(-1, -1)` clears without placing (pointer left the surface).
    pub fn hover(&mut self, x: i32, y: i32) {
        let target = Point::new(x, y);
        if self.foreground.len() == 1 && self.foreground.contains_key(&target) {
            return;
        }
        if !self.foreground.is_empty() {
            self.foreground.clear();
            self.dirty = true;
        }
        if !target.is_outside() {
            let hover = self.hover_tile.clone();
            self.paint_cell(x, y, LayerId::Foreground, Some(&hover));
        }
    }

    /// Iterate a layer's `(key, tile)` pairs in unspecified order.
    pub fn cells(&self, layer: LayerId) -> impl Iterator<Item = (&Point, &Arc<Tile>)> {
        self.layer(layer).iter()
    }

    pub fn len(&self, layer: LayerId) -> usize {
        self.layer(layer).len()
    }

    pub fn is_empty(&self, layer: LayerId) -> bool {
        self.layer(layer).is_empty()
    }

    pub fn clear(&mut self, layer: LayerId) {
        if !self.layer(layer).is_empty() {
            self.layer_mut(layer).clear();
            self.dirty = true;
            if layer == LayerId::Content {
                self.content_revision += 1;
            }
        }
    }

    /// Monotonic counter of content-layer mutations.
    pub fn content_revision(&self) -> u64 {
        self.content_revision
    }

    /// Current tile pixel size (scaled under zoom).
    pub fn tile_size(&self) -> (f32, f32) {
        self.tile_size
    }

    /// Rescale the tile pixel size (zoom). Grid keys are untouched: cells
    /// keep their coordinates and simply occupy larger or smaller pixels.
    pub fn scale_tile_size(&mut self, factor: f32) {
        self.tile_size.0 *= factor;
        self.tile_size.1 *= factor;
        self.hover_tile = Arc::new(Tile::hover((
            self.tile_size.0.round().max(1.0) as u32,
            self.tile_size.1.round().max(1.0) as u32,
        )));
        self.dirty = true;
    }

    /// Recompute `columns`/`rows` from the surface size and the current tile
    /// size. Called before every draw so the counts never drift.
    pub fn calc_grid(&mut self, surface_w: f32, surface_h: f32) {
        self.columns = (surface_w / self.tile_size.0).trunc() as u32;
        self.rows = (surface_h / self.tile_size.1).trunc() as u32;
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Device pixel coordinates → grid coordinates, using the *current*
    /// (possibly zoomed) tile size.
    pub fn grid_coords(&self, device_x: f32, device_y: f32) -> (i32, i32) {
        (
            (device_x / self.tile_size.0).floor() as i32,
            (device_y / self.tile_size.1).floor() as i32,
        )
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consume the dirty flag; returns whether a redraw is owed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileSet;
    use image::RgbaImage;

    fn tile(n: u8) -> Arc<Tile> {
        let set = TileSet::parse(
            RgbaImage::from_pixel(16, 16, image::Rgba([n, n, n, 255])),
            format!("t{}.png", n),
            (16, 16),
        )
        .unwrap();
        set.get(0, 0).unwrap().clone()
    }

    #[test]
    fn paint_then_get_agree() {
        let mut grid = TileGrid::new((16, 16));
        let t = tile(1);
        grid.paint_cell(3, 5, LayerId::Content, Some(&t));
        assert!(Arc::ptr_eq(grid.get_cell(3, 5, LayerId::Content).unwrap(), &t));
        assert!(grid.get_cell(5, 3, LayerId::Content).is_none());
    }

    #[test]
    fn erase_removes_the_key() {
        let mut grid = TileGrid::new((16, 16));
        let t = tile(1);
        grid.paint_cell(0, 0, LayerId::Content, Some(&t));
        grid.paint_cell(0, 0, LayerId::Content, None);
        assert!(grid.get_cell(0, 0, LayerId::Content).is_none());
        assert_eq!(grid.len(LayerId::Content), 0);
    }

    #[test]
    fn repaint_same_tile_is_a_clean_noop() {
        let mut grid = TileGrid::new((16, 16));
        let t = tile(1);
        grid.paint_cell(1, 1, LayerId::Content, Some(&t));
        grid.take_dirty();
        grid.paint_cell(1, 1, LayerId::Content, Some(&t));
        assert!(!grid.is_dirty());
        assert_eq!(grid.len(LayerId::Content), 1);

        // Erasing an absent cell is equally clean.
        grid.paint_cell(9, 9, LayerId::Content, None);
        assert!(!grid.is_dirty());
    }

    #[test]
    fn brush_stamp_translates_by_anchor() {
        let mut grid = TileGrid::new((16, 16));
        let a = tile(1);
        let b = tile(2);
        let mut map = std::collections::BTreeMap::new();
        map.insert(Point::new(0, 0), a.clone());
        map.insert(Point::new(1, 0), b.clone());
        map.insert(Point::new(0, 1), b.clone());
        grid.paint_brush(4, 7, LayerId::Content, &Brush::Stamp(map));

        assert!(Arc::ptr_eq(grid.get_cell(4, 7, LayerId::Content).unwrap(), &a));
        assert!(Arc::ptr_eq(grid.get_cell(5, 7, LayerId::Content).unwrap(), &b));
        assert!(Arc::ptr_eq(grid.get_cell(4, 8, LayerId::Content).unwrap(), &b));
        assert_eq!(grid.len(LayerId::Content), 3);
    }

    #[test]
    fn hover_holds_at_most_one_cell() {
        let mut grid = TileGrid::new((16, 16));
        grid.hover(2, 2);
        assert_eq!(grid.len(LayerId::Foreground), 1);
        grid.hover(3, 2);
        assert_eq!(grid.len(LayerId::Foreground), 1);
        assert!(grid.get_cell(3, 2, LayerId::Foreground).is_some());
        assert!(grid.get_cell(2, 2, LayerId::Foreground).is_none());
    }

    #[test]
    fn hover_outside_sentinel_clears() {
        let mut grid = TileGrid::new((16, 16));
        grid.hover(2, 2);
        grid.hover(-1, -1);
        assert!(grid.is_empty(LayerId::Foreground));
    }

    #[test]
    fn grid_coords_floor_by_current_tile_size() {
        let mut grid = TileGrid::new((16, 16));
        assert_eq!(grid.grid_coords(20.0, 5.0), (1, 0));
        assert_eq!(grid.grid_coords(0.0, 0.0), (0, 0));
        // Boundary pixel exactly at a cell edge belongs to the next cell.
        assert_eq!(grid.grid_coords(16.0, 16.0), (1, 1));
        assert_eq!(grid.grid_coords(15.999, 15.999), (0, 0));

        grid.scale_tile_size(2.0);
        assert_eq!(grid.grid_coords(20.0, 5.0), (0, 0));
        assert_eq!(grid.grid_coords(32.0, 0.0), (1, 0));
    }

    #[test]
    fn calc_grid_derives_counts() {
        let mut grid = TileGrid::new((16, 16));
        grid.calc_grid(256.0, 256.0);
        assert_eq!((grid.columns(), grid.rows()), (16, 16));
        grid.scale_tile_size(2.0);
        grid.calc_grid(512.0, 512.0);
        assert_eq!((grid.columns(), grid.rows()), (16, 16));
    }

    #[test]
    fn content_revision_counts_only_real_content_changes() {
        let mut grid = TileGrid::new((16, 16));
        let t = tile(1);
        assert_eq!(grid.content_revision(), 0);
        grid.paint_cell(0, 0, LayerId::Content, Some(&t));
        assert_eq!(grid.content_revision(), 1);
        // No-op repaint and hover movement leave the revision alone.
        grid.paint_cell(0, 0, LayerId::Content, Some(&t));
        grid.hover(5, 5);
        assert_eq!(grid.content_revision(), 1);
        grid.paint_cell(0, 0, LayerId::Content, None);
        assert_eq!(grid.content_revision(), 2);
    }

    #[test]
    fn zoom_round_trip_leaves_cells_stable() {
        let mut grid = TileGrid::new((16, 16));
        let t = tile(1);
        grid.paint_cell(3, 3, LayerId::Content, Some(&t));
        grid.scale_tile_size(2.0);
        grid.scale_tile_size(0.5);
        assert_eq!(grid.tile_size(), (16.0, 16.0));
        assert!(Arc::ptr_eq(grid.get_cell(3, 3, LayerId::Content).unwrap(), &t));
    }
}
