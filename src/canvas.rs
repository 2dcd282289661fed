use std::collections::BTreeMap;
use std::sync::Arc;

use image::{imageops, Rgba, RgbaImage};

use crate::grid::{LayerId, TileGrid};
use crate::point::Point;
use crate::tile::{Brush, Tile};

/// Zoom step applied by one resize command.
const SIZE_STEP: f32 = 2.0;

/// Dashed grid-line overlay: 60% black, 4px on / 2px off.
const GRID_LINE: Rgba<u8> = Rgba([0, 0, 0, 153]);
const DASH_ON: u32 = 4;
const DASH_PERIOD: u32 = 6;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Independently composable canvas capabilities.
///
/// Assembly order matters: `Tileable` owns the grid coordinate math that
/// `Selectable` and `Drawable` depend on, so it must be listed before either.
/// `Resizable` is independent and may appear anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Resizable,
    Tileable,
    Selectable,
    Drawable,
}

/// Keyboard modifier identity, for the marquee modifier option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ModifierKey {
    #[default]
    Shift,
    Ctrl,
    Alt,
}

/// Modifier-key state attached to pointer events by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn has(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
        }
    }
}

/// Construction-time failures. All are raised synchronously from
/// [`TileCanvasBuilder::build`], before any decoding or rendering starts.
#[derive(Debug)]
pub enum ConfigError {
    /// No surface size was supplied.
    MissingSize,
    /// Surface dimensions must be positive.
    InvalidSize(f32, f32),
    /// Tile size must be non-zero on both axes.
    ZeroTileSize,
    /// A capability was composed before the capability it depends on.
    CapabilityOrder(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingSize => write!(f, "canvas size is required"),
            ConfigError::InvalidSize(w, h) => write!(f, "invalid canvas size {}×{}", w, h),
            ConfigError::ZeroTileSize => write!(f, "tile size must be non-zero"),
            ConfigError::CapabilityOrder(msg) => write!(f, "capability order: {}", msg),
        }
    }
}

/// Builder assembling a [`TileCanvas`] from a base surface plus capabilities.
pub struct TileCanvasBuilder {
    size: Option<(f32, f32)>,
    tile_size: (u32, u32),
    modifier_key: ModifierKey,
    capabilities: Vec<Capability>,
}

impl Default for TileCanvasBuilder {
    fn default() -> Self {
        Self {
            size: None,
            tile_size: (16, 16),
            modifier_key: ModifierKey::default(),
            capabilities: Vec::new(),
        }
    }
}

impl TileCanvasBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: f32, height: f32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn tile_size(mut self, x: u32, y: u32) -> Self {
        self.tile_size = (x, y);
        self
    }

    /// Modifier key that switches pointer drags into marquee selection.
    pub fn modifier_key(mut self, key: ModifierKey) -> Self {
        self.modifier_key = key;
        self
    }

    pub fn capability(mut self, cap: Capability) -> Self {
        self.capabilities.push(cap);
        self
    }

    pub fn build(self) -> Result<TileCanvas, ConfigError> {
        let (width, height) = self.size.ok_or(ConfigError::MissingSize)?;
        if !(width > 0.0 && height > 0.0) {
            return Err(ConfigError::InvalidSize(width, height));
        }
        if self.tile_size.0 == 0 || self.tile_size.1 == 0 {
            return Err(ConfigError::ZeroTileSize);
        }

        let tileable_at = self.capabilities.iter().position(|c| *c == Capability::Tileable);
        for (i, cap) in self.capabilities.iter().enumerate() {
            let needs_grid = matches!(cap, Capability::Selectable | Capability::Drawable);
            if needs_grid && tileable_at.map_or(true, |t| t > i) {
                return Err(ConfigError::CapabilityOrder(
                    "Tileable must be composed before Selectable and Drawable",
                ));
            }
        }

        let mut canvas = TileCanvas {
            width,
            height,
            grid: None,
            size_multiplier: None,
            selectable: None,
            drawable: false,
            state: PointerState::Idle,
            render_requested: true,
            events: Vec::new(),
        };
        for cap in &self.capabilities {
            match cap {
                Capability::Tileable => canvas.grid = Some(TileGrid::new(self.tile_size)),
                Capability::Resizable => canvas.size_multiplier = Some(1.0),
                Capability::Selectable => canvas.selectable = Some(self.modifier_key),
                Capability::Drawable => canvas.drawable = true,
            }
        }
        Ok(canvas)
    }
}

// ============================================================================
// POINTER EVENTS & STATE MACHINE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Raw pointer event in device pixel coordinates of the canvas surface.
#[derive(Clone, Copy, Debug)]
pub enum PointerEvent {
    Down { x: f32, y: f32, button: PointerButton, modifiers: Modifiers },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32, button: PointerButton, modifiers: Modifiers },
    /// Pointer left the surface.
    Leave,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PointerState {
    Idle,
    Drawing,
    Erasing,
    /// Modifier-held drag; holds the pointer-down device position.
    Marquee { down_x: f32, down_y: f32 },
    /// Plain press on a selectable, non-drawable canvas (tile picking).
    Picking,
}

/// Notifications drained by the host once per frame.
#[derive(Clone, Debug)]
pub enum CanvasEvent {
    /// A marquee selection finished; carries the extracted stamp brush.
    SelectionCompleted(Brush),
    /// A plain click picked a single tile.
    SingleSelectionCompleted(Arc<Tile>),
    /// Surface dimensions changed (zoom).
    SizeChanged { width: f32, height: f32 },
}

// ============================================================================
// TILE CANVAS
// ============================================================================

/// A rectangular pixel surface enriched by composable capabilities: a tile
/// grid (`Tileable`), zoom (`Resizable`), marquee/tile-pick selection
/// (`Selectable`), and paint/erase strokes (`Drawable`).
///
/// The engine is UI-agnostic: the host feeds it [`PointerEvent`]s, drains
/// [`CanvasEvent`]s, and recomposites when [`Self::take_render_request`]
/// fires. The current brush is owned by the editing session and passed into
/// the pointer handler — the canvas never mutates it.
pub struct TileCanvas {
    width: f32,
    height: f32,
    grid: Option<TileGrid>,
    /// Cumulative zoom multiplier; `None` when not Resizable.
    size_multiplier: Option<f32>,
    /// Marquee modifier key; `None` when not Selectable.
    selectable: Option<ModifierKey>,
    drawable: bool,
    state: PointerState,
    /// Coalescing redraw flag: at most one recomposite per host frame.
    render_requested: bool,
    events: Vec<CanvasEvent>,
}

impl TileCanvas {
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn grid(&self) -> Option<&TileGrid> {
        self.grid.as_ref()
    }

    pub fn grid_mut(&mut self) -> Option<&mut TileGrid> {
        self.grid.as_mut()
    }

    /// Resize the base surface (e.g. to fit a loaded sheet image).
    pub fn update_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.request_render();
    }

    // ---- render scheduler ---------------------------------------------------

    /// Ask for a redraw on the next host frame. Idempotent: requests between
    /// frames coalesce into one.
    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    /// Consume the pending redraw request. The host calls this once per
    /// display refresh and recomposites only when it returns true.
    pub fn take_render_request(&mut self) -> bool {
        if let Some(grid) = self.grid.as_mut() {
            if grid.take_dirty() {
                self.render_requested = true;
            }
        }
        std::mem::replace(&mut self.render_requested, false)
    }

    // ---- pointer state machine ----------------------------------------------

    /// Feed one pointer event through the draw/erase/hover/marquee state
    /// machine. `brush` is the session's current brush, if any.
    pub fn handle_pointer(&mut self, event: PointerEvent, brush: Option<&Brush>) {
        match event {
            PointerEvent::Down { x, y, button, modifiers } => {
                self.on_pointer_down(x, y, button, modifiers, brush);
            }
            PointerEvent::Move { x, y } => self.on_pointer_move(x, y, brush),
            PointerEvent::Up { x, y, modifiers, .. } => self.on_pointer_up(x, y, modifiers),
            PointerEvent::Leave => {
                self.state = PointerState::Idle;
                // Hover clearing marks the grid dirty only when something
                // actually changed, so a parked pointer outside the surface
                // does not keep scheduling redraws.
                if let Some(grid) = self.grid.as_mut() {
                    grid.hover(Point::OUTSIDE.x, Point::OUTSIDE.y);
                }
            }
        }
    }

    fn on_pointer_down(
        &mut self,
        x: f32,
        y: f32,
        button: PointerButton,
        modifiers: Modifiers,
        brush: Option<&Brush>,
    ) {
        if let Some(mod_key) = self.selectable {
            if modifiers.has(mod_key) {
                // Marquee capture is taken whichever button went down.
                self.state = PointerState::Marquee { down_x: x, down_y: y };
                return;
            }
        }
        if self.drawable {
            let Some(brush) = brush else { return };
            match button {
                PointerButton::Primary => {
                    self.state = PointerState::Drawing;
                    self.paint_at(x, y, brush);
                }
                PointerButton::Secondary => {
                    self.state = PointerState::Erasing;
                    self.erase_at(x, y);
                }
            }
        } else if self.selectable.is_some() {
            self.state = PointerState::Picking;
        }
    }

    fn on_pointer_move(&mut self, x: f32, y: f32, brush: Option<&Brush>) {
        match self.state {
            PointerState::Drawing => {
                if let Some(brush) = brush {
                    self.paint_at(x, y, brush);
                }
            }
            PointerState::Erasing => self.erase_at(x, y),
            PointerState::Marquee { .. } | PointerState::Picking => {}
            PointerState::Idle => {
                if let Some(grid) = self.grid.as_mut() {
                    let (cx, cy) = grid.grid_coords(x, y);
                    grid.hover(cx, cy);
                }
            }
        }
    }

    fn on_pointer_up(&mut self, x: f32, y: f32, modifiers: Modifiers) {
        let state = std::mem::replace(&mut self.state, PointerState::Idle);
        match state {
            PointerState::Marquee { down_x, down_y } => {
                // Completing without the modifier silently discards the capture.
                let Some(mod_key) = self.selectable else { return };
                if modifiers.has(mod_key) {
                    self.complete_marquee(down_x, down_y, x, y);
                }
            }
            PointerState::Picking => {
                let Some(grid) = self.grid.as_ref() else { return };
                let (cx, cy) = grid.grid_coords(x, y);
                if let Some(tile) = grid.get_cell(cx, cy, LayerId::Content) {
                    let tile = tile.clone();
                    self.events.push(CanvasEvent::SingleSelectionCompleted(tile));
                }
            }
            _ => {}
        }
    }

    fn paint_at(&mut self, x: f32, y: f32, brush: &Brush) {
        if let Some(grid) = self.grid.as_mut() {
            let (cx, cy) = grid.grid_coords(x, y);
            grid.paint_brush(cx, cy, LayerId::Content, brush);
            self.request_render();
        }
    }

    fn erase_at(&mut self, x: f32, y: f32) {
        if let Some(grid) = self.grid.as_mut() {
            let (cx, cy) = grid.grid_coords(x, y);
            grid.paint_cell(cx, cy, LayerId::Content, None);
            self.request_render();
        }
    }

    /// Extract the marquee rectangle from this canvas's own content layer
    /// into a stamp keyed by offset from the rectangle's top-left corner.
    /// Corners normalize per axis, so drag direction never matters. Empty
    /// cells are simply absent from the stamp.
    fn complete_marquee(&mut self, down_x: f32, down_y: f32, up_x: f32, up_y: f32) {
        let Some(grid) = self.grid.as_ref() else { return };
        let (ax, ay) = grid.grid_coords(down_x, down_y);
        let (bx, by) = grid.grid_coords(up_x, up_y);
        let (from_x, to_x) = (ax.min(bx), ax.max(bx));
        let (from_y, to_y) = (ay.min(by), ay.max(by));

        let mut stamp = BTreeMap::new();
        for y in from_y..=to_y {
            for x in from_x..=to_x {
                if let Some(tile) = grid.get_cell(x, y, LayerId::Content) {
                    stamp.insert(Point::new(x - from_x, y - from_y), tile.clone());
                }
            }
        }
        self.events.push(CanvasEvent::SelectionCompleted(Brush::Stamp(stamp)));
    }

    /// Device position of the live marquee's pointer-down corner, while one
    /// is being dragged (the host draws the chrome).
    pub fn marquee_capture(&self) -> Option<(f32, f32)> {
        match self.state {
            PointerState::Marquee { down_x, down_y } => Some((down_x, down_y)),
            _ => None,
        }
    }

    /// Whether the host should suppress the platform context menu for a
    /// secondary-button event, so erase-via-right-click works uniformly.
    /// Alt is the deliberate escape hatch that lets the menu through.
    pub fn suppress_context_menu(&self, modifiers: Modifiers) -> bool {
        self.drawable && !modifiers.alt
    }

    /// Drain pending notifications; called by the host once per frame.
    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- resizable ----------------------------------------------------------

    pub fn size_multiplier(&self) -> f32 {
        self.size_multiplier.unwrap_or(1.0)
    }

    /// Zoom in by the fixed step. No-op without the Resizable capability.
    pub fn zoom_in(&mut self) -> bool {
        self.resize(SIZE_STEP)
    }

    /// Zoom out by the fixed step.
    pub fn zoom_out(&mut self) -> bool {
        self.resize(1.0 / SIZE_STEP)
    }

    fn resize(&mut self, factor: f32) -> bool {
        let Some(multiplier) = self.size_multiplier.as_mut() else {
            return false;
        };
        *multiplier *= factor;
        self.width *= factor;
        self.height *= factor;
        if let Some(grid) = self.grid.as_mut() {
            grid.scale_tile_size(factor);
        }
        let (width, height) = (self.width, self.height);
        self.events.push(CanvasEvent::SizeChanged { width, height });
        self.request_render();
        true
    }

    // ---- compositing --------------------------------------------------------

    /// Full redraw: clear, all three layers back-to-front, dashed grid lines.
    pub fn render_full(&mut self) -> RgbaImage {
        self.render(&LayerId::Z_ORDER, true)
    }

    /// Export snapshot: content layer only, no grid lines, no hover.
    pub fn render_content(&mut self) -> RgbaImage {
        self.render(&[LayerId::Content], false)
    }

    fn render(&mut self, layers: &[LayerId], grid_lines: bool) -> RgbaImage {
        let w = self.width.round().max(1.0) as u32;
        let h = self.height.round().max(1.0) as u32;
        let mut out = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));

        let Some(grid) = self.grid.as_mut() else {
            return out;
        };
        // Column/row counts are re-derived before every draw.
        grid.calc_grid(self.width, self.height);
        let (tile_w, tile_h) = grid.tile_size();

        for &layer in layers {
            for (key, tile) in grid.cells(layer) {
                draw_tile(&mut out, tile, *key, tile_w, tile_h);
            }
        }

        if grid_lines {
            draw_grid_lines(&mut out, grid.columns(), grid.rows(), tile_w, tile_h);
        }
        out
    }
}

/// Blit one tile at its grid cell, scaled to the current (possibly zoomed)
/// tile pixel size with nearest-neighbour sampling.
fn draw_tile(out: &mut RgbaImage, tile: &Arc<Tile>, key: Point, tile_w: f32, tile_h: f32) {
    let dst_w = tile_w.round().max(1.0) as u32;
    let dst_h = tile_h.round().max(1.0) as u32;
    let px = (key.x as f32 * tile_w).round() as i64;
    let py = (key.y as f32 * tile_h).round() as i64;

    let bitmap = tile.bitmap();
    if bitmap.dimensions() == (dst_w, dst_h) {
        imageops::overlay(out, bitmap.as_ref(), px, py);
    } else {
        let scaled = imageops::resize(bitmap.as_ref(), dst_w, dst_h, imageops::FilterType::Nearest);
        imageops::overlay(out, &scaled, px, py);
    }
}

/// Dashed cell-boundary overlay, one line per column/row edge inclusive.
fn draw_grid_lines(out: &mut RgbaImage, columns: u32, rows: u32, tile_w: f32, tile_h: f32) {
    let (w, h) = out.dimensions();
    for i in 0..=columns {
        let x = (i as f32 * tile_w).round() as u32;
        if x >= w {
            continue;
        }
        for y in 0..h {
            if y % DASH_PERIOD < DASH_ON {
                blend_pixel(out, x, y, GRID_LINE);
            }
        }
    }
    for i in 0..=rows {
        let y = (i as f32 * tile_h).round() as u32;
        if y >= h {
            continue;
        }
        for x in 0..w {
            if x % DASH_PERIOD < DASH_ON {
                blend_pixel(out, x, y, GRID_LINE);
            }
        }
    }
}

/// Source-over blend of a single translucent pixel.
fn blend_pixel(out: &mut RgbaImage, x: u32, y: u32, src: Rgba<u8>) {
    let dst = out.get_pixel_mut(x, y);
    let a = src[3] as u32;
    let inv = 255 - a;
    for c in 0..3 {
        dst[c] = ((src[c] as u32 * a + dst[c] as u32 * inv) / 255) as u8;
    }
    dst[3] = (a + dst[3] as u32 * inv / 255).min(255) as u8;
}
