use std::path::Path;

use eframe::egui;
use egui::{Rect, Sense, TextureHandle, Vec2};

use crate::canvas::{
    Capability, CanvasEvent, ConfigError, ModifierKey, TileCanvas, TileCanvasBuilder,
};
use crate::components;
use crate::grid::LayerId;
use crate::io::{self, MapError};
use crate::log_info;
use crate::tile::{Brush, TileSet};

/// The source tile display: shows a sliced sprite sheet and turns clicks and
/// modifier-drags on it into the session's current brush.
///
/// Internally this is a [`TileCanvas`] composed with Resizable + Tileable +
/// Selectable (no Drawable — plain clicks pick tiles instead of painting),
/// its content layer populated by the tile-set parser.
pub struct TileSetPanel {
    canvas: TileCanvas,
    tile_set: Option<TileSet>,
    texture: Option<TextureHandle>,
    /// Brush produced by the latest selection, taken by the app.
    pending_brush: Option<Brush>,
}

impl TileSetPanel {
    pub fn new(tile_size: (u32, u32), modifier_key: ModifierKey) -> Result<Self, ConfigError> {
        let canvas = TileCanvasBuilder::new()
            // Placeholder surface until a sheet is loaded.
            .size(64.0, 64.0)
            .tile_size(tile_size.0, tile_size.1)
            .modifier_key(modifier_key)
            .capability(Capability::Resizable)
            .capability(Capability::Tileable)
            .capability(Capability::Selectable)
            .build()?;
        Ok(Self { canvas, tile_set: None, texture: None, pending_brush: None })
    }

    pub fn has_sheet(&self) -> bool {
        self.tile_set.is_some()
    }

    pub fn tile_set(&self) -> Option<&TileSet> {
        self.tile_set.as_ref()
    }

    /// Load and slice a sprite sheet, replacing any previous tile set and
    /// filling the browser's content layer cell-for-cell.
    ///
    /// The whole parse is all-or-nothing; on failure the previous sheet stays
    /// in place.
    pub fn load_sheet(&mut self, path: &Path) -> Result<(), MapError> {
        let sheet = io::load_image(path)?;
        let src = path.to_string_lossy().to_string();
        let tile_size = {
            let (tw, th) = self.canvas.grid().map(|g| g.tile_size()).unwrap_or((16.0, 16.0));
            (tw.round() as u32, th.round() as u32)
        };
        let set = TileSet::parse(sheet, src.clone(), tile_size)?;
        log_info!(
            "Loaded tile set {} ({}×{} tiles)",
            src,
            set.columns(),
            set.rows()
        );

        self.canvas
            .update_size(set.sheet().width() as f32, set.sheet().height() as f32);
        if let Some(grid) = self.canvas.grid_mut() {
            grid.clear(LayerId::Content);
            for row in 0..set.rows() {
                for col in 0..set.columns() {
                    if let Some(tile) = set.get(col, row) {
                        grid.paint_cell(col as i32, row as i32, LayerId::Content, Some(tile));
                    }
                }
            }
        }
        self.tile_set = Some(set);
        self.pending_brush = None;
        Ok(())
    }

    /// Brush emitted by the latest completed selection, if any.
    pub fn take_brush(&mut self) -> Option<Brush> {
        self.pending_brush.take()
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        if self.tile_set.is_none() {
            ui.weak("No tile set loaded");
            return;
        }

        ui.horizontal(|ui| {
            if ui.button("＋").on_hover_text("Zoom tile set in").clicked() {
                self.canvas.zoom_in();
            }
            if ui.button("－").on_hover_text("Zoom tile set out").clicked() {
                self.canvas.zoom_out();
            }
            ui.weak(format!("×{}", self.canvas.size_multiplier()));
        });

        let size = Vec2::new(self.canvas.width(), self.canvas.height());
        egui::ScrollArea::both().id_source("tileset_scroll").show(ui, |ui| {
            let (rect, _response) = ui.allocate_exact_size(size, Sense::click_and_drag());

            for event in components::pointer_events(ui, rect) {
                self.canvas.handle_pointer(event, None);
            }
            self.collect_events();

            if self.canvas.take_render_request() {
                let composite = self.canvas.render_full();
                components::upload_composite(ui.ctx(), "tileset", &composite, &mut self.texture);
            }
            if let Some(texture) = &self.texture {
                ui.painter().image(
                    texture.id(),
                    rect,
                    Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            components::draw_marquee_chrome(ui, rect, &self.canvas);
            if self.canvas.marquee_capture().is_some() {
                ui.ctx().request_repaint();
            }
        });
    }

    fn collect_events(&mut self) {
        for event in self.canvas.drain_events() {
            match event {
                CanvasEvent::SelectionCompleted(brush) => {
                    if !brush.is_empty() {
                        log_info!("Selection completed: {} tile(s)", brush.len());
                        self.pending_brush = Some(brush);
                    }
                }
                CanvasEvent::SingleSelectionCompleted(tile) => {
                    self.pending_brush = Some(Brush::Single(tile));
                }
                CanvasEvent::SizeChanged { .. } => {}
            }
        }
    }
}
