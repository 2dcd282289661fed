use std::path::PathBuf;

use eframe::egui;
use egui::{Rect, Sense, TextureHandle, Vec2};

use crate::canvas::{
    Capability, CanvasEvent, PointerEvent, TileCanvas, TileCanvasBuilder,
};
use crate::components::{self, tileset::TileSetPanel};
use crate::grid::LayerId;
use crate::io;
use crate::project::Session;
use crate::tile::Brush;
use crate::{log_err, log_info};

/// Default map surface, matching a 32×32-cell map of 16px tiles.
const DEFAULT_MAP_SIZE: f32 = 512.0;
const DEFAULT_TILE_SIZE: u32 = 16;
/// Side length of the current-brush preview pane.
const BRUSH_PREVIEW_SIZE: u32 = 64;

pub struct TileFEApp {
    map_canvas: TileCanvas,
    tileset_panel: TileSetPanel,
    session: Session,
    /// The session's current brush; replaced wholesale on each selection.
    brush: Option<Brush>,

    map_texture: Option<TextureHandle>,
    brush_preview: Option<TextureHandle>,
    brush_preview_stale: bool,

    /// Content revision at the last save, for the dirty indicator.
    saved_revision: u64,
    status: String,
}

impl TileFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let map_canvas = TileCanvasBuilder::new()
            .size(DEFAULT_MAP_SIZE, DEFAULT_MAP_SIZE)
            .tile_size(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
            .capability(Capability::Resizable)
            .capability(Capability::Tileable)
            .capability(Capability::Drawable)
            .build()
            .expect("static map canvas configuration");
        let tileset_panel =
            TileSetPanel::new((DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE), Default::default())
                .expect("static tile set configuration");

        Self {
            map_canvas,
            tileset_panel,
            session: Session::new_untitled(1),
            brush: None,
            map_texture: None,
            brush_preview: None,
            brush_preview_stale: false,
            saved_revision: 0,
            status: String::from("Open a tile set to start painting"),
        }
    }

    // ---- file actions -------------------------------------------------------

    fn open_sheet(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "bmp"])
            .pick_file()
        else {
            return;
        };
        match self.tileset_panel.load_sheet(&path) {
            Ok(()) => {
                self.status = format!("Tile set: {}", path.display());
            }
            Err(e) => {
                log_err!("Failed to load tile set {}: {}", path.display(), e);
                self.status = format!("Failed to load tile set: {}", e);
            }
        }
    }

    /// Save the map as a PNG + JSON pair sharing one stem.
    fn save_map(&mut self) {
        let Some(json_path) = rfd::FileDialog::new()
            .add_filter("Tile map", &["json"])
            .set_file_name("tilemap.json")
            .save_file()
        else {
            return;
        };
        let png_path = json_path.with_extension("png");

        let snapshot = io::export(&mut self.map_canvas);
        let result = io::save_map_meta(&snapshot.meta, &json_path)
            .and_then(|_| io::save_map_image(&snapshot.image, &png_path));
        match result {
            Ok(()) => {
                log_info!(
                    "Saved map: {} cells → {} + {}",
                    snapshot.meta.tile_hash.len(),
                    json_path.display(),
                    png_path.display()
                );
                self.session = Session::from_file(json_path);
                self.saved_revision = self
                    .map_canvas
                    .grid()
                    .map(|g| g.content_revision())
                    .unwrap_or(0);
                self.status = "Map saved".into();
            }
            Err(e) => {
                log_err!("Save failed: {}", e);
                self.status = format!("Save failed: {}", e);
            }
        }
    }

    /// Load a map: metadata JSON plus the sheet image its cells re-decode from.
    fn import_map(&mut self) {
        let Some(json_path) = rfd::FileDialog::new()
            .add_filter("Tile map", &["json"])
            .pick_file()
        else {
            return;
        };
        let Some(sheet_path) = rfd::FileDialog::new()
            .add_filter("Source sheet", &["png", "bmp"])
            .pick_file()
        else {
            return;
        };
        if let Err(e) = self.import_map_from(&json_path, &sheet_path) {
            log_err!("Import failed: {}", e);
            self.status = format!("Import failed: {}", e);
        }
    }

    fn import_map_from(&mut self, json_path: &PathBuf, sheet_path: &PathBuf) -> Result<(), io::MapError> {
        let meta = io::load_map_meta(json_path)?;
        let sheet = io::load_image(sheet_path)?;

        // Import into a scratch grid first so a failed load leaves the
        // on-screen map untouched.
        let tile_size = {
            let (tw, th) = self
                .map_canvas
                .grid()
                .map(|g| g.tile_size())
                .unwrap_or((DEFAULT_TILE_SIZE as f32, DEFAULT_TILE_SIZE as f32));
            (tw.round() as u32, th.round() as u32)
        };
        let mut grid = crate::grid::TileGrid::new(tile_size);
        io::import(&mut grid, &meta, &sheet)?;

        self.map_canvas.update_size(
            meta.tile_map_size.width as f32,
            meta.tile_map_size.height as f32,
        );
        if let Some(target) = self.map_canvas.grid_mut() {
            *target = grid;
        }
        log_info!(
            "Imported map {} ({} cells)",
            json_path.display(),
            meta.tile_hash.len()
        );
        self.session = Session::from_file(json_path.clone());
        self.saved_revision = self
            .map_canvas
            .grid()
            .map(|g| g.content_revision())
            .unwrap_or(0);
        self.status = "Map imported".into();
        Ok(())
    }

    // ---- panels -------------------------------------------------------------

    fn show_menu(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Tile Set…").clicked() {
                        ui.close_menu();
                        self.open_sheet();
                    }
                    if ui.button("Import Map…").clicked() {
                        ui.close_menu();
                        self.import_map();
                    }
                    if ui.button("Save Map…").clicked() {
                        ui.close_menu();
                        self.save_map();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ui.close_menu();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Zoom In").clicked() {
                        ui.close_menu();
                        self.map_canvas.zoom_in();
                    }
                    if ui.button("Zoom Out").clicked() {
                        ui.close_menu();
                        self.map_canvas.zoom_out();
                    }
                });
            });
        });
    }

    fn show_side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("tileset_panel")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Tile Set");
                if ui.button("Open Tile Set…").clicked() {
                    self.open_sheet();
                }
                ui.add_space(4.0);
                self.tileset_panel.show(ui);

                ui.separator();
                ui.heading("Brush");
                self.show_brush_preview(ui);
            });
    }

    fn show_brush_preview(&mut self, ui: &mut egui::Ui) {
        let Some(brush) = &self.brush else {
            ui.weak("Click or shift-drag the tile set");
            return;
        };
        if self.brush_preview_stale || self.brush_preview.is_none() {
            let preview = brush.preview(BRUSH_PREVIEW_SIZE, BRUSH_PREVIEW_SIZE, true);
            components::upload_composite(ui.ctx(), "brush_preview", &preview, &mut self.brush_preview);
            self.brush_preview_stale = false;
        }
        if let Some(texture) = &self.brush_preview {
            ui.image((
                texture.id(),
                Vec2::splat(BRUSH_PREVIEW_SIZE as f32),
            ));
        }
        let (cols, rows) = brush.bounds();
        ui.weak(format!("{}×{} stamp", cols, rows));
    }

    fn show_map_canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().id_source("map_scroll").show(ui, |ui| {
                let size = Vec2::new(self.map_canvas.width(), self.map_canvas.height());
                let (rect, _response) = ui.allocate_exact_size(size, Sense::click_and_drag());

                for event in components::pointer_events(ui, rect) {
                    // Ctrl+click / ctrl+right-click are the zoom gestures and
                    // never reach the drawing state machine.
                    if let PointerEvent::Down { button, modifiers, .. } = event {
                        if modifiers.ctrl {
                            match button {
                                crate::canvas::PointerButton::Primary => {
                                    self.map_canvas.zoom_in();
                                }
                                crate::canvas::PointerButton::Secondary => {
                                    self.map_canvas.zoom_out();
                                }
                            }
                            continue;
                        }
                    }
                    self.map_canvas.handle_pointer(event, self.brush.as_ref());
                }

                for event in self.map_canvas.drain_events() {
                    if let CanvasEvent::SizeChanged { width, height } = event {
                        log_info!("Map surface resized to {}×{}", width, height);
                    }
                }

                if self.map_canvas.take_render_request() {
                    let composite = self.map_canvas.render_full();
                    components::upload_composite(ui.ctx(), "map", &composite, &mut self.map_texture);
                }
                if let Some(texture) = &self.map_texture {
                    ui.painter().image(
                        texture.id(),
                        rect,
                        Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.session.display_title());
                ui.separator();
                ui.weak(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let cells = self
                        .map_canvas
                        .grid()
                        .map(|g| g.len(LayerId::Content))
                        .unwrap_or(0);
                    ui.weak(format!("{} cells · ×{}", cells, self.map_canvas.size_multiplier()));
                });
            });
        });
    }
}

impl eframe::App for TileFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // New brush from the tile-set browser replaces the session brush.
        if let Some(brush) = self.tileset_panel.take_brush() {
            self.brush = Some(brush);
            self.brush_preview_stale = true;
        }

        let revision = self
            .map_canvas
            .grid()
            .map(|g| g.content_revision())
            .unwrap_or(0);
        if revision != self.saved_revision {
            self.session.mark_dirty();
        } else {
            self.session.mark_clean();
        }

        self.show_menu(ctx);
        self.show_status_bar(ctx);
        self.show_side_panel(ctx);
        self.show_map_canvas(ctx);
    }
}
