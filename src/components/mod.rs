pub mod tileset;

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, TextureHandle, TextureOptions};
use image::RgbaImage;

use crate::canvas::{Modifiers, PointerButton, PointerEvent, TileCanvas};

/// Translate this frame's egui pointer state over `rect` into engine pointer
/// events, in surface-local device pixels.
pub fn pointer_events(ui: &egui::Ui, rect: Rect) -> Vec<PointerEvent> {
    ui.input(|i| {
        let mut events = Vec::new();
        let modifiers = Modifiers {
            shift: i.modifiers.shift,
            ctrl: i.modifiers.ctrl || i.modifiers.command,
            alt: i.modifiers.alt,
        };

        let Some(pos) = i.pointer.interact_pos() else {
            events.push(PointerEvent::Leave);
            return events;
        };
        let local = pos - rect.min;
        let (x, y) = (local.x, local.y);
        let inside = rect.contains(pos);

        if inside {
            if i.pointer.primary_pressed() {
                events.push(PointerEvent::Down { x, y, button: PointerButton::Primary, modifiers });
            } else if i.pointer.secondary_pressed() {
                events.push(PointerEvent::Down { x, y, button: PointerButton::Secondary, modifiers });
            } else if i.pointer.is_moving() {
                events.push(PointerEvent::Move { x, y });
            }
        }

        if i.pointer.primary_released() {
            events.push(PointerEvent::Up { x, y, button: PointerButton::Primary, modifiers });
        } else if i.pointer.secondary_released() {
            events.push(PointerEvent::Up { x, y, button: PointerButton::Secondary, modifiers });
        }

        // Pointer wandered off with no button held: end any stroke and drop
        // the hover highlight.
        if !inside && !i.pointer.any_down() {
            events.push(PointerEvent::Leave);
        }
        events
    })
}

/// Upload an engine composite as an egui texture (nearest-neighbour, so tile
/// pixels stay crisp under zoom).
pub fn upload_composite(
    ctx: &egui::Context,
    name: &str,
    image: &RgbaImage,
    slot: &mut Option<TextureHandle>,
) {
    let size = [image.width() as usize, image.height() as usize];
    let color = ColorImage::from_rgba_unmultiplied(size, image.as_raw());
    match slot {
        Some(handle) => handle.set(color, TextureOptions::NEAREST),
        None => *slot = Some(ctx.load_texture(name.to_owned(), color, TextureOptions::NEAREST)),
    }
}

/// Draw live marquee chrome on top of a canvas widget, from the engine's
/// captured pointer-down corner to the current pointer position.
pub fn draw_marquee_chrome(ui: &egui::Ui, rect: Rect, canvas: &TileCanvas) {
    let Some((down_x, down_y)) = canvas.marquee_capture() else { return };
    let Some(pos) = ui.input(|i| i.pointer.interact_pos()) else { return };
    let from = Pos2::new(rect.min.x + down_x, rect.min.y + down_y);
    let marquee = Rect::from_two_pos(from, pos).intersect(rect);
    ui.painter().rect_stroke(marquee, 0.0, egui::Stroke::new(1.0, Color32::LIGHT_BLUE));
    ui.painter().rect_filled(marquee, 0.0, Color32::from_rgba_unmultiplied(120, 180, 255, 40));
}
