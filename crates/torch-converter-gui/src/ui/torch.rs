use std::time::Instant;

use eframe::egui::{self, Color32, Pos2, Shape, Stroke, Vec2};
use torch_converter::TorchAnimation;

use super::theme::Palette;

const GLYPH_SIZE: Vec2 = Vec2::new(72.0, 96.0);

/// Draws the torch; the flame pulses while a conversion runs and rests
/// fully lit otherwise.
pub fn torch_glyph(ui: &mut egui::Ui, torch: &TorchAnimation, palette: &Palette, now: Instant) {
    ui.vertical_centered(|ui| {
        let (response, painter) = ui.allocate_painter(GLYPH_SIZE, egui::Sense::hover());
        let rect = response.rect;
        let intensity = torch.intensity(now);

        let handle_top = rect.center_bottom() - Vec2::new(0.0, rect.height() * 0.45);
        painter.add(Shape::convex_polygon(
            vec![
                handle_top - Vec2::new(9.0, 0.0),
                handle_top + Vec2::new(9.0, 0.0),
                rect.center_bottom() + Vec2::new(4.0, 0.0),
                rect.center_bottom() - Vec2::new(4.0, 0.0),
            ],
            palette.panel,
            Stroke::new(1.0, palette.text_primary.gamma_multiply(0.4)),
        ));

        let base = handle_top - Vec2::new(0.0, 4.0);
        let height = rect.height() * 0.5 * (0.75 + 0.25 * intensity);
        painter.add(Shape::convex_polygon(
            flame(base, height, 14.0),
            palette.flame_outer.gamma_multiply(intensity),
            Stroke::NONE,
        ));
        painter.add(Shape::convex_polygon(
            flame(base, height * 0.6, 7.0),
            palette.flame_core.gamma_multiply(intensity),
            Stroke::NONE,
        ));
        painter.circle_filled(
            base - Vec2::new(0.0, height * 0.2),
            5.0 * intensity,
            Color32::WHITE.gamma_multiply(0.6 * intensity),
        );

        if torch.is_running() {
            response.on_hover_text("Converting...");
        }
    });
}

/// A teardrop with its round end on `base`, clockwise from the tip.
fn flame(base: Pos2, height: f32, half_width: f32) -> Vec<Pos2> {
    let tip = base - Vec2::new(0.0, height);
    let mut points = vec![tip];
    for step in 0..=8 {
        let angle = std::f32::consts::PI * step as f32 / 8.0;
        let offset = Vec2::new(
            half_width * angle.cos(),
            half_width * (0.6 * angle.sin() - 0.4),
        );
        points.push(base + offset);
    }
    points
}
