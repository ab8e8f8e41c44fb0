use eframe::egui::{self, Color32, Margin, Style, Vec2};

#[derive(Clone)]
pub struct Palette {
    pub background: Color32,
    pub panel: Color32,
    pub header_top: Color32,
    pub header_bottom: Color32,
    pub flame_core: Color32,
    pub flame_outer: Color32,
    pub soft_accent: Color32,
    pub text_primary: Color32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(18, 14, 12),
            panel: Color32::from_rgb(38, 30, 26),
            header_top: Color32::from_rgb(40, 20, 12),
            header_bottom: Color32::from_rgb(120, 48, 20),
            flame_core: Color32::from_rgb(255, 214, 102),
            flame_outer: Color32::from_rgb(232, 92, 28),
            soft_accent: Color32::from_rgb(242, 170, 96),
            text_primary: Color32::from_rgb(236, 228, 220),
        }
    }
}

pub fn install(ctx: &egui::Context, palette: &Palette) {
    apply_visuals(ctx, palette);
    ctx.style_mut(apply_spacing);
}

fn apply_visuals(ctx: &egui::Context, palette: &Palette) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(palette.text_primary);
    visuals.widgets.noninteractive.bg_fill = palette.panel;
    visuals.widgets.inactive.bg_fill = palette.panel;
    visuals.widgets.hovered.bg_fill = palette.soft_accent.gamma_multiply(0.2);
    visuals.widgets.active.bg_fill = palette.soft_accent.gamma_multiply(0.3);
    visuals.selection.bg_fill = palette.flame_outer.gamma_multiply(0.6);
    visuals.extreme_bg_color = palette.background;
    visuals.panel_fill = palette.background;

    ctx.set_visuals(visuals);
}

fn apply_spacing(style: &mut Style) {
    style.spacing.item_spacing = Vec2::new(10.0, 8.0);
    style.spacing.button_padding = Vec2::new(14.0, 8.0);
    style.spacing.window_margin = Margin::same(14);
}

/// Title bar with a two-tone background.
pub fn header(ui: &mut egui::Ui, palette: &Palette, title: &str) {
    let rect = ui.max_rect();
    let painter = ui.painter();
    let mid_y = rect.center().y;
    painter.rect_filled(
        egui::Rect::from_min_max(rect.min, egui::pos2(rect.max.x, mid_y)),
        0.0,
        palette.header_top,
    );
    painter.rect_filled(
        egui::Rect::from_min_max(egui::pos2(rect.min.x, mid_y), rect.max),
        0.0,
        palette.header_bottom,
    );
    ui.centered_and_justified(|ui| {
        ui.heading(title);
    });
}
