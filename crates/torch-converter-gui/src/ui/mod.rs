use eframe::egui;

pub mod controls;
pub mod picker;
pub mod theme;
pub mod torch;

pub(crate) fn centered_column<R>(
    ui: &mut egui::Ui,
    max_width: f32,
    add_contents: impl FnOnce(&mut egui::Ui) -> R,
) -> R {
    let width = ui.available_width().min(max_width);
    ui.vertical_centered(|ui| {
        ui.set_width(width);
        ui.with_layout(egui::Layout::top_down(egui::Align::Min), |ui| {
            add_contents(ui)
        })
        .inner
    })
    .inner
}
