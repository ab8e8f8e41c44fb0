use eframe::egui;
use torch_converter::Preset;

use crate::ConverterApp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ControlItem {
    SelectRom,
    LoadConfig,
    CustomConfig,
    SelectOutput,
    Convert,
}

pub(crate) trait ControlRecorder {
    fn record(&mut self, item: ControlItem, enabled: bool);
}

pub(crate) fn controls_panel(app: &mut ConverterApp, ui: &mut egui::Ui) {
    controls_contents(app, ui, None);
}

fn record(
    recorder: &mut Option<&mut dyn ControlRecorder>,
    item: ControlItem,
    response: &egui::Response,
) {
    if let Some(recorder) = recorder.as_mut() {
        recorder.record(item, response.enabled());
    }
}

fn controls_contents(
    app: &mut ConverterApp,
    ui: &mut egui::Ui,
    mut recorder: Option<&mut dyn ControlRecorder>,
) {
    let idle = !app.is_converting();

    ui.group(|ui| {
        ui.heading("ROM");
        ui.small("Pick a .z64 ROM image.");
        let response = ui.add_enabled(idle, egui::Button::new("Select ROM"));
        record(&mut recorder, ControlItem::SelectRom, &response);
        if response.clicked() {
            app.pick_rom();
        }
        ui.label(&app.workflow.view().rom_status);
    });

    ui.group(|ui| {
        ui.heading("Config");
        let mut selected = app.workflow.preset();
        ui.add_enabled_ui(idle, |ui| {
            for preset in Preset::ALL {
                ui.radio_value(&mut selected, preset, preset.label());
            }
        });
        if selected != app.workflow.preset() {
            app.workflow.select_preset(selected);
        }

        ui.horizontal(|ui| {
            let response = ui
                .add_enabled(idle, egui::Button::new("Load Config"))
                .on_hover_text("Copy the bundled assets of the selected preset.");
            record(&mut recorder, ControlItem::LoadConfig, &response);
            if response.clicked() {
                app.workflow.stage_config();
            }

            let response = ui
                .add_enabled(idle, egui::Button::new("Custom folder..."))
                .on_hover_text("Use a config folder of your own instead.");
            record(&mut recorder, ControlItem::CustomConfig, &response);
            if response.clicked() {
                app.pick_config_tree();
            }
        });
        ui.label(&app.workflow.view().config_status);
    });

    ui.group(|ui| {
        ui.heading("Output");
        ui.small("Optional. Without a folder the archive stays in the working directory.");
        let response = ui.add_enabled(idle, egui::Button::new("Select Output"));
        record(&mut recorder, ControlItem::SelectOutput, &response);
        if response.clicked() {
            app.pick_output();
        }
        ui.label(&app.workflow.view().output_status);
    });

    ui.add_space(8.0);
    let convert_enabled = app.workflow.view().convert_enabled;
    let width = ui.available_width();
    let response = ui
        .add_enabled(
            convert_enabled,
            egui::Button::new("Convert").min_size(egui::vec2(width, 36.0)),
        )
        .on_disabled_hover_text("Select a ROM and load a config first");
    record(&mut recorder, ControlItem::Convert, &response);
    if response.clicked() {
        app.workflow.convert();
    }

    let progress = &app.workflow.view().progress;
    if progress.visible {
        ui.add(
            egui::ProgressBar::new(0.0)
                .animate(true)
                .text(progress.text.as_str()),
        );
    }
}
