#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::Path;

use eframe::{egui, NativeOptions, Renderer};
use torch_converter::settings::SETTINGS_FILE_NAME;
use torch_converter::Settings;
use torch_converter_gui::ConverterApp;

const TITLE: &str = "Torch O2R Converter";

trait NativeOptionsExt {
    fn with_centered(self, centered: bool) -> Self;
}

impl NativeOptionsExt for eframe::NativeOptions {
    fn with_centered(mut self, centered: bool) -> Self {
        self.centered = centered;
        self
    }
}

fn main() -> eframe::Result<()> {
    torch_converter::init_logging("info");
    let settings = match Settings::load(Path::new(SETTINGS_FILE_NAME)) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "falling back to default settings");
            Settings::default()
        }
    };

    let wgpu_result = run_app(create_native_options(Renderer::Wgpu), settings.clone());

    match wgpu_result {
        Ok(result) => Ok(result),
        Err(wgpu_error) => {
            report_renderer_error("WGPU", &wgpu_error);

            let glow_result = run_app(create_native_options(Renderer::Glow), settings);
            match glow_result {
                Ok(result) => Ok(result),
                Err(glow_error) => {
                    report_renderer_error("Glow", &glow_error);
                    Err(wgpu_error)
                }
            }
        }
    }
}

fn create_native_options(renderer: Renderer) -> NativeOptions {
    NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 720.0])
            .with_min_inner_size([420.0, 600.0]),
        renderer,
        ..Default::default()
    }
    .with_centered(true)
}

fn run_app(options: NativeOptions, settings: Settings) -> eframe::Result<()> {
    eframe::run_native(
        TITLE,
        options,
        Box::new(move |cc| Ok(Box::new(ConverterApp::new(cc, &settings)))),
    )
}

fn report_renderer_error(renderer: &str, error: &eframe::Error) {
    tracing::error!(%renderer, %error, "failed to initialize renderer");

    #[cfg(target_os = "windows")]
    {
        use rfd::MessageDialog;

        MessageDialog::new()
            .set_title(TITLE)
            .set_description(&format!(
                "Failed to initialize {renderer} renderer:\n{error}\n\nAttempting fallback..."
            ))
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}
