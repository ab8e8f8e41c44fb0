use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;
use torch_converter::{
    local_workflow, CommandConverter, Converter, DirBundle, DocumentPicker, ProgressSink,
    Settings, Toast, Workflow,
};

pub mod ui;

pub use ui::{controls, picker, theme, torch};

const NO_CONVERTER: &str = "No converter configured. Add a [converter] section to converter.toml";

struct ActiveToast {
    toast: Toast,
    expires_at: Instant,
}

pub struct ConverterApp {
    pub(crate) workflow: Workflow<DirBundle>,
    pub(crate) picker: Box<dyn DocumentPicker>,
    palette: theme::Palette,
    toasts: Vec<ActiveToast>,
}

impl ConverterApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: &Settings) -> Self {
        let palette = theme::Palette::default();
        theme::install(&cc.egui_ctx, &palette);

        let ctx = cc.egui_ctx.clone();
        let waker: Arc<dyn Fn() + Send + Sync> = Arc::new(move || ctx.request_repaint());
        let workflow = local_workflow(settings, converter_for(settings), Some(waker));
        Self::with_workflow(workflow, Box::new(picker::RfdPicker))
    }

    pub fn with_workflow(workflow: Workflow<DirBundle>, picker: Box<dyn DocumentPicker>) -> Self {
        Self {
            workflow,
            picker,
            palette: theme::Palette::default(),
            toasts: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &Workflow<DirBundle> {
        &self.workflow
    }

    pub(crate) fn is_converting(&self) -> bool {
        self.workflow.readiness().job_in_flight()
    }

    pub(crate) fn pick_rom(&mut self) {
        self.workflow.pick_rom(self.picker.as_ref());
    }

    pub(crate) fn pick_config_tree(&mut self) {
        self.workflow.pick_config_tree(self.picker.as_ref());
    }

    pub(crate) fn pick_output(&mut self) {
        self.workflow.pick_output(self.picker.as_ref());
    }

    /// Moves fresh toasts from the view into the on-screen list and drops
    /// expired ones.
    fn refresh_toasts(&mut self, now: Instant) {
        for toast in self.workflow.view_mut().take_toasts() {
            let expires_at = now + toast.duration.as_duration();
            self.toasts.push(ActiveToast { toast, expires_at });
        }
        self.toasts.retain(|active| active.expires_at > now);
    }

    fn next_toast_expiry(&self, now: Instant) -> Option<Duration> {
        self.toasts
            .iter()
            .map(|active| active.expires_at.saturating_duration_since(now))
            .min()
    }
}

fn converter_for(settings: &Settings) -> Arc<dyn Converter> {
    match settings.converter.clone() {
        Some(command) => Arc::new(CommandConverter::new(command)),
        None => Arc::new(|_: &Path, _: &Path, _: &Path, _: &ProgressSink| {
            NO_CONVERTER.to_string()
        }),
    }
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.workflow.pump();
        let now = Instant::now();
        self.refresh_toasts(now);

        if self.workflow.view().torch.is_running() {
            ctx.request_repaint_after(Duration::from_millis(16));
        } else if let Some(remaining) = self.next_toast_expiry(now) {
            ctx.request_repaint_after(remaining);
        }

        egui::TopBottomPanel::top("header")
            .exact_height(56.0)
            .show(ctx, |ui| {
                theme::header(ui, &self.palette, "Torch O2R Converter");
            });

        egui::TopBottomPanel::bottom("toasts")
            .resizable(false)
            .show_animated(ctx, !self.toasts.is_empty(), |ui| {
                for active in &self.toasts {
                    ui.colored_label(self.palette.soft_accent, &active.toast.message);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui::centered_column(ui, 460.0, |ui| {
                controls::controls_panel(self, ui);
                ui.add_space(12.0);
                torch::torch_glyph(ui, &self.workflow.view().torch, &self.palette, now);
            });
        });
    }
}
