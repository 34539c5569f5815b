use crate::app::GifForgeApp;
use crate::options::{Quality, FPS_RANGE, WIDTH_RANGE};
use crate::session::Phase;
use eframe::egui;

impl eframe::App for GifForgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_async_results();
        let status = self.status();

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::none().inner_margin(12.0))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(egui::RichText::new("🎞 GifForge").size(24.0).strong());
                    ui.label("Convert videos into animated GIFs");
                });
            });

        egui::TopBottomPanel::bottom("controls")
            .frame(egui::Frame::none().inner_margin(12.0))
            .show(ctx, |ui| {
                self.show_controls(ui, &status);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(8.0);
            self.show_backend_warning(ui);
            self.show_file_selection(ui, ctx, &status);
            ui.add_space(12.0);
            self.show_options(ui, &status);
            ui.add_space(12.0);
            self.show_status(ui, &status);
        });

        if status.phase == Phase::Converting {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

impl GifForgeApp {
    fn show_backend_warning(&self, ui: &mut egui::Ui) {
        if self.backend_available == Some(false) {
            ui.colored_label(
                egui::Color32::LIGHT_RED,
                "⚠ FFmpeg was not found on your PATH. Install it to enable conversions.",
            );
            ui.add_space(8.0);
        }
    }

    fn show_file_selection(
        &mut self,
        ui: &mut egui::Ui,
        ctx: &egui::Context,
        status: &crate::session::ConversionStatus,
    ) {
        let busy = status.phase == Phase::Converting;

        ui.group(|ui| {
            ui.heading("Files");
            ui.add_space(6.0);

            ui.horizontal(|ui| {
                if ui.add_enabled(!busy, egui::Button::new("Select video…")).clicked() {
                    self.browse_input(ctx);
                }
                match &self.input_file {
                    Some(path) => ui.monospace(path.display().to_string()),
                    None => ui.weak("no video selected"),
                };
            });

            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!busy, egui::Button::new("Output folder…"))
                    .clicked()
                {
                    self.browse_output(ctx);
                }
                match &self.output_dir {
                    Some(path) => ui.monospace(path.display().to_string()),
                    None => ui.weak("no output folder selected"),
                };
            });
        });
    }

    fn show_options(&mut self, ui: &mut egui::Ui, status: &crate::session::ConversionStatus) {
        let busy = status.phase == Phase::Converting;

        ui.group(|ui| {
            ui.heading("GIF options");
            ui.add_space(6.0);

            ui.add_enabled_ui(!busy, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Frame rate");
                    ui.add(egui::Slider::new(&mut self.fps, FPS_RANGE.0..=FPS_RANGE.1).suffix(" fps"));
                });
                ui.horizontal(|ui| {
                    ui.label("Width");
                    ui.add(
                        egui::Slider::new(&mut self.width, WIDTH_RANGE.0..=WIDTH_RANGE.1)
                            .suffix(" px"),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("Quality");
                    egui::ComboBox::from_id_source("quality")
                        .selected_text(self.quality.to_string())
                        .show_ui(ui, |ui| {
                            for quality in Quality::ALL {
                                ui.selectable_value(
                                    &mut self.quality,
                                    quality,
                                    quality.to_string(),
                                );
                            }
                        });
                });
            });

            if let Some(error) = &self.options_error {
                ui.colored_label(egui::Color32::LIGHT_RED, error);
            }
        });
    }

    fn show_status(&self, ui: &mut egui::Ui, status: &crate::session::ConversionStatus) {
        ui.group(|ui| {
            ui.heading("Status");
            ui.add_space(6.0);

            match status.phase {
                Phase::Idle => {
                    ui.weak("Ready.");
                }
                Phase::Converting => {
                    ui.add(
                        egui::ProgressBar::new((status.progress / 100.0) as f32)
                            .show_percentage()
                            .animate(true),
                    );
                    ui.label(&status.message);
                }
                Phase::Done => {
                    ui.colored_label(egui::Color32::LIGHT_GREEN, "✔ Conversion complete");
                    if let Some(path) = &status.output_path {
                        ui.monospace(path.display().to_string());
                    }
                }
                Phase::Error => {
                    ui.colored_label(
                        egui::Color32::LIGHT_RED,
                        format!("✖ {}", status.message),
                    );
                }
            }
        });
    }

    fn show_controls(&mut self, ui: &mut egui::Ui, status: &crate::session::ConversionStatus) {
        ui.horizontal(|ui| {
            let can_start = self.can_convert() && status.phase != Phase::Converting;
            if ui
                .add_enabled(can_start, egui::Button::new("Convert to GIF"))
                .clicked()
            {
                self.start_conversion();
            }

            let can_reset = matches!(status.phase, Phase::Done | Phase::Error);
            if ui.add_enabled(can_reset, egui::Button::new("Reset")).clicked() {
                self.reset();
            }
        });
    }
}
