//! egui frame loop and panel layout.

pub mod style;
pub mod waveform_graph;

use std::time::Instant;

use eframe::egui::{self, Frame, Margin, RichText};

use crate::egui_app::controller::EguiController;
use crate::egui_app::state::{RunPhase, StatusTone};

const ARTWORK_SIZE: f32 = 220.0;

/// Top-level application handed to eframe.
pub struct EguiApp {
    controller: EguiController,
    artwork_texture: Option<(u64, egui::TextureHandle)>,
    last_frame: Option<Instant>,
}

impl EguiApp {
    pub fn new(cc: &eframe::CreationContext<'_>, controller: EguiController) -> Self {
        let mut visuals = egui::Visuals::dark();
        style::apply_visuals(&mut visuals);
        cc.egui_ctx.set_visuals(visuals);
        Self {
            controller,
            artwork_texture: None,
            last_frame: None,
        }
    }

    fn frame_dt(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        dt.min(0.25)
    }

    /// Keep the GPU texture in sync with the controller's artwork pixels.
    fn artwork_texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureHandle> {
        let (revision, image) = self.controller.artwork();
        if let Some((cached_revision, texture)) = &self.artwork_texture {
            if *cached_revision == revision {
                return image.is_some().then(|| texture.clone());
            }
        }
        let texture = image.map(|image| {
            ctx.load_texture(
                "segment_artwork",
                image.clone(),
                egui::TextureOptions::LINEAR,
            )
        });
        self.artwork_texture = texture.clone().map(|t| (revision, t));
        texture
    }

    fn top_bar(&self, ui: &mut egui::Ui) {
        let palette = style::palette();
        ui.horizontal(|ui| {
            ui.add_space(4.0);
            ui.label(
                RichText::new("Moodwave")
                    .heading()
                    .color(palette.accent),
            );
            ui.label(RichText::new("audio mood analyzer").color(palette.text_muted));
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        let palette = style::palette();
        let tone_color = match self.controller.status.tone {
            StatusTone::Info => palette.text_muted,
            StatusTone::Success => palette.success,
            StatusTone::Error => palette.warning,
        };
        ui.horizontal(|ui| {
            if !self.controller.status.message.is_empty() {
                ui.label(RichText::new("●").color(tone_color));
                ui.label(RichText::new(&self.controller.status.message).color(tone_color));
            }
        });
    }

    fn upload_card(&mut self, ui: &mut egui::Ui) {
        let palette = style::palette();
        Frame::new()
            .fill(palette.bg_secondary)
            .stroke(egui::Stroke::new(1.0, palette.panel_outline))
            .inner_margin(Margin::same(12))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Choose audio file…").clicked() {
                        self.controller.pick_file();
                    }
                    match &self.controller.run.selected {
                        Some(file) => {
                            ui.label(RichText::new(&file.name).color(palette.text_primary));
                            ui.label(
                                RichText::new(format!("{:.2} MB", file.size_mb()))
                                    .color(palette.text_muted),
                            );
                        }
                        None => {
                            ui.label(RichText::new("No file selected").color(palette.text_muted));
                        }
                    }
                });
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    let in_flight = self.controller.run_in_flight();
                    let can_submit = self.controller.run.selected.is_some() && !in_flight;
                    if ui
                        .add_enabled(can_submit, egui::Button::new("Analyze"))
                        .clicked()
                    {
                        self.controller.submit();
                    }
                    if in_flight && ui.button("Cancel").clicked() {
                        self.controller.cancel_run();
                    }
                });
            });
    }

    fn progress_section(&self, ui: &mut egui::Ui) {
        let palette = style::palette();
        let run = &self.controller.run;
        ui.add(
            egui::ProgressBar::new(run.progress / 100.0)
                .desired_width(ui.available_width())
                .text(format!("{:.0}%", run.progress)),
        );
        ui.horizontal(|ui| {
            ui.label(RichText::new(run.stage_label).color(palette.text_primary));
            if let Some((current, total)) = run.chunk_counter() {
                ui.label(
                    RichText::new(format!("Chunk {current} of {total}"))
                        .color(palette.text_muted),
                );
            }
        });
    }

    fn playback_controls(&mut self, ui: &mut egui::Ui) {
        if !self.controller.playback_available() {
            return;
        }
        ui.horizontal(|ui| {
            if self.controller.is_playing() {
                if ui.button("⏹ Stop").clicked() {
                    self.controller.stop_playback();
                }
            } else if ui.button("▶ Play").clicked() {
                self.controller.play();
            }
        });
    }

    fn chunk_section(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let palette = style::palette();
        let Some(chunk) = self.controller.run.display_chunk.clone() else {
            return;
        };
        let texture = self.artwork_texture(ctx);
        ui.horizontal_top(|ui| {
            if let Some(texture) = texture {
                ui.add(
                    egui::Image::new(&texture)
                        .fit_to_exact_size(egui::vec2(ARTWORK_SIZE, ARTWORK_SIZE))
                        .corner_radius(6.0),
                );
                ui.add_space(12.0);
            }
            ui.vertical(|ui| {
                ui.horizontal(|ui| {
                    metric_card(ui, "Tempo", &format!("{:.0} BPM", chunk.data.tempo));
                    metric_card(ui, "Energy", &format!("{:.4}", chunk.data.energy));
                    metric_card(ui, "Key", &chunk.data.key);
                });
                ui.add_space(8.0);
                ui.label(RichText::new("Emotions").color(palette.text_primary));
                for (name, value) in chunk.data.emotion.categories() {
                    ui.add(
                        egui::ProgressBar::new((value / 100.0) as f32)
                            .desired_width(260.0)
                            .text(format!("{name} {value:.0}%")),
                    );
                }
                if !chunk.data.emotion.reasoning.is_empty() {
                    ui.add_space(4.0);
                    ui.label(
                        RichText::new(&chunk.data.emotion.reasoning)
                            .italics()
                            .color(palette.text_muted),
                    );
                }
            });
        });
    }

    fn error_section(&self, ui: &mut egui::Ui) {
        let palette = style::palette();
        let Some(error) = &self.controller.run.error else {
            return;
        };
        Frame::new()
            .fill(style::with_alpha(palette.warning, 24))
            .stroke(egui::Stroke::new(1.0, palette.warning))
            .inner_margin(Margin::same(10))
            .show(ui, |ui| {
                ui.label(RichText::new(error).color(palette.warning));
            });
    }
}

fn metric_card(ui: &mut egui::Ui, label: &str, value: &str) {
    let palette = style::palette();
    Frame::new()
        .fill(palette.bg_tertiary)
        .stroke(egui::Stroke::new(1.0, palette.panel_outline))
        .inner_margin(Margin::same(10))
        .show(ui, |ui| {
            ui.vertical(|ui| {
                ui.label(RichText::new(label).small().color(palette.text_muted));
                ui.label(RichText::new(value).strong().color(palette.text_primary));
            });
        });
}

impl eframe::App for EguiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dt = self.frame_dt();
        self.controller.poll_jobs();
        self.controller.tick_playhead(dt);

        egui::TopBottomPanel::top("moodwave_top").show(ctx, |ui| {
            self.top_bar(ui);
        });
        egui::TopBottomPanel::bottom("moodwave_status").show(ctx, |ui| {
            self.status_bar(ui);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .id_salt("moodwave_main")
                .show(ui, |ui| {
                    ui.add_space(8.0);
                    self.upload_card(ui);
                    ui.add_space(10.0);
                    if self.controller.run.phase != RunPhase::Idle {
                        self.progress_section(ui);
                        ui.add_space(10.0);
                    }
                    if !self.controller.run.frames.is_empty() {
                        waveform_graph::draw(
                            ui,
                            &self.controller.run.frames,
                            self.controller.playhead(),
                        );
                        ui.add_space(6.0);
                        self.playback_controls(ui);
                        ui.add_space(10.0);
                    }
                    self.chunk_section(ui, ctx);
                    ui.add_space(10.0);
                    self.error_section(ui);
                });
        });

        // Streams and playback advance between input events.
        ctx.request_repaint();
    }
}
