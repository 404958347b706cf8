// src/app/ui/mod.rs — top-level screens. The splash lives here; the
// gallery, film page and zoom overlay are their own modules.

pub mod film;
pub mod gallery;
pub mod zoom;

use crate::app::types::BootPhase;
use crate::app::StillApp;

pub fn show_splash(app: &mut StillApp, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.35);
            ui.heading(egui::RichText::new("Still Viewer").size(28.0).strong());
            ui.add_space(12.0);
            match app.boot_phase {
                BootPhase::Starting => {
                    ui.label("Starting…");
                }
                BootPhase::LoadingFilms => match app.loading_progress {
                    Some((done, total)) if total > 0 => {
                        ui.label(format!("Loading film details {done}/{total}"));
                        ui.add_space(8.0);
                        ui.add(
                            egui::ProgressBar::new(done as f32 / total as f32)
                                .desired_width(260.0),
                        );
                    }
                    _ => {
                        ui.label("Loading film catalog…");
                        ui.add_space(8.0);
                        ui.spinner();
                    }
                },
                BootPhase::Ready => {}
            }
        });
    });
    ctx.request_repaint_after(std::time::Duration::from_millis(100));
}

/// Shared placeholder frame for cells that have no texture yet.
pub(crate) fn placeholder(ui: &mut egui::Ui, size: egui::Vec2, failed: bool) {
    let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, 4.0, egui::Color32::from_gray(34));
    let text = if failed { "unavailable" } else { "…" };
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        text,
        egui::FontId::proportional(12.0),
        egui::Color32::from_gray(120),
    );
}

/// Fit `tex_size` into `avail` preserving aspect ratio.
pub(crate) fn fit_size(tex_size: egui::Vec2, avail: egui::Vec2) -> egui::Vec2 {
    if tex_size.x <= 0.0 || tex_size.y <= 0.0 {
        return avail;
    }
    let scale = (avail.x / tex_size.x).min(avail.y / tex_size.y).min(1.0);
    tex_size * scale
}
