// src/app/ui/film.rs — one film: the main still with click/swipe
// navigation, the palette swatches, and the paged thumbnail strip.

use crate::app::nav::{classify_click, classify_swipe};
use crate::app::palette::{is_light, rgb_to_hex};
use crate::app::slider::indicator_label;
use crate::app::StillApp;

const THUMB_SPACING: f32 = 8.0;
const THUMB_ASPECT: f32 = 0.5625; // 16:9
/// Thumbnails start loading this far before they scroll into view.
const VISIBILITY_MARGIN: f32 = 100.0;
const SWATCH_SIZE: f32 = 44.0;

pub fn show(app: &mut StillApp, ctx: &egui::Context) {
    let Some(film_idx) = app.open_film_idx else {
        return;
    };

    egui::TopBottomPanel::top("film_topbar").show(ctx, |ui| {
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            if ui.button("← Gallery").clicked() {
                app.close_film();
                return;
            }
            let film = &app.films[film_idx];
            let title = match film.year {
                Some(year) => format!("{} ({year})", film.title),
                None => film.title.clone(),
            };
            ui.heading(title);
            ui.separator();
            if !film.director.is_empty() {
                ui.label(format!("Directed by {}", film.director));
            }
            if !film.cinematographer.is_empty() {
                ui.label(format!("· Shot by {}", film.cinematographer));
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let current = app.nav.state.current() + 1;
                ui.label(format!("{current} / {}", app.assets.len()));
            });
        });
        ui.add_space(4.0);
    });

    if app.open_film_idx.is_none() {
        return; // back button fired this frame
    }

    egui::CentralPanel::default().show(ctx, |ui| {
        if app.assets.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.label("No stills for this film yet.");
            });
            return;
        }

        if app.slow_notice {
            ui.horizontal(|ui| {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ The image host is responding slowly; loads may take a while.",
                );
            });
        }
        if let Some(alert) = app.active_alert() {
            ui.colored_label(egui::Color32::LIGHT_RED, alert);
        }

        let thumbs_height = thumbnail_block_height(app, ui.available_width());
        let main_height = (ui.available_height() - thumbs_height - SWATCH_SIZE - 24.0).max(120.0);
        draw_main_image(app, ui, main_height);
        draw_palette_row(app, ui);
        ui.separator();
        draw_thumbnails(app, ui);
    });
}

fn draw_main_image(app: &mut StillApp, ui: &mut egui::Ui, height: f32) {
    let current = app.nav.state.current();
    let avail = egui::vec2(ui.available_width(), height);
    let failed = app
        .assets
        .get(current)
        .map(|a| a.terminally_failed)
        .unwrap_or(false);
    let tex = app.ensure_asset_texture(ui.ctx(), current);

    let resp = match tex {
        Some(tex) => {
            let size = super::fit_size(tex.size_vec2(), avail);
            ui.vertical_centered(|ui| {
                ui.add(
                    egui::Image::new(&tex)
                        .fit_to_exact_size(size)
                        .sense(egui::Sense::click_and_drag()),
                )
            })
            .inner
        }
        None => {
            let (rect, resp) =
                ui.allocate_exact_size(avail, egui::Sense::click_and_drag());
            let painter = ui.painter();
            painter.rect_filled(rect, 4.0, egui::Color32::from_gray(24));
            if failed {
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Image unavailable (click to retry)",
                    egui::FontId::proportional(16.0),
                    egui::Color32::from_gray(130),
                );
            } else {
                egui::Spinner::new().paint_at(ui, egui::Rect::from_center_size(
                    rect.center(),
                    egui::vec2(24.0, 24.0),
                ));
            }
            resp
        }
    };
    let rect = resp.rect;

    // drag accumulates into a swipe; a plain click falls through to
    // the zone handling
    if resp.drag_started() {
        app.drag_accum = egui::Vec2::ZERO;
    }
    if resp.dragged() {
        app.drag_accum += resp.drag_delta();
    }
    if resp.drag_stopped() {
        if let Some(action) = classify_swipe(app.drag_accum.x, app.drag_accum.y) {
            app.apply_nav(action);
        }
        app.drag_accum = egui::Vec2::ZERO;
    }
    if resp.clicked() {
        if failed {
            app.retry_current();
        } else if let Some(pos) = resp.interact_pointer_pos() {
            let action = classify_click(pos.x - rect.left(), rect.width());
            app.apply_nav(action);
        }
    }
}

fn draw_palette_row(app: &mut StillApp, ui: &mut egui::Ui) {
    if app.palette_colors.is_empty() {
        ui.add_space(SWATCH_SIZE + 8.0);
        return;
    }
    let colors = app.palette_colors.clone();
    let copied = app.recently_copied();
    ui.add_space(4.0);
    ui.horizontal(|ui| {
        for color in &colors {
            let hex = rgb_to_hex(color);
            let (rect, resp) = ui.allocate_exact_size(
                egui::vec2(SWATCH_SIZE * 1.6, SWATCH_SIZE),
                egui::Sense::click(),
            );
            let fill = egui::Color32::from_rgb(color[0], color[1], color[2]);
            ui.painter().rect_filled(rect, 4.0, fill);
            let text_color = if is_light(color) {
                egui::Color32::BLACK
            } else {
                egui::Color32::WHITE
            };
            let label = if copied.as_deref() == Some(hex.as_str()) {
                "copied!".to_string()
            } else {
                hex.clone()
            };
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                label,
                egui::FontId::monospace(12.0),
                text_color,
            );
            if resp.on_hover_text("Click to copy").clicked() {
                app.copy_hex(ui.ctx(), &hex);
            }
        }
    });
    ui.add_space(4.0);
}

fn thumbnail_cols(app: &StillApp) -> usize {
    app.cfg.images_per_row.max(1)
}

fn thumbnail_block_height(app: &StillApp, width: f32) -> f32 {
    let cols = thumbnail_cols(app);
    let range = app.layout.slide_range(app.current_slide);
    let rows = range.len().div_ceil(cols).max(1);
    let thumb_w = (width - THUMB_SPACING * (cols as f32 + 1.0)) / cols as f32;
    let indicator = if app.layout.enabled { 28.0 } else { 0.0 };
    rows as f32 * (thumb_w * THUMB_ASPECT + THUMB_SPACING) + indicator
}

fn draw_thumbnails(app: &mut StillApp, ui: &mut egui::Ui) {
    let cols = thumbnail_cols(app);
    let thumb_w = (ui.available_width() - THUMB_SPACING * (cols as f32 + 1.0)) / cols as f32;
    let thumb_size = egui::vec2(thumb_w, thumb_w * THUMB_ASPECT);
    let range = app.layout.slide_range(app.current_slide);
    let current = app.nav.state.current();

    egui::Grid::new("thumb_grid")
        .num_columns(cols)
        .spacing([THUMB_SPACING, THUMB_SPACING])
        .show(ui, |ui| {
            for (n, idx) in range.clone().enumerate() {
                draw_thumb_cell(app, ui, idx, thumb_size, idx == current);
                if (n + 1) % cols == 0 {
                    ui.end_row();
                }
            }
        });

    if app.layout.enabled {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            for slide in 0..app.layout.total_slides {
                let selected = slide == app.current_slide;
                if ui
                    .selectable_label(selected, indicator_label(slide))
                    .clicked()
                    && !selected
                {
                    app.current_slide = slide;
                    let start = app.layout.slide_range(slide).start;
                    app.nav.state.set_current(start);
                    app.on_index_changed();
                }
            }
        });
    }
}

fn draw_thumb_cell(
    app: &mut StillApp,
    ui: &mut egui::Ui,
    idx: usize,
    size: egui::Vec2,
    is_current: bool,
) {
    let (rect, resp) = ui.allocate_exact_size(size, egui::Sense::click());

    // request near-viewport thumbnails before they scroll in
    if ui.is_rect_visible(rect.expand(VISIBILITY_MARGIN)) {
        app.request_thumbnail(idx);
    }

    if ui.is_rect_visible(rect) {
        match app.ensure_asset_texture(ui.ctx(), idx) {
            Some(tex) => {
                egui::Image::new(&tex)
                    .fit_to_exact_size(size)
                    .paint_at(ui, rect);
            }
            None => {
                let failed = app
                    .assets
                    .get(idx)
                    .map(|a| a.terminally_failed)
                    .unwrap_or(false);
                let painter = ui.painter();
                painter.rect_filled(rect, 3.0, egui::Color32::from_gray(30));
                if failed {
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "✕",
                        egui::FontId::proportional(14.0),
                        egui::Color32::from_gray(110),
                    );
                }
            }
        }
        if is_current {
            ui.painter().rect_stroke(
                rect,
                3.0,
                egui::Stroke::new(2.0, egui::Color32::from_rgb(255, 200, 60)),
            );
        }
    }

    if resp.clicked() {
        app.nav.state.set_current(idx);
        app.on_index_changed();
    }
}
