// src/app/ui/gallery.rs — the poster grid with search and sort on top.

use crate::app::films::{filter_films, remove_articles};
use crate::app::types::SortKey;
use crate::app::StillApp;

const CARD_SPACING: f32 = 10.0;
const POSTER_ASPECT: f32 = 1.5; // height / width

pub fn show(app: &mut StillApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("gallery_topbar").show(ctx, |ui| {
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.heading("Still Viewer");
            ui.separator();

            ui.label("Search:");
            let resp = ui.add(
                egui::TextEdit::singleline(&mut app.prefs.search)
                    .hint_text("title, actor, director…")
                    .desired_width(220.0),
            );
            if resp.changed() {
                app.mark_prefs_dirty();
            }
            if !app.prefs.search.is_empty() && ui.small_button("✕").clicked() {
                app.prefs.search.clear();
                app.mark_prefs_dirty();
            }

            ui.separator();
            ui.label("Sort:");
            for key in [SortKey::Title, SortKey::Year] {
                if ui
                    .selectable_label(app.prefs.sort_key == key, key.as_str())
                    .clicked()
                {
                    if app.prefs.sort_key == key {
                        app.prefs.sort_desc = !app.prefs.sort_desc;
                    } else {
                        app.prefs.sort_key = key;
                        app.prefs.sort_desc = false;
                    }
                    app.mark_prefs_dirty();
                }
            }
            ui.label(if app.prefs.sort_desc { "↓" } else { "↑" });

            ui.separator();
            ui.label("Columns:");
            let mut cols = app.prefs.grid_cols;
            if ui
                .add(egui::Slider::new(&mut cols, 2..=10).show_value(false))
                .changed()
            {
                app.prefs.grid_cols = cols;
                app.mark_prefs_dirty();
            }
        });
        ui.add_space(4.0);
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        if let Some(err) = app.films_error.clone() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.colored_label(egui::Color32::LIGHT_RED, "Could not load the film catalog.");
                ui.label(err);
            });
            return;
        }

        let order = visible_order(app);
        if order.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.label("No films found.");
            });
            return;
        }

        let cols = app.prefs.grid_cols.max(2);
        let card_w =
            (ui.available_width() - CARD_SPACING * (cols as f32 + 1.0)) / cols as f32;
        let poster_size = egui::vec2(card_w, card_w * POSTER_ASPECT);

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("poster_grid")
                    .num_columns(cols)
                    .spacing([CARD_SPACING, CARD_SPACING])
                    .show(ui, |ui| {
                        for (n, &film_idx) in order.iter().enumerate() {
                            draw_card(app, ui, film_idx, poster_size);
                            if (n + 1) % cols == 0 {
                                ui.end_row();
                            }
                        }
                    });
            });
    });
}

/// Filtered then sorted film indices for the current controls.
fn visible_order(app: &StillApp) -> Vec<usize> {
    let mut order = filter_films(&app.films, &app.prefs.search);
    let films = &app.films;
    match app.prefs.sort_key {
        SortKey::Title => order.sort_by(|&a, &b| {
            remove_articles(&films[a].title)
                .to_lowercase()
                .cmp(&remove_articles(&films[b].title).to_lowercase())
        }),
        SortKey::Year => order.sort_by(|&a, &b| {
            films[a]
                .year
                .cmp(&films[b].year)
                .then_with(|| films[a].title.to_lowercase().cmp(&films[b].title.to_lowercase()))
        }),
    }
    if app.prefs.sort_desc {
        order.reverse();
    }
    order
}

fn draw_card(app: &mut StillApp, ui: &mut egui::Ui, film_idx: usize, poster_size: egui::Vec2) {
    ui.vertical(|ui| {
        ui.set_width(poster_size.x);

        let tex = app.ensure_poster_texture(ui.ctx(), film_idx);
        let resp = match tex {
            Some(tex) => ui.add(
                egui::Image::new(&tex)
                    .fit_to_exact_size(poster_size)
                    .sense(egui::Sense::click()),
            ),
            None => {
                let failed = app
                    .posters
                    .get(film_idx)
                    .map(|p| p.state == crate::app::types::PosterState::Failed)
                    .unwrap_or(false);
                super::placeholder(ui, poster_size, failed);
                ui.allocate_rect(ui.min_rect(), egui::Sense::click())
            }
        };

        let film = &app.films[film_idx];
        let title = match film.year {
            Some(year) => format!("{} ({year})", film.title),
            None => film.title.clone(),
        };
        let label = ui.add(
            egui::Label::new(egui::RichText::new(title).strong())
                .truncate()
                .sense(egui::Sense::click()),
        );
        if !film.director.is_empty() {
            ui.label(
                egui::RichText::new(&film.director)
                    .small()
                    .color(egui::Color32::from_gray(150)),
            );
        }

        if resp.clicked() || label.clicked() {
            app.open_film(film_idx);
        }
    });
}
