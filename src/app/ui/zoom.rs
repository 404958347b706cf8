// src/app/ui/zoom.rs — fullscreen overlay for the current still.
// Arrow keys and Escape are only live here.

use crate::app::nav::{classify_click, NavAction, NavKey};
use crate::app::types::Tier;
use crate::app::StillApp;

pub fn show(app: &mut StillApp, ctx: &egui::Context) {
    let mut pending: Vec<NavAction> = Vec::new();
    ctx.input(|i| {
        for (key, nav_key) in [
            (egui::Key::ArrowLeft, NavKey::Left),
            (egui::Key::ArrowRight, NavKey::Right),
            (egui::Key::Escape, NavKey::Escape),
        ] {
            if i.key_pressed(key) {
                if let Some(action) = app.nav.key_action(nav_key) {
                    pending.push(action);
                }
            }
        }
    });
    for action in pending {
        app.apply_nav(action);
    }

    let screen = ctx.screen_rect();
    egui::Area::new(egui::Id::new("zoom_overlay"))
        .order(egui::Order::Foreground)
        .fixed_pos(screen.min)
        .show(ctx, |ui| {
            ui.set_min_size(screen.size());
            ui.painter()
                .rect_filled(screen, 0.0, egui::Color32::from_black_alpha(235));

            let current = app.nav.state.current();
            let full_loaded = app
                .assets
                .get(current)
                .map(|a| a.loaded(Tier::Full))
                .unwrap_or(false);

            let image_rect = screen.shrink(24.0);
            match app.ensure_asset_texture(ctx, current) {
                Some(tex) => {
                    let size = super::fit_size(tex.size_vec2(), image_rect.size());
                    let rect = egui::Rect::from_center_size(image_rect.center(), size);
                    egui::Image::new(&tex).paint_at(ui, rect);
                }
                None => {
                    egui::Spinner::new().paint_at(
                        ui,
                        egui::Rect::from_center_size(screen.center(), egui::vec2(32.0, 32.0)),
                    );
                }
            }

            // click zones over the whole overlay; middle click closes
            let resp = ui.allocate_rect(image_rect, egui::Sense::click());
            if resp.clicked() {
                if let Some(pos) = resp.interact_pointer_pos() {
                    let action = match classify_click(pos.x - image_rect.left(), image_rect.width())
                    {
                        NavAction::OpenZoom => NavAction::CloseZoom,
                        other => other,
                    };
                    app.apply_nav(action);
                }
            }

            draw_controls(app, ui, screen, full_loaded);
        });
}

/// Which controls the overlay bar shows for the current load state.
/// Saving streams the original file to disk, so it is offered even
/// before (or without) the full-resolution view loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BarControls {
    save: bool,
    cancel: bool,
    load_full: bool,
    loading: bool,
}

fn bar_controls(
    full_loaded: bool,
    zoom_loading: bool,
    auto_preload: bool,
    downloading: bool,
) -> BarControls {
    BarControls {
        save: !downloading,
        cancel: downloading,
        load_full: !full_loaded && !zoom_loading && !auto_preload,
        loading: !full_loaded && zoom_loading,
    }
}

fn draw_controls(app: &mut StillApp, ui: &mut egui::Ui, screen: egui::Rect, full_loaded: bool) {
    let bar = egui::Rect::from_min_max(
        egui::pos2(screen.left() + 12.0, screen.top() + 8.0),
        egui::pos2(screen.right() - 12.0, screen.top() + 44.0),
    );
    let mut bar_ui = ui.child_ui(bar, egui::Layout::left_to_right(egui::Align::Center), None);

    if bar_ui.button("✕ Close").clicked() {
        app.apply_nav(NavAction::CloseZoom);
        return;
    }
    bar_ui.separator();

    let controls = bar_controls(
        full_loaded,
        app.zoom_loading,
        app.cfg.auto_preload_full,
        app.download_in_progress,
    );

    if full_loaded {
        bar_ui.label(egui::RichText::new("Full resolution").small());
    }
    if controls.loading {
        bar_ui.spinner();
        bar_ui.label("Loading full size…");
    } else if controls.load_full && bar_ui.button("Load full size").clicked() {
        app.start_zoom_load();
    }
    if controls.cancel {
        bar_ui.spinner();
        if bar_ui.button("Cancel download").clicked() {
            app.cancel_download();
        }
    } else if controls.save && bar_ui.button("⬇ Save image").clicked() {
        app.start_download();
    }

    if app.slow_notice {
        bar_ui.separator();
        bar_ui.colored_label(egui::Color32::YELLOW, "⚠ slow connection");
    }
    if let Some(alert) = app.active_alert() {
        bar_ui.separator();
        bar_ui.colored_label(egui::Color32::LIGHT_RED, alert);
    }

    let current = app.nav.state.current() + 1;
    let total = app.assets.len();
    ui.painter().text(
        egui::pos2(screen.center().x, screen.bottom() - 16.0),
        egui::Align2::CENTER_CENTER,
        format!("{current} / {total}"),
        egui::FontId::proportional(13.0),
        egui::Color32::from_gray(180),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_is_offered_before_full_resolution_loads() {
        let c = bar_controls(false, false, false, false);
        assert!(c.save);
        assert!(c.load_full);
        assert!(!c.cancel && !c.loading);
    }

    #[test]
    fn downloading_swaps_save_for_cancel() {
        let c = bar_controls(false, false, false, true);
        assert!(!c.save);
        assert!(c.cancel);
        // the explicit load button is still there
        assert!(c.load_full);
    }

    #[test]
    fn loading_state_replaces_load_button() {
        let c = bar_controls(false, true, false, false);
        assert!(c.loading);
        assert!(!c.load_full);
        assert!(c.save);
    }

    #[test]
    fn auto_preload_hides_the_load_button() {
        let c = bar_controls(false, false, true, false);
        assert!(!c.load_full);
        assert!(c.save);
    }

    #[test]
    fn full_resolution_leaves_only_save() {
        let c = bar_controls(true, false, false, false);
        assert!(c.save);
        assert!(!c.load_full && !c.loading && !c.cancel);
    }
}
