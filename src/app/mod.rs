// src/app/mod.rs — application state and the per-frame update loop.
// Background threads talk to the UI thread over mpsc channels that are
// drained here, a bounded amount per frame.

pub mod cache;
pub mod csv;
pub mod films;
pub mod http;
pub mod nav;
pub mod palette;
pub mod pipeline;
pub mod prefs;
pub mod slider;
pub mod tmdb;
pub mod types;
pub mod ui;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{load_config, resolve_relative_path, AppConfig};
use cache::{download_and_store_with_client, find_cached_by_key, url_to_cache_key};
use nav::{NavAction, Navigator, ViewerMode};
use pipeline::{fetch_with_schedule, Pipeline, TimeoutSchedule};
use prefs::{PrefsSaver, UiPrefs};
use slider::SliderLayout;
use types::{
    BootPhase, DownloadDone, FilmRecord, FilmsMsg, ImageAsset, PaletteDone, PipelineEvent,
    PosterDone, PosterSlot, PosterState, Tier, TierDone, ZoomDone,
};

/// Texture uploads allowed per frame; keeps paint latency flat while a
/// burst of images lands.
const MAX_UPLOADS_PER_FRAME: usize = 4;
const MAX_EVENTS_PER_FRAME: usize = 16;
const POSTER_WORKERS: usize = 8;
const POSTER_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Delay before the background preview / full pass starts, so the
/// thumbnails the user actually sees go first.
const PREVIEW_PASS_DELAY: Duration = Duration::from_millis(500);
const COPY_FLASH: Duration = Duration::from_millis(1200);
const ALERT_TTL: Duration = Duration::from_secs(4);

type PosterJob = (usize, String, String); // film index, url, cache key

pub struct StillApp {
    pub cfg: AppConfig,
    pub boot_phase: BootPhase,

    // catalog
    pub films: Vec<FilmRecord>,
    pub posters: Vec<PosterSlot>,
    films_rx: Option<Receiver<FilmsMsg>>,
    pub loading_progress: Option<(usize, usize)>,
    pub films_error: Option<String>,

    // gallery controls, persisted across runs
    pub prefs: UiPrefs,
    prefs_saver: PrefsSaver,

    // poster prefetch pool
    poster_tx: Option<Sender<PosterJob>>,
    poster_rx: Option<Receiver<PosterDone>>,

    // open film
    pub open_film_idx: Option<usize>,
    pub assets: Vec<ImageAsset>,
    pub nav: Navigator,
    pub layout: SliderLayout,
    pub current_slide: usize,
    opened_at: Option<Instant>,
    preview_pass_done: bool,

    pipeline: Pipeline,

    // palette for the current still
    pub palette_colors: Vec<[u8; 3]>,
    pub copied_hex: Option<(String, Instant)>,
    palette_rx: Option<Receiver<PaletteDone>>,
    palette_asset: Option<usize>,

    // zoom full-size load / save-to-disk
    zoom_token: u64,
    pub zoom_loading: bool,
    zoom_rx: Option<Receiver<ZoomDone>>,
    download_token: u64,
    pub download_in_progress: bool,
    download_cancel: Arc<AtomicBool>,
    download_rx: Option<Receiver<DownloadDone>>,

    pub overlay_alert: Option<(String, Instant)>,
    pub slow_notice: bool,
    /// Accumulated drag distance of the in-progress swipe.
    pub drag_accum: egui::Vec2,

    shared_client: reqwest::blocking::Client,
    uploads_this_frame: usize,
    did_init: bool,
}

impl Default for StillApp {
    fn default() -> Self {
        let cfg = load_config();
        let pipeline = Pipeline::new(cfg.assume_slow_network);
        Self {
            cfg,
            boot_phase: BootPhase::Starting,
            films: Vec::new(),
            posters: Vec::new(),
            films_rx: None,
            loading_progress: None,
            films_error: None,
            prefs: UiPrefs::default(),
            prefs_saver: PrefsSaver::default(),
            poster_tx: None,
            poster_rx: None,
            open_film_idx: None,
            assets: Vec::new(),
            nav: Navigator::new(0),
            layout: SliderLayout::default(),
            current_slide: 0,
            opened_at: None,
            preview_pass_done: false,
            pipeline,
            palette_colors: Vec::new(),
            copied_hex: None,
            palette_rx: None,
            palette_asset: None,
            zoom_token: 0,
            zoom_loading: false,
            zoom_rx: None,
            download_token: 0,
            download_in_progress: false,
            download_cancel: Arc::new(AtomicBool::new(false)),
            download_rx: None,
            overlay_alert: None,
            slow_notice: false,
            drag_accum: egui::Vec2::ZERO,
            shared_client: http::build_client(films::USER_AGENT),
            uploads_this_frame: 0,
            did_init: false,
        }
    }
}

impl StillApp {
    fn init_once(&mut self) {
        if self.did_init {
            return;
        }
        self.did_init = true;
        self.prefs = UiPrefs::load();
        self.boot_phase = BootPhase::LoadingFilms;

        let (tx, rx) = channel();
        self.films_rx = Some(rx);
        films::start_film_load(tx, self.cfg.clone());

        self.spawn_poster_pool();
    }

    fn spawn_poster_pool(&mut self) {
        let (job_tx, job_rx) = channel::<PosterJob>();
        let (done_tx, done_rx) = channel::<PosterDone>();
        let shared_rx = Arc::new(Mutex::new(job_rx));
        for worker in 0..POSTER_WORKERS {
            let rx = Arc::clone(&shared_rx);
            let tx = done_tx.clone();
            let client = self.shared_client.clone();
            thread::Builder::new()
                .name(format!("poster-fetch-{worker}"))
                .spawn(move || loop {
                    let (film_idx, url, key) = {
                        let Ok(guard) = rx.lock() else { return };
                        match guard.recv() {
                            Ok(job) => job,
                            Err(_) => return,
                        }
                    };
                    let result =
                        download_and_store_with_client(&client, &url, &key, POSTER_FETCH_TIMEOUT);
                    if tx.send(PosterDone { film_idx, result }).is_err() {
                        return;
                    }
                })
                .ok();
        }
        self.poster_tx = Some(job_tx);
        self.poster_rx = Some(done_rx);
    }

    fn build_posters(&mut self) {
        self.posters = self
            .films
            .iter()
            .map(|f| {
                let key = url_to_cache_key(&f.poster_url);
                let path = find_cached_by_key(&key);
                let state = if f.poster_url.is_empty() {
                    PosterState::Failed
                } else if path.is_some() {
                    PosterState::Cached
                } else {
                    PosterState::Pending
                };
                PosterSlot {
                    url: f.poster_url.clone(),
                    key,
                    path,
                    tex: None,
                    state,
                }
            })
            .collect();

        if let Some(tx) = &self.poster_tx {
            for (i, slot) in self.posters.iter().enumerate() {
                if slot.state == PosterState::Pending {
                    let _ = tx.send((i, slot.url.clone(), slot.key.clone()));
                }
            }
        }
    }

    // ---- channel drains, one bounded pass per frame ----

    fn poll_films(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.films_rx.take() else {
            return;
        };
        let mut finished = false;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                FilmsMsg::Progress { done, total } => {
                    self.loading_progress = Some((done, total));
                }
                FilmsMsg::Done(films) => {
                    info!("catalog ready with {} films", films.len());
                    self.films = films;
                    self.boot_phase = BootPhase::Ready;
                    self.build_posters();
                    finished = true;
                }
                FilmsMsg::Error(err) => {
                    warn!("film load failed: {err}");
                    self.films_error = Some(err);
                    self.boot_phase = BootPhase::Ready;
                    finished = true;
                }
            }
            ctx.request_repaint();
        }
        if !finished {
            self.films_rx = Some(rx);
        }
    }

    fn poll_posters(&mut self, ctx: &egui::Context) {
        let Some(rx) = &self.poster_rx else { return };
        for _ in 0..MAX_EVENTS_PER_FRAME {
            match rx.try_recv() {
                Ok(PosterDone { film_idx, result }) => {
                    if let Some(slot) = self.posters.get_mut(film_idx) {
                        match result {
                            Ok(path) => {
                                slot.path = Some(path);
                                slot.state = PosterState::Cached;
                            }
                            Err(err) => {
                                warn!("poster fetch failed for film {film_idx}: {err}");
                                slot.state = PosterState::Failed;
                            }
                        }
                    }
                    ctx.request_repaint();
                }
                Err(_) => break,
            }
        }
    }

    fn poll_pipeline(&mut self, ctx: &egui::Context) {
        let events = self.pipeline.poll_events(MAX_EVENTS_PER_FRAME);
        if events.is_empty() {
            return;
        }
        for event in events {
            match event {
                PipelineEvent::TierLoaded(TierDone {
                    asset_idx,
                    tier,
                    result,
                }) => {
                    let Some(asset) = self.assets.get_mut(asset_idx) else {
                        continue;
                    };
                    match result {
                        Ok(path) => asset.mark_loaded(tier, path),
                        Err(err) => {
                            warn!("tier load failed for still {asset_idx}: {err}");
                            if tier == Tier::Thumbnail && !asset.loaded(Tier::Thumbnail) {
                                asset.terminally_failed = true;
                            }
                        }
                    }
                }
                PipelineEvent::SlowNetwork(slow) => self.slow_notice = slow,
            }
        }
        ctx.request_repaint();
    }

    fn poll_palette(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.palette_rx.take() else {
            return;
        };
        let mut finished = false;
        while let Ok(PaletteDone { asset_idx, colors }) = rx.try_recv() {
            finished = true;
            if Some(asset_idx) == self.palette_asset {
                self.palette_colors = colors;
                ctx.request_repaint();
            }
        }
        if !finished {
            self.palette_rx = Some(rx);
        }
    }

    fn poll_zoom(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.zoom_rx.take() else {
            return;
        };
        let mut finished = false;
        while let Ok(ZoomDone { token, result }) = rx.try_recv() {
            finished = true;
            if token != self.zoom_token {
                continue; // superseded by a later slide change
            }
            self.zoom_loading = false;
            match result {
                Ok(path) => {
                    let idx = self.nav.state.current();
                    if let Some(asset) = self.assets.get_mut(idx) {
                        asset.mark_loaded(Tier::Full, path);
                    }
                }
                Err(err) => {
                    self.show_alert(format!("Full-size load failed: {err}"));
                }
            }
            ctx.request_repaint();
        }
        if !finished {
            self.zoom_rx = Some(rx);
        }
    }

    fn poll_download(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.download_rx.take() else {
            return;
        };
        let mut finished = false;
        while let Ok(DownloadDone { token, result }) = rx.try_recv() {
            finished = true;
            if token != self.download_token {
                continue;
            }
            self.download_in_progress = false;
            match result {
                Ok(path) => self.show_alert(format!("Saved to {}", path.display())),
                Err(err) if err == "cancelled" => {}
                Err(err) => self.show_alert(format!("Download failed: {err}")),
            }
            ctx.request_repaint();
        }
        if !finished {
            self.download_rx = Some(rx);
        }
    }

    // ---- film page lifecycle ----

    pub fn open_film(&mut self, film_idx: usize) {
        let Some(film) = self.films.get(film_idx) else {
            return;
        };
        self.open_film_idx = Some(film_idx);
        self.assets = film
            .stills
            .iter()
            .map(|url| ImageAsset::new(url.clone(), film.has_preview_tier))
            .collect();
        self.nav = Navigator::new(self.assets.len());
        self.layout = SliderLayout::compute(
            self.assets.len(),
            self.cfg.images_per_row,
            self.cfg.row_threshold,
            self.cfg.rows_per_slide,
        );
        self.current_slide = 0;
        self.opened_at = Some(Instant::now());
        self.preview_pass_done = false;
        self.palette_colors.clear();
        self.palette_asset = None;
        self.copied_hex = None;
        self.slow_notice = false;
        self.pipeline.reset(self.assets.len());
        self.cancel_zoom_load();
        self.on_index_changed();
    }

    pub fn close_film(&mut self) {
        self.open_film_idx = None;
        self.assets.clear();
        self.nav = Navigator::new(0);
        self.palette_colors.clear();
        self.palette_asset = None;
        self.pipeline.reset(0);
        self.cancel_zoom_load();
        self.cancel_download();
    }

    /// Runs after every slide change: load the new still and its
    /// neighbors, sync the slider page, drop stale palette state.
    pub fn on_index_changed(&mut self) {
        let len = self.assets.len();
        if len == 0 {
            return;
        }
        let current = self.nav.state.current();
        self.current_slide = self.layout.slide_for_index(current);
        self.palette_colors.clear();
        self.palette_asset = None;
        self.cancel_zoom_load();

        let neighbors = [current, (current + 1) % len, (current + len - 1) % len];
        for &idx in &neighbors {
            self.request_tiers(idx, idx == current);
        }

        // warm the thumbnails of the slides either side of this one
        for slide in self.layout.neighbor_slides(self.current_slide) {
            let range = self.layout.slide_range(slide);
            for idx in range {
                self.request_thumbnail(idx);
            }
        }
    }

    fn request_tiers(&mut self, idx: usize, is_current: bool) {
        let Some(asset) = self.assets.get(idx) else {
            return;
        };
        if asset.terminally_failed {
            return;
        }
        let thumb_url = asset.thumb_url.clone();
        let preview_url = asset.preview_url.clone();
        let full_url = asset.full_url.clone();
        let wants_full = self.cfg.auto_preload_full || is_current;

        if !self.assets[idx].loaded(Tier::Thumbnail) {
            self.pipeline.request(idx, Tier::Thumbnail, &thumb_url);
        }
        if let Some(preview) = preview_url {
            if !self.assets[idx].loaded(Tier::Preview) {
                self.pipeline.request(idx, Tier::Preview, &preview);
            }
        }
        if wants_full && !self.assets[idx].loaded(Tier::Full) {
            if is_current {
                self.pipeline.prioritize_full(idx, &full_url);
            } else {
                self.pipeline.enqueue_full(idx, &full_url);
            }
            self.pipeline.pump();
        }
    }

    /// Clear a failed still and run its loads again from scratch.
    pub fn retry_current(&mut self) {
        let idx = self.nav.state.current();
        let Some(asset) = self.assets.get_mut(idx) else {
            return;
        };
        asset.reset();
        self.request_tiers(idx, true);
    }

    /// Lazy request from the thumbnail grid, fired when a cell scrolls
    /// near the viewport.
    pub fn request_thumbnail(&mut self, idx: usize) {
        let Some(asset) = self.assets.get(idx) else {
            return;
        };
        if asset.loaded(Tier::Thumbnail) || asset.terminally_failed {
            return;
        }
        let url = asset.thumb_url.clone();
        self.pipeline.request(idx, Tier::Thumbnail, &url);
    }

    /// After a short settle delay, warm the rest of the open film:
    /// previews for every still, and full resolution too when
    /// auto-preload is on.
    fn tick_background_pass(&mut self) {
        if self.preview_pass_done || self.open_film_idx.is_none() {
            return;
        }
        let settled = self
            .opened_at
            .is_some_and(|at| at.elapsed() >= PREVIEW_PASS_DELAY);
        if !settled {
            return;
        }
        self.preview_pass_done = true;
        for idx in 0..self.assets.len() {
            let asset = &self.assets[idx];
            if asset.terminally_failed {
                continue;
            }
            let preview = asset.preview_url.clone();
            match preview {
                Some(preview) => {
                    if !asset.loaded(Tier::Preview) {
                        self.pipeline.request(idx, Tier::Preview, &preview);
                    }
                    if self.cfg.auto_preload_full && !self.assets[idx].loaded(Tier::Full) {
                        let full = self.assets[idx].full_url.clone();
                        self.pipeline.enqueue_full(idx, &full);
                    }
                }
                // no intermediate tier: thumbnails upgrade straight to full
                None => {
                    if !asset.loaded(Tier::Full) {
                        let full = asset.full_url.clone();
                        self.pipeline.enqueue_full(idx, &full);
                    }
                }
            }
        }
        self.pipeline.pump();
    }

    /// Kick a palette job once the current still has any image on disk.
    fn tick_palette(&mut self) {
        if self.open_film_idx.is_none() || self.palette_rx.is_some() {
            return;
        }
        let current = self.nav.state.current();
        if self.palette_asset == Some(current) {
            return;
        }
        let Some(path) = self.assets.get(current).and_then(|a| a.path.clone()) else {
            return;
        };
        self.palette_asset = Some(current);
        let (tx, rx) = channel();
        self.palette_rx = Some(rx);
        thread::spawn(move || {
            let colors = palette::palette_from_path(&path);
            let _ = tx.send(PaletteDone {
                asset_idx: current,
                colors,
            });
        });
    }

    pub fn apply_nav(&mut self, action: NavAction) {
        let outcome = self.nav.apply(action);
        if outcome.index_changed {
            self.on_index_changed();
        }
        if outcome.opened_zoom && !self.cfg.auto_preload_full {
            // opening the overlay is a strong signal; jump the queue
            let idx = self.nav.state.current();
            if let Some(asset) = self.assets.get(idx) {
                if !asset.loaded(Tier::Full) {
                    let url = asset.full_url.clone();
                    self.pipeline.prioritize_full(idx, &url);
                    self.pipeline.pump();
                }
            }
        }
        if outcome.closed_zoom {
            self.cancel_zoom_load();
            self.cancel_download();
        }
    }

    // ---- zoom full-size load and save-to-disk ----

    /// Explicit "load full size now", bypassing the upgrade queue with
    /// the stretched user-initiated timeouts.
    pub fn start_zoom_load(&mut self) {
        let idx = self.nav.state.current();
        let Some(asset) = self.assets.get(idx) else {
            return;
        };
        if asset.loaded(Tier::Full) || self.zoom_loading {
            return;
        }
        self.zoom_token += 1;
        self.zoom_loading = true;
        let token = self.zoom_token;
        let url = asset.full_url.clone();
        let client = self.shared_client.clone();
        let meter = self.pipeline.meter();
        let notify = self.pipeline.notifier();
        let slow = self.pipeline.is_slow();
        let (tx, rx) = channel();
        self.zoom_rx = Some(rx);
        thread::spawn(move || {
            let schedule = TimeoutSchedule::user_initiated(slow);
            let result = fetch_with_schedule(&client, &meter, &url, &schedule, &notify);
            let _ = tx.send(ZoomDone { token, result });
        });
    }

    fn cancel_zoom_load(&mut self) {
        // the worker finishes on its own; bumping the token makes its
        // result stale
        self.zoom_token += 1;
        self.zoom_loading = false;
    }

    pub fn start_download(&mut self) {
        // a new request aborts whatever is still streaming
        self.cancel_download();
        let idx = self.nav.state.current();
        let Some(asset) = self.assets.get(idx) else {
            return;
        };
        let url = asset.full_url.clone();
        let file_name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("still.jpg")
            .to_string();
        let dir = PathBuf::from(
            self.cfg
                .download_dir
                .clone()
                .unwrap_or_else(|| resolve_relative_path("downloads")),
        );
        if let Err(err) = std::fs::create_dir_all(&dir) {
            self.show_alert(format!("Cannot create {}: {err}", dir.display()));
            return;
        }
        let dest = dir.join(file_name);

        self.download_token += 1;
        self.download_in_progress = true;
        self.download_cancel = Arc::new(AtomicBool::new(false));
        let token = self.download_token;
        let cancel = Arc::clone(&self.download_cancel);
        let client = self.shared_client.clone();
        let (tx, rx) = channel();
        self.download_rx = Some(rx);
        thread::spawn(move || {
            let result = pipeline::download_to_file(&client, &url, &dest, &cancel).map(|()| dest);
            let _ = tx.send(DownloadDone { token, result });
        });
    }

    pub fn cancel_download(&mut self) {
        if self.download_in_progress {
            self.download_cancel.store(true, Ordering::Relaxed);
            self.download_in_progress = false;
            self.download_token += 1;
        }
    }

    // ---- small shared helpers ----

    pub fn mark_prefs_dirty(&mut self) {
        self.prefs_saver.mark_dirty();
    }

    pub fn show_alert(&mut self, message: String) {
        self.overlay_alert = Some((message, Instant::now()));
    }

    pub fn active_alert(&mut self) -> Option<String> {
        match &self.overlay_alert {
            Some((msg, at)) if at.elapsed() < ALERT_TTL => Some(msg.clone()),
            Some(_) => {
                self.overlay_alert = None;
                None
            }
            None => None,
        }
    }

    pub fn copy_hex(&mut self, ctx: &egui::Context, hex: &str) {
        ctx.copy_text(hex.to_string());
        self.copied_hex = Some((hex.to_string(), Instant::now()));
    }

    pub fn recently_copied(&mut self) -> Option<String> {
        match &self.copied_hex {
            Some((hex, at)) if at.elapsed() < COPY_FLASH => Some(hex.clone()),
            Some(_) => {
                self.copied_hex = None;
                None
            }
            None => None,
        }
    }

    /// Upload one cached image as a texture, respecting the per-frame
    /// budget. Returns None when the budget is spent.
    fn upload_budgeted(
        &mut self,
        ctx: &egui::Context,
        path: &std::path::Path,
        name: &str,
    ) -> Option<egui::TextureHandle> {
        if self.uploads_this_frame >= MAX_UPLOADS_PER_FRAME {
            ctx.request_repaint();
            return None;
        }
        match cache::load_rgba_image(path) {
            Ok((w, h, rgba)) => {
                self.uploads_this_frame += 1;
                let image =
                    egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], &rgba);
                Some(ctx.load_texture(name, image, egui::TextureOptions::LINEAR))
            }
            Err(err) => {
                warn!("texture upload failed for {name}: {err}");
                None
            }
        }
    }

    /// Ensure the asset at `idx` has a texture for its best loaded
    /// tier. Returns a clone of the handle when available.
    pub fn ensure_asset_texture(
        &mut self,
        ctx: &egui::Context,
        idx: usize,
    ) -> Option<egui::TextureHandle> {
        let path = {
            let asset = self.assets.get(idx)?;
            if let Some(tex) = &asset.tex {
                return Some(tex.clone());
            }
            asset.path.clone()?
        };
        let tex = self.upload_budgeted(ctx, &path, &format!("still-{idx}"))?;
        if let Some(asset) = self.assets.get_mut(idx) {
            asset.tex = Some(tex.clone());
        }
        Some(tex)
    }

    pub fn ensure_poster_texture(
        &mut self,
        ctx: &egui::Context,
        idx: usize,
    ) -> Option<egui::TextureHandle> {
        let path = {
            let slot = self.posters.get(idx)?;
            if let Some(tex) = &slot.tex {
                return Some(tex.clone());
            }
            if slot.state == PosterState::Failed {
                return None;
            }
            slot.path.clone()?
        };
        let tex = self.upload_budgeted(ctx, &path, &format!("poster-{idx}"))?;
        if let Some(slot) = self.posters.get_mut(idx) {
            slot.tex = Some(tex.clone());
            slot.state = PosterState::Ready;
        }
        Some(tex)
    }
}

impl eframe::App for StillApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.prefs_saver.flush(&self.prefs);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.init_once();
        self.uploads_this_frame = 0;

        self.poll_films(ctx);
        self.poll_posters(ctx);
        self.poll_pipeline(ctx);
        self.poll_palette(ctx);
        self.poll_zoom(ctx);
        self.poll_download(ctx);
        self.tick_background_pass();
        self.tick_palette();
        self.prefs_saver.tick(&self.prefs);

        match self.boot_phase {
            BootPhase::Starting | BootPhase::LoadingFilms => ui::show_splash(self, ctx),
            BootPhase::Ready => {
                if self.open_film_idx.is_some() {
                    ui::film::show(self, ctx);
                    if self.nav.mode == ViewerMode::Zoomed {
                        ui::zoom::show(self, ctx);
                    }
                } else {
                    ui::gallery::show(self, ctx);
                }
            }
        }
    }
}
