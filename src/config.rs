use std::{env, fs, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CSV_SOURCE: &str = "Scene still DB - Sheet1.csv";
pub const DEFAULT_IMAGES_PER_ROW: usize = 4;
pub const DEFAULT_ROW_THRESHOLD: usize = 4;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// URL or local path of the gallery spreadsheet export.
    pub csv_source: String,
    pub cache_dir: Option<String>,
    pub download_dir: Option<String>,
    pub tmdb_api_key: Option<String>,
    /// Thumbnail grid geometry. Slider pagination kicks in above
    /// `images_per_row * row_threshold` stills.
    pub images_per_row: usize,
    pub row_threshold: usize,
    /// Overrides the computed rows-per-slide when set.
    pub rows_per_slide: Option<usize>,
    /// When true the zoom overlay fetches full resolution immediately
    /// instead of waiting for the "Load full size" button.
    pub auto_preload_full: bool,
    /// Forces the doubled (slow-network) image timeout schedule.
    pub assume_slow_network: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            csv_source: DEFAULT_CSV_SOURCE.to_string(),
            cache_dir: None,
            download_dir: None,
            tmdb_api_key: None,
            images_per_row: DEFAULT_IMAGES_PER_ROW,
            row_threshold: DEFAULT_ROW_THRESHOLD,
            rows_per_slide: None,
            auto_preload_full: false,
            assume_slow_network: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    csv_source: Option<String>,
    cache_dir: Option<String>,
    download_dir: Option<String>,
    tmdb_api_key: Option<String>,
    images_per_row: Option<usize>,
    row_threshold: Option<usize>,
    rows_per_slide: Option<usize>,
    auto_preload_full: Option<bool>,
    assume_slow_network: Option<bool>,
}

pub fn load_config() -> AppConfig {
    let cfg_path = PathBuf::from("config.json");
    let mut cfg = AppConfig::default();

    match fs::read_to_string(&cfg_path) {
        Ok(raw) => match serde_json::from_str::<RawConfig>(&raw) {
            Ok(parsed) => {
                if let Some(src) = parsed.csv_source {
                    cfg.csv_source = src;
                }
                if parsed.cache_dir.is_some() {
                    cfg.cache_dir = parsed.cache_dir;
                }
                if parsed.download_dir.is_some() {
                    cfg.download_dir = parsed.download_dir;
                }
                if parsed.tmdb_api_key.is_some() {
                    cfg.tmdb_api_key = parsed.tmdb_api_key;
                }
                if let Some(n) = parsed.images_per_row {
                    if n > 0 {
                        cfg.images_per_row = n;
                    } else {
                        warn!("images_per_row must be > 0; keeping default");
                    }
                }
                if let Some(n) = parsed.row_threshold {
                    if n > 0 {
                        cfg.row_threshold = n;
                    } else {
                        warn!("row_threshold must be > 0; keeping default");
                    }
                }
                if let Some(n) = parsed.rows_per_slide {
                    if n > 0 {
                        cfg.rows_per_slide = Some(n);
                    } else {
                        warn!("rows_per_slide must be > 0; ignoring override");
                    }
                }
                if let Some(b) = parsed.auto_preload_full {
                    cfg.auto_preload_full = b;
                }
                if let Some(b) = parsed.assume_slow_network {
                    cfg.assume_slow_network = b;
                }
                info!("Loaded config from {}", cfg_path.display());
            }
            Err(err) => {
                warn!("Failed to parse config.json ({}). Using defaults.", err);
            }
        },
        Err(_) => {
            info!("No config.json found; using defaults");
        }
    }

    cfg
}

/// Resolve a bare name next to the executable, falling back to the
/// working directory when the exe path is unavailable.
pub fn resolve_relative_path(name: &str) -> String {
    let base = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from));
    match base {
        Some(dir) => dir.join(name).to_string_lossy().into_owned(),
        None => name.to_string(),
    }
}
