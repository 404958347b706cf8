// src/app/prefs.rs — tiny key=value persistence for gallery view
// settings. Saves are debounced so typing in the search box does not
// hammer the disk.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::app::cache::cache_dir;
use crate::app::types::SortKey;

const PREFS_FILE: &str = "ui_prefs.txt";
const SAVE_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone, Debug, PartialEq)]
pub struct UiPrefs {
    pub search: String,
    pub sort_key: SortKey,
    pub sort_desc: bool,
    pub grid_cols: usize,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_key: SortKey::Title,
            sort_desc: false,
            grid_cols: 5,
        }
    }
}

fn prefs_path() -> PathBuf {
    cache_dir().join(PREFS_FILE)
}

impl UiPrefs {
    pub fn load() -> Self {
        Self::load_from(&prefs_path())
    }

    fn load_from(path: &PathBuf) -> Self {
        let mut prefs = Self::default();
        let Ok(text) = fs::read_to_string(path) else {
            return prefs;
        };
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "search" => prefs.search = value.to_string(),
                "sort_key" => {
                    if let Some(k) = SortKey::from_str(value.trim()) {
                        prefs.sort_key = k;
                    }
                }
                "sort_desc" => prefs.sort_desc = value.trim() == "1",
                "grid_cols" => {
                    if let Ok(n) = value.trim().parse::<usize>() {
                        prefs.grid_cols = n.clamp(2, 10);
                    }
                }
                _ => {}
            }
        }
        prefs
    }

    pub fn save(&self) {
        self.save_to(&prefs_path());
    }

    fn save_to(&self, path: &PathBuf) {
        let body = format!(
            "search={}\nsort_key={}\nsort_desc={}\ngrid_cols={}\n",
            self.search,
            self.sort_key.as_str(),
            if self.sort_desc { "1" } else { "0" },
            self.grid_cols,
        );
        if let Err(err) = fs::write(path, body) {
            warn!("failed to save prefs to {}: {err}", path.display());
        }
    }
}

/// Debounce wrapper. Call `mark_dirty` on any change and `tick` every
/// frame; the actual write happens once changes pause for 300ms.
#[derive(Default)]
pub struct PrefsSaver {
    dirty_since: Option<Instant>,
}

impl PrefsSaver {
    pub fn mark_dirty(&mut self) {
        self.dirty_since = Some(Instant::now());
    }

    pub fn tick(&mut self, prefs: &UiPrefs) {
        if let Some(since) = self.dirty_since {
            if since.elapsed() >= SAVE_DEBOUNCE {
                prefs.save();
                self.dirty_since = None;
            }
        }
    }

    /// Immediate write of anything pending, used on shutdown.
    pub fn flush(&mut self, prefs: &UiPrefs) {
        if self.dirty_since.take().is_some() {
            prefs.save();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefs_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(PREFS_FILE);
        let prefs = UiPrefs {
            search: "weaver".into(),
            sort_key: SortKey::Year,
            sort_desc: true,
            grid_cols: 7,
        };
        prefs.save_to(&path);
        assert_eq!(UiPrefs::load_from(&path), prefs);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nope.txt");
        assert_eq!(UiPrefs::load_from(&path), UiPrefs::default());
    }

    #[test]
    fn bad_values_fall_back_per_field() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(PREFS_FILE);
        fs::write(&path, "sort_key=banana\ngrid_cols=99\nsearch=ok\nnoise line\n").unwrap();
        let prefs = UiPrefs::load_from(&path);
        assert_eq!(prefs.sort_key, SortKey::Title);
        assert_eq!(prefs.grid_cols, 10); // clamped
        assert_eq!(prefs.search, "ok");
    }
}
