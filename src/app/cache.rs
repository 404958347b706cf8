// src/app/cache.rs — on-disk image cache plus the namespaced TTL
// key/value store used by the metadata provider.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{load_config, resolve_relative_path};

static CACHE_DIR_ONCE: OnceLock<PathBuf> = OnceLock::new();
static STILL_DIR_ONCE: OnceLock<PathBuf> = OnceLock::new();
static STILL_PRUNE_ONCE: std::sync::Once = std::sync::Once::new();

const STILL_RETENTION_DAYS: u64 = 30;
const STILL_RETENTION_SECS: u64 = STILL_RETENTION_DAYS * 24 * 60 * 60;

pub fn cache_dir() -> PathBuf {
    CACHE_DIR_ONCE
        .get_or_init(|| {
            let cfg = load_config();
            let mut path = PathBuf::from(
                cfg.cache_dir
                    .clone()
                    .unwrap_or_else(|| resolve_relative_path(".stillview_cache")),
            );
            if let Err(e) = fs::create_dir_all(&path) {
                warn!("failed to create cache dir {}: {e}", path.display());
                path = PathBuf::from(resolve_relative_path(".stillview_cache"));
                let _ = fs::create_dir_all(&path);
            }
            path
        })
        .clone()
}

pub fn still_cache_dir() -> PathBuf {
    let dir = STILL_DIR_ONCE.get_or_init(|| {
        let mut path = cache_dir().join("stills");
        if let Err(e) = fs::create_dir_all(&path) {
            warn!("failed to create still cache dir {}: {e}", path.display());
            path = cache_dir();
        }
        path
    });

    STILL_PRUNE_ONCE.call_once({
        let path = dir.clone();
        move || {
            if let Err(err) = prune_still_cache_in_dir(&path) {
                warn!("still cache prune failed: {err}");
            }
        }
    });

    dir.clone()
}

fn prune_still_cache_in_dir(dir: &Path) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(STILL_RETENTION_SECS))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0usize;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let keep_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "webp"))
            .unwrap_or(false);
        if !keep_ext {
            // stray tmp/part files
            let _ = fs::remove_file(&path);
            removed += 1;
            continue;
        }
        let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if modified < cutoff {
            let _ = fs::remove_file(&path);
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn url_to_cache_key(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

pub fn find_cached_by_key(key: &str) -> Option<PathBuf> {
    let dir = still_cache_dir();
    for ext in ["jpg", "jpeg", "png", "webp"] {
        let p = dir.join(format!("{key}.{ext}"));
        if p.exists() {
            return Some(p);
        }
    }
    None
}

/// Decode a cached file into (width, height, RGBA8 bytes).
pub fn load_rgba_image(path: &Path) -> Result<(u32, u32, Vec<u8>), String> {
    let img = image::ImageReader::open(path)
        .map_err(|e| format!("open image {}: {e}", path.display()))?
        .with_guessed_format()
        .map_err(|e| format!("guess format {}: {e}", path.display()))?
        .decode()
        .map_err(|e| format!("decode {}: {e}", path.display()))?;
    let (w, h) = img.dimensions();
    Ok((w, h, img.to_rgba8().into_raw()))
}

/// Validate downloaded bytes as an image and store them under `key`,
/// keeping the source encoding. Writes `.part` then renames.
pub fn store_image_bytes(key: &str, bytes: &[u8]) -> Result<PathBuf, String> {
    let format = image::guess_format(bytes).map_err(|e| format!("not an image: {e}"))?;
    // decode to catch truncated bodies before they poison the cache
    image::load_from_memory(bytes).map_err(|e| format!("decode: {e}"))?;

    let ext = match format {
        image::ImageFormat::Png => "png",
        image::ImageFormat::WebP => "webp",
        _ => "jpg",
    };
    let dest = still_cache_dir().join(format!("{key}.{ext}"));
    if dest.exists() {
        return Ok(dest);
    }
    let tmp = dest.with_extension(format!("{ext}.part"));
    {
        let mut f = fs::File::create(&tmp).map_err(|e| format!("create {}: {e}", tmp.display()))?;
        f.write_all(bytes).map_err(|e| format!("write: {e}"))?;
    }
    fs::rename(&tmp, &dest).map_err(|e| format!("rename: {e}"))?;
    Ok(dest)
}

/// Fetch one image into the cache with a shared client. Cache hit wins.
pub fn download_and_store_with_client(
    client: &reqwest::blocking::Client,
    url: &str,
    key: &str,
    timeout: Duration,
) -> Result<PathBuf, String> {
    if let Some(found) = find_cached_by_key(key) {
        return Ok(found);
    }
    let bytes = client
        .get(url)
        .timeout(timeout)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| format!("download {url}: {e}"))?;
    store_image_bytes(key, &bytes)
}

// ---- TTL key/value store ----

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    v: serde_json::Value,
    /// Absolute expiry, epoch millis. None = never expires.
    e: Option<i64>,
}

#[derive(Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, CacheEntry>,
}

/// Namespaced key/value cache with per-entry expiry, persisted as one
/// JSON file per namespace under the cache dir. Reads past expiry
/// delete the entry and miss; corruption loads as an empty cache.
pub struct TtlCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl TtlCache {
    pub fn open(namespace: &str) -> Self {
        Self::with_file(cache_dir().join(format!("{namespace}_cache.json")))
    }

    pub fn with_file(path: PathBuf) -> Self {
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<CacheFile>(&bytes)
                .map(|f| f.entries)
                .unwrap_or_else(|err| {
                    warn!("corrupt cache file {} ({err}); starting empty", path.display());
                    HashMap::new()
                }),
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        let expires = ttl.map(|d| Self::now_ms() + d.as_millis() as i64);
        self.entries
            .insert(key.to_string(), CacheEntry { v: value, e: expires });
        self.save();
    }

    pub fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.e.is_some_and(|e| Self::now_ms() >= e),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            self.save();
            return None;
        }
        self.entries.get(key).map(|entry| entry.v.clone())
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.save();
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.save();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) {
        let file = CacheFile {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        CacheEntry {
                            v: v.v.clone(),
                            e: v.e,
                        },
                    )
                })
                .collect(),
        };
        let data = match serde_json::to_vec(&file) {
            Ok(d) => d,
            Err(err) => {
                warn!("cache serialize failed: {err}");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = self.path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp, &data).and_then(|()| fs::rename(&tmp, &self.path)) {
            warn!("cache persist failed for {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_roundtrip_and_persistence() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("meta_cache.json");
        {
            let mut cache = TtlCache::with_file(path.clone());
            cache.set("movie:42", json!({"title": "Alien"}), None);
            assert_eq!(cache.get("movie:42"), Some(json!({"title": "Alien"})));
        }
        // fresh open reads the persisted file
        let mut reopened = TtlCache::with_file(path);
        assert_eq!(reopened.get("movie:42"), Some(json!({"title": "Alien"})));
    }

    #[test]
    fn zero_ttl_misses_on_next_get() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = TtlCache::with_file(dir.path().join("c.json"));
        cache.set("k", json!(1), Some(Duration::ZERO));
        assert_eq!(cache.get("k"), None);
        // eager delete on read
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entry_is_deleted_eagerly() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        {
            let mut cache = TtlCache::with_file(path.clone());
            cache.set("stale", json!("x"), Some(Duration::ZERO));
            cache.set("fresh", json!("y"), Some(Duration::from_secs(3600)));
        }
        let mut cache = TtlCache::with_file(path);
        assert_eq!(cache.get("stale"), None);
        assert_eq!(cache.get("fresh"), Some(json!("y")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        fs::write(&path, b"{not json").unwrap();
        let mut cache = TtlCache::with_file(path);
        assert!(cache.is_empty());
        assert_eq!(cache.get("anything"), None);
    }

    #[test]
    fn remove_and_clear() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = TtlCache::with_file(dir.path().join("c.json"));
        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);
        cache.remove("a");
        assert_eq!(cache.get("a"), None);
        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_keys_are_stable_md5() {
        let k = url_to_cache_key("https://example.com/a.jpg");
        assert_eq!(k.len(), 32);
        assert_eq!(k, url_to_cache_key("https://example.com/a.jpg"));
        assert_ne!(k, url_to_cache_key("https://example.com/b.jpg"));
    }
}
