// src/app/types.rs
use std::path::PathBuf;

use eframe::egui::TextureHandle;

// ---- film data ----

#[derive(Clone, Debug, Default)]
pub struct FilmRecord {
    pub movie_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub poster_url: String,
    pub director: String,
    pub cinematographer: String,
    pub cast: Vec<String>,
    /// Full-resolution still URLs, in gallery order.
    pub stills: Vec<String>,
    /// Whether an intermediate webp tier exists for this film's stills.
    pub has_preview_tier: bool,
    /// Cast + crew names merged from metadata enrichment; used by search.
    pub cast_and_crew: Vec<String>,
}

impl FilmRecord {
    /// Recompute the searchable name list from the credit fields.
    /// Enrichment may append further names afterwards.
    pub fn rebuild_cast_and_crew(&mut self) {
        let mut names: Vec<String> = Vec::new();
        for name in [self.director.as_str(), self.cinematographer.as_str()]
            .into_iter()
            .chain(self.cast.iter().map(String::as_str))
        {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        self.cast_and_crew = names;
    }
}

// ---- image assets ----

/// Quality tiers for one still, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Thumbnail,
    Preview,
    Full,
}

/// One still of the open film, tracked through the progressive-load
/// pipeline. Load flags are monotonic: they only go back to false via
/// `reset()`.
pub struct ImageAsset {
    pub thumb_url: String,
    pub preview_url: Option<String>,
    pub full_url: String,
    pub thumb_loaded: bool,
    pub preview_loaded: bool,
    pub full_loaded: bool,
    /// Best tier currently backing `path`/`tex`.
    pub shown_tier: Option<Tier>,
    /// Cached file backing the shown tier.
    pub path: Option<PathBuf>,
    pub tex: Option<TextureHandle>, // UI thread only
    pub terminally_failed: bool,
}

impl ImageAsset {
    pub fn new(full_url: String, has_preview_tier: bool) -> Self {
        Self {
            thumb_url: thumb_url_for(&full_url),
            preview_url: has_preview_tier.then(|| preview_url_for(&full_url)),
            full_url,
            thumb_loaded: false,
            preview_loaded: false,
            full_loaded: false,
            shown_tier: None,
            path: None,
            tex: None,
            terminally_failed: false,
        }
    }

    pub fn loaded(&self, tier: Tier) -> bool {
        match tier {
            Tier::Thumbnail => self.thumb_loaded,
            Tier::Preview => self.preview_loaded,
            Tier::Full => self.full_loaded,
        }
    }

    /// Record a finished load. A lower tier arriving after a higher one
    /// still sets its flag but never replaces the shown image.
    pub fn mark_loaded(&mut self, tier: Tier, path: PathBuf) {
        match tier {
            Tier::Thumbnail => self.thumb_loaded = true,
            Tier::Preview => self.preview_loaded = true,
            Tier::Full => self.full_loaded = true,
        }
        if self.shown_tier.map_or(true, |shown| tier > shown) {
            self.shown_tier = Some(tier);
            self.path = Some(path);
            self.tex = None; // re-upload at the new quality on next paint
        }
    }

    /// Explicit reload: drop every flag and the backing image.
    pub fn reset(&mut self) {
        self.thumb_loaded = false;
        self.preview_loaded = false;
        self.full_loaded = false;
        self.shown_tier = None;
        self.path = None;
        self.tex = None;
        self.terminally_failed = false;
    }
}

/// Derive the compressed-thumbnail URL from a full-resolution URL:
/// a `thumbs/` sibling directory next to the file.
pub fn thumb_url_for(full_url: &str) -> String {
    match full_url.rfind('/') {
        Some(pos) => format!("{}/thumbs{}", &full_url[..pos], &full_url[pos..]),
        None => format!("thumbs/{full_url}"),
    }
}

/// Derive the intermediate webp URL: a `webp/` sibling directory with
/// the extension swapped to `.webp`.
pub fn preview_url_for(full_url: &str) -> String {
    let (dir, file) = match full_url.rfind('/') {
        Some(pos) => (&full_url[..pos], &full_url[pos + 1..]),
        None => ("", full_url),
    };
    let stem = match file.rfind('.') {
        Some(pos) => &file[..pos],
        None => file,
    };
    if dir.is_empty() {
        format!("webp/{stem}.webp")
    } else {
        format!("{dir}/webp/{stem}.webp")
    }
}

// ---- cross-thread messages ----

pub enum FilmsMsg {
    Progress { done: usize, total: usize },
    Done(Vec<FilmRecord>),
    Error(String),
}

/// Completion of one tier load dispatched by the pipeline.
pub struct TierDone {
    pub asset_idx: usize,
    pub tier: Tier,
    pub result: Result<PathBuf, String>,
}

pub enum PipelineEvent {
    TierLoaded(TierDone),
    /// Show / hide the one-time "image host responding slowly" notice.
    SlowNetwork(bool),
}

pub struct PosterDone {
    pub film_idx: usize,
    pub result: Result<PathBuf, String>,
}

pub struct ZoomDone {
    pub token: u64,
    pub result: Result<PathBuf, String>,
}

pub struct DownloadDone {
    pub token: u64,
    pub result: Result<PathBuf, String>,
}

pub struct PaletteDone {
    pub asset_idx: usize,
    pub colors: Vec<[u8; 3]>,
}

// ---- app phases / UI controls ----

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootPhase {
    Starting,
    LoadingFilms,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PosterState {
    Pending,
    Cached,
    Ready,
    Failed,
}

pub struct PosterSlot {
    pub url: String,
    pub key: String,
    pub path: Option<PathBuf>,
    pub tex: Option<TextureHandle>, // UI thread only
    pub state: PosterState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Year,
}

impl SortKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Year => "year",
        }
    }
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "title" => Some(Self::Title),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_thumb_and_preview_urls() {
        let full = "https://img.example.com/stills/blade-runner/br_042.jpg";
        assert_eq!(
            thumb_url_for(full),
            "https://img.example.com/stills/blade-runner/thumbs/br_042.jpg"
        );
        assert_eq!(
            preview_url_for(full),
            "https://img.example.com/stills/blade-runner/webp/br_042.webp"
        );
    }

    #[test]
    fn asset_without_preview_tier_has_no_preview_url() {
        let asset = ImageAsset::new("https://x/img.jpg".into(), false);
        assert!(asset.preview_url.is_none());
    }

    #[test]
    fn load_flags_are_monotonic() {
        let mut asset = ImageAsset::new("https://x/a/img.jpg".into(), true);
        asset.mark_loaded(Tier::Full, PathBuf::from("full.jpg"));
        assert!(asset.full_loaded);

        // Late lower-tier completions set their flag but never clear a
        // higher one or downgrade the shown image.
        asset.mark_loaded(Tier::Thumbnail, PathBuf::from("thumb.jpg"));
        assert!(asset.full_loaded);
        assert!(asset.thumb_loaded);
        assert_eq!(asset.shown_tier, Some(Tier::Full));
        assert_eq!(asset.path.as_deref(), Some(std::path::Path::new("full.jpg")));
    }

    #[test]
    fn reset_clears_all_flags() {
        let mut asset = ImageAsset::new("https://x/a/img.jpg".into(), true);
        asset.mark_loaded(Tier::Thumbnail, PathBuf::from("t.jpg"));
        asset.mark_loaded(Tier::Full, PathBuf::from("f.jpg"));
        asset.reset();
        assert!(!asset.thumb_loaded && !asset.preview_loaded && !asset.full_loaded);
        assert!(asset.shown_tier.is_none() && asset.path.is_none());
    }
}
