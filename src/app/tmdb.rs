// src/app/tmdb.rs — TMDB metadata lookups with a 7-day on-disk cache.
// Lookup failures degrade to None so the gallery still renders from
// the source data alone.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::cache::TtlCache;
use crate::app::http::{fetch_text_with_retry, RetryPolicy};

const METADATA_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const API_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmdbMovie {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub credits: TmdbCredits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbPerson>,
    #[serde(default)]
    pub crew: Vec<TmdbPerson>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmdbPerson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
}

impl TmdbMovie {
    /// Four-digit year out of `release_date` ("1979-05-25" -> 1979).
    pub fn release_year(&self) -> Option<i32> {
        self.release_date.get(0..4)?.parse().ok()
    }

    pub fn poster_url(&self) -> Option<String> {
        self.poster_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("{POSTER_BASE}{p}"))
    }
}

pub struct TmdbClient {
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    cache: Mutex<TtlCache>,
    policy: RetryPolicy,
}

impl TmdbClient {
    pub fn new(api_key: Option<String>, client: reqwest::blocking::Client) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
            cache: Mutex::new(TtlCache::open("tmdb")),
            policy: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    fn with_cache(api_key: Option<String>, cache: TtlCache) -> Self {
        Self {
            api_key,
            client: reqwest::blocking::Client::new(),
            cache: Mutex::new(cache),
            policy: RetryPolicy::default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Movie details with credits, cache first. Any failure (HTTP,
    /// API error payload, bad JSON) logs and returns None.
    pub fn movie_details(&self, movie_id: &str) -> Option<TmdbMovie> {
        let api_key = self.api_key.as_deref()?;
        let cache_key = format!("movie:{movie_id}");

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&cache_key) {
                debug!("tmdb cache hit for movie {movie_id}");
                return serde_json::from_value(hit).ok();
            }
        }

        let url = format!(
            "{API_BASE}/movie/{movie_id}?api_key={api_key}&append_to_response=credits,images"
        );
        let body = match fetch_text_with_retry(&self.client, &url, self.policy) {
            Ok(body) => body,
            Err(err) => {
                warn!("tmdb lookup failed for movie {movie_id}: {err}");
                return None;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(err) => {
                warn!("tmdb returned bad json for movie {movie_id}: {err}");
                return None;
            }
        };
        // API-level errors come back 200 with a status_message field
        if let Some(msg) = value.get("status_message").and_then(|m| m.as_str()) {
            warn!("tmdb api error for movie {movie_id}: {msg}");
            return None;
        }

        let movie: TmdbMovie = match serde_json::from_value(value.clone()) {
            Ok(m) => m,
            Err(err) => {
                warn!("tmdb shape mismatch for movie {movie_id}: {err}");
                return None;
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.set(&cache_key, value, Some(METADATA_TTL));
        }
        Some(movie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn release_year_parses_prefix() {
        let m = TmdbMovie {
            release_date: "1979-05-25".into(),
            ..Default::default()
        };
        assert_eq!(m.release_year(), Some(1979));

        let none = TmdbMovie::default();
        assert_eq!(none.release_year(), None);
    }

    #[test]
    fn poster_url_joins_base() {
        let m = TmdbMovie {
            poster_path: Some("/abc.jpg".into()),
            ..Default::default()
        };
        assert_eq!(
            m.poster_url().as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
        assert_eq!(TmdbMovie::default().poster_url(), None);
    }

    #[test]
    fn disabled_without_api_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let client = TmdbClient::with_cache(None, TtlCache::with_file(dir.path().join("c.json")));
        assert!(!client.enabled());
        assert!(client.movie_details("42").is_none());
    }

    #[test]
    fn cache_hit_skips_network() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = TtlCache::with_file(dir.path().join("c.json"));
        cache.set(
            "movie:42",
            json!({
                "title": "Alien",
                "release_date": "1979-05-25",
                "poster_path": "/p.jpg",
                "credits": {"cast": [{"name": "Sigourney Weaver"}], "crew": []}
            }),
            None,
        );
        let client = TmdbClient::with_cache(Some("key".into()), cache);
        let movie = client.movie_details("42").unwrap();
        assert_eq!(movie.title, "Alien");
        assert_eq!(movie.credits.cast[0].name, "Sigourney Weaver");
    }
}
