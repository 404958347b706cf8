// src/app/films.rs — turn the source sheet into FilmRecords, enrich
// them from TMDB in small batches, and provide the sort/filter used
// by the gallery view.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use itertools::Itertools;
use tracing::{info, warn};

use crate::app::csv::{parse_to_records, split_list};
use crate::app::http::{build_client, fetch_text_with_retry, RetryPolicy};
use crate::app::tmdb::{TmdbClient, TmdbMovie};
use crate::app::types::{FilmRecord, FilmsMsg, SortKey};
use crate::config::AppConfig;

/// How many films are enriched concurrently per batch.
const ENRICH_BATCH: usize = 4;

pub const USER_AGENT: &str = concat!("stillview/", env!("CARGO_PKG_VERSION"));

/// Strip a leading English article for sorting ("The Godfather" sorts at G).
pub fn remove_articles(title: &str) -> &str {
    let lower = title.to_ascii_lowercase();
    for article in ["the ", "a ", "an "] {
        if lower.starts_with(article) {
            return title[article.len()..].trim_start();
        }
    }
    title
}

pub fn record_from_row(row: &HashMap<String, String>) -> Option<FilmRecord> {
    let get = |key: &str| row.get(key).map(String::as_str).unwrap_or("").trim().to_string();

    let movie_id = get("Movie ID");
    let title = get("Movie Name");
    if movie_id.is_empty() && title.is_empty() {
        return None;
    }

    let cast = split_list(&get("Cast"));
    let has_preview_tier = get("Has Webp") == "1";
    let stills = split_list(&get("Stills"));

    let mut record = FilmRecord {
        movie_id,
        title,
        year: get("Movie Year").parse().ok(),
        poster_url: get("Poster"),
        director: get("Director"),
        cinematographer: get("Cinematographer"),
        cast,
        stills,
        has_preview_tier,
        cast_and_crew: Vec::new(),
    };
    record.rebuild_cast_and_crew();
    Some(record)
}

/// Fill blanks from TMDB without clobbering sheet data, and extend the
/// searchable people list with the full credits.
pub fn merge_tmdb(record: &mut FilmRecord, movie: &TmdbMovie) {
    if record.title.is_empty() && !movie.title.is_empty() {
        record.title = movie.title.clone();
    }
    if record.year.is_none() {
        record.year = movie.release_year();
    }
    if record.poster_url.is_empty() {
        if let Some(url) = movie.poster_url() {
            record.poster_url = url;
        }
    }
    if record.director.is_empty() {
        if let Some(director) = movie
            .credits
            .crew
            .iter()
            .find(|p| p.job.as_deref() == Some("Director"))
        {
            record.director = director.name.clone();
        }
    }
    if record.cinematographer.is_empty() {
        if let Some(dp) = movie
            .credits
            .crew
            .iter()
            .find(|p| p.job.as_deref() == Some("Director of Photography"))
        {
            record.cinematographer = dp.name.clone();
        }
    }
    if record.cast.is_empty() {
        record.cast = movie
            .credits
            .cast
            .iter()
            .take(10)
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .collect();
    }

    record.rebuild_cast_and_crew();
    for person in movie.credits.cast.iter().chain(movie.credits.crew.iter()) {
        if !person.name.is_empty() && !record.cast_and_crew.contains(&person.name) {
            record.cast_and_crew.push(person.name.clone());
        }
    }
}

pub fn sort_films(films: &mut [FilmRecord], key: SortKey, descending: bool) {
    match key {
        SortKey::Title => films.sort_by(|a, b| {
            remove_articles(&a.title)
                .to_lowercase()
                .cmp(&remove_articles(&b.title).to_lowercase())
        }),
        SortKey::Year => films.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then_with(|| {
                    remove_articles(&a.title)
                        .to_lowercase()
                        .cmp(&remove_articles(&b.title).to_lowercase())
                })
        }),
    }
    if descending {
        films.reverse();
    }
}

/// Indices of films whose title or any credited name contains `query`.
pub fn filter_films(films: &[FilmRecord], query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return (0..films.len()).collect();
    }
    films
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            f.title.to_lowercase().contains(&needle)
                || f.cast_and_crew
                    .iter()
                    .any(|name| name.to_lowercase().contains(&needle))
        })
        .map(|(i, _)| i)
        .collect()
}

fn read_csv_source(source: &str, client: &reqwest::blocking::Client) -> Result<String, String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_text_with_retry(client, source, RetryPolicy::default())
    } else {
        fs::read_to_string(Path::new(source))
            .map_err(|e| format!("read {source}: {e}"))
    }
}

pub fn parse_films(csv_text: &str) -> Vec<FilmRecord> {
    parse_to_records(csv_text)
        .iter()
        .filter_map(record_from_row)
        .collect()
}

/// Load and enrich the catalog on a background thread, reporting
/// progress over `tx`. Enrichment runs ENRICH_BATCH lookups at a time
/// so a slow metadata API never serializes the whole load.
pub fn start_film_load(tx: Sender<FilmsMsg>, cfg: AppConfig) {
    thread::spawn(move || {
        let client = build_client(USER_AGENT);
        let csv_text = match read_csv_source(&cfg.csv_source, &client) {
            Ok(text) => text,
            Err(err) => {
                let _ = tx.send(FilmsMsg::Error(err));
                return;
            }
        };

        let mut films = parse_films(&csv_text);
        if films.is_empty() {
            let _ = tx.send(FilmsMsg::Error(format!(
                "no films parsed from {}",
                cfg.csv_source
            )));
            return;
        }
        info!("parsed {} films from {}", films.len(), cfg.csv_source);

        let tmdb = Arc::new(TmdbClient::new(cfg.tmdb_api_key.clone(), client));
        if tmdb.enabled() {
            let total = films.len();
            let mut done = 0usize;
            for chunk_indices in &(0..films.len()).chunks(ENRICH_BATCH) {
                let indices: Vec<usize> = chunk_indices.collect();
                let mut results: Vec<(usize, Option<TmdbMovie>)> = thread::scope(|scope| {
                    let handles: Vec<_> = indices
                        .iter()
                        .map(|&i| {
                            let tmdb = Arc::clone(&tmdb);
                            let movie_id = films[i].movie_id.clone();
                            scope.spawn(move || (i, tmdb.movie_details(&movie_id)))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .filter_map(|h| h.join().ok())
                        .collect()
                });
                results.sort_by_key(|(i, _)| *i);
                for (i, movie) in results {
                    if let Some(movie) = movie {
                        merge_tmdb(&mut films[i], &movie);
                    }
                    done += 1;
                }
                let _ = tx.send(FilmsMsg::Progress { done, total });
            }
        } else {
            warn!("no TMDB api key configured; skipping enrichment");
        }

        sort_films(&mut films, SortKey::Title, false);
        let _ = tx.send(FilmsMsg::Done(films));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tmdb::{TmdbCredits, TmdbPerson};

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn record_from_row_parses_lists_and_flag() {
        let r = record_from_row(&row(&[
            ("Movie ID", "348"),
            ("Movie Name", "Alien"),
            ("Movie Year", "1979"),
            ("Director", "Ridley Scott"),
            ("Cinematographer", "Derek Vanlint"),
            ("Cast", "Sigourney Weaver|Tom Skerritt"),
            ("Stills", "https://cdn.example.com/alien/01.jpg|https://cdn.example.com/alien/02.jpg"),
            ("Has Webp", "1"),
        ]))
        .unwrap();
        assert_eq!(r.movie_id, "348");
        assert_eq!(r.year, Some(1979));
        assert_eq!(r.cast.len(), 2);
        assert_eq!(r.stills.len(), 2);
        assert!(r.has_preview_tier);
        assert!(r.cast_and_crew.contains(&"Derek Vanlint".to_string()));
    }

    #[test]
    fn record_from_row_skips_empty_rows() {
        assert!(record_from_row(&row(&[("Movie ID", ""), ("Movie Name", "")])).is_none());
    }

    #[test]
    fn merge_fills_blanks_only() {
        let mut r = record_from_row(&row(&[
            ("Movie ID", "348"),
            ("Movie Name", "Alien"),
            ("Director", "Ridley Scott"),
        ]))
        .unwrap();
        let movie = TmdbMovie {
            title: "Alien (TMDB)".into(),
            release_date: "1979-05-25".into(),
            poster_path: Some("/p.jpg".into()),
            credits: TmdbCredits {
                cast: vec![TmdbPerson {
                    name: "Sigourney Weaver".into(),
                    job: None,
                }],
                crew: vec![TmdbPerson {
                    name: "Someone Else".into(),
                    job: Some("Director".into()),
                }],
            },
        };
        merge_tmdb(&mut r, &movie);
        // sheet values win
        assert_eq!(r.title, "Alien");
        assert_eq!(r.director, "Ridley Scott");
        // blanks got filled
        assert_eq!(r.year, Some(1979));
        assert!(r.poster_url.ends_with("/p.jpg"));
        assert_eq!(r.cast, vec!["Sigourney Weaver".to_string()]);
        // full credits are searchable
        assert!(r.cast_and_crew.contains(&"Someone Else".to_string()));
    }

    #[test]
    fn remove_articles_rules() {
        assert_eq!(remove_articles("The Godfather"), "Godfather");
        assert_eq!(remove_articles("A Clockwork Orange"), "Clockwork Orange");
        assert_eq!(remove_articles("An American in Paris"), "American in Paris");
        assert_eq!(remove_articles("Theodore"), "Theodore");
        assert_eq!(remove_articles("Alien"), "Alien");
    }

    #[test]
    fn sort_ignores_articles() {
        let mut films: Vec<FilmRecord> = ["The Zebra", "Alien", "A Monster"]
            .iter()
            .map(|t| FilmRecord {
                title: t.to_string(),
                ..Default::default()
            })
            .collect();
        sort_films(&mut films, SortKey::Title, false);
        let titles: Vec<&str> = films.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Alien", "A Monster", "The Zebra"]);
    }

    #[test]
    fn filter_matches_title_and_people() {
        let films: Vec<FilmRecord> = vec![
            FilmRecord {
                title: "Alien".into(),
                cast_and_crew: vec!["Sigourney Weaver".into()],
                ..Default::default()
            },
            FilmRecord {
                title: "Blade Runner".into(),
                cast_and_crew: vec!["Harrison Ford".into()],
                ..Default::default()
            },
        ];
        assert_eq!(filter_films(&films, "alien"), vec![0]);
        assert_eq!(filter_films(&films, "weaver"), vec![0]);
        assert_eq!(filter_films(&films, "ford"), vec![1]);
        assert_eq!(filter_films(&films, ""), vec![0, 1]);
        assert!(filter_films(&films, "nothing").is_empty());
    }
}
