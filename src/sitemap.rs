// src/sitemap.rs — sitemap XML for the public site backed by the same
// film sheet: static pages, one URL per film, one per credited person.

use chrono::NaiveDate;

use crate::app::types::FilmRecord;

pub const DEFAULT_BASE_URL: &str = "https://www.scenestill.com";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Director,
    Cinematographer,
    Actor,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Director => "Director",
            Self::Cinematographer => "Cinematographer",
            Self::Actor => "Actor",
        }
    }
}

/// Every credited name across the catalog, deduplicated. A name seen
/// in several roles keeps the first one, scanning director, then
/// cinematographer, then cast, film by film.
pub fn extract_people(films: &[FilmRecord]) -> Vec<Person> {
    let mut people: Vec<Person> = Vec::new();
    let mut push = |people: &mut Vec<Person>, name: &str, role: Role| {
        let name = name.trim();
        if name.is_empty() || people.iter().any(|p| p.name == name) {
            return;
        }
        people.push(Person {
            name: name.to_string(),
            role,
        });
    };
    for film in films {
        push(&mut people, &film.director, Role::Director);
        push(&mut people, &film.cinematographer, Role::Cinematographer);
        for actor in &film.cast {
            push(&mut people, actor, Role::Actor);
        }
    }
    people
}

struct Entry<'a> {
    loc: String,
    changefreq: &'a str,
    priority: &'a str,
}

/// Render the full sitemap. `today` becomes every entry's lastmod.
pub fn generate_sitemap(
    base_url: &str,
    films: &[FilmRecord],
    people: &[Person],
    today: NaiveDate,
) -> String {
    let base = base_url.trim_end_matches('/');
    let mut entries: Vec<Entry> = vec![
        Entry {
            loc: format!("{base}/"),
            changefreq: "weekly",
            priority: "1.0",
        },
        Entry {
            loc: format!("{base}/about"),
            changefreq: "monthly",
            priority: "0.5",
        },
        Entry {
            loc: format!("{base}/color_extractor"),
            changefreq: "monthly",
            priority: "0.6",
        },
        Entry {
            loc: format!("{base}/cast_crew"),
            changefreq: "weekly",
            priority: "0.7",
        },
    ];

    for film in films {
        if film.movie_id.is_empty() {
            continue;
        }
        entries.push(Entry {
            loc: format!("{base}/film?id={}", urlencoding::encode(&film.movie_id)),
            changefreq: "monthly",
            priority: "0.8",
        });
    }
    for person in people {
        entries.push(Entry {
            loc: format!(
                "{base}/person?name={}&role={}",
                urlencoding::encode(&person.name),
                urlencoding::encode(person.role.as_str()),
            ),
            changefreq: "monthly",
            priority: "0.6",
        });
    }

    let lastmod = today.format("%Y-%m-%d");
    let mut xml = String::with_capacity(entries.len() * 160 + 256);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for entry in &entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&entry.loc)));
        xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
        xml.push_str(&format!(
            "    <changefreq>{}</changefreq>\n",
            entry.changefreq
        ));
        xml.push_str(&format!("    <priority>{}</priority>\n", entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn film(id: &str, director: &str, dp: &str, cast: &[&str]) -> FilmRecord {
        FilmRecord {
            movie_id: id.into(),
            title: format!("Film {id}"),
            director: director.into(),
            cinematographer: dp.into(),
            cast: cast.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn people_dedupe_keeps_first_role() {
        let films = vec![
            film("1", "Ridley Scott", "Derek Vanlint", &["Sigourney Weaver"]),
            // same name shows up as an actor later; director wins
            film("2", "Jane Doe", "Ridley Scott", &["Ridley Scott"]),
        ];
        let people = extract_people(&films);
        let ridley = people.iter().find(|p| p.name == "Ridley Scott").unwrap();
        assert_eq!(ridley.role, Role::Director);
        assert_eq!(
            people.iter().filter(|p| p.name == "Ridley Scott").count(),
            1
        );
    }

    #[test]
    fn sitemap_contains_static_film_and_person_urls() {
        let films = vec![film("348", "Ridley Scott", "", &[])];
        let people = extract_people(&films);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let xml = generate_sitemap(DEFAULT_BASE_URL, &films, &people, today);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<loc>https://www.scenestill.com/</loc>"));
        assert!(xml.contains("<loc>https://www.scenestill.com/cast_crew</loc>"));
        assert!(xml.contains("<loc>https://www.scenestill.com/film?id=348</loc>"));
        assert!(xml.contains("<lastmod>2024-03-01</lastmod>"));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn person_urls_are_percent_encoded_and_escaped() {
        let films = vec![film("1", "Ridley Scott", "", &[])];
        let people = extract_people(&films);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let xml = generate_sitemap(DEFAULT_BASE_URL, &films, &people, today);
        // the space is percent-encoded and the ampersand is xml-escaped
        assert!(xml.contains("person?name=Ridley%20Scott&amp;role=Director"));
    }

    #[test]
    fn films_without_id_are_skipped() {
        let films = vec![film("", "X", "", &[])];
        let xml = generate_sitemap(DEFAULT_BASE_URL, &films, &[], NaiveDate::MIN);
        assert!(!xml.contains("film?id="));
    }
}
