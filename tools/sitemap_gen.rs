// tools/sitemap_gen.rs — regenerate sitemap.xml from the film sheet.
//
//   sitemap_gen [csv-path] [output-path] [base-url]

use std::fs;
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::EnvFilter;

use stillview::app::films::parse_films;
use stillview::sitemap::{extract_people, generate_sitemap, DEFAULT_BASE_URL};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let csv_path = args
        .next()
        .unwrap_or_else(|| stillview::config::DEFAULT_CSV_SOURCE.to_string());
    let output = args.next().unwrap_or_else(|| "sitemap.xml".to_string());
    let base_url = args.next().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let csv_text = match fs::read_to_string(&csv_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("cannot read {csv_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let films = parse_films(&csv_text);
    if films.is_empty() {
        eprintln!("no films parsed from {csv_path}");
        return ExitCode::FAILURE;
    }
    let people = extract_people(&films);
    let today = chrono::Local::now().date_naive();
    let xml = generate_sitemap(&base_url, &films, &people, today);

    let url_count = xml.matches("<url>").count();
    if let Err(err) = fs::write(&output, xml) {
        eprintln!("cannot write {output}: {err}");
        return ExitCode::FAILURE;
    }
    info!(
        "wrote {output} with {url_count} urls ({} films, {} people)",
        films.len(),
        people.len()
    );
    ExitCode::SUCCESS
}
