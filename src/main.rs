use anyhow::{Context, Result};
use duckdb::Connection;
use reescraper::{
    fetch::{self, ExtractReport},
    load, normalize,
    portal::{self, PortalConfig},
    regions::REGIONS,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::{env, fs, path::Path};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEMAND_DIR: &str = "data/ree_demanda";
const GENERATION_DIR: &str = "data/ree_generacion";
const INE_DIR: &str = "data/ine";
const DB_PATH: &str = "reescraper.duckdb";
const DEFAULT_YEARS: [i32; 3] = [2019, 2020, 2021];

/// Years to pull, from `REESCRAPER_YEARS` ("2019,2020") when set.
fn years_from_env() -> Result<Vec<i32>> {
    match env::var("REESCRAPER_YEARS") {
        Ok(raw) => raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i32>()
                    .with_context(|| format!("bad year {:?} in REESCRAPER_YEARS", part))
            })
            .collect(),
        Err(_) => Ok(DEFAULT_YEARS.to_vec()),
    }
}

fn log_report(dataset: &str, report: &ExtractReport) {
    if report.is_clean() {
        info!(dataset, saved = report.saved, "extraction finished");
    } else {
        warn!(
            dataset,
            saved = report.saved,
            skipped = report.skipped.len(),
            "extraction finished with skips"
        );
    }
}

/// Combine every CSV under `dir` and append the rows to `destination`,
/// creating the table on first use.
fn load_dataset(conn: &Connection, dir: &str, destination: &str) -> Result<()> {
    let combined = normalize::consolidate(dir)?;
    let combined = normalize::standardize_region_names(combined, "provincia")?;

    conn.execute(
        &format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                provincia  VARCHAR,
                "año"      VARCHAR,
                value      DOUBLE,
                percentage DOUBLE,
                datetime   VARCHAR,
                "COD-CCAA" INTEGER
            )"#,
            destination
        ),
        [],
    )
    .with_context(|| format!("creating table {}", destination))?;

    load::insert_table(conn, &combined, destination)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reescraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) configure dirs + http client ─────────────────────────────
    let years = years_from_env()?;
    info!(years = ?years, "pulling {} year(s)", years.len());

    for dir in [DEMAND_DIR, GENERATION_DIR, INE_DIR] {
        fs::create_dir_all(dir)?;
    }

    // the REData API rate-limits anonymous callers; a token goes out
    // on every request when one is configured
    let mut headers = HeaderMap::new();
    if let Ok(token) = env::var("REE_API_TOKEN") {
        let value = HeaderValue::from_str(&format!("Token token={}", token))
            .context("REE_API_TOKEN is not a valid header value")?;
        headers.insert(AUTHORIZATION, value);
    }
    let client = Client::builder()
        .user_agent("reescraper/0.1")
        .default_headers(headers)
        .build()
        .context("building the http client")?;

    // ─── 3) pull the REData datasets ─────────────────────────────────
    let report = fetch::extract_demand(&client, Path::new(DEMAND_DIR), REGIONS, &years).await?;
    log_report("demand", &report);

    let report =
        fetch::extract_generation(&client, Path::new(GENERATION_DIR), REGIONS, &years).await?;
    log_report("generation", &report);

    // ─── 4) export the INE datasets when a browser is available ──────
    match env::var("INE_WEBDRIVER_URL") {
        Ok(webdriver) => {
            let demographics = env::var("INE_DEMOGRAPHICS_URL")
                .context("INE_DEMOGRAPHICS_URL must be set alongside INE_WEBDRIVER_URL")?;
            let economics = env::var("INE_ECONOMICS_URL")
                .context("INE_ECONOMICS_URL must be set alongside INE_WEBDRIVER_URL")?;

            // chrome rejects relative download paths
            let download_dir = fs::canonicalize(INE_DIR)
                .with_context(|| format!("resolving {}", INE_DIR))?;
            let config = PortalConfig::new(webdriver, download_dir);

            portal::extract_demographics(&config, &demographics).await?;
            portal::extract_economics(&config, &economics).await?;
        }
        Err(_) => info!("INE_WEBDRIVER_URL not set; skipping the portal exports"),
    }

    // ─── 5) load everything into duckdb ──────────────────────────────
    let conn = Connection::open(DB_PATH)
        .with_context(|| format!("opening {}", DB_PATH))?;

    load_dataset(&conn, DEMAND_DIR, "ree_demanda")?;
    load_dataset(&conn, GENERATION_DIR, "ree_generacion")?;

    info!("all done");
    Ok(())
}
