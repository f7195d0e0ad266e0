//! Combine a directory of already-extracted CSVs and append the rows
//! to an existing DuckDB table, without touching the network.
//!
//! Usage: load_csvs <csv_dir> <db_path> <table>

use anyhow::{bail, Context, Result};
use duckdb::Connection;
use reescraper::{load, normalize};
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [csv_dir, db_path, table] = match args.as_slice() {
        [a, b, c] => [a, b, c],
        _ => bail!("usage: load_csvs <csv_dir> <db_path> <table>"),
    };

    let combined = normalize::consolidate(csv_dir)?;
    let combined = normalize::standardize_region_names(combined, "provincia")?;

    let conn = Connection::open(db_path).with_context(|| format!("opening {}", db_path))?;
    load::insert_table(&conn, &combined, table)?;

    info!(rows = combined.num_rows(), table = %table, "load complete");
    Ok(())
}
