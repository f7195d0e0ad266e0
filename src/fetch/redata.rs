// src/fetch/redata.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use super::ExtractReport;
use crate::regions::Region;
use crate::table::{Cell, Table};

/// Monthly electricity-demand evolution per autonomous community.
pub const DEMAND_ENDPOINT: &str = "https://apidatos.ree.es/es/datos/demanda/evolucion";
/// Monthly renewable-generation structure per autonomous community.
pub const GENERATION_ENDPOINT: &str =
    "https://apidatos.ree.es/es/datos/generacion/estructura-renovables";

pub const DEMAND_COLUMNS: [&str; 4] = ["value", "percentage", "datetime", "COD-CCAA"];
pub const GENERATION_COLUMNS: [&str; 5] = ["value", "percentage", "datetime", "type", "COD-CCAA"];

/// Top level of a REData answer. Everything the pipeline keeps lives
/// under `included`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    included: Vec<Series>,
}

#[derive(Debug, Deserialize)]
struct Series {
    /// Dataset label, e.g. "Demanda" or a generation technology name.
    #[serde(rename = "type")]
    kind: String,
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct Attributes {
    #[serde(default)]
    values: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    value: Option<f64>,
    percentage: Option<f64>,
    datetime: String,
}

#[derive(Debug, Clone, Copy)]
enum Dataset {
    Demand,
    Generation,
}

impl Dataset {
    fn label(self) -> &'static str {
        match self {
            Dataset::Demand => "demand",
            Dataset::Generation => "generation",
        }
    }

    /// Shape one response into the dataset's table, or `None` when the
    /// answer carried no series at all.
    fn build(self, envelope: Envelope, code: u32) -> Result<Option<Table>> {
        match self {
            Dataset::Demand => match envelope.included.into_iter().next() {
                Some(series) => demand_table(series.attributes.values, code).map(Some),
                None => Ok(None),
            },
            Dataset::Generation => {
                if envelope.included.is_empty() {
                    return Ok(None);
                }
                generation_table(envelope.included, code).map(Some)
            }
        }
    }
}

fn demand_table(values: Vec<Observation>, code: u32) -> Result<Table> {
    let mut table = Table::new(DEMAND_COLUMNS);
    for obs in values {
        table.push_row(vec![
            Cell::from(obs.value),
            Cell::from(obs.percentage),
            Cell::from(obs.datetime),
            Cell::from(code),
        ])?;
    }
    Ok(table)
}

fn generation_table(series: Vec<Series>, code: u32) -> Result<Table> {
    let mut table = Table::new(GENERATION_COLUMNS);
    for entry in series {
        for obs in entry.attributes.values {
            table.push_row(vec![
                Cell::from(obs.value),
                Cell::from(obs.percentage),
                Cell::from(obs.datetime),
                Cell::from(entry.kind.as_str()),
                Cell::from(code),
            ])?;
        }
    }
    Ok(table)
}

/// First and last instant of `year`, in the `YYYY-MM-DDTHH:MM` shape
/// the API expects.
fn year_window(year: i32) -> Result<(String, String)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .with_context(|| format!("year {} is out of range", year))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .with_context(|| format!("year {} is out of range", year))?;
    Ok((format!("{}T00:00", start), format!("{}T23:59", end)))
}

/// Build the month-truncated query for one (endpoint, year, region).
fn dataset_url(endpoint: &str, year: i32, code: u32) -> Result<Url> {
    let (start, end) = year_window(year)?;
    let params = [
        ("start_date", start),
        ("end_date", end),
        ("time_trunc", "month".to_string()),
        ("geo_trunk", "electric_system".to_string()),
        ("geo_limit", "ccaa".to_string()),
        ("geo_ids", code.to_string()),
    ];
    Url::parse_with_params(endpoint, &params)
        .with_context(|| format!("building query against {}", endpoint))
}

/// GET one dataset answer. Transport errors, non-200 statuses and
/// undecodable bodies all come back as a skip reason, never an abort.
async fn fetch_envelope(client: &Client, url: &Url) -> Result<Envelope, String> {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return Err(format!("request failed: {}", e)),
    };
    let status = response.status();
    if status != StatusCode::OK {
        return Err(format!("status {}", status));
    }
    response
        .json::<Envelope>()
        .await
        .map_err(|e| format!("undecodable body: {}", e))
}

async fn run_extraction(
    client: &Client,
    out_dir: &Path,
    regions: &[Region],
    years: &[i32],
    endpoint: &str,
    dataset: Dataset,
) -> Result<ExtractReport> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut report = ExtractReport::default();
    for &year in years {
        for region in regions {
            let url = dataset_url(endpoint, year, region.code)?;
            let envelope = match fetch_envelope(client, &url).await {
                Ok(envelope) => envelope,
                Err(reason) => {
                    warn!(
                        dataset = dataset.label(),
                        region = region.name,
                        year,
                        %url,
                        reason = %reason,
                        "skipping"
                    );
                    report.skip(region.name, year, reason);
                    continue;
                }
            };

            let table = match dataset.build(envelope, region.code)? {
                Some(table) => table,
                None => {
                    let reason = "response carried no series".to_string();
                    warn!(
                        dataset = dataset.label(),
                        region = region.name,
                        year,
                        reason = %reason,
                        "skipping"
                    );
                    report.skip(region.name, year, reason);
                    continue;
                }
            };

            let path = out_dir.join(format!("{}{}.csv", region.name, year));
            table.write_csv(&path)?;
            info!(
                dataset = dataset.label(),
                region = region.name,
                year,
                rows = table.num_rows(),
                path = %path.display(),
                "saved"
            );
            report.saved += 1;
        }
    }
    Ok(report)
}

/// Fetch the demand-evolution dataset for every (year, region) pair
/// and write one CSV per pair into `out_dir`.
#[instrument(level = "info", skip(client, regions))]
pub async fn extract_demand(
    client: &Client,
    out_dir: &Path,
    regions: &[Region],
    years: &[i32],
) -> Result<ExtractReport> {
    run_extraction(client, out_dir, regions, years, DEMAND_ENDPOINT, Dataset::Demand).await
}

/// Fetch the renewable-generation dataset for every (year, region)
/// pair and write one CSV per pair into `out_dir`. Every series in the
/// answer contributes rows, tagged with its `type`.
#[instrument(level = "info", skip(client, regions))]
pub async fn extract_generation(
    client: &Client,
    out_dir: &Path,
    regions: &[Region],
    years: &[i32],
) -> Result<ExtractReport> {
    run_extraction(
        client,
        out_dir,
        regions,
        years,
        GENERATION_ENDPOINT,
        Dataset::Generation,
    )
    .await
}
