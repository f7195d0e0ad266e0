// src/portal/mod.rs

//! Drives the INE portal's filter forms through a WebDriver session
//! to trigger server-side CSV exports.
//!
//! The portal offers no download API: the only way to a CSV is to walk
//! the HTML form, tick every filter option, submit, and pick the CSV
//! format in the export dialog. The DOM paths below are that walk,
//! kept in one table per dataset so a portal relayout means editing
//! data, not code.

mod navigator;

pub use navigator::{FilterStep, Navigator, OptionSpan};

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tracing::{info, instrument};

/// How to reach the browser and where it drops downloads.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// chromedriver endpoint, e.g. `http://localhost:9515`.
    pub webdriver_url: String,
    /// Absolute directory Chrome saves exports into.
    pub download_dir: PathBuf,
    pub headless: bool,
    /// Bound on every element wait.
    pub timeout: Duration,
    /// Pause after each click.
    pub settle: Duration,
    /// Pause after page-level transitions.
    pub page_settle: Duration,
}

impl PortalConfig {
    pub fn new(webdriver_url: impl Into<String>, download_dir: impl Into<PathBuf>) -> PortalConfig {
        PortalConfig {
            webdriver_url: webdriver_url.into(),
            download_dir: download_dir.into(),
            headless: true,
            timeout: Duration::from_secs(10),
            settle: Duration::from_millis(200),
            page_settle: Duration::from_secs(1),
        }
    }
}

/// A complete portal walk: links from the landing page to the filter
/// form, the filter sweeps, then the control that opens the export
/// dialog.
struct Flow {
    name: &'static str,
    entry: &'static [&'static str],
    filters: &'static [FilterStep],
    download_opener: &'static str,
}

const COOKIE_BANNER: &str = "aceptarCookie";
const SUBMIT_QUERY: &str = "botonConsulSele";
const EXPORT_FRAME: &str = "thickBoxINEfrm";
const CSV_FORMAT_OPTION: &str = "/html/body/form/ul/li[4]/label";

static DEMOGRAPHICS: Flow = Flow {
    name: "demographics",
    entry: &[
        "/html/body/div[1]/main/section[2]/div[1]/div[1]/div[1]/ul/li/ul/li[3]/a",
        "/html/body/div/main/div[2]/ul/li[4]/ul/li[1]/a",
    ],
    filters: &[
        FilterStep {
            name: "province",
            opener: "/html/body/div[1]/main/form/ul/li[1]/ul/li[1]/div/fieldset/div[2]/button[2]/i",
            list_id: "cri0",
            span: OptionSpan::after_first(),
        },
        FilterStep {
            name: "age",
            opener: "/html/body/div[1]/main/form/ul/li[1]/ul/li[2]/div/fieldset/div[2]/button[2]/i",
            list_id: "cri1",
            span: OptionSpan::after_first(),
        },
        FilterStep {
            name: "nationality",
            opener: "/html/body/div/main/form/ul/li[1]/ul/li[3]/div/fieldset/div[2]/button[2]/i",
            list_id: "cri2",
            span: OptionSpan::inner(),
        },
        FilterStep {
            name: "sex",
            opener: "/html/body/div/main/form/ul/li[1]/ul/li[4]/div/fieldset/div[2]/button[2]/i",
            list_id: "cri3",
            span: OptionSpan::after_first(),
        },
        FilterStep {
            name: "period",
            opener: "/html/body/div[1]/main/form/ul/li[1]/ul/li[5]/div/fieldset/div[3]/button[2]/i",
            list_id: "periodo",
            span: OptionSpan::window(1, 3),
        },
    ],
    download_opener: "/html/body/div[1]/main/ul/li/div/div/form[2]/button/i",
};

static ECONOMICS: Flow = Flow {
    name: "economics",
    entry: &["/html/body/div[1]/main/div[2]/ul/li[3]/ul/li[1]/a"],
    filters: &[
        FilterStep {
            name: "activity",
            opener: "/html/body/div[1]/main/form/ul/li[1]/ul/li[2]/div/fieldset/div[2]/button[2]/i",
            list_id: "cri1",
            span: OptionSpan::inner(),
        },
        FilterStep {
            name: "period",
            opener: "/html/body/div[1]/main/form/ul/li[1]/ul/li[3]/div/fieldset/div[3]/button[2]/i",
            list_id: "periodo",
            span: OptionSpan::window(0, 3),
        },
    ],
    download_opener: "/html/body/div[1]/main/ul[1]/li/div/div/form[2]/button",
};

/// Open a Chrome session configured to download into
/// `config.download_dir` without prompting.
async fn connect(config: &PortalConfig) -> Result<WebDriver> {
    let mut caps = DesiredCapabilities::chrome();
    if config.headless {
        caps.add_arg("--headless=new")?;
    }
    caps.add_arg("--window-size=1920,1080")?;
    caps.add_experimental_option(
        "prefs",
        json!({
            "download.default_directory": config.download_dir.to_string_lossy(),
            "download.prompt_for_download": false,
        }),
    )?;

    WebDriver::new(&config.webdriver_url, caps)
        .await
        .with_context(|| format!("starting a webdriver session at {}", config.webdriver_url))
}

async fn run_flow(nav: &Navigator, url: &str, flow: &Flow) -> Result<()> {
    let driver = nav.driver();
    driver
        .goto(url)
        .await
        .with_context(|| format!("opening {}", url))?;
    driver.maximize_window().await.context("maximizing window")?;
    nav.settle_page().await;

    nav.click(By::Id(COOKIE_BANNER))
        .await
        .context("accepting the cookie banner")?;
    for link in flow.entry {
        nav.click_and_settle(By::XPath(*link))
            .await
            .context("walking to the dataset form")?;
    }

    for step in flow.filters {
        nav.sweep_filter(step).await?;
    }

    nav.click_and_settle(By::Id(SUBMIT_QUERY))
        .await
        .context("submitting the query")?;
    nav.click(By::XPath(flow.download_opener))
        .await
        .context("opening the download dialog")?;
    nav.enter_frame(By::Id(EXPORT_FRAME)).await?;
    nav.click(By::XPath(CSV_FORMAT_OPTION))
        .await
        .context("choosing the csv format")?;
    nav.leave_frame().await?;

    info!(flow = flow.name, url, "export triggered");
    Ok(())
}

/// Walk one flow and always quit the session, whether or not the walk
/// succeeded. The walk's error wins when both fail.
async fn export(config: &PortalConfig, url: &str, flow: &Flow) -> Result<()> {
    let driver = connect(config).await?;
    let nav = Navigator::new(
        driver,
        config.timeout,
        config.settle,
        config.page_settle,
    );

    let walked = run_flow(&nav, url, flow).await;
    let quit = nav.into_driver().quit().await;

    walked?;
    quit.context("closing the browser session")?;
    Ok(())
}

/// Export the demographic dataset (population by province, age,
/// nationality, sex and period) as CSV into the configured download
/// directory.
#[instrument(level = "info", skip(config))]
pub async fn extract_demographics(config: &PortalConfig, url: &str) -> Result<()> {
    export(config, url, &DEMOGRAPHICS).await
}

/// Export the economic dataset (activity by period) as CSV into the
/// configured download directory.
#[instrument(level = "info", skip(config))]
pub async fn extract_economics(config: &PortalConfig, url: &str) -> Result<()> {
    export(config, url, &ECONOMICS).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::env;

    #[test]
    fn flows_use_unique_filter_names() {
        for flow in [&DEMOGRAPHICS, &ECONOMICS] {
            let names: HashSet<&str> = flow.filters.iter().map(|f| f.name).collect();
            assert_eq!(names.len(), flow.filters.len(), "{} filters collide", flow.name);
        }
    }

    #[test]
    fn demographic_spans_match_the_portal_lists() {
        assert_eq!(DEMOGRAPHICS.filters.len(), 5);
        let by_name = |name: &str| {
            DEMOGRAPHICS
                .filters
                .iter()
                .find(|f| f.name == name)
                .unwrap()
        };
        assert_eq!(by_name("province").span, OptionSpan::after_first());
        assert_eq!(by_name("nationality").span, OptionSpan::inner());
        assert_eq!(by_name("period").span.indices(9), 2..=4);
        assert_eq!(by_name("period").list_id, "periodo");
    }

    #[test]
    fn economic_spans_match_the_portal_lists() {
        assert_eq!(ECONOMICS.filters.len(), 2);
        assert_eq!(ECONOMICS.filters[0].span, OptionSpan::inner());
        assert_eq!(ECONOMICS.filters[1].span.indices(9), 1..=3);
    }

    #[test]
    fn selectors_are_absolute_paths() {
        for flow in [&DEMOGRAPHICS, &ECONOMICS] {
            for link in flow.entry {
                assert!(link.starts_with("/html"), "{} entry {}", flow.name, link);
            }
            for filter in flow.filters {
                assert!(filter.opener.starts_with("/html"));
                assert!(!filter.list_id.is_empty());
            }
            assert!(flow.download_opener.starts_with("/html"));
        }
    }

    /// Needs a running chromedriver and network access. Run by hand:
    /// `INE_WEBDRIVER_URL=http://localhost:9515 \
    ///  INE_DEMOGRAPHICS_URL=... cargo test live_demographics -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn live_demographics_export() {
        let webdriver = env::var("INE_WEBDRIVER_URL").expect("INE_WEBDRIVER_URL");
        let url = env::var("INE_DEMOGRAPHICS_URL").expect("INE_DEMOGRAPHICS_URL");
        let dir = tempfile::tempdir().unwrap();

        let config = PortalConfig::new(webdriver, dir.path());
        extract_demographics(&config, &url).await.unwrap();

        let downloads = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(downloads > 0, "no export landed in the download dir");
    }
}
