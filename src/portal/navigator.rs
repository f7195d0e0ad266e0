// src/portal/navigator.rs

use std::time::Duration;

use anyhow::{Context, Result};
use thirtyfour::prelude::*;
use tokio::time::sleep;
use tracing::debug;

/// Which options of a filter list get clicked.
///
/// The portal's lists carry sentinel entries (a "select all" first,
/// an aggregate total last in some lists); spans keep those exclusions
/// as data instead of loop arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpan {
    pub skip_leading: usize,
    pub skip_trailing: usize,
    /// Click at most this many options; `None` runs to the end.
    pub take: Option<usize>,
}

impl OptionSpan {
    /// Everything after the first entry.
    pub const fn after_first() -> OptionSpan {
        OptionSpan {
            skip_leading: 1,
            skip_trailing: 0,
            take: None,
        }
    }

    /// Everything between the first and last entries.
    pub const fn inner() -> OptionSpan {
        OptionSpan {
            skip_leading: 1,
            skip_trailing: 1,
            take: None,
        }
    }

    /// A fixed window of `take` options after `skip_leading`.
    pub const fn window(skip_leading: usize, take: usize) -> OptionSpan {
        OptionSpan {
            skip_leading,
            skip_trailing: 0,
            take: Some(take),
        }
    }

    /// 1-based option indices to click, given how many options the
    /// list holds.
    pub fn indices(&self, count: usize) -> std::ops::RangeInclusive<usize> {
        let first = self.skip_leading + 1;
        let last = match self.take {
            Some(take) => first + take - 1,
            None => count.saturating_sub(self.skip_trailing),
        };
        first..=last
    }
}

/// One filter category of a portal form: the control that opens its
/// option list, the list element itself, and which options to click.
#[derive(Debug, Clone, Copy)]
pub struct FilterStep {
    pub name: &'static str,
    /// XPath of the button that expands the category.
    pub opener: &'static str,
    /// DOM id of the option list.
    pub list_id: &'static str,
    pub span: OptionSpan,
}

/// Wraps a WebDriver session in the click discipline the portal
/// needs: every target is polled until clickable before acting, and a
/// short settle pause follows each interaction so the page's own
/// scripts can catch up.
pub struct Navigator {
    driver: WebDriver,
    timeout: Duration,
    poll: Duration,
    settle: Duration,
    page_settle: Duration,
}

impl Navigator {
    pub fn new(
        driver: WebDriver,
        timeout: Duration,
        settle: Duration,
        page_settle: Duration,
    ) -> Navigator {
        Navigator {
            driver,
            timeout,
            poll: Duration::from_millis(250),
            settle,
            page_settle,
        }
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    /// Give the session back so the caller can quit it.
    pub fn into_driver(self) -> WebDriver {
        self.driver
    }

    pub async fn settle_page(&self) {
        sleep(self.page_settle).await;
    }

    async fn clickable(&self, by: By) -> Result<WebElement> {
        let elem = self
            .driver
            .query(by.clone())
            .wait(self.timeout, self.poll)
            .first()
            .await
            .with_context(|| format!("locating {:?}", by))?;
        elem.wait_until()
            .wait(self.timeout, self.poll)
            .clickable()
            .await
            .with_context(|| format!("waiting for {:?} to become clickable", by))?;
        Ok(elem)
    }

    /// Click the element `by` points at once it is clickable.
    pub async fn click(&self, by: By) -> Result<()> {
        let elem = self.clickable(by.clone()).await?;
        elem.click()
            .await
            .with_context(|| format!("clicking {:?}", by))?;
        sleep(self.settle).await;
        Ok(())
    }

    /// Click plus the longer pause used after page-level transitions.
    pub async fn click_and_settle(&self, by: By) -> Result<()> {
        self.click(by).await?;
        self.settle_page().await;
        Ok(())
    }

    /// Open one filter category and click every option its span
    /// selects. Returns how many options were clicked.
    pub async fn sweep_filter(&self, step: &FilterStep) -> Result<usize> {
        self.click(By::XPath(step.opener))
            .await
            .with_context(|| format!("opening the {} filter", step.name))?;

        let list = self
            .driver
            .query(By::Id(step.list_id))
            .wait(self.timeout, self.poll)
            .first()
            .await
            .with_context(|| format!("locating the {} option list", step.name))?;
        let count = list
            .find_all(By::Tag("option"))
            .await
            .with_context(|| format!("listing {} options", step.name))?
            .len();

        let mut clicked = 0usize;
        for n in step.span.indices(count) {
            let option = format!("//*[@id=\"{}\"]/option[{}]", step.list_id, n);
            self.click(By::XPath(&option))
                .await
                .with_context(|| format!("selecting {} option {}", step.name, n))?;
            clicked += 1;
        }
        debug!(filter = step.name, options = count, clicked, "filter swept");
        Ok(clicked)
    }

    /// Wait for a frame to appear and switch the session into it.
    pub async fn enter_frame(&self, by: By) -> Result<()> {
        let frame = self
            .driver
            .query(by.clone())
            .wait(self.timeout, self.poll)
            .first()
            .await
            .with_context(|| format!("locating frame {:?}", by))?;
        frame
            .enter_frame()
            .await
            .with_context(|| format!("switching into frame {:?}", by))?;
        Ok(())
    }

    /// Switch back to the top-level document.
    pub async fn leave_frame(&self) -> Result<()> {
        self.driver
            .enter_default_frame()
            .await
            .context("switching back to the main document")?;
        self.settle_page().await;
        Ok(())
    }
}
