//! What a failed browser scenario leaves behind for inspection.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thirtyfour::prelude::*;

use super::bridge::{BridgeEntry, BridgeState, TestBridge};

/// Which run failed; also decides where its files go.
#[derive(Debug, Clone, Copy)]
pub struct FailureKey<'a> {
    pub browser: &'a str,
    pub scenario: &'a str,
    pub seed: u64,
}

impl FailureKey<'_> {
    /// `<base>/<browser>/<scenario>/seed-<seed>/<timestamp>`.
    pub fn dir(&self, base: &Path, at: DateTime<Utc>) -> PathBuf {
        base.join(self.browser)
            .join(self.scenario)
            .join(format!("seed-{}", self.seed))
            .join(at.format("%Y%m%dT%H%M%S").to_string())
    }
}

/// `failure.json`: the error plus the grid and queue as the page last saw them.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub browser: String,
    pub scenario: String,
    pub seed: u64,
    pub captured_at: String,
    pub error: String,
    /// `None` when the page had no bridge or the call itself failed.
    pub summary: Option<String>,
    pub visible: Vec<String>,
    pub selected: Vec<String>,
    pub queue: Vec<BridgeEntry>,
    pub queue_processing: bool,
}

impl FailureReport {
    pub fn new(
        key: FailureKey<'_>,
        at: DateTime<Utc>,
        err: &anyhow::Error,
        state: Option<&BridgeState>,
    ) -> Self {
        let (summary, visible, selected, queue, queue_processing) = state.map_or_else(
            || (None, Vec::new(), Vec::new(), Vec::new(), false),
            |state| {
                (
                    Some(state.summary.clone()),
                    state.visible_ids().into_iter().map(String::from).collect(),
                    state
                        .items
                        .iter()
                        .filter(|item| item.selected)
                        .map(|item| item.id.clone())
                        .collect(),
                    state.queue.entries.clone(),
                    state.queue.processing,
                )
            },
        );
        Self {
            browser: key.browser.to_string(),
            scenario: key.scenario.to_string(),
            seed: key.seed,
            captured_at: at.to_rfc3339(),
            error: format!("{err:#}"),
            summary,
            visible,
            selected,
            queue,
            queue_processing,
        }
    }

    /// Write the report plus whatever page captures succeeded. Returns the
    /// directory written to.
    pub fn write(
        &self,
        dir: &Path,
        screenshot: Option<&[u8]>,
        page: Option<&str>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating artifacts dir {}", dir.display()))?;
        if let Some(png) = screenshot {
            let _ = fs::write(dir.join("screenshot.png"), png);
        }
        if let Some(html) = page {
            let _ = fs::write(dir.join("page.html"), html);
        }
        let payload = serde_json::to_vec_pretty(self).context("encoding failure report")?;
        fs::write(dir.join("failure.json"), payload).context("writing failure.json")?;
        Ok(dir.to_path_buf())
    }
}

/// Screenshot, page source and bridge state for a failed run, written under `base`.
pub async fn capture_failure(
    driver: &WebDriver,
    base: &Path,
    key: FailureKey<'_>,
    err: &anyhow::Error,
) -> Result<PathBuf> {
    let at = Utc::now();
    let screenshot = driver.screenshot_as_png().await.ok();
    let page = driver.source().await.ok();
    let state = TestBridge::new(driver).state().await.ok();
    FailureReport::new(key, at, err, state.as_ref()).write(
        &key.dir(base, at),
        screenshot.as_deref(),
        page.as_deref(),
    )
}
