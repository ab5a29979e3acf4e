use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use thirtyfour::prelude::*;

/// Global the page publishes when loaded with `?test=1`.
pub const BRIDGE_GLOBAL: &str = "__lsdaiBridge";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeItem {
    pub id: String,
    pub selected: bool,
    pub favorited: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeTotals {
    pub total: usize,
    pub visible: usize,
    pub selected: usize,
    pub favorites: usize,
    pub selected_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeEntry {
    pub item_id: String,
    pub status: String,
    pub progress: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeQueue {
    pub entries: Vec<BridgeEntry>,
    pub total_label: String,
    pub processing: bool,
}

/// The slice of the page's view snapshot the browser scenarios assert on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeState {
    pub items: Vec<BridgeItem>,
    pub totals: BridgeTotals,
    pub summary: String,
    pub queue: BridgeQueue,
}

impl BridgeState {
    pub fn visible_ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn entry_status(&self, id: &str) -> Option<&str> {
        self.queue
            .entries
            .iter()
            .find(|entry| entry.item_id == id)
            .map(|entry| entry.status.as_str())
    }

    pub fn downloading_count(&self) -> usize {
        self.queue
            .entries
            .iter()
            .filter(|entry| entry.status == "downloading")
            .count()
    }

    pub fn queue_settled(&self) -> bool {
        !self.queue.processing
            && self
                .queue
                .entries
                .iter()
                .all(|entry| matches!(entry.status.as_str(), "completed" | "error" | "paused"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartReport {
    pub already_running: bool,
    pub completed: usize,
    pub failed: usize,
    pub detached: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct TestBridge<'a> {
    driver: &'a WebDriver,
}

impl<'a> TestBridge<'a> {
    pub const fn new(driver: &'a WebDriver) -> Self {
        Self { driver }
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let params = (0..args.len())
            .map(|i| format!("arguments[{i}]"))
            .collect::<Vec<_>>()
            .join(", ");
        let script = format!("return window.{BRIDGE_GLOBAL}.{method}({params})");
        let result = self
            .driver
            .execute(&script, args)
            .await
            .with_context(|| format!("calling {BRIDGE_GLOBAL}.{method}"))?;
        Ok(result.json().clone())
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        let value = self.call(method, args).await?;
        serde_json::from_value(value).with_context(|| format!("parsing {method} result"))
    }

    pub async fn ensure_available(&self) -> Result<()> {
        let result = self
            .driver
            .execute(&format!("return !!window.{BRIDGE_GLOBAL}"), vec![])
            .await?;
        if !result.json().as_bool().unwrap_or(false) {
            bail!("{BRIDGE_GLOBAL} is not available. Did you pass ?test=1 to the page?");
        }
        Ok(())
    }

    pub async fn state(&self) -> Result<BridgeState> {
        self.call_as("state", vec![]).await
    }

    pub async fn select(&self, id: &str) -> Result<bool> {
        self.call_as("select", vec![id.into()]).await
    }

    pub async fn favorite(&self, id: &str) -> Result<bool> {
        self.call_as("favorite", vec![id.into()]).await
    }

    pub async fn search(&self, text: &str) -> Result<()> {
        self.call("search", vec![text.into()]).await.map(drop)
    }

    pub async fn category(&self, category: &str) -> Result<()> {
        self.call("category", vec![category.into()]).await.map(drop)
    }

    /// Queue the current selection; returns how many entries were added.
    pub async fn enqueue(&self) -> Result<usize> {
        self.call_as("enqueue", vec![]).await
    }

    /// Run the queue to completion. The page returns a promise, which the
    /// driver awaits before handing back the report.
    pub async fn start(&self) -> Result<StartReport> {
        self.call_as("start", vec![]).await
    }

    /// Kick off the queue without waiting for it to finish.
    pub async fn start_detached(&self) -> Result<()> {
        self.driver
            .execute(
                &format!("window.{BRIDGE_GLOBAL}.start(); return null"),
                vec![],
            )
            .await
            .context("starting queue")?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.call("clear", vec![]).await.map(drop)
    }

    pub async fn prefs(&self, key: &str) -> Result<Value> {
        self.call("prefs", vec![key.into()]).await
    }

    /// Poll [`Self::state`] until `done` holds or `timeout` passes.
    pub async fn wait_for<F>(&self, timeout: Duration, mut done: F) -> Result<BridgeState>
    where
        F: FnMut(&BridgeState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state().await?;
            if done(&state) {
                return Ok(state);
            }
            if Instant::now() >= deadline {
                bail!("timed out after {timeout:?}; last state: {state:?}");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bridge_state_reads_snapshot_subset() {
        let state: BridgeState = serde_json::from_value(json!({
            "items": [{"id": "sdxl-vae", "selected": true, "favorited": false, "rating": 4.5}],
            "totals": {"total": 14, "visible": 1, "selected": 1, "favorites": 0,
                       "selected_gib": 0.31, "selected_label": "319 MB"},
            "summary": "1 models selected (vae: 1) - 319 MB",
            "queue": {"entries": [{"item_id": "sdxl-vae", "status": "downloading", "progress": 40.0}],
                      "total_label": "319 MB", "processing": true, "counts": {}}
        }))
        .unwrap();
        assert_eq!(state.visible_ids(), ["sdxl-vae"]);
        assert_eq!(state.entry_status("sdxl-vae"), Some("downloading"));
        assert_eq!(state.downloading_count(), 1);
        assert!(!state.queue_settled());
    }

    #[test]
    fn empty_queue_is_settled() {
        assert!(BridgeState::default().queue_settled());
    }

    #[test]
    fn start_report_uses_camel_case() {
        let report: StartReport =
            serde_json::from_value(json!({"alreadyRunning": false, "completed": 2, "failed": 1}))
                .unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.already_running);
    }
}
