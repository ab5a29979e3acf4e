use anyhow::{Context, Result, bail, ensure};
use lsdai_core::constants::FAVORITES_KEY;
use lsdai_core::{ExportError, ImportSummary, PreferenceStore, QueueStatus, ViewSnapshot};
use serde_json::json;
use std::collections::BTreeSet;
use thirtyfour::prelude::*;

use super::{BrowserScenario, CombinedScenario, LogicScenario, ScenarioCtx, open_page};
use crate::logic::LogicHarness;

fn favorited(snapshot: &ViewSnapshot) -> BTreeSet<String> {
    snapshot
        .items
        .iter()
        .filter(|item| item.favorited)
        .map(|item| item.id.clone())
        .collect()
}

pub struct FavoritesPersistScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for FavoritesPersistScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        // The store may be a file shared across iterations, so work relative
        // to whatever is already favorited.
        let (first, bridge) = harness.controller();
        let before = favorited(&first.snapshot());
        let stored_before = harness.prefs().get(FAVORITES_KEY);

        first.toggle_favorite("juggernaut-xl");
        ensure!(!first.toggle_favorite("ghost-model"), "unknown id favorited");
        let mut expected = before.clone();
        if !expected.remove("juggernaut-xl") {
            expected.insert("juggernaut-xl".to_string());
        }
        ensure!(bridge.notices().is_empty(), "favorite write failed");

        let (second, _) = harness.controller();
        let reloaded = favorited(&second.snapshot());
        ensure!(
            reloaded == expected,
            "favorites after reload {reloaded:?} != {expected:?}"
        );

        let mut stale: Vec<String> = expected.iter().cloned().collect();
        stale.push("ghost-model".to_string());
        harness.prefs().set(FAVORITES_KEY, &json!(stale));
        let (third, _) = harness.controller();
        ensure!(
            third.snapshot().totals.favorites == expected.len(),
            "stale favorite survived the catalog attach"
        );

        harness
            .prefs()
            .set(FAVORITES_KEY, &stored_before.unwrap_or_else(|| json!([])));
        let (restored, _) = harness.controller();
        ensure!(
            favorited(&restored.snapshot()) == before,
            "favorites not restored"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for FavoritesPersistScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;
        let id = "juggernaut-xl";
        let now_favorite = ctx.bridge.favorite(id).await?;

        let stored = ctx.bridge.prefs(FAVORITES_KEY).await?;
        let listed = stored
            .as_array()
            .is_some_and(|ids| ids.iter().any(|value| value == id));
        ensure!(
            listed == now_favorite,
            "stored favorites {stored} disagree with toggle result {now_favorite}"
        );

        // A fresh load reads favorites back from localStorage.
        open_page(driver, ctx).await?;
        let state = ctx.bridge.state().await?;
        let item = state
            .items
            .iter()
            .find(|item| item.id == id)
            .context("favorited item missing from grid")?;
        ensure!(
            item.favorited == now_favorite,
            "favorite lost across reload"
        );

        ctx.bridge.favorite(id).await?;
        Ok(())
    }
}

impl CombinedScenario for FavoritesPersistScenario {
    fn title(&self) -> &'static str {
        "Favorites Persistence"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}

pub struct ExportImportScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for ExportImportScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (source, _) = harness.isolated_controller(harness.catalog());
        source.toggle_selected("sdxl-vae");
        source.toggle_selected("juggernaut-xl");
        source.toggle_favorite("easynegative");
        source.update_settings(|settings| settings.sdxl = true);
        source.enqueue(["controlnet-canny"]);
        let exported = source.export_json()?;

        let (target, bridge) = harness.isolated_controller(harness.catalog());
        let summary = target.import_json(&exported)?;
        ensure!(
            summary
                == ImportSummary {
                    favorites: 1,
                    selected: 2,
                    queued: 1,
                },
            "unexpected import summary {summary:?}"
        );
        ensure!(
            target.selected_ids() == ["juggernaut-xl", "sdxl-vae"],
            "selection not restored: {:?}",
            target.selected_ids()
        );
        ensure!(target.settings().sdxl, "settings not restored");
        let entry = target
            .queue()
            .entry("controlnet-canny")
            .context("queue entry not restored")?;
        ensure!(entry.status == QueueStatus::Queued, "restored entry is {}", entry.status);
        ensure!(bridge.notices().is_empty(), "import raised notices");

        let mut future: serde_json::Value = serde_json::from_str(&exported)?;
        future["version"] = json!(99);
        future["selected"] = json!(["dreamshaper-8"]);
        match target.import_json(&future.to_string()) {
            Err(ExportError::UnsupportedVersion { found: 99, .. }) => {}
            other => bail!("future export accepted: {other:?}"),
        }
        ensure!(
            target.selected_ids() == ["juggernaut-xl", "sdxl-vae"],
            "rejected import changed the selection"
        );

        let foreign = json!({
            "version": 1,
            "favorites": ["ghost-model"],
            "selected": ["ghost-model"]
        });
        let summary = target.import_json(&foreign.to_string())?;
        ensure!(
            summary.favorites == 0 && summary.selected == 0,
            "unknown ids imported: {summary:?}"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for ExportImportScenario {
    async fn run_browser(&self, _driver: &WebDriver, _ctx: &ScenarioCtx<'_>) -> Result<()> {
        bail!("export and import are not exposed on the test bridge; run with --mode logic")
    }
}

impl CombinedScenario for ExportImportScenario {
    fn title(&self) -> &'static str {
        "Export and Import Roundtrip"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}
