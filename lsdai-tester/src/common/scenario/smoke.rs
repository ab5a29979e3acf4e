use anyhow::{Result, ensure};
use std::time::Duration;
use thirtyfour::prelude::*;

use super::{BrowserScenario, CombinedScenario, LogicScenario, ScenarioCtx, open_page};
use crate::logic::LogicHarness;

pub struct SmokeScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for SmokeScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (controller, bridge) = harness.controller();
        let snapshot = controller.snapshot();

        ensure!(
            snapshot.totals.total == 14,
            "expected 14 catalog items, got {}",
            snapshot.totals.total
        );
        ensure!(
            snapshot.totals.visible == snapshot.totals.total,
            "default filters hide items"
        );
        ensure!(
            snapshot.summary == "No models selected",
            "unexpected summary {:?}",
            snapshot.summary
        );
        ensure!(snapshot.queue.entries.is_empty(), "queue should start empty");
        ensure!(bridge.frame_count() >= 1, "attaching the catalog should render");
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for SmokeScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;

        let card = driver.find(By::Css("#grid li[data-id]")).await?;
        let id = card.attr("data-id").await?.unwrap_or_default();
        card.click().await?;
        if ctx.verbose {
            println!("  🖱️  Clicked grid card {id}");
        }

        let state = ctx
            .bridge
            .wait_for(Duration::from_secs(5), |state| state.totals.selected == 1)
            .await?;
        let summary = driver.find(By::Id("summary")).await?.text().await?;
        ensure!(
            summary == state.summary,
            "rendered summary {summary:?} differs from snapshot {:?}",
            state.summary
        );
        ensure!(
            summary.starts_with("1 models selected"),
            "unexpected summary {summary:?}"
        );

        ctx.bridge.select(&id).await?;
        Ok(())
    }
}

impl CombinedScenario for SmokeScenario {
    fn title(&self) -> &'static str {
        "Smoke Test"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}
