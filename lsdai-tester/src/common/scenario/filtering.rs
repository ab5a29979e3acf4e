use anyhow::{Result, ensure};
use lsdai_core::{FilterChoice, FilterPatch, ModelCategory};
use std::time::Duration;
use thirtyfour::prelude::*;

use super::{BrowserScenario, CombinedScenario, LogicScenario, ScenarioCtx, open_page};
use crate::logic::LogicHarness;

pub struct FilterSearchScenario;

fn visible_ids(snapshot: &lsdai_core::ViewSnapshot) -> Vec<&str> {
    snapshot.items.iter().map(|item| item.id.as_str()).collect()
}

#[async_trait::async_trait(?Send)]
impl LogicScenario for FilterSearchScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (controller, _bridge) = harness.controller();
        let quiet = harness.config().quiet_period_ms;
        let total = controller.catalog().len();

        let stale = controller.search_input("an", 1_000);
        controller.search_input("anime", 1_100);
        ensure!(
            controller.snapshot().totals.visible == total,
            "search applied before the quiet period"
        );
        ensure!(!controller.fire_search(stale), "superseded keystroke fired");
        ensure!(
            !controller.poll_search(1_100 + quiet - 1),
            "search fired early"
        );
        ensure!(controller.poll_search(1_100 + quiet), "search never fired");

        let snapshot = controller.snapshot();
        let ids = visible_ids(&snapshot);
        ensure!(
            ids == ["anime-pastel-dream", "anime-lineart"],
            "unexpected search result {ids:?}"
        );

        controller.apply_filter(FilterPatch::category(FilterChoice::Only(
            ModelCategory::Lora,
        )));
        let snapshot = controller.snapshot();
        ensure!(
            visible_ids(&snapshot) == ["anime-lineart"],
            "category did not narrow the search"
        );

        controller.search_input("xyz", 2_000);
        controller.clear_filters();
        ensure!(!controller.search_pending(), "clear left a search pending");
        ensure!(
            !controller.poll_search(2_000 + quiet),
            "cleared search fired"
        );
        ensure!(
            controller.snapshot().totals.visible == total,
            "clear did not restore the grid"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for FilterSearchScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;
        let total = ctx.bridge.state().await?.totals.total;

        ctx.bridge.search("anime").await?;
        let state = ctx.bridge.state().await?;
        ensure!(
            state.visible_ids() == ["anime-pastel-dream", "anime-lineart"],
            "unexpected search result {:?}",
            state.visible_ids()
        );

        ctx.bridge.category("lora").await?;
        let state = ctx.bridge.state().await?;
        ensure!(
            state.visible_ids() == ["anime-lineart"],
            "category did not narrow the search: {:?}",
            state.visible_ids()
        );

        ctx.bridge.category("all").await?;
        ctx.bridge.search("").await?;

        // Typed input goes through the page's debounce timer.
        let input = driver.find(By::Id("search")).await?;
        input.send_keys("dream").await?;
        let state = ctx
            .bridge
            .wait_for(Duration::from_secs(5), |state| state.totals.visible == 2)
            .await?;
        ensure!(
            state.visible_ids() == ["dreamshaper-8", "anime-pastel-dream"],
            "unexpected typed search result {:?}",
            state.visible_ids()
        );

        ctx.bridge.search("").await?;
        let state = ctx.bridge.state().await?;
        ensure!(state.totals.visible == total, "grid not restored");
        Ok(())
    }
}

impl CombinedScenario for FilterSearchScenario {
    fn title(&self) -> &'static str {
        "Debounced Search and Filters"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}
