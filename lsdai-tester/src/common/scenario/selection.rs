use anyhow::{Result, ensure};
use lsdai_core::{Catalog, FilterChoice, FilterPatch};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;
use thirtyfour::prelude::*;

use super::{BrowserScenario, CombinedScenario, LogicScenario, ScenarioCtx, open_page};
use crate::logic::{HarnessController, LogicHarness};

const TWO_ITEM_CATALOG: &str = r#"{"items": [
    {"id": "base", "name": "Base", "category": "checkpoint",
     "size": {"value": 2.0, "unit": "GB"}},
    {"id": "detail", "name": "Detail", "category": "lora",
     "size": {"value": 512, "unit": "MB"}}
]}"#;

const PARITY_STEPS: usize = 200;
const BROWSER_PARITY_STEPS: usize = 20;

pub struct SelectionTotalsScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for SelectionTotalsScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let catalog = Rc::new(Catalog::from_json(TWO_ITEM_CATALOG)?);
        let (controller, bridge) = harness.isolated_controller(catalog);

        ensure!(controller.toggle_selected("base"), "base should select");
        ensure!(controller.toggle_selected("detail"), "detail should select");
        let gib = controller.selected_total_gib();
        ensure!(
            (gib - 2.5).abs() < 1e-9,
            "2.0 GB + 512 MB should be 2.5 GiB, got {gib}"
        );

        let summary = bridge.last().map(|frame| frame.summary).unwrap_or_default();
        ensure!(
            summary == "2 models selected (checkpoint: 1, lora: 1) - 2.50 GB",
            "unexpected summary {summary:?}"
        );

        controller.toggle_selected("base");
        let summary = controller.snapshot().summary;
        ensure!(
            summary == "1 models selected (lora: 1) - 512 MB",
            "unexpected summary {summary:?}"
        );

        let frames = bridge.frame_count();
        ensure!(!controller.toggle_selected("ghost"), "unknown ids never select");
        ensure!(bridge.frame_count() == frames, "unknown ids must not re-render");
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for SelectionTotalsScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;

        ctx.bridge.select("realistic-vision-v6").await?;
        ctx.bridge.select("vae-ft-mse-840000").await?;
        let state = ctx
            .bridge
            .wait_for(Duration::from_secs(5), |state| state.totals.selected == 2)
            .await?;
        ensure!(
            state.totals.selected_label == "2.41 GB",
            "2.1 GB + 319 MB should total 2.41 GB, got {}",
            state.totals.selected_label
        );
        ensure!(
            state.summary == "2 models selected (checkpoint: 1, vae: 1) - 2.41 GB",
            "unexpected summary {:?}",
            state.summary
        );

        ctx.bridge.select("realistic-vision-v6").await?;
        ctx.bridge.select("vae-ft-mse-840000").await?;
        Ok(())
    }
}

impl CombinedScenario for SelectionTotalsScenario {
    fn title(&self) -> &'static str {
        "Selection Totals and Summary"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}

/// Random toggles checked against a plain set after every step.
pub struct SelectionParityScenario;

fn toggle_in(model: &mut BTreeSet<String>, id: &str) {
    if !model.remove(id) {
        model.insert(id.to_string());
    }
}

fn check_parity(
    controller: &HarnessController,
    catalog: &Catalog,
    selected: &BTreeSet<String>,
    favorites: &BTreeSet<String>,
    step: usize,
) -> Result<()> {
    let actual = controller.selected_ids();
    ensure!(
        actual.iter().eq(selected.iter()),
        "step {step}: selection {actual:?} != expected {selected:?}"
    );

    let snapshot = controller.snapshot();
    ensure!(
        snapshot.totals.favorites == favorites.len(),
        "step {step}: {} favorites, expected {}",
        snapshot.totals.favorites,
        favorites.len()
    );
    for item in &snapshot.items {
        ensure!(
            item.selected == selected.contains(&item.id)
                && item.favorited == favorites.contains(&item.id),
            "step {step}: card {} shows stale flags",
            item.id
        );
    }

    let expected_gib: f64 = selected
        .iter()
        .filter_map(|id| catalog.get(id))
        .map(|item| item.size.gib())
        .sum();
    let gib = controller.selected_total_gib();
    ensure!(
        (gib - expected_gib).abs() < 1e-9,
        "step {step}: total {gib} != expected {expected_gib}"
    );
    Ok(())
}

#[async_trait::async_trait(?Send)]
impl LogicScenario for SelectionParityScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let catalog = harness.catalog();
        let (controller, _bridge) = harness.isolated_controller(Rc::clone(&catalog));
        let mut rng = ChaCha8Rng::seed_from_u64(harness.seed());
        let ids: Vec<String> = catalog.items().iter().map(|item| item.id.clone()).collect();
        let mut selected = BTreeSet::new();
        let mut favorites = BTreeSet::new();

        for step in 0..PARITY_STEPS {
            let id = &ids[rng.gen_range(0..ids.len())];
            match rng.gen_range(0..100) {
                0..60 => {
                    controller.toggle_selected(id);
                    toggle_in(&mut selected, id);
                }
                60..85 => {
                    controller.toggle_favorite(id);
                    toggle_in(&mut favorites, id);
                }
                85..90 => {
                    let category = catalog.get(id).map(|item| item.category);
                    if let Some(category) = category {
                        controller
                            .apply_filter(FilterPatch::category(FilterChoice::Only(category)));
                        controller.select_visible();
                        controller.clear_filters();
                        selected.extend(
                            catalog
                                .items()
                                .iter()
                                .filter(|item| item.category == category)
                                .map(|item| item.id.clone()),
                        );
                    }
                }
                90..95 => {
                    controller.clear_selection();
                    selected.clear();
                }
                _ => {
                    ensure!(!controller.toggle_selected("ghost-model"), "ghost selected");
                }
            }
            check_parity(&controller, &catalog, &selected, &favorites, step)?;
        }

        if harness.verbose() {
            println!(
                "    {} selected, {} favorites after {PARITY_STEPS} steps",
                selected.len(),
                favorites.len()
            );
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for SelectionParityScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;

        let ids: Vec<String> = ctx
            .bridge
            .state()
            .await?
            .visible_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        ensure!(!ids.is_empty(), "grid is empty");

        let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
        let mut selected = BTreeSet::new();
        for step in 0..BROWSER_PARITY_STEPS {
            let id = &ids[rng.gen_range(0..ids.len())];
            let now_selected = ctx.bridge.select(id).await?;
            toggle_in(&mut selected, id);
            ensure!(
                now_selected == selected.contains(id),
                "step {step}: bridge reported {now_selected} for {id}"
            );
        }

        let state = ctx.bridge.state().await?;
        ensure!(
            state.totals.selected == selected.len(),
            "page shows {} selected, expected {}",
            state.totals.selected,
            selected.len()
        );
        for item in &state.items {
            ensure!(
                item.selected == selected.contains(&item.id),
                "card {} shows stale selection",
                item.id
            );
        }

        for id in &selected {
            ctx.bridge.select(id).await?;
        }
        Ok(())
    }
}

impl CombinedScenario for SelectionParityScenario {
    fn title(&self) -> &'static str {
        "Random Selection Parity"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}
