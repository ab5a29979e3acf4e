use anyhow::Result;
use thirtyfour::prelude::*;

use crate::browser::TestBridge;
use crate::logic::LogicHarness;

pub mod favorites;
pub mod filtering;
pub mod queue;
pub mod selection;
pub mod smoke;

#[derive(Debug, Clone)]
pub struct ScenarioCtx<'a> {
    pub base_url: String,
    pub seed: u64,
    pub bridge: TestBridge<'a>,
    pub verbose: bool,
}

// Headless check against a controller built by the harness
#[async_trait::async_trait(?Send)]
pub trait LogicScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()>;
}

// Browser test scenario
#[async_trait::async_trait]
pub trait BrowserScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()>;
}

// Scenario that can run both headless and in a browser
pub trait CombinedScenario: BrowserScenario + LogicScenario {
    fn title(&self) -> &'static str;

    fn as_logic(&self) -> &dyn LogicScenario;
}

/// Open the page and wait for the bridge to see the catalog.
pub(crate) async fn open_page(driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
    driver.goto(&ctx.base_url).await?;
    driver.find(By::Id("grid")).await?;
    ctx.bridge.ensure_available().await?;
    ctx.bridge
        .wait_for(std::time::Duration::from_secs(10), |state| {
            state.totals.total > 0
        })
        .await?;
    if ctx.verbose {
        println!("  🌐 Page loaded, bridge connected (seed {})", ctx.seed);
    }
    Ok(())
}

pub fn get_scenario(name: &str) -> Option<Box<dyn CombinedScenario + Send + Sync>> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(Box::new(smoke::SmokeScenario)),
        "selection-totals" | "totals" => Some(Box::new(selection::SelectionTotalsScenario)),
        "selection-parity" | "parity" => Some(Box::new(selection::SelectionParityScenario)),
        "sequential-queue" | "queue" => Some(Box::new(queue::SequentialQueueScenario)),
        "clear-mid-download" | "clear" => Some(Box::new(queue::ClearMidDownloadScenario)),
        "dedup" | "queue-dedup" => Some(Box::new(queue::DedupScenario)),
        "failure-recovery" | "retry" => Some(Box::new(queue::FailureRecoveryScenario)),
        "filter-search" | "filters" => Some(Box::new(filtering::FilterSearchScenario)),
        "favorites-persist" | "favorites" => Some(Box::new(favorites::FavoritesPersistScenario)),
        "export-import" | "export" => Some(Box::new(favorites::ExportImportScenario)),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("selection-totals", "Selection Totals and Summary"),
        ("selection-parity", "Random Selection Parity"),
        ("sequential-queue", "Sequential Queue Processing"),
        ("clear-mid-download", "Clear Queue Mid-Download"),
        ("dedup", "Queue Deduplication"),
        ("failure-recovery", "Failed Transfer Retry"),
        ("filter-search", "Debounced Search and Filters"),
        ("favorites-persist", "Favorites Persistence"),
        ("export-import", "Export and Import Roundtrip"),
    ]
}
