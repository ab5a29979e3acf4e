use anyhow::{Context, Result, bail, ensure};
use lsdai_core::{Notice, QueueStatus, RunSummary, StartOutcome};
use std::time::Duration;
use thirtyfour::prelude::*;

use super::{BrowserScenario, CombinedScenario, LogicScenario, ScenarioCtx, open_page};
use crate::logic::LogicHarness;

const RUN_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_RUN_TIMEOUT: Duration = Duration::from_secs(60);

fn finished(outcome: StartOutcome) -> Result<RunSummary> {
    match outcome {
        StartOutcome::Finished(summary) => Ok(summary),
        StartOutcome::AlreadyRunning => bail!("queue reported it was already running"),
    }
}

pub struct SequentialQueueScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for SequentialQueueScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (controller, bridge) = harness.controller();
        let order = ["sdxl-vae", "detail-tweaker", "add-more-details"];
        ensure!(controller.enqueue(order) == 3, "all three should queue");

        let transfer = harness.transfer();
        let summary = tokio::time::timeout(RUN_TIMEOUT, controller.start_queue(&transfer))
            .await
            .context("queue did not finish")
            .and_then(finished)?;
        ensure!(
            summary.completed + summary.failed == order.len(),
            "every entry should resolve: {summary:?}"
        );

        let frames = bridge.frames();
        for (index, frame) in frames.iter().enumerate() {
            ensure!(
                frame.queue.counts.downloading <= 1,
                "frame {index} has {} downloads in flight",
                frame.queue.counts.downloading
            );
        }

        let resolved_at: Vec<usize> = order
            .iter()
            .map(|id| {
                frames
                    .iter()
                    .position(|frame| {
                        frame
                            .queue
                            .entries
                            .iter()
                            .any(|entry| entry.item_id == *id && entry.status.is_resolved())
                    })
                    .with_context(|| format!("{id} never resolved"))
            })
            .collect::<Result<_>>()?;
        ensure!(
            resolved_at.windows(2).all(|pair| pair[0] < pair[1]),
            "entries resolved out of insertion order: {resolved_at:?}"
        );

        let last = bridge.last().context("no frames rendered")?;
        let ids: Vec<&str> = last.queue.entries.iter().map(|e| e.item_id.as_str()).collect();
        ensure!(ids == order, "queue order changed to {ids:?}");
        ensure!(!last.queue.processing, "queue still marked as processing");
        ensure!(
            bridge.notices().contains(&Notice::QueueFinished {
                completed: summary.completed,
                failed: summary.failed,
            }),
            "missing queue-finished notice"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for SequentialQueueScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;
        let ids = ["add-more-details", "easynegative", "detail-tweaker"];
        for id in ids {
            ctx.bridge.select(id).await?;
        }
        ensure!(ctx.bridge.enqueue().await? == ids.len(), "selection not queued");

        ctx.bridge.start_detached().await?;
        let mut most_in_flight = 0;
        let state = ctx
            .bridge
            .wait_for(BROWSER_RUN_TIMEOUT, |state| {
                most_in_flight = most_in_flight.max(state.downloading_count());
                state.queue_settled()
            })
            .await?;
        ensure!(most_in_flight <= 1, "{most_in_flight} downloads ran at once");
        for id in ids {
            ensure!(
                state.entry_status(id) == Some("completed"),
                "{id} ended as {:?}",
                state.entry_status(id)
            );
        }

        ctx.bridge.clear().await?;
        for id in ids {
            ctx.bridge.select(id).await?;
        }
        Ok(())
    }
}

impl CombinedScenario for SequentialQueueScenario {
    fn title(&self) -> &'static str {
        "Sequential Queue Processing"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}

pub struct ClearMidDownloadScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for ClearMidDownloadScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (controller, bridge) = harness.controller();
        controller.enqueue(["juggernaut-xl", "animagine-xl-31"]);
        let transfer = harness.transfer_with_failure_rate(0.0);

        let clear_when_busy = async {
            while controller.snapshot().queue.counts.downloading == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            controller.clear_queue();
        };
        let (outcome, ()) = tokio::time::timeout(RUN_TIMEOUT, async {
            tokio::join!(controller.start_queue(&transfer), clear_when_busy)
        })
        .await
        .context("queue did not stop after clear")?;

        let summary = finished(outcome)?;
        ensure!(summary.detached == 1, "expected one detached entry: {summary:?}");
        ensure!(summary.completed == 0, "nothing should complete: {summary:?}");

        let last = bridge.last().context("no frames rendered")?;
        ensure!(
            last.queue.entries.is_empty(),
            "cleared entries came back: {:?}",
            last.queue.entries
        );

        ensure!(controller.enqueue(["juggernaut-xl"]) == 1, "re-add refused");
        let entry = controller
            .queue()
            .entry("juggernaut-xl")
            .context("re-added entry missing")?;
        ensure!(
            entry.status == QueueStatus::Queued && entry.progress == 0.0,
            "re-added entry carried old state: {entry:?}"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for ClearMidDownloadScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;
        let ids = ["controlnet-canny", "controlnet-openpose"];
        for id in ids {
            ctx.bridge.select(id).await?;
        }
        ctx.bridge.enqueue().await?;

        ctx.bridge.start_detached().await?;
        ctx.bridge
            .wait_for(BROWSER_RUN_TIMEOUT, |state| state.downloading_count() == 1)
            .await?;
        ctx.bridge.clear().await?;

        let state = ctx
            .bridge
            .wait_for(BROWSER_RUN_TIMEOUT, |state| !state.queue.processing)
            .await?;
        ensure!(
            state.queue.entries.is_empty(),
            "cleared entries came back: {:?}",
            state.queue.entries
        );

        for id in ids {
            ctx.bridge.select(id).await?;
        }
        Ok(())
    }
}

impl CombinedScenario for ClearMidDownloadScenario {
    fn title(&self) -> &'static str {
        "Clear Queue Mid-Download"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}

pub struct DedupScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for DedupScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (controller, _bridge) = harness.controller();
        ensure!(
            controller.enqueue(["sdxl-vae", "sdxl-vae"]) == 1,
            "duplicate ids in one call should queue once"
        );
        ensure!(controller.enqueue(["sdxl-vae"]) == 0, "queued id re-added");

        controller.toggle_selected("sdxl-vae");
        controller.toggle_selected("vae-ft-mse-840000");
        ensure!(
            controller.add_selected_to_queue() == 1,
            "only the new selection should queue"
        );

        finished(controller.start_queue(&harness.transfer_with_failure_rate(0.0)).await)?;
        ensure!(
            controller.enqueue(["sdxl-vae"]) == 0,
            "completed entries still count as queued"
        );
        ensure!(controller.remove_from_queue("sdxl-vae"), "remove failed");
        ensure!(controller.enqueue(["sdxl-vae"]) == 1, "removed id not re-queued");
        ensure!(controller.queue().len() == 2, "unexpected queue length");
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for DedupScenario {
    async fn run_browser(&self, driver: &WebDriver, ctx: &ScenarioCtx<'_>) -> Result<()> {
        open_page(driver, ctx).await?;
        ctx.bridge.select("sdxl-vae").await?;
        ensure!(ctx.bridge.enqueue().await? == 1, "selection not queued");
        ensure!(ctx.bridge.enqueue().await? == 0, "duplicate queued");
        let state = ctx.bridge.state().await?;
        ensure!(
            state.queue.entries.len() == 1,
            "expected one entry, got {}",
            state.queue.entries.len()
        );
        ctx.bridge.clear().await?;
        ctx.bridge.select("sdxl-vae").await?;
        Ok(())
    }
}

impl CombinedScenario for DedupScenario {
    fn title(&self) -> &'static str {
        "Queue Deduplication"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}

pub struct FailureRecoveryScenario;

#[async_trait::async_trait(?Send)]
impl LogicScenario for FailureRecoveryScenario {
    async fn run_logic(&self, harness: &LogicHarness) -> Result<()> {
        let (controller, bridge) = harness.controller();
        controller.enqueue(["detail-tweaker", "easynegative"]);

        let failing = harness.transfer_with_failure_rate(1.0);
        let summary = finished(controller.start_queue(&failing).await)?;
        ensure!(summary.failed == 2, "both should fail: {summary:?}");
        let failures = bridge
            .notices()
            .iter()
            .filter(|notice| matches!(notice, Notice::TransferFailed { .. }))
            .count();
        ensure!(failures == 2, "expected two failure notices, got {failures}");
        ensure!(
            controller
                .queue()
                .entries()
                .iter()
                .all(|entry| entry.status == QueueStatus::Error && entry.error.is_some()),
            "failed entries should carry an error"
        );

        let rerun = finished(controller.start_queue(&failing).await)?;
        ensure!(
            rerun == RunSummary::default(),
            "failed entries retried without being asked: {rerun:?}"
        );

        ensure!(controller.retry_failed() == 2, "retry should reset both");
        let healthy = harness.transfer_with_failure_rate(0.0);
        let summary = finished(controller.start_queue(&healthy).await)?;
        ensure!(summary.completed == 2, "retry did not complete: {summary:?}");
        ensure!(
            controller.snapshot().queue.counts.error == 0,
            "errors left after retry"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserScenario for FailureRecoveryScenario {
    async fn run_browser(&self, _driver: &WebDriver, _ctx: &ScenarioCtx<'_>) -> Result<()> {
        bail!("failure injection is only available headless; run with --mode logic")
    }
}

impl CombinedScenario for FailureRecoveryScenario {
    fn title(&self) -> &'static str {
        "Failed Transfer Retry"
    }

    fn as_logic(&self) -> &dyn LogicScenario {
        self
    }
}
