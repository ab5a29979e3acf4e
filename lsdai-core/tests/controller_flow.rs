use futures::executor::block_on;
use lsdai_core::{
    Catalog, Controller, ControllerConfig, ExportDocument, FilterChoice, FilterPatch,
    MemoryPreferences, ModelCategory, Notice, PreferenceStore, QueueStatus, RenderBridge,
    SimulatedTransfer, SimulationConfig, Sleeper, StartOutcome, ViewSnapshot,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn load_catalog() -> Rc<Catalog> {
    Rc::new(Catalog::from_json(include_str!("../../lsdai-web/static/data/catalog.json")).unwrap())
}

#[derive(Clone, Default)]
struct RecordingBridge {
    frames: Rc<RefCell<Vec<ViewSnapshot>>>,
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingBridge {
    fn last(&self) -> ViewSnapshot {
        self.frames.borrow().last().cloned().unwrap()
    }
}

impl RenderBridge for RecordingBridge {
    fn render(&self, snapshot: &ViewSnapshot) {
        self.frames.borrow_mut().push(snapshot.clone());
    }

    fn notify(&self, notice: &Notice) {
        self.notices.borrow_mut().push(notice.clone());
    }
}

struct InstantSleeper;

impl Sleeper for InstantSleeper {
    async fn sleep_ms(&self, _ms: u32) {}
}

fn controller_with(
    prefs: MemoryPreferences,
) -> (Controller<MemoryPreferences, RecordingBridge>, RecordingBridge) {
    let bridge = RecordingBridge::default();
    let controller = Controller::new(ControllerConfig::default(), prefs, bridge.clone());
    controller.attach_catalog(load_catalog());
    (controller, bridge)
}

#[test]
fn typing_filters_only_after_quiet_period() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    let all = bridge.last().totals.visible;
    assert_eq!(all, 14);

    controller.search_input("an", 0);
    controller.search_input("anime", 100);
    assert!(!controller.poll_search(350), "second keystroke restarted the timer");
    assert_eq!(bridge.last().totals.visible, all);

    assert!(controller.poll_search(400));
    let view = bridge.last();
    assert_eq!(view.totals.visible, 2);
    assert!(
        view.items
            .iter()
            .all(|item| item.name.to_lowercase().contains("anime"))
    );
    assert!(!controller.search_pending());
}

#[test]
fn stale_search_ticket_does_not_fire() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    let stale = controller.search_input("dream", 0);
    let latest = controller.search_input("dreamshaper", 50);
    assert!(!controller.fire_search(stale));
    assert!(controller.fire_search(latest));
    assert_eq!(bridge.last().totals.visible, 1);
}

#[test]
fn clearing_filters_drops_pending_search() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.apply_filter(FilterPatch::category(FilterChoice::Only(ModelCategory::Vae)));
    assert_eq!(bridge.last().totals.visible, 2);

    controller.search_input("sdxl", 0);
    controller.clear_filters();
    assert!(!controller.poll_search(1_000));
    let view = bridge.last();
    assert_eq!(view.totals.visible, 14);
    assert!(view.criteria.is_default());
}

#[test]
fn category_and_style_filters_combine() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.apply_filter(FilterPatch::category(FilterChoice::Only(
        ModelCategory::Checkpoint,
    )));
    controller.apply_filter(FilterPatch::style(FilterChoice::Only("anime".into())));
    let ids: Vec<String> = bridge.last().items.into_iter().map(|item| item.id).collect();
    assert_eq!(
        ids,
        ["anime-pastel-dream", "meinamix-v11", "animagine-xl-31"]
    );
}

#[test]
fn select_visible_then_summary_reflects_totals() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.apply_filter(FilterPatch::category(FilterChoice::Only(
        ModelCategory::ControlNet,
    )));
    assert_eq!(controller.select_visible(), 2);
    controller.clear_filters();
    controller.toggle_selected("detail-tweaker");

    let view = bridge.last();
    assert_eq!(view.totals.selected, 3);
    let expected = 1.4 + 1.4 + 144.0 / 1024.0;
    assert!((controller.selected_total_gib() - expected).abs() < 1e-9);
    assert_eq!(
        view.summary,
        "3 models selected (lora: 1, controlnet: 2) - 2.94 GB"
    );

    controller.clear_selection();
    assert_eq!(bridge.last().summary, "No models selected");
}

#[test]
fn unknown_ids_are_ignored() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    let frames = bridge.frames.borrow().len();
    assert!(!controller.toggle_selected("not-in-catalog"));
    assert!(!controller.toggle_favorite("not-in-catalog"));
    assert_eq!(bridge.frames.borrow().len(), frames);
    assert!(controller.selected_ids().is_empty());
}

#[test]
fn favorites_survive_a_new_controller() {
    let prefs = MemoryPreferences::default();
    let (first, _) = controller_with(prefs.clone());
    first.toggle_favorite("sdxl-vae");
    first.toggle_favorite("dreamshaper-8");
    first.toggle_favorite("sdxl-vae");
    assert_eq!(prefs.get("favorites"), Some(json!(["dreamshaper-8"])));

    let (second, bridge) = controller_with(prefs);
    let view = bridge.last();
    assert_eq!(view.totals.favorites, 1);
    assert!(
        view.items
            .iter()
            .any(|item| item.id == "dreamshaper-8" && item.favorited)
    );
    drop(second);
}

#[test]
fn attaching_a_catalog_prunes_stale_favorites() {
    let prefs = MemoryPreferences::default();
    prefs.set("favorites", &json!(["retired-model", "sdxl-vae"]));
    let (_controller, bridge) = controller_with(prefs.clone());
    assert_eq!(bridge.last().totals.favorites, 1);
    assert_eq!(prefs.get("favorites"), Some(json!(["sdxl-vae"])));
}

#[test]
fn settings_write_through_and_reload() {
    let prefs = MemoryPreferences::default();
    let (controller, _) = controller_with(prefs.clone());
    controller.update_settings(|settings| settings.sdxl = true);
    let (reloaded, _) = controller_with(prefs);
    assert!(reloaded.settings().sdxl);
    assert!(!reloaded.settings().inpainting_only);
}

#[test]
fn queue_run_pushes_snapshots_and_finish_notice() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.toggle_selected("add-more-details");
    controller.toggle_selected("easynegative");
    assert_eq!(controller.add_selected_to_queue(), 2);
    assert_eq!(controller.add_selected_to_queue(), 0);

    let transfer = SimulatedTransfer::new(InstantSleeper, SimulationConfig::default(), 7);
    let outcome = block_on(controller.start_queue(&transfer));
    assert!(matches!(outcome, StartOutcome::Finished(s) if s.completed == 2));

    let frames = bridge.frames.borrow();
    assert!(frames.iter().any(|frame| frame.queue.processing));
    let last = frames.last().unwrap();
    assert!(!last.queue.processing);
    assert_eq!(last.queue.counts.completed, 2);
    assert_eq!(
        bridge.notices.borrow().last(),
        Some(&Notice::QueueFinished {
            completed: 2,
            failed: 0
        })
    );
}

#[test]
fn failing_transfers_raise_notices_and_retry() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.enqueue(["sdxl-vae", "detail-tweaker"]);

    let broken = SimulatedTransfer::new(
        InstantSleeper,
        SimulationConfig {
            failure_rate: 1.0,
            ..SimulationConfig::default()
        },
        1,
    );
    block_on(controller.start_queue(&broken));
    let failures = bridge
        .notices
        .borrow()
        .iter()
        .filter(|notice| matches!(notice, Notice::TransferFailed { .. }))
        .count();
    assert_eq!(failures, 2);
    assert_eq!(bridge.last().queue.counts.error, 2);

    assert_eq!(controller.retry_failed(), 2);
    let healthy = SimulatedTransfer::new(InstantSleeper, SimulationConfig::default(), 1);
    block_on(controller.start_queue(&healthy));
    assert_eq!(bridge.last().queue.counts.completed, 2);
}

#[test]
fn removing_and_clearing_queue_entries() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.enqueue(["sdxl-vae", "detail-tweaker", "juggernaut-xl"]);
    assert!(controller.remove_from_queue("detail-tweaker"));
    assert!(!controller.remove_from_queue("detail-tweaker"));
    assert_eq!(bridge.last().queue.entries.len(), 2);
    assert!(controller.pause_entry("sdxl-vae").is_err());

    controller.clear_queue();
    let view = bridge.last();
    assert!(view.queue.entries.is_empty());
    assert_eq!(view.queue.total_label, "0 MB");
}

#[test]
fn export_then_import_restores_state() {
    let (source, _) = controller_with(MemoryPreferences::default());
    source.toggle_favorite("meinamix-v11");
    source.toggle_selected("juggernaut-xl");
    source.toggle_selected("sdxl-vae");
    source.update_settings(|settings| settings.detailed_download = true);
    source.add_selected_to_queue();
    let json = source.export_json().unwrap();

    let doc = ExportDocument::from_json(&json).unwrap();
    assert_eq!(doc.selected, ["juggernaut-xl", "sdxl-vae"]);

    let prefs = MemoryPreferences::default();
    let (target, bridge) = controller_with(prefs.clone());
    let summary = target.import_json(&json).unwrap();
    assert_eq!(summary.favorites, 1);
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.queued, 2);

    let view = bridge.last();
    assert!(view.settings.detailed_download);
    assert_eq!(view.totals.selected, 2);
    assert!(
        view.queue
            .entries
            .iter()
            .all(|entry| entry.status == QueueStatus::Queued)
    );
    assert_eq!(prefs.get("favorites"), Some(json!(["meinamix-v11"])));
}

#[test]
fn import_rejects_future_versions_without_changes() {
    let (controller, bridge) = controller_with(MemoryPreferences::default());
    controller.toggle_selected("sdxl-vae");
    let doc = json!({ "version": 99, "selected": ["dreamshaper-8"] }).to_string();
    assert!(controller.import_json(&doc).is_err());
    assert_eq!(controller.selected_ids(), ["sdxl-vae"]);
    assert_eq!(bridge.last().totals.selected, 1);
}

#[test]
fn failing_store_keeps_in_memory_state() {
    let (controller, bridge) = controller_with(MemoryPreferences::failing());
    assert!(controller.toggle_favorite("dreamshaper-8"));
    controller.update_settings(|settings| settings.inpainting_only = true);
    assert_eq!(bridge.last().totals.favorites, 1);
    assert!(controller.settings().inpainting_only);
    let keys: Vec<Notice> = bridge.notices.borrow().clone();
    assert_eq!(
        keys,
        [
            Notice::PreferencesNotSaved {
                key: "favorites".into()
            },
            Notice::PreferencesNotSaved {
                key: "settings".into()
            },
        ]
    );
}
