//! `LsdaiController`: the JavaScript-facing handle used by the notebook widgets.
use crate::bridge::{JsRenderBridge, to_js};
use crate::catalog_source::{CatalogSlot, WebCatalogSource, embedded_config};
use crate::dom;
use crate::storage::LocalStoragePreferences;
use crate::test_bridge::TestBridge;
use crate::timer::{BrowserSleeper, SearchTimer};
use js_sys::{Function, Promise};
use lsdai_core::{
    Controller, ControllerConfig, ExportDocument, FilterChoice, FilterPatch,
    Settings, SimulatedTransfer, StartOutcome,
};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub type WebController = Controller<LocalStoragePreferences, JsRenderBridge>;
pub type WebTransfer = SimulatedTransfer<BrowserSleeper>;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    Unknown(String),
}

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Apply one named boolean toggle. Accepts snake_case and camelCase names.
///
/// # Errors
/// Returns an error for names that are not settings.
pub fn apply_setting(settings: &mut Settings, name: &str, value: bool) -> Result<(), SettingsError> {
    match name {
        "sdxl" => settings.sdxl = value,
        "inpainting_only" | "inpaintingOnly" => settings.inpainting_only = value,
        "detailed_download" | "detailedDownload" => settings.detailed_download = value,
        other => return Err(SettingsError::Unknown(other.to_string())),
    }
    Ok(())
}

/// Result of `startQueue()` as seen from JS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    pub already_running: bool,
    pub completed: usize,
    pub failed: usize,
    pub detached: usize,
    pub skipped: usize,
}

impl From<StartOutcome> for StartReport {
    fn from(outcome: StartOutcome) -> Self {
        match outcome {
            StartOutcome::AlreadyRunning => Self {
                already_running: true,
                ..Self::default()
            },
            StartOutcome::Finished(summary) => Self {
                already_running: false,
                completed: summary.completed,
                failed: summary.failed,
                detached: summary.detached,
                skipped: summary.skipped,
            },
        }
    }
}

#[wasm_bindgen]
pub struct LsdaiController {
    inner: WebController,
    transfer: Rc<WebTransfer>,
    catalog: Rc<CatalogSlot<WebCatalogSource>>,
    search_timer: Rc<SearchTimer>,
    test_bridge: RefCell<Option<TestBridge>>,
}

impl LsdaiController {
    /// Build around an explicit configuration.
    #[must_use]
    pub fn with_config(config: ControllerConfig) -> Self {
        let prefs = LocalStoragePreferences::new(config.storage_prefix.clone());
        let transfer =
            SimulatedTransfer::new(BrowserSleeper, config.simulation.clone(), dom::now_ms());
        Self {
            inner: Controller::new(config, prefs, JsRenderBridge::new()),
            transfer: Rc::new(transfer),
            catalog: Rc::new(CatalogSlot::new()),
            search_timer: Rc::new(SearchTimer::new()),
            test_bridge: RefCell::new(None),
        }
    }

    #[must_use]
    pub const fn controller(&self) -> &WebController {
        &self.inner
    }
}

#[wasm_bindgen]
impl LsdaiController {
    /// Create a controller from a JSON config, or from the bundled one.
    ///
    /// # Errors
    /// Returns an error if `config_json` is not a valid configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<LsdaiController, JsValue> {
        let config = match config_json {
            Some(json) => ControllerConfig::from_json(&json).map_err(js_error)?,
            None => embedded_config(),
        };
        Ok(Self::with_config(config))
    }

    /// Load the catalog from `url`, or the bundled one, and render it.
    /// Resolves to the number of items. Repeat calls for the same URL reuse
    /// the loaded catalog.
    #[wasm_bindgen(js_name = loadCatalog)]
    pub fn load_catalog(&self, url: Option<String>) -> Promise {
        let controller = self.inner.clone();
        let slot = Rc::clone(&self.catalog);
        future_to_promise(async move {
            let catalog = slot
                .load(url, WebCatalogSource::for_url)
                .await
                .map_err(js_error)?;
            let items = catalog.len();
            controller.attach_catalog(catalog);
            Ok(JsValue::from(count(items)))
        })
    }

    /// Register the snapshot callback and draw once with it.
    #[wasm_bindgen(js_name = onRender)]
    pub fn on_render(&self, callback: Option<Function>) {
        self.inner.bridge().set_render(callback);
        self.inner.refresh();
    }

    #[wasm_bindgen(js_name = onNotice)]
    pub fn on_notice(&self, callback: Option<Function>) {
        self.inner.bridge().set_notice(callback);
    }

    /// # Errors
    /// Returns an error if the snapshot cannot be converted to a JS value.
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.snapshot()).map_err(js_error)
    }

    // Selection

    #[wasm_bindgen(js_name = toggleSelected)]
    pub fn toggle_selected(&self, id: &str) -> bool {
        self.inner.toggle_selected(id)
    }

    #[wasm_bindgen(js_name = selectVisible)]
    pub fn select_visible(&self) -> u32 {
        count(self.inner.select_visible())
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&self) {
        self.inner.clear_selection();
    }

    #[wasm_bindgen(js_name = toggleFavorite)]
    pub fn toggle_favorite(&self, id: &str) -> bool {
        self.inner.toggle_favorite(id)
    }

    #[wasm_bindgen(js_name = selectedIds)]
    pub fn selected_ids(&self) -> Vec<String> {
        self.inner.selected_ids()
    }

    #[wasm_bindgen(js_name = selectedTotalGib)]
    pub fn selected_total_gib(&self) -> f64 {
        self.inner.selected_total_gib()
    }

    // Filtering

    /// Record a keystroke; the grid refilters after the quiet period.
    ///
    /// # Errors
    /// Returns an error if the timeout cannot be scheduled.
    pub fn search(&self, text: &str) -> Result<(), JsValue> {
        let ticket = self.inner.search_input(text, dom::now_ms());
        let controller = self.inner.clone();
        self.search_timer
            .schedule(self.inner.config().quiet_period_ms, move || {
                controller.fire_search(ticket);
            })
    }

    #[wasm_bindgen(js_name = setCategory)]
    pub fn set_category(&self, category: &str) {
        self.inner
            .apply_filter(FilterPatch::category(FilterChoice::parse_category(category)));
    }

    #[wasm_bindgen(js_name = setStyle)]
    pub fn set_style(&self, style: &str) {
        self.inner
            .apply_filter(FilterPatch::style(FilterChoice::parse_style(style)));
    }

    #[wasm_bindgen(js_name = clearFilters)]
    pub fn clear_filters(&self) {
        self.search_timer.cancel();
        self.inner.clear_filters();
    }

    // Settings

    /// # Errors
    /// Returns an error if the settings cannot be converted to a JS value.
    pub fn settings(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.settings()).map_err(js_error)
    }

    /// # Errors
    /// Returns an error for unknown setting names.
    #[wasm_bindgen(js_name = setSetting)]
    pub fn set_setting(&self, name: &str, value: bool) -> Result<(), JsValue> {
        let mut settings = self.inner.settings();
        apply_setting(&mut settings, name, value).map_err(js_error)?;
        self.inner.update_settings(|current| *current = settings);
        Ok(())
    }

    // Queue

    #[wasm_bindgen(js_name = addSelectedToQueue)]
    pub fn add_selected_to_queue(&self) -> u32 {
        count(self.inner.add_selected_to_queue())
    }

    /// # Errors
    /// Returns an error if `ids` is not an array of strings.
    pub fn enqueue(&self, ids: JsValue) -> Result<u32, JsValue> {
        let ids: Vec<String> = serde_wasm_bindgen::from_value(ids).map_err(js_error)?;
        Ok(count(self.inner.enqueue(ids.iter().map(String::as_str))))
    }

    #[wasm_bindgen(js_name = clearQueue)]
    pub fn clear_queue(&self) {
        self.inner.clear_queue();
    }

    #[wasm_bindgen(js_name = removeFromQueue)]
    pub fn remove_from_queue(&self, id: &str) -> bool {
        self.inner.remove_from_queue(id)
    }

    /// # Errors
    /// Returns an error if the entry is missing or not downloading.
    #[wasm_bindgen(js_name = pauseEntry)]
    pub fn pause_entry(&self, id: &str) -> Result<(), JsValue> {
        self.inner.pause_entry(id).map_err(js_error)
    }

    /// # Errors
    /// Returns an error if the entry is missing or not paused.
    #[wasm_bindgen(js_name = resumeEntry)]
    pub fn resume_entry(&self, id: &str) -> Result<(), JsValue> {
        self.inner.resume_entry(id).map_err(js_error)
    }

    #[wasm_bindgen(js_name = retryFailed)]
    pub fn retry_failed(&self) -> u32 {
        count(self.inner.retry_failed())
    }

    /// Process queued entries one at a time. A call made while a run is in
    /// progress resolves immediately with `alreadyRunning: true`.
    #[wasm_bindgen(js_name = startQueue)]
    pub fn start_queue(&self) -> Promise {
        let controller = self.inner.clone();
        let transfer = Rc::clone(&self.transfer);
        future_to_promise(async move {
            let outcome = controller.start_queue(transfer.as_ref()).await;
            to_js(&StartReport::from(outcome)).map_err(js_error)
        })
    }

    // Export / import

    /// # Errors
    /// Returns an error if the export cannot be serialized.
    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Result<String, JsValue> {
        self.inner.export_json().map_err(js_error)
    }

    #[wasm_bindgen(js_name = exportFileName)]
    pub fn export_file_name(&self) -> String {
        ExportDocument::file_name(&dom::today_iso())
    }

    /// # Errors
    /// Returns an error for malformed or unsupported documents.
    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&self, json: &str) -> Result<JsValue, JsValue> {
        let summary = self.inner.import_json(json).map_err(js_error)?;
        to_js(&summary).map_err(js_error)
    }

    /// Expose `window.__lsdaiBridge` when the page was opened with `?test=1`
    /// (or when `force` is set). Returns whether the bridge is installed.
    ///
    /// # Errors
    /// Returns an error if the bridge object cannot be attached to `window`.
    #[wasm_bindgen(js_name = installTestBridge)]
    pub fn install_test_bridge(&self, force: Option<bool>) -> Result<bool, JsValue> {
        if self.test_bridge.borrow().is_some() {
            return Ok(true);
        }
        if !force.unwrap_or(false) && !dom::query_has("test=1") {
            return Ok(false);
        }
        let bridge = TestBridge::build(&self.inner, &self.transfer);
        bridge.attach()?;
        *self.test_bridge.borrow_mut() = Some(bridge);
        Ok(true)
    }
}
