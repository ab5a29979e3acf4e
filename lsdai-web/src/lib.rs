#![forbid(unsafe_code)]
//! Browser bindings for the LSDAI model browser.
//!
//! Wires [`lsdai_core::Controller`] to `localStorage`, browser timers and a
//! JavaScript render callback, and exports it to JS as `LsdaiController`.
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod catalog_source;
pub mod controller;
pub mod dom;
pub mod logging;
pub mod storage;
pub mod test_bridge;
pub mod timer;

pub use bridge::JsRenderBridge;
pub use catalog_source::{
    CatalogSlot, EmbeddedCatalog, RemoteCatalog, WebCatalogError, WebCatalogSource,
    embedded_config,
};
pub use controller::{LsdaiController, StartReport, WebController};
pub use storage::{LocalStoragePreferences, WebStorageError};
pub use timer::{BrowserSleeper, SearchTimer};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    let search = dom::query_string().unwrap_or_default();
    logging::init(logging::level_from_query(&search));
}

/// Create a controller, load the bundled (or `catalog_url`) catalog, and
/// install the test bridge when requested by the page URL.
///
/// # Errors
/// The returned promise rejects if the config or catalog cannot be loaded.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn boot(config_json: Option<String>, catalog_url: Option<String>) -> js_sys::Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        let controller = LsdaiController::new(config_json)?;
        wasm_bindgen_futures::JsFuture::from(controller.load_catalog(catalog_url)).await?;
        controller.install_test_bridge(None)?;
        Ok(JsValue::from(controller))
    })
}
