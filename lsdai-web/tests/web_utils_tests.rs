use futures::executor::block_on;
use lsdai_core::{
    CatalogItem, CatalogSource, CatalogStore, Controller, MemoryPreferences, PreferenceStore,
};
use lsdai_web::{
    CatalogSlot, EmbeddedCatalog, JsRenderBridge, LocalStoragePreferences, WebCatalogError,
    embedded_config,
};
use std::cell::Cell;
use std::rc::Rc;

struct CountingSource {
    fetches: Rc<Cell<usize>>,
}

impl CatalogSource for CountingSource {
    type Error = WebCatalogError;

    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error> {
        self.fetches.set(self.fetches.get() + 1);
        EmbeddedCatalog.fetch_catalog().await
    }
}

#[test]
fn bundled_assets_drive_a_headless_controller() {
    let config = embedded_config();
    assert_eq!(config.storage_prefix, "lsdai.");

    let mut store = CatalogStore::new(EmbeddedCatalog);
    let catalog = block_on(store.load()).unwrap();
    let bridge = JsRenderBridge::new();
    let controller = Controller::new(config, MemoryPreferences::default(), bridge.clone());
    controller.attach_catalog(catalog);
    assert!(controller.toggle_selected("juggernaut-xl"));
    assert!(controller.toggle_favorite("sdxl-vae"));

    // No callback registered: frames are still counted, nothing reaches JS.
    assert_eq!(bridge.frames(), 3);
    assert_eq!(
        controller.prefs().get("favorites"),
        Some(serde_json::json!(["sdxl-vae"]))
    );
}

#[test]
fn catalog_store_loads_once() {
    let mut store = CatalogStore::new(EmbeddedCatalog);
    let first = block_on(store.load()).unwrap();
    let second = block_on(store.load()).unwrap();
    assert!(std::rc::Rc::ptr_eq(&first, &second));
    assert!(store.is_loaded());
}

#[test]
fn local_storage_keys_follow_config_prefix() {
    let prefs = LocalStoragePreferences::new(embedded_config().storage_prefix);
    assert_eq!(prefs.storage_key("settings"), "lsdai.settings");
}

#[test]
fn catalog_slot_reuses_the_loaded_catalog() {
    let fetches = Rc::new(Cell::new(0));
    let slot = CatalogSlot::new();
    let source = |_: Option<&str>| CountingSource {
        fetches: Rc::clone(&fetches),
    };

    assert!(slot.cached().is_none());
    let first = block_on(slot.load(None, source)).unwrap();
    let second = block_on(slot.load(None, source)).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(fetches.get(), 1);

    let remote = block_on(slot.load(Some("/data/catalog.json".into()), source)).unwrap();
    assert_eq!(fetches.get(), 2);
    assert!(!Rc::ptr_eq(&first, &remote));
    block_on(slot.load(Some("/data/catalog.json".into()), source)).unwrap();
    assert_eq!(fetches.get(), 2);
    assert!(slot.cached().is_some_and(|cached| Rc::ptr_eq(&cached, &remote)));
}
