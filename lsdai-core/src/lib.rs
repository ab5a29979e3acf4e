//! LSDAI catalog controller
//!
//! Platform-agnostic state behind the notebook model browser: the catalog,
//! selection and favorites, grid filtering, and the sequential download
//! queue. Rendering and storage are supplied by the embedding platform
//! through the traits below.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod controller;
pub mod debounce;
pub mod export;
pub mod filter;
pub mod prefs;
pub mod queue;
pub mod selection;
pub mod size;
pub mod snapshot;
pub mod transfer;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, CatalogItem, CatalogStore, ModelCategory, TagList};
pub use config::ControllerConfig;
pub use controller::{Controller, ImportSummary};
pub use debounce::{DebounceTicket, Debouncer};
pub use export::{ExportDocument, ExportError};
pub use filter::{FilterChoice, FilterCriteria, FilterEngine, FilterPatch};
pub use prefs::{MemoryPreferences, Settings, load_favorites};
pub use queue::{
    QueueCounts, QueueEntry, QueueError, QueueEvent, QueueManager, QueueStatus, RunSummary,
    StartOutcome,
};
pub use selection::{FavoriteToggle, SelectionTracker};
pub use size::{DeclaredSize, format_gib};
pub use snapshot::{ItemView, Notice, QueueSnapshot, SelectionTotals, ViewSnapshot};
pub use transfer::{
    SimulatedTransfer, SimulationConfig, Sleeper, Transfer, TransferError, TransferTask,
};

/// Source of catalog items (static asset, remote JSON, ...).
/// Platform-specific implementations should provide this.
#[allow(async_fn_in_trait)]
pub trait CatalogSource {
    type Error: std::error::Error + 'static;

    /// Fetch the full item list.
    ///
    /// # Errors
    ///
    /// Returns an error if the items cannot be fetched or parsed.
    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error>;
}

/// Opaque key-value store for JSON preference blobs.
///
/// Implementations must never panic on storage failures: report them by
/// returning `None`/`false` and logging.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Returns `false` when the value could not be stored.
    fn set(&self, key: &str, value: &serde_json::Value) -> bool;
}

/// Sink for state snapshots. The controller never reads rendered output back.
pub trait RenderBridge {
    fn render(&self, snapshot: &ViewSnapshot);

    /// Show a user-visible notice. Ignored by default.
    fn notify(&self, notice: &Notice) {
        let _ = notice;
    }
}

/// Headless sink that drops every snapshot.
impl RenderBridge for () {
    fn render(&self, _snapshot: &ViewSnapshot) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Copy, Default)]
    struct FixtureSource;

    impl CatalogSource for FixtureSource {
        type Error = Infallible;

        async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error> {
            Ok(catalog::fixtures::two_items().items().to_vec())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingBridge {
        frames: Rc<RefCell<Vec<ViewSnapshot>>>,
        notices: Rc<RefCell<Vec<Notice>>>,
    }

    impl RenderBridge for RecordingBridge {
        fn render(&self, snapshot: &ViewSnapshot) {
            self.frames.borrow_mut().push(snapshot.clone());
        }

        fn notify(&self, notice: &Notice) {
            self.notices.borrow_mut().push(notice.clone());
        }
    }

    #[test]
    fn engine_wires_store_into_controller() {
        let mut store = CatalogStore::new(FixtureSource);
        let catalog = block_on(store.load()).unwrap();
        let bridge = RecordingBridge::default();
        let controller = Controller::new(
            ControllerConfig::default(),
            MemoryPreferences::default(),
            bridge.clone(),
        );
        controller.attach_catalog(catalog);
        assert!(controller.toggle_selected("a"));
        let last = bridge.frames.borrow().last().cloned().unwrap();
        assert_eq!(last.totals.total, 2);
        assert_eq!(last.totals.selected, 1);
        assert!(last.items.iter().any(|item| item.id == "a" && item.selected));
    }

    #[test]
    fn failed_favorite_write_raises_notice() {
        let bridge = RecordingBridge::default();
        let controller = Controller::new(
            ControllerConfig::default(),
            MemoryPreferences::failing(),
            bridge.clone(),
        );
        controller.attach_catalog(Rc::new(catalog::fixtures::two_items()));
        assert!(controller.toggle_favorite("b"));
        assert_eq!(
            bridge.notices.borrow().as_slice(),
            [Notice::PreferencesNotSaved {
                key: constants::FAVORITES_KEY.to_string()
            }]
        );
        assert_eq!(controller.snapshot().totals.favorites, 1);
    }
}
