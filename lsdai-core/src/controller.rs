//! Thin orchestrator tying the stores together and feeding the render bridge.
//!
//! Each store stays independently usable; the controller only sequences them
//! and pushes a fresh [`ViewSnapshot`] after every change. Handles are cheap
//! to clone and share state, which lets a UI callback clear the queue while
//! another clone is awaiting [`Controller::start_queue`]. No `RefCell` borrow
//! is held across an `.await` or while the bridge runs.
use crate::catalog::Catalog;
use crate::config::ControllerConfig;
use crate::constants::{FAVORITES_KEY, SETTINGS_KEY};
use crate::debounce::{DebounceTicket, Debouncer};
use crate::export::{ExportDocument, ExportError};
use crate::filter::{FilterEngine, FilterPatch};
use crate::prefs::{Settings, load_favorites};
use crate::queue::{QueueError, QueueEvent, QueueManager, StartOutcome};
use crate::selection::SelectionTracker;
use crate::size::format_gib;
use crate::snapshot::{ItemView, Notice, QueueSnapshot, SelectionTotals, ViewSnapshot};
use crate::transfer::Transfer;
use crate::{PreferenceStore, RenderBridge};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

struct Shared<P, R> {
    config: ControllerConfig,
    catalog: RefCell<Rc<Catalog>>,
    selection: RefCell<SelectionTracker>,
    filter: RefCell<FilterEngine>,
    search: RefCell<Debouncer<String>>,
    settings: RefCell<Settings>,
    queue: QueueManager,
    prefs: P,
    bridge: R,
}

/// What an import changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub favorites: usize,
    pub selected: usize,
    pub queued: usize,
}

pub struct Controller<P, R> {
    shared: Rc<Shared<P, R>>,
}

impl<P, R> Clone for Controller<P, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<P, R> Controller<P, R>
where
    P: PreferenceStore,
    R: RenderBridge,
{
    /// Build with an empty catalog, restoring favorites and settings from `prefs`.
    pub fn new(config: ControllerConfig, prefs: P, bridge: R) -> Self {
        let favorites = load_favorites(&prefs);
        let settings = Settings::load(&prefs);
        let quiet_period = config.quiet_period_ms;
        Self {
            shared: Rc::new(Shared {
                config,
                catalog: RefCell::new(Rc::new(Catalog::default())),
                selection: RefCell::new(SelectionTracker::with_favorites(favorites)),
                filter: RefCell::new(FilterEngine::new()),
                search: RefCell::new(Debouncer::new(quiet_period)),
                settings: RefCell::new(settings),
                queue: QueueManager::new(),
                prefs,
                bridge,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn prefs(&self) -> &P {
        &self.shared.prefs
    }

    #[must_use]
    pub fn bridge(&self) -> &R {
        &self.shared.bridge
    }

    #[must_use]
    pub fn catalog(&self) -> Rc<Catalog> {
        Rc::clone(&self.shared.catalog.borrow())
    }

    /// Queue handle sharing this controller's entries.
    #[must_use]
    pub fn queue(&self) -> QueueManager {
        self.shared.queue.clone()
    }

    /// Install a loaded catalog, dropping ids it no longer knows.
    pub fn attach_catalog(&self, catalog: Rc<Catalog>) {
        let pruned = self.shared.selection.borrow_mut().prune(&catalog);
        *self.shared.catalog.borrow_mut() = catalog;
        if pruned > 0 {
            self.persist_favorites();
        }
        self.refresh();
    }

    // Selection ----------------------------------------------------------

    /// Flip selection of `id`. Unknown ids are ignored with a warning.
    pub fn toggle_selected(&self, id: &str) -> bool {
        if !self.knows(id) {
            return false;
        }
        let selected = self.shared.selection.borrow_mut().toggle_selected(id);
        self.refresh();
        selected
    }

    /// Select every currently visible item. Returns the visible count.
    pub fn select_visible(&self) -> usize {
        let catalog = self.catalog();
        let visible: Vec<&str> = {
            let filter = self.shared.filter.borrow();
            filter.visible(catalog.items()).map(|item| item.id.as_str()).collect()
        };
        self.shared
            .selection
            .borrow_mut()
            .select_all(visible.iter().copied());
        self.refresh();
        visible.len()
    }

    pub fn clear_selection(&self) {
        self.shared.selection.borrow_mut().clear_selected();
        self.refresh();
    }

    /// Flip favorite status of `id`, writing favorites through to storage.
    pub fn toggle_favorite(&self, id: &str) -> bool {
        if !self.knows(id) {
            return false;
        }
        let toggled = self
            .shared
            .selection
            .borrow_mut()
            .toggle_favorite(id, &self.shared.prefs);
        if !toggled.persisted {
            self.shared.bridge.notify(&Notice::PreferencesNotSaved {
                key: FAVORITES_KEY.to_string(),
            });
        }
        self.refresh();
        toggled.favorited
    }

    #[must_use]
    pub fn selected_ids(&self) -> Vec<String> {
        self.shared.selection.borrow().selected_ids()
    }

    #[must_use]
    pub fn selected_total_gib(&self) -> f64 {
        self.shared
            .selection
            .borrow()
            .selected_total_gib(&self.catalog())
    }

    // Filtering ----------------------------------------------------------

    /// Record a search keystroke. Filtering waits for the quiet period.
    pub fn search_input(&self, text: &str, now_ms: u64) -> DebounceTicket {
        self.shared
            .search
            .borrow_mut()
            .schedule(text.to_string(), now_ms)
    }

    /// Apply the pending search if its quiet period has elapsed by `now_ms`.
    pub fn poll_search(&self, now_ms: u64) -> bool {
        let due = self.shared.search.borrow_mut().due(now_ms);
        due.is_some_and(|text| {
            self.apply_filter(FilterPatch::search(text));
            true
        })
    }

    /// Apply the pending search if `ticket` is still the latest keystroke.
    pub fn fire_search(&self, ticket: DebounceTicket) -> bool {
        let fired = self.shared.search.borrow_mut().fire(ticket);
        fired.is_some_and(|text| {
            self.apply_filter(FilterPatch::search(text));
            true
        })
    }

    #[must_use]
    pub fn search_pending(&self) -> bool {
        self.shared.search.borrow().is_pending()
    }

    /// Apply a filter change immediately.
    pub fn apply_filter(&self, patch: FilterPatch) {
        self.shared.filter.borrow_mut().set_criteria(patch);
        self.refresh();
    }

    /// Reset every criterion and drop any pending search.
    pub fn clear_filters(&self) {
        self.shared.search.borrow_mut().cancel();
        self.shared.filter.borrow_mut().clear();
        self.refresh();
    }

    // Settings -----------------------------------------------------------

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.shared.settings.borrow().clone()
    }

    pub fn update_settings(&self, change: impl FnOnce(&mut Settings)) {
        let saved = {
            let mut settings = self.shared.settings.borrow_mut();
            change(&mut settings);
            settings.save(&self.shared.prefs)
        };
        if !saved {
            self.shared.bridge.notify(&Notice::PreferencesNotSaved {
                key: SETTINGS_KEY.to_string(),
            });
        }
        self.refresh();
    }

    // Queue --------------------------------------------------------------

    /// Queue every selected item. Returns how many entries were added.
    pub fn add_selected_to_queue(&self) -> usize {
        let ids = self.selected_ids();
        self.enqueue(ids.iter().map(String::as_str))
    }

    pub fn enqueue<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        let added = self.shared.queue.enqueue(ids, &self.catalog());
        self.refresh();
        added
    }

    pub fn clear_queue(&self) {
        self.shared.queue.clear();
        self.refresh();
    }

    pub fn remove_from_queue(&self, id: &str) -> bool {
        let removed = self.shared.queue.remove(id);
        self.refresh();
        removed
    }

    /// # Errors
    ///
    /// Returns an error if the entry is missing or not downloading.
    pub fn pause_entry(&self, id: &str) -> Result<(), QueueError> {
        self.shared.queue.pause(id)?;
        self.refresh();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the entry is missing or not paused.
    pub fn resume_entry(&self, id: &str) -> Result<(), QueueError> {
        self.shared.queue.resume(id)?;
        self.refresh();
        Ok(())
    }

    pub fn retry_failed(&self) -> usize {
        let reset = self.shared.queue.retry_failed();
        self.refresh();
        reset
    }

    /// Run the queue with `transfer`, refreshing the bridge on every step.
    pub async fn start_queue<T: Transfer>(&self, transfer: &T) -> StartOutcome {
        let outcome = self
            .shared
            .queue
            .start(transfer, |event| {
                if let QueueEvent::Failed(entry) = event {
                    self.shared.bridge.notify(&Notice::TransferFailed {
                        item_id: entry.item_id.clone(),
                        name: entry.display_name.clone(),
                        reason: entry.error.clone().unwrap_or_default(),
                    });
                }
                self.refresh();
            })
            .await;
        if let StartOutcome::Finished(summary) = outcome {
            self.shared.bridge.notify(&Notice::QueueFinished {
                completed: summary.completed,
                failed: summary.failed,
            });
            self.refresh();
        }
        outcome
    }

    // Snapshots ----------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let catalog = self.catalog();
        let selection = self.shared.selection.borrow();
        let filter = self.shared.filter.borrow();

        let items: Vec<ItemView> = filter
            .visible(catalog.items())
            .map(|item| {
                ItemView::from_item(
                    item,
                    selection.is_selected(&item.id),
                    selection.is_favorite(&item.id),
                )
            })
            .collect();
        let selected_gib = selection.selected_total_gib(&catalog);
        let totals = SelectionTotals {
            total: catalog.len(),
            visible: items.len(),
            selected: selection.selected_count(),
            favorites: selection.favorite_count(),
            selected_gib,
            selected_label: format_gib(selected_gib),
            by_category: selection.selected_by_category(&catalog),
        };
        let queue = &self.shared.queue;
        ViewSnapshot {
            items,
            summary: totals.summary(),
            totals,
            queue: QueueSnapshot {
                entries: queue.entries(),
                total_gib: queue.total_gib(),
                total_label: queue.total_label(),
                counts: queue.counts(),
                processing: queue.is_processing(),
            },
            criteria: filter.criteria().clone(),
            settings: self.shared.settings.borrow().clone(),
        }
    }

    /// Push the current snapshot to the bridge.
    pub fn refresh(&self) {
        let snapshot = self.snapshot();
        self.shared.bridge.render(&snapshot);
    }

    // Export / import ----------------------------------------------------

    #[must_use]
    pub fn export(&self) -> ExportDocument {
        let selection = self.shared.selection.borrow();
        ExportDocument {
            settings: self.settings(),
            favorites: selection.favorite_ids(),
            selected: selection.selected_ids(),
            queue: self.shared.queue.entries(),
            ..ExportDocument::default()
        }
    }

    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized.
    pub fn export_json(&self) -> Result<String, ExportError> {
        self.export().to_json()
    }

    /// Restore settings, favorites and selection from an export, and queue
    /// its entries again. Ids missing from the current catalog are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed or unsupported documents; nothing is
    /// changed in that case.
    pub fn import_json(&self, json: &str) -> Result<ImportSummary, ExportError> {
        let doc = ExportDocument::from_json(json)?;
        let catalog = self.catalog();
        let keep = |ids: Vec<String>| -> Vec<String> {
            ids.into_iter().filter(|id| catalog.contains(id)).collect()
        };
        let favorites = keep(doc.favorites);
        let selected = keep(doc.selected);
        let summary_counts = (favorites.len(), selected.len());
        self.shared
            .selection
            .borrow_mut()
            .replace(selected, favorites);
        self.persist_favorites();

        *self.shared.settings.borrow_mut() = doc.settings;
        if !self.shared.settings.borrow().save(&self.shared.prefs) {
            self.shared.bridge.notify(&Notice::PreferencesNotSaved {
                key: SETTINGS_KEY.to_string(),
            });
        }

        let queued = self
            .shared
            .queue
            .enqueue(doc.queue.iter().map(|entry| entry.item_id.as_str()), &catalog);
        self.refresh();
        Ok(ImportSummary {
            favorites: summary_counts.0,
            selected: summary_counts.1,
            queued,
        })
    }

    fn persist_favorites(&self) {
        let persisted = self
            .shared
            .selection
            .borrow()
            .persist_favorites(&self.shared.prefs);
        if !persisted {
            self.shared.bridge.notify(&Notice::PreferencesNotSaved {
                key: FAVORITES_KEY.to_string(),
            });
        }
    }

    fn knows(&self, id: &str) -> bool {
        let known = self.shared.catalog.borrow().contains(id);
        if !known {
            log::warn!("ignoring unknown catalog id {id}");
        }
        known
    }
}
