//! Selected and favorited item ids.
use crate::PreferenceStore;
use crate::catalog::{Catalog, ModelCategory};
use crate::constants::FAVORITES_KEY;
use std::collections::{BTreeMap, HashSet};

/// Result of a favorite toggle. The in-memory flip always sticks, even when
/// the write-through to the preference store fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteToggle {
    pub favorited: bool,
    pub persisted: bool,
}

/// Two independent id sets over the catalog keyspace.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: HashSet<String>,
    favorites: HashSet<String>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with favorites restored from storage.
    #[must_use]
    pub fn with_favorites(favorites: impl IntoIterator<Item = String>) -> Self {
        Self {
            selected: HashSet::new(),
            favorites: favorites.into_iter().collect(),
        }
    }

    /// Flip selection membership and return the new state.
    pub fn toggle_selected(&mut self, id: &str) -> bool {
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    /// Add every given id; ids outside the input are left alone.
    pub fn select_all<'a>(&mut self, visible_ids: impl IntoIterator<Item = &'a str>) {
        self.selected
            .extend(visible_ids.into_iter().map(str::to_string));
    }

    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Flip favorite membership and write the whole set through to `prefs`.
    pub fn toggle_favorite<P>(&mut self, id: &str, prefs: &P) -> FavoriteToggle
    where
        P: PreferenceStore + ?Sized,
    {
        let favorited = if self.favorites.remove(id) {
            false
        } else {
            self.favorites.insert(id.to_string());
            true
        };
        let persisted = self.persist_favorites(prefs);
        FavoriteToggle {
            favorited,
            persisted,
        }
    }

    /// Write the favorites array to `prefs`; failures are logged, not raised.
    pub fn persist_favorites<P>(&self, prefs: &P) -> bool
    where
        P: PreferenceStore + ?Sized,
    {
        let payload = serde_json::Value::from(self.favorite_ids());
        let persisted = prefs.set(FAVORITES_KEY, &payload);
        if !persisted {
            log::warn!(
                "favorites not saved; keeping {} in memory only",
                self.favorites.len()
            );
        }
        persisted
    }

    #[must_use]
    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    /// Selected ids, sorted for stable output.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<String> {
        sorted(&self.selected)
    }

    /// Favorite ids, sorted for stable output.
    #[must_use]
    pub fn favorite_ids(&self) -> Vec<String> {
        sorted(&self.favorites)
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn favorite_count(&self) -> usize {
        self.favorites.len()
    }

    /// Sum of normalized sizes of the selected items, in gibibytes.
    #[must_use]
    pub fn selected_total_gib(&self, catalog: &Catalog) -> f64 {
        self.selected
            .iter()
            .filter_map(|id| catalog.get(id))
            .map(|item| item.size.gib())
            .sum()
    }

    /// Selected counts per category, omitting empty categories.
    #[must_use]
    pub fn selected_by_category(&self, catalog: &Catalog) -> BTreeMap<ModelCategory, usize> {
        let mut breakdown = BTreeMap::new();
        for item in self.selected.iter().filter_map(|id| catalog.get(id)) {
            *breakdown.entry(item.category).or_insert(0) += 1;
        }
        breakdown
    }

    /// Drop ids that are not in `catalog`. Returns how many were removed.
    pub fn prune(&mut self, catalog: &Catalog) -> usize {
        let before = self.selected.len() + self.favorites.len();
        self.selected.retain(|id| catalog.contains(id));
        self.favorites.retain(|id| catalog.contains(id));
        let removed = before - self.selected.len() - self.favorites.len();
        if removed > 0 {
            log::info!("pruned {removed} stale ids after catalog change");
        }
        removed
    }

    pub(crate) fn replace(&mut self, selected: Vec<String>, favorites: Vec<String>) {
        self.selected = selected.into_iter().collect();
        self.favorites = favorites.into_iter().collect();
    }
}

fn sorted(set: &HashSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = set.iter().cloned().collect();
    ids.sort_unstable();
    ids
}
