//! Render-ready views of controller state.
use crate::catalog::{CatalogItem, ModelCategory, TagList};
use crate::filter::FilterCriteria;
use crate::prefs::Settings;
use crate::queue::{QueueCounts, QueueEntry};
use serde::Serialize;
use std::collections::BTreeMap;

/// One visible grid card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub category: ModelCategory,
    pub style: String,
    pub size_label: String,
    pub rating: f64,
    pub downloads: u64,
    pub tags: TagList,
    pub selected: bool,
    pub favorited: bool,
}

impl ItemView {
    #[must_use]
    pub fn from_item(item: &CatalogItem, selected: bool, favorited: bool) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            category: item.category,
            style: item.style.clone(),
            size_label: item.size.to_string(),
            rating: item.rating,
            downloads: item.downloads,
            tags: item.tags.clone(),
            selected,
            favorited,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionTotals {
    pub total: usize,
    pub visible: usize,
    pub selected: usize,
    pub favorites: usize,
    pub selected_gib: f64,
    pub selected_label: String,
    pub by_category: BTreeMap<ModelCategory, usize>,
}

impl SelectionTotals {
    /// Counter line shown above the grid.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.selected == 0 {
            return String::from("No models selected");
        }
        let breakdown = self
            .by_category
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(category, count)| format!("{category}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} models selected ({breakdown}) - {}",
            self.selected, self.selected_label
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntry>,
    pub total_gib: f64,
    pub total_label: String,
    pub counts: QueueCounts,
    pub processing: bool,
}

/// Everything a render surface needs to redraw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub items: Vec<ItemView>,
    pub totals: SelectionTotals,
    pub summary: String,
    pub queue: QueueSnapshot,
    pub criteria: FilterCriteria,
    pub settings: Settings,
}

/// User-visible notices pushed alongside snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    TransferFailed {
        item_id: String,
        name: String,
        reason: String,
    },
    PreferencesNotSaved {
        key: String,
    },
    QueueFinished {
        completed: usize,
        failed: usize,
    },
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::TransferFailed { name, reason, .. } => {
                format!("Download of {name} failed: {reason}")
            }
            Self::PreferencesNotSaved { key } => {
                format!("Could not save {key}; changes are kept for this session only")
            }
            Self::QueueFinished { completed, failed } => {
                format!("Queue finished: {completed} completed, {failed} failed")
            }
        }
    }
}
