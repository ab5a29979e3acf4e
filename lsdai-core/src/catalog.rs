//! Catalog items and the idempotent catalog store.
use crate::CatalogSource;
use crate::size::DeclaredSize;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

pub type TagList = SmallVec<[String; 4]>;

/// Broad model family used by the category filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Checkpoint,
    Lora,
    Vae,
    #[serde(alias = "control_net")]
    ControlNet,
    Embedding,
    #[serde(other)]
    Other,
}

impl ModelCategory {
    pub const ALL: [Self; 6] = [
        Self::Checkpoint,
        Self::Lora,
        Self::Vae,
        Self::ControlNet,
        Self::Embedding,
        Self::Other,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Checkpoint => "checkpoint",
            Self::Lora => "lora",
            Self::Vae => "vae",
            Self::ControlNet => "controlnet",
            Self::Embedding => "embedding",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelCategory {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.key() == wanted)
            .ok_or(CatalogError::UnknownCategory(wanted))
    }
}

/// A selectable catalog entry. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: ModelCategory,
    /// Sub-category / style tag ("anime", "realistic", ...).
    #[serde(default)]
    pub style: String,
    pub size: DeclaredSize,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub tags: TagList,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog source failed: {0}")]
    Source(String),
    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Bare(Vec<CatalogItem>),
    Wrapped { items: Vec<CatalogItem> },
}

/// Loaded catalog with id lookup. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build from a list, keeping the first item for any repeated id.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let mut catalog = Self::default();
        for item in items {
            if catalog.index.contains_key(&item.id) {
                log::warn!("dropping duplicate catalog id {}", item.id);
                continue;
            }
            catalog.index.insert(item.id.clone(), catalog.items.len());
            catalog.items.push(item);
        }
        catalog
    }

    /// Parse either a bare JSON array or an object with an `items` array.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe catalog items.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let items = match serde_json::from_str::<CatalogDocument>(json)? {
            CatalogDocument::Bare(items) | CatalogDocument::Wrapped { items } => items,
        };
        Ok(Self::from_items(items))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.index.get(id).and_then(|&idx| self.items.get(idx))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Caches the catalog produced by a [`CatalogSource`].
pub struct CatalogStore<S: CatalogSource> {
    source: S,
    cached: Option<Rc<Catalog>>,
}

impl<S: CatalogSource> CatalogStore<S> {
    pub const fn new(source: S) -> Self {
        Self {
            source,
            cached: None,
        }
    }

    /// Fetch once, then hand out the cached catalog on every later call.
    ///
    /// # Errors
    ///
    /// Returns the source error when the first fetch fails; nothing is cached
    /// in that case so a later call retries.
    pub async fn load(&mut self) -> Result<Rc<Catalog>, S::Error> {
        if let Some(cached) = &self.cached {
            return Ok(Rc::clone(cached));
        }
        let items = self.source.fetch_catalog().await?;
        let catalog = Rc::new(Catalog::from_items(items));
        log::info!("catalog loaded with {} items", catalog.len());
        self.cached = Some(Rc::clone(&catalog));
        Ok(catalog)
    }

    #[must_use]
    pub fn cached(&self) -> Option<Rc<Catalog>> {
        self.cached.clone()
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn item(id: &str, name: &str, category: ModelCategory, size: DeclaredSize) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            category,
            style: String::from("general"),
            size,
            url: format!("https://example.invalid/{id}"),
            rating: 4.5,
            downloads: 1000,
            tags: TagList::new(),
        }
    }

    pub fn two_items() -> Catalog {
        Catalog::from_items([
            item(
                "a",
                "Anime Pastel Dream",
                ModelCategory::Checkpoint,
                DeclaredSize::new(2.0, "GB"),
            ),
            item(
                "b",
                "Realistic Vision",
                ModelCategory::Lora,
                DeclaredSize::new(512.0, "MB"),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::convert::Infallible;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl CatalogSource for CountingSource {
        type Error = Infallible;

        async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error> {
            self.calls.set(self.calls.get() + 1);
            Ok(two_items().items().to_vec())
        }
    }

    #[test]
    fn load_is_idempotent() {
        let mut store = CatalogStore::new(CountingSource {
            calls: Cell::new(0),
        });
        assert!(!store.is_loaded());
        let first = block_on(store.load()).unwrap();
        let second = block_on(store.load()).unwrap();
        assert_eq!(store.source.calls.get(), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn duplicate_ids_keep_first_entry() {
        let catalog = Catalog::from_items([
            item("x", "First", ModelCategory::Vae, DeclaredSize::new(1.0, "GB")),
            item("x", "Second", ModelCategory::Vae, DeclaredSize::new(1.0, "GB")),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("x").unwrap().name, "First");
    }

    #[test]
    fn parses_bare_and_wrapped_json() {
        let bare = r#"[{"id":"m1","name":"DreamShaper","category":"checkpoint","size":{"value":2.1,"unit":"GB"}}]"#;
        let wrapped = r#"{"items":[{"id":"l1","name":"Detail Tweaker","category":"lora","style":"utility","size":{"value":144,"unit":"MB"},"tags":["detail"]}]}"#;
        let a = Catalog::from_json(bare).unwrap();
        let b = Catalog::from_json(wrapped).unwrap();
        assert_eq!(a.get("m1").unwrap().category, ModelCategory::Checkpoint);
        assert_eq!(b.get("l1").unwrap().tags.as_slice(), ["detail".to_string()]);
        assert!(Catalog::from_json("{}").is_err());
    }

    #[test]
    fn unknown_category_strings_map_to_other() {
        let json = r#"[{"id":"u","name":"Upscaler","category":"upscaler","size":{"value":64,"unit":"MB"}}]"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.get("u").unwrap().category, ModelCategory::Other);
        assert_eq!("LoRA".parse::<ModelCategory>().unwrap(), ModelCategory::Lora);
        assert!("upscaler".parse::<ModelCategory>().is_err());
    }
}
