//! Visibility of catalog items against text, category and style criteria.
use crate::catalog::{CatalogItem, ModelCategory};
use serde::{Deserialize, Serialize};

/// Either every value passes, or only the named one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterChoice<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> FilterChoice<T> {
    #[must_use]
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == value,
        }
    }
}

impl FilterChoice<ModelCategory> {
    /// `"all"` (or an empty string) maps to [`FilterChoice::All`]; unknown
    /// category names fall back to `All` with a warning.
    #[must_use]
    pub fn parse_category(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Self::All;
        }
        trimmed.parse().map_or_else(
            |err| {
                log::warn!("ignoring category filter: {err}");
                Self::All
            },
            Self::Only,
        )
    }
}

impl FilterChoice<String> {
    #[must_use]
    pub fn parse_style(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(trimmed.to_ascii_lowercase())
        }
    }
}

/// Current filter state. Always complete; defaults admit everything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Stored lower-cased.
    pub search_text: String,
    pub category: FilterChoice<ModelCategory>,
    pub style: FilterChoice<String>,
}

impl FilterCriteria {
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterPatch {
    pub search_text: Option<String>,
    pub category: Option<FilterChoice<ModelCategory>>,
    pub style: Option<FilterChoice<String>>,
}

impl FilterPatch {
    #[must_use]
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search_text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn category(choice: FilterChoice<ModelCategory>) -> Self {
        Self {
            category: Some(choice),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn style(choice: FilterChoice<String>) -> Self {
        Self {
            style: Some(choice),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    criteria: FilterCriteria,
}

impl FilterEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Merge `patch` into the current criteria.
    pub fn set_criteria(&mut self, patch: FilterPatch) {
        if let Some(text) = patch.search_text {
            self.criteria.search_text = text.to_lowercase();
        }
        if let Some(category) = patch.category {
            self.criteria.category = category;
        }
        if let Some(style) = patch.style {
            self.criteria.style = match style {
                FilterChoice::Only(name) => FilterChoice::parse_style(&name),
                FilterChoice::All => FilterChoice::All,
            };
        }
    }

    pub fn clear(&mut self) {
        self.criteria = FilterCriteria::default();
    }

    #[must_use]
    pub fn matches(&self, item: &CatalogItem) -> bool {
        let FilterCriteria {
            search_text,
            category,
            style,
        } = &self.criteria;
        (search_text.is_empty() || item.name.to_lowercase().contains(search_text.as_str()))
            && category.admits(&item.category)
            && style.admits(&item.style.to_ascii_lowercase())
    }

    /// The returned iterator owns a copy of the criteria, so it does not keep
    /// the engine borrowed.
    pub fn visible<'a>(
        &self,
        items: &'a [CatalogItem],
    ) -> impl Iterator<Item = &'a CatalogItem> + use<'a> {
        let criteria = self.clone();
        items.iter().filter(move |item| criteria.matches(item))
    }

    #[must_use]
    pub fn visible_count(&self, items: &[CatalogItem]) -> usize {
        self.visible(items).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{item, two_items};
    use crate::size::DeclaredSize;

    #[test]
    fn default_criteria_match_everything() {
        let catalog = two_items();
        let engine = FilterEngine::new();
        assert!(engine.criteria().is_default());
        assert!(catalog.items().iter().all(|i| engine.matches(i)));
        assert_eq!(engine.visible_count(catalog.items()), catalog.len());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let catalog = two_items();
        let mut engine = FilterEngine::new();
        engine.set_criteria(FilterPatch {
            search_text: Some("ANIME".into()),
            category: Some(FilterChoice::All),
            style: None,
        });
        assert_eq!(engine.criteria().search_text, "anime");
        assert!(engine.matches(catalog.get("a").unwrap()));
        assert!(!engine.matches(catalog.get("b").unwrap()));
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let mut engine = FilterEngine::new();
        engine.set_criteria(FilterPatch::search("dream"));
        engine.set_criteria(FilterPatch::category(FilterChoice::Only(ModelCategory::Lora)));
        assert_eq!(engine.criteria().search_text, "dream");
        assert_eq!(
            engine.criteria().category,
            FilterChoice::Only(ModelCategory::Lora)
        );
        engine.clear();
        assert!(engine.criteria().is_default());
    }

    #[test]
    fn all_conditions_must_hold() {
        let mut anime_lora = item(
            "l1",
            "Anime Lineart",
            ModelCategory::Lora,
            DeclaredSize::new(144.0, "MB"),
        );
        anime_lora.style = String::from("Anime");
        let mut engine = FilterEngine::new();
        engine.set_criteria(FilterPatch {
            search_text: Some("line".into()),
            category: Some(FilterChoice::Only(ModelCategory::Lora)),
            style: Some(FilterChoice::parse_style("anime")),
        });
        assert!(engine.matches(&anime_lora));
        engine.set_criteria(FilterPatch::category(FilterChoice::Only(
            ModelCategory::Checkpoint,
        )));
        assert!(!engine.matches(&anime_lora));
    }

    #[test]
    fn style_filter_ignores_case() {
        let mut anime = item(
            "s1",
            "Pastel Mix",
            ModelCategory::Checkpoint,
            DeclaredSize::new(2.0, "GB"),
        );
        anime.style = String::from("Anime");
        let mut engine = FilterEngine::new();
        engine.set_criteria(FilterPatch::style(FilterChoice::Only(String::from("Anime"))));
        assert_eq!(
            engine.criteria().style,
            FilterChoice::Only(String::from("anime"))
        );
        assert!(engine.matches(&anime));

        let patch: FilterPatch = serde_json::from_value(serde_json::json!({
            "style": { "only": "ANIME" }
        }))
        .unwrap();
        engine.clear();
        engine.set_criteria(patch);
        assert!(engine.matches(&anime));
    }

    #[test]
    fn visible_items_outlive_the_engine_borrow() {
        let catalog = two_items();
        let engine = std::cell::RefCell::new(FilterEngine::new());
        let ids: Vec<&str> = {
            let filter = engine.borrow();
            filter
                .visible(catalog.items())
                .map(|item| item.id.as_str())
                .collect()
        };
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn parses_choices_from_raw_input() {
        assert_eq!(FilterChoice::parse_category("all"), FilterChoice::All);
        assert_eq!(FilterChoice::parse_category(""), FilterChoice::All);
        assert_eq!(
            FilterChoice::parse_category("LORA"),
            FilterChoice::Only(ModelCategory::Lora)
        );
        assert_eq!(FilterChoice::parse_category("bogus"), FilterChoice::All);
        assert_eq!(
            FilterChoice::parse_style(" Realistic "),
            FilterChoice::Only(String::from("realistic"))
        );
    }
}
