//! Catalog and configuration assets for the browser build.
use crate::dom;
use lsdai_core::{Catalog, CatalogError, CatalogItem, CatalogSource, CatalogStore, ControllerConfig};
use std::cell::RefCell;
use std::rc::Rc;

const CATALOG_JSON: &str = include_str!("../static/data/catalog.json");
const CONFIG_JSON: &str = include_str!("../static/data/config.json");

#[derive(Debug, thiserror::Error)]
pub enum WebCatalogError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<wasm_bindgen::JsValue> for WebCatalogError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Self::Network(dom::js_error_message(&value))
    }
}

fn parse_items(json: &str) -> Result<Vec<CatalogItem>, WebCatalogError> {
    Ok(Catalog::from_json(json)?.items().to_vec())
}

/// Catalog compiled into the bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCatalog;

impl CatalogSource for EmbeddedCatalog {
    type Error = WebCatalogError;

    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error> {
        parse_items(CATALOG_JSON)
    }
}

/// Catalog fetched from a URL serving the same JSON shape.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    url: String,
}

impl RemoteCatalog {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl CatalogSource for RemoteCatalog {
    type Error = WebCatalogError;

    #[allow(clippy::future_not_send)]
    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error> {
        let response = dom::fetch_response(&self.url).await?;
        if !response.ok() {
            return Err(WebCatalogError::Status {
                url: self.url.clone(),
                status: response.status(),
            });
        }
        let body = dom::response_text(&response).await?;
        let items = parse_items(&body)?;
        log::info!("fetched {} catalog items from {}", items.len(), self.url);
        Ok(items)
    }
}

/// Either the bundled catalog or one served from a URL.
#[derive(Debug, Clone)]
pub enum WebCatalogSource {
    Embedded(EmbeddedCatalog),
    Remote(RemoteCatalog),
}

impl WebCatalogSource {
    #[must_use]
    pub fn for_url(url: Option<&str>) -> Self {
        url.map_or(Self::Embedded(EmbeddedCatalog), |url| {
            Self::Remote(RemoteCatalog::new(url))
        })
    }
}

impl CatalogSource for WebCatalogSource {
    type Error = WebCatalogError;

    #[allow(clippy::future_not_send)]
    async fn fetch_catalog(&self) -> Result<Vec<CatalogItem>, Self::Error> {
        match self {
            Self::Embedded(source) => source.fetch_catalog().await,
            Self::Remote(source) => source.fetch_catalog().await,
        }
    }
}

/// Holds the catalog store for the most recently requested URL.
///
/// Asking again for the same URL returns the cached catalog; a different URL
/// replaces the store and fetches.
pub struct CatalogSlot<S: CatalogSource> {
    slot: RefCell<Option<(Option<String>, CatalogStore<S>)>>,
}

impl<S: CatalogSource> Default for CatalogSlot<S> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }
}

impl<S: CatalogSource> CatalogSlot<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns the source error when a fetch fails. The store is kept, so a
    /// later call for the same URL retries.
    #[allow(clippy::future_not_send)]
    pub async fn load(
        &self,
        url: Option<String>,
        source: impl FnOnce(Option<&str>) -> S,
    ) -> Result<Rc<Catalog>, S::Error> {
        let current = self.slot.borrow_mut().take();
        let (url, mut store) = match current {
            Some((cached_url, store)) if cached_url == url => (cached_url, store),
            _ => {
                let store = CatalogStore::new(source(url.as_deref()));
                (url, store)
            }
        };
        let loaded = store.load().await;
        *self.slot.borrow_mut() = Some((url, store));
        loaded
    }

    #[must_use]
    pub fn cached(&self) -> Option<Rc<Catalog>> {
        self.slot
            .borrow()
            .as_ref()
            .and_then(|(_, store)| store.cached())
    }
}

/// Controller configuration shipped with the bundle, or defaults if it is unreadable.
#[must_use]
pub fn embedded_config() -> ControllerConfig {
    ControllerConfig::from_json(CONFIG_JSON).unwrap_or_else(|err| {
        log::warn!("bundled config unreadable, using defaults: {err}");
        ControllerConfig::default()
    })
}
