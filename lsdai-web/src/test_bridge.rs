//! `window.__lsdaiBridge`: hooks for browser automation, installed with `?test=1`.
use crate::bridge::to_js;
use crate::controller::{StartReport, WebController, WebTransfer};
use crate::dom;
use lsdai_core::{FilterChoice, FilterPatch, PreferenceStore};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub const BRIDGE_GLOBAL: &str = "__lsdaiBridge";

/// Keeps the bridge closures alive for as long as the bridge is installed.
pub struct TestBridge {
    state: Closure<dyn FnMut() -> JsValue>,
    select: Closure<dyn FnMut(JsValue) -> JsValue>,
    favorite: Closure<dyn FnMut(JsValue) -> JsValue>,
    search: Closure<dyn FnMut(JsValue)>,
    category: Closure<dyn FnMut(JsValue)>,
    enqueue: Closure<dyn FnMut() -> JsValue>,
    start: Closure<dyn FnMut() -> JsValue>,
    clear: Closure<dyn FnMut()>,
    prefs: Closure<dyn FnMut(JsValue) -> JsValue>,
}

fn string_arg(value: &JsValue) -> String {
    value.as_string().unwrap_or_default()
}

impl TestBridge {
    #[must_use]
    pub fn build(controller: &WebController, transfer: &Rc<WebTransfer>) -> Self {
        let state_ctl = controller.clone();
        let state = Closure::wrap(Box::new(move || {
            to_js(&state_ctl.snapshot()).unwrap_or(JsValue::NULL)
        }) as Box<dyn FnMut() -> JsValue>);

        let select_ctl = controller.clone();
        let select = Closure::wrap(Box::new(move |id: JsValue| {
            JsValue::from_bool(select_ctl.toggle_selected(&string_arg(&id)))
        }) as Box<dyn FnMut(JsValue) -> JsValue>);

        let favorite_ctl = controller.clone();
        let favorite = Closure::wrap(Box::new(move |id: JsValue| {
            JsValue::from_bool(favorite_ctl.toggle_favorite(&string_arg(&id)))
        }) as Box<dyn FnMut(JsValue) -> JsValue>);

        // Applies immediately; automation does not wait out the debounce.
        let search_ctl = controller.clone();
        let search = Closure::wrap(Box::new(move |text: JsValue| {
            search_ctl.apply_filter(FilterPatch::search(string_arg(&text)));
        }) as Box<dyn FnMut(JsValue)>);

        let category_ctl = controller.clone();
        let category = Closure::wrap(Box::new(move |raw: JsValue| {
            let choice = FilterChoice::parse_category(&string_arg(&raw));
            category_ctl.apply_filter(FilterPatch::category(choice));
        }) as Box<dyn FnMut(JsValue)>);

        let enqueue_ctl = controller.clone();
        let enqueue = Closure::wrap(Box::new(move || {
            JsValue::from(u32::try_from(enqueue_ctl.add_selected_to_queue()).unwrap_or(u32::MAX))
        }) as Box<dyn FnMut() -> JsValue>);

        let start_ctl = controller.clone();
        let start_transfer = Rc::clone(transfer);
        let start = Closure::wrap(Box::new(move || {
            let controller = start_ctl.clone();
            let transfer = Rc::clone(&start_transfer);
            future_to_promise(async move {
                let outcome = controller.start_queue(transfer.as_ref()).await;
                to_js(&StartReport::from(outcome)).map_err(|err| JsValue::from_str(&err.to_string()))
            })
            .into()
        }) as Box<dyn FnMut() -> JsValue>);

        let clear_ctl = controller.clone();
        let clear = Closure::wrap(Box::new(move || {
            clear_ctl.clear_queue();
        }) as Box<dyn FnMut()>);

        let prefs_ctl = controller.clone();
        let prefs = Closure::wrap(Box::new(move |key: JsValue| {
            prefs_ctl
                .prefs()
                .get(&string_arg(&key))
                .and_then(|value| to_js(&value).ok())
                .unwrap_or(JsValue::NULL)
        }) as Box<dyn FnMut(JsValue) -> JsValue>);

        Self {
            state,
            select,
            favorite,
            search,
            category,
            enqueue,
            start,
            clear,
            prefs,
        }
    }

    /// Publish the bridge object on `window`.
    ///
    /// # Errors
    /// Returns an error if there is no window or a property cannot be set.
    pub fn attach(&self) -> Result<(), JsValue> {
        let window = dom::window().ok_or_else(|| JsValue::from_str("`window` unavailable"))?;
        let bridge = js_sys::Object::new();
        let entries: [(&str, &JsValue); 9] = [
            ("state", self.state.as_ref()),
            ("select", self.select.as_ref()),
            ("favorite", self.favorite.as_ref()),
            ("search", self.search.as_ref()),
            ("category", self.category.as_ref()),
            ("enqueue", self.enqueue.as_ref()),
            ("start", self.start.as_ref()),
            ("clear", self.clear.as_ref()),
            ("prefs", self.prefs.as_ref()),
        ];
        for (name, function) in entries {
            js_sys::Reflect::set(&bridge, &JsValue::from_str(name), function)?;
        }
        js_sys::Reflect::set(&window, &JsValue::from_str(BRIDGE_GLOBAL), &bridge)?;
        log::info!("test bridge installed as window.{BRIDGE_GLOBAL}");
        Ok(())
    }
}
