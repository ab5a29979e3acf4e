//! Render bridge that forwards snapshots to JavaScript callbacks.
use crate::dom;
use js_sys::Function;
use lsdai_core::{Notice, RenderBridge, ViewSnapshot};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsValue;

/// Serialize with plain JS objects for maps, matching `JSON.parse` output.
///
/// # Errors
/// Returns an error if the value cannot be represented in JS.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

#[derive(Default)]
struct Callbacks {
    render: RefCell<Option<Function>>,
    notice: RefCell<Option<Function>>,
    frames: Cell<u64>,
}

/// Clones share the registered callbacks.
#[derive(Clone, Default)]
pub struct JsRenderBridge {
    callbacks: Rc<Callbacks>,
}

impl JsRenderBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_render(&self, callback: Option<Function>) {
        *self.callbacks.render.borrow_mut() = callback;
    }

    pub fn set_notice(&self, callback: Option<Function>) {
        *self.callbacks.notice.borrow_mut() = callback;
    }

    /// Snapshots pushed since creation, whether or not a callback was set.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.callbacks.frames.get()
    }

    fn emit<T: Serialize>(slot: &RefCell<Option<Function>>, payload: &T, what: &str) {
        // Clone out so the callback may re-register itself.
        let Some(callback) = slot.borrow().clone() else {
            return;
        };
        let value = match to_js(payload) {
            Ok(value) => value,
            Err(err) => {
                log::error!("could not serialize {what}: {err}");
                return;
            }
        };
        if let Err(err) = callback.call1(&JsValue::NULL, &value) {
            dom::console_error(&format!(
                "{what} callback threw: {}",
                dom::js_error_message(&err)
            ));
        }
    }
}

impl RenderBridge for JsRenderBridge {
    fn render(&self, snapshot: &ViewSnapshot) {
        self.callbacks.frames.set(self.callbacks.frames.get() + 1);
        Self::emit(&self.callbacks.render, snapshot, "render");
    }

    fn notify(&self, notice: &Notice) {
        log::info!("{}", notice.message());
        #[derive(Serialize)]
        struct NoticePayload<'a> {
            #[serde(flatten)]
            notice: &'a Notice,
            message: String,
        }
        Self::emit(
            &self.callbacks.notice,
            &NoticePayload {
                notice,
                message: notice.message(),
            },
            "notice",
        );
    }
}
