//! Browser timers: the queue's tick sleeper and the search debounce timeout.
use crate::dom;
use lsdai_core::Sleeper;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

/// [`Sleeper`] over `setTimeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSleeper;

impl Sleeper for BrowserSleeper {
    #[allow(clippy::future_not_send)]
    async fn sleep_ms(&self, ms: u32) {
        let delay = i32::try_from(ms).unwrap_or(i32::MAX);
        if let Err(err) = dom::sleep_ms(delay).await {
            log::warn!("timer failed: {}", dom::js_error_message(&err));
        }
    }
}

/// A scheduled timeout and the closure JS will call.
struct Pending {
    handle: i32,
    callback: Closure<dyn FnMut()>,
}

/// At most one outstanding timeout; scheduling clears the previous one.
///
/// The timer owns its closures. A cancelled closure is dropped with the
/// pending slot. A fired closure moves to `spent` and is dropped on the next
/// firing, never while it is still running.
#[derive(Default)]
pub struct SearchTimer {
    pending: RefCell<Option<Pending>>,
    spent: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl SearchTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` after `delay_ms`, cancelling any earlier timeout.
    ///
    /// # Errors
    /// Returns an error if no window is available or `setTimeout` throws.
    pub fn schedule(
        self: &Rc<Self>,
        delay_ms: u64,
        callback: impl FnOnce() + 'static,
    ) -> Result<(), JsValue> {
        self.cancel();
        let window = dom::window().ok_or_else(|| JsValue::from_str("`window` unavailable"))?;
        let timer = Rc::downgrade(self);
        let callback: Closure<dyn FnMut()> = Closure::once(move || {
            if let Some(timer) = timer.upgrade() {
                timer.disarm();
            }
            callback();
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        let handle = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            delay,
        )?;
        *self.pending.borrow_mut() = Some(Pending { handle, callback });
        Ok(())
    }

    pub fn cancel(&self) {
        let Some(pending) = self.pending.borrow_mut().take() else {
            return;
        };
        if let Some(window) = dom::window() {
            window.clear_timeout_with_handle(pending.handle);
        }
    }

    /// Mark the pending timeout as fired, keeping its closure alive until
    /// the next one fires.
    fn disarm(&self) {
        let fired = self.pending.borrow_mut().take();
        let previous = self.spent.replace(fired.map(|pending| pending.callback));
        drop(previous);
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Closures still owned by the timer.
    #[must_use]
    pub fn held_closures(&self) -> usize {
        usize::from(self.pending.borrow().is_some()) + usize::from(self.spent.borrow().is_some())
    }
}

impl std::fmt::Debug for SearchTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTimer")
            .field("armed", &self.is_armed())
            .field("held_closures", &self.held_closures())
            .finish()
    }
}
