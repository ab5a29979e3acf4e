//! `log` facade backed by the browser console.
use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from(format_record(record));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

fn format_record(record: &Record<'_>) -> String {
    format!(
        "[{} {}] {}",
        record.level(),
        record.target(),
        record.args()
    )
}

/// Level requested through `?log=<level>`, defaulting to `info`.
#[must_use]
pub fn level_from_query(search: &str) -> LevelFilter {
    crate::dom::query_value(search, "log")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the console logger. Later calls only adjust the level.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("console logger already installed");
    }
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_selects_level() {
        assert_eq!(level_from_query("?log=debug"), LevelFilter::Debug);
        assert_eq!(level_from_query("?test=1&log=warn"), LevelFilter::Warn);
        assert_eq!(level_from_query("?log=loud"), LevelFilter::Info);
        assert_eq!(level_from_query(""), LevelFilter::Info);
    }

    #[test]
    fn records_carry_level_and_target() {
        let line = format_record(
            &Record::builder()
                .level(Level::Warn)
                .target("lsdai_core::queue")
                .args(format_args!("slow"))
                .build(),
        );
        assert_eq!(line, "[WARN lsdai_core::queue] slow");
    }
}
