// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Glue with the worker script: panics, logs and errors all end up there.

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use wasm_bindgen::prelude::*;

/// Route panics to `console.error` when built with `console_error_panic_hook`.
/// Calling it several times is harmless.
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[wasm_bindgen(raw_module = "../relief-worker.mjs")]
extern "C" {
    /// Worker side sink, levels are 0 (error) to 4 (trace).
    #[wasm_bindgen(js_name = "appLog")]
    fn app_log(level: u32, content: &str);
}

/// `log` backend posting every record to the worker script.
pub struct WasmLogger;

static LOGGER: WasmLogger = WasmLogger;

impl WasmLogger {
    /// Fails if a logger is already installed, the level is updated anyway.
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_max_level(max_level);
        log::set_logger(&LOGGER)
    }
    pub fn setup(max_level: LevelFilter) {
        log::set_max_level(max_level)
    }
}

impl log::Log for WasmLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            app_log(host_level(record.level()), &record.args().to_string());
        }
    }

    fn flush(&self) {}
}

// `Level` discriminants start at 1 for errors.
fn host_level(level: Level) -> u32 {
    level as u32 - 1
}

/// Same scale as `host_level`, anything above 4 means trace.
pub fn verbosity_filter(verbosity: u32) -> LevelFilter {
    [
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
    ]
    .get(verbosity as usize)
    .copied()
    .unwrap_or(LevelFilter::Trace)
}

/// Log an error with its causes and hand the message back to the worker.
pub fn report_error<E: Into<anyhow::Error>>(error: E) -> JsValue {
    let message = format!("{:#}", error.into());
    log::error!("{}", message);
    JsValue::from_str(&message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_match_the_worker_scale() {
        assert_eq!(host_level(Level::Error), 0);
        assert_eq!(host_level(Level::Trace), 4);
        assert_eq!(verbosity_filter(0), LevelFilter::Error);
        assert_eq!(verbosity_filter(2), LevelFilter::Info);
        assert_eq!(verbosity_filter(9), LevelFilter::Trace);
    }
}
