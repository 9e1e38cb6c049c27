//! HamiTour Viewer - Browser panorama tour
//!
//! Opens the spot named in the URL (or the configured home spot), looks its
//! record up over HTTP and hands it to the panorama session.

mod app;
mod config;
mod navigation;
mod spot_loader;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    // `?log=debug` raises the console level for troubleshooting
    let level = config::BrowserOverrides::from_browser()
        .log_level
        .unwrap_or(tracing::Level::WARN);
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );

    app::run();
}
