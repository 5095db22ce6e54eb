//! AnatomyHero Viewer - interactive 3D anatomy in the browser
//!
//! Wires the scene plugin to an egui control surface, browser storage for
//! annotations and Wikipedia-backed part descriptions.

mod app;
mod browser;
mod describe;
mod storage;
mod ui;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    app::run();
}
