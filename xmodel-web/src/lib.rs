//! xmodel web - `<x-model>` elements drawn with WebGL2
//!
//! The JS side defines the custom element and forwards its lifecycle
//! callbacks to a [`ModelElement`] created by the page's [`ModelRuntime`].

pub mod dom;
pub mod element;
pub mod loader;
pub mod renderer;

pub use dom::WebElement;
pub use element::{ModelElement, ModelRuntime};
pub use loader::{FetchLoader, JsLoader};
pub use renderer::WebGlRenderer;

use wasm_bindgen::prelude::*;

/// Entry point for the WASM module
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::INFO)
            .build(),
    );
}
