/// `<x-model>` bindings
///
/// A [`ModelRuntime`] owns the overlay canvas, the render layer and the
/// loader registry. Custom element classes on the JS side create one
/// [`ModelElement`] per element and forward their lifecycle callbacks to it.
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{ErrorEvent, ErrorEventInit, Event, HtmlElement};
use xmodel_core::{
    ElementEvent, LayerConfig, LoadRequest, LoadResult, ModelRegistry, ModelSlot, RenderLayer, Renderer,
    Viewport,
};

use crate::dom::WebElement;
use crate::loader::{describe, FetchLoader, JsLoader};
use crate::renderer::WebGlRenderer;

struct Runtime {
    layer: RenderLayer<WebElement, WebGlRenderer>,
    registry: ModelRegistry,
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

fn viewport(window: &web_sys::Window) -> Viewport {
    let read = |value: Result<JsValue, JsValue>| {
        value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as f32
    };
    Viewport::new(read(window.inner_width()), read(window.inner_height()))
}

fn request_frame(callback: &FrameCallback) {
    let Ok(window) = window() else {
        return;
    };
    if let Some(closure) = callback.borrow().as_ref() {
        if let Err(e) = window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            warn!(error = %describe(&e), "requestAnimationFrame failed");
        }
    }
}

/// The overlay layer shared by every model element on the page
#[wasm_bindgen]
pub struct ModelRuntime {
    inner: Rc<RefCell<Runtime>>,
    running: Rc<Cell<bool>>,
    frame: FrameCallback,
}

#[wasm_bindgen]
impl ModelRuntime {
    /// Create the overlay canvas, add it to `<body>` and start drawing.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ModelRuntime, JsValue> {
        let window = window()?;
        let body = window
            .document()
            .and_then(|document| document.body())
            .ok_or_else(|| JsValue::from_str("no document body"))?;

        let mut layer = RenderLayer::new(WebGlRenderer::new()?, LayerConfig::default());
        if let Some(canvas) = layer.initialize() {
            body.append_child(&canvas)?;
        }

        let mut registry = ModelRegistry::new();
        FetchLoader.register_all(&mut registry);

        let runtime = Self {
            inner: Rc::new(RefCell::new(Runtime { layer, registry })),
            running: Rc::new(Cell::new(true)),
            frame: Rc::new(RefCell::new(None)),
        };
        runtime.start();
        info!("model runtime started");
        Ok(runtime)
    }

    fn start(&self) {
        let inner = self.inner.clone();
        let running = self.running.clone();
        let frame = self.frame.clone();
        *self.frame.borrow_mut() = Some(Closure::new(move || {
            if !running.get() {
                return;
            }
            if let Ok(window) = window() {
                // Skip the frame rather than fail while a callback holds the layer.
                if let Ok(mut runtime) = inner.try_borrow_mut() {
                    runtime.layer.update(viewport(&window));
                }
            }
            request_frame(&frame);
        }));
        request_frame(&self.frame);
    }

    /// Register a JS loader for an extension such as `".glb"`. The function
    /// receives the locator and resolves to a `Float32Array` of triangle
    /// positions.
    #[wasm_bindgen(js_name = registerLoader)]
    pub fn register_loader(&self, extension: &str, loader: js_sys::Function) {
        self.inner
            .borrow_mut()
            .registry
            .register(extension, JsLoader(loader));
        debug!(extension, "registered JS loader");
    }

    /// Bind a host element to this runtime.
    #[wasm_bindgen(js_name = createElement)]
    pub fn create_element(&self, element: HtmlElement) -> ModelElement {
        ModelElement {
            runtime: self.inner.clone(),
            slot: Rc::new(RefCell::new(ModelSlot::new(WebElement(element)))),
        }
    }

    /// Stop drawing and remove the canvas.
    pub fn dispose(&self) {
        self.running.set(false);
        self.frame.borrow_mut().take();

        let mut runtime = self.inner.borrow_mut();
        runtime.layer.renderer().surface().remove();
        runtime.layer.teardown();
    }
}

/// Lifecycle handle for one `<x-model>` element
#[wasm_bindgen]
pub struct ModelElement {
    runtime: Rc<RefCell<Runtime>>,
    slot: Rc<RefCell<ModelSlot<WebElement>>>,
}

#[wasm_bindgen]
impl ModelElement {
    pub fn connected(&self) {
        self.dispatch(ElementEvent::Connected);
    }

    pub fn disconnected(&self) {
        self.dispatch(ElementEvent::Disconnected);
    }

    #[wasm_bindgen(js_name = attributeChanged)]
    pub fn attribute_changed(&self, name: &str, old: Option<String>, new: Option<String>) {
        if !reloads_source(name, old.as_deref(), new.as_deref(), self.loaded()) {
            return;
        }
        if let Some(request) = self.dispatch(ElementEvent::SourceChanged(new)) {
            self.load(request);
        }
    }

    /// The source currently shown, if any.
    #[wasm_bindgen(getter)]
    pub fn src(&self) -> Option<String> {
        self.slot.borrow().source().map(str::to_string)
    }

    /// Whether a model is currently drawn for this element.
    #[wasm_bindgen(getter)]
    pub fn loaded(&self) -> bool {
        self.slot.borrow().object_id().is_some()
    }
}

impl ModelElement {
    fn dispatch(&self, event: ElementEvent) -> Option<LoadRequest> {
        let mut runtime = self.runtime.borrow_mut();
        self.slot.borrow_mut().handle(event, &mut runtime.layer)
    }

    fn load(&self, request: LoadRequest) {
        let pending = self.runtime.borrow_mut().registry.load(&request.locator);
        let element = self.slot.borrow().element().0.clone();
        let pending = match pending {
            Ok(pending) => pending,
            Err(e) => {
                notify(&element, Err(e));
                return;
            }
        };

        let runtime = self.runtime.clone();
        let slot = self.slot.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = pending.await;
            let outcome = {
                let mut runtime = runtime.borrow_mut();
                slot.borrow_mut()
                    .complete(request.generation, result, &mut runtime.layer)
            };
            // Listeners may call back into the element, so borrows end first.
            if let Some(outcome) = outcome {
                notify(&element, outcome);
            }
        });
    }
}

/// Setting `src` again retries unless that model is already shown.
fn reloads_source(name: &str, old: Option<&str>, new: Option<&str>, loaded: bool) -> bool {
    name == "src" && (old != new || !loaded)
}

fn notify(element: &HtmlElement, outcome: LoadResult<()>) {
    let event = match outcome {
        Ok(()) => Event::new("load"),
        Err(e) => {
            let init = ErrorEventInit::new();
            init.set_message(&e.to_string());
            ErrorEvent::new_with_event_init_dict("error", &init).map(Into::into)
        }
    };
    match event {
        Ok(event) => {
            if let Err(e) = element.dispatch_event(&event) {
                warn!(error = %describe(&e), "failed to dispatch model event");
            }
        }
        Err(e) => warn!(error = %describe(&e), "failed to create model event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_retries_until_loaded() {
        assert!(reloads_source("src", Some("a.obj"), Some("b.obj"), true));
        assert!(reloads_source("src", Some("a.obj"), Some("a.obj"), false));
        assert!(!reloads_source("src", Some("a.obj"), Some("a.obj"), true));
        assert!(!reloads_source("alt", None, Some("a.obj"), false));
    }
}
