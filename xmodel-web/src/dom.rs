/// Browser elements as seen by the projection engine
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlElement;
use xmodel_core::{Bounds, ComputedStyle, DomElement};

/// An `HtmlElement` handle. Equality is element identity.
#[derive(Debug, Clone)]
pub struct WebElement(pub HtmlElement);

impl PartialEq for WebElement {
    fn eq(&self, other: &Self) -> bool {
        let a: &JsValue = self.0.as_ref();
        let b: &JsValue = other.0.as_ref();
        a == b
    }
}

impl WebElement {
    fn wrap(element: Option<web_sys::Element>) -> Option<Self> {
        element
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .map(WebElement)
    }
}

impl DomElement for WebElement {
    fn parent_element(&self) -> Option<Self> {
        Self::wrap(self.0.parent_element())
    }

    fn offset_parent(&self) -> Option<Self> {
        Self::wrap(self.0.offset_parent())
    }

    fn offset_left(&self) -> f32 {
        self.0.offset_left() as f32
    }

    fn offset_top(&self) -> f32 {
        self.0.offset_top() as f32
    }

    fn offset_width(&self) -> f32 {
        self.0.offset_width() as f32
    }

    fn offset_height(&self) -> f32 {
        self.0.offset_height() as f32
    }

    fn scroll_left(&self) -> f32 {
        self.0.scroll_left() as f32
    }

    fn scroll_top(&self) -> f32 {
        self.0.scroll_top() as f32
    }

    fn bounding_client_rect(&self) -> Bounds {
        let rect = self.0.get_bounding_client_rect();
        Bounds::new(
            rect.left() as f32,
            rect.top() as f32,
            rect.right() as f32,
            rect.bottom() as f32,
        )
    }

    fn computed_style(&self) -> ComputedStyle {
        let declaration = web_sys::window()
            .and_then(|window| window.get_computed_style(&self.0).ok().flatten());
        let Some(declaration) = declaration else {
            return ComputedStyle::default();
        };
        let read = |name: &str, fallback: &str| {
            declaration
                .get_property_value(name)
                .ok()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        ComputedStyle {
            transform: read("transform", "none"),
            transform_origin: read("transform-origin", ""),
            perspective: read("perspective", "none"),
            perspective_origin: read("perspective-origin", ""),
            overflow: read("overflow", "visible"),
        }
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }
}
