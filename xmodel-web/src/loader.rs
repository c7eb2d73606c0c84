/// Model loaders backed by `fetch` and by host-provided JS functions
use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Float32Array, Function, Promise, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;
use xmodel_core::loader::decode_model;
use xmodel_core::{LoadError, LoadResult, Mesh, ModelLoader, ModelRegistry, SceneNode};

pub(crate) fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Fetches OBJ and STL files over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchLoader;

impl FetchLoader {
    pub fn register_all(self, registry: &mut ModelRegistry) {
        registry.register(".obj", self);
        registry.register(".stl", self);
    }
}

async fn fetch_bytes(locator: &str) -> Result<Vec<u8>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(locator))
        .await?
        .dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "HTTP {} {}",
            response.status(),
            response.status_text()
        )));
    }
    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

impl ModelLoader for FetchLoader {
    fn load(&self, locator: &str) -> LocalBoxFuture<'static, LoadResult<SceneNode>> {
        let locator = locator.to_string();
        async move {
            let bytes = fetch_bytes(&locator)
                .await
                .map_err(|e| LoadError::fetch(&locator, describe(&e)))?;
            decode_model(&locator, &bytes)
        }
        .boxed_local()
    }
}

/// A JS function `(locator) => Promise<Float32Array>` resolving to flat
/// triangle positions (nine floats per triangle).
#[derive(Debug, Clone)]
pub struct JsLoader(pub Function);

impl ModelLoader for JsLoader {
    fn load(&self, locator: &str) -> LocalBoxFuture<'static, LoadResult<SceneNode>> {
        let locator = locator.to_string();
        let called = self.0.call1(&JsValue::NULL, &JsValue::from_str(&locator));
        async move {
            let promise: Promise = called
                .and_then(|value| value.dyn_into())
                .map_err(|e| LoadError::fetch(&locator, describe(&e)))?;
            let resolved = JsFuture::from(promise)
                .await
                .map_err(|e| LoadError::fetch(&locator, describe(&e)))?;
            let positions: Float32Array = resolved
                .dyn_into()
                .map_err(|_| LoadError::parse(&locator, "loader did not return a Float32Array"))?;

            let mesh = Mesh::from_positions(&positions.to_vec());
            if mesh.is_empty() {
                return Err(LoadError::EmptyModel(locator));
            }
            Ok(SceneNode::with_mesh(mesh))
        }
        .boxed_local()
    }
}
