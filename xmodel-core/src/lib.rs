/// xmodel core library - CSS-to-3D projection engine
///
/// Mirrors the CSS transform, perspective and clipping state of DOM elements
/// onto 3D models. Everything here is platform independent: hosts provide
/// a [`dom::DomElement`] implementation and a [`layer::Renderer`].

pub mod camera;
pub mod config;
pub mod css;
pub mod document;
pub mod dom;
pub mod element;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod loader;
pub mod obj;
pub mod projection;
pub mod scene;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use camera::{Camera, ProjectionMode};
pub use config::LayerConfig;
pub use dom::{Bounds, ComputedStyle, DomElement, Viewport};
pub use element::{ElementEvent, LoadRequest, ModelSlot};
pub use error::{DecodeError, LoadError, LoadResult};
pub use geometry::{Aabb, Mesh, Triangle, Vertex};
pub use layer::{ObjectId, RenderLayer, Renderer, Scissor, TrackedObject};
pub use loader::{FileLoader, ModelLoader, ModelRegistry};
pub use projection::{resolve_projection, ProjectionState};
pub use scene::{PointLight, Scene, SceneNode};
pub use transform::{resolve_element_transform, RotationState, Transform};
