/// Render layer: composites every tracked model over the page
///
/// Each frame, every tracked object is moved to where its element sits,
/// drawn alone with its own camera and scissor, then taken back out of the
/// scene. Objects never share a draw call because each may sit under a
/// different perspective or clip.
use std::mem;

use nalgebra::{Point3, Vector3};
use tracing::{debug, info, trace};

use crate::camera::Camera;
use crate::config::LayerConfig;
use crate::dom::{DomElement, Viewport};
use crate::projection::resolve_projection;
use crate::scene::{Scene, SceneNode};
use crate::transform::{resolve_element_transform, Transform};

/// Scissor rectangle in surface pixels, origin at the bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scissor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Something that can rasterize a [`Scene`] through a [`Camera`].
///
/// Rendering must not clear implicitly: several objects are drawn into the
/// same surface every frame, each limited to its own scissor.
pub trait Renderer {
    /// Handle to whatever the host displays (a canvas, a terminal buffer).
    type Surface;

    fn surface(&self) -> Self::Surface;
    fn set_size(&mut self, viewport: Viewport);
    fn clear(&mut self, color: [f32; 4]);
    fn set_scissor(&mut self, scissor: Scissor);
    fn render(&mut self, scene: &Scene, camera: &Camera);
}

/// Identifies a tracked object within one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

/// A placed model and the element that drives it
#[derive(Debug, Clone)]
pub struct TrackedObject<E> {
    pub node: SceneNode,
    pub element: E,
}

/// Everything the layer renders with
pub struct RenderContext<R> {
    pub scene: Scene,
    pub orthographic: Camera,
    pub perspective: Camera,
    pub renderer: R,
    pub config: LayerConfig,
}

impl<R: Renderer> RenderContext<R> {
    pub fn new(renderer: R, config: LayerConfig) -> Self {
        Self {
            scene: Scene::new(config.light.point_light()),
            orthographic: Camera::orthographic(&config.orthographic),
            perspective: Camera::perspective(&config.perspective),
            renderer,
            config,
        }
    }
}

pub struct RenderLayer<E, R> {
    context: RenderContext<R>,
    objects: Vec<(ObjectId, TrackedObject<E>)>,
    next_id: u64,
    initialized: bool,
}

impl<E: DomElement, R: Renderer> RenderLayer<E, R> {
    pub fn new(renderer: R, config: LayerConfig) -> Self {
        Self {
            context: RenderContext::new(renderer, config),
            objects: Vec::new(),
            next_id: 0,
            initialized: false,
        }
    }

    /// Prepare the layer for drawing. Returns the surface to insert into the
    /// page the first time, `None` if already initialized.
    pub fn initialize(&mut self) -> Option<R::Surface> {
        if self.initialized {
            return None;
        }
        self.initialized = true;
        info!("render layer initialized");
        Some(self.context.renderer.surface())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Drop every tracked object and return to the uninitialized state.
    pub fn teardown(&mut self) {
        info!(objects = self.objects.len(), "render layer torn down");
        self.objects.clear();
        self.initialized = false;
    }

    /// Start tracking `node`, placed by `element`.
    pub fn attach(&mut self, node: SceneNode, element: E) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push((id, TrackedObject { node, element }));
        debug!(?id, "object attached");
        id
    }

    pub fn detach(&mut self, id: ObjectId) -> Option<TrackedObject<E>> {
        let index = self.objects.iter().position(|(other, _)| *other == id)?;
        debug!(?id, "object detached");
        Some(self.objects.remove(index).1)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.iter().any(|(other, _)| *other == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn renderer(&self) -> &R {
        &self.context.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.context.renderer
    }

    pub fn config(&self) -> &LayerConfig {
        &self.context.config
    }

    /// Draw one frame. Returns whether any object selected a camera.
    pub fn update(&mut self, viewport: Viewport) -> bool {
        if !self.initialized {
            trace!("update before initialize");
            return false;
        }

        let RenderContext {
            scene,
            orthographic,
            perspective,
            renderer,
            config,
        } = &mut self.context;

        renderer.set_size(viewport);
        renderer.clear(config.clear_color);

        let half_width = viewport.width / 2.0;
        let half_height = viewport.height / 2.0;
        let mut drew = false;

        for (id, object) in &mut self.objects {
            let element = &object.element;
            if !element.is_connected() {
                continue;
            }

            let width = element.offset_width();
            let height = element.offset_height();
            if width == 0.0 || height == 0.0 {
                continue;
            }

            let projection = resolve_projection(element, viewport);
            let clip = projection.clip_bounds;
            if clip.is_empty() {
                trace!(?id, "clipped out");
                continue;
            }

            let mut transform = Transform::from_matrix(&resolve_element_transform(element));
            if let Some(size) = object.node.size {
                let fit = (width / size.x).min(height / size.y);
                if fit.is_finite() {
                    transform.scale *= fit;
                }
            }
            transform.position += Vector3::new(-half_width, half_height, 0.0);
            object.node.transform = transform;

            let camera = match projection.perspective {
                Some(distance) => {
                    perspective.set_perspective(
                        &projection.camera_bounds,
                        distance,
                        &projection.perspective_origin,
                        viewport,
                    );
                    &*perspective
                }
                None => {
                    orthographic.set_orthographic_bounds(&projection.camera_bounds, viewport);
                    &*orthographic
                }
            };
            drew = true;

            let (center_x, center_y) = projection.camera_bounds.center();
            scene.light.position =
                Point3::new(center_x - half_width, half_height - center_y, camera.far);

            renderer.set_scissor(Scissor {
                x: clip.left,
                y: viewport.height - clip.bottom,
                width: clip.width(),
                height: clip.height(),
            });

            scene.add(mem::take(&mut object.node));
            renderer.render(scene, camera);
            if let Some(node) = scene.remove_last() {
                object.node = node;
            }
        }

        drew
    }
}
