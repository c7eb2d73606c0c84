/// Model element lifecycle
///
/// A [`ModelSlot`] is the per-element state behind `<x-model>`: which source
/// it shows, whether its model is currently tracked by the layer, and which
/// load is the latest. Host callbacks are turned into [`ElementEvent`]s and
/// applied synchronously.
use tracing::{debug, warn};

use crate::dom::DomElement;
use crate::error::LoadResult;
use crate::layer::{ObjectId, RenderLayer, Renderer};
use crate::scene::SceneNode;

/// Lifecycle callbacks of a model element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    Connected,
    Disconnected,
    /// The `src` attribute changed; `None` when it was removed
    SourceChanged(Option<String>),
}

/// A model load the host should start
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub locator: String,
    pub generation: u64,
}

#[derive(Debug)]
enum SlotState {
    Empty,
    /// Loaded but not in the layer (element disconnected)
    Detached(SceneNode),
    Attached(ObjectId),
}

#[derive(Debug)]
pub struct ModelSlot<E> {
    element: E,
    source: Option<String>,
    generation: u64,
    state: SlotState,
}

impl<E: DomElement> ModelSlot<E> {
    pub fn new(element: E) -> Self {
        Self {
            element,
            source: None,
            generation: 0,
            state: SlotState::Empty,
        }
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match self.state {
            SlotState::Attached(id) => Some(id),
            _ => None,
        }
    }

    /// Apply a lifecycle event. A source change returns the load to start;
    /// the previous model is released before that.
    pub fn handle<R: Renderer>(
        &mut self,
        event: ElementEvent,
        layer: &mut RenderLayer<E, R>,
    ) -> Option<LoadRequest> {
        match event {
            ElementEvent::Connected => {
                self.attach(layer);
                None
            }
            ElementEvent::Disconnected => {
                if let SlotState::Attached(id) = self.state {
                    self.state = match layer.detach(id) {
                        Some(object) => SlotState::Detached(object.node),
                        None => SlotState::Empty,
                    };
                }
                None
            }
            ElementEvent::SourceChanged(source) => {
                if let SlotState::Attached(id) = self.state {
                    layer.detach(id);
                }
                self.state = SlotState::Empty;
                self.generation += 1;
                self.source = source.filter(|s| !s.trim().is_empty());
                self.source.clone().map(|locator| LoadRequest {
                    locator,
                    generation: self.generation,
                })
            }
        }
    }

    /// Deliver the outcome of a load. Returns `None` when the source has
    /// changed since `generation` was issued and the result was discarded.
    pub fn complete<R: Renderer>(
        &mut self,
        generation: u64,
        result: LoadResult<SceneNode>,
        layer: &mut RenderLayer<E, R>,
    ) -> Option<LoadResult<()>> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale load");
            return None;
        }

        match result {
            Ok(node) => {
                self.state = SlotState::Detached(node);
                self.attach(layer);
                Some(Ok(()))
            }
            Err(e) => {
                warn!(error = %e, "model failed to load");
                Some(Err(e))
            }
        }
    }

    fn attach<R: Renderer>(&mut self, layer: &mut RenderLayer<E, R>) {
        if !self.element.is_connected() {
            return;
        }
        if let SlotState::Detached(node) = std::mem::replace(&mut self.state, SlotState::Empty) {
            self.state = SlotState::Attached(layer.attach(node, self.element.clone()));
        }
    }
}
