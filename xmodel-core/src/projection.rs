/// Perspective and clipping resolver
///
/// Nested perspectives are not composited: only the nearest ancestor that
/// declares `perspective` counts, and its `perspective-origin` is the only
/// one read.
use nalgebra::Vector3;
use tracing::trace;

use crate::css;
use crate::dom::{Bounds, DomElement, Viewport};

/// How an element is projected onto the page
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionState {
    /// Distance from the viewer to the `z = 0` plane; `None` means orthographic
    pub perspective: Option<f32>,
    /// Vanishing point, relative to the top-left of `camera_bounds`
    pub perspective_origin: Vector3<f32>,
    /// Visible region left after every clipping ancestor
    pub clip_bounds: Bounds,
    /// Client rect of the element declaring `perspective`, or the viewport
    pub camera_bounds: Bounds,
}

impl ProjectionState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            perspective: None,
            perspective_origin: Vector3::zeros(),
            clip_bounds: viewport.bounds(),
            camera_bounds: viewport.bounds(),
        }
    }
}

pub fn resolve_projection<E: DomElement>(element: &E, viewport: Viewport) -> ProjectionState {
    let mut state = ProjectionState::new(viewport);

    for node in element.ancestors_inclusive() {
        let style = node.computed_style();

        if state.perspective.is_none() && !css::is_none(&style.perspective) {
            let perspective = css::parse_unit_value(&style.perspective);
            if perspective > 0.0 {
                state.perspective = Some(perspective);
                state.perspective_origin = css::parse_origin_value(&style.perspective_origin);
                state.camera_bounds = node.bounding_client_rect();
            }
        }

        if style.clips() {
            state.clip_bounds.intersect(&node.bounding_client_rect());
        }
    }

    trace!(?state, "resolved projection");
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;

    fn viewport() -> Viewport {
        Viewport::new(800.0, 600.0)
    }

    #[test]
    fn test_defaults_to_viewport() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let el = doc.create_element("x-model");
        el.set_box(50.0, 30.0, 200.0, 100.0);
        doc.root().append_child(&el);

        let state = resolve_projection(&el, viewport());
        assert_eq!(state, ProjectionState::new(viewport()));
    }

    #[test]
    fn test_clip_narrows_monotonically() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let outer = doc.create_element("outer");
        outer.set_box(0.0, 0.0, 600.0, 500.0);
        outer.set_overflow("hidden");
        let middle = doc.create_element("middle");
        middle.set_box(100.0, 50.0, 600.0, 300.0);
        let inner = doc.create_element("inner");
        inner.set_box(50.0, 50.0, 200.0, 400.0);
        inner.set_overflow("auto");
        let el = doc.create_element("x-model");
        el.set_box(0.0, 0.0, 100.0, 100.0);

        doc.root().append_child(&outer);
        outer.append_child(&middle);
        middle.append_child(&inner);
        inner.append_child(&el);

        let state = resolve_projection(&el, viewport());
        // inner sits at (150, 100)..(350, 500), cut by outer's bottom
        assert_eq!(state.clip_bounds, Bounds::new(150.0, 100.0, 350.0, 500.0));

        // Without the innermost clip the result can only grow.
        inner.set_overflow("visible");
        let wider = resolve_projection(&el, viewport());
        assert_eq!(wider.clip_bounds, Bounds::new(0.0, 0.0, 600.0, 500.0));
        assert!(wider.clip_bounds.width() >= state.clip_bounds.width());
    }

    #[test]
    fn test_nearest_perspective_wins() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let stage = doc.create_element("stage");
        stage.set_box(0.0, 0.0, 800.0, 600.0);
        stage.set_perspective("1000px");
        let card = doc.create_element("card");
        card.set_box(100.0, 100.0, 400.0, 300.0);
        card.set_perspective("500px");
        card.set_perspective_origin("0px 0px");
        let el = doc.create_element("x-model");
        el.set_box(10.0, 10.0, 100.0, 100.0);

        doc.root().append_child(&stage);
        stage.append_child(&card);
        card.append_child(&el);

        let state = resolve_projection(&el, viewport());
        assert_eq!(state.perspective, Some(500.0));
        assert_eq!(state.perspective_origin, Vector3::zeros());
        assert_eq!(state.camera_bounds, Bounds::new(100.0, 100.0, 500.0, 400.0));
    }

    #[test]
    fn test_non_positive_perspective_is_ignored() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let stage = doc.create_element("stage");
        stage.set_box(0.0, 0.0, 800.0, 600.0);
        stage.set_perspective("800px");
        let card = doc.create_element("card");
        card.set_box(0.0, 0.0, 100.0, 100.0);
        card.set_perspective("0px");

        doc.root().append_child(&stage);
        stage.append_child(&card);

        let state = resolve_projection(&card, viewport());
        assert_eq!(state.perspective, Some(800.0));
        // default perspective-origin is the centre of the declaring box
        assert_eq!(state.perspective_origin, Vector3::new(400.0, 300.0, 0.0));
    }
}
