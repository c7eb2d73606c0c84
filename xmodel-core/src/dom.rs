//! The view of the DOM the resolvers need
//!
//! Hosts implement [`DomElement`] for their element handle (a
//! `web_sys::HtmlElement` in the browser, [`crate::document::MemoryElement`]
//! in tests and the terminal front-end). Every value is expected to be
//! fully resolved: computed styles in pixels, layout and scroll offsets
//! already applied.

/// Axis-aligned rectangle in CSS client coordinates (Y down, origin at the
/// top-left of the viewport).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// True when nothing inside these bounds can be drawn.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Shrink to the intersection with `other`.
    pub fn intersect(&mut self, other: &Bounds) {
        self.left = self.left.max(other.left);
        self.top = self.top.max(other.top);
        self.right = self.right.min(other.right);
        self.bottom = self.bottom.min(other.bottom);
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.left + self.width() / 2.0,
            self.top + self.height() / 2.0,
        )
    }
}

/// Size of the layout viewport (`innerWidth` x `innerHeight`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_size(0.0, 0.0, self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// The computed style properties the projection engine reads, as strings
/// exactly as `getComputedStyle` reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub transform: String,
    pub transform_origin: String,
    pub perspective: String,
    pub perspective_origin: String,
    pub overflow: String,
}

impl ComputedStyle {
    pub fn clips(&self) -> bool {
        self.overflow.trim() != "visible"
    }
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            transform: "none".to_string(),
            transform_origin: String::new(),
            perspective: "none".to_string(),
            perspective_origin: String::new(),
            overflow: "visible".to_string(),
        }
    }
}

/// A handle to a DOM element.
///
/// Handles are cheap to clone and compare by element identity.
pub trait DomElement: Clone + PartialEq {
    fn parent_element(&self) -> Option<Self>;
    fn offset_parent(&self) -> Option<Self>;

    fn offset_left(&self) -> f32;
    fn offset_top(&self) -> f32;
    fn offset_width(&self) -> f32;
    fn offset_height(&self) -> f32;

    fn scroll_left(&self) -> f32;
    fn scroll_top(&self) -> f32;

    fn bounding_client_rect(&self) -> Bounds;
    fn computed_style(&self) -> ComputedStyle;

    /// Whether the element is attached to a document.
    fn is_connected(&self) -> bool;

    /// Iterate from this element up to the root, self included.
    fn ancestors_inclusive(&self) -> Ancestors<Self> {
        Ancestors {
            next: Some(self.clone()),
        }
    }
}

pub struct Ancestors<E> {
    next: Option<E>,
}

impl<E: DomElement> Iterator for Ancestors<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        let current = self.next.take()?;
        self.next = current.parent_element();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_intersection() {
        let mut clip = Viewport::new(800.0, 600.0).bounds();
        clip.intersect(&Bounds::new(100.0, -50.0, 900.0, 300.0));
        assert_eq!(clip, Bounds::new(100.0, 0.0, 800.0, 300.0));
        assert!(!clip.is_empty());

        clip.intersect(&Bounds::new(850.0, 0.0, 900.0, 10.0));
        assert!(clip.is_empty());
    }

    #[test]
    fn test_default_style_does_not_clip() {
        assert!(!ComputedStyle::default().clips());
    }
}
