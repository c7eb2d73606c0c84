/// In-memory element tree implementing [`DomElement`]
///
/// Boxes are placed explicitly: every element carries its position relative
/// to its parent and its own size, and the offset/client geometry a browser
/// would report is derived from that. Client rects ignore transforms unless
/// set explicitly with [`MemoryElement::set_client_rect`].
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::css;
use crate::dom::{Bounds, ComputedStyle, DomElement};

#[derive(Debug, Default)]
struct NodeData {
    name: String,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<MemoryElement>,
    is_document_root: bool,
    positioned: bool,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    scroll_left: f32,
    scroll_top: f32,
    client_rect: Option<Bounds>,
    style: ComputedStyle,
    transform_origin_set: bool,
}

/// Shared handle to an in-memory element.
#[derive(Debug, Clone)]
pub struct MemoryElement(Rc<RefCell<NodeData>>);

impl PartialEq for MemoryElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A document whose root element spans the viewport.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    root: MemoryElement,
}

impl MemoryDocument {
    pub fn new(width: f32, height: f32) -> Self {
        let root = MemoryElement::new("html");
        {
            let mut data = root.0.borrow_mut();
            data.is_document_root = true;
            data.width = width;
            data.height = height;
        }
        Self { root }
    }

    pub fn root(&self) -> &MemoryElement {
        &self.root
    }

    /// Create a detached element.
    pub fn create_element(&self, name: &str) -> MemoryElement {
        MemoryElement::new(name)
    }
}

impl MemoryElement {
    fn new(name: &str) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            name: name.to_string(),
            ..NodeData::default()
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn children(&self) -> Vec<MemoryElement> {
        self.0.borrow().children.clone()
    }

    /// Append `child`, detaching it from any previous parent first.
    pub fn append_child(&self, child: &MemoryElement) {
        child.remove();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Detach from the parent element, if any.
    pub fn remove(&self) {
        let parent = self.0.borrow().parent.upgrade();
        if let Some(parent) = parent {
            parent.borrow_mut().children.retain(|c| c != self);
        }
        self.0.borrow_mut().parent = Weak::new();
    }

    /// Position relative to the parent's box, and size.
    pub fn set_box(&self, left: f32, top: f32, width: f32, height: f32) {
        let mut data = self.0.borrow_mut();
        data.left = left;
        data.top = top;
        data.width = width;
        data.height = height;
    }

    /// Positioned elements (`position` other than `static`) act as offset
    /// parents for their descendants.
    pub fn set_positioned(&self, positioned: bool) {
        self.0.borrow_mut().positioned = positioned;
    }

    pub fn set_scroll(&self, left: f32, top: f32) {
        let mut data = self.0.borrow_mut();
        data.scroll_left = left;
        data.scroll_top = top;
    }

    pub fn set_client_rect(&self, rect: Option<Bounds>) {
        self.0.borrow_mut().client_rect = rect;
    }

    pub fn set_transform(&self, value: &str) {
        self.0.borrow_mut().style.transform = value.to_string();
    }

    pub fn set_transform_origin(&self, value: &str) {
        let mut data = self.0.borrow_mut();
        data.style.transform_origin = value.to_string();
        data.transform_origin_set = true;
    }

    pub fn set_perspective(&self, value: &str) {
        self.0.borrow_mut().style.perspective = value.to_string();
    }

    pub fn set_perspective_origin(&self, value: &str) {
        self.0.borrow_mut().style.perspective_origin = value.to_string();
    }

    pub fn set_overflow(&self, value: &str) {
        self.0.borrow_mut().style.overflow = value.to_string();
    }

    fn parent(&self) -> Option<MemoryElement> {
        self.0.borrow().parent.upgrade().map(MemoryElement)
    }

    /// Offset of this box from the document origin, before scrolling.
    fn page_position(&self) -> (f32, f32) {
        let mut x = 0.0;
        let mut y = 0.0;
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let data = node.0.borrow();
            x += data.left;
            y += data.top;
            drop(data);
            current = node.parent();
        }
        (x, y)
    }
}

impl DomElement for MemoryElement {
    fn parent_element(&self) -> Option<Self> {
        self.parent()
    }

    fn offset_parent(&self) -> Option<Self> {
        let mut current = self.parent();
        while let Some(node) = current {
            let data = node.0.borrow();
            if data.positioned || data.is_document_root {
                drop(data);
                return Some(node);
            }
            drop(data);
            current = node.parent();
        }
        None
    }

    fn offset_left(&self) -> f32 {
        let (x, _) = self.page_position();
        let base = self.offset_parent().map(|p| p.page_position().0).unwrap_or(0.0);
        x - base
    }

    fn offset_top(&self) -> f32 {
        let (_, y) = self.page_position();
        let base = self.offset_parent().map(|p| p.page_position().1).unwrap_or(0.0);
        y - base
    }

    fn offset_width(&self) -> f32 {
        self.0.borrow().width
    }

    fn offset_height(&self) -> f32 {
        self.0.borrow().height
    }

    fn scroll_left(&self) -> f32 {
        self.0.borrow().scroll_left
    }

    fn scroll_top(&self) -> f32 {
        self.0.borrow().scroll_top
    }

    fn bounding_client_rect(&self) -> Bounds {
        if let Some(rect) = self.0.borrow().client_rect {
            return rect;
        }

        let (mut x, mut y) = self.page_position();
        let mut current = self.parent();
        while let Some(node) = current {
            x -= node.scroll_left();
            y -= node.scroll_top();
            current = node.parent();
        }
        Bounds::from_size(x, y, self.offset_width(), self.offset_height())
    }

    fn computed_style(&self) -> ComputedStyle {
        let data = self.0.borrow();
        let mut style = data.style.clone();
        // Browsers resolve the initial `50% 50%` against the box.
        if !data.transform_origin_set {
            style.transform_origin = format!("{}px {}px 0px", data.width / 2.0, data.height / 2.0);
        }
        if css::is_none(&style.perspective) {
            style.perspective = "none".to_string();
        } else if style.perspective_origin.is_empty() {
            style.perspective_origin = format!("{}px {}px", data.width / 2.0, data.height / 2.0);
        }
        style
    }

    fn is_connected(&self) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.0.borrow().is_document_root {
                return true;
            }
            current = node.parent();
        }
        false
    }
}
