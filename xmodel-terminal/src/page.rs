//! Page descriptions
//!
//! A page is a TOML file describing a tree of boxes with the CSS properties
//! the projection engine reads. Elements with a `src` become models.
//!
//! ```toml
//! [viewport]
//! width = 800
//! height = 600
//!
//! [[element]]
//! name = "stage"
//! rect = [0, 0, 800, 600]
//! perspective = "800px"
//!
//! [[element.children]]
//! name = "teapot"
//! rect = [200, 100, 400, 400]
//! src = "teapot.obj"
//! spin = 45
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use xmodel_core::document::{MemoryDocument, MemoryElement};
use xmodel_core::{LayerConfig, Viewport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub viewport: ViewportConfig,
    /// Directory model sources are resolved against; defaults to the page's
    /// own directory
    #[serde(default)]
    pub models: Option<PathBuf>,
    #[serde(default)]
    pub layer: LayerConfig,
    #[serde(default, rename = "element")]
    pub elements: Vec<ElementConfig>,
}

/// Page size in CSS pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_width() -> f32 {
    800.0
}

fn default_height() -> f32 {
    600.0
}

impl From<ViewportConfig> for Viewport {
    fn from(config: ViewportConfig) -> Self {
        Viewport::new(config.width, config.height)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// `[left, top, width, height]` relative to the parent box
    #[serde(default)]
    pub rect: [f32; 4],
    #[serde(default)]
    pub positioned: bool,
    /// `[left, top]` scroll offset of this box's content
    #[serde(default)]
    pub scroll: [f32; 2],
    pub overflow: Option<String>,
    pub transform: Option<String>,
    pub transform_origin: Option<String>,
    pub perspective: Option<String>,
    pub perspective_origin: Option<String>,
    /// Model to show in this box
    pub src: Option<String>,
    /// Rotation about the vertical axis in degrees per second
    pub spin: Option<f32>,
    #[serde(default)]
    pub children: Vec<ElementConfig>,
}

fn default_name() -> String {
    "div".to_string()
}

/// An element with a model source, built from the page
#[derive(Debug, Clone)]
pub struct ModelElement {
    pub element: MemoryElement,
    pub src: String,
    pub spin: Option<f32>,
}

impl Page {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading page {}", path.display()))?;
        let mut page: Page = toml::from_str(&content)
            .with_context(|| format!("parsing page {}", path.display()))?;

        let base = path.parent().unwrap_or(Path::new("."));
        page.models = Some(match page.models.take() {
            Some(models) => base.join(models),
            None => base.to_path_buf(),
        });
        info!(path = %path.display(), elements = page.elements.len(), "loaded page");
        Ok(page)
    }

    /// A page with one spinning model filling the viewport.
    pub fn single_model(model: &Path, viewport: ViewportConfig) -> Self {
        let (models, src) = match (model.parent(), model.file_name()) {
            (Some(dir), Some(file)) => (dir.to_path_buf(), file.to_string_lossy().into_owned()),
            _ => (PathBuf::from("."), model.to_string_lossy().into_owned()),
        };
        let inset = viewport.width.min(viewport.height) * 0.1;
        Self {
            viewport,
            models: Some(models),
            layer: LayerConfig::default(),
            elements: vec![ElementConfig {
                name: "stage".to_string(),
                rect: [0.0, 0.0, viewport.width, viewport.height],
                perspective: Some(format!("{}px", viewport.height * 2.0)),
                children: vec![ElementConfig {
                    name: "x-model".to_string(),
                    rect: [
                        inset,
                        inset,
                        viewport.width - 2.0 * inset,
                        viewport.height - 2.0 * inset,
                    ],
                    src: Some(src),
                    spin: Some(30.0),
                    ..ElementConfig::default()
                }],
                ..ElementConfig::default()
            }],
        }
    }

    /// Build the element tree into a fresh document.
    pub fn build(&self) -> (MemoryDocument, Vec<ModelElement>) {
        let document = MemoryDocument::new(self.viewport.width, self.viewport.height);
        let mut models = Vec::new();
        for config in &self.elements {
            build_element(&document, document.root(), config, &mut models);
        }
        (document, models)
    }
}

fn build_element(
    document: &MemoryDocument,
    parent: &MemoryElement,
    config: &ElementConfig,
    models: &mut Vec<ModelElement>,
) {
    let element = document.create_element(&config.name);
    let [left, top, width, height] = config.rect;
    element.set_box(left, top, width, height);
    element.set_positioned(config.positioned);
    element.set_scroll(config.scroll[0], config.scroll[1]);
    if let Some(value) = &config.overflow {
        element.set_overflow(value);
    }
    if let Some(value) = &config.transform {
        element.set_transform(value);
    }
    if let Some(value) = &config.transform_origin {
        element.set_transform_origin(value);
    }
    if let Some(value) = &config.perspective {
        element.set_perspective(value);
    }
    if let Some(value) = &config.perspective_origin {
        element.set_perspective_origin(value);
    }
    parent.append_child(&element);

    if let Some(src) = &config.src {
        models.push(ModelElement {
            element: element.clone(),
            src: src.clone(),
            spin: config.spin,
        });
    }
    for child in &config.children {
        build_element(document, &element, child, models);
    }
}
