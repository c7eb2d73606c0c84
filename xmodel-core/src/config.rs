//! Render layer configuration
//!
//! Every table and field is optional; an empty document yields the same
//! values the browser element uses.

use serde::{Deserialize, Serialize};

use crate::scene::PointLight;

/// Settings for a [`crate::layer::RenderLayer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// RGBA the surface is cleared to every frame
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    /// Camera used when no ancestor declares `perspective`
    #[serde(default = "default_orthographic")]
    pub orthographic: CameraConfig,
    #[serde(default = "default_perspective")]
    pub perspective: CameraConfig,
    #[serde(default)]
    pub light: LightConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            clear_color: default_clear_color(),
            orthographic: default_orthographic(),
            perspective: default_perspective(),
            light: LightConfig::default(),
        }
    }
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 0.0]
}

/// Clip planes of a camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub near: f32,
    pub far: f32,
}

fn default_orthographic() -> CameraConfig {
    // Negative near keeps geometry pushed towards the viewer by translateZ
    // from being clipped.
    CameraConfig {
        near: -700.0,
        far: 2000.0,
    }
}

fn default_perspective() -> CameraConfig {
    CameraConfig {
        near: 0.1,
        far: 2000.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    /// 0xRRGGBB
    #[serde(default = "default_light_color")]
    pub color: u32,
    #[serde(default = "default_light_intensity")]
    pub intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            color: default_light_color(),
            intensity: default_light_intensity(),
        }
    }
}

fn default_light_color() -> u32 {
    0x808080
}

fn default_light_intensity() -> f32 {
    2.0
}

impl LightConfig {
    /// Colour as linear 0..1 channels
    pub fn rgb(&self) -> [f32; 3] {
        let channel = |shift: u32| ((self.color >> shift) & 0xff) as f32 / 255.0;
        [channel(16), channel(8), channel(0)]
    }

    /// A point light at the origin; the layer moves it every frame.
    pub fn point_light(&self) -> PointLight {
        PointLight {
            color: self.rgb(),
            intensity: self.intensity,
            position: nalgebra::Point3::origin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: LayerConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(config, LayerConfig::default());
        assert_eq!(config.orthographic.near, -700.0);
        assert_eq!(config.perspective.far, 2000.0);
    }

    #[test]
    fn test_partial_override() {
        let config: LayerConfig = toml::from_str(
            r#"
            clear_color = [1.0, 1.0, 1.0, 1.0]

            [light]
            color = 0xff0000
            "#,
        )
        .expect("config parses");
        assert_eq!(config.clear_color, [1.0; 4]);
        assert_eq!(config.light.rgb(), [1.0, 0.0, 0.0]);
        assert_eq!(config.light.intensity, 2.0);
        assert_eq!(config.orthographic, default_orthographic());
    }

    #[test]
    fn test_camera_table_needs_both_planes() {
        let result: Result<LayerConfig, _> = toml::from_str("[perspective]\nnear = 1.0\n");
        assert!(result.is_err());
    }
}
