//! Renderer configuration.
//!
//! Every tunable the pipeline reads lives here instead of inline constants:
//! projection parameters, lighting defaults, shadow bias, and the scene
//! capacity limits. Configs load from RON files so demos can tweak them
//! without recompiling.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Framebuffer size in pixels.
    pub width: usize,
    pub height: usize,

    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,

    /// Constant lighting floor applied regardless of orientation.
    pub ambient: f32,
    /// Diffuse intensity per light.
    pub intensity: f32,

    /// Depth offset for shadow comparisons; suppresses self-shadowing acne.
    pub shadow_bias: f32,
    /// Shadow maps are square, sized independently of the framebuffer.
    pub shadow_map_size: usize,
    /// Field of view of the shadow pass, degrees.
    pub shadow_fov_deg: f32,

    pub max_meshes: usize,
    pub max_lights: usize,
    /// Bounds both total scene triangles and the per-frame raster budget;
    /// excess submissions are dropped, not an error.
    pub max_triangles: usize,

    /// Background color, RGB.
    pub background: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fov_y_deg: 60.0,
            near: 0.1,
            far: 100.0,
            ambient: 0.3,
            intensity: 0.8,
            shadow_bias: 0.005,
            shadow_map_size: 512,
            shadow_fov_deg: 90.0,
            max_meshes: 256,
            max_lights: 8,
            max_triangles: 100_000,
            background: [30, 30, 35],
        }
    }
}

impl RenderConfig {
    pub fn fov_y(&self) -> f32 {
        self.fov_y_deg.to_radians()
    }

    pub fn shadow_fov(&self) -> f32 {
        self.shadow_fov_deg.to_radians()
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        ron::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ron_roundtrip() {
        let config = RenderConfig::default();
        let text = ron::ser::to_string(&config).unwrap();
        let back: RenderConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.width, config.width);
        assert_eq!(back.shadow_map_size, config.shadow_map_size);
        assert!((back.ambient - config.ambient).abs() < 1e-6);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: RenderConfig = ron::from_str("(width: 320, height: 240)").unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 240);
        assert_eq!(config.max_lights, RenderConfig::default().max_lights);
    }
}
