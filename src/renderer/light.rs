//! Point lights and per-fragment shading.

use super::math::Vec3;
use super::shadow::ShadowMap;

/// A point light with an owned shadow map. The generation counter bumps on
/// every transform change so a shadow map rendered for an old pose is
/// detectable.
pub struct Light {
    pub position: Vec3,
    pub target: Vec3,
    pub active: bool,
    pub generation: u64,
    pub shadow: ShadowMap,
}

impl Light {
    pub fn new(position: Vec3, target: Vec3, shadow_map_size: usize) -> Self {
        Self {
            position,
            target,
            active: true,
            generation: 1,
            shadow: ShadowMap::new(shadow_map_size),
        }
    }
}

/// Immutable per-frame view of one active light, snapshotted before the
/// raster stage so workers share it read-only.
pub struct FrameLight<'a> {
    pub position: Vec3,
    /// `None` when the map has never been generated or is stale for this
    /// frame; the light then contributes diffuse with no occlusion.
    pub shadow: Option<&'a ShadowMap>,
}

/// Shading parameters shared by every fragment of a frame.
pub struct Shading<'a> {
    pub lights: Vec<FrameLight<'a>>,
    pub ambient: f32,
    pub intensity: f32,
    pub shadow_bias: f32,
}

impl Shading<'_> {
    /// Scalar shade multiplier for a fragment:
    /// `clamp(ambient + sum(intensity * max(0, n.l) * shadow), 0, 1)`.
    ///
    /// Degenerate normals fall back to +Y rather than dropping the fragment.
    pub fn shade(&self, world: Vec3, normal: Vec3) -> f32 {
        let n = {
            let n = normal.normalize();
            if n == Vec3::ZERO { Vec3::UP } else { n }
        };
        let mut acc = self.ambient;
        for light in &self.lights {
            let to_light = (light.position - world).normalize();
            let diffuse = self.intensity * n.dot(to_light).max(0.0);
            if diffuse <= 0.0 {
                continue;
            }
            let visibility = match light.shadow {
                Some(map) => map.visibility(world, self.shadow_bias),
                None => 1.0,
            };
            acc += diffuse * visibility;
        }
        acc.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shading(lights: Vec<FrameLight<'_>>) -> Shading<'_> {
        Shading {
            lights,
            ambient: 0.3,
            intensity: 0.8,
            shadow_bias: 0.005,
        }
    }

    #[test]
    fn test_directional_incidence_60_degrees() {
        // Ground plane fragment, light at 60 degrees incidence:
        // shade = 0.3 + 0.8 * cos(60) = 0.7.
        let dist = 100.0f32;
        let angle = 60f32.to_radians();
        let light_pos = Vec3::new(angle.sin() * dist, angle.cos() * dist, 0.0);
        let s = shading(vec![FrameLight { position: light_pos, shadow: None }]);
        let shade = s.shade(Vec3::ZERO, Vec3::UP);
        assert!((shade - 0.7).abs() < 1e-3, "shade = {}", shade);
    }

    #[test]
    fn test_backfacing_light_leaves_ambient_only() {
        let s = shading(vec![FrameLight {
            position: Vec3::new(0.0, -10.0, 0.0),
            shadow: None,
        }]);
        let shade = s.shade(Vec3::ZERO, Vec3::UP);
        assert!((shade - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_multiple_lights_accumulate_then_clamp() {
        let overhead = || FrameLight {
            position: Vec3::new(0.0, 10.0, 0.0),
            shadow: None,
        };
        let s = shading(vec![overhead(), overhead()]);
        let shade = s.shade(Vec3::ZERO, Vec3::UP);
        // 0.3 + 0.8 + 0.8 clamps to 1.
        assert!((shade - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_length_normal_falls_back_to_up() {
        let s = shading(vec![FrameLight {
            position: Vec3::new(0.0, 10.0, 0.0),
            shadow: None,
        }]);
        let shade = s.shade(Vec3::ZERO, Vec3::ZERO);
        assert!((shade - 1.0).abs() < 1e-5);
    }
}
