//! Shadow maps: a depth-only buffer rendered from a light's point of view,
//! paired with the view-projection matrix that produced it.
//!
//! The pairing is the invariant that matters: sampling a depth buffer with a
//! matrix from a different generation gives garbage visibility, so both carry
//! a generation tag and are only ever refreshed together (the scene drives
//! regeneration explicitly via `update_lights`).

use super::framebuffer::DepthBuffer;
use super::math::{Mat4, Vec3};

/// Shadow map never generated yet; sampled as fully lit.
pub const GENERATION_UNMAPPED: u64 = 0;

#[derive(Debug, Clone)]
pub struct ShadowMap {
    pub depth: DepthBuffer,
    pub view_proj: Mat4,
    pub generation: u64,
}

impl ShadowMap {
    pub fn new(size: usize) -> Self {
        Self {
            depth: DepthBuffer::new(size),
            view_proj: Mat4::IDENTITY,
            generation: GENERATION_UNMAPPED,
        }
    }

    /// Reset for a fresh generation pass. The matrix and the cleared buffer
    /// are committed together; `generation` records which light pose they
    /// belong to.
    pub fn begin_generation(&mut self, view_proj: Mat4, generation: u64) {
        self.depth.clear();
        self.view_proj = view_proj;
        self.generation = generation;
    }

    /// Shadow visibility for a world-space point: 1.0 lit, 0.0 shadowed.
    ///
    /// The point is projected into the light's clip space with the stored
    /// matrix and compared against the stored depth plus `bias` (the fixed
    /// offset that suppresses self-shadowing acne). Points outside the
    /// light's frustum count as lit.
    pub fn visibility(&self, world: Vec3, bias: f32) -> f32 {
        if self.generation == GENERATION_UNMAPPED {
            return 1.0;
        }
        let clip = self.view_proj.transform_point(world);
        if clip.w <= 0.0 {
            return 1.0;
        }
        let ndc = clip.perspective_divide();
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z > 1.0 {
            return 1.0;
        }
        let size = self.depth.size;
        let tx = (((ndc.x + 1.0) * 0.5 * size as f32) as usize).min(size - 1);
        let ty = (((1.0 - ndc.y) * 0.5 * size as f32) as usize).min(size - 1);
        let stored = self.depth.depth_at(tx, ty);
        if ndc.z > stored + bias {
            0.0
        } else {
            1.0
        }
    }
}

/// View-projection matrix for a light looking from `position` at `target`.
/// Shadow passes use the same perspective pipeline as the camera, just with
/// the light's pose.
pub fn light_view_proj(position: Vec3, target: Vec3, fov_y: f32, near: f32, far: f32) -> Mat4 {
    let view = Mat4::look_at(position, target, Vec3::UP);
    let proj = Mat4::perspective(fov_y, 1.0, near, far);
    proj.mul(&view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_shadow_map_is_fully_lit() {
        let map = ShadowMap::new(8);
        assert_eq!(map.visibility(Vec3::ZERO, 0.005), 1.0);
    }

    #[test]
    fn test_occluder_depth_shadows_points_behind_it() {
        let mut map = ShadowMap::new(64);
        let vp = light_view_proj(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::ZERO,
            60f32.to_radians(),
            0.5,
            50.0,
        );
        map.begin_generation(vp, 1);

        // Write the depth of an occluder at y=5 straight below the light by
        // projecting it and stamping its depth into the whole buffer.
        let occluder = Vec3::new(0.0, 5.0, 0.0);
        let ndc = vp.transform_point(occluder).perspective_divide();
        map.depth.depths.fill(ndc.z);

        // The occluder itself is lit (its depth matches within the bias)...
        assert_eq!(map.visibility(occluder, 0.005), 1.0);
        // ...a point below it is shadowed.
        assert_eq!(map.visibility(Vec3::ZERO, 0.005), 0.0);
    }
}
