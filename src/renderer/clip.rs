//! Homogeneous clip-space clipping.
//!
//! Triangles are clipped after projection but before the perspective divide,
//! so W still carries the view depth. The clip volume is the canonical cube
//! `|x|,|y|,|z| <= w`. Clipping here instead of view space keeps the planes
//! fixed regardless of projection parameters, and near-plane clipping is what
//! makes the later divide by W safe.

use super::math::{Vec2, Vec3, Vec4};

/// A vertex in homogeneous clip space with the varyings the rasterizer
/// interpolates. All attributes are interpolated in the same parametric space
/// as the position when an edge crosses a plane.
#[derive(Debug, Clone, Copy)]
pub struct ClipVertex {
    /// Position in clip space, before the perspective divide.
    pub pos: Vec4,
    /// World-space position (shadow lookups, point-light directions).
    pub world: Vec3,
    /// World-space surface normal. Not normalized here; the lighter does it.
    pub normal: Vec3,
    /// Texture coordinates.
    pub uv: Vec2,
}

impl ClipVertex {
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            pos: self.pos.lerp(other.pos, t),
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
            uv: self.uv.lerp(other.uv, t),
        }
    }
}

/// The six planes of the canonical clip volume. Signed distance is >= 0
/// inside; the half-spaces are closed, so geometry exactly on a plane stays.
#[derive(Debug, Clone, Copy)]
enum ClipPlane {
    Left,
    Right,
    Bottom,
    Top,
    Near,
    Far,
}

const PLANES: [ClipPlane; 6] = [
    ClipPlane::Near,
    ClipPlane::Far,
    ClipPlane::Left,
    ClipPlane::Right,
    ClipPlane::Bottom,
    ClipPlane::Top,
];

impl ClipPlane {
    fn signed_distance(self, v: &ClipVertex) -> f32 {
        self.distance(v.pos)
    }

    fn distance(self, p: Vec4) -> f32 {
        match self {
            ClipPlane::Left => p.w + p.x,
            ClipPlane::Right => p.w - p.x,
            ClipPlane::Bottom => p.w + p.y,
            ClipPlane::Top => p.w - p.y,
            ClipPlane::Near => p.w + p.z,
            ClipPlane::Far => p.w - p.z,
        }
    }
}

/// Coarse frustum culling: true when a set of clip-space points (typically
/// the 8 corners of a bounding box) lies entirely outside one frustum plane.
pub fn points_outside_frustum(points: &[Vec4]) -> bool {
    PLANES
        .iter()
        .any(|plane| points.iter().all(|p| plane.distance(*p) < 0.0))
}

/// Polygon capacity: a triangle clipped by 6 planes gains at most one vertex
/// per plane.
const MAX_POLY: usize = 9;

/// Clip one triangle against all six frustum planes (Sutherland-Hodgman) and
/// re-triangulate the surviving convex polygon as a fan from its first
/// vertex. Returns the number of triangles written into `out`.
///
/// A polygon that ends up fully outside any plane short-circuits to zero.
pub fn clip_triangle(
    v0: ClipVertex,
    v1: ClipVertex,
    v2: ClipVertex,
    out: &mut Vec<[ClipVertex; 3]>,
) -> usize {
    let mut poly = [v0; MAX_POLY];
    poly[1] = v1;
    poly[2] = v2;
    let mut len = 3;

    // Common case: fully inside, no plane crossed.
    if PLANES
        .iter()
        .all(|p| poly[..3].iter().all(|v| p.signed_distance(v) >= 0.0))
    {
        out.push([v0, v1, v2]);
        return 1;
    }

    let mut scratch = [v0; MAX_POLY];
    for plane in PLANES {
        len = clip_against_plane(&poly[..len], plane, &mut scratch);
        if len < 3 {
            return 0;
        }
        poly[..len].copy_from_slice(&scratch[..len]);
    }

    let produced = len - 2;
    for i in 1..len - 1 {
        out.push([poly[0], poly[i], poly[i + 1]]);
    }
    produced
}

fn clip_against_plane(poly: &[ClipVertex], plane: ClipPlane, out: &mut [ClipVertex; MAX_POLY]) -> usize {
    let mut count = 0;
    for i in 0..poly.len() {
        let current = &poly[i];
        let next = &poly[(i + 1) % poly.len()];

        let d1 = plane.signed_distance(current);
        let d2 = plane.signed_distance(next);

        if d1 >= 0.0 {
            out[count] = *current;
            count += 1;
            if d2 < 0.0 {
                // Leaving the half-space: emit the crossing point.
                let t = d1 / (d1 - d2);
                out[count] = current.lerp(next, t);
                count += 1;
            }
        } else if d2 >= 0.0 {
            // Entering the half-space.
            let t = d1 / (d1 - d2);
            out[count] = current.lerp(next, t);
            count += 1;
        }
    }
    count
}
