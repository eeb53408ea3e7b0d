//! Vector and matrix math for the rendering pipeline.
//!
//! Everything is plain `f32`. Nothing here normalizes implicitly; callers
//! normalize light directions and surface normals where the lighting math
//! requires it.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn len(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Vec3 {
        let l = self.len();
        if l == 0.0 {
            return Vec3::ZERO;
        }
        Vec3 {
            x: self.x / l,
            y: self.y / l,
            z: self.z / l,
        }
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        self + (other - self) * t
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        self.scale(s)
    }
}

/// 2D vector (texture coordinates)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2 { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2 { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: f32) -> Vec2 {
        Vec2 { x: self.x * s, y: self.y * s }
    }
}

/// Homogeneous 4D vector (clip-space positions)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_point(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z, w: 1.0 }
    }

    pub fn xyz(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Perspective divide into normalized device coordinates.
    /// The caller must guarantee `w != 0` (the clipper does).
    pub fn perspective_divide(self) -> Vec3 {
        Vec3::new(self.x / self.w, self.y / self.w, self.z / self.w)
    }

    pub fn lerp(self, other: Vec4, t: f32) -> Vec4 {
        Vec4 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
            w: self.w + (other.w - self.w) * t,
        }
    }
}

/// Row-major 4x4 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = [[0.0f32; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.0[r][k] * rhs.0[k][c]).sum();
            }
        }
        Mat4(out)
    }

    pub fn transform(&self, v: Vec4) -> Vec4 {
        let m = &self.0;
        Vec4 {
            x: m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z + m[0][3] * v.w,
            y: m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z + m[1][3] * v.w,
            z: m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z + m[2][3] * v.w,
            w: m[3][0] * v.x + m[3][1] * v.y + m[3][2] * v.z + m[3][3] * v.w,
        }
    }

    /// Transform a position (w = 1), keeping the homogeneous result.
    pub fn transform_point(&self, v: Vec3) -> Vec4 {
        self.transform(Vec4::from_point(v))
    }

    /// Transform a direction (w = 0), dropping the homogeneous component.
    pub fn transform_dir(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        Vec3 {
            x: m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            y: m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            z: m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        }
    }

    pub fn translation(t: Vec3) -> Mat4 {
        Mat4([
            [1.0, 0.0, 0.0, t.x],
            [0.0, 1.0, 0.0, t.y],
            [0.0, 0.0, 1.0, t.z],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_x(a: f32) -> Mat4 {
        let (s, c) = a.sin_cos();
        Mat4([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, c, -s, 0.0],
            [0.0, s, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_y(a: f32) -> Mat4 {
        let (s, c) = a.sin_cos();
        Mat4([
            [c, 0.0, s, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-s, 0.0, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_z(a: f32) -> Mat4 {
        let (s, c) = a.sin_cos();
        Mat4([
            [c, -s, 0.0, 0.0],
            [s, c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Model matrix: rotate around `pivot` (Z * Y * X order), then translate.
    pub fn model(position: Vec3, rotation: Vec3, pivot: Vec3) -> Mat4 {
        let rot = Mat4::rotation_z(rotation.z)
            .mul(&Mat4::rotation_y(rotation.y))
            .mul(&Mat4::rotation_x(rotation.x));
        Mat4::translation(position + pivot)
            .mul(&rot)
            .mul(&Mat4::translation(Vec3::ZERO - pivot))
    }

    /// View matrix looking from `eye` toward `target`. The camera looks down
    /// view-space +z; the result is always orthonormal (rotation + translation
    /// only). A forward vector parallel to `up` falls back to a +z up axis so
    /// straight-down lights still get a valid basis.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let mut right = up.cross(forward);
        if right.len() < 1e-6 {
            right = Vec3::new(0.0, 0.0, 1.0).cross(forward);
        }
        let right = right.normalize();
        let up = forward.cross(right);
        Mat4([
            [right.x, right.y, right.z, -right.dot(eye)],
            [up.x, up.y, up.z, -up.dot(eye)],
            [forward.x, forward.y, forward.z, -forward.dot(eye)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Perspective projection for a +z-forward view space, mapping the
    /// frustum to the canonical clip volume (|x|,|y|,|z| <= w, NDC in
    /// [-1,1] on all axes).
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let f = 1.0 / (fov_y * 0.5).tan();
        let range = far - near;
        Mat4([
            [f / aspect, 0.0, 0.0, 0.0],
            [0.0, f, 0.0, 0.0],
            [0.0, 0.0, (far + near) / range, -2.0 * far * near / range],
            [0.0, 0.0, 1.0, 0.0],
        ])
    }
}

/// Row-major 3x3 matrix (normal transforms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3(pub [[f32; 3]; 3]);

impl Mat3 {
    pub fn transform(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        Vec3 {
            x: m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            y: m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            z: m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        }
    }

    /// Normal matrix for a model transform: inverse-transpose of the upper
    /// 3x3, so normals stay perpendicular under non-uniform scale. A
    /// near-singular matrix returns the upper 3x3 unchanged; callers
    /// normalize the result anyway.
    pub fn normal_matrix(m: &Mat4) -> Mat3 {
        let a = [
            [m.0[0][0], m.0[0][1], m.0[0][2]],
            [m.0[1][0], m.0[1][1], m.0[1][2]],
            [m.0[2][0], m.0[2][1], m.0[2][2]],
        ];
        let cof = |r: usize, c: usize| -> f32 {
            let (r0, r1) = ((r + 1) % 3, (r + 2) % 3);
            let (c0, c1) = ((c + 1) % 3, (c + 2) % 3);
            a[r0][c0] * a[r1][c1] - a[r0][c1] * a[r1][c0]
        };
        let det = a[0][0] * cof(0, 0) + a[0][1] * cof(0, 1) + a[0][2] * cof(0, 2);
        if det.abs() < 1e-12 {
            return Mat3(a);
        }
        // Inverse-transpose == cofactor matrix / det (no extra transpose).
        let inv_det = 1.0 / det;
        Mat3([
            [cof(0, 0) * inv_det, cof(0, 1) * inv_det, cof(0, 2) * inv_det],
            [cof(1, 0) * inv_det, cof(1, 1) * inv_det, cof(1, 2) * inv_det],
            [cof(2, 0) * inv_det, cof(2, 1) * inv_det, cof(2, 2) * inv_det],
        ])
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing a set of points.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Aabb::new(
            Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        );
        for p in points {
            aabb.expand(*p);
        }
        aabb
    }

    pub fn expand(&mut self, p: Vec3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            Vec3::new(mn.x, mn.y, mn.z),
            Vec3::new(mx.x, mn.y, mn.z),
            Vec3::new(mn.x, mx.y, mn.z),
            Vec3::new(mx.x, mx.y, mn.z),
            Vec3::new(mn.x, mn.y, mx.z),
            Vec3::new(mx.x, mn.y, mx.z),
            Vec3::new(mn.x, mx.y, mx.z),
            Vec3::new(mx.x, mx.y, mx.z),
        ]
    }
}

/// Ray/AABB intersection (slab method). Returns the entry distance along the
/// ray, or `None` when the ray misses.
pub fn ray_aabb_intersect(origin: Vec3, dir: Vec3, aabb: &Aabb) -> Option<f32> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    let origins = [origin.x, origin.y, origin.z];
    let dirs = [dir.x, dir.y, dir.z];
    let mins = [aabb.min.x, aabb.min.y, aabb.min.z];
    let maxs = [aabb.max.x, aabb.max.y, aabb.max.z];
    for axis in 0..3 {
        if dirs[axis].abs() < 1e-9 {
            if origins[axis] < mins[axis] || origins[axis] > maxs[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dirs[axis];
        let t0 = (mins[axis] - origins[axis]) * inv;
        let t1 = (maxs[axis] - origins[axis]) * inv;
        let (t0, t1) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        return None;
    }
    Some(t_min.max(0.0))
}

/// Ray/triangle intersection (Moller-Trumbore). Returns the distance along
/// the ray when it hits.
pub fn ray_triangle_intersect(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<f32> {
    const EPSILON: f32 = 0.0000001;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray_dir.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray_origin - v0;
    let u = f * s.dot(h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray_dir.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert!((a.dot(b) - 32.0).abs() < 0.001);
    }

    #[test]
    fn test_vec3_cross() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        let c = a.cross(b);
        assert!((c.z - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_look_at_orthonormal() {
        let view = Mat4::look_at(Vec3::new(3.0, 2.0, -5.0), Vec3::ZERO, Vec3::UP);
        let rows: Vec<Vec3> = (0..3)
            .map(|r| Vec3::new(view.0[r][0], view.0[r][1], view.0[r][2]))
            .collect();
        for r in &rows {
            assert!((r.len() - 1.0).abs() < 1e-5);
        }
        assert!(rows[0].dot(rows[1]).abs() < 1e-5);
        assert!(rows[0].dot(rows[2]).abs() < 1e-5);
        assert!(rows[1].dot(rows[2]).abs() < 1e-5);
    }

    #[test]
    fn test_look_at_straight_down() {
        // A light hovering above its target looks straight down; the basis
        // must still be valid.
        let view = Mat4::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::UP);
        let fwd = Vec3::new(view.0[2][0], view.0[2][1], view.0[2][2]);
        assert!((fwd.len() - 1.0).abs() < 1e-5);
        assert!((fwd.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_perspective_maps_frustum_to_ndc_cube() {
        let proj = Mat4::perspective(60f32.to_radians(), 4.0 / 3.0, 1.0, 100.0);
        // Points safely inside the frustum land in [-1,1]^3 after divide.
        for &(x, y, z) in &[(0.0, 0.0, 2.0), (0.5, 0.3, 5.0), (-3.0, 2.0, 50.0), (0.0, 0.0, 99.0)] {
            let ndc = proj.transform_point(Vec3::new(x, y, z)).perspective_divide();
            assert!(ndc.x.abs() <= 1.0, "ndc.x out of range: {:?}", ndc);
            assert!(ndc.y.abs() <= 1.0, "ndc.y out of range: {:?}", ndc);
            assert!(ndc.z.abs() <= 1.0, "ndc.z out of range: {:?}", ndc);
        }
        // Near and far plane map to -1 and +1.
        let near = proj.transform_point(Vec3::new(0.0, 0.0, 1.0)).perspective_divide();
        let far = proj.transform_point(Vec3::new(0.0, 0.0, 100.0)).perspective_divide();
        assert!((near.z + 1.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_model_matrix_matches_pivot_rotation() {
        // Rotate 90 degrees around Y about a pivot at (1,0,0).
        let m = Mat4::model(
            Vec3::ZERO,
            Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let p = m.transform_point(Vec3::new(2.0, 0.0, 0.0)).xyz();
        // (2,0,0) is one unit +x from the pivot; after +90deg yaw it sits one
        // unit -z from the pivot.
        assert!((p.x - 1.0).abs() < 1e-5);
        assert!((p.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normal_matrix_nonuniform_scale() {
        // Scale x by 2: a 45-degree surface normal must be re-perpendicularized,
        // not just scaled along with the surface.
        let scale = Mat4([
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let nm = Mat3::normal_matrix(&scale);
        let n = nm.transform(Vec3::new(1.0, 1.0, 0.0)).normalize();
        // Surface tangent (1,-1,0) becomes (2,-1,0); the transformed normal
        // must stay perpendicular to it.
        let tangent = scale.transform_dir(Vec3::new(1.0, -1.0, 0.0));
        assert!(n.dot(tangent).abs() < 1e-5);
    }

    #[test]
    fn test_ray_aabb() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let hit = ray_aabb_intersect(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), &aabb);
        assert!((hit.unwrap() - 4.0).abs() < 1e-5);
        let miss = ray_aabb_intersect(Vec3::new(0.0, 5.0, -5.0), Vec3::new(0.0, 0.0, 1.0), &aabb);
        assert!(miss.is_none());
    }

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let v0 = Vec3::new(-1.0, -1.0, 2.0);
        let v1 = Vec3::new(1.0, -1.0, 2.0);
        let v2 = Vec3::new(0.0, 1.0, 2.0);
        let hit = ray_triangle_intersect(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), v0, v1, v2);
        assert!((hit.unwrap() - 2.0).abs() < 1e-5);
        let miss = ray_triangle_intersect(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), v0, v1, v2);
        assert!(miss.is_none());
    }
}
