//! Triangle rasterization: edge-function coverage with a top-left fill rule,
//! perspective-correct interpolation, and an integrated depth test.
//!
//! Input triangles are post-clip and post-perspective-divide. Each vertex
//! carries `1/w` and every varying pre-divided by w; the rasterizer
//! interpolates those linearly in screen space and divides back per fragment,
//! which is the perspective-correct formulation (naive screen-space lerp of
//! the raw attributes warps under perspective).

use super::clip::ClipVertex;
use super::framebuffer::{Band, DepthBuffer};
use super::light::Shading;
use super::math::{Vec2, Vec3};
use super::texture::{Color, Texture};

/// A vertex in screen space, ready for rasterization. `x`/`y` are pixel
/// coordinates, `z` is NDC depth, and the varyings are already divided by
/// the clip-space w.
#[derive(Debug, Clone, Copy)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub inv_w: f32,
    pub uv: Vec2,
    pub normal: Vec3,
    pub world: Vec3,
}

impl ScreenVertex {
    /// Viewport transform. The clipper guarantees w > 0 for surviving
    /// geometry; anything that slips through with a vanishing w is dropped.
    pub fn from_clip(v: &ClipVertex, width: usize, height: usize) -> Option<Self> {
        let w = v.pos.w;
        if w < 1e-6 {
            return None;
        }
        let inv_w = 1.0 / w;
        let ndc = v.pos.perspective_divide();
        Some(Self {
            x: (ndc.x + 1.0) * 0.5 * width as f32,
            y: (1.0 - ndc.y) * 0.5 * height as f32,
            z: ndc.z,
            inv_w,
            uv: v.uv * inv_w,
            normal: v.normal * inv_w,
            world: v.world * inv_w,
        })
    }
}

/// A screen triangle with its texture handle, as queued for the raster stage.
pub struct ScreenTriangle {
    pub v: [ScreenVertex; 3],
    pub texture: Option<usize>,
}

/// Signed-area edge function: positive when p is on the interior side of the
/// directed edge a->b for front-facing winding.
#[inline]
fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (by - ay) * (px - ax) - (bx - ax) * (py - ay)
}

/// Top-left rule: pixels exactly on an edge belong to the triangle only if
/// the edge is a top edge (horizontal, pointing -x) or a left edge
/// (pointing +y in screen coordinates). One consistent owner per shared edge.
#[inline]
fn is_top_left(ax: f32, ay: f32, bx: f32, by: f32) -> bool {
    let dx = bx - ax;
    let dy = by - ay;
    (dy == 0.0 && dx < 0.0) || dy > 0.0
}

struct TriSetup {
    /// Edge i runs opposite vertex i, so edge values map straight to
    /// barycentric weights.
    edges: [(f32, f32, f32, f32); 3],
    top_left: [bool; 3],
    inv_area: f32,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

/// Triangle setup: winding check and viewport-clamped bounding box.
/// Returns `None` for backfacing or zero-area triangles; both are silently
/// rejected, never an error.
fn setup(v: &[ScreenVertex; 3], width: usize, height: usize) -> Option<TriSetup> {
    let area = edge(v[0].x, v[0].y, v[1].x, v[1].y, v[2].x, v[2].y);
    if area <= 0.0 {
        return None;
    }

    let min_xf = v[0].x.min(v[1].x).min(v[2].x);
    let max_xf = v[0].x.max(v[1].x).max(v[2].x);
    let min_yf = v[0].y.min(v[1].y).min(v[2].y);
    let max_yf = v[0].y.max(v[1].y).max(v[2].y);
    if max_xf < 0.0 || max_yf < 0.0 || min_xf >= width as f32 || min_yf >= height as f32 {
        return None;
    }

    Some(TriSetup {
        edges: [
            (v[1].x, v[1].y, v[2].x, v[2].y),
            (v[2].x, v[2].y, v[0].x, v[0].y),
            (v[0].x, v[0].y, v[1].x, v[1].y),
        ],
        top_left: [
            is_top_left(v[1].x, v[1].y, v[2].x, v[2].y),
            is_top_left(v[2].x, v[2].y, v[0].x, v[0].y),
            is_top_left(v[0].x, v[0].y, v[1].x, v[1].y),
        ],
        inv_area: 1.0 / area,
        // Clamp to the viewport in float space so the exclusive upper bound
        // never overflows, whatever coordinates a caller passes in.
        min_x: min_xf.floor().max(0.0) as usize,
        max_x: max_xf.ceil().min(width as f32 - 1.0).max(0.0) as usize + 1,
        min_y: min_yf.floor().max(0.0) as usize,
        max_y: max_yf.ceil().min(height as f32 - 1.0).max(0.0) as usize + 1,
    })
}

impl TriSetup {
    /// Coverage test at a pixel center; returns barycentric weights when
    /// covered.
    #[inline]
    fn coverage(&self, px: f32, py: f32) -> Option<[f32; 3]> {
        let mut w = [0.0f32; 3];
        for i in 0..3 {
            let (ax, ay, bx, by) = self.edges[i];
            let e = edge(ax, ay, bx, by, px, py);
            if e < 0.0 || (e == 0.0 && !self.top_left[i]) {
                return None;
            }
            w[i] = e;
        }
        Some([
            w[0] * self.inv_area,
            w[1] * self.inv_area,
            w[2] * self.inv_area,
        ])
    }
}

/// Per-fragment interpolation result.
pub struct Fragment {
    pub z: f32,
    pub uv: Vec2,
    pub normal: Vec3,
    pub world: Vec3,
}

/// Perspective-correct interpolation: NDC depth interpolates linearly in
/// screen space; every other attribute interpolates as `attr/w` against an
/// interpolated `1/w`, then divides.
pub fn interpolate(v: &[ScreenVertex; 3], b: [f32; 3]) -> Fragment {
    let z = b[0] * v[0].z + b[1] * v[1].z + b[2] * v[2].z;
    let inv_w = b[0] * v[0].inv_w + b[1] * v[1].inv_w + b[2] * v[2].inv_w;
    let w = 1.0 / inv_w;
    let uv = (v[0].uv * b[0] + v[1].uv * b[1] + v[2].uv * b[2]) * w;
    let normal = (v[0].normal * b[0] + v[1].normal * b[1] + v[2].normal * b[2]) * w;
    let world = (v[0].world * b[0] + v[1].world * b[1] + v[2].world * b[2]) * w;
    Fragment { z, uv, normal, world }
}

/// Rasterize one triangle into a framebuffer band, shading every covered
/// pixel that survives the depth test. The band owns its rows exclusively;
/// rows outside it are skipped.
pub fn rasterize_color(
    tri: &ScreenTriangle,
    band: &mut Band<'_>,
    texture: Option<&Texture>,
    shading: &Shading<'_>,
) {
    let full_height = band.y_start + band.rows;
    let Some(setup) = setup(&tri.v, band.width, full_height) else {
        return;
    };

    let y0 = setup.min_y.max(band.y_start);
    let y1 = setup.max_y.min(full_height);

    for y in y0..y1 {
        let py = y as f32 + 0.5;
        let local_y = y - band.y_start;
        for x in setup.min_x..setup.max_x {
            let px = x as f32 + 0.5;
            let Some(bary) = setup.coverage(px, py) else {
                continue;
            };
            let frag = interpolate(&tri.v, bary);
            let idx = local_y * band.width + x;
            if frag.z >= band.zbuffer[idx] {
                continue;
            }
            let base = match texture {
                Some(tex) => tex.sample(frag.uv.x, frag.uv.y),
                None => Color::WHITE,
            };
            let shade = shading.shade(frag.world, frag.normal);
            let color = base.shade(shade);
            band.zbuffer[idx] = frag.z;
            band.pixels[idx * 4..idx * 4 + 4].copy_from_slice(&color.to_bytes());
        }
    }
}

/// Depth-only rasterization for shadow-map generation: no color, no texture,
/// just the nearest depth per texel.
pub fn rasterize_depth(v: &[ScreenVertex; 3], depth: &mut DepthBuffer) {
    let size = depth.size;
    let Some(setup) = setup(v, size, size) else {
        return;
    };

    for y in setup.min_y..setup.max_y {
        let py = y as f32 + 0.5;
        for x in setup.min_x..setup.max_x {
            let px = x as f32 + 0.5;
            let Some(bary) = setup.coverage(px, py) else {
                continue;
            };
            let z = bary[0] * v[0].z + bary[1] * v[1].z + bary[2] * v[2].z;
            depth.test_and_write(x, y, z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::framebuffer::Framebuffer;

    fn flat_vertex(x: f32, y: f32, z: f32, inv_w: f32, uv: Vec2) -> ScreenVertex {
        ScreenVertex {
            x,
            y,
            z,
            inv_w,
            uv: uv * inv_w,
            normal: Vec3::UP * inv_w,
            world: Vec3::ZERO,
        }
    }

    fn no_lights() -> Shading<'static> {
        Shading {
            lights: Vec::new(),
            ambient: 1.0,
            intensity: 0.0,
            shadow_bias: 0.005,
        }
    }

    fn raster_into(fb: &mut Framebuffer, tri: &ScreenTriangle) {
        let shading = no_lights();
        let height = fb.height;
        for band in &mut fb.bands(height) {
            rasterize_color(tri, band, None, &shading);
        }
    }

    fn covered(fb: &Framebuffer, x: usize, y: usize) -> bool {
        fb.pixels[(y * fb.width + x) * 4] != 0
    }

    #[test]
    fn test_interior_and_exterior_coverage() {
        let mut fb = Framebuffer::new(100, 100);
        fb.clear(Color::BLACK);
        // Screen triangle (25,75) (75,75) (50,25): front-facing winding.
        let tri = ScreenTriangle {
            v: [
                flat_vertex(25.0, 75.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(75.0, 75.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(50.0, 25.0, 0.5, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        // Winding check: must not be backface-culled.
        raster_into(&mut fb, &tri);
        assert!(covered(&fb, 50, 60), "interior pixel not covered");
        assert!(covered(&fb, 50, 30), "pixel near apex not covered");
        assert!(!covered(&fb, 10, 10), "exterior pixel covered");
        assert!(!covered(&fb, 50, 80), "pixel below base covered");
    }

    #[test]
    fn test_backfacing_triangle_rejected() {
        let mut fb = Framebuffer::new(100, 100);
        fb.clear(Color::BLACK);
        // Same triangle with two vertices swapped: opposite winding.
        let tri = ScreenTriangle {
            v: [
                flat_vertex(75.0, 75.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(25.0, 75.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(50.0, 25.0, 0.5, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        raster_into(&mut fb, &tri);
        assert!(fb.pixels.chunks_exact(4).all(|p| p[0] == 0));
    }

    #[test]
    fn test_degenerate_triangle_rejected_silently() {
        let mut fb = Framebuffer::new(50, 50);
        fb.clear(Color::BLACK);
        let tri = ScreenTriangle {
            v: [
                flat_vertex(10.0, 10.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(30.0, 30.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(20.0, 20.0, 0.5, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        raster_into(&mut fb, &tri);
        assert!(fb.pixels.chunks_exact(4).all(|p| p[0] == 0));
    }

    #[test]
    fn test_shared_edge_single_owner_no_gap() {
        // Square split along the diagonal d-b; no pixel may be covered by
        // both triangles, and no interior pixel may be missed.
        let a = (10.0, 10.0);
        let b = (90.0, 10.0);
        let c = (90.0, 90.0);
        let d = (10.0, 90.0);
        let tri1 = ScreenTriangle {
            v: [
                flat_vertex(a.0, a.1, 0.5, 1.0, Vec2::default()),
                flat_vertex(d.0, d.1, 0.5, 1.0, Vec2::default()),
                flat_vertex(b.0, b.1, 0.5, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        let tri2 = ScreenTriangle {
            v: [
                flat_vertex(b.0, b.1, 0.5, 1.0, Vec2::default()),
                flat_vertex(d.0, d.1, 0.5, 1.0, Vec2::default()),
                flat_vertex(c.0, c.1, 0.5, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        let mut fb1 = Framebuffer::new(100, 100);
        let mut fb2 = Framebuffer::new(100, 100);
        fb1.clear(Color::BLACK);
        fb2.clear(Color::BLACK);
        raster_into(&mut fb1, &tri1);
        raster_into(&mut fb2, &tri2);

        for y in 11..89 {
            for x in 11..89 {
                let c1 = covered(&fb1, x, y);
                let c2 = covered(&fb2, x, y);
                assert!(!(c1 && c2), "double-covered pixel at ({}, {})", x, y);
                assert!(c1 || c2, "gap at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_equal_depth_keeps_first_submitted() {
        let mk = |z: f32| ScreenTriangle {
            v: [
                flat_vertex(10.0, 80.0, z, 1.0, Vec2::default()),
                flat_vertex(90.0, 80.0, z, 1.0, Vec2::default()),
                flat_vertex(50.0, 10.0, z, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        let shading = no_lights();
        let red = Texture::solid(1, 1, Color::RED);
        let green = Texture::solid(1, 1, Color::GREEN);

        let mut fb = Framebuffer::new(100, 100);
        fb.clear(Color::BLACK);
        for band in &mut fb.bands(100) {
            rasterize_color(&mk(0.5), band, Some(&red), &shading);
            // Same depth everywhere: the incumbent stays.
            rasterize_color(&mk(0.5), band, Some(&green), &shading);
        }
        let idx = (50 * 100 + 50) * 4;
        assert_eq!(&fb.pixels[idx..idx + 3], &[255, 0, 0]);
        // A strictly nearer fragment still replaces it.
        for band in &mut fb.bands(100) {
            rasterize_color(&mk(0.4), band, Some(&green), &shading);
        }
        assert_eq!(&fb.pixels[idx..idx + 3], &[0, 255, 0]);
    }

    #[test]
    fn test_huge_extent_clamps_to_viewport() {
        // A triangle reaching billions of pixels off-screen must clamp its
        // bounding box instead of overflowing, and still fill the viewport
        // pixels it covers.
        let mut fb = Framebuffer::new(32, 32);
        fb.clear(Color::BLACK);
        let tri = ScreenTriangle {
            v: [
                flat_vertex(-10.0, -10.0, 0.5, 1.0, Vec2::default()),
                flat_vertex(-10.0, 3.0e9, 0.5, 1.0, Vec2::default()),
                flat_vertex(3.0e9, -10.0, 0.5, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        raster_into(&mut fb, &tri);
        assert!(covered(&fb, 5, 5));
        assert!(covered(&fb, 31, 31));
    }

    #[test]
    fn test_perspective_correct_uv_differs_from_affine() {
        // Right-angled triangle viewed at a steep angle: v1 is ten times as
        // far as the others (inv_w 0.1).
        let v = [
            flat_vertex(0.0, 0.0, 0.1, 1.0, Vec2::new(0.0, 0.0)),
            flat_vertex(100.0, 0.0, 0.9, 0.1, Vec2::new(1.0, 0.0)),
            flat_vertex(0.0, 100.0, 0.1, 1.0, Vec2::new(0.0, 1.0)),
        ];
        let b = [0.5, 0.5, 0.0]; // midpoint of the v0-v1 edge in screen space
        let frag = interpolate(&v, b);
        // Perspective-correct: (0.5 * u1/w1) / (0.5/w0 + 0.5/w1)
        let expected = (0.5 * 1.0 * 0.1) / (0.5 * 1.0 + 0.5 * 0.1);
        assert!((frag.uv.x - expected).abs() < 1e-5, "uv.x = {}", frag.uv.x);
        // Naive screen-space lerp would give 0.5; the two must clearly differ.
        assert!((frag.uv.x - 0.5).abs() > 0.1);
    }

    #[test]
    fn test_depth_test_nearest_wins_regardless_of_order() {
        let mk = |z: f32| ScreenTriangle {
            v: [
                flat_vertex(10.0, 80.0, z, 1.0, Vec2::default()),
                flat_vertex(90.0, 80.0, z, 1.0, Vec2::default()),
                flat_vertex(50.0, 10.0, z, 1.0, Vec2::default()),
            ],
            texture: None,
        };
        let near = mk(0.2);
        let far = mk(0.8);

        let shading = no_lights();
        let red = Texture::solid(1, 1, Color::RED);
        let green = Texture::solid(1, 1, Color::GREEN);

        let mut order_a = Framebuffer::new(100, 100);
        order_a.clear(Color::BLACK);
        for band in &mut order_a.bands(100) {
            rasterize_color(&near, band, Some(&red), &shading);
            rasterize_color(&far, band, Some(&green), &shading);
        }

        let mut order_b = Framebuffer::new(100, 100);
        order_b.clear(Color::BLACK);
        for band in &mut order_b.bands(100) {
            rasterize_color(&far, band, Some(&green), &shading);
            rasterize_color(&near, band, Some(&red), &shading);
        }

        assert_eq!(order_a.pixels, order_b.pixels);
        assert_eq!(order_a.zbuffer, order_b.zbuffer);
        assert_eq!(&order_a.pixels[(50 * 100 + 50) * 4..(50 * 100 + 50) * 4 + 3], &[255, 0, 0]);
    }

    #[test]
    fn test_depth_only_pass_writes_nearest() {
        let mut depth = DepthBuffer::new(64);
        let v_far = [
            flat_vertex(5.0, 60.0, 0.9, 1.0, Vec2::default()),
            flat_vertex(60.0, 60.0, 0.9, 1.0, Vec2::default()),
            flat_vertex(30.0, 5.0, 0.9, 1.0, Vec2::default()),
        ];
        let v_near = [
            flat_vertex(5.0, 60.0, 0.3, 1.0, Vec2::default()),
            flat_vertex(60.0, 60.0, 0.3, 1.0, Vec2::default()),
            flat_vertex(30.0, 5.0, 0.3, 1.0, Vec2::default()),
        ];
        rasterize_depth(&v_far, &mut depth);
        rasterize_depth(&v_near, &mut depth);
        assert!((depth.depth_at(30, 40) - 0.3).abs() < 1e-5);
    }
}
