//! Color + depth framebuffer and the depth-only buffer used by shadow maps.

use super::texture::Color;

/// Depth sentinel written by `clear`; any real fragment is nearer.
pub const DEPTH_FAR: f32 = f32::INFINITY;

/// Framebuffer for software rendering: RGBA color plus f32 depth.
pub struct Framebuffer {
    pub pixels: Vec<u8>,   // RGBA, 4 bytes per pixel
    pub zbuffer: Vec<f32>, // Depth buffer (NDC z)
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            zbuffer: vec![DEPTH_FAR; width * height],
            width,
            height,
        }
    }

    /// Reset color to the background and depth to the far sentinel.
    pub fn clear(&mut self, color: Color) {
        let bytes = color.to_bytes();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
        self.zbuffer.fill(DEPTH_FAR);
    }

    /// The color buffer, unchanged, for the display collaborator.
    pub fn present(&self) -> &[u8] {
        &self.pixels
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            self.pixels[idx..idx + 4].copy_from_slice(&color.to_bytes());
        }
    }

    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.zbuffer[y * self.width + x]
    }

    /// Split the buffers into disjoint horizontal bands so rasterizer workers
    /// can own their rows exclusively for the frame.
    pub fn bands(&mut self, rows_per_band: usize) -> Vec<Band<'_>> {
        let width = self.width;
        self.pixels
            .chunks_mut(rows_per_band * width * 4)
            .zip(self.zbuffer.chunks_mut(rows_per_band * width))
            .enumerate()
            .map(|(i, (pixels, zbuffer))| Band {
                y_start: i * rows_per_band,
                rows: zbuffer.len() / width,
                width,
                pixels,
                zbuffer,
            })
            .collect()
    }

    /// Draw a filled circle at (cx, cy). Debug gizmos only.
    pub fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Color) {
        let r_sq = radius * radius;
        for y in (cy - radius).max(0)..=(cy + radius).min(self.height as i32 - 1) {
            for x in (cx - radius).max(0)..=(cx + radius).min(self.width as i32 - 1) {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= r_sq {
                    self.set_pixel(x as usize, y as usize, color);
                }
            }
        }
    }

    /// Draw a line from (x0, y0) to (x1, y1) using Bresenham's algorithm.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let mut x = x0;
        let mut y = y0;

        loop {
            if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
                self.set_pixel(x as usize, y as usize, color);
            }

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draw a thick line by drawing multiple parallel lines.
    pub fn draw_thick_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, thickness: i32, color: Color) {
        if thickness <= 1 {
            self.draw_line(x0, y0, x1, y1, color);
            return;
        }

        let dx = (x1 - x0) as f32;
        let dy = (y1 - y0) as f32;
        let len = (dx * dx + dy * dy).sqrt();
        if len < 0.001 {
            return;
        }

        let px = -dy / len;
        let py = dx / len;

        let half_thickness = thickness / 2;
        for i in -half_thickness..=half_thickness {
            let offset = i as f32;
            let ox0 = (x0 as f32 + px * offset) as i32;
            let oy0 = (y0 as f32 + py * offset) as i32;
            let ox1 = (x1 as f32 + px * offset) as i32;
            let oy1 = (y1 as f32 + py * offset) as i32;
            self.draw_line(ox0, oy0, ox1, oy1, color);
        }
    }
}

/// One worker's exclusive slice of the framebuffer: `rows` rows starting at
/// screen row `y_start`.
pub struct Band<'a> {
    pub y_start: usize,
    pub rows: usize,
    pub width: usize,
    pub pixels: &'a mut [u8],
    pub zbuffer: &'a mut [f32],
}

/// Depth-only buffer, sized independently of the main framebuffer. Shadow
/// maps render into one of these.
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    pub depths: Vec<f32>,
    pub size: usize,
}

impl DepthBuffer {
    pub fn new(size: usize) -> Self {
        Self { depths: vec![DEPTH_FAR; size * size], size }
    }

    pub fn clear(&mut self) {
        self.depths.fill(DEPTH_FAR);
    }

    #[inline]
    pub fn test_and_write(&mut self, x: usize, y: usize, z: f32) {
        let idx = y * self.size + x;
        if z < self.depths[idx] {
            self.depths[idx] = z;
        }
    }

    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.depths[y * self.size + x]
    }
}
