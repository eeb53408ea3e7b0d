//! Scene: owns meshes, lights, textures, the camera and the framebuffer, and
//! drives the per-frame pipeline (transform, cull, clip, rasterize, present).
//!
//! All mutation goes through handle-based operations that validate before
//! touching state; per-request failures (bad handle, capacity) return an
//! error with the scene unchanged, while per-primitive failures (degenerate
//! or fully-clipped triangles) are absorbed and never abort a frame.

use log::{debug, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::RenderConfig;

use super::camera::Camera;
use super::clip::{clip_triangle, points_outside_frustum, ClipVertex};
use super::framebuffer::Framebuffer;
use super::light::{FrameLight, Light, Shading};
use super::math::{ray_aabb_intersect, ray_triangle_intersect, Aabb, Mat3, Mat4, Vec2, Vec3, Vec4};
use super::raster::{rasterize_color, rasterize_depth, ScreenTriangle, ScreenVertex};
use super::shadow::{light_view_proj, GENERATION_UNMAPPED};
use super::texture::{Color, Texture};

/// A vertex as supplied by the loader boundary: object-space position,
/// normal, and UV.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vertex {
    pub pos: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(pos: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { pos, normal, uv }
    }
}

/// A posed triangle mesh. Vertex and index buffers are immutable once added;
/// the transform and visibility fields mutate through scene operations.
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<[usize; 3]>,
    pub aabb: Aabb,
    pub position: Vec3,
    pub rotation: Vec3,
    pub pivot: Vec3,
    pub visible: bool,
    pub texture: Option<usize>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<[usize; 3]>, aabb: Aabb) -> Self {
        Self {
            vertices,
            indices,
            aabb,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            pivot: Vec3::ZERO,
            visible: true,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: usize) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::model(self.position, self.rotation, self.pivot)
    }

    /// Axis-aligned cube with per-face normals and UVs. Faces wind clockwise
    /// seen from outside, matching the rasterizer's front-face convention.
    pub fn cube(half: f32) -> Mesh {
        let face_positions = [
            // Front (+z)
            [
                Vec3::new(-half, -half, half),
                Vec3::new(half, -half, half),
                Vec3::new(half, half, half),
                Vec3::new(-half, half, half),
            ],
            // Back (-z)
            [
                Vec3::new(-half, -half, -half),
                Vec3::new(-half, half, -half),
                Vec3::new(half, half, -half),
                Vec3::new(half, -half, -half),
            ],
            // Top (+y)
            [
                Vec3::new(-half, half, -half),
                Vec3::new(-half, half, half),
                Vec3::new(half, half, half),
                Vec3::new(half, half, -half),
            ],
            // Bottom (-y)
            [
                Vec3::new(-half, -half, -half),
                Vec3::new(half, -half, -half),
                Vec3::new(half, -half, half),
                Vec3::new(-half, -half, half),
            ],
            // Right (+x)
            [
                Vec3::new(half, -half, -half),
                Vec3::new(half, half, -half),
                Vec3::new(half, half, half),
                Vec3::new(half, -half, half),
            ],
            // Left (-x)
            [
                Vec3::new(-half, -half, -half),
                Vec3::new(-half, -half, half),
                Vec3::new(-half, half, half),
                Vec3::new(-half, half, -half),
            ],
        ];
        let face_normals = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
        ];
        let uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(12);
        for (face, positions) in face_positions.iter().enumerate() {
            let normal = face_normals[face];
            for (i, &pos) in positions.iter().enumerate() {
                vertices.push(Vertex::new(pos, normal, uvs[i]));
            }
            let base = face * 4;
            indices.push([base, base + 2, base + 1]);
            indices.push([base, base + 3, base + 2]);
        }

        let aabb = Aabb::new(
            Vec3::new(-half, -half, -half),
            Vec3::new(half, half, half),
        );
        Mesh::new(vertices, indices, aabb)
    }

    /// Flat ground plane in the XZ plane facing +y.
    pub fn plane(half: f32) -> Mesh {
        let vertices = vec![
            Vertex::new(Vec3::new(-half, 0.0, -half), Vec3::UP, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(half, 0.0, -half), Vec3::UP, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(half, 0.0, half), Vec3::UP, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-half, 0.0, half), Vec3::UP, Vec2::new(0.0, 1.0)),
        ];
        let indices = vec![[0, 1, 2], [0, 2, 3]];
        let aabb = Aabb::new(Vec3::new(-half, 0.0, -half), Vec3::new(half, 0.0, half));
        Mesh::new(vertices, indices, aabb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(usize);

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("unknown mesh handle {0:?}")]
    InvalidMeshHandle(MeshId),
    #[error("unknown light handle {0:?}")]
    InvalidLightHandle(LightId),
    #[error("{what} capacity exceeded: {requested} > {limit}")]
    CapacityExceeded {
        what: &'static str,
        requested: usize,
        limit: usize,
    },
    #[error("triangle {triangle} references vertex {index}, but the mesh has {count} vertices")]
    InvalidIndices {
        triangle: usize,
        index: usize,
        count: usize,
    },
}

/// Per-frame pipeline counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    /// Triangles considered after mesh-level culling.
    pub triangles_submitted: usize,
    /// Triangles that survived clipping and entered the raster stage.
    pub triangles_emitted: usize,
    /// Triangles discarded by the per-frame budget.
    pub triangles_dropped: usize,
    /// Whole meshes rejected by the AABB frustum test.
    pub meshes_culled: usize,
}

pub struct Scene {
    config: RenderConfig,
    // Removed slots stay vacant. Handles are bare indices, so reusing a slot
    // would let a stale handle silently alias a later mesh or light; the
    // capacity limits bound live entries, not vector length.
    meshes: Vec<Option<Mesh>>,
    lights: Vec<Option<Light>>,
    textures: Vec<Texture>,
    pub camera: Camera,
    framebuffer: Framebuffer,
    triangle_total: usize,
    stats: FrameStats,
}

impl Scene {
    pub fn new(config: RenderConfig) -> Self {
        let framebuffer = Framebuffer::new(config.width, config.height);
        Self {
            config,
            meshes: Vec::new(),
            lights: Vec::new(),
            textures: Vec::new(),
            camera: Camera::new(),
            framebuffer,
            triangle_total: 0,
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    // ---- scene mutation ------------------------------------------------

    /// Register a texture and return its index. Meshes reference textures by
    /// index and never own them.
    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Add a mesh after validating its index buffer and the scene capacity
    /// limits. On error the scene is left unchanged.
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshId, SceneError> {
        let mesh_count = self.meshes.iter().flatten().count();
        if mesh_count + 1 > self.config.max_meshes {
            return Err(SceneError::CapacityExceeded {
                what: "mesh",
                requested: mesh_count + 1,
                limit: self.config.max_meshes,
            });
        }
        let tris = mesh.triangle_count();
        if self.triangle_total + tris > self.config.max_triangles {
            return Err(SceneError::CapacityExceeded {
                what: "triangle",
                requested: self.triangle_total + tris,
                limit: self.config.max_triangles,
            });
        }
        let count = mesh.vertices.len();
        for (triangle, idx) in mesh.indices.iter().enumerate() {
            for &index in idx {
                if index >= count {
                    return Err(SceneError::InvalidIndices { triangle, index, count });
                }
            }
        }

        self.triangle_total += tris;
        self.meshes.push(Some(mesh));
        let id = MeshId(self.meshes.len() - 1);
        debug!("added mesh {:?} ({} triangles)", id, tris);
        Ok(id)
    }

    pub fn remove_mesh(&mut self, id: MeshId) -> Result<(), SceneError> {
        let slot = self
            .meshes
            .get_mut(id.0)
            .ok_or(SceneError::InvalidMeshHandle(id))?;
        let mesh = slot.take().ok_or(SceneError::InvalidMeshHandle(id))?;
        self.triangle_total -= mesh.triangle_count();
        Ok(())
    }

    pub fn mesh(&self, id: MeshId) -> Result<&Mesh, SceneError> {
        self.meshes
            .get(id.0)
            .and_then(|m| m.as_ref())
            .ok_or(SceneError::InvalidMeshHandle(id))
    }

    fn mesh_mut(&mut self, id: MeshId) -> Result<&mut Mesh, SceneError> {
        self.meshes
            .get_mut(id.0)
            .and_then(|m| m.as_mut())
            .ok_or(SceneError::InvalidMeshHandle(id))
    }

    pub fn set_mesh_transform(
        &mut self,
        id: MeshId,
        position: Vec3,
        rotation: Vec3,
        pivot: Vec3,
    ) -> Result<(), SceneError> {
        let mesh = self.mesh_mut(id)?;
        mesh.position = position;
        mesh.rotation = rotation;
        mesh.pivot = pivot;
        Ok(())
    }

    pub fn set_mesh_position(&mut self, id: MeshId, position: Vec3) -> Result<(), SceneError> {
        self.mesh_mut(id)?.position = position;
        Ok(())
    }

    pub fn set_mesh_visible(&mut self, id: MeshId, visible: bool) -> Result<(), SceneError> {
        self.mesh_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn add_light(&mut self, position: Vec3, target: Vec3) -> Result<LightId, SceneError> {
        let count = self.lights.iter().flatten().count();
        if count + 1 > self.config.max_lights {
            return Err(SceneError::CapacityExceeded {
                what: "light",
                requested: count + 1,
                limit: self.config.max_lights,
            });
        }
        self.lights.push(Some(Light::new(
            position,
            target,
            self.config.shadow_map_size,
        )));
        Ok(LightId(self.lights.len() - 1))
    }

    pub fn remove_light(&mut self, id: LightId) -> Result<(), SceneError> {
        let slot = self
            .lights
            .get_mut(id.0)
            .ok_or(SceneError::InvalidLightHandle(id))?;
        slot.take().ok_or(SceneError::InvalidLightHandle(id))?;
        Ok(())
    }

    fn light_mut(&mut self, id: LightId) -> Result<&mut Light, SceneError> {
        self.lights
            .get_mut(id.0)
            .and_then(|l| l.as_mut())
            .ok_or(SceneError::InvalidLightHandle(id))
    }

    /// Move a light. Its shadow map becomes stale until `update_lights`.
    pub fn set_light_transform(
        &mut self,
        id: LightId,
        position: Vec3,
        target: Vec3,
    ) -> Result<(), SceneError> {
        let light = self.light_mut(id)?;
        light.position = position;
        light.target = target;
        light.generation += 1;
        Ok(())
    }

    pub fn set_light_active(&mut self, id: LightId, active: bool) -> Result<(), SceneError> {
        self.light_mut(id)?.active = active;
        Ok(())
    }

    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera.position = position;
    }

    pub fn set_camera_target(&mut self, target: Vec3) {
        self.camera.target = target;
    }

    pub fn move_camera(&mut self, forward: f32, right: f32, up: f32) {
        self.camera.move_by(forward, right, up);
    }

    pub fn rotate_camera(&mut self, yaw: f32, pitch: f32) {
        self.camera.rotate(yaw, pitch);
    }

    // ---- frame driving -------------------------------------------------

    /// Regenerate the shadow map of every active light: a depth-only pass
    /// over all visible meshes from the light's viewpoint. The depth buffer
    /// and the light view-projection matrix are committed together.
    pub fn update_lights(&mut self) {
        let size = self.config.shadow_map_size;
        let fov = self.config.shadow_fov();
        let (near, far) = (self.config.near, self.config.far);
        for i in 0..self.lights.len() {
            let Some(light) = &self.lights[i] else { continue };
            if !light.active {
                continue;
            }
            let (position, target, generation) = (light.position, light.target, light.generation);
            let view_proj = light_view_proj(position, target, fov, near, far);
            let (tris, _) = self.collect_triangles(&view_proj, size, size, self.config.max_triangles);

            let Some(light) = self.lights[i].as_mut() else { continue };
            light.shadow.begin_generation(view_proj, generation);
            for tri in &tris {
                rasterize_depth(&tri.v, &mut light.shadow.depth);
            }
        }
    }

    /// Render all visible meshes into the framebuffer: clear, transform,
    /// cull, clip, then rasterize in parallel over disjoint framebuffer
    /// bands. Scene edits during the frame are impossible by construction
    /// (`&mut self`).
    pub fn render_meshes(&mut self) {
        let [r, g, b] = self.config.background;
        self.framebuffer.clear(Color::new(r, g, b));

        let view_proj = self.view_proj();
        let (width, height) = (self.framebuffer.width, self.framebuffer.height);
        let (tris, stats) =
            self.collect_triangles(&view_proj, width, height, self.config.max_triangles);
        self.stats = stats;
        if stats.triangles_dropped > 0 {
            debug!(
                "triangle budget reached: dropped {} of {}",
                stats.triangles_dropped, stats.triangles_submitted
            );
        }

        let shading = Shading {
            lights: prepared_lights(&self.lights),
            ambient: self.config.ambient,
            intensity: self.config.intensity,
            shadow_bias: self.config.shadow_bias,
        };
        let textures = &self.textures;

        let band_rows = (height / rayon::current_num_threads().max(1)).max(8);
        self.framebuffer
            .bands(band_rows)
            .into_par_iter()
            .for_each(|mut band| {
                for tri in &tris {
                    let texture = tri.texture.and_then(|i| textures.get(i));
                    rasterize_color(tri, &mut band, texture, &shading);
                }
            });
    }

    /// Draw light gizmos over the current framebuffer contents.
    pub fn render_lights(&mut self) {
        let view_proj = self.view_proj();
        let mut markers = Vec::new();
        for light in self.lights.iter().flatten() {
            if !light.active {
                continue;
            }
            if let Some((x, y)) = self.project_to_screen(light.position, &view_proj) {
                markers.push((x, y));
            }
        }
        for (x, y) in markers {
            self.framebuffer.draw_circle(x, y, 4, Color::YELLOW);
            self.framebuffer.draw_line(x - 7, y, x + 7, y, Color::YELLOW);
            self.framebuffer.draw_line(x, y - 7, x, y + 7, Color::YELLOW);
        }
    }

    /// Wireframe overlay of a mesh's world-space bounding box.
    pub fn render_bounding_box(
        &mut self,
        id: MeshId,
        thickness: i32,
        color: Color,
    ) -> Result<(), SceneError> {
        const EDGES: [(usize, usize); 12] = [
            (0, 1), (1, 3), (3, 2), (2, 0), // near face
            (4, 5), (5, 7), (7, 6), (6, 4), // far face
            (0, 4), (1, 5), (2, 6), (3, 7), // connectors
        ];

        let mesh = self.mesh(id)?;
        let model = mesh.model_matrix();
        let corners = mesh.aabb.corners().map(|c| model.transform_point(c).xyz());
        let view_proj = self.view_proj();
        let projected: Vec<Option<(i32, i32)>> = corners
            .iter()
            .map(|&c| self.project_to_screen(c, &view_proj))
            .collect();

        for (a, b) in EDGES {
            if let (Some((x0, y0)), Some((x1, y1))) = (projected[a], projected[b]) {
                self.framebuffer.draw_thick_line(x0, y0, x1, y1, thickness, color);
            }
        }
        Ok(())
    }

    /// The color buffer for the display collaborator, unchanged.
    pub fn present(&self) -> &[u8] {
        self.framebuffer.present()
    }

    // ---- diagnostics ---------------------------------------------------

    /// Pick the nearest visible mesh under a screen pixel: coarse ray/AABB
    /// first, then exact ray/triangle against current transforms.
    pub fn pick(&self, screen_x: f32, screen_y: f32) -> Option<MeshId> {
        let (origin, dir) = self.screen_ray(screen_x, screen_y);

        let mut best: Option<(f32, MeshId)> = None;
        for (i, mesh) in self.meshes.iter().enumerate() {
            let Some(mesh) = mesh else { continue };
            if !mesh.visible {
                continue;
            }
            let model = mesh.model_matrix();
            let world_aabb = Aabb::from_points(
                &mesh.aabb.corners().map(|c| model.transform_point(c).xyz()),
            );
            if ray_aabb_intersect(origin, dir, &world_aabb).is_none() {
                continue;
            }
            for idx in &mesh.indices {
                let v0 = model.transform_point(mesh.vertices[idx[0]].pos).xyz();
                let v1 = model.transform_point(mesh.vertices[idx[1]].pos).xyz();
                let v2 = model.transform_point(mesh.vertices[idx[2]].pos).xyz();
                if let Some(t) = ray_triangle_intersect(origin, dir, v0, v1, v2) {
                    if best.map_or(true, |(bt, _)| t < bt) {
                        best = Some((t, MeshId(i)));
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// World-space ray through a framebuffer pixel.
    fn screen_ray(&self, screen_x: f32, screen_y: f32) -> (Vec3, Vec3) {
        let ndc_x = 2.0 * (screen_x / self.framebuffer.width as f32) - 1.0;
        let ndc_y = 1.0 - 2.0 * (screen_y / self.framebuffer.height as f32);
        let f = 1.0 / (self.config.fov_y() * 0.5).tan();

        let view = self.camera.view();
        let right = Vec3::new(view.0[0][0], view.0[0][1], view.0[0][2]);
        let up = Vec3::new(view.0[1][0], view.0[1][1], view.0[1][2]);
        let forward = Vec3::new(view.0[2][0], view.0[2][1], view.0[2][2]);

        let dir = (right * (ndc_x * self.config.aspect() / f) + up * (ndc_y / f) + forward)
            .normalize();
        (self.camera.position, dir)
    }

    // ---- pipeline internals --------------------------------------------

    fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective(
            self.config.fov_y(),
            self.config.aspect(),
            self.config.near,
            self.config.far,
        );
        proj.mul(&self.camera.view())
    }

    fn project_to_screen(&self, world: Vec3, view_proj: &Mat4) -> Option<(i32, i32)> {
        let clip = view_proj.transform_point(world);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.perspective_divide();
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
            return None;
        }
        let x = (ndc.x + 1.0) * 0.5 * self.framebuffer.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * self.framebuffer.height as f32;
        Some((x as i32, y as i32))
    }

    /// Geometry front-end shared by the camera pass and the shadow passes:
    /// transform, frustum-cull, clip, perspective-divide and viewport-map
    /// every visible triangle, up to `budget` output triangles.
    fn collect_triangles(
        &self,
        view_proj: &Mat4,
        width: usize,
        height: usize,
        budget: usize,
    ) -> (Vec<ScreenTriangle>, FrameStats) {
        let mut out = Vec::new();
        let mut stats = FrameStats::default();
        let mut clipped = Vec::new();

        for mesh in self.meshes.iter().flatten() {
            if !mesh.visible {
                continue;
            }
            let model = mesh.model_matrix();
            let mvp = view_proj.mul(&model);

            let corners: Vec<Vec4> = mesh
                .aabb
                .corners()
                .iter()
                .map(|&c| mvp.transform_point(c))
                .collect();
            if points_outside_frustum(&corners) {
                stats.meshes_culled += 1;
                continue;
            }

            let normal_mat = Mat3::normal_matrix(&model);
            for idx in &mesh.indices {
                stats.triangles_submitted += 1;
                let [a, b, c] = idx.map(|i| {
                    let v = &mesh.vertices[i];
                    ClipVertex {
                        pos: mvp.transform_point(v.pos),
                        world: model.transform_point(v.pos).xyz(),
                        normal: normal_mat.transform(v.normal),
                        uv: v.uv,
                    }
                });

                clipped.clear();
                clip_triangle(a, b, c, &mut clipped);
                for tri in &clipped {
                    if out.len() >= budget {
                        // Deliberate backpressure: excess triangles are
                        // dropped to bound the frame cost.
                        stats.triangles_dropped += 1;
                        continue;
                    }
                    let v0 = ScreenVertex::from_clip(&tri[0], width, height);
                    let v1 = ScreenVertex::from_clip(&tri[1], width, height);
                    let v2 = ScreenVertex::from_clip(&tri[2], width, height);
                    if let (Some(v0), Some(v1), Some(v2)) = (v0, v1, v2) {
                        out.push(ScreenTriangle {
                            v: [v0, v1, v2],
                            texture: mesh.texture,
                        });
                        stats.triangles_emitted += 1;
                    }
                }
            }
        }
        (out, stats)
    }
}

/// Snapshot the active lights for the raster stage. A shadow map whose
/// generation does not match its light was produced for a different pose;
/// sampling it would be a correctness bug, so it is excluded (and flagged as
/// a programming error in debug builds).
fn prepared_lights(lights: &[Option<Light>]) -> Vec<FrameLight<'_>> {
    lights
        .iter()
        .flatten()
        .filter(|l| l.active)
        .map(|l| {
            let unmapped = l.shadow.generation == GENERATION_UNMAPPED;
            let fresh = l.shadow.generation == l.generation;
            debug_assert!(
                fresh || unmapped,
                "stale shadow map: light moved without update_lights"
            );
            if !fresh && !unmapped {
                warn!("skipping stale shadow map (generation {} vs light {})", l.shadow.generation, l.generation);
            }
            FrameLight {
                position: l.position,
                shadow: if fresh { Some(&l.shadow) } else { None },
            }
        })
        .collect()
}
