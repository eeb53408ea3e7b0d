//! CPU rasterization pipeline.
//!
//! Geometry flows one way through the stages: object space -> world ->
//! view -> clip (where triangles are clipped against the frustum) ->
//! NDC -> screen, then perspective-correct rasterization with a depth
//! test into the framebuffer. Shadow maps run the same pipeline from the
//! light's viewpoint, depth-only. `scene` owns everything and drives the
//! frame.

pub mod camera;
pub mod clip;
pub mod framebuffer;
pub mod light;
pub mod math;
pub mod raster;
pub mod scene;
pub mod shadow;
pub mod texture;

pub use scene::{FrameStats, LightId, Mesh, MeshId, Scene, SceneError, Vertex};
pub use texture::{Color, Texture};
