//! Cinder: a software 3D renderer
//!
//! Everything happens on the CPU: vertex transforms, frustum clipping,
//! perspective-correct rasterization, depth testing, shadow maps and
//! per-fragment diffuse lighting. The GPU only blits the finished
//! framebuffer to the window.
//!
//! The demo scene is a textured cube hovering over a checkerboard ground
//! plane, lit by an orbiting shadow-casting light. WASD + Space/Shift move
//! the camera, right-drag looks around, left-click picks a mesh.

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod config;
mod renderer;

use log::{error, info, warn};
use macroquad::prelude::*;

use config::RenderConfig;
use renderer::math::Vec3;
use renderer::{Color, LightId, Mesh, MeshId, Scene, SceneError, Texture};

const CONFIG_PATH: &str = "assets/renderer.ron";

fn load_config() -> RenderConfig {
    match RenderConfig::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; falling back to defaults", e);
            RenderConfig::default()
        }
    }
}

fn window_conf() -> Conf {
    let config = RenderConfig::load(CONFIG_PATH).unwrap_or_default();
    Conf {
        window_title: format!("Cinder v{}", VERSION),
        window_width: config.width as i32,
        window_height: config.height as i32,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

struct Demo {
    scene: Scene,
    cube: MeshId,
    light: LightId,
}

fn build_scene(config: RenderConfig) -> Result<Demo, SceneError> {
    let mut scene = Scene::new(config);

    let ground_tex = scene.add_texture(Texture::checkerboard(
        64,
        64,
        Color::new(200, 200, 200),
        Color::new(90, 90, 100),
    ));
    let cube_tex = scene.add_texture(
        Texture::from_file("assets/textures/crate.png").unwrap_or_else(|e| {
            warn!("{}; using a procedural texture instead", e);
            Texture::checkerboard(32, 32, Color::new(210, 140, 70), Color::new(160, 100, 50))
        }),
    );

    scene.add_mesh(Mesh::plane(12.0).with_texture(ground_tex))?;
    let cube = scene.add_mesh(
        Mesh::cube(1.0)
            .with_texture(cube_tex)
            .at(Vec3::new(0.0, 1.0, 0.0)),
    )?;
    let light = scene.add_light(Vec3::new(0.0, 9.0, 0.0), Vec3::ZERO)?;

    scene.set_camera_position(Vec3::new(0.0, 10.0, -8.0));
    scene.set_camera_target(Vec3::ZERO);

    Ok(Demo { scene, cube, light })
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    let config = load_config();
    let (fb_width, fb_height) = (config.width, config.height);

    let mut demo = match build_scene(config) {
        Ok(demo) => demo,
        Err(e) => {
            error!("failed to build the demo scene: {}", e);
            return;
        }
    };
    info!("Cinder v{} ({}x{})", VERSION, fb_width, fb_height);

    // Camera orientation state for mouse look, seeded from the initial pose.
    let forward = demo.scene.camera.forward();
    let mut yaw = forward.x.atan2(forward.z);
    let mut pitch = (-forward.y).asin();
    let mut last_mouse = mouse_position();

    let mut selected: Option<MeshId> = None;
    let mut t = 0.0f32;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        let dt = get_frame_time();
        t += dt;

        // Camera movement along the view basis.
        let speed = 6.0 * dt;
        let mut fwd = 0.0;
        let mut right = 0.0;
        let mut up = 0.0;
        if is_key_down(KeyCode::W) {
            fwd += speed;
        }
        if is_key_down(KeyCode::S) {
            fwd -= speed;
        }
        if is_key_down(KeyCode::D) {
            right += speed;
        }
        if is_key_down(KeyCode::A) {
            right -= speed;
        }
        if is_key_down(KeyCode::Space) {
            up += speed;
        }
        if is_key_down(KeyCode::LeftShift) {
            up -= speed;
        }
        if fwd != 0.0 || right != 0.0 || up != 0.0 {
            demo.scene.move_camera(fwd, right, up);
        }

        // Mouse look while the right button is held.
        let mouse = mouse_position();
        if is_mouse_button_down(MouseButton::Right) {
            let dx = mouse.0 - last_mouse.0;
            let dy = mouse.1 - last_mouse.1;
            yaw += dx * 0.005;
            pitch += dy * 0.005;
            demo.scene.rotate_camera(yaw, pitch);
        }
        last_mouse = mouse;

        // Animate the cube and orbit the light; the shadow pass below keeps
        // the shadow map in sync with the new light pose.
        if let Err(e) = demo.scene.set_mesh_transform(
            demo.cube,
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, t * 0.6, 0.0),
            Vec3::ZERO,
        ) {
            error!("cube update failed: {}", e);
        }
        let light_pos = Vec3::new((t * 0.4).sin() * 6.0, 9.0, (t * 0.4).cos() * 6.0);
        if let Err(e) = demo.scene.set_light_transform(demo.light, light_pos, Vec3::ZERO) {
            error!("light update failed: {}", e);
        }

        // Pick with the left mouse button, in framebuffer coordinates.
        if is_mouse_button_pressed(MouseButton::Left) {
            let px = mouse.0 / screen_width() * fb_width as f32;
            let py = mouse.1 / screen_height() * fb_height as f32;
            selected = demo.scene.pick(px, py);
            if let Some(id) = selected {
                info!("picked {:?}", id);
            }
        }

        demo.scene.update_lights();
        demo.scene.render_meshes();
        demo.scene.render_lights();
        if let Some(id) = selected {
            if demo.scene.render_bounding_box(id, 2, Color::GREEN).is_err() {
                selected = None;
            }
        }

        // Blit the finished framebuffer, stretched to the window.
        let frame = Texture2D::from_rgba8(fb_width as u16, fb_height as u16, demo.scene.present());
        frame.set_filter(FilterMode::Nearest);
        draw_texture_ex(
            &frame,
            0.0,
            0.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(screen_width(), screen_height())),
                ..Default::default()
            },
        );

        let stats = demo.scene.frame_stats();
        draw_text(
            &format!(
                "fps {} | tris {}/{} | dropped {} | meshes culled {}",
                get_fps(),
                stats.triangles_emitted,
                stats.triangles_submitted,
                stats.triangles_dropped,
                stats.meshes_culled,
            ),
            10.0,
            20.0,
            20.0,
            WHITE,
        );

        next_frame().await;
    }
}
