//! Camera state: position and target, with the view matrix derived on demand.

use super::math::{Mat4, Vec3};

pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            target: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// View matrix for the current pose. Always orthonormal; `look_at` builds
    /// a pure rotation + translation.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, Vec3::UP)
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Move along the camera basis. Position and target shift together so
    /// the viewing direction is preserved.
    pub fn move_by(&mut self, forward: f32, right: f32, up: f32) {
        let view = self.view();
        let basis_right = Vec3::new(view.0[0][0], view.0[0][1], view.0[0][2]);
        let basis_up = Vec3::new(view.0[1][0], view.0[1][1], view.0[1][2]);
        let basis_fwd = Vec3::new(view.0[2][0], view.0[2][1], view.0[2][2]);
        let delta = basis_fwd * forward + basis_right * right + basis_up * up;
        self.position = self.position + delta;
        self.target = self.target + delta;
    }

    /// Point the camera using absolute yaw/pitch angles (radians). Pitch is
    /// clamped just short of straight up/down to keep the view basis stable.
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        let pitch = pitch.clamp(
            -std::f32::consts::FRAC_PI_2 + 0.01,
            std::f32::consts::FRAC_PI_2 - 0.01,
        );
        let dir = Vec3::new(
            pitch.cos() * yaw.sin(),
            -pitch.sin(),
            pitch.cos() * yaw.cos(),
        );
        self.target = self.position + dir;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_preserves_direction() {
        let mut cam = Camera::new();
        cam.position = Vec3::new(0.0, 0.0, -5.0);
        cam.target = Vec3::ZERO;
        let before = cam.forward();
        cam.move_by(2.0, 1.0, 0.5);
        let after = cam.forward();
        assert!((before - after).len() < 1e-5);
    }

    #[test]
    fn test_rotate_clamps_pitch() {
        let mut cam = Camera::new();
        cam.rotate(0.0, 10.0);
        // Pitch clamped: forward must not be exactly vertical.
        assert!(cam.forward().y.abs() < 1.0);
    }
}
