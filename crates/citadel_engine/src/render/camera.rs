//! First-person camera.
//!
//! The camera keeps an orthonormal right/up/look basis and rebuilds its view
//! matrix lazily: movement and rotation only mark the basis dirty, and the
//! matrix is re-derived (with re-orthonormalization to shed drift) the next
//! time it is read.

use nalgebra::{Rotation3, Unit};

use crate::foundation::math::{perspective_vk, Mat4, Vec3};

pub struct Camera {
    position: Vec3,
    right: Vec3,
    up: Vec3,
    look: Vec3,

    near_z: f32,
    far_z: f32,
    fov_y: f32,
    aspect: f32,

    view: Mat4,
    proj: Mat4,
    view_dirty: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub fn new() -> Self {
        let mut camera = Self {
            position: Vec3::zeros(),
            right: Vec3::x(),
            up: Vec3::y(),
            look: Vec3::z(),
            near_z: 1.0,
            far_z: 1000.0,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 1.0,
            view: Mat4::identity(),
            proj: Mat4::identity(),
            view_dirty: true,
        };
        camera.set_lens(camera.fov_y, camera.aspect, camera.near_z, camera.far_z);
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.view_dirty = true;
    }

    pub fn near_z(&self) -> f32 {
        self.near_z
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn far_z(&self) -> f32 {
        self.far_z
    }

    pub fn set_lens(&mut self, fov_y: f32, aspect: f32, near_z: f32, far_z: f32) {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near_z = near_z;
        self.far_z = far_z;
        self.proj = perspective_vk(fov_y, aspect, near_z, far_z);
    }

    /// Aim at `target` from `position` with the given world up.
    pub fn look_at(&mut self, position: Vec3, target: Vec3, world_up: Vec3) {
        self.position = position;
        self.look = (target - position).normalize();
        self.right = world_up.cross(&self.look).normalize();
        self.up = self.look.cross(&self.right);
        self.view_dirty = true;
    }

    /// Move along the look direction.
    pub fn walk(&mut self, distance: f32) {
        self.position += self.look * distance;
        self.view_dirty = true;
    }

    /// Move along the right direction.
    pub fn strafe(&mut self, distance: f32) {
        self.position += self.right * distance;
        self.view_dirty = true;
    }

    /// Rotate the basis around the camera's right axis.
    pub fn pitch(&mut self, angle: f32) {
        let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(self.right), angle);
        self.up = rotation * self.up;
        self.look = rotation * self.look;
        self.view_dirty = true;
    }

    /// Rotate the basis around the world Y axis.
    pub fn rotate_y(&mut self, angle: f32) {
        let rotation = Rotation3::from_axis_angle(&Vec3::y_axis(), angle);
        self.right = rotation * self.right;
        self.up = rotation * self.up;
        self.look = rotation * self.look;
        self.view_dirty = true;
    }

    pub fn view(&mut self) -> Mat4 {
        if self.view_dirty {
            self.rebuild_view();
        }
        self.view
    }

    pub fn proj(&self) -> Mat4 {
        self.proj
    }

    fn rebuild_view(&mut self) {
        // Re-orthonormalize: repeated incremental rotations accumulate error.
        self.look.normalize_mut();
        self.up = self.look.cross(&self.right).normalize();
        self.right = self.up.cross(&self.look);

        // Eye space looks down -z, so the third basis row is the negated
        // look direction.
        let r = self.right;
        let u = self.up;
        let l = self.look;
        let p = self.position;
        self.view = Mat4::new(
            r.x, r.y, r.z, -r.dot(&p),
            u.x, u.y, u.z, -u.dot(&p),
            -l.x, -l.y, -l.z, l.dot(&p),
            0.0, 0.0, 0.0, 1.0,
        );
        self.view_dirty = false;
    }
}

/// Walk-speed input mapping on top of [`Camera`].
///
/// Mouse deltas arrive in pixels and translate to a fixed fraction of a
/// degree each; free-look decides whether vertical mouse motion pitches the
/// camera.
pub struct FirstPersonController {
    pub move_speed: f32,
    pub free_look: bool,
    degrees_per_pixel: f32,
}

impl Default for FirstPersonController {
    fn default() -> Self {
        Self {
            move_speed: 50.0,
            free_look: true,
            degrees_per_pixel: 0.25,
        }
    }
}

impl FirstPersonController {
    pub fn new(move_speed: f32, degrees_per_pixel: f32) -> Self {
        Self {
            move_speed,
            degrees_per_pixel,
            ..Self::default()
        }
    }

    /// Apply held movement axes for this frame. Axes are -1, 0, or +1.
    pub fn apply_movement(&self, camera: &mut Camera, forward: f32, sideways: f32, dt: f32) {
        if forward != 0.0 {
            camera.walk(forward * self.move_speed * dt);
        }
        if sideways != 0.0 {
            camera.strafe(sideways * self.move_speed * dt);
        }
    }

    /// Apply a mouse drag delta in pixels.
    pub fn apply_mouse_delta(&self, camera: &mut Camera, dx: f32, dy: f32) {
        let to_radians = self.degrees_per_pixel.to_radians();
        camera.rotate_y(dx * to_radians);
        if self.free_look {
            camera.pitch(dy * to_radians);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_look_at_produces_orthonormal_basis() {
        let mut camera = Camera::new();
        camera.look_at(
            Vec3::new(0.0, 15.0, -80.0),
            Vec3::zeros(),
            Vec3::y(),
        );
        let view = camera.view();

        // The eye maps to the origin of eye space.
        let eye = view * Vec3::new(0.0, 15.0, -80.0).push(1.0);
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.z, 0.0, epsilon = 1e-5);

        // The target sits straight ahead on -z.
        let target = view * Vec3::zeros().push(1.0);
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-4);
        assert!(target.z < 0.0);
    }

    #[test]
    fn test_walk_moves_toward_target() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::new(0.0, 0.0, -10.0), Vec3::zeros(), Vec3::y());
        camera.walk(4.0);
        let p = camera.position();
        assert_relative_eq!(p.z, -6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_y_keeps_basis_orthonormal() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, 10.0), Vec3::y());
        for _ in 0..100 {
            camera.rotate_y(0.3);
            camera.pitch(0.05);
        }
        let _ = camera.view();
        assert_relative_eq!(camera.right.dot(&camera.up), 0.0, epsilon = 1e-4);
        assert_relative_eq!(camera.right.dot(&camera.look), 0.0, epsilon = 1e-4);
        assert_relative_eq!(camera.look.norm(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_controller_respects_free_look() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, 10.0), Vec3::y());
        let mut controller = FirstPersonController::default();

        controller.free_look = false;
        let look_before = camera.look;
        controller.apply_mouse_delta(&mut camera, 0.0, 40.0);
        let _ = camera.view();
        assert_relative_eq!(camera.look.y, look_before.y, epsilon = 1e-6);

        controller.free_look = true;
        controller.apply_mouse_delta(&mut camera, 0.0, 40.0);
        let _ = camera.view();
        assert!(camera.look.y.abs() > 1e-3);
    }

    #[test]
    fn test_movement_scales_with_speed_and_dt() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, 10.0), Vec3::y());
        let controller = FirstPersonController::default();
        controller.apply_movement(&mut camera, 1.0, 0.0, 0.1);
        assert_relative_eq!(camera.position().z, 5.0, epsilon = 1e-4);
    }
}
