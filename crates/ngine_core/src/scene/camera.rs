//! # Camera
//!
//! Free-look perspective camera driven by position and pitch/yaw/roll angles.
//!
//! ## Coordinate System
//! World space is right-handed and Y-up. With zero rotation the camera looks
//! down -Z. The view matrix already includes the Y/Z flip into Vulkan's view
//! orientation, so `projection * view * model` lands in Vulkan clip space
//! (Y down, depth 0..1).

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

const DEFAULT_FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const DEFAULT_RIGHT: Vec3 = Vec3::new(1.0, 0.0, 0.0);
const WORLD_UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Perspective camera
///
/// Derived direction vectors and matrices are rebuilt on every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    rotation: Vec3,
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,

    forward: Vec3,
    right: Vec3,
    view: Mat4,
    projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(60.0, 16.0 / 9.0, 0.01, 1000.0)
    }
}

impl Camera {
    /// Camera at the origin looking down -Z
    ///
    /// # Arguments
    /// * `fov_degrees` - Vertical field of view
    /// * `aspect` - Width over height
    /// * `near` - Near plane distance (> 0)
    /// * `far` - Far plane distance (> near)
    #[must_use]
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            fov_degrees,
            aspect,
            near,
            far,
            forward: DEFAULT_FORWARD,
            right: DEFAULT_RIGHT,
            view: Mat4::identity(),
            projection: Mat4::identity(),
        };
        camera.rebuild_projection();
        camera.rebuild_view();
        camera
    }

    /// Replace the projection parameters
    pub fn set_projection_values(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.fov_degrees = fov_degrees;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self.rebuild_projection();
    }

    /// Move to an absolute position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.rebuild_view();
    }

    /// Move by a world-space offset
    pub fn adjust_position(&mut self, delta: Vec3) {
        self.set_position(self.position + delta);
    }

    /// Set pitch (X), yaw (Y) and roll (Z) in degrees
    pub fn set_rotation(&mut self, rotation_degrees: Vec3) {
        self.rotation = rotation_degrees;
        self.rebuild_view();
    }

    /// Add to pitch, yaw and roll (degrees)
    pub fn adjust_rotation(&mut self, delta_degrees: Vec3) {
        self.set_rotation(self.rotation + delta_degrees);
    }

    /// World-space position
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Pitch, yaw and roll in degrees
    #[must_use]
    pub const fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Vertical field of view in degrees
    #[must_use]
    pub const fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    /// Width over height
    #[must_use]
    pub const fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Unit vector the camera looks along
    #[must_use]
    pub const fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Opposite of [`Camera::forward`]
    #[must_use]
    pub fn back(&self) -> Vec3 {
        -self.forward
    }

    /// Unit vector to the camera's right
    #[must_use]
    pub const fn right(&self) -> Vec3 {
        self.right
    }

    /// Opposite of [`Camera::right`]
    #[must_use]
    pub fn left(&self) -> Vec3 {
        -self.right
    }

    /// World to Vulkan view space
    #[must_use]
    pub const fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// View to clip space
    #[must_use]
    pub const fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    fn orientation(&self) -> Mat4 {
        Mat4::rotation_y(utils::deg_to_rad(self.rotation.y))
            * Mat4::rotation_x(utils::deg_to_rad(self.rotation.x))
            * Mat4::rotation_z(utils::deg_to_rad(self.rotation.z))
    }

    fn rebuild_view(&mut self) {
        let orientation = self.orientation();
        self.forward = orientation.transform_vector(&DEFAULT_FORWARD).normalize();
        self.right = orientation.transform_vector(&DEFAULT_RIGHT).normalize();
        let up = orientation.transform_vector(&WORLD_UP).normalize();

        self.view = Mat4::vulkan_coordinate_transform()
            * Mat4::look_at(self.position, self.position + self.forward, up);
        log::trace!(
            "Camera moved to {:?}, rotation {:?}",
            self.position,
            self.rotation
        );
    }

    fn rebuild_projection(&mut self) {
        self.projection = Mat4::perspective(
            utils::deg_to_rad(self.fov_degrees),
            self.aspect,
            self.near,
            self.far,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_default_directions() {
        let camera = Camera::default();

        assert_relative_eq!(camera.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
        assert_relative_eq!(camera.back(), Vec3::new(0.0, 0.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(camera.right(), Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(camera.left(), Vec3::new(-1.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_yaw_turns_forward() {
        let mut camera = Camera::default();
        camera.adjust_rotation(Vec3::new(0.0, 90.0, 0.0));

        assert_relative_eq!(camera.forward(), Vec3::new(-1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(camera.right(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_point_ahead_projects_to_center() {
        let mut camera = Camera::new(60.0, 1.0, 0.1, 100.0);
        camera.set_position(Vec3::new(0.0, 0.0, 5.0));

        let clip = camera.projection_matrix() * camera.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.xyz() / clip.w;

        assert_relative_eq!(ndc.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(ndc.y, 0.0, epsilon = EPSILON);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_adjust_position_moves_view() {
        let mut camera = Camera::default();
        camera.adjust_position(Vec3::new(0.0, 0.0, 3.0));
        camera.adjust_position(Vec3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(camera.position(), Vec3::new(1.0, 0.0, 3.0));
        let eye = camera.view_matrix() * Vec4::new(1.0, 0.0, 3.0, 1.0);
        assert_relative_eq!(eye.xyz(), Vec3::zeros(), epsilon = EPSILON);
    }

    #[test]
    fn test_set_projection_values() {
        let mut camera = Camera::default();
        camera.set_projection_values(90.0, 2.0, 0.5, 50.0);

        assert_relative_eq!(camera.fov_degrees(), 90.0);
        assert_relative_eq!(camera.aspect(), 2.0);
        assert_relative_eq!(camera.projection_matrix()[(0, 0)], 0.5, epsilon = EPSILON);
        assert_relative_eq!(camera.projection_matrix()[(1, 1)], 1.0, epsilon = EPSILON);
    }
}
