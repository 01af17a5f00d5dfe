//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the matrix constructors used for
//! Vulkan clip space (Y down, depth 0..1).

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    #[must_use]
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }
}

/// Extension trait for Mat4 with the constructors the renderer needs
pub trait Mat4Ext {
    /// Rotation about the X axis, angle in radians
    fn rotation_x(angle: f32) -> Mat4;

    /// Rotation about the Y axis, angle in radians
    fn rotation_y(angle: f32) -> Mat4;

    /// Rotation about the Z axis, angle in radians
    fn rotation_z(angle: f32) -> Mat4;

    /// Perspective projection for a view space looking down +Z, depth mapped to [0, 1]
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix (camera looks down -Z)
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Flips Y and Z so a right-handed Y-up view feeds [`Mat4Ext::perspective`]
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new_translation(&-eye);

        #[rustfmt::skip]
        let rotation = Mat4::new(
            right.x,      right.y,      right.z,      0.0,
            camera_up.x,  camera_up.y,  camera_up.z,  0.0,
            -forward.x,   -forward.y,   -forward.z,   0.0,
            0.0,          0.0,          0.0,          1.0,
        );

        rotation * translation
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::from_diagonal(&Vec4::new(1.0, -1.0, -1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_perspective_depth_range() {
        let proj = Mat4::perspective(utils::deg_to_rad(60.0), 16.0 / 9.0, 0.1, 100.0);

        let near = proj * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, 100.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let view = Mat4::look_at(eye, Vec3::new(1.0, 2.0, 0.0), Vec3::y());

        let moved = view * Vec4::new(eye.x, eye.y, eye.z, 1.0);
        assert_relative_eq!(moved.xyz(), Vec3::zeros(), epsilon = EPSILON);
    }

    #[test]
    fn test_y_up_becomes_y_down_in_clip_space() {
        let view = Mat4::vulkan_coordinate_transform()
            * Mat4::look_at(Vec3::zeros(), -Vec3::z(), Vec3::y());
        let proj = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 10.0);

        let above = proj * view * Vec4::new(0.0, 1.0, -2.0, 1.0);
        assert!(above.y / above.w < 0.0);
        assert!(above.w > 0.0);
    }
}
