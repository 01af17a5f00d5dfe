//! Placed model instances

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::{ModelHandle, ShaderHandle};

/// Source of transform revisions, shared by every object so no two
/// transforms ever carry the same value
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// A model placed in the world with its own transform.
///
/// The world matrix is `Rx * Ry * Rz * T * S` with rotations given in degrees,
/// and it is rebuilt by every setter, so [`GameObject::world_matrix`] never
/// returns a stale value.
#[derive(Debug, Clone)]
pub struct GameObject {
    shader: ShaderHandle,
    model: ModelHandle,
    scale: Vec3,
    rotation: Vec3,
    translation: Vec3,
    world: Mat4,
    revision: u64,
}

impl GameObject {
    /// Identity-transformed object drawing `model` with `shader`
    #[must_use]
    pub fn new(shader: ShaderHandle, model: ModelHandle) -> Self {
        Self {
            shader,
            model,
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
            translation: Vec3::zeros(),
            world: Mat4::identity(),
            revision: next_revision(),
        }
    }

    /// Builder-style translation
    #[must_use]
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.set_translation(translation);
        self
    }

    /// Builder-style scale
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    /// Builder-style rotation (degrees)
    #[must_use]
    pub fn with_rotation(mut self, rotation_degrees: Vec3) -> Self {
        self.set_rotation(rotation_degrees);
        self
    }

    /// Shader used to draw this object
    #[must_use]
    pub const fn shader(&self) -> ShaderHandle {
        self.shader
    }

    /// Model drawn by this object
    #[must_use]
    pub const fn model(&self) -> ModelHandle {
        self.model
    }

    /// Per-axis scale
    #[must_use]
    pub const fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Rotation about X, Y and Z in degrees
    #[must_use]
    pub const fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// World-space translation
    #[must_use]
    pub const fn translation(&self) -> Vec3 {
        self.translation
    }

    /// Object-to-world matrix
    #[must_use]
    pub const fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Process-wide unique value, replaced on every transform change
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.rebuild();
    }

    /// Replace the rotation (degrees)
    pub fn set_rotation(&mut self, rotation_degrees: Vec3) {
        self.rotation = rotation_degrees;
        self.rebuild();
    }

    /// Replace the translation
    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.rebuild();
    }

    /// Add to the scale
    pub fn adjust_scale(&mut self, delta: Vec3) {
        self.set_scale(self.scale + delta);
    }

    /// Add to the rotation (degrees)
    pub fn adjust_rotation(&mut self, delta_degrees: Vec3) {
        self.set_rotation(self.rotation + delta_degrees);
    }

    /// Add to the translation
    pub fn adjust_translation(&mut self, delta: Vec3) {
        self.set_translation(self.translation + delta);
    }

    fn rebuild(&mut self) {
        self.world = Mat4::rotation_x(utils::deg_to_rad(self.rotation.x))
            * Mat4::rotation_y(utils::deg_to_rad(self.rotation.y))
            * Mat4::rotation_z(utils::deg_to_rad(self.rotation.z))
            * Mat4::new_translation(&self.translation)
            * Mat4::new_nonuniform_scaling(&self.scale);
        self.revision = next_revision();
    }
}

/// Mutable access to an object's transform.
///
/// Shader and model stay fixed for as long as the object is registered, and
/// the object itself cannot be swapped out from under its draw-list entry.
#[derive(Debug)]
pub struct TransformMut<'a> {
    object: &'a mut GameObject,
}

impl<'a> TransformMut<'a> {
    pub(crate) fn new(object: &'a mut GameObject) -> Self {
        Self { object }
    }

    /// Replace the scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.object.set_scale(scale);
    }

    /// Replace the rotation (degrees)
    pub fn set_rotation(&mut self, rotation_degrees: Vec3) {
        self.object.set_rotation(rotation_degrees);
    }

    /// Replace the translation
    pub fn set_translation(&mut self, translation: Vec3) {
        self.object.set_translation(translation);
    }

    /// Add to the scale
    pub fn adjust_scale(&mut self, delta: Vec3) {
        self.object.adjust_scale(delta);
    }

    /// Add to the rotation (degrees)
    pub fn adjust_rotation(&mut self, delta_degrees: Vec3) {
        self.object.adjust_rotation(delta_degrees);
    }

    /// Add to the translation
    pub fn adjust_translation(&mut self, delta: Vec3) {
        self.object.adjust_translation(delta);
    }
}

impl Deref for TransformMut<'_> {
    type Target = GameObject;

    fn deref(&self) -> &GameObject {
        self.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn object() -> GameObject {
        GameObject::new(ShaderHandle(0), ModelHandle(0))
    }

    #[test]
    fn test_new_object_is_identity() {
        assert_relative_eq!(*object().world_matrix(), Mat4::identity());
    }

    #[test]
    fn test_translation_lands_in_last_column() {
        let obj = object().with_translation(Vec3::new(2.0, 3.0, 4.0));
        let world = obj.world_matrix();

        assert_relative_eq!(world[(0, 3)], 2.0, epsilon = EPSILON);
        assert_relative_eq!(world[(1, 3)], 3.0, epsilon = EPSILON);
        assert_relative_eq!(world[(2, 3)], 4.0, epsilon = EPSILON);
    }

    #[test]
    fn test_rotation_applies_after_translation() {
        let obj = object()
            .with_translation(Vec3::new(1.0, 0.0, 0.0))
            .with_rotation(Vec3::new(0.0, 0.0, 90.0));

        let moved = obj.world_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(moved.xyz(), Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_scale_applies_first() {
        let obj = object()
            .with_scale(Vec3::new(2.0, 2.0, 2.0))
            .with_translation(Vec3::new(0.0, 0.0, 5.0));

        let moved = obj.world_matrix() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(moved.xyz(), Vec3::new(2.0, 0.0, 5.0), epsilon = EPSILON);
    }

    #[test]
    fn test_adjust_is_cumulative_and_bumps_revision() {
        let mut obj = object();
        let before = obj.revision();

        obj.adjust_translation(Vec3::new(1.0, 0.0, 0.0));
        obj.adjust_translation(Vec3::new(1.0, 0.0, 0.0));
        obj.adjust_rotation(Vec3::new(0.0, 45.0, 0.0));
        let after_translation = obj.revision();
        obj.adjust_rotation(Vec3::new(0.0, 45.0, 0.0));
        obj.adjust_scale(Vec3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(obj.translation(), Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(obj.rotation(), Vec3::new(0.0, 45.0, 0.0));
        assert_relative_eq!(obj.scale(), Vec3::new(2.0, 1.0, 1.0));
        assert!(after_translation > before);
        assert!(obj.revision() > after_translation);
    }

    #[test]
    fn test_fresh_object_never_repeats_a_revision() {
        let first = object().with_translation(Vec3::new(1.0, 0.0, 0.0));
        let replacement = GameObject::new(ShaderHandle(0), ModelHandle(7))
            .with_translation(Vec3::new(50.0, 0.0, 0.0));

        assert_ne!(first.revision(), replacement.revision());
        assert_ne!(object().revision(), object().revision());
    }

    #[test]
    fn test_transform_handle_edits_in_place() {
        let mut obj = object().with_scale(Vec3::new(2.0, 2.0, 2.0));
        let before = obj.revision();

        let mut transform = TransformMut::new(&mut obj);
        transform.adjust_translation(Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(transform.model(), ModelHandle(0));
        assert_relative_eq!(transform.world_matrix()[(1, 3)], 3.0, epsilon = EPSILON);

        assert!(obj.revision() > before);
        assert_relative_eq!(obj.scale(), Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_matrix_tracks_latest_setter() {
        let mut obj = object().with_translation(Vec3::new(5.0, 5.0, 5.0));
        obj.set_translation(Vec3::new(-1.0, 0.0, 0.0));

        assert_relative_eq!(obj.world_matrix()[(0, 3)], -1.0, epsilon = EPSILON);
        assert_relative_eq!(obj.world_matrix()[(1, 3)], 0.0, epsilon = EPSILON);
    }
}
