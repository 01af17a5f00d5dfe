//! Scene state: the draw list and the active camera

mod camera;
mod draw_list;
mod game_object;

pub use camera::Camera;
pub use draw_list::{DrawList, GameObjectId};
pub use game_object::{GameObject, TransformMut};

/// Draw list plus the camera used for the next frame
#[derive(Debug, Default)]
pub struct SceneState {
    draw_list: DrawList,
    camera: Camera,
    camera_revision: u64,
}

impl SceneState {
    /// Empty scene with a default camera
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered game objects
    #[must_use]
    pub const fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// Registered game objects, mutable
    pub fn draw_list_mut(&mut self) -> &mut DrawList {
        &mut self.draw_list
    }

    /// Camera used for the next frame
    #[must_use]
    pub const fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Counter advanced whenever the camera's matrices change
    #[must_use]
    pub const fn camera_revision(&self) -> u64 {
        self.camera_revision
    }

    /// Store a copy of `camera`.
    ///
    /// Returns whether the view or projection actually changed.
    pub fn set_camera(&mut self, camera: &Camera) -> bool {
        let changed = camera.view_matrix() != self.camera.view_matrix()
            || camera.projection_matrix() != self.camera.projection_matrix();
        self.camera = camera.clone();
        if changed {
            self.camera_revision += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_camera_revision_only_moves_on_change() {
        let mut scene = SceneState::new();
        let mut camera = Camera::default();

        assert!(!scene.set_camera(&camera));
        assert_eq!(scene.camera_revision(), 0);

        camera.adjust_position(Vec3::new(0.0, 0.0, 1.0));
        assert!(scene.set_camera(&camera));
        assert!(!scene.set_camera(&camera));
        assert_eq!(scene.camera_revision(), 1);
        assert_eq!(scene.camera().position(), Vec3::new(0.0, 0.0, 1.0));
    }
}
