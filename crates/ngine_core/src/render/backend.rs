//! Operations every graphics backend provides
//!
//! The backend is picked at build time through cargo features; application
//! code talks to [`crate::render::GraphicsCore`] and stays unaware of which
//! implementation sits behind it.

use std::path::Path;

use crate::config::StartupConfig;
use crate::render::{FrameOutcome, ModelHandle, ShaderHandle, Vertex};
use crate::scene::{Camera, GameObject, GameObjectId, TransformMut};

/// Graphics core contract
pub trait GraphicsBackend: Sized {
    /// Window type the backend presents to
    type Window: ?Sized;
    /// Backend failure
    type Error: std::error::Error + 'static;

    /// Select a device, create the swapchain and everything frames depend on
    fn new(window: &mut Self::Window, config: &StartupConfig) -> Result<Self, Self::Error>;

    /// Load a vertex/fragment pair and bake its pipeline
    fn load_shader(&mut self, vertex_path: &Path, fragment_path: &Path) -> Result<ShaderHandle, Self::Error>;

    /// Upload one mesh as a new model
    fn create_model_from_vertex_list(&mut self, vertices: &[Vertex], indices: &[u32])
        -> Result<ModelHandle, Self::Error>;

    /// Import a model file, one mesh per sub-mesh
    fn load_model_from_file(&mut self, path: &Path) -> Result<ModelHandle, Self::Error>;

    /// Append an object to the draw list
    fn add_game_object_to_draw_list(&mut self, object: GameObject) -> Result<GameObjectId, Self::Error>;

    /// Transform of an object in the draw list
    fn game_object_mut(&mut self, id: GameObjectId) -> Option<TransformMut<'_>>;

    /// Take an object out of the draw list
    fn remove_game_object(&mut self, id: GameObjectId) -> Option<GameObject>;

    /// Free a model no draw-list entry references
    fn destroy_model(&mut self, handle: ModelHandle) -> Result<(), Self::Error>;

    /// Camera used from the next frame on
    fn set_camera(&mut self, camera: &Camera);

    /// Run one frame; call once per application loop iteration
    fn draw_frame(&mut self, window: &mut Self::Window) -> Result<FrameOutcome, Self::Error>;

    /// Block until the GPU has finished all submitted work
    fn wait_idle(&self) -> Result<(), Self::Error>;
}
