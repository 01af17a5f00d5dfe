//! # Ngine Core
//!
//! The GPU rendering core of the Ngine runtime. It owns the graphics device,
//! the presentable swapchain, shader pipelines, GPU-resident meshes and
//! uniform buffers, and the frames-in-flight protocol that turns a camera and
//! a flat draw list into presented frames.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ngine_core::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     ngine_core::foundation::logging::init();
//!     let config = StartupConfig::default();
//!     let mut window = Window::new("Ngine", &config.window)?;
//!     let mut core = GraphicsCore::new(&mut window, &config)?;
//!
//!     let shader = core.load_shader(
//!         "resources/shaders/mvp.vert.spv".as_ref(),
//!         "resources/shaders/mvp.frag.spv".as_ref(),
//!     )?;
//!     let model = core.load_model_from_file("resources/models/cube.obj".as_ref())?;
//!     core.add_game_object_to_draw_list(GameObject::new(shader, model))?;
//!
//!     let mut events = EventQueue::new();
//!     while window.update(&mut events) {
//!         events.clear();
//!         core.draw_frame(&mut window)?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod events;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod window;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{Config, GraphicsSettings, StartupConfig, WindowSettings};
    pub use crate::events::{Event, EventQueue, Key};
    pub use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4};
    pub use crate::render::{FrameOutcome, GraphicsBackend, ModelHandle, ShaderHandle, Vertex};
    #[cfg(feature = "vulkan")]
    pub use crate::render::{vulkan::VulkanError, GraphicsCore};
    pub use crate::scene::{Camera, GameObject, GameObjectId, TransformMut};
    pub use crate::window::{RenderWindow, Window};
}
