//! Vulkan backend
//!
//! Every native handle is owned by a wrapper that releases it on drop;
//! [`VulkanBackend`] composes them in teardown order.

mod backend;
pub mod buffer;
pub mod commands;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod framebuffer;
pub mod instance;
pub mod render_pass;
pub mod resources;
pub mod scheduler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex_layout;

pub use backend::VulkanBackend;
pub use error::{VkResultExt, VulkanError, VulkanResult};
pub use resources::{Mesh, Model, ResourceManager};

use ash::vk;

use crate::window::{RenderWindow, WindowResult};

/// Window that can host a Vulkan surface
pub trait VulkanSurfaceSource: RenderWindow {
    /// Instance extensions the platform surface needs
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Create the native surface for `instance`
    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR>;
}
