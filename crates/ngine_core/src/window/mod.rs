//! Window management
//!
//! [`RenderWindow`] is what the graphics core needs from a window; [`Window`]
//! provides it on top of GLFW.

mod glfw_window;

pub use glfw_window::Window;

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// `glfwInit` failed
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The platform cannot provide the instance extensions Vulkan needs
    #[error("Vulkan is not supported by the windowing system")]
    VulkanUnsupported,

    /// Native surface creation failed
    #[error("Failed to create Vulkan surface: {0:?}")]
    SurfaceCreation(ash::vk::Result),
}

/// Result alias for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Window state consumed by the graphics core
pub trait RenderWindow {
    /// Current drawable size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Whether the window covers a monitor
    fn is_fullscreen(&self) -> bool;

    /// Return and clear the resize signal
    fn take_resize_pending(&mut self) -> bool;
}
