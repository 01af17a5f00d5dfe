//! Rendering: backend contract, shared data layouts and the Vulkan backend

mod backend;
pub mod frame;
mod handles;
mod vertex;
#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use backend::GraphicsBackend;
pub use frame::{FrameOutcome, MAX_FRAMES_IN_FLIGHT};
pub use handles::{ModelHandle, ShaderHandle};
pub use vertex::{MvpBlock, Vertex};

/// Graphics core selected at build time
#[cfg(feature = "vulkan")]
pub type GraphicsCore = vulkan::VulkanBackend;
