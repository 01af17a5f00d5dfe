//! Vulkan synchronization primitives
//!
//! RAII wrappers for semaphores and fences, plus the per-slot bundle used by
//! the frame ring.

use ash::{vk, Device};

use super::error::{VkResultExt, VulkanError, VulkanResult};
use crate::render::frame::SlotFence;

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }.check()?;
        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    #[must_use]
    pub const fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None) }.check()?;
        Ok(Self { device, fence })
    }

    /// Wait for the fence with a timeout in nanoseconds
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout) }.check()
    }

    /// Reset to unsignaled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.check()
    }

    /// Get the fence handle
    #[must_use]
    pub const fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects and command buffer of one frame slot
pub struct FrameSync {
    /// Signaled when the acquired image may be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering finished; presentation waits on it
    pub render_finished: Semaphore,
    /// Signaled when the slot's submission completed; created signaled
    pub in_flight: Fence,
    /// Primary command buffer, owned by the scheduler's pool
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    /// Create the slot's objects around an allocated command buffer
    pub fn new(device: &Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
            command_buffer,
        })
    }
}

impl SlotFence for FrameSync {
    type Error = VulkanError;

    fn wait(&self) -> VulkanResult<()> {
        self.in_flight.wait(u64::MAX)
    }

    fn reset(&self) -> VulkanResult<()> {
        self.in_flight.reset()
    }
}
