//! Vulkan swapchain management
//!
//! Selection policy lives in free functions so it can be checked without a
//! device; [`Swapchain`] applies it and owns the images' views.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::device::{PhysicalDeviceInfo, PresentationSurface};
use super::error::{VkResultExt, VulkanError, VulkanResult};
use super::framebuffer::Framebuffer;

/// Prefer 8-bit BGRA sRGB with a non-linear sRGB color space, else the first reported format.
///
/// Returns `None` only when the surface reports no formats.
#[must_use]
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| available.first())
        .copied()
}

/// Prefer low-latency triple buffering, else FIFO (always supported)
#[must_use]
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's current extent when it defines one, else clamp the window size
#[must_use]
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width == u32::MAX {
        vk::Extent2D {
            width: window_extent
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    } else {
        caps.current_extent
    }
}

/// One more than the minimum, capped at the maximum when the surface has one
#[must_use]
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Format the next swapchain for `surface` will use
pub fn query_surface_format(surface: &PresentationSurface, physical: &PhysicalDeviceInfo) -> VulkanResult<vk::SurfaceFormatKHR> {
    let formats = unsafe {
        surface
            .loader
            .get_physical_device_surface_formats(physical.device, surface.surface)
    }
    .check()?;
    choose_surface_format(&formats).ok_or_else(|| VulkanError::api(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for `surface` sized for `window_extent`
    pub fn new(
        device: Device,
        swapchain_loader: SwapchainLoader,
        surface: &PresentationSurface,
        physical: &PhysicalDeviceInfo,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let (caps, formats, present_modes) = unsafe {
            (
                surface
                    .loader
                    .get_physical_device_surface_capabilities(physical.device, surface.surface)
                    .check()?,
                surface
                    .loader
                    .get_physical_device_surface_formats(physical.device, surface.surface)
                    .check()?,
                surface
                    .loader
                    .get_physical_device_surface_present_modes(physical.device, surface.surface)
                    .check()?,
            )
        };

        let format = match choose_surface_format(&formats) {
            Some(format) => format,
            None => return Err(VulkanError::api(vk::Result::ERROR_FORMAT_NOT_SUPPORTED)),
        };
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&caps, window_extent);
        let image_count = choose_image_count(&caps);

        let families = physical.queue_families;
        let family_indices = [families.graphics, families.present];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());
        create_info = if families.graphics == families.present {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }.check()?;

        // From here on, Drop cleans up whatever has been created.
        let mut this = Self {
            device,
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            present_mode,
            extent,
        };
        this.images = unsafe { this.swapchain_loader.get_swapchain_images(swapchain) }.check()?;
        for &image in &this.images {
            let view = create_color_view(&this.device, image, format.format)?;
            this.image_views.push(view);
        }

        log::info!(
            "Swapchain ready: {}x{}, {:?}/{:?}, {:?}, {} image(s)",
            extent.width,
            extent.height,
            format.format,
            format.color_space,
            present_mode,
            this.images.len()
        );
        Ok(this)
    }

    /// Image size
    #[must_use]
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Surface format in use
    #[must_use]
    pub const fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Present mode in use
    #[must_use]
    pub const fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// One view per image, in image order
    #[must_use]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images actually created
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Raw handle
    #[must_use]
    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Extension loader used for acquire and present
    #[must_use]
    pub const fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn create_color_view(device: &Device, image: vk::Image, format: vk::Format) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe { device.create_image_view(&create_info, None) }.check()
}

/// Swapchain plus one framebuffer per image.
///
/// Field order makes the framebuffers drop before the views they reference.
pub struct RenderTargets {
    framebuffers: Vec<Framebuffer>,
    swapchain: Swapchain,
}

impl RenderTargets {
    /// Build a swapchain and its framebuffers for `render_pass`
    pub fn new(
        device: &Device,
        swapchain_loader: &SwapchainLoader,
        surface: &PresentationSurface,
        physical: &PhysicalDeviceInfo,
        render_pass: vk::RenderPass,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let swapchain = Swapchain::new(
            device.clone(),
            swapchain_loader.clone(),
            surface,
            physical,
            window_extent,
        )?;
        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| Framebuffer::new(device.clone(), render_pass, &[view], swapchain.extent()))
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self { framebuffers, swapchain })
    }

    /// The swapchain
    #[must_use]
    pub const fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Framebuffer for swapchain image `index`
    #[must_use]
    pub fn framebuffer(&self, index: usize) -> Option<&Framebuffer> {
        self.framebuffers.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 4096, height: 2160 },
            ..Default::default()
        }
    }

    #[test]
    fn test_preferred_format_wins() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&available), Some(available[1]));
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&available), Some(available[0]));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_present_mode_policy() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_image_count_capped() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
    }

    #[test]
    fn test_extent_uses_current_when_defined() {
        let mut surface = caps(2, 3);
        surface.current_extent = vk::Extent2D { width: 800, height: 600 };

        let extent = choose_extent(&surface, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_extent_clamps_window_size() {
        let surface = caps(2, 3);

        let large = choose_extent(&surface, vk::Extent2D { width: 10_000, height: 10 });
        assert_eq!(large, vk::Extent2D { width: 4096, height: 64 });

        let fits = choose_extent(&surface, vk::Extent2D { width: 1280, height: 720 });
        assert_eq!(fits, vk::Extent2D { width: 1280, height: 720 });
    }
}
