//! Vulkan graphics core

use std::path::Path;

use ash::extensions::khr::Surface;
use ash::vk;
use slotmap::SecondaryMap;

use super::device::{LogicalDevice, PhysicalDeviceInfo, PresentationSurface};
use super::error::{VulkanError, VulkanResult};
use super::instance::VulkanInstance;
use super::render_pass::RenderPass;
use super::resources::ResourceManager;
use super::scheduler::{FrameScheduler, SwapchainContext};
use super::swapchain::query_surface_format;
use super::VulkanSurfaceSource;
use crate::config::{GraphicsSettings, StartupConfig};
use crate::render::{FrameOutcome, GraphicsBackend, ModelHandle, ShaderHandle, Vertex};
use crate::scene::{Camera, GameObject, GameObjectId, SceneState, TransformMut};

const APPLICATION_NAME: &str = "Ngine Runtime";

/// Color format of the render pass when no surface dictates one
const HEADLESS_COLOR_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

/// Vulkan implementation of [`GraphicsBackend`]
pub struct VulkanBackend {
    // Field order is teardown order.
    scene: SceneState,
    instances: SecondaryMap<GameObjectId, usize>,
    scheduler: Option<FrameScheduler>,
    resources: ResourceManager,
    render_pass: RenderPass,
    device: LogicalDevice,
    physical: PhysicalDeviceInfo,
    surface: Option<PresentationSurface>,
    instance: VulkanInstance,
}

impl VulkanBackend {
    /// Backend presenting to `window`
    pub fn new(window: &mut dyn VulkanSurfaceSource, config: &StartupConfig) -> VulkanResult<Self> {
        let extensions = window.required_instance_extensions()?;
        let instance = VulkanInstance::new(APPLICATION_NAME, &extensions, config.graphics.enable_debug_mode)?;

        let surface = PresentationSurface {
            loader: Surface::new(&instance.entry, &instance.instance),
            surface: window.create_surface(instance.instance.handle())?,
        };
        log::info!(
            "Presentation surface created ({})",
            if window.is_fullscreen() { "fullscreen" } else { "windowed" }
        );

        let physical = PhysicalDeviceInfo::select(&instance.instance, Some(&surface), &config.graphics)?;
        let device = LogicalDevice::new(&instance.instance, &physical, true)?;

        let format = query_surface_format(&surface, &physical)?;
        let render_pass = RenderPass::new_present_pass(device.device.clone(), format.format)?;
        let resources = ResourceManager::new(
            &device.device,
            physical.memory_properties,
            physical.queue_families.graphics,
            device.graphics_queue,
        )?;

        let (width, height) = window.framebuffer_size();
        let context = SwapchainContext {
            surface: &surface,
            physical: &physical,
            render_pass: render_pass.handle(),
        };
        let scheduler = FrameScheduler::new(
            &device,
            &context,
            vk::Extent2D {
                width: width.max(1),
                height: height.max(1),
            },
        )?;

        Ok(Self {
            scene: SceneState::new(),
            instances: SecondaryMap::new(),
            scheduler: Some(scheduler),
            resources,
            render_pass,
            device,
            physical,
            surface: Some(surface),
            instance,
        })
    }

    /// Backend without a surface, for uploads and read-backs
    pub fn new_headless(settings: &GraphicsSettings) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(APPLICATION_NAME, &[], settings.enable_debug_mode)?;
        let physical = PhysicalDeviceInfo::select(&instance.instance, None, settings)?;
        let device = LogicalDevice::new(&instance.instance, &physical, false)?;
        let render_pass = RenderPass::new_present_pass(device.device.clone(), HEADLESS_COLOR_FORMAT)?;
        let resources = ResourceManager::new(
            &device.device,
            physical.memory_properties,
            physical.queue_families.graphics,
            device.graphics_queue,
        )?;
        log::info!("Headless graphics core ready on {}", physical.name());

        Ok(Self {
            scene: SceneState::new(),
            instances: SecondaryMap::new(),
            scheduler: None,
            resources,
            render_pass,
            device,
            physical,
            surface: None,
            instance,
        })
    }

    /// GPU name
    #[must_use]
    pub fn adapter_name(&self) -> String {
        self.physical.name()
    }

    /// Whether the validation layer is active
    #[must_use]
    pub const fn debug_enabled(&self) -> bool {
        self.instance.debug_enabled()
    }

    /// Resource manager, for direct uploads and read-backs
    #[must_use]
    pub const fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Draw list and camera
    #[must_use]
    pub const fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Frame slot the next tick uses, when presenting
    #[must_use]
    pub fn current_frame(&self) -> Option<usize> {
        self.scheduler.as_ref().map(FrameScheduler::current_frame)
    }

    /// Rebuild the swapchain for the window's current size
    pub fn recreate_swapchain(&mut self, window: &dyn VulkanSurfaceSource) -> VulkanResult<()> {
        let (Some(scheduler), Some(surface)) = (self.scheduler.as_mut(), self.surface.as_ref()) else {
            return Err(VulkanError::NoPresentation);
        };
        let (width, height) = window.framebuffer_size();
        let context = SwapchainContext {
            surface,
            physical: &self.physical,
            render_pass: self.render_pass.handle(),
        };
        scheduler.recreate_swapchain(
            &context,
            vk::Extent2D {
                width: width.max(1),
                height: height.max(1),
            },
        )
    }
}

impl GraphicsBackend for VulkanBackend {
    type Window = dyn VulkanSurfaceSource;
    type Error = VulkanError;

    fn new(window: &mut Self::Window, config: &StartupConfig) -> VulkanResult<Self> {
        Self::new(window, config)
    }

    fn load_shader(&mut self, vertex_path: &Path, fragment_path: &Path) -> VulkanResult<ShaderHandle> {
        self.resources
            .load_shader(self.render_pass.handle(), vertex_path, fragment_path)
    }

    fn create_model_from_vertex_list(&mut self, vertices: &[Vertex], indices: &[u32]) -> VulkanResult<ModelHandle> {
        self.resources.create_model_from_vertex_list(vertices, indices)
    }

    fn load_model_from_file(&mut self, path: &Path) -> VulkanResult<ModelHandle> {
        self.resources.load_model_from_file(path)
    }

    fn add_game_object_to_draw_list(&mut self, object: GameObject) -> VulkanResult<GameObjectId> {
        if !self.resources.has_shader(object.shader()) {
            return Err(VulkanError::UnknownShader(object.shader()));
        }
        let instance = self.resources.claim_instance(object.model())?;
        let id = self.scene.draw_list_mut().push(object);
        self.instances.insert(id, instance);
        log::debug!("Draw list holds {} object(s)", self.scene.draw_list().len());
        Ok(id)
    }

    fn game_object_mut(&mut self, id: GameObjectId) -> Option<TransformMut<'_>> {
        self.scene.draw_list_mut().get_mut(id)
    }

    fn remove_game_object(&mut self, id: GameObjectId) -> Option<GameObject> {
        let object = self.scene.draw_list_mut().remove(id)?;
        if let Some(instance) = self.instances.remove(id) {
            self.resources.release_instance(object.model(), instance);
        }
        Some(object)
    }

    fn destroy_model(&mut self, handle: ModelHandle) -> VulkanResult<()> {
        if self.scene.draw_list().references_model(handle) {
            return Err(VulkanError::ModelInUse(handle));
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.wait_all()?;
        }
        self.resources.destroy_model(handle)
    }

    fn set_camera(&mut self, camera: &Camera) {
        if self.scene.set_camera(camera) {
            log::trace!("Camera revision {}", self.scene.camera_revision());
        }
    }

    fn draw_frame(&mut self, window: &mut Self::Window) -> VulkanResult<FrameOutcome> {
        let (Some(scheduler), Some(surface)) = (self.scheduler.as_mut(), self.surface.as_ref()) else {
            return Err(VulkanError::NoPresentation);
        };
        let context = SwapchainContext {
            surface,
            physical: &self.physical,
            render_pass: self.render_pass.handle(),
        };
        scheduler.draw_frame(&context, window, &mut self.resources, &self.scene, &self.instances)
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        if let Some(scheduler) = &self.scheduler {
            scheduler.wait_all()?;
        }
        self.device.wait_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(err) = self.wait_idle() {
            log::error!("Device did not go idle before shutdown: {}", err);
        }
    }
}
