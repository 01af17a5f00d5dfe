//! Frame scheduler
//!
//! One call to [`FrameScheduler::draw_frame`] is one tick: wait on the slot's
//! fence, acquire an image, refresh stale uniforms for that slot, record and
//! submit the draw list, present, advance. Out-of-date and suboptimal
//! swapchains are rebuilt here and never reach the caller as errors.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};
use slotmap::SecondaryMap;

use super::commands::{CommandPool, CommandRecorder};
use super::device::{LogicalDevice, PhysicalDeviceInfo, PresentationSurface};
use super::error::{VkResultExt, VulkanError, VulkanResult};
use super::resources::{ResourceManager, UniformStamp};
use super::swapchain::RenderTargets;
use super::sync::{FrameSync, Semaphore};
use crate::render::frame::{FrameOutcome, FrameRing, MAX_FRAMES_IN_FLIGHT};
use crate::render::MvpBlock;
use crate::scene::{GameObjectId, SceneState};
use crate::window::RenderWindow;

/// Background color of every frame
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.2, 0.6, 1.0];

/// What swapchain (re)creation needs besides the device
pub struct SwapchainContext<'a> {
    /// Surface presented to
    pub surface: &'a PresentationSurface,
    /// Adapter the surface is queried on
    pub physical: &'a PhysicalDeviceInfo,
    /// Pass the framebuffers are built for
    pub render_pass: vk::RenderPass,
}

struct MeshDraw {
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    index_count: u32,
}

struct DrawCall {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    descriptor_set: vk::DescriptorSet,
    meshes: Vec<MeshDraw>,
}

/// Per-frame synchronization, command buffers and render targets
pub struct FrameScheduler {
    ring: FrameRing<FrameSync>,
    targets: Option<RenderTargets>,
    command_pool: CommandPool,
    swapchain_loader: SwapchainLoader,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    device: Device,
}

impl FrameScheduler {
    /// Build the frame ring and the first swapchain
    pub fn new(
        logical: &LogicalDevice,
        context: &SwapchainContext<'_>,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let device = logical.device.clone();
        let swapchain_loader = logical.swapchain_loader.clone().ok_or(VulkanError::NoPresentation)?;

        let command_pool = CommandPool::new(device.clone(), context.physical.queue_families.graphics)?;
        let slot_count = u32::try_from(MAX_FRAMES_IN_FLIGHT).unwrap_or(u32::MAX);
        let command_buffers = command_pool.allocate_command_buffers(slot_count)?;
        let ring = FrameRing::new(|slot| FrameSync::new(&device, command_buffers[slot]))?;
        log::debug!("Created {} frame slot(s)", ring.len());

        let targets = RenderTargets::new(
            &device,
            &swapchain_loader,
            context.surface,
            context.physical,
            context.render_pass,
            window_extent,
        )?;

        Ok(Self {
            ring,
            targets: Some(targets),
            command_pool,
            swapchain_loader,
            graphics_queue: logical.graphics_queue,
            present_queue: logical.present_queue,
            device,
        })
    }

    /// Current render targets; absent only while a rebuild failed
    #[must_use]
    pub const fn targets(&self) -> Option<&RenderTargets> {
        self.targets.as_ref()
    }

    /// Frame slot the next tick uses
    #[must_use]
    pub const fn current_frame(&self) -> usize {
        self.ring.current_index()
    }

    /// Command pool the slot command buffers come from
    #[must_use]
    pub const fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Run one tick for the current draw list
    pub fn draw_frame<W: RenderWindow + ?Sized>(
        &mut self,
        context: &SwapchainContext<'_>,
        window: &mut W,
        resources: &mut ResourceManager,
        scene: &SceneState,
        instances: &SecondaryMap<GameObjectId, usize>,
    ) -> VulkanResult<FrameOutcome> {
        let (width, height) = window.framebuffer_size();
        if width == 0 || height == 0 {
            log::trace!("Window has no drawable area, skipping frame");
            return Ok(FrameOutcome::Skipped);
        }
        let window_extent = vk::Extent2D { width, height };

        if self.targets.is_none() {
            self.recreate_swapchain(context, window_extent)?;
            return Ok(FrameOutcome::Recreated);
        }

        self.ring.begin_frame()?;

        if window.take_resize_pending() {
            self.ring.abandon_frame();
            self.recreate_swapchain(context, window_extent)?;
            return Ok(FrameOutcome::Recreated);
        }

        let draws = match collect_draws(resources, scene, instances, self.ring.current_index()) {
            Ok(draws) => draws,
            Err(err) => {
                self.ring.abandon_frame();
                return Err(err);
            }
        };

        let sync = self.ring.current();
        let image_available = sync.image_available.handle();
        let render_finished = sync.render_finished.handle();

        let Some(targets) = self.targets.as_ref() else {
            self.ring.abandon_frame();
            return Ok(FrameOutcome::Skipped);
        };
        let swapchain = targets.swapchain().handle();

        let acquired = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, image_available, vk::Fence::null())
        };
        let image_index = match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!("Acquired image {} from a suboptimal swapchain", index);
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.ring.abandon_frame();
                self.recreate_swapchain(context, window_extent)?;
                return Ok(FrameOutcome::Recreated);
            }
            Err(err) => {
                self.ring.abandon_frame();
                log::error!("Swapchain image acquisition failed: {:?}", err);
                return Err(VulkanError::api(err));
            }
        };
        if let Err(err) = self.record_and_submit(context.render_pass, image_index, resources, scene, instances, &draws) {
            log::error!("Frame slot {} failed before submission: {}", self.ring.current_index(), err);
            if let Err(cleanup) = self.discard_failed_frame() {
                log::error!("Could not release the failed frame: {}", cleanup);
            }
            return Err(err);
        }
        self.ring.mark_submitted();

        let swapchains = [swapchain];
        let image_indices = [image_index];
        let signal_semaphores = [render_finished];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let presented = unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) };
        self.ring.mark_presenting();
        self.ring.finish_frame();

        match presented {
            Ok(false) => Ok(FrameOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain(context, window_extent)?;
                Ok(FrameOutcome::Recreated)
            }
            Err(err) => {
                log::error!("Presentation failed: {:?}", err);
                Err(VulkanError::api(err))
            }
        }
    }

    /// Reset the slot, refresh its uniforms, record the draw list and submit it.
    ///
    /// On error the slot is left for [`FrameRing::fail_frame`].
    fn record_and_submit(
        &mut self,
        render_pass: vk::RenderPass,
        image_index: u32,
        resources: &mut ResourceManager,
        scene: &SceneState,
        instances: &SecondaryMap<GameObjectId, usize>,
        draws: &[DrawCall],
    ) -> VulkanResult<()> {
        let targets = self.targets.as_ref().ok_or(VulkanError::NoPresentation)?;
        let extent = targets.swapchain().extent();
        let framebuffer = targets
            .framebuffer(image_index as usize)
            .map(super::framebuffer::Framebuffer::handle)
            .ok_or_else(|| VulkanError::api(vk::Result::ERROR_OUT_OF_DATE_KHR))?;

        let sync = self.ring.current();
        let image_available = sync.image_available.handle();
        let render_finished = sync.render_finished.handle();
        let in_flight = sync.in_flight.handle();
        let command_buffer = sync.command_buffer;

        self.ring.begin_recording()?;
        let slot = self.ring.writable_slot();
        update_uniforms(resources, scene, instances, slot)?;

        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .check()?;
        }
        record_draws(&self.device, command_buffer, render_pass, framebuffer, extent, draws)?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], in_flight)
                .check()?;
        }
        Ok(())
    }

    /// Return a slot that failed after acquisition to the ring.
    ///
    /// The acquired image is never presented, so the swapchain is dropped and
    /// the slot's acquire semaphore replaced; the next tick rebuilds targets.
    fn discard_failed_frame(&mut self) -> VulkanResult<()> {
        self.ring.fail_frame();
        unsafe { self.device.device_wait_idle() }.check()?;
        self.targets = None;
        self.ring.current_mut().image_available = Semaphore::new(self.device.clone())?;
        Ok(())
    }

    /// Rebuild the swapchain, its views and framebuffers for `window_extent`.
    ///
    /// Blocks on every in-flight fence and on device idle before anything
    /// swapchain-derived is destroyed. The render pass is kept.
    pub fn recreate_swapchain(
        &mut self,
        context: &SwapchainContext<'_>,
        window_extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        self.ring.wait_all()?;
        unsafe { self.device.device_wait_idle() }.check()?;

        self.targets = None;
        self.targets = Some(RenderTargets::new(
            &self.device,
            &self.swapchain_loader,
            context.surface,
            context.physical,
            context.render_pass,
            window_extent,
        )?);
        log::info!(
            "Swapchain recreated for {}x{}",
            window_extent.width,
            window_extent.height
        );
        Ok(())
    }

    /// Block until every frame slot's submission has completed
    pub fn wait_all(&self) -> VulkanResult<()> {
        self.ring.wait_all()
    }
}

/// Resolve handles for every draw-list entry before the slot's fence is reset
fn collect_draws(
    resources: &ResourceManager,
    scene: &SceneState,
    instances: &SecondaryMap<GameObjectId, usize>,
    slot: usize,
) -> VulkanResult<Vec<DrawCall>> {
    let mut draws = Vec::with_capacity(scene.draw_list().len());
    for (id, object) in scene.draw_list().iter() {
        let Some(&instance) = instances.get(id) else {
            continue;
        };
        let pipeline = resources.shader(object.shader())?.pipeline();
        let model = resources.model(object.model())?;
        let uniforms = model
            .instance(instance)
            .ok_or(VulkanError::UnknownModel(object.model()))?;

        draws.push(DrawCall {
            pipeline: pipeline.handle(),
            layout: pipeline.layout(),
            descriptor_set: uniforms.descriptor_set(slot),
            meshes: model
                .meshes()
                .iter()
                .map(|mesh| MeshDraw {
                    vertex_buffer: mesh.vertex_buffer().handle(),
                    index_buffer: mesh.index_buffer().handle(),
                    index_count: mesh.index_count(),
                })
                .collect(),
        });
    }
    Ok(draws)
}

/// Rewrite the slot's uniform block of every entry whose camera or transform moved
fn update_uniforms(
    resources: &mut ResourceManager,
    scene: &SceneState,
    instances: &SecondaryMap<GameObjectId, usize>,
    slot: usize,
) -> VulkanResult<()> {
    let camera = scene.camera();
    let mut written = 0_usize;

    for (id, object) in scene.draw_list().iter() {
        let Some(&instance) = instances.get(id) else {
            continue;
        };
        let stamp = UniformStamp {
            camera: scene.camera_revision(),
            object: object.revision(),
        };
        let uniforms = resources
            .model_mut(object.model())?
            .instance_mut(instance)
            .ok_or(VulkanError::UnknownModel(object.model()))?;

        if uniforms.is_stale(slot, stamp) {
            let block = MvpBlock::new(
                object.world_matrix(),
                camera.view_matrix(),
                camera.projection_matrix(),
            );
            uniforms.write(slot, &block, stamp);
            written += 1;
        }
    }

    log::trace!("Frame slot {}: {} uniform block(s) refreshed", slot, written);
    Ok(())
}

fn record_draws(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    draws: &[DrawCall],
) -> VulkanResult<()> {
    let mut recorder = CommandRecorder::begin(device.clone(), command_buffer, vk::CommandBufferUsageFlags::empty())?;

    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue { float32: CLEAR_COLOR },
    }];
    #[allow(clippy::cast_precision_loss)]
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };

    {
        let mut pass = recorder.begin_render_pass(render_pass, framebuffer, render_area, &clear_values);
        pass.set_viewport(&viewport);
        pass.set_scissor(&render_area);

        for draw in draws {
            pass.bind_pipeline(draw.pipeline);
            pass.bind_descriptor_set(draw.layout, draw.descriptor_set);
            for mesh in &draw.meshes {
                pass.bind_vertex_buffer(mesh.vertex_buffer);
                pass.bind_index_buffer(mesh.index_buffer);
                pass.draw_indexed(mesh.index_count);
            }
        }
    }

    recorder.end()?;
    Ok(())
}
