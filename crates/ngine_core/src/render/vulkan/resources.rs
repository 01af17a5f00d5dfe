//! Resource manager: shaders, meshes, models and their uniform buffers
//!
//! Everything GPU-resident that outlives a frame is owned here and reached
//! through [`ShaderHandle`] and [`ModelHandle`]. Geometry is uploaded into
//! device-local memory through a staging buffer and a blocking one-shot
//! transfer, so a returned mesh is always fully populated.

use std::collections::BTreeMap;
use std::path::Path;

use ash::{vk, Device};
use bytemuck::Pod;

use super::buffer::{byte_size, Buffer, MappedUniformBuffer};
use super::commands::CommandPool;
use super::descriptor::{DescriptorAllocator, DescriptorSetGroup, DescriptorSetLayout};
use super::error::{VkResultExt, VulkanError, VulkanResult};
use super::shader::ShaderProgram;
use crate::assets;
use crate::render::frame::MAX_FRAMES_IN_FLIGHT;
use crate::render::handles::HandleCounter;
use crate::render::{ModelHandle, MvpBlock, ShaderHandle, Vertex};

/// Inputs a uniform block was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformStamp {
    /// Scene camera revision
    pub camera: u64,
    /// Game object transform revision
    pub object: u64,
}

/// Last stamp written into each frame slot
#[derive(Debug, Clone, Default)]
pub struct SlotStamps {
    written: Vec<Option<UniformStamp>>,
}

impl SlotStamps {
    /// `slots` entries, all stale
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            written: vec![None; slots],
        }
    }

    /// Whether slot `slot` holds data older than `stamp`
    #[must_use]
    pub fn is_stale(&self, slot: usize, stamp: UniformStamp) -> bool {
        self.written.get(slot).map_or(true, |written| *written != Some(stamp))
    }

    /// Record that `slot` now holds `stamp`
    pub fn record(&mut self, slot: usize, stamp: UniformStamp) {
        if let Some(entry) = self.written.get_mut(slot) {
            *entry = Some(stamp);
        }
    }

    /// Mark every slot stale
    pub fn invalidate(&mut self) {
        self.written.iter_mut().for_each(|entry| *entry = None);
    }
}

/// Which uniform instances of a model are held by draw-list entries
#[derive(Debug, Clone, Default)]
pub struct ClaimTable {
    claimed: Vec<bool>,
}

impl ClaimTable {
    /// Claim the lowest free instance, if any
    pub fn claim_free(&mut self) -> Option<usize> {
        let index = self.claimed.iter().position(|claimed| !claimed)?;
        self.claimed[index] = true;
        Some(index)
    }

    /// Register a new instance, already claimed
    pub fn push_claimed(&mut self) -> usize {
        self.claimed.push(true);
        self.claimed.len() - 1
    }

    /// Register a new, unclaimed instance
    pub fn push_free(&mut self) {
        self.claimed.push(false);
    }

    /// Return an instance
    pub fn release(&mut self, index: usize) {
        if let Some(claimed) = self.claimed.get_mut(index) {
            *claimed = false;
        }
    }

    /// Number of claimed instances
    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.claimed.iter().filter(|claimed| **claimed).count()
    }
}

/// One mapped uniform buffer and one descriptor set per frame slot
pub struct UniformSet {
    buffers: Vec<MappedUniformBuffer<MvpBlock>>,
    descriptors: DescriptorSetGroup,
    stamps: SlotStamps,
}

impl UniformSet {
    /// Descriptor set bound when drawing from frame slot `slot`
    #[must_use]
    pub fn descriptor_set(&self, slot: usize) -> vk::DescriptorSet {
        self.descriptors.sets[slot]
    }

    /// Whether slot `slot` must be rewritten for `stamp`
    #[must_use]
    pub fn is_stale(&self, slot: usize, stamp: UniformStamp) -> bool {
        self.stamps.is_stale(slot, stamp)
    }

    /// Write `block` into slot `slot`'s mapped memory.
    ///
    /// The caller must have waited on that slot's fence.
    pub fn write(&mut self, slot: usize, block: &MvpBlock, stamp: UniformStamp) {
        self.buffers[slot].write(block);
        self.stamps.record(slot, stamp);
    }

    /// Number of frame slots covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// True when no slots are covered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Device-local vertex and index buffers
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl Mesh {
    /// Vertex buffer
    #[must_use]
    pub const fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    /// 32-bit index buffer
    #[must_use]
    pub const fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// Indices drawn per instance
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Meshes plus the uniform instances handed out to draw-list entries
pub struct Model {
    meshes: Vec<Mesh>,
    instances: Vec<UniformSet>,
    claims: ClaimTable,
}

impl Model {
    /// Meshes, in import order
    #[must_use]
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Uniform instance `index`
    #[must_use]
    pub fn instance(&self, index: usize) -> Option<&UniformSet> {
        self.instances.get(index)
    }

    /// Uniform instance `index`, mutable
    pub fn instance_mut(&mut self, index: usize) -> Option<&mut UniformSet> {
        self.instances.get_mut(index)
    }

    /// Number of uniform instances created so far
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Owner of every shader program, mesh and model
pub struct ResourceManager {
    // Declaration order is drop order: sets and buffers go before their pools and layouts.
    models: BTreeMap<ModelHandle, Model>,
    shaders: BTreeMap<ShaderHandle, ShaderProgram>,
    descriptors: DescriptorAllocator,
    mvp_layout: DescriptorSetLayout,
    transfer_pool: CommandPool,
    transfer_queue: vk::Queue,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    shader_ids: HandleCounter,
    model_ids: HandleCounter,
    device: Device,
}

impl ResourceManager {
    /// Manager submitting transfers to `queue` from family `queue_family`
    pub fn new(
        device: &Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        queue_family: u32,
        queue: vk::Queue,
    ) -> VulkanResult<Self> {
        Ok(Self {
            models: BTreeMap::new(),
            shaders: BTreeMap::new(),
            descriptors: DescriptorAllocator::new(device.clone())?,
            mvp_layout: DescriptorSetLayout::mvp(device)?,
            transfer_pool: CommandPool::new(device.clone(), queue_family)?,
            transfer_queue: queue,
            memory_properties,
            shader_ids: HandleCounter::default(),
            model_ids: HandleCounter::default(),
            device: device.clone(),
        })
    }

    /// Layout shared by every shader's uniform block
    #[must_use]
    pub const fn mvp_layout(&self) -> vk::DescriptorSetLayout {
        self.mvp_layout.handle()
    }

    /// Load a vertex/fragment SPIR-V pair and build its pipeline.
    ///
    /// A failure allocates no handle and leaves loaded shaders untouched.
    pub fn load_shader(
        &mut self,
        render_pass: vk::RenderPass,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> VulkanResult<ShaderHandle> {
        let program = ShaderProgram::load(
            &self.device,
            render_pass,
            self.mvp_layout.handle(),
            vertex_path,
            fragment_path,
        )?;
        let handle = ShaderHandle(self.shader_ids.allocate());
        log::info!(
            "Loaded {} from {} + {}",
            handle,
            vertex_path.display(),
            fragment_path.display()
        );
        self.shaders.insert(handle, program);
        Ok(handle)
    }

    /// Shader program behind `handle`
    pub fn shader(&self, handle: ShaderHandle) -> VulkanResult<&ShaderProgram> {
        self.shaders.get(&handle).ok_or(VulkanError::UnknownShader(handle))
    }

    /// Whether `handle` names a loaded shader
    #[must_use]
    pub fn has_shader(&self, handle: ShaderHandle) -> bool {
        self.shaders.contains_key(&handle)
    }

    /// Copy `data` into a new device-local buffer through a staging buffer.
    ///
    /// Blocks until the transfer queue is idle; on failure no buffer survives.
    pub fn upload_device_local<T: Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
        what: &'static str,
    ) -> VulkanResult<Buffer> {
        let size = byte_size(data, what)?;

        let staging = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytemuck::cast_slice(data))?;

        let destination = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.transfer_pool.submit_one_shot(self.transfer_queue, |recorder| {
            recorder.copy_buffer(staging.handle(), destination.handle(), size);
            Ok(())
        })?;
        log::trace!("Uploaded {} bytes of {} data", size, what);

        Ok(destination)
    }

    /// Copy a device-local buffer back to the host
    pub fn read_back_buffer(&self, buffer: &Buffer) -> VulkanResult<Vec<u8>> {
        let readback = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            buffer.size(),
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        self.transfer_pool.submit_one_shot(self.transfer_queue, |recorder| {
            recorder.copy_buffer(buffer.handle(), readback.handle(), buffer.size());
            Ok(())
        })?;
        readback.read_bytes()
    }

    /// Upload one mesh's vertex and index data
    pub fn upload_vertex_index_data(&self, vertices: &[Vertex], indices: &[u32]) -> VulkanResult<Mesh> {
        let index_count = u32::try_from(indices.len()).map_err(|_| VulkanError::IndexOverflow(indices.len()))?;
        let vertex_buffer = self.upload_device_local(vertices, vk::BufferUsageFlags::VERTEX_BUFFER, "vertex")?;
        let index_buffer = self.upload_device_local(indices, vk::BufferUsageFlags::INDEX_BUFFER, "index")?;

        Ok(Mesh {
            vertex_buffer,
            index_buffer,
            index_count,
        })
    }

    /// Create `count` mapped uniform buffers and point one descriptor set at each
    pub fn create_uniform_buffers(&mut self, count: usize) -> VulkanResult<UniformSet> {
        let buffers = (0..count)
            .map(|_| MappedUniformBuffer::<MvpBlock>::new(self.device.clone(), &self.memory_properties))
            .collect::<VulkanResult<Vec<_>>>()?;
        let descriptors = self.descriptors.allocate(self.mvp_layout.handle(), count)?;

        for (&set, buffer) in descriptors.sets.iter().zip(&buffers) {
            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: buffer.size(),
            }];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info)
                .build();
            unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        }

        Ok(UniformSet {
            buffers,
            descriptors,
            stamps: SlotStamps::new(count),
        })
    }

    /// Register uploaded meshes as a model with its first uniform instance
    pub fn create_model(&mut self, meshes: Vec<Mesh>) -> VulkanResult<ModelHandle> {
        let first = self.create_uniform_buffers(MAX_FRAMES_IN_FLIGHT)?;
        let mut claims = ClaimTable::default();
        claims.push_free();

        let handle = ModelHandle(self.model_ids.allocate());
        self.models.insert(
            handle,
            Model {
                meshes,
                instances: vec![first],
                claims,
            },
        );
        Ok(handle)
    }

    /// Upload a single mesh and wrap it in a model
    pub fn create_model_from_vertex_list(&mut self, vertices: &[Vertex], indices: &[u32]) -> VulkanResult<ModelHandle> {
        let mesh = self.upload_vertex_index_data(vertices, indices)?;
        let handle = self.create_model(vec![mesh])?;
        log::info!(
            "Created {} from {} vertices and {} indices",
            handle,
            vertices.len(),
            indices.len()
        );
        Ok(handle)
    }

    /// Import an OBJ file; every sub-mesh becomes one mesh of the model
    pub fn load_model_from_file(&mut self, path: &Path) -> VulkanResult<ModelHandle> {
        let sub_meshes = assets::load_obj_file(path).map_err(|source| VulkanError::ModelImport {
            path: path.to_path_buf(),
            source,
        })?;

        let meshes = sub_meshes
            .iter()
            .map(|sub_mesh| {
                log::debug!(
                    "Uploading sub-mesh '{}' ({} vertices)",
                    sub_mesh.name,
                    sub_mesh.vertices.len()
                );
                self.upload_vertex_index_data(&sub_mesh.vertices, &sub_mesh.indices)
            })
            .collect::<VulkanResult<Vec<_>>>()?;
        let mesh_count = meshes.len();
        let handle = self.create_model(meshes)?;

        log::info!("Loaded {} from {} ({} mesh(es))", handle, path.display(), mesh_count);
        Ok(handle)
    }

    /// Model behind `handle`
    pub fn model(&self, handle: ModelHandle) -> VulkanResult<&Model> {
        self.models.get(&handle).ok_or(VulkanError::UnknownModel(handle))
    }

    /// Model behind `handle`, mutable
    pub fn model_mut(&mut self, handle: ModelHandle) -> VulkanResult<&mut Model> {
        self.models.get_mut(&handle).ok_or(VulkanError::UnknownModel(handle))
    }

    /// Hand one uniform instance of `handle` to a draw-list entry, creating it if needed
    pub fn claim_instance(&mut self, handle: ModelHandle) -> VulkanResult<usize> {
        let model = self.model_mut(handle)?;
        if let Some(index) = model.claims.claim_free() {
            model.instances[index].stamps.invalidate();
            return Ok(index);
        }

        let set = self.create_uniform_buffers(MAX_FRAMES_IN_FLIGHT)?;
        let model = self.model_mut(handle)?;
        model.instances.push(set);
        let index = model.claims.push_claimed();
        log::debug!("{} grew to {} uniform instance(s)", handle, model.instances.len());
        Ok(index)
    }

    /// Return a uniform instance claimed with [`Self::claim_instance`]
    pub fn release_instance(&mut self, handle: ModelHandle, index: usize) {
        if let Some(model) = self.models.get_mut(&handle) {
            model.claims.release(index);
        }
    }

    /// Wait for the device to go idle and free a model.
    ///
    /// The caller checks that no draw-list entry still references it.
    pub fn destroy_model(&mut self, handle: ModelHandle) -> VulkanResult<()> {
        if !self.models.contains_key(&handle) {
            return Err(VulkanError::UnknownModel(handle));
        }
        unsafe { self.device.device_wait_idle() }.check()?;

        if let Some(model) = self.models.remove(&handle) {
            for instance in &model.instances {
                self.descriptors.free(&instance.descriptors)?;
            }
            log::info!("Destroyed {}", handle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAMP: UniformStamp = UniformStamp { camera: 1, object: 1 };

    #[test]
    fn test_new_slots_are_stale() {
        let stamps = SlotStamps::new(2);
        assert!(stamps.is_stale(0, STAMP));
        assert!(stamps.is_stale(1, STAMP));
    }

    #[test]
    fn test_slots_tracked_independently() {
        let mut stamps = SlotStamps::new(2);
        stamps.record(0, STAMP);

        assert!(!stamps.is_stale(0, STAMP));
        assert!(stamps.is_stale(1, STAMP));

        let moved = UniformStamp { object: 2, ..STAMP };
        assert!(stamps.is_stale(0, moved));
        let camera_moved = UniformStamp { camera: 2, ..STAMP };
        assert!(stamps.is_stale(0, camera_moved));
    }

    #[test]
    fn test_invalidate_marks_everything_stale() {
        let mut stamps = SlotStamps::new(2);
        stamps.record(0, STAMP);
        stamps.record(1, STAMP);
        stamps.invalidate();

        assert!(stamps.is_stale(0, STAMP));
        assert!(stamps.is_stale(1, STAMP));
    }

    #[test]
    fn test_object_built_after_a_write_is_stale() {
        use crate::foundation::math::Vec3;
        use crate::scene::GameObject;

        let written = GameObject::new(ShaderHandle(0), ModelHandle(0)).with_translation(Vec3::new(1.0, 0.0, 0.0));
        let mut stamps = SlotStamps::new(MAX_FRAMES_IN_FLIGHT);
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            stamps.record(slot, UniformStamp { camera: 0, object: written.revision() });
        }

        let rebuilt = GameObject::new(ShaderHandle(0), ModelHandle(7)).with_translation(Vec3::new(50.0, 0.0, 0.0));
        let stamp = UniformStamp { camera: 0, object: rebuilt.revision() };
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            assert!(stamps.is_stale(slot, stamp));
        }
    }

    #[test]
    fn test_claims_reuse_released_instances() {
        let mut claims = ClaimTable::default();
        claims.push_free();

        assert_eq!(claims.claim_free(), Some(0));
        assert_eq!(claims.claim_free(), None);
        assert_eq!(claims.push_claimed(), 1);
        assert_eq!(claims.claimed_count(), 2);

        claims.release(0);
        assert_eq!(claims.claim_free(), Some(0));
        assert_eq!(claims.claimed_count(), 2);
    }
}
