//! Descriptor set layouts and allocation
//!
//! Pools are created on demand: when the newest pool is exhausted the
//! allocator opens another one and retries.

use ash::{vk, Device};

use super::error::{VkResultExt, VulkanError, VulkanResult};

/// Sets per pool before the allocator grows
const SETS_PER_POOL: u32 = 64;

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start with no bindings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    #[must_use]
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.check()?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Layout used by every MVP shader: one uniform buffer at binding 0, vertex stage
    pub fn mvp(device: &Device) -> VulkanResult<Self> {
        DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(device)
    }

    /// Get the Vulkan descriptor set layout handle
    #[must_use]
    pub const fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool for uniform-buffer sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Pool holding up to `max_sets` single-uniform-buffer sets; sets may be freed individually
    pub fn new(device: Device, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: max_sets,
        }];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None) }.check()?;
        Ok(Self { pool, device })
    }

    /// Get the pool handle
    #[must_use]
    pub const fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> ash::prelude::VkResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);
        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Descriptor sets allocated together from one pool
pub struct DescriptorSetGroup {
    /// Pool the sets came from
    pub pool: vk::DescriptorPool,
    /// The sets, in request order
    pub sets: Vec<vk::DescriptorSet>,
}

/// Growable descriptor allocator
pub struct DescriptorAllocator {
    device: Device,
    pools: Vec<DescriptorPool>,
}

impl DescriptorAllocator {
    /// Allocator with one initial pool
    pub fn new(device: Device) -> VulkanResult<Self> {
        let first = DescriptorPool::new(device.clone(), SETS_PER_POOL)?;
        Ok(Self {
            device,
            pools: vec![first],
        })
    }

    /// Allocate `count` sets of `layout`, opening a new pool when the current one is full
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout, count: usize) -> VulkanResult<DescriptorSetGroup> {
        let layouts = vec![layout; count];
        if let Some(pool) = self.pools.last() {
            match pool.allocate(&layouts) {
                Ok(sets) => {
                    return Ok(DescriptorSetGroup {
                        pool: pool.handle(),
                        sets,
                    })
                }
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                    log::debug!("Descriptor pool {} exhausted, creating another", self.pools.len() - 1);
                }
                Err(err) => return Err(VulkanError::api(err)),
            }
        }

        let capacity = SETS_PER_POOL.max(u32::try_from(count).unwrap_or(u32::MAX));
        let pool = DescriptorPool::new(self.device.clone(), capacity)?;
        let sets = pool.allocate(&layouts).check()?;
        let group = DescriptorSetGroup {
            pool: pool.handle(),
            sets,
        };
        self.pools.push(pool);
        Ok(group)
    }

    /// Return sets to their pool
    pub fn free(&self, group: &DescriptorSetGroup) -> VulkanResult<()> {
        unsafe { self.device.free_descriptor_sets(group.pool, &group.sets) }.check()
    }
}
