//! Buffer management for vertex data and uniforms
//!
//! Every buffer gets a dedicated allocation from the first memory type that
//! satisfies both the driver's type mask and the requested properties.

use std::ffi::c_void;
use std::marker::PhantomData;

use ash::{vk, Device};
use bytemuck::Pod;

use super::error::{VkResultExt, VulkanError, VulkanResult};

/// Index of the first memory type allowed by `type_bits` that has all `required` flags
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(VulkanError::NoSuitableMemory { type_bits, required })
}

/// Size in bytes of `data`, rejecting empty slices
pub fn byte_size<T>(data: &[T], what: &'static str) -> VulkanResult<vk::DeviceSize> {
    let bytes = std::mem::size_of_val(data);
    if bytes == 0 {
        return Err(VulkanError::EmptyUpload(what));
    }
    Ok(bytes as vk::DeviceSize)
}

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.check()?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = find_memory_type(memory_properties, requirements.memory_type_bits, properties)
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                unsafe { device.allocate_memory(&alloc_info, None) }.check()
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        let this = Self {
            device,
            buffer,
            memory,
            size,
        };
        unsafe { this.device.bind_buffer_memory(buffer, memory, 0) }.check()?;
        Ok(this)
    }

    /// Copy `bytes` to the start of a host-visible buffer
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);
        let ptr = self.map()?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Copy the whole contents of a host-visible buffer out
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_bytes(&self) -> VulkanResult<Vec<u8>> {
        let len = self.size as usize;
        let ptr = self.map()?;
        let mut out = vec![0_u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.cast::<u8>(), out.as_mut_ptr(), len);
            self.device.unmap_memory(self.memory);
        }
        Ok(out)
    }

    fn map(&self) -> VulkanResult<*mut c_void> {
        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .check()
        }
    }

    /// Get buffer handle
    #[must_use]
    pub const fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Requested size in bytes
    #[must_use]
    pub const fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Host-coherent uniform buffer holding one `T`, mapped for its whole life
pub struct MappedUniformBuffer<T> {
    buffer: Buffer,
    mapped: *mut c_void,
    _marker: PhantomData<T>,
}

impl<T: Pod> MappedUniformBuffer<T> {
    /// Allocate and map
    pub fn new(device: Device, memory_properties: &vk::PhysicalDeviceMemoryProperties) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            memory_properties,
            std::mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let mapped = buffer.map()?;
        Ok(Self {
            buffer,
            mapped,
            _marker: PhantomData,
        })
    }

    /// Overwrite the contents; visible to the GPU without a flush
    pub fn write(&mut self, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.cast::<u8>(), bytes.len());
        }
    }

    /// Get buffer handle
    #[must_use]
    pub const fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size in bytes
    #[must_use]
    pub const fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl<T> Drop for MappedUniformBuffer<T> {
    fn drop(&mut self) {
        unsafe {
            self.buffer.device.unmap_memory(self.buffer.memory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &property_flags) in flags.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn test_memory_type_respects_mask_and_flags() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            host,
            host | vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        assert_eq!(find_memory_type(&props, 0b111, host).unwrap(), 1);
        assert_eq!(find_memory_type(&props, 0b100, host).unwrap(), 2);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn test_no_memory_type() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);

        assert!(matches!(
            result,
            Err(VulkanError::NoSuitableMemory { type_bits: 0b1, .. })
        ));
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(byte_size(&[0_u32; 6], "index").unwrap(), 24);
        assert!(matches!(
            byte_size::<u32>(&[], "index"),
            Err(VulkanError::EmptyUpload("index"))
        ));
    }
}
