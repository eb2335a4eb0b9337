//! Buffer management for vertex, index, and constant data.
//!
//! Memory management following RAII patterns. Static geometry lives in
//! host-visible buffers written once at scene upload; per-frame constant and
//! dynamic-vertex buffers stay persistently mapped so the update phase can
//! flush its CPU shadows with a single copy.

use std::mem;

use ash::{vk, Device, Instance};
use bytemuck::Pod;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = find_memory_type(
            instance,
            physical_device,
            mem_requirements.memory_type_bits,
            properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Write raw bytes at the start of the buffer via a transient mapping.
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);
        unsafe {
            let dst = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst as *mut u8, bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub(crate) fn memory(&self) -> vk::DeviceMemory {
        self.memory
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

/// Vertex buffer for static, upload-once geometry
pub struct VertexBuffer {
    buffer: Buffer,
}

impl VertexBuffer {
    pub fn new<T: Pod>(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        vertices: &[T],
    ) -> VulkanResult<Self> {
        let size = (vertices.len() * mem::size_of::<T>()) as vk::DeviceSize;
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            size.max(1),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(bytemuck::cast_slice(vertices))?;
        Ok(Self { buffer })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// Index buffer holding 16-bit indices
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        indices: &[u16],
    ) -> VulkanResult<Self> {
        let size = (indices.len() * mem::size_of::<u16>()) as vk::DeviceSize;
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            size.max(1),
            vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(bytemuck::cast_slice(indices))?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Persistently mapped host-visible buffer for per-frame data.
///
/// One of these exists per ring slot per constant array; the ring's fence
/// wait guarantees the GPU is not reading while the CPU rewrites it.
pub struct MappedBuffer {
    buffer: Buffer,
    mapped: *mut u8,
}

impl MappedBuffer {
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device.clone(),
            instance,
            physical_device,
            size.max(1),
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = unsafe {
            device
                .map_memory(buffer.memory(), 0, buffer.size(), vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)? as *mut u8
        };

        Ok(Self { buffer, mapped })
    }

    /// Flush a CPU shadow into the mapped memory.
    pub fn flush(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() as vk::DeviceSize <= self.buffer.size());
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped, bytes.len());
        }
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

/// Find memory type with required properties
fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };

    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && (mem_properties.memory_types[i as usize].property_flags & properties) == properties
        {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}
