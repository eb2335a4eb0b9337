//! Texture loading and GPU upload.
//!
//! PNG images are decoded with the `image` crate, staged in a host-visible
//! buffer, and copied into a device-local image with a one-time command
//! submission. Multiple files of identical dimensions load as the layers of
//! a 2D array image (the tree sprite sheet).

use std::path::Path;

use ash::{vk, Device, Instance};

use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Device-local sampled image with RAII cleanup
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    layer_count: u32,
}

impl Texture {
    /// Load a single 2D texture from a PNG file.
    pub fn from_file(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        path: &Path,
    ) -> VulkanResult<Self> {
        Self::from_files(
            device,
            instance,
            physical_device,
            command_pool,
            queue,
            std::slice::from_ref(&path.to_path_buf()),
        )
    }

    /// Load one or more equally sized PNG files; more than one file produces
    /// a 2D array image with one layer per file.
    pub fn from_files(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        paths: &[std::path::PathBuf],
    ) -> VulkanResult<Self> {
        if paths.is_empty() {
            return Err(VulkanError::TextureLoad {
                path: String::new(),
                reason: "no files given".to_string(),
            });
        }

        let mut pixels: Vec<u8> = Vec::new();
        let mut dimensions: Option<(u32, u32)> = None;
        for path in paths {
            let image = image::open(path).map_err(|e| VulkanError::TextureLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let rgba = image.to_rgba8();
            let (width, height) = rgba.dimensions();
            match dimensions {
                None => dimensions = Some((width, height)),
                Some(expected) if expected != (width, height) => {
                    return Err(VulkanError::TextureLoad {
                        path: path.display().to_string(),
                        reason: format!(
                            "array layer size {}x{} does not match {}x{}",
                            width, height, expected.0, expected.1
                        ),
                    });
                }
                Some(_) => {}
            }
            pixels.extend_from_slice(rgba.as_raw());
        }
        let (width, height) = dimensions.ok_or_else(|| VulkanError::TextureLoad {
            path: String::new(),
            reason: "no image data".to_string(),
        })?;
        let layer_count = paths.len() as u32;

        log::debug!(
            "Loaded texture {} ({}x{}, {} layer(s))",
            paths[0].display(),
            width,
            height,
            layer_count
        );

        let staging = Buffer::new(
            device.clone(),
            instance,
            physical_device,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(&pixels)?;

        let (image, memory) = Self::create_image(
            &device,
            instance,
            physical_device,
            width,
            height,
            layer_count,
        )?;

        Self::upload(
            &device,
            command_pool,
            queue,
            staging.handle(),
            image,
            width,
            height,
            layer_count,
        )?;

        let view_type = if layer_count > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(view_type)
            .format(vk::Format::R8G8B8A8_SRGB)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count,
            });
        let view = unsafe {
            device
                .create_image_view(&view_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            image,
            memory,
            view,
            layer_count,
        })
    }

    fn create_image(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        width: u32,
        height: u32,
        layer_count: u32,
    ) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(layer_count)
            .format(vk::Format::R8G8B8A8_SRGB)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let mut memory_type_index = None;
        for i in 0..properties.memory_type_count {
            if (requirements.memory_type_bits & (1 << i)) != 0
                && properties.memory_types[i as usize]
                    .property_flags
                    .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL)
            {
                memory_type_index = Some(i);
                break;
            }
        }
        let memory_type_index = memory_type_index.ok_or(VulkanError::NoSuitableMemoryType)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe {
            device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };
        unsafe {
            device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }
        Ok((image, memory))
    }

    #[allow(clippy::too_many_arguments)]
    fn upload(
        device: &Device,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        staging: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
        layer_count: u32,
    ) -> VulkanResult<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?[0]
        };

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count,
        };

        let to_transfer = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .build();

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count,
            })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .build();

        let to_sampled = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .build();

        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );
            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_sampled],
            );
            device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();
        unsafe {
            device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            device.queue_wait_idle(queue).map_err(VulkanError::Api)?;
            device.free_command_buffers(command_pool, &command_buffers);
        }
        Ok(())
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
