//! Descriptor layouts, the fixed sampler table, and set allocation.
//!
//! Binding model: set 0 holds the per-pass constants, sets 1 and 2 are
//! dynamic-offset uniform buffers for the object and material arrays, and
//! set 3 is one combined image sampler per texture heap slot. The dynamic
//! offsets are exactly the byte offsets the draw list computes from the
//! stable constant indices.

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Number of shader-visible texture heap slots.
pub const MAX_TEXTURE_SLOTS: usize = 8;

/// The closed set of samplers shaders may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    PointWrap,
    PointClamp,
    LinearWrap,
    LinearClamp,
    AnisotropicWrap,
    AnisotropicClamp,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 6] = [
        SamplerKind::PointWrap,
        SamplerKind::PointClamp,
        SamplerKind::LinearWrap,
        SamplerKind::LinearClamp,
        SamplerKind::AnisotropicWrap,
        SamplerKind::AnisotropicClamp,
    ];

    pub fn index(self) -> usize {
        match self {
            SamplerKind::PointWrap => 0,
            SamplerKind::PointClamp => 1,
            SamplerKind::LinearWrap => 2,
            SamplerKind::LinearClamp => 3,
            SamplerKind::AnisotropicWrap => 4,
            SamplerKind::AnisotropicClamp => 5,
        }
    }

    fn filter(self) -> vk::Filter {
        match self {
            SamplerKind::PointWrap | SamplerKind::PointClamp => vk::Filter::NEAREST,
            _ => vk::Filter::LINEAR,
        }
    }

    fn address_mode(self) -> vk::SamplerAddressMode {
        match self {
            SamplerKind::PointWrap | SamplerKind::LinearWrap | SamplerKind::AnisotropicWrap => {
                vk::SamplerAddressMode::REPEAT
            }
            _ => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }

    fn anisotropy(self) -> Option<f32> {
        match self {
            SamplerKind::AnisotropicWrap | SamplerKind::AnisotropicClamp => Some(8.0),
            _ => None,
        }
    }
}

/// The six fixed samplers, created once and shared by every texture.
pub struct SamplerTable {
    device: Device,
    samplers: [vk::Sampler; 6],
}

impl SamplerTable {
    pub fn new(device: Device) -> VulkanResult<Self> {
        let mut samplers = [vk::Sampler::null(); 6];
        for kind in SamplerKind::ALL {
            let mut info = vk::SamplerCreateInfo::builder()
                .mag_filter(kind.filter())
                .min_filter(kind.filter())
                .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                .address_mode_u(kind.address_mode())
                .address_mode_v(kind.address_mode())
                .address_mode_w(kind.address_mode())
                .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
                .max_lod(vk::LOD_CLAMP_NONE);
            if let Some(max_anisotropy) = kind.anisotropy() {
                info = info.anisotropy_enable(true).max_anisotropy(max_anisotropy);
            }

            samplers[kind.index()] = unsafe {
                device
                    .create_sampler(&info, None)
                    .map_err(VulkanError::Api)?
            };
        }
        Ok(Self { device, samplers })
    }

    pub fn get(&self, kind: SamplerKind) -> vk::Sampler {
        self.samplers[kind.index()]
    }
}

impl Drop for SamplerTable {
    fn drop(&mut self) {
        unsafe {
            for sampler in self.samplers {
                self.device.destroy_sampler(sampler, None);
            }
        }
    }
}

/// The four descriptor set layouts shared by every pipeline.
pub struct DescriptorLayouts {
    device: Device,
    pub pass: vk::DescriptorSetLayout,
    pub object: vk::DescriptorSetLayout,
    pub material: vk::DescriptorSetLayout,
    pub texture: vk::DescriptorSetLayout,
}

impl DescriptorLayouts {
    pub fn new(device: Device) -> VulkanResult<Self> {
        let pass = Self::single_binding_layout(
            &device,
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX
                | vk::ShaderStageFlags::GEOMETRY
                | vk::ShaderStageFlags::FRAGMENT,
        )?;
        let object = Self::single_binding_layout(
            &device,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::GEOMETRY,
        )?;
        let material = Self::single_binding_layout(
            &device,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )?;
        let texture = Self::single_binding_layout(
            &device,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        )?;

        Ok(Self {
            device,
            pass,
            object,
            material,
            texture,
        })
    }

    fn single_binding_layout(
        device: &Device,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(descriptor_type)
            .descriptor_count(1)
            .stage_flags(stages)
            .build()];
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        unsafe {
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Layouts in set-number order, for pipeline layout creation.
    pub fn as_array(&self) -> [vk::DescriptorSetLayout; 4] {
        [self.pass, self.object, self.material, self.texture]
    }
}

impl Drop for DescriptorLayouts {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.pass, None);
            self.device.destroy_descriptor_set_layout(self.object, None);
            self.device.destroy_descriptor_set_layout(self.material, None);
            self.device.destroy_descriptor_set_layout(self.texture, None);
        }
    }
}

/// Fixed-size descriptor pool covering the ring slots and the texture heap.
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(device: Device, ring_depth: usize) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: ring_depth as u32,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: (2 * ring_depth) as u32,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: MAX_TEXTURE_SLOTS as u32,
            },
        ];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets((3 * ring_depth + MAX_TEXTURE_SLOTS) as u32);

        let pool = unsafe {
            device
                .create_descriptor_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, pool })
    }

    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?
        };
        Ok(sets[0])
    }

    /// Point a uniform-buffer descriptor at a buffer. `range` is the bound
    /// window; dynamic bindings use the per-element stride.
    pub fn write_buffer(
        &self,
        set: vk::DescriptorSet,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) {
        let buffer_info = [vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        }];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(descriptor_type)
            .buffer_info(&buffer_info)
            .build();
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    pub fn write_texture(
        &self,
        set: vk::DescriptorSet,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info)
            .build();
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
