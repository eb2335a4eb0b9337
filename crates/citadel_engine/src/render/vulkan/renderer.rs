//! High-level Vulkan renderer.
//!
//! Owns the GPU mirrors of everything the device-free layers produce: one
//! set of mapped constant/vertex buffers per ring slot, static buffers per
//! geometry, the texture heap, and the layer pipelines. Each frame it
//! flushes the current slot's CPU shadows, records the draw list, and
//! submits with the ring's fence value signaled on the timeline semaphore.

use std::path::{Path, PathBuf};

use ash::vk;

use crate::frame::ring::{FrameResourceRing, FrameResourceSlot, FRAME_RING_DEPTH};
use crate::render::draw::DrawList;
use crate::render::vulkan::buffer::{IndexBuffer, MappedBuffer, VertexBuffer};
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::descriptor::{
    DescriptorLayouts, DescriptorPool, SamplerKind, SamplerTable, MAX_TEXTURE_SLOTS,
};
use crate::render::vulkan::pipeline::{PipelineSet, RenderPass};
use crate::render::vulkan::swapchain::{DepthBuffer, Swapchain};
use crate::render::vulkan::sync::{FrameSync, TimelineFence};
use crate::render::vulkan::texture::Texture;
use crate::render::vulkan::window::Window;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::scene::geometry::{VertexData, VertexSource};
use crate::scene::SceneRegistry;

/// One texture heap entry to load at startup.
pub struct TextureDesc {
    pub slot: usize,
    pub files: Vec<PathBuf>,
    pub sampler: SamplerKind,
}

struct GeometryBuffers {
    vertex: Option<VertexBuffer>,
    index: IndexBuffer,
}

struct TextureSlot {
    _texture: Texture,
    set: vk::DescriptorSet,
}

struct SlotResources {
    object_constants: MappedBuffer,
    material_constants: MappedBuffer,
    pass_constants: MappedBuffer,
    dynamic_vertices: MappedBuffer,
    pass_set: vk::DescriptorSet,
    object_set: vk::DescriptorSet,
    material_set: vk::DescriptorSet,
    command_buffer: vk::CommandBuffer,
    sync: FrameSync,
}

pub struct VulkanRenderer {
    context: VulkanContext,
    swapchain: Swapchain,
    depth: DepthBuffer,
    render_pass: RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    layouts: DescriptorLayouts,
    descriptor_pool: DescriptorPool,
    samplers: SamplerTable,
    pipelines: PipelineSet,
    timeline: TimelineFence,
    command_pool: vk::CommandPool,
    slots: Vec<SlotResources>,
    geometry: Vec<GeometryBuffers>,
    textures: Vec<Option<TextureSlot>>,
    clear_color: [f32; 4],
}

impl VulkanRenderer {
    /// Build the full backend. The ring must already be sized from the
    /// registered scene; its shadow buffers dictate every GPU buffer size.
    pub fn new(
        window: &mut Window,
        app_name: &str,
        shader_dir: &Path,
        ring: &FrameResourceRing,
        clear_color: [f32; 4],
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, app_name)?;
        let device = context.raw_device();

        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            context.instance(),
            device.clone(),
            context.surface,
            &context.surface_loader,
            &context.physical_device,
            vk::Extent2D { width, height },
        )?;
        let depth = DepthBuffer::new(
            context.instance(),
            device.clone(),
            context.physical_device.device,
            swapchain.extent(),
        )?;
        let render_pass = RenderPass::new(device.clone(), swapchain.format().format)?;
        let framebuffers =
            Self::create_framebuffers(&device, &swapchain, &depth, render_pass.handle())?;

        let layouts = DescriptorLayouts::new(device.clone())?;
        let descriptor_pool = DescriptorPool::new(device.clone(), FRAME_RING_DEPTH)?;
        let samplers = SamplerTable::new(device.clone())?;
        let pipelines = PipelineSet::new(device.clone(), &layouts, render_pass.handle(), shader_dir)?;
        let timeline = TimelineFence::new(device.clone())?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(context.device.graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let min_alignment = context.physical_device.min_uniform_offset_alignment();
        let mut slots = Vec::with_capacity(FRAME_RING_DEPTH);
        for slot_index in 0..FRAME_RING_DEPTH {
            let slot = ring.slot(slot_index);
            debug_assert!(
                slot.object_constants.element_stride() as u64 % min_alignment.max(1) == 0,
                "constant stride violates device alignment"
            );

            let alloc_info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = unsafe {
                device
                    .allocate_command_buffers(&alloc_info)
                    .map_err(VulkanError::Api)?[0]
            };

            let object_constants = MappedBuffer::new(
                device.clone(),
                context.instance(),
                context.physical_device.device,
                slot.object_constants.bytes().len() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;
            let material_constants = MappedBuffer::new(
                device.clone(),
                context.instance(),
                context.physical_device.device,
                slot.material_constants.bytes().len() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;
            let pass_constants = MappedBuffer::new(
                device.clone(),
                context.instance(),
                context.physical_device.device,
                slot.pass_constants.bytes().len() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;
            let dynamic_vertices = MappedBuffer::new(
                device.clone(),
                context.instance(),
                context.physical_device.device,
                slot.dynamic_vertices.bytes().len().max(1) as u64,
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?;

            let pass_set = descriptor_pool.allocate(layouts.pass)?;
            descriptor_pool.write_buffer(
                pass_set,
                vk::DescriptorType::UNIFORM_BUFFER,
                pass_constants.handle(),
                slot.pass_constants.element_stride() as u64,
            );
            let object_set = descriptor_pool.allocate(layouts.object)?;
            descriptor_pool.write_buffer(
                object_set,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                object_constants.handle(),
                slot.object_constants.element_stride() as u64,
            );
            let material_set = descriptor_pool.allocate(layouts.material)?;
            descriptor_pool.write_buffer(
                material_set,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                material_constants.handle(),
                slot.material_constants.element_stride() as u64,
            );

            slots.push(SlotResources {
                object_constants,
                material_constants,
                pass_constants,
                dynamic_vertices,
                pass_set,
                object_set,
                material_set,
                command_buffer,
                sync: FrameSync::new(device.clone())?,
            });
        }

        log::debug!(
            "Vulkan renderer ready: {} swapchain images, {} frame slots",
            swapchain.image_count(),
            FRAME_RING_DEPTH
        );

        let mut textures = Vec::with_capacity(MAX_TEXTURE_SLOTS);
        textures.resize_with(MAX_TEXTURE_SLOTS, || None);

        Ok(Self {
            context,
            swapchain,
            depth,
            render_pass,
            framebuffers,
            layouts,
            descriptor_pool,
            samplers,
            pipelines,
            timeline,
            command_pool,
            slots,
            geometry: Vec::new(),
            textures,
            clear_color,
        })
    }

    fn create_framebuffers(
        device: &ash::Device,
        swapchain: &Swapchain,
        depth: &DepthBuffer,
        render_pass: vk::RenderPass,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        swapchain
            .image_views()
            .iter()
            .map(|&view| {
                let attachments = [view, depth.view()];
                let create_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(swapchain.extent().width)
                    .height(swapchain.extent().height)
                    .layers(1);
                unsafe {
                    device
                        .create_framebuffer(&create_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    /// The production GPU timeline the frame pipeline waits on.
    pub fn timeline(&self) -> &TimelineFence {
        &self.timeline
    }

    pub fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Upload every registered geometry's static buffers, in id order.
    pub fn upload_geometry(&mut self, scene: &SceneRegistry) -> VulkanResult<()> {
        let device = self.context.raw_device();
        let instance = self.context.instance();
        let physical = self.context.physical_device.device;

        self.geometry.clear();
        for (_, geometry) in scene.geometries() {
            let vertex = match &geometry.vertices {
                VertexData::Standard(vertices) => Some(VertexBuffer::new(
                    device.clone(),
                    instance,
                    physical,
                    vertices,
                )?),
                VertexData::Billboard(points) => Some(VertexBuffer::new(
                    device.clone(),
                    instance,
                    physical,
                    points,
                )?),
                // Dynamic geometry draws from the ring slots' vertex buffers.
                VertexData::Dynamic { .. } => None,
            };
            let index = IndexBuffer::new(device.clone(), instance, physical, &geometry.indices)?;
            self.geometry.push(GeometryBuffers { vertex, index });
        }
        Ok(())
    }

    /// Load the texture heap.
    pub fn load_textures(&mut self, descs: &[TextureDesc]) -> VulkanResult<()> {
        let device = self.context.raw_device();
        for desc in descs {
            debug_assert!(desc.slot < MAX_TEXTURE_SLOTS);
            let texture = Texture::from_files(
                device.clone(),
                self.context.instance(),
                self.context.physical_device.device,
                self.command_pool,
                self.context.graphics_queue(),
                &desc.files,
            )?;
            let set = self.descriptor_pool.allocate(self.layouts.texture)?;
            self.descriptor_pool
                .write_texture(set, texture.view(), self.samplers.get(desc.sampler));
            self.textures[desc.slot] = Some(TextureSlot {
                _texture: texture,
                set,
            });
        }
        Ok(())
    }

    /// Recreate the swapchain-derived resources after a resize.
    pub fn recreate_swapchain(&mut self, window: &Window) -> VulkanResult<()> {
        self.context.wait_idle()?;
        let device = self.context.raw_device();

        for &framebuffer in &self.framebuffers {
            unsafe { device.destroy_framebuffer(framebuffer, None) };
        }
        self.framebuffers.clear();

        let (width, height) = window.get_framebuffer_size();
        let new_swapchain = Swapchain::recreate(
            self.context.instance(),
            device.clone(),
            self.context.surface,
            &self.context.surface_loader,
            &self.context.physical_device,
            vk::Extent2D { width, height },
            self.swapchain.handle(),
        )?;
        self.swapchain = new_swapchain;
        self.depth = DepthBuffer::new(
            self.context.instance(),
            device.clone(),
            self.context.physical_device.device,
            self.swapchain.extent(),
        )?;
        self.framebuffers = Self::create_framebuffers(
            &device,
            &self.swapchain,
            &self.depth,
            self.render_pass.handle(),
        )?;
        Ok(())
    }

    /// Render one frame from the given ring slot. Returns `false` when the
    /// swapchain is out of date and must be recreated before the next frame.
    pub fn render_frame(
        &mut self,
        slot_index: usize,
        slot: &FrameResourceSlot,
        draws: &DrawList,
        fence_value: u64,
    ) -> VulkanResult<bool> {
        let device = self.context.raw_device();

        // Flush the CPU shadows. The ring already guaranteed the GPU is done
        // with this slot.
        {
            let resources = &mut self.slots[slot_index];
            resources.object_constants.flush(slot.object_constants.bytes());
            resources
                .material_constants
                .flush(slot.material_constants.bytes());
            resources.pass_constants.flush(slot.pass_constants.bytes());
            resources.dynamic_vertices.flush(slot.dynamic_vertices.bytes());
        }

        let image_available = self.slots[slot_index].sync.image_available.handle();
        let acquire = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };
        let image_index = match acquire {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                // Nothing was submitted, so the ring's stamped value must be
                // reached from the host or the slot would block forever.
                self.timeline.signal(fence_value)?;
                return Ok(false);
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        self.record_commands(slot_index, image_index, draws)?;

        // Submit, signaling both the binary present semaphore and the
        // timeline with this frame's fence value.
        let resources = &self.slots[slot_index];
        let wait_semaphores = [resources.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [
            resources.sync.render_finished.handle(),
            self.timeline.handle(),
        ];
        let wait_values = [0u64];
        let signal_values = [0u64, fence_value];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::builder()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);
        let command_buffers = [resources.command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info)
            .build();

        unsafe {
            device
                .queue_submit(self.context.graphics_queue(), &[submit_info], vk::Fence::null())
                .map_err(VulkanError::Api)?;
        }

        let render_finished = [resources.sync.render_finished.handle()];
        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&render_finished)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        };
        match present {
            Ok(suboptimal) => Ok(!suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn record_commands(
        &self,
        slot_index: usize,
        image_index: u32,
        draws: &DrawList,
    ) -> VulkanResult<()> {
        let device = &self.context.device.device;
        let resources = &self.slots[slot_index];
        let command_buffer = resources.command_buffer;
        let extent = self.swapchain.extent();

        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            let begin_info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: self.clear_color,
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ];
            let render_pass_begin = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass.handle())
                .framebuffer(self.framebuffers[image_index as usize])
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(command_buffer, 0, &[scissor]);

            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipelines.layout(),
                0,
                &[resources.pass_set],
                &[],
            );

            for (layer, commands) in draws.layers() {
                if commands.is_empty() {
                    continue;
                }
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipelines.pipeline(layer),
                );

                let mut bound_texture = usize::MAX;
                for command in commands {
                    device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        self.pipelines.layout(),
                        1,
                        &[resources.object_set, resources.material_set],
                        &[command.object_offset, command.material_offset],
                    );

                    if command.texture_slot != bound_texture {
                        if let Some(texture) = &self.textures[command.texture_slot] {
                            device.cmd_bind_descriptor_sets(
                                command_buffer,
                                vk::PipelineBindPoint::GRAPHICS,
                                self.pipelines.layout(),
                                3,
                                &[texture.set],
                                &[],
                            );
                            bound_texture = command.texture_slot;
                        }
                    }

                    let vertex_buffer = match command.vertex_source {
                        VertexSource::Static => self.geometry[command.geometry.index()]
                            .vertex
                            .as_ref()
                            .map(|b| b.handle()),
                        VertexSource::FrameSlot(index) => {
                            Some(self.slots[index].dynamic_vertices.handle())
                        }
                    };
                    let Some(vertex_buffer) = vertex_buffer else {
                        continue;
                    };
                    device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer], &[0]);
                    device.cmd_bind_index_buffer(
                        command_buffer,
                        self.geometry[command.geometry.index()].index.handle(),
                        0,
                        vk::IndexType::UINT16,
                    );
                    device.cmd_draw_indexed(
                        command_buffer,
                        command.index_count,
                        1,
                        command.start_index,
                        command.base_vertex,
                        0,
                    );
                }
            }

            device.cmd_end_render_pass(command_buffer);
            device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // Nothing in flight may outlive the buffers the GPU reads from.
        let _ = self.context.wait_idle();
        let device = self.context.raw_device();
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}
