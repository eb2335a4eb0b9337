//! Render pass, pipeline layout, and the four layer pipelines.
//!
//! One pipeline exists per render layer; they share the pipeline layout and
//! differ only in shader stages and fixed-function state. Viewport and
//! scissor are dynamic so a resize never rebuilds pipelines.
//!
//! The projection flips Y for Vulkan clip space, which mirrors the winding
//! on screen; front faces are therefore clockwise.

use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};

use ash::util::read_spv;
use ash::{vk, Device};

use crate::render::vulkan::descriptor::DescriptorLayouts;
use crate::render::vulkan::swapchain::DEPTH_FORMAT;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::scene::render_item::RenderLayer;

/// Compiled SPIR-V shader module with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    pub fn from_file(device: Device, path: &Path) -> VulkanResult<Self> {
        let mut file = File::open(path).map_err(|e| VulkanError::ShaderLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let code = read_spv(&mut file).map_err(|e| VulkanError::ShaderLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, module })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Forward render pass: one color attachment, one depth attachment.
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    pub fn new(device: Device, color_format: vk::Format) -> VulkanResult<Self> {
        let attachments = [
            vk::AttachmentDescription::builder()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .build(),
            vk::AttachmentDescription::builder()
                .format(DEPTH_FORMAT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build()];

        let dependencies = [vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self {
            device,
            render_pass,
        })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

fn standard_vertex_input() -> (
    [vk::VertexInputBindingDescription; 1],
    Vec<vk::VertexInputAttributeDescription>,
) {
    let binding = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: 32,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let attributes = vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 12,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: 24,
        },
    ];
    (binding, attributes)
}

fn billboard_vertex_input() -> (
    [vk::VertexInputBindingDescription; 1],
    Vec<vk::VertexInputAttributeDescription>,
) {
    let binding = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: 20,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let attributes = vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: 12,
        },
    ];
    (binding, attributes)
}

/// Pipeline layout plus the four layer pipelines.
pub struct PipelineSet {
    device: Device,
    layout: vk::PipelineLayout,
    pipelines: [vk::Pipeline; 4],
}

impl PipelineSet {
    /// Build all four pipelines. `shader_dir` holds the compiled SPIR-V
    /// binaries named `<stage>.spv`.
    pub fn new(
        device: Device,
        layouts: &DescriptorLayouts,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
    ) -> VulkanResult<Self> {
        let set_layouts = layouts.as_array();
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let spv = |name: &str| -> PathBuf { shader_dir.join(format!("{name}.spv")) };

        let default_vert = ShaderModule::from_file(device.clone(), &spv("default.vert"))?;
        let default_frag = ShaderModule::from_file(device.clone(), &spv("default.frag"))?;
        let alphatest_frag = ShaderModule::from_file(device.clone(), &spv("alphatest.frag"))?;
        let billboard_vert = ShaderModule::from_file(device.clone(), &spv("billboard.vert"))?;
        let billboard_geom = ShaderModule::from_file(device.clone(), &spv("billboard.geom"))?;
        let billboard_frag = ShaderModule::from_file(device.clone(), &spv("billboard.frag"))?;

        let mut pipelines = [vk::Pipeline::null(); 4];
        for layer in RenderLayer::DRAW_ORDER {
            let config = match layer {
                RenderLayer::Opaque => LayerConfig {
                    stages: vec![
                        (vk::ShaderStageFlags::VERTEX, default_vert.handle()),
                        (vk::ShaderStageFlags::FRAGMENT, default_frag.handle()),
                    ],
                    billboard_input: false,
                    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
                    cull_mode: vk::CullModeFlags::BACK,
                    blend: false,
                },
                RenderLayer::AlphaTested => LayerConfig {
                    stages: vec![
                        (vk::ShaderStageFlags::VERTEX, default_vert.handle()),
                        (vk::ShaderStageFlags::FRAGMENT, alphatest_frag.handle()),
                    ],
                    billboard_input: false,
                    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
                    cull_mode: vk::CullModeFlags::NONE,
                    blend: false,
                },
                RenderLayer::AlphaTestedBillboards => LayerConfig {
                    stages: vec![
                        (vk::ShaderStageFlags::VERTEX, billboard_vert.handle()),
                        (vk::ShaderStageFlags::GEOMETRY, billboard_geom.handle()),
                        (vk::ShaderStageFlags::FRAGMENT, billboard_frag.handle()),
                    ],
                    billboard_input: true,
                    topology: vk::PrimitiveTopology::POINT_LIST,
                    cull_mode: vk::CullModeFlags::NONE,
                    blend: false,
                },
                RenderLayer::Transparent => LayerConfig {
                    stages: vec![
                        (vk::ShaderStageFlags::VERTEX, default_vert.handle()),
                        (vk::ShaderStageFlags::FRAGMENT, default_frag.handle()),
                    ],
                    billboard_input: false,
                    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
                    cull_mode: vk::CullModeFlags::BACK,
                    blend: true,
                },
            };
            pipelines[layer.index()] =
                Self::build_pipeline(&device, layout, render_pass, &config)?;
        }

        Ok(Self {
            device,
            layout,
            pipelines,
        })
    }

    fn build_pipeline(
        device: &Device,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        config: &LayerConfig,
    ) -> VulkanResult<vk::Pipeline> {
        let entry_point = CString::new("main")
            .map_err(|_| VulkanError::InitializationFailed("entry point".to_string()))?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = config
            .stages
            .iter()
            .map(|&(stage, module)| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(stage)
                    .module(module)
                    .name(&entry_point)
                    .build()
            })
            .collect();

        let (bindings, attributes) = if config.billboard_input {
            billboard_vertex_input()
        } else {
            standard_vertex_input()
        };
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(config.cull_mode)
            .front_face(vk::FrontFace::CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS);

        let blend_attachment = if config.blend {
            vk::PipelineColorBlendAttachmentState::builder()
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .build()
        } else {
            vk::PipelineColorBlendAttachmentState::builder()
                .blend_enable(false)
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .build()
        };
        let blend_attachments = [blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| VulkanError::Api(e))?
        };
        Ok(pipelines[0])
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn pipeline(&self, layer: RenderLayer) -> vk::Pipeline {
        self.pipelines[layer.index()]
    }
}

impl Drop for PipelineSet {
    fn drop(&mut self) {
        unsafe {
            for pipeline in self.pipelines {
                self.device.destroy_pipeline(pipeline, None);
            }
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

struct LayerConfig {
    stages: Vec<(vk::ShaderStageFlags, vk::ShaderModule)>,
    billboard_input: bool,
    topology: vk::PrimitiveTopology,
    cull_mode: vk::CullModeFlags,
    blend: bool,
}
