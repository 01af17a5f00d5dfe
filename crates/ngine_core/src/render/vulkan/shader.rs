//! Shader modules and graphics pipelines
//!
//! SPIR-V is loaded from disk, both stages are kept alive with the pipeline
//! built from them, and viewport and scissor stay dynamic so a swapchain
//! rebuild never invalidates a pipeline.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use ash::{vk, Device};

use super::error::{VkResultExt, VulkanError, VulkanResult};
use super::vertex_layout::VulkanVertexLayout;

const ENTRY_POINT: &CStr = c"main";

/// Decode SPIR-V bytes into words, checking size and magic number
pub fn parse_spirv(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None) }.check()?;
        Ok(Self { device, module })
    }

    /// Load a module from a SPIR-V file
    pub fn from_file(device: Device, path: &Path) -> VulkanResult<Self> {
        let words = std::fs::read(path)
            .and_then(|bytes| parse_spirv(&bytes))
            .map_err(|source| VulkanError::ShaderIo {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_words(device, &words)
    }

    /// Get shader module handle
    #[must_use]
    pub const fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Triangle-list pipeline for [`crate::render::Vertex`] input with one descriptor set
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        vertex: &ShaderModule,
        fragment: &ShaderModule,
        descriptor_set_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let stages = [
            vertex.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = [VulkanVertexLayout::binding_description()];
        let attributes = VulkanVertexLayout::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; the rectangles are set per frame.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let set_layouts = [descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }.check()?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let created = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) };
        let pipeline = match created {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::api(err));
            }
        };

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Get pipeline handle
    #[must_use]
    pub const fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    #[must_use]
    pub const fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// A loaded vertex/fragment pair and the pipeline built from it
pub struct ShaderProgram {
    // Pipeline first so it is destroyed before the modules.
    pipeline: GraphicsPipeline,
    _vertex: ShaderModule,
    _fragment: ShaderModule,
    sources: (PathBuf, PathBuf),
}

impl ShaderProgram {
    /// Load both stages and build the pipeline against `render_pass`
    pub fn load(
        device: &Device,
        render_pass: vk::RenderPass,
        descriptor_set_layout: vk::DescriptorSetLayout,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> VulkanResult<Self> {
        let vertex = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment = ShaderModule::from_file(device.clone(), fragment_path)?;
        let pipeline = GraphicsPipeline::new(device.clone(), render_pass, &vertex, &fragment, descriptor_set_layout)?;

        Ok(Self {
            pipeline,
            _vertex: vertex,
            _fragment: fragment,
            sources: (vertex_path.to_path_buf(), fragment_path.to_path_buf()),
        })
    }

    /// The pipeline
    #[must_use]
    pub const fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    /// Vertex and fragment SPIR-V paths
    #[must_use]
    pub fn sources(&self) -> (&Path, &Path) {
        (&self.sources.0, &self.sources.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spirv_magic_accepted() {
        let mut bytes = 0x0723_0203_u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 16]);

        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn test_truncated_spirv_rejected() {
        assert!(parse_spirv(&[0x03, 0x02, 0x23]).is_err());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        assert!(parse_spirv(&[0u8; 8]).is_err());
    }
}
