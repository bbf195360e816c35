use {
    crate::{Device, ShaderLayout},
    anyhow::{anyhow, Result},
    ash::vk,
    kestrel_core::util::{combine_hashes, hash_combine_u64},
    kestrel_core::Error,
    std::collections::HashMap,
};

/// Vertex input description plus a stable hash for pipeline keying.
#[derive(Clone, Debug)]
pub struct VertexLayout {
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
    hash: u64,
}

impl VertexLayout {
    pub fn new(
        bindings: Vec<vk::VertexInputBindingDescription>,
        attributes: Vec<vk::VertexInputAttributeDescription>,
    ) -> Self {
        let mut hash = 0u64;
        for binding in &bindings {
            hash = hash_combine_u64(hash, binding.binding as u64);
            hash = hash_combine_u64(hash, binding.stride as u64);
            hash = hash_combine_u64(hash, binding.input_rate.as_raw() as u64);
        }
        for attribute in &attributes {
            hash = hash_combine_u64(hash, attribute.location as u64);
            hash = hash_combine_u64(hash, attribute.binding as u64);
            hash = hash_combine_u64(hash, attribute.format.as_raw() as u64);
            hash = hash_combine_u64(hash, attribute.offset as u64);
        }
        Self {
            bindings,
            attributes,
            hash,
        }
    }

    pub fn hash(&self) -> u64 { self.hash }

    pub fn bindings(&self) -> &[vk::VertexInputBindingDescription] { &self.bindings }

    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] { &self.attributes }
}

/// Format + fixed-function state that selects a compiled pipeline within a
/// shader program. `color_format == UNDEFINED` means a depth-only pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub depth_test: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            color_format: vk::Format::R16G16B16A16_SFLOAT,
            depth_format: vk::Format::D32_SFLOAT,
            samples: vk::SampleCountFlags::TYPE_1,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            depth_test: true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PipelineHandle {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    /// First-level cache key (combined shader hash); resolves the reflected
    /// layout via [PipelineCache::program].
    pub program: u64,
}

/// First-level cache entry: one vertex + fragment shader pair.
pub struct ShaderProgram {
    pub hash: u64,
    pub layout: ShaderLayout,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub pipeline_layout: vk::PipelineLayout,
    vert: vk::ShaderModule,
    frag: vk::ShaderModule,
    pipelines: HashMap<(PipelineState, u64), vk::Pipeline>,
}

impl ShaderProgram {
    pub fn pipeline_count(&self) -> usize { self.pipelines.len() }
}

/// Two-level pipeline cache.
///
/// First level is keyed on the combined vertex+fragment SPIR-V hash and
/// stores reflected set layouts, the pipeline layout and both shader
/// modules; second level stores one compiled pipeline per
/// format/state/vertex-input combination. Failed builds are not inserted.
pub struct PipelineCache {
    device: Device,
    programs: HashMap<u64, ShaderProgram>,
}

impl PipelineCache {
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
            programs: HashMap::new(),
        }
    }

    pub fn program(&self, key: u64) -> Option<&ShaderProgram> { self.programs.get(&key) }

    pub fn program_count(&self) -> usize { self.programs.len() }

    pub fn pipeline(
        &mut self,
        vert: (&[u32], u64),
        frag: (&[u32], u64),
        vertex_layout: &VertexLayout,
        state: PipelineState,
    ) -> Result<PipelineHandle> {
        let key = combine_hashes(vert.1, frag.1);
        if !self.programs.contains_key(&key) {
            let program = self.build_program(key, vert.0, frag.0)?;
            self.programs.insert(key, program);
        }

        let state_key = (state, vertex_layout.hash());
        let needs_build = {
            let program = self.programs.get(&key).expect("just inserted");
            !program.pipelines.contains_key(&state_key)
        };
        if needs_build {
            let pipeline = {
                let program = self.programs.get(&key).expect("just inserted");
                self.build_pipeline(program, vertex_layout, &state)?
            };
            self.programs
                .get_mut(&key)
                .expect("just inserted")
                .pipelines
                .insert(state_key, pipeline);
        }

        let program = self.programs.get(&key).expect("just inserted");
        Ok(PipelineHandle {
            pipeline: program.pipelines[&state_key],
            layout: program.pipeline_layout,
            program: key,
        })
    }

    fn build_program(&self, hash: u64, vert: &[u32], frag: &[u32]) -> Result<ShaderProgram> {
        let layout = ShaderLayout::reflect(vert, frag)?;

        let mut set_layouts = Vec::with_capacity(layout.sets.len());
        for bindings in &layout.sets {
            let entries: Vec<vk::DescriptorSetLayoutBinding> = bindings
                .iter()
                .map(|info| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(info.binding)
                        .descriptor_type(info.ty)
                        .descriptor_count(info.count)
                        .stage_flags(info.stages)
                })
                .collect();
            let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&entries);
            let set_layout =
                unsafe { self.device.handle().create_descriptor_set_layout(&info, None) }?;
            set_layouts.push(set_layout);
        }

        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout =
            unsafe { self.device.handle().create_pipeline_layout(&layout_info, None) }?;

        let vert_module = self.create_module(vert)?;
        let frag_module = self.create_module(frag)?;

        log::debug!("Built shader program {hash:#x} ({} sets)", set_layouts.len());
        Ok(ShaderProgram {
            hash,
            layout,
            set_layouts,
            pipeline_layout,
            vert: vert_module,
            frag: frag_module,
            pipelines: HashMap::new(),
        })
    }

    fn create_module(&self, spirv: &[u32]) -> Result<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::default().code(spirv);
        unsafe { self.device.handle().create_shader_module(&info, None) }
            .map_err(|e| anyhow!(Error::PipelineBuild(format!("shader module creation failed: {e}"))))
    }

    fn build_pipeline(
        &self,
        program: &ShaderProgram,
        vertex_layout: &VertexLayout,
        state: &PipelineState,
    ) -> Result<vk::Pipeline> {
        let entry = c"main";
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(program.vert)
                .name(entry),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(program.frag)
                .name(entry),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(vertex_layout.bindings())
            .vertex_attribute_descriptions(vertex_layout.attributes());
        let input_assembly =
            vk::PipelineInputAssemblyStateCreateInfo::default().topology(state.topology);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(state.polygon_mode)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(state.samples);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth_test)
            .depth_write_enable(state.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .max_depth_bounds(1.0);
        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let depth_only = state.color_format == vk::Format::UNDEFINED;
        let blend_attachments: &[vk::PipelineColorBlendAttachmentState] =
            if depth_only { &[] } else { &blend_attachments };
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(blend_attachments);
        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::LINE_WIDTH,
        ];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [state.color_format];
        let color_formats: &[vk::Format] = if depth_only { &[] } else { &color_formats };
        let mut rendering = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(color_formats)
            .depth_attachment_format(state.depth_format);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(program.pipeline_layout)
            .push_next(&mut rendering);

        let pipelines = unsafe {
            self.device.handle().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&info),
                None,
            )
        }
        .map_err(|(_, e)| anyhow!(Error::PipelineBuild(format!("driver rejected pipeline: {e}"))))?;

        log::debug!("Built pipeline for program {:#x}: {state:?}", program.hash);
        Ok(pipelines[0])
    }

    /// Only valid at teardown after a full device wait.
    pub fn destroy(&mut self) {
        for (_, program) in self.programs.drain() {
            unsafe {
                for (_, pipeline) in program.pipelines {
                    self.device.handle().destroy_pipeline(pipeline, None);
                }
                self.device
                    .handle()
                    .destroy_pipeline_layout(program.pipeline_layout, None);
                for layout in program.set_layouts {
                    self.device.handle().destroy_descriptor_set_layout(layout, None);
                }
                self.device.handle().destroy_shader_module(program.vert, None);
                self.device.handle().destroy_shader_module(program.frag, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_hash_tracks_content() {
        let position = vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(12)
            .input_rate(vk::VertexInputRate::VERTEX);
        let attribute = vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT);

        let a = VertexLayout::new(vec![position], vec![attribute]);
        let b = VertexLayout::new(vec![position], vec![attribute]);
        assert_eq!(a.hash(), b.hash());

        let wider = VertexLayout::new(
            vec![position.stride(16)],
            vec![attribute],
        );
        assert_ne!(a.hash(), wider.hash());
    }

    #[test]
    fn state_keys_are_distinct() {
        let base = PipelineState::default();
        let line = PipelineState {
            polygon_mode: vk::PolygonMode::LINE,
            ..base
        };
        let no_depth = PipelineState {
            depth_test: false,
            ..base
        };
        assert_ne!(base, line);
        assert_ne!(base, no_depth);
        assert_eq!(base, PipelineState::default());
    }
}
