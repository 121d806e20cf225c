/// PipelineBuilder - single-use assembly of a graphics pipeline
///
/// Setters mutate the builder in place and chain; `build` consumes it. The
/// shader stages move into the resulting [`Pipeline`], which keeps them (and
/// therefore their descriptor-set layouts) alive as long as the pipeline.

use std::sync::Arc;

use crate::device_context::DeviceContext;
use crate::error::Result;
use crate::graphics_device::{
    CullMode, DescriptorSetLayoutHandle, GraphicsPipelineDesc, PipelineFlags, PipelineHandle,
    PipelineLayoutHandle, PolygonMode, PrimitiveTopology, PushConstantRange, Rect2D,
    TextureFormat, VertexAttribute, VertexBinding, Viewport,
};
use crate::{engine_bail, engine_debug, engine_error};
use super::compiler::ShaderStage;
use super::shader_module::ShaderModule;

// ===== BUILDER =====

pub struct PipelineBuilder {
    context: Arc<DeviceContext>,
    vertex: Option<ShaderModule>,
    fragment: Option<ShaderModule>,
    vertex_bindings: Vec<VertexBinding>,
    vertex_attributes: Vec<VertexAttribute>,
    topology: PrimitiveTopology,
    viewport: Option<Viewport>,
    scissor: Option<Rect2D>,
    polygon_mode: PolygonMode,
    blend_enable: bool,
    depth_test_enable: bool,
}

impl PipelineBuilder {
    pub fn new(context: Arc<DeviceContext>) -> Self {
        Self {
            context,
            vertex: None,
            fragment: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            viewport: None,
            scissor: None,
            polygon_mode: PolygonMode::Fill,
            blend_enable: false,
            depth_test_enable: false,
        }
    }

    /// Takes ownership of the vertex stage (replacing any previous one)
    pub fn set_vertex_shader(&mut self, module: ShaderModule) -> &mut Self {
        self.vertex = Some(module);
        self
    }

    pub fn set_fragment_shader(&mut self, module: ShaderModule) -> &mut Self {
        self.fragment = Some(module);
        self
    }

    /// Describe one vertex buffer binding and the attributes read from it
    ///
    /// Each attribute's `binding` is overwritten with `binding.binding`.
    pub fn add_input_buffer_description(
        &mut self,
        binding: VertexBinding,
        attributes: &[VertexAttribute],
    ) -> &mut Self {
        self.vertex_bindings.push(binding);
        self.vertex_attributes.extend(
            attributes.iter().map(|attr| VertexAttribute { binding: binding.binding, ..*attr }),
        );
        self
    }

    pub fn set_input_topology(&mut self, topology: PrimitiveTopology) -> &mut Self {
        self.topology = topology;
        self
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> &mut Self {
        self.viewport = Some(viewport);
        self
    }

    /// Defaults to the full viewport when never set
    pub fn set_scissor(&mut self, scissor: Rect2D) -> &mut Self {
        self.scissor = Some(scissor);
        self
    }

    pub fn set_fill_mode(&mut self, mode: PolygonMode) -> &mut Self {
        self.polygon_mode = mode;
        self
    }

    pub fn set_color_blend_enable(&mut self, enable: bool) -> &mut Self {
        self.blend_enable = enable;
        self
    }

    pub fn set_depth_test_enable(&mut self, enable: bool) -> &mut Self {
        self.depth_test_enable = enable;
        self
    }

    /// Create the pipeline and its layout
    ///
    /// Set layouts and push-constant ranges of both stages are concatenated,
    /// vertex stage first. `PipelineFlags::CULL_BACK_FACES` selects back-face
    /// culling; `PipelineFlags::DEPTH_WRITE` enables depth writes when the
    /// depth test is on.
    pub fn build(
        self,
        color_format: TextureFormat,
        depth_format: Option<TextureFormat>,
        flags: PipelineFlags,
    ) -> Result<Pipeline> {
        // ========== VALIDATION ==========
        let Some(vertex) = self.vertex else {
            engine_bail!("aurora::PipelineBuilder", "Pipeline has no vertex shader");
        };
        let Some(fragment) = self.fragment else {
            engine_bail!("aurora::PipelineBuilder", "Pipeline has no fragment shader");
        };
        if vertex.stage() != ShaderStage::Vertex || fragment.stage() != ShaderStage::Fragment {
            engine_bail!(
                "aurora::PipelineBuilder",
                "Stage mismatch: '{}' is {:?}, '{}' is {:?}",
                vertex.name(), vertex.stage(), fragment.name(), fragment.stage()
            );
        }
        let Some(viewport) = self.viewport else {
            engine_bail!("aurora::PipelineBuilder", "Pipeline has no viewport");
        };
        if self.depth_test_enable && depth_format.is_none() {
            engine_bail!("aurora::PipelineBuilder", "Depth test enabled without a depth attachment format");
        }
        if let Some(format) = depth_format {
            if !format.is_depth() {
                engine_bail!("aurora::PipelineBuilder", "{:?} is not a depth format", format);
            }
        }

        // ========== LAYOUT (vertex stage first) ==========
        let set_layouts: Vec<DescriptorSetLayoutHandle> = vertex
            .set_layouts()
            .iter()
            .chain(fragment.set_layouts())
            .copied()
            .collect();
        let push_constant_ranges: Vec<PushConstantRange> = vertex
            .push_constant_ranges()
            .iter()
            .chain(fragment.push_constant_ranges())
            .copied()
            .collect();

        let desc = GraphicsPipelineDesc {
            vertex_module: vertex.handle(),
            fragment_module: fragment.handle(),
            vertex_bindings: self.vertex_bindings,
            vertex_attributes: self.vertex_attributes,
            topology: self.topology,
            viewport,
            scissor: self.scissor.unwrap_or_else(|| Rect2D {
                x: viewport.x as i32,
                y: viewport.y as i32,
                width: viewport.width as u32,
                height: viewport.height as u32,
            }),
            polygon_mode: self.polygon_mode,
            cull_mode: if flags.contains(PipelineFlags::CULL_BACK_FACES) { CullMode::Back } else { CullMode::None },
            blend_enable: self.blend_enable,
            depth_test_enable: self.depth_test_enable,
            depth_write_enable: self.depth_test_enable && flags.contains(PipelineFlags::DEPTH_WRITE),
            color_format,
            depth_format,
            set_layouts: set_layouts.clone(),
            push_constant_ranges: push_constant_ranges.clone(),
        };

        // ========== CREATE ==========
        let (handle, layout) = self.context.device().create_graphics_pipeline(&desc).map_err(|e| {
            engine_error!(
                "aurora::PipelineBuilder",
                "Driver rejected pipeline ('{}' + '{}'): {}",
                vertex.name(), fragment.name(), e
            );
            e
        })?;

        engine_debug!(
            "aurora::PipelineBuilder",
            "Pipeline {:?} built ({} set layouts, {} push ranges, blend={})",
            handle, set_layouts.len(), push_constant_ranges.len(), desc.blend_enable
        );

        Ok(Pipeline {
            context: self.context,
            handle,
            layout,
            set_layouts,
            push_constant_ranges,
            stages: vec![vertex, fragment],
        })
    }
}

// ===== PIPELINE =====

/// A built graphics pipeline
///
/// Drop destroys the pipeline and its layout, then the owned stages.
pub struct Pipeline {
    context: Arc<DeviceContext>,
    handle: PipelineHandle,
    layout: PipelineLayoutHandle,
    set_layouts: Vec<DescriptorSetLayoutHandle>,
    push_constant_ranges: Vec<PushConstantRange>,
    stages: Vec<ShaderModule>,
}

impl Pipeline {
    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }

    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout
    }

    /// Set layouts in binding order (vertex stage first)
    pub fn set_layouts(&self) -> &[DescriptorSetLayoutHandle] {
        &self.set_layouts
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }

    pub fn stages(&self) -> &[ShaderModule] {
        &self.stages
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.context.device().destroy_pipeline(self.handle, self.layout);
        // stages drop after this, releasing their set layouts and modules
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handle", &self.handle)
            .field("layout", &self.layout)
            .field("set_layouts", &self.set_layouts)
            .finish()
    }
}

#[cfg(test)]
#[path = "pipeline_builder_tests.rs"]
mod tests;
