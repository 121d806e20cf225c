/// ShaderModule - one compiled shader stage plus the layouts it declares
///
/// A module owns its driver handle and every descriptor-set layout added to
/// it. Push-constant ranges are only recorded here; they become part of the
/// pipeline layout when a [`PipelineBuilder`](super::PipelineBuilder)
/// consumes the module.

use std::path::Path;
use std::sync::Arc;

use crate::device_context::DeviceContext;
use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorBinding, DescriptorSetLayoutHandle, PushConstantRange, ShaderModuleHandle,
    ShaderStageFlags,
};
use crate::{engine_debug, engine_error};
use super::compiler::{inject_defines, ShaderStage, DEFAULT_VERSION_HEADER};

pub struct ShaderModule {
    context: Arc<DeviceContext>,
    handle: ShaderModuleHandle,
    stage: ShaderStage,
    name: String,
    set_layouts: Vec<DescriptorSetLayoutHandle>,
    push_constant_ranges: Vec<PushConstantRange>,
}

impl ShaderModule {
    /// Read a GLSL file, apply `flags` as `#define`s and compile it
    pub fn load<S: AsRef<str>>(
        context: Arc<DeviceContext>,
        path: &Path,
        stage: ShaderStage,
        flags: &[S],
    ) -> Result<Self> {
        Self::load_with_header(context, path, stage, flags, DEFAULT_VERSION_HEADER)
    }

    /// [`load`](Self::load) with an explicit `#version` header
    pub fn load_with_header<S: AsRef<str>>(
        context: Arc<DeviceContext>,
        path: &Path,
        stage: ShaderStage,
        flags: &[S],
        version_header: &str,
    ) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            engine_error!("aurora::ShaderModule", "Cannot read shader '{}': {}", path.display(), e);
            Error::ShaderCompilation {
                path: path.to_path_buf(),
                message: format!("cannot read source: {}", e),
            }
        })?;

        let spirv = Self::compile_source(&context, path, stage, &source, flags, version_header)?;
        Self::from_spirv(context, &path.display().to_string(), stage, &spirv)
    }

    /// Preprocess and compile in-memory GLSL, returning the SPIR-V words
    pub fn compile_source<S: AsRef<str>>(
        context: &DeviceContext,
        name: &Path,
        stage: ShaderStage,
        source: &str,
        flags: &[S],
        version_header: &str,
    ) -> Result<Vec<u32>> {
        let full_source = inject_defines(source, version_header, flags);
        context.compiler().compile(stage, &full_source, name)
    }

    /// Create the driver module from SPIR-V words
    pub fn from_spirv(
        context: Arc<DeviceContext>,
        name: &str,
        stage: ShaderStage,
        spirv: &[u32],
    ) -> Result<Self> {
        let handle = context.device().create_shader_module(spirv).map_err(|e| {
            engine_error!("aurora::ShaderModule", "Failed to create {:?} module '{}': {}", stage, name, e);
            e
        })?;

        engine_debug!("aurora::ShaderModule", "{:?} module '{}' created ({} words)", stage, name, spirv.len());

        Ok(Self {
            context,
            handle,
            stage,
            name: name.to_string(),
            set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
        })
    }

    /// Create a descriptor-set layout owned by this module
    ///
    /// Layouts are numbered in the order they are added; the pipeline
    /// concatenates them across stages, vertex stage first.
    pub fn add_descriptor_set_layout(
        &mut self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle> {
        let layout = self.context.device().create_descriptor_set_layout(bindings).map_err(|e| {
            engine_error!("aurora::ShaderModule", "Failed to create set layout for '{}': {}", self.name, e);
            e
        })?;
        self.set_layouts.push(layout);
        Ok(layout)
    }

    pub fn add_push_constant_range(&mut self, stages: ShaderStageFlags, offset: u32, size: u32) {
        self.push_constant_ranges.push(PushConstantRange { stages, offset, size });
    }

    pub fn handle(&self) -> ShaderModuleHandle {
        self.handle
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_layouts(&self) -> &[DescriptorSetLayoutHandle] {
        &self.set_layouts
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        let device = self.context.device();
        for layout in self.set_layouts.drain(..) {
            device.destroy_descriptor_set_layout(layout);
        }
        device.destroy_shader_module(self.handle);
    }
}

impl std::fmt::Debug for ShaderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("handle", &self.handle)
            .field("set_layouts", &self.set_layouts)
            .finish()
    }
}

#[cfg(test)]
#[path = "shader_module_tests.rs"]
mod tests;
