/// Shaders: compilation, driver modules and pipeline assembly

pub mod compiler;
pub mod shader_module;
pub mod pipeline_builder;

pub use compiler::{inject_defines, GlslCompiler, ShaderCompiler, ShaderStage, DEFAULT_VERSION_HEADER};
pub use shader_module::ShaderModule;
pub use pipeline_builder::{Pipeline, PipelineBuilder};
