/// Shader compilation: GLSL source to SPIR-V words
///
/// The [`ShaderCompiler`] trait is the seam between the engine and the
/// compiler. [`GlslCompiler`] is the default, built on naga (GLSL front end,
/// IR validation, SPIR-V back end). Tests substitute a counting mock.

use std::path::Path;

use crate::error::{Error, Result};
use crate::graphics_device::ShaderStageFlags;
use crate::engine_error;

/// Version directive prepended when the caller does not pick one
pub const DEFAULT_VERSION_HEADER: &str = "#version 450";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn flags(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Compiles preprocessed GLSL into SPIR-V
pub trait ShaderCompiler: Send + Sync {
    /// `name` identifies the source in error messages (usually its path)
    fn compile(&self, stage: ShaderStage, source: &str, name: &Path) -> Result<Vec<u32>>;
}

/// Build the final source: version header, one `#define` per flag, then the
/// body with any `#version` line of its own removed
pub fn inject_defines<S: AsRef<str>>(source: &str, version_header: &str, flags: &[S]) -> String {
    let mut out = String::with_capacity(source.len() + version_header.len() + flags.len() * 16 + 1);
    out.push_str(version_header.trim_end());
    out.push('\n');
    for flag in flags {
        out.push_str("#define ");
        out.push_str(flag.as_ref());
        out.push('\n');
    }
    for line in source.lines() {
        if line.trim_start().starts_with("#version") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

// ===== NAGA COMPILER =====

/// Default compiler (naga GLSL front end -> SPIR-V 1.3)
pub struct GlslCompiler {
    spv_options: naga::back::spv::Options<'static>,
}

impl GlslCompiler {
    pub fn new() -> Self {
        Self {
            spv_options: naga::back::spv::Options {
                lang_version: (1, 3),
                ..Default::default()
            },
        }
    }
}

impl Default for GlslCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderCompiler for GlslCompiler {
    fn compile(&self, stage: ShaderStage, source: &str, name: &Path) -> Result<Vec<u32>> {
        let naga_stage = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };

        let fail = |what: &str, detail: String| {
            engine_error!("aurora::ShaderCompiler", "{} failed for '{}': {}", what, name.display(), detail);
            Error::ShaderCompilation {
                path: name.to_path_buf(),
                message: format!("{}: {}", what, detail),
            }
        };

        let mut frontend = naga::front::glsl::Frontend::default();
        let module = frontend
            .parse(&naga::front::glsl::Options::from(naga_stage), source)
            .map_err(|e| fail("parse", format!("{:?}", e)))?;

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| fail("validation", format!("{:?}", e)))?;

        naga::back::spv::write_vec(&module, &info, &self.spv_options, None)
            .map_err(|e| fail("SPIR-V generation", format!("{:?}", e)))
    }
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
