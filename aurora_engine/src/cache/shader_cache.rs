/// ShaderCache - compiled vertex/fragment programs shared across requesters
///
/// A program is keyed by both stage paths and their define flags. Flags are
/// sorted and deduplicated first, so `[A, B]` and `[B, A]` name the same
/// program. The cache keeps SPIR-V, not driver modules: each pipeline gets
/// its own [`ShaderModule`]s from `instantiate_modules`, without recompiling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotmap::new_key_type;

use crate::device_context::DeviceContext;
use crate::error::{Error, Result};
use crate::shader::{ShaderModule, ShaderStage, DEFAULT_VERSION_HEADER};
use crate::{engine_debug, engine_error};
use super::ref_counted_cache::RefCountedCache;

new_key_type! {
    /// Handle to a cached shader program
    pub struct ShaderProgramHandle;
}

// ===== KEY =====

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderProgramKey {
    pub vertex_path: PathBuf,
    pub vertex_flags: Vec<String>,
    pub fragment_path: PathBuf,
    pub fragment_flags: Vec<String>,
}

impl ShaderProgramKey {
    /// Build a normalized key (flag order and duplicates do not matter)
    pub fn new<S: AsRef<str>>(
        vertex_path: &Path,
        vertex_flags: &[S],
        fragment_path: &Path,
        fragment_flags: &[S],
    ) -> Self {
        Self {
            vertex_path: vertex_path.to_path_buf(),
            vertex_flags: normalize_flags(vertex_flags),
            fragment_path: fragment_path.to_path_buf(),
            fragment_flags: normalize_flags(fragment_flags),
        }
    }
}

fn normalize_flags<S: AsRef<str>>(flags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = flags.iter().map(|f| f.as_ref().to_string()).collect();
    out.sort();
    out.dedup();
    out
}

// ===== PROGRAM =====

/// Both stages of one program, compiled
#[derive(Debug)]
pub struct ShaderProgram {
    key: ShaderProgramKey,
    vertex_spirv: Vec<u32>,
    fragment_spirv: Vec<u32>,
}

impl ShaderProgram {
    pub fn key(&self) -> &ShaderProgramKey {
        &self.key
    }

    pub fn vertex_spirv(&self) -> &[u32] {
        &self.vertex_spirv
    }

    pub fn fragment_spirv(&self) -> &[u32] {
        &self.fragment_spirv
    }
}

// ===== CACHE =====

pub struct ShaderCache {
    context: Arc<DeviceContext>,
    version_header: String,
    programs: RefCountedCache<ShaderProgramKey, ShaderProgramHandle, ShaderProgram>,
}

impl ShaderCache {
    pub fn new(context: Arc<DeviceContext>) -> Self {
        Self::with_version_header(context, DEFAULT_VERSION_HEADER)
    }

    pub fn with_version_header(context: Arc<DeviceContext>, version_header: &str) -> Self {
        Self {
            context,
            version_header: version_header.to_string(),
            programs: RefCountedCache::new(),
        }
    }

    /// Get (or compile) the program for both stages with the given flags
    ///
    /// # Errors
    ///
    /// `Error::ShaderCompilation` naming the failing stage's path. Nothing is
    /// cached for the key on failure.
    pub fn acquire<S: AsRef<str>>(
        &mut self,
        vertex_path: &Path,
        vertex_flags: &[S],
        fragment_path: &Path,
        fragment_flags: &[S],
    ) -> Result<ShaderProgramHandle> {
        let key = ShaderProgramKey::new(vertex_path, vertex_flags, fragment_path, fragment_flags);
        let context = &self.context;
        let header = self.version_header.as_str();

        self.programs.acquire_with(key, |key| {
            let vertex_spirv = compile_file(context, &key.vertex_path, ShaderStage::Vertex, &key.vertex_flags, header)?;
            let fragment_spirv =
                compile_file(context, &key.fragment_path, ShaderStage::Fragment, &key.fragment_flags, header)?;

            engine_debug!(
                "aurora::ShaderCache",
                "Compiled program '{}' {:?} + '{}' {:?}",
                key.vertex_path.display(), key.vertex_flags,
                key.fragment_path.display(), key.fragment_flags
            );

            Ok(ShaderProgram { key: key.clone(), vertex_spirv, fragment_spirv })
        })
    }

    /// Drop one reference; the program's SPIR-V is freed at zero
    ///
    /// Releasing a handle that is not live is a caller bug: it is logged and
    /// otherwise ignored.
    pub fn release(&mut self, handle: ShaderProgramHandle) {
        match self.programs.release(handle) {
            Ok(Some(program)) => {
                engine_debug!(
                    "aurora::ShaderCache",
                    "Evicted program '{}' + '{}'",
                    program.key.vertex_path.display(), program.key.fragment_path.display()
                );
            }
            Ok(None) => {}
            Err(e) => {
                engine_error!("aurora::ShaderCache", "{}", e);
            }
        }
    }

    /// Throw away a compiled program immediately, e.g. after its source changed
    ///
    /// Holders keep their handle; the next `acquire` of the same key recompiles.
    pub fn invalidate(&mut self, handle: ShaderProgramHandle) -> bool {
        self.programs.invalidate(handle).is_some()
    }

    pub fn program(&self, handle: ShaderProgramHandle) -> Option<&ShaderProgram> {
        self.programs.get(handle)
    }

    /// Fresh driver modules for one pipeline, from the cached SPIR-V
    pub fn instantiate_modules(&self, handle: ShaderProgramHandle) -> Result<(ShaderModule, ShaderModule)> {
        let program = self
            .programs
            .get(handle)
            .ok_or_else(|| Error::InvalidResource(format!("unknown shader program {:?}", handle)))?;

        let vertex = ShaderModule::from_spirv(
            self.context.clone(),
            &program.key.vertex_path.display().to_string(),
            ShaderStage::Vertex,
            &program.vertex_spirv,
        )?;
        let fragment = ShaderModule::from_spirv(
            self.context.clone(),
            &program.key.fragment_path.display().to_string(),
            ShaderStage::Fragment,
            &program.fragment_spirv,
        )?;
        Ok((vertex, fragment))
    }

    pub fn refcount(&self, handle: ShaderProgramHandle) -> Option<u32> {
        self.programs.refcount(handle)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Number of programs compiled so far (misses)
    pub fn creations(&self) -> u64 {
        self.programs.creations()
    }
}

fn compile_file(
    context: &DeviceContext,
    path: &Path,
    stage: ShaderStage,
    flags: &[String],
    version_header: &str,
) -> Result<Vec<u32>> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        engine_error!("aurora::ShaderCache", "Cannot read shader '{}' {:?}: {}", path.display(), flags, e);
        Error::ShaderCompilation {
            path: path.to_path_buf(),
            message: format!("cannot read source: {}", e),
        }
    })?;

    ShaderModule::compile_source(context, path, stage, &source, flags, version_header).map_err(|e| {
        engine_error!("aurora::ShaderCache", "Shader '{}' {:?} failed to compile", path.display(), flags);
        e
    })
}

#[cfg(test)]
#[path = "shader_cache_tests.rs"]
mod tests;
