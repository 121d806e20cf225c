/// Renderer configuration
///
/// Timeouts, swapchain sizing and shader locations for the
/// [`FrameOrchestrator`](crate::frame::FrameOrchestrator). Backend options
/// (validation, queue selection) live in [`Config`](crate::graphics_device::Config).

use std::path::PathBuf;

use crate::shader::DEFAULT_VERSION_HEADER;

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Bound on every per-frame fence wait
    pub fence_timeout_ns: u64,
    /// Bound on swapchain image acquisition
    pub acquire_timeout_ns: u64,
    /// Bound on the one-shot texture upload wait
    pub upload_timeout_ns: u64,
    /// Exact swapchain image count for `FrameOrchestrator::create` (not clamped)
    pub swapchain_image_count: u32,
    pub clear_color: [f32; 4],
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// `#version` line prepended to every shader source
    pub shader_version_header: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let shader_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders");
        Self {
            fence_timeout_ns: 1_000_000_000,
            acquire_timeout_ns: 1_000_000_000,
            upload_timeout_ns: 5_000_000_000,
            swapchain_image_count: 3,
            clear_color: [0.02, 0.02, 0.05, 1.0],
            vertex_shader: shader_dir.join("mesh.vert"),
            fragment_shader: shader_dir.join("mesh.frag"),
            shader_version_header: DEFAULT_VERSION_HEADER.to_string(),
        }
    }
}
