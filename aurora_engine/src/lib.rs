/*!
# Aurora Engine

Driver-agnostic GPU resource management and frame synchronization.

The engine core talks to the GPU only through the [`GraphicsDevice`] trait.
The Vulkan backend (`aurora_engine_renderer_vulkan`) implements it; tests use
an in-memory mock.

## Architecture

- **DeviceContext**: device, shader compiler and queue selection, shared by `Arc`
- **GpuAllocator / Buffer / Image**: allocations freed exactly once on drop
- **Swapchain**: presentable images with exact image count and sRGB format
- **ShaderModule / PipelineBuilder**: GLSL with injected defines, pipeline assembly
- **ShaderCache / TextureCache**: reference-counted sharing by key
- **FrameOrchestrator**: transfer, graphics and present per frame, with
  queue-family ownership transfers and bounded waits

[`GraphicsDevice`]: crate::graphics_device::GraphicsDevice
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod device_context;
pub mod memory;
pub mod swapchain;
pub mod shader;
pub mod cache;
pub mod frame;

// Main aurora namespace module
pub mod aurora {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton (logger routing)
    pub use crate::engine::Engine;

    pub use crate::config::RendererConfig;
    pub use crate::device_context::DeviceContext;
    pub use crate::frame::{FrameOrchestrator, FrameOutcome, FrameState, FrameStats, SkipReason};
    pub use crate::swapchain::Swapchain;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Driver boundary
    pub mod device {
        pub use crate::graphics_device::*;
    }

    pub mod memory {
        pub use crate::memory::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod cache {
        pub use crate::cache::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }
}

// Re-export math library at crate root
pub use glam;
