/*!
# Aurora Engine - Vulkan Backend

Vulkan 1.3 implementation of the aurora_engine [`GraphicsDevice`] trait,
built on `ash` for the bindings and `gpu-allocator` for memory.

Rendering uses dynamic rendering (no render pass objects). Validation
messages are routed through a colored console/file messenger when
validation is enabled.

```no_run
use std::sync::Arc;
use aurora_engine::aurora::device::Config;
use aurora_engine_renderer_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> aurora_engine::aurora::Result<()> {
let device = Arc::new(VulkanGraphicsDevice::new(window, Config::default())?);
# Ok(())
# }
```

[`GraphicsDevice`]: aurora_engine::aurora::device::GraphicsDevice
*/

mod vulkan;
mod vulkan_format;
mod vulkan_command;
mod vulkan_pipeline;
mod vulkan_swapchain;
mod debug;

pub use vulkan::VulkanGraphicsDevice;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report};

// Backend namespace, mirrors `aurora_engine::aurora`
pub mod aurora {
    pub use crate::vulkan::VulkanGraphicsDevice;
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}
