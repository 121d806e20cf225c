/// DeviceContext - the driver connection shared by every engine component
///
/// Owns the device (through an `Arc`), the shader compiler, and the graphics
/// and transfer queue descriptions. Components hold an `Arc<DeviceContext>`,
/// so the device always outlives the objects created from it.

use std::sync::Arc;
use crate::graphics_device::{GraphicsDevice, QueueInfo};
use crate::shader::{GlslCompiler, ShaderCompiler};
use crate::engine_info;

pub struct DeviceContext {
    device: Arc<dyn GraphicsDevice>,
    compiler: Arc<dyn ShaderCompiler>,
    graphics: QueueInfo,
    transfer: QueueInfo,
}

impl DeviceContext {
    /// Wrap a device, compiling shaders with the built-in GLSL compiler
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self::with_compiler(device, Arc::new(GlslCompiler::new()))
    }

    pub fn with_compiler(device: Arc<dyn GraphicsDevice>, compiler: Arc<dyn ShaderCompiler>) -> Self {
        let graphics = device.graphics_queue();
        let transfer = device.transfer_queue();

        engine_info!(
            "aurora::DeviceContext",
            "Device context ready (graphics family {}, transfer family {}{})",
            graphics.family_index,
            transfer.family_index,
            if graphics.family_index == transfer.family_index { ", shared" } else { "" }
        );

        Self { device, compiler, graphics, transfer }
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn compiler(&self) -> &dyn ShaderCompiler {
        self.compiler.as_ref()
    }

    pub fn graphics(&self) -> QueueInfo {
        self.graphics
    }

    pub fn transfer(&self) -> QueueInfo {
        self.transfer
    }

    /// True when uploads need queue-family ownership transfers
    pub fn has_dedicated_transfer(&self) -> bool {
        self.graphics.family_index != self.transfer.family_index
    }
}
