/// Creation descriptors and driver-returned allocation records

use std::ptr::NonNull;
use super::handles::*;
use super::types::*;

// ===== MEMORY =====

#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name passed to the allocator
    pub name: String,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryProperty,
    /// Queue family that first writes the buffer
    pub owner_queue_family: u32,
}

/// Pointer into a persistently mapped allocation
///
/// Valid until the owning allocation is destroyed. Access through it is
/// serialized by the owning [`Buffer`](crate::memory::Buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPtr(NonNull<u8>);

impl MappedPtr {
    pub fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.0.as_ptr()
    }
}

// SAFETY: the mapping stays valid for the allocation lifetime and is only
// written through `&mut Buffer`.
unsafe impl Send for MappedPtr {}
unsafe impl Sync for MappedPtr {}

/// A buffer bound to its memory
#[derive(Debug, Clone, Copy)]
pub struct BufferAllocation {
    pub buffer: BufferHandle,
    pub allocation: AllocationId,
    pub mapped: Option<MappedPtr>,
}

#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub format: TextureFormat,
    pub usage: ImageUsage,
    pub extent: Extent2D,
    pub owner_queue_family: u32,
}

/// An image bound to its memory
#[derive(Debug, Clone, Copy)]
pub struct ImageAllocation {
    pub image: ImageHandle,
    pub allocation: AllocationId,
}

// ===== DESCRIPTORS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub stages: ShaderStageFlags,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    UniformBuffer { buffer: BufferHandle, offset: u64, range: u64 },
    SampledImage { view: ImageViewHandle },
    Sampler { sampler: SamplerHandle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

// ===== PIPELINES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: BufferFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Complete state for one graphics pipeline (dynamic rendering, no render pass object)
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_module: ShaderModuleHandle,
    pub fragment_module: ShaderModuleHandle,
    pub vertex_bindings: Vec<VertexBinding>,
    pub vertex_attributes: Vec<VertexAttribute>,
    pub topology: PrimitiveTopology,
    pub viewport: Viewport,
    pub scissor: Rect2D,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub blend_enable: bool,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

// ===== PRESENTATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// `None` when the surface size is decided by the swapchain extent
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    pub formats: Vec<SurfaceFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub image_count: u32,
    pub format: TextureFormat,
    pub color_space: ColorSpace,
    pub extent: Extent2D,
    pub present_mode: PresentMode,
}

// ===== SUBMISSION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreWait {
    pub semaphore: SemaphoreHandle,
    pub stage: PipelineStage,
}

/// One queue submission
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub waits: &'a [SemaphoreWait],
    pub command_buffers: &'a [CommandBufferHandle],
    pub signals: &'a [SemaphoreHandle],
    pub fence: Option<FenceHandle>,
}
