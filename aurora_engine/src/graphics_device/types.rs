/// Formats, flag sets and fixed-function enums shared by the core and the backends

use bitflags::bitflags;

// ===== FLAG SETS =====

bitflags! {
    /// How a buffer will be used by the device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM      = 1 << 2;
        const STORAGE      = 1 << 3;
        const INDEX        = 1 << 4;
        const VERTEX       = 1 << 5;
    }
}

bitflags! {
    /// Requested memory properties for an allocation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperty: u32 {
        const DEVICE_LOCAL  = 1 << 0;
        /// Host-visible memory is persistently mapped for the allocation's lifetime
        const HOST_VISIBLE  = 1 << 1;
        const HOST_COHERENT = 1 << 2;
    }
}

impl MemoryProperty {
    /// Host-visible and coherent (staging buffers, uniforms)
    pub fn host_visible() -> Self {
        Self::HOST_VISIBLE | Self::HOST_COHERENT
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC             = 1 << 0;
        const TRANSFER_DST             = 1 << 1;
        const SAMPLED                  = 1 << 2;
        const COLOR_ATTACHMENT         = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 4;
    }
}

bitflags! {
    /// Pipeline stages used in barriers and semaphore waits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        const TOP_OF_PIPE             = 1 << 0;
        const VERTEX_INPUT            = 1 << 2;
        const VERTEX_SHADER           = 1 << 3;
        const FRAGMENT_SHADER         = 1 << 7;
        const EARLY_FRAGMENT_TESTS    = 1 << 8;
        const LATE_FRAGMENT_TESTS     = 1 << 9;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 10;
        const TRANSFER                = 1 << 12;
        const BOTTOM_OF_PIPE          = 1 << 13;
    }
}

bitflags! {
    /// Memory access types used in barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INDEX_READ                     = 1 << 1;
        const VERTEX_ATTRIBUTE_READ          = 1 << 2;
        const UNIFORM_READ                   = 1 << 3;
        const SHADER_READ                    = 1 << 5;
        const COLOR_ATTACHMENT_WRITE         = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 10;
        const TRANSFER_READ                  = 1 << 11;
        const TRANSFER_WRITE                 = 1 << 12;
        const HOST_WRITE                     = 1 << 14;
    }
}

bitflags! {
    /// Options applied at pipeline build time
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineFlags: u32 {
        /// Cull back faces (counter-clockwise front faces)
        const CULL_BACK_FACES = 1 << 0;
        /// Write depth when the depth test is enabled
        const DEPTH_WRITE     = 1 << 1;
    }
}

// ===== FORMATS =====

/// Image pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        4
    }
}

/// Vertex attribute formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_UINT,
}

impl BufferFormat {
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_UINT => 4,
            BufferFormat::R32G32_SFLOAT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

/// Swapchain color space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    SrgbNonlinear,
    /// Any color space the engine does not render to (raw driver value)
    Other(i32),
}

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// Vsynced, tear-free, always supported
    Fifo,
    Mailbox,
    Immediate,
}

// ===== FIXED-FUNCTION ENUMS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Image layouts the engine transitions between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    TransferDst,
    ShaderReadOnly,
    ColorAttachment,
    DepthAttachment,
    PresentSrc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    SampledImage,
    Sampler,
}

// ===== GEOMETRY =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp each dimension into `[min, max]`
    pub fn clamp(&self, min: Extent2D, max: Extent2D) -> Self {
        Self {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with depth range [0, 1]
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

// ===== RESULTS =====

/// Outcome of a bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    /// The timeout elapsed first; not an error
    Timeout,
}

/// Driver-level result of a swapchain acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    Success(u32),
    Suboptimal(u32),
    Timeout,
    OutOfDate,
}

/// Driver-level result of a present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Success,
    Suboptimal,
    OutOfDate,
}
