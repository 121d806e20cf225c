/// GraphicsDevice trait - the boundary to the GPU driver
///
/// Every driver call made by the engine goes through this trait. Backends
/// (Vulkan, the in-memory mock) implement it; the engine core never touches a
/// driver type directly.
///
/// Methods take `&self`: a backend serializes internally where the driver
/// requires it. Object lifetimes are managed by the engine wrappers, which
/// call the matching `destroy_*` exactly once.

use crate::error::Result;
use super::command::Command;
use super::desc::*;
use super::handles::*;
use super::types::*;

pub trait GraphicsDevice: Send + Sync {
    // ===== QUEUES =====

    /// Graphics-capable queue (also used for presentation)
    fn graphics_queue(&self) -> QueueInfo;

    /// Queue used for uploads; may share the graphics family
    fn transfer_queue(&self) -> QueueInfo;

    // ===== MEMORY =====

    /// Create a buffer and bind it to freshly allocated memory
    ///
    /// Host-visible requests come back persistently mapped.
    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferAllocation>;

    fn destroy_buffer(&self, buffer: BufferHandle, allocation: AllocationId);

    /// Create a single-mip 2D image and bind it to device-local memory
    fn create_image(&self, desc: &ImageDesc) -> Result<ImageAllocation>;

    fn destroy_image(&self, image: ImageHandle, allocation: AllocationId);

    fn create_image_view(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        aspect: ImageAspect,
    ) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&self, spirv: &[u32]) -> Result<ShaderModuleHandle>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    /// Create a pipeline layout and a graphics pipeline using it
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<(PipelineHandle, PipelineLayoutHandle)>;

    /// Destroy a pipeline and its layout
    fn destroy_pipeline(&self, pipeline: PipelineHandle, layout: PipelineLayoutHandle);

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle>;

    /// Destroy a pool and free every set allocated from it
    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle>;

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]);

    /// Linear, repeat-addressed sampler
    fn create_sampler(&self) -> Result<SamplerHandle>;

    fn destroy_sampler(&self, sampler: SamplerHandle);

    // ===== COMMANDS =====

    fn create_command_pool(&self, queue_family: u32) -> Result<CommandPoolHandle>;

    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    /// Return every command buffer of the pool to the initial state
    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()>;

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle>;

    /// Begin, record `commands` as one-time-submit, end
    fn record_commands(&self, command_buffer: CommandBufferHandle, commands: &[Command]) -> Result<()>;

    fn queue_submit(&self, queue: QueueHandle, submit: &SubmitInfo) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&self, fence: FenceHandle);

    /// Wait at most `timeout_ns` for the fence
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<FenceStatus>;

    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    // ===== PRESENTATION =====

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;

    /// Create a swapchain and return it with its presentable images
    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(SwapchainHandle, Vec<ImageHandle>)>;

    fn destroy_swapchain(&self, swapchain: SwapchainHandle);

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        timeout_ns: u64,
        signal_semaphore: Option<SemaphoreHandle>,
        signal_fence: Option<FenceHandle>,
    ) -> Result<AcquireResult>;

    fn queue_present(
        &self,
        queue: QueueHandle,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentResult>;

    /// Block until the device is idle (setup and shutdown only)
    fn wait_idle(&self) -> Result<()>;
}
