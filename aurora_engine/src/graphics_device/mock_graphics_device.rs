/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Simulates the driver in memory: handles are unique counters, host-visible
/// buffers are backed by heap memory, queue work completes instantly (fences
/// passed to a submit become signaled), and every submission is recorded with
/// a snapshot of its commands. Fence waits, acquires and presents can be
/// scripted to return timeouts or failures.
///
/// Destroying a handle that is not live panics, which turns any double free
/// into a test failure.

use std::collections::VecDeque;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::device_context::DeviceContext;
use crate::error::{Error, Result};
use crate::graphics_device::*;
use crate::shader::ShaderCompiler;

// ============================================================================
// Recorded data
// ============================================================================

/// One call to `queue_submit`
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub queue: QueueHandle,
    pub waits: Vec<SemaphoreWait>,
    pub signals: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
    /// Commands of every submitted command buffer, in order
    pub commands: Vec<Command>,
}

/// One call to `queue_present`
#[derive(Debug, Clone)]
pub struct PresentRecord {
    pub queue: QueueHandle,
    pub image_index: u32,
    pub waits: Vec<SemaphoreHandle>,
}

pub struct MockState {
    next_handle: u64,
    created: FxHashMap<&'static str, u32>,
    destroyed: FxHashMap<&'static str, u32>,
    live: FxHashMap<&'static str, FxHashSet<u64>>,
    buffer_memory: FxHashMap<BufferHandle, Box<[u8]>>,
    fences: FxHashMap<FenceHandle, bool>,
    recorded: FxHashMap<CommandBufferHandle, Vec<Command>>,
    swapchain_images: FxHashMap<SwapchainHandle, u32>,
    next_image_index: u32,

    pub capabilities: SurfaceCapabilities,
    pub fence_script: VecDeque<FenceStatus>,
    pub acquire_script: VecDeque<AcquireResult>,
    pub present_script: VecDeque<PresentResult>,
    /// One entry per `record_commands` call; `true` fails that call
    pub record_script: VecDeque<bool>,
    /// One entry per `queue_submit` call; `true` fails that call
    pub submit_script: VecDeque<bool>,
    pub fail_buffer_creation: bool,
    pub fail_pipeline_creation: bool,

    pub submissions: Vec<SubmissionRecord>,
    pub presents: Vec<PresentRecord>,
    pub pool_resets: Vec<CommandPoolHandle>,
    pub fence_resets: Vec<FenceHandle>,
    pub swapchain_descs: Vec<SwapchainDesc>,
    pub pipeline_descs: Vec<GraphicsPipelineDesc>,
    pub buffer_descs: Vec<BufferDesc>,
    pub image_descs: Vec<ImageDesc>,
    pub descriptor_writes: Vec<(DescriptorSetHandle, Vec<DescriptorWrite>)>,
    pub destroy_order: Vec<&'static str>,
    pub wait_idle_calls: u32,
}

impl MockState {
    fn alloc_handle(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        let handle = self.next_handle;
        *self.created.entry(kind).or_insert(0) += 1;
        self.live.entry(kind).or_default().insert(handle);
        handle
    }

    fn release_handle(&mut self, kind: &'static str, handle: u64) {
        let was_live = self.live.get_mut(kind).map(|set| set.remove(&handle)).unwrap_or(false);
        assert!(was_live, "mock: destroy of non-live {} handle {}", kind, handle);
        *self.destroyed.entry(kind).or_insert(0) += 1;
        self.destroy_order.push(kind);
    }
}

pub struct MockGraphicsDevice {
    graphics: QueueInfo,
    transfer: QueueInfo,
    state: Mutex<MockState>,
}

impl MockGraphicsDevice {
    /// Device with distinct graphics (family 0) and transfer (family 1) queues
    pub fn new() -> Self {
        Self::with_queues(
            QueueInfo { family_index: 0, queue: QueueHandle(0xA000) },
            QueueInfo { family_index: 1, queue: QueueHandle(0xB000) },
        )
    }

    /// Device whose transfer queue is the graphics queue
    pub fn with_shared_queue() -> Self {
        let queue = QueueInfo { family_index: 0, queue: QueueHandle(0xA000) };
        Self::with_queues(queue, queue)
    }

    fn with_queues(graphics: QueueInfo, transfer: QueueInfo) -> Self {
        let capabilities = SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: Some(Extent2D::new(800, 600)),
            min_extent: Extent2D::new(1, 1),
            max_extent: Extent2D::new(4096, 4096),
            formats: vec![
                SurfaceFormat { format: TextureFormat::B8G8R8A8_UNORM, color_space: ColorSpace::SrgbNonlinear },
                SurfaceFormat { format: TextureFormat::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
            ],
        };

        Self {
            graphics,
            transfer,
            state: Mutex::new(MockState {
                next_handle: 0,
                created: FxHashMap::default(),
                destroyed: FxHashMap::default(),
                live: FxHashMap::default(),
                buffer_memory: FxHashMap::default(),
                fences: FxHashMap::default(),
                recorded: FxHashMap::default(),
                swapchain_images: FxHashMap::default(),
                next_image_index: 0,
                capabilities,
                fence_script: VecDeque::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                record_script: VecDeque::new(),
                submit_script: VecDeque::new(),
                fail_buffer_creation: false,
                fail_pipeline_creation: false,
                submissions: Vec::new(),
                presents: Vec::new(),
                pool_resets: Vec::new(),
                fence_resets: Vec::new(),
                swapchain_descs: Vec::new(),
                pipeline_descs: Vec::new(),
                buffer_descs: Vec::new(),
                image_descs: Vec::new(),
                descriptor_writes: Vec::new(),
                destroy_order: Vec::new(),
                wait_idle_calls: 0,
            }),
        }
    }

    /// Direct access to the simulated driver state
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn created(&self, kind: &str) -> u32 {
        self.state().created.get(kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: &str) -> u32 {
        self.state().destroyed.get(kind).copied().unwrap_or(0)
    }

    /// Number of objects of `kind` created and not yet destroyed
    pub fn live(&self, kind: &str) -> usize {
        self.state().live.get(kind).map(|set| set.len()).unwrap_or(0)
    }

    /// Snapshot of a host-visible buffer's memory
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state().buffer_memory.get(&buffer).map(|mem| mem.to_vec())
    }

    pub fn script_fence_waits(&self, results: impl IntoIterator<Item = FenceStatus>) {
        self.state().fence_script.extend(results);
    }

    pub fn script_acquires(&self, results: impl IntoIterator<Item = AcquireResult>) {
        self.state().acquire_script.extend(results);
    }

    pub fn script_presents(&self, results: impl IntoIterator<Item = PresentResult>) {
        self.state().present_script.extend(results);
    }

    pub fn script_records(&self, failures: impl IntoIterator<Item = bool>) {
        self.state().record_script.extend(failures);
    }

    pub fn script_submits(&self, failures: impl IntoIterator<Item = bool>) {
        self.state().submit_script.extend(failures);
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state().submissions.clone()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn graphics_queue(&self) -> QueueInfo {
        self.graphics
    }

    fn transfer_queue(&self) -> QueueInfo {
        self.transfer
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferAllocation> {
        let mut state = self.state();
        if state.fail_buffer_creation {
            return Err(Error::OutOfMemory);
        }
        if desc.size == 0 {
            return Err(Error::InvalidResource("mock: zero-sized buffer".to_string()));
        }
        state.buffer_descs.push(desc.clone());
        let buffer = BufferHandle(state.alloc_handle("buffer"));
        let allocation = AllocationId(state.alloc_handle("allocation"));

        let mapped = if desc.memory.contains(MemoryProperty::HOST_VISIBLE) {
            let mut memory = vec![0u8; desc.size as usize].into_boxed_slice();
            let ptr = NonNull::new(memory.as_mut_ptr()).map(MappedPtr::new);
            state.buffer_memory.insert(buffer, memory);
            ptr
        } else {
            None
        };

        Ok(BufferAllocation { buffer, allocation, mapped })
    }

    fn destroy_buffer(&self, buffer: BufferHandle, allocation: AllocationId) {
        let mut state = self.state();
        state.release_handle("buffer", buffer.0);
        state.release_handle("allocation", allocation.0);
        state.buffer_memory.remove(&buffer);
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageAllocation> {
        let mut state = self.state();
        state.image_descs.push(desc.clone());
        let image = ImageHandle(state.alloc_handle("image"));
        let allocation = AllocationId(state.alloc_handle("allocation"));
        Ok(ImageAllocation { image, allocation })
    }

    fn destroy_image(&self, image: ImageHandle, allocation: AllocationId) {
        let mut state = self.state();
        state.release_handle("image", image.0);
        state.release_handle("allocation", allocation.0);
    }

    fn create_image_view(
        &self,
        _image: ImageHandle,
        _format: TextureFormat,
        _aspect: ImageAspect,
    ) -> Result<ImageViewHandle> {
        Ok(ImageViewHandle(self.state().alloc_handle("image_view")))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        self.state().release_handle("image_view", view.0);
    }

    fn create_shader_module(&self, spirv: &[u32]) -> Result<ShaderModuleHandle> {
        if spirv.is_empty() {
            return Err(Error::InvalidResource("mock: empty SPIR-V".to_string()));
        }
        Ok(ShaderModuleHandle(self.state().alloc_handle("shader_module")))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.state().release_handle("shader_module", module.0);
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle> {
        Ok(DescriptorSetLayoutHandle(self.state().alloc_handle("descriptor_set_layout")))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.state().release_handle("descriptor_set_layout", layout.0);
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<(PipelineHandle, PipelineLayoutHandle)> {
        let mut state = self.state();
        if state.fail_pipeline_creation {
            return Err(Error::BackendError("mock: pipeline rejected".to_string()));
        }
        state.pipeline_descs.push(desc.clone());
        let pipeline = PipelineHandle(state.alloc_handle("pipeline"));
        let layout = PipelineLayoutHandle(state.alloc_handle("pipeline_layout"));
        Ok((pipeline, layout))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle, layout: PipelineLayoutHandle) {
        let mut state = self.state();
        state.release_handle("pipeline", pipeline.0);
        state.release_handle("pipeline_layout", layout.0);
    }

    fn create_descriptor_pool(
        &self,
        _max_sets: u32,
        _sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle> {
        Ok(DescriptorPoolHandle(self.state().alloc_handle("descriptor_pool")))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        self.state().release_handle("descriptor_pool", pool.0);
    }

    fn allocate_descriptor_set(
        &self,
        _pool: DescriptorPoolHandle,
        _layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let mut state = self.state();
        state.next_handle += 1;
        Ok(DescriptorSetHandle(state.next_handle))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) {
        self.state().descriptor_writes.push((set, writes.to_vec()));
    }

    fn create_sampler(&self) -> Result<SamplerHandle> {
        Ok(SamplerHandle(self.state().alloc_handle("sampler")))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        self.state().release_handle("sampler", sampler.0);
    }

    fn create_command_pool(&self, _queue_family: u32) -> Result<CommandPoolHandle> {
        Ok(CommandPoolHandle(self.state().alloc_handle("command_pool")))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        self.state().release_handle("command_pool", pool.0);
    }

    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()> {
        self.state().pool_resets.push(pool);
        Ok(())
    }

    fn allocate_command_buffer(&self, _pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let mut state = self.state();
        state.next_handle += 1;
        Ok(CommandBufferHandle(state.next_handle))
    }

    fn record_commands(&self, command_buffer: CommandBufferHandle, commands: &[Command]) -> Result<()> {
        let mut state = self.state();
        if state.record_script.pop_front() == Some(true) {
            state.recorded.remove(&command_buffer);
            return Err(Error::BackendError("mock: record failed".to_string()));
        }
        state.recorded.insert(command_buffer, commands.to_vec());
        Ok(())
    }

    fn queue_submit(&self, queue: QueueHandle, submit: &SubmitInfo) -> Result<()> {
        let mut state = self.state();
        if state.submit_script.pop_front() == Some(true) {
            return Err(Error::BackendError("mock: submit failed".to_string()));
        }
        let mut commands = Vec::new();
        for cb in submit.command_buffers {
            let recorded = state
                .recorded
                .get(cb)
                .ok_or_else(|| Error::BackendError(format!("mock: command buffer {:?} not recorded", cb)))?;
            commands.extend(recorded.iter().cloned());
        }
        if let Some(fence) = submit.fence {
            state.fences.insert(fence, true);
        }
        state.submissions.push(SubmissionRecord {
            queue,
            waits: submit.waits.to_vec(),
            signals: submit.signals.to_vec(),
            fence: submit.fence,
            commands,
        });
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        let fence = FenceHandle(state.alloc_handle("fence"));
        state.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state();
        state.release_handle("fence", fence.0);
        state.fences.remove(&fence);
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) -> Result<FenceStatus> {
        let mut state = self.state();
        if let Some(FenceStatus::Timeout) = state.fence_script.pop_front() {
            return Ok(FenceStatus::Timeout);
        }
        match state.fences.get(&fence) {
            Some(true) => Ok(FenceStatus::Signaled),
            Some(false) => Ok(FenceStatus::Timeout),
            None => Err(Error::InvalidResource(format!("mock: unknown fence {:?}", fence))),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state();
        state.fences.insert(fence, false);
        state.fence_resets.push(fence);
        Ok(())
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        Ok(SemaphoreHandle(self.state().alloc_handle("semaphore")))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        self.state().release_handle("semaphore", semaphore.0);
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(self.state().capabilities.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(SwapchainHandle, Vec<ImageHandle>)> {
        let mut state = self.state();
        state.swapchain_descs.push(*desc);
        let swapchain = SwapchainHandle(state.alloc_handle("swapchain"));
        let images = (0..desc.image_count)
            .map(|_| {
                state.next_handle += 1;
                ImageHandle(state.next_handle)
            })
            .collect();
        state.swapchain_images.insert(swapchain, desc.image_count);
        Ok((swapchain, images))
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        let mut state = self.state();
        state.release_handle("swapchain", swapchain.0);
        state.swapchain_images.remove(&swapchain);
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        _timeout_ns: u64,
        _signal_semaphore: Option<SemaphoreHandle>,
        signal_fence: Option<FenceHandle>,
    ) -> Result<AcquireResult> {
        let mut state = self.state();
        let image_count = *state
            .swapchain_images
            .get(&swapchain)
            .ok_or_else(|| Error::InvalidResource("mock: unknown swapchain".to_string()))?;

        let scripted = state.acquire_script.pop_front();
        let result = match scripted {
            Some(AcquireResult::Timeout) => return Ok(AcquireResult::Timeout),
            Some(AcquireResult::OutOfDate) => return Ok(AcquireResult::OutOfDate),
            Some(other) => other,
            None => {
                let index = state.next_image_index % image_count;
                AcquireResult::Success(index)
            }
        };
        state.next_image_index = state.next_image_index.wrapping_add(1);
        if let Some(fence) = signal_fence {
            state.fences.insert(fence, true);
        }
        Ok(result)
    }

    fn queue_present(
        &self,
        queue: QueueHandle,
        _swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentResult> {
        let mut state = self.state();
        state.presents.push(PresentRecord {
            queue,
            image_index,
            waits: wait_semaphores.to_vec(),
        });
        Ok(state.present_script.pop_front().unwrap_or(PresentResult::Success))
    }

    fn wait_idle(&self) -> Result<()> {
        self.state().wait_idle_calls += 1;
        Ok(())
    }
}

// ============================================================================
// Mock shader compiler
// ============================================================================

/// Compiler producing a fake SPIR-V word stream
///
/// Sources containing `#error` fail to compile. Every call is counted.
pub struct MockShaderCompiler {
    compiles: AtomicU32,
    pub sources: Mutex<Vec<String>>,
}

impl MockShaderCompiler {
    pub fn new() -> Self {
        Self {
            compiles: AtomicU32::new(0),
            sources: Mutex::new(Vec::new()),
        }
    }

    pub fn compile_count(&self) -> u32 {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl ShaderCompiler for MockShaderCompiler {
    fn compile(&self, _stage: crate::shader::ShaderStage, source: &str, name: &Path) -> Result<Vec<u32>> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(source.to_string());
        if source.contains("#error") {
            return Err(Error::ShaderCompilation {
                path: name.to_path_buf(),
                message: "#error directive".to_string(),
            });
        }
        Ok(vec![0x0723_0203, source.len() as u32])
    }
}

/// Mock device, mock compiler and a context wrapping both
pub fn mock_context() -> (Arc<MockGraphicsDevice>, Arc<MockShaderCompiler>, Arc<DeviceContext>) {
    mock_context_with(MockGraphicsDevice::new())
}

pub fn mock_context_with(
    device: MockGraphicsDevice,
) -> (Arc<MockGraphicsDevice>, Arc<MockShaderCompiler>, Arc<DeviceContext>) {
    let device = Arc::new(device);
    let compiler = Arc::new(MockShaderCompiler::new());
    let context = Arc::new(DeviceContext::with_compiler(device.clone(), compiler.clone()));
    (device, compiler, context)
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
