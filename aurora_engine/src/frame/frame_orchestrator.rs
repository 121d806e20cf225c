/// FrameOrchestrator - per-object GPU resources and the per-frame protocol
///
/// Each frame runs the transfer half (staging copies + ownership release on
/// the transfer queue), then the graphics half (ownership acquire, draws,
/// present on the graphics queue):
///
/// `Idle -> TransferRecording -> TransferSubmitted -> GraphicsRecording -> GraphicsSubmitted -> Presenting -> Idle`
///
/// Fence waits and image acquisition are bounded. A timeout skips the frame
/// without destroying or resetting anything; a skip after the transfer was
/// submitted leaves the state at `TransferSubmitted`, so the next call
/// resumes at the graphics half and consumes the transfer semaphore exactly
/// once.
///
/// Graphics of frame N signals a semaphore that the transfer of frame N+1
/// waits on before overwriting the device-local buffers.

use std::sync::Arc;

use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::cache::{ShaderCache, ShaderProgramHandle, TextureCache, TextureHandle};
use crate::config::RendererConfig;
use crate::device_context::DeviceContext;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, BufferUsage, Command, CommandBufferHandle, CommandPoolHandle, DescriptorBinding,
    DescriptorPoolHandle, DescriptorPoolSize, DescriptorResource, DescriptorType, DescriptorWrite,
    FenceHandle, FenceStatus, ImageAspect, ImageBarrier, ImageLayout, ImageUsage, MemoryProperty,
    PipelineFlags, PipelineStage, PolygonMode, PrimitiveTopology, Rect2D, SamplerHandle,
    SemaphoreHandle, SemaphoreWait, ShaderStageFlags, SubmitInfo, TextureFormat, VertexBinding,
    VertexInputRate, Viewport,
};
use crate::memory::{GpuAllocator, Image};
use crate::shader::{Pipeline, PipelineBuilder};
use crate::swapchain::{AcquireOutcome, PresentOutcome, SurfaceExtentSource, Swapchain, SwapchainImage};
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use super::render_object::RenderObject;
use super::scene::{MaterialUniform, MeshData, SceneObject, Vertex};

/// Graphics submissions that may be in flight at once
pub const FRAMES_IN_FLIGHT: usize = 2;

/// `view * transform`, one column-major mat4
pub const PUSH_CONSTANT_SIZE: u32 = 64;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_FLOAT;

// ===== STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    TransferRecording,
    TransferSubmitted,
    GraphicsRecording,
    GraphicsSubmitted,
    Presenting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TransferFenceTimeout,
    GraphicsFenceTimeout,
    AcquireTimeout,
    SwapchainOutOfDate,
    PresentFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image_index: u32 },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub frames_dropped: u64,
}

// ===== SYNC OBJECTS =====

/// Command buffer and completion objects for one queue submission stream
#[derive(Debug, Clone, Copy)]
struct SubmitSlot {
    command_pool: CommandPoolHandle,
    command_buffer: CommandBufferHandle,
    fence: FenceHandle,
    /// Transfer: signaled for the graphics half. Graphics: image acquired.
    semaphore: SemaphoreHandle,
}

/// Cache references and pipeline slot resolved for one scene object
#[derive(Debug, Clone, Copy)]
struct ObjectResources {
    scene_index: usize,
    program: ShaderProgramHandle,
    texture: Option<TextureHandle>,
    pipeline_index: usize,
}

/// What a replaced scene leaves behind until it is released
struct RetiredScene {
    objects: Vec<RenderObject>,
    pipelines: Vec<Pipeline>,
    descriptor_pool: Option<DescriptorPoolHandle>,
}

/// Pipelines are shared by objects with the same program and material mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ShaderProgramHandle,
    textured: bool,
    blended: bool,
}

// ===== ORCHESTRATOR =====

pub struct FrameOrchestrator {
    context: Arc<DeviceContext>,
    config: RendererConfig,

    objects: Vec<RenderObject>,
    pipelines: Vec<Pipeline>,
    descriptor_pool: Option<DescriptorPoolHandle>,
    scene_len: usize,

    transfer: SubmitSlot,
    slots: [SubmitSlot; FRAMES_IN_FLIGHT],
    render_complete: Vec<SemaphoreHandle>,
    graphics_done: SemaphoreHandle,
    graphics_done_pending: bool,
    current_slot: usize,
    state: FrameState,
    stats: FrameStats,

    sampler: SamplerHandle,
    depth_image: Image,
    swapchain: Swapchain,
    texture_cache: TextureCache,
    shader_cache: ShaderCache,
    allocator: GpuAllocator,
}

impl FrameOrchestrator {
    /// Create the swapchain with `config.swapchain_image_count` images, then
    /// everything [`new`](Self::new) creates
    pub fn create(
        context: Arc<DeviceContext>,
        surface: &dyn SurfaceExtentSource,
        config: RendererConfig,
    ) -> Result<Self> {
        let swapchain = Swapchain::create(context.clone(), surface, config.swapchain_image_count)?;
        Self::new(context, swapchain, config)
    }

    /// Create caches, depth buffer, sampler and every sync object
    pub fn new(context: Arc<DeviceContext>, swapchain: Swapchain, config: RendererConfig) -> Result<Self> {
        let device = context.device();
        let allocator = GpuAllocator::new(context.clone());
        let shader_cache = ShaderCache::with_version_header(context.clone(), &config.shader_version_header);
        let texture_cache = TextureCache::new(allocator.clone(), config.upload_timeout_ns)?;

        let depth_image = allocator.create_image(
            DEPTH_FORMAT,
            ImageAspect::DEPTH,
            ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            swapchain.extent(),
            context.graphics().family_index,
        )?;
        let sampler = device.create_sampler()?;

        let transfer = create_submit_slot(&context, context.transfer().family_index)?;
        let slots = [
            create_submit_slot(&context, context.graphics().family_index)?,
            create_submit_slot(&context, context.graphics().family_index)?,
        ];
        let render_complete = (0..swapchain.image_count())
            .map(|_| device.create_semaphore())
            .collect::<Result<Vec<_>>>()?;
        let graphics_done = device.create_semaphore()?;

        engine_info!(
            "aurora::FrameOrchestrator",
            "Frame orchestrator ready ({} swapchain images, {} frames in flight, {} transfer queue)",
            swapchain.image_count(),
            FRAMES_IN_FLIGHT,
            if context.has_dedicated_transfer() { "dedicated" } else { "shared" }
        );

        Ok(Self {
            context,
            config,
            objects: Vec::new(),
            pipelines: Vec::new(),
            descriptor_pool: None,
            scene_len: 0,
            transfer,
            slots,
            render_complete,
            graphics_done,
            graphics_done_pending: false,
            current_slot: 0,
            state: FrameState::Idle,
            stats: FrameStats::default(),
            sampler,
            depth_image,
            swapchain,
            texture_cache,
            shader_cache,
            allocator,
        })
    }

    // ===== ACCESSORS =====

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn render_object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn render_objects(&self) -> &[RenderObject] {
        &self.objects
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn shader_cache(&self) -> &ShaderCache {
        &self.shader_cache
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.texture_cache
    }

    pub fn allocator(&self) -> &GpuAllocator {
        &self.allocator
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    // ========================================================================
    // SCENE SETUP
    // ========================================================================

    /// Replace every RenderObject with ones built for `scene`
    ///
    /// Objects whose shaders, texture or pipeline fail are skipped with an
    /// error log. Allocation failures abort setup and are returned. The
    /// previous objects are released after the new ones are built, so
    /// programs and textures used by both stay cached.
    pub fn setup_scene(&mut self, scene: &[SceneObject]) -> Result<()> {
        self.context.device().wait_idle()?;
        self.reset_frame_sync()?;

        let previous = self.take_scene();
        let built = self.build_scene(scene);
        self.release_scene(previous);
        built
    }

    fn build_scene(&mut self, scene: &[SceneObject]) -> Result<()> {
        self.scene_len = scene.len();
        if scene.is_empty() {
            engine_info!("aurora::FrameOrchestrator", "Scene cleared");
            return Ok(());
        }

        let pool_size = scene.len() as u32;
        let pool = self.context.device().create_descriptor_pool(
            pool_size,
            &[
                DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: pool_size },
                DescriptorPoolSize { descriptor_type: DescriptorType::SampledImage, count: pool_size },
                DescriptorPoolSize { descriptor_type: DescriptorType::Sampler, count: pool_size },
            ],
        )?;
        self.descriptor_pool = Some(pool);

        let mut pipeline_index: FxHashMap<PipelineKey, usize> = FxHashMap::default();
        for (scene_index, object) in scene.iter().enumerate() {
            if let Some(render_object) = self.build_object(scene_index, object, pool, &mut pipeline_index)? {
                self.objects.push(render_object);
            }
        }

        engine_info!(
            "aurora::FrameOrchestrator",
            "Scene ready: {}/{} objects, {} pipelines, {} programs, {} textures",
            self.objects.len(),
            scene.len(),
            self.pipelines.len(),
            self.shader_cache.len(),
            self.texture_cache.len()
        );
        Ok(())
    }

    /// `Ok(None)` when the object is skipped
    fn build_object(
        &mut self,
        scene_index: usize,
        object: &SceneObject,
        pool: DescriptorPoolHandle,
        pipeline_index: &mut FxHashMap<PipelineKey, usize>,
    ) -> Result<Option<RenderObject>> {
        let mesh = object.mesh;
        if mesh.is_empty() {
            engine_warn!("aurora::FrameOrchestrator", "Scene object {} has no geometry, skipped", scene_index);
            return Ok(None);
        }

        // ========== SHARED RESOURCES (failure skips the object) ==========
        let material = &mesh.material;
        let program = match self.shader_cache.acquire(
            &self.config.vertex_shader,
            &[] as &[&str],
            &self.config.fragment_shader,
            &material.shader_flags(),
        ) {
            Ok(program) => program,
            Err(e) => {
                engine_error!("aurora::FrameOrchestrator", "Scene object {} skipped: {}", scene_index, e);
                return Ok(None);
            }
        };

        let texture = match &material.texture_path {
            Some(path) => match self.texture_cache.acquire(path) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    engine_error!("aurora::FrameOrchestrator", "Scene object {} skipped: {}", scene_index, e);
                    self.shader_cache.release(program);
                    return Ok(None);
                }
            },
            None => None,
        };

        let key = PipelineKey { program, textured: texture.is_some(), blended: material.is_translucent() };
        let pipeline_slot = match pipeline_index.get(&key) {
            Some(&index) => index,
            None => match self.build_pipeline(key) {
                Ok(pipeline) => {
                    self.pipelines.push(pipeline);
                    pipeline_index.insert(key, self.pipelines.len() - 1);
                    self.pipelines.len() - 1
                }
                Err(e) => {
                    engine_error!("aurora::FrameOrchestrator", "Scene object {} skipped: {}", scene_index, e);
                    self.release_cache_refs(program, texture);
                    return Ok(None);
                }
            },
        };

        // ========== PER-OBJECT BUFFERS (failure aborts setup) ==========
        let shared = ObjectResources { scene_index, program, texture, pipeline_index: pipeline_slot };
        match self.allocate_object(shared, mesh, pool) {
            Ok(render_object) => Ok(Some(render_object)),
            Err(e) => {
                self.release_cache_refs(program, texture);
                Err(e)
            }
        }
    }

    fn allocate_object(
        &self,
        shared: ObjectResources,
        mesh: &MeshData,
        pool: DescriptorPoolHandle,
    ) -> Result<RenderObject> {
        let transfer_family = self.context.transfer().family_index;
        let vertex_size = mesh.vertex_bytes().len() as u64;
        let index_size = mesh.index_bytes().len() as u64;
        let uniform_size = std::mem::size_of::<MaterialUniform>() as u64;

        let vertex_buffer = self.allocator.create_buffer(
            vertex_size,
            BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
            MemoryProperty::DEVICE_LOCAL,
            transfer_family,
        )?;
        let index_buffer = self.allocator.create_buffer(
            index_size,
            BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
            MemoryProperty::DEVICE_LOCAL,
            transfer_family,
        )?;
        let uniform_buffer = self.allocator.create_buffer(
            uniform_size,
            BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST,
            MemoryProperty::host_visible(),
            transfer_family,
        )?;
        let staging = self.allocator.create_buffer(
            vertex_size + index_size + uniform_size,
            BufferUsage::TRANSFER_SRC,
            MemoryProperty::host_visible(),
            transfer_family,
        )?;

        // ========== DESCRIPTOR SET ==========
        let device = self.context.device();
        let layout = self.pipelines[shared.pipeline_index]
            .set_layouts()
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidResource("material pipeline has no descriptor set layout".to_string()))?;
        let descriptor_set = device.allocate_descriptor_set(pool, layout).map_err(|e| {
            engine_error!("aurora::FrameOrchestrator", "Descriptor set for object {} failed: {}", shared.scene_index, e);
            e
        })?;

        let mut writes = vec![DescriptorWrite {
            binding: 0,
            resource: DescriptorResource::UniformBuffer { buffer: uniform_buffer.handle(), offset: 0, range: uniform_size },
        }];
        if let Some(view) = shared.texture.and_then(|t| self.texture_cache.texture(t)).map(|t| t.view()) {
            writes.push(DescriptorWrite { binding: 1, resource: DescriptorResource::SampledImage { view } });
            writes.push(DescriptorWrite { binding: 2, resource: DescriptorResource::Sampler { sampler: self.sampler } });
        }
        device.update_descriptor_set(descriptor_set, &writes);

        Ok(RenderObject {
            scene_index: shared.scene_index,
            program: shared.program,
            texture: shared.texture,
            pipeline_index: shared.pipeline_index,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            staging,
            descriptor_set,
            index_count: mesh.indices.len() as u32,
        })
    }

    fn build_pipeline(&self, key: PipelineKey) -> Result<Pipeline> {
        let (mut vertex, mut fragment) = self.shader_cache.instantiate_modules(key.program)?;

        vertex.add_push_constant_range(ShaderStageFlags::VERTEX, 0, PUSH_CONSTANT_SIZE);
        let mut bindings = vec![DescriptorBinding {
            binding: 0,
            descriptor_type: DescriptorType::UniformBuffer,
            stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
            count: 1,
        }];
        if key.textured {
            bindings.push(DescriptorBinding {
                binding: 1,
                descriptor_type: DescriptorType::SampledImage,
                stages: ShaderStageFlags::FRAGMENT,
                count: 1,
            });
            bindings.push(DescriptorBinding {
                binding: 2,
                descriptor_type: DescriptorType::Sampler,
                stages: ShaderStageFlags::FRAGMENT,
                count: 1,
            });
        }
        fragment.add_descriptor_set_layout(&bindings)?;

        let extent = self.swapchain.extent();
        let mut builder = PipelineBuilder::new(self.context.clone());
        builder
            .set_vertex_shader(vertex)
            .set_fragment_shader(fragment)
            .add_input_buffer_description(
                VertexBinding { binding: 0, stride: Vertex::STRIDE, input_rate: VertexInputRate::Vertex },
                &Vertex::attributes(),
            )
            .set_input_topology(PrimitiveTopology::TriangleList)
            .set_viewport(Viewport::from_extent(extent))
            .set_scissor(Rect2D::from_extent(extent))
            .set_fill_mode(PolygonMode::Fill)
            .set_color_blend_enable(key.blended)
            .set_depth_test_enable(true);

        // Translucent objects test depth but do not write it
        let mut flags = PipelineFlags::CULL_BACK_FACES;
        if !key.blended {
            flags |= PipelineFlags::DEPTH_WRITE;
        }
        builder.build(self.swapchain.format(), Some(DEPTH_FORMAT), flags)
    }

    fn release_cache_refs(&mut self, program: ShaderProgramHandle, texture: Option<TextureHandle>) {
        self.shader_cache.release(program);
        if let Some(texture) = texture {
            self.texture_cache.release(texture);
        }
    }

    /// Detach the current objects, pipelines and descriptor pool
    fn take_scene(&mut self) -> RetiredScene {
        self.scene_len = 0;
        RetiredScene {
            objects: std::mem::take(&mut self.objects),
            pipelines: std::mem::take(&mut self.pipelines),
            descriptor_pool: self.descriptor_pool.take(),
        }
    }

    /// Drop retired objects, their descriptor pool and pipelines
    ///
    /// Caller guarantees the device is idle.
    fn release_scene(&mut self, retired: RetiredScene) {
        let released = retired.objects.len();
        for object in retired.objects {
            self.release_cache_refs(object.program, object.texture);
            // buffers freed here
        }
        if let Some(pool) = retired.descriptor_pool {
            self.context.device().destroy_descriptor_pool(pool);
        }
        drop(retired.pipelines);

        if released > 0 {
            engine_debug!("aurora::FrameOrchestrator", "Released {} render objects", released);
        }
    }

    /// After a device-idle wait, drop any signaled-but-unconsumed semaphore
    /// so the next frame starts from `Idle`
    fn reset_frame_sync(&mut self) -> Result<()> {
        let device = self.context.device();
        if matches!(self.state, FrameState::TransferSubmitted | FrameState::GraphicsRecording) {
            let fresh = device.create_semaphore()?;
            device.destroy_semaphore(self.transfer.semaphore);
            self.transfer.semaphore = fresh;
        }
        if self.graphics_done_pending {
            let fresh = device.create_semaphore()?;
            device.destroy_semaphore(self.graphics_done);
            self.graphics_done = fresh;
            self.graphics_done_pending = false;
        }
        self.state = FrameState::Idle;
        Ok(())
    }

    // ========================================================================
    // FRAME
    // ========================================================================

    /// Run one frame for `scene` (the slice given to `setup_scene`) as seen
    /// from `view`
    ///
    /// Timeouts and presentation failures are outcomes, not errors.
    pub fn draw_frame(&mut self, scene: &[SceneObject], view: Mat4) -> Result<FrameOutcome> {
        if scene.len() != self.scene_len {
            return Err(Error::InvalidResource(format!(
                "draw_frame got {} scene objects, setup_scene built {}",
                scene.len(),
                self.scene_len
            )));
        }

        // An error mid-frame leaves an intermediate state; resume where the
        // last submitted work left off
        self.state = match self.state {
            FrameState::TransferSubmitted | FrameState::GraphicsRecording => FrameState::TransferSubmitted,
            _ => FrameState::Idle,
        };

        if self.state == FrameState::Idle {
            if let Some(reason) = self.run_transfer(scene)? {
                return Ok(self.skip(reason));
            }
        }

        self.run_graphics(scene, view)
    }

    fn skip(&mut self, reason: SkipReason) -> FrameOutcome {
        self.stats.frames_dropped += 1;
        FrameOutcome::Skipped(reason)
    }

    fn families(&self) -> (u32, u32) {
        (self.context.transfer().family_index, self.context.graphics().family_index)
    }

    /// `Ok(Some(_))` when the frame must be skipped
    fn run_transfer(&mut self, scene: &[SceneObject]) -> Result<Option<SkipReason>> {
        self.state = FrameState::TransferRecording;
        let device = self.context.device();

        // ========== WAIT PREVIOUS TRANSFER ==========
        if device.wait_for_fence(self.transfer.fence, self.config.fence_timeout_ns)? == FenceStatus::Timeout {
            engine_warn!(
                "aurora::FrameOrchestrator",
                "Transfer fence not signaled within {} ns, skipping frame",
                self.config.fence_timeout_ns
            );
            self.state = FrameState::Idle;
            return Ok(Some(SkipReason::TransferFenceTimeout));
        }

        // ========== RECORD ==========
        device.reset_command_pool(self.transfer.command_pool)?;

        let (src_family, dst_family) = self.families();
        let mut commands = Vec::with_capacity(self.objects.len() * 6);
        for object in &mut self.objects {
            object.write_staging(scene[object.scene_index].mesh)?;
            let transfers = object.ownership_transfers(src_family, dst_family);
            commands.extend(object.transfer_commands(&transfers));
        }
        device.record_commands(self.transfer.command_buffer, &commands)?;

        // ========== SUBMIT ==========
        let mut waits = Vec::with_capacity(1);
        if self.graphics_done_pending {
            waits.push(SemaphoreWait { semaphore: self.graphics_done, stage: PipelineStage::TRANSFER });
        }
        device.reset_fence(self.transfer.fence)?;
        let submitted = device.queue_submit(
            self.context.transfer().queue,
            &SubmitInfo {
                waits: &waits,
                command_buffers: &[self.transfer.command_buffer],
                signals: &[self.transfer.semaphore],
                fence: Some(self.transfer.fence),
            },
        );
        if let Err(e) = submitted {
            // Reset fence with nothing queued to signal it
            match device.create_fence(true) {
                Ok(fresh) => {
                    device.destroy_fence(self.transfer.fence);
                    self.transfer.fence = fresh;
                }
                Err(err) => engine_error!("aurora::FrameOrchestrator", "Cannot replace transfer fence: {}", err),
            }
            engine_error!("aurora::FrameOrchestrator", "Transfer submission failed, frame dropped: {}", e);
            self.stats.frames_dropped += 1;
            return Err(e);
        }
        self.graphics_done_pending = false;
        self.state = FrameState::TransferSubmitted;
        Ok(None)
    }

    fn run_graphics(&mut self, scene: &[SceneObject], view: Mat4) -> Result<FrameOutcome> {
        self.state = FrameState::GraphicsRecording;
        let slot = self.slots[self.current_slot];
        let device = self.context.device();

        // ========== WAIT SLOT / ACQUIRE ==========
        if device.wait_for_fence(slot.fence, self.config.fence_timeout_ns)? == FenceStatus::Timeout {
            engine_warn!(
                "aurora::FrameOrchestrator",
                "Graphics fence (slot {}) not signaled within {} ns, skipping frame",
                self.current_slot,
                self.config.fence_timeout_ns
            );
            self.state = FrameState::TransferSubmitted;
            return Ok(self.skip(SkipReason::GraphicsFenceTimeout));
        }

        let image = match self.swapchain.acquire_next_image(self.config.acquire_timeout_ns, Some(slot.semaphore), None)? {
            AcquireOutcome::Acquired(image) | AcquireOutcome::Suboptimal(image) => image,
            AcquireOutcome::Timeout => {
                engine_warn!("aurora::FrameOrchestrator", "No swapchain image within {} ns, skipping frame", self.config.acquire_timeout_ns);
                self.state = FrameState::TransferSubmitted;
                return Ok(self.skip(SkipReason::AcquireTimeout));
            }
            AcquireOutcome::OutOfDate => {
                // No swapchain recreation yet
                engine_warn!("aurora::FrameOrchestrator", "Swapchain out of date, skipping frame");
                self.state = FrameState::TransferSubmitted;
                return Ok(self.skip(SkipReason::SwapchainOutOfDate));
            }
        };

        // ========== RECORD / SUBMIT ==========
        let render_complete = self.render_complete[image.index as usize];
        if let Err(e) = self.submit_graphics(slot, scene, view, image, render_complete) {
            engine_error!(
                "aurora::FrameOrchestrator",
                "Graphics submission on slot {} failed, frame dropped: {}",
                self.current_slot,
                e
            );
            self.recover_graphics_slot();
            self.stats.frames_dropped += 1;
            // Stays in GraphicsRecording: the next call retries the graphics half
            return Err(e);
        }
        self.graphics_done_pending = true;
        self.state = FrameState::GraphicsSubmitted;
        self.current_slot = (self.current_slot + 1) % FRAMES_IN_FLIGHT;

        // ========== PRESENT ==========
        self.state = FrameState::Presenting;
        let presented = self.swapchain.present(self.context.graphics().queue, image, &[render_complete]);
        self.state = FrameState::Idle;

        match presented {
            Ok(PresentOutcome::Presented) | Ok(PresentOutcome::Suboptimal) => {
                self.stats.frames_presented += 1;
                Ok(FrameOutcome::Presented { image_index: image.index })
            }
            Ok(PresentOutcome::OutOfDate) => {
                engine_warn!("aurora::FrameOrchestrator", "Present of image {} out of date, frame dropped", image.index);
                Ok(self.skip(SkipReason::PresentFailed))
            }
            Err(e) => {
                engine_error!("aurora::FrameOrchestrator", "Present of image {} failed: {}", image.index, e);
                Ok(self.skip(SkipReason::PresentFailed))
            }
        }
    }

    fn submit_graphics(
        &self,
        slot: SubmitSlot,
        scene: &[SceneObject],
        view: Mat4,
        image: SwapchainImage,
        render_complete: SemaphoreHandle,
    ) -> Result<()> {
        let device = self.context.device();
        device.reset_command_pool(slot.command_pool)?;
        let commands = self.graphics_commands(scene, view, image);
        device.record_commands(slot.command_buffer, &commands)?;

        // Unsignal only once recording succeeded
        device.reset_fence(slot.fence)?;
        device.queue_submit(
            self.context.graphics().queue,
            &SubmitInfo {
                waits: &[
                    SemaphoreWait { semaphore: slot.semaphore, stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT },
                    SemaphoreWait { semaphore: self.transfer.semaphore, stage: PipelineStage::VERTEX_INPUT },
                ],
                command_buffers: &[slot.command_buffer],
                signals: &[render_complete, self.graphics_done],
                fence: Some(slot.fence),
            },
        )
    }

    /// Replace the current slot's image-acquired semaphore (signaled with no
    /// waiter) and its fence (possibly reset with no submit to signal it)
    fn recover_graphics_slot(&mut self) {
        let device = self.context.device();
        let slot = &mut self.slots[self.current_slot];

        match device.create_semaphore() {
            Ok(fresh) => {
                device.destroy_semaphore(slot.semaphore);
                slot.semaphore = fresh;
            }
            Err(e) => engine_error!("aurora::FrameOrchestrator", "Cannot replace image-acquired semaphore: {}", e),
        }
        match device.create_fence(true) {
            Ok(fresh) => {
                device.destroy_fence(slot.fence);
                slot.fence = fresh;
            }
            Err(e) => engine_error!("aurora::FrameOrchestrator", "Cannot replace slot fence: {}", e),
        }
    }

    fn graphics_commands(&self, scene: &[SceneObject], view: Mat4, image: SwapchainImage) -> Vec<Command> {
        let (src_family, dst_family) = self.families();
        let mut commands = Vec::with_capacity(self.objects.len() * 9 + 5);

        // Acquire halves of the transfer queue's releases
        for object in &self.objects {
            let transfers = object.ownership_transfers(src_family, dst_family);
            commands.extend(transfers.iter().map(|t| Command::BufferBarrier(t.acquire())));
        }

        let depth_stages = PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS;
        commands.push(Command::ImageBarrier(ImageBarrier::transition(
            image.image,
            ImageAspect::COLOR,
            ImageLayout::Undefined,
            ImageLayout::ColorAttachment,
            (PipelineStage::COLOR_ATTACHMENT_OUTPUT, AccessFlags::empty()),
            (PipelineStage::COLOR_ATTACHMENT_OUTPUT, AccessFlags::COLOR_ATTACHMENT_WRITE),
        )));
        commands.push(Command::ImageBarrier(ImageBarrier::transition(
            self.depth_image.handle(),
            ImageAspect::DEPTH,
            ImageLayout::Undefined,
            ImageLayout::DepthAttachment,
            (depth_stages, AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
            (depth_stages, AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        )));

        commands.push(Command::BeginRendering {
            color_view: image.view,
            depth_view: Some(self.depth_image.view()),
            extent: self.swapchain.extent(),
            clear_color: self.config.clear_color,
            clear_depth: 1.0,
        });
        for object in &self.objects {
            let mvp = view * *scene[object.scene_index].transform;
            commands.extend(object.draw_commands(&self.pipelines[object.pipeline_index], &mvp));
        }
        commands.push(Command::EndRendering);

        commands.push(Command::ImageBarrier(ImageBarrier::transition(
            image.image,
            ImageAspect::COLOR,
            ImageLayout::ColorAttachment,
            ImageLayout::PresentSrc,
            (PipelineStage::COLOR_ATTACHMENT_OUTPUT, AccessFlags::COLOR_ATTACHMENT_WRITE),
            (PipelineStage::BOTTOM_OF_PIPE, AccessFlags::empty()),
        )));
        commands
    }
}

fn create_submit_slot(context: &DeviceContext, family_index: u32) -> Result<SubmitSlot> {
    let device = context.device();
    let command_pool = device.create_command_pool(family_index)?;
    let command_buffer = device.allocate_command_buffer(command_pool)?;
    // Signaled so the first wait returns immediately
    let fence = device.create_fence(true)?;
    let semaphore = device.create_semaphore()?;
    Ok(SubmitSlot { command_pool, command_buffer, fence, semaphore })
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        if let Err(e) = self.context.device().wait_idle() {
            engine_error!("aurora::FrameOrchestrator", "wait_idle failed during shutdown: {}", e);
        }
        let retired = self.take_scene();
        self.release_scene(retired);

        let device = self.context.device();
        device.destroy_sampler(self.sampler);
        device.destroy_semaphore(self.graphics_done);
        for semaphore in self.render_complete.drain(..) {
            device.destroy_semaphore(semaphore);
        }
        for slot in self.slots.iter().chain(std::iter::once(&self.transfer)) {
            device.destroy_semaphore(slot.semaphore);
            device.destroy_fence(slot.fence);
            device.destroy_command_pool(slot.command_pool);
        }

        engine_info!(
            "aurora::FrameOrchestrator",
            "Shutdown: {} frames presented, {} dropped, {} buffers / {} images still live",
            self.stats.frames_presented,
            self.stats.frames_dropped,
            self.allocator.live_buffers(),
            // depth image and cached textures drop after this
            self.allocator.live_images()
        );
    }
}

#[cfg(test)]
#[path = "frame_orchestrator_tests.rs"]
mod tests;
