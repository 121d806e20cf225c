/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the instance, the logical device, the window surface and the memory
/// allocator. Engine handles are the raw Vulkan handle values; allocations
/// are kept in a registry keyed by [`AllocationId`].

use aurora_engine::aurora::device::*;
use aurora_engine::aurora::{Error, Result};
use aurora_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationError, MemoryLocation};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::vulkan_format::*;
use crate::vulkan_swapchain::VulkanPresentation;

const SOURCE: &str = "aurora::vulkan";
const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queue families chosen for a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub transfer: u32,
}

/// Pick a graphics family that can present, and a transfer family
///
/// With `prefer_dedicated_transfer` a family exposing TRANSFER without
/// GRAPHICS is used (transfer-only first, then compute+transfer); otherwise,
/// or when none exists, uploads share the graphics family.
pub(crate) fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
    prefer_dedicated_transfer: bool,
) -> Option<QueueFamilies> {
    let graphics = families
        .iter()
        .enumerate()
        .find(|(i, family)| {
            family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && supports_present(*i as u32)
        })
        .map(|(i, _)| i as u32)?;

    let transfer_without = |excluded: vk::QueueFlags| {
        families
            .iter()
            .position(|family| {
                family.queue_count > 0
                    && family.queue_flags.contains(vk::QueueFlags::TRANSFER)
                    && !family.queue_flags.intersects(excluded)
            })
            .map(|i| i as u32)
    };

    let dedicated = if prefer_dedicated_transfer {
        transfer_without(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            .or_else(|| transfer_without(vk::QueueFlags::GRAPHICS))
    } else {
        None
    };

    Some(QueueFamilies { graphics, transfer: dedicated.unwrap_or(graphics) })
}

/// Host-visible requests map to upload memory, everything else to device-local
pub(crate) fn memory_location(memory: MemoryProperty) -> MemoryLocation {
    if memory.contains(MemoryProperty::HOST_VISIBLE) {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

pub(crate) fn allocation_error(error: &AllocationError) -> Error {
    match error {
        AllocationError::OutOfMemory | AllocationError::NoCompatibleMemoryTypeFound => Error::OutOfMemory,
        other => Error::BackendError(format!("Allocation failed: {}", other)),
    }
}

fn semaphore_wait_stage(stage: PipelineStage) -> vk::PipelineStageFlags {
    let mask = pipeline_stages_to_vk(stage);
    if mask.is_empty() { vk::PipelineStageFlags::ALL_COMMANDS } else { mask }
}

/// Vulkan device implementing [`GraphicsDevice`]
pub struct VulkanGraphicsDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    device_name: String,

    graphics_queue: QueueInfo,
    transfer_queue: QueueInfo,
    /// Serializes submit, present and idle waits (queues may be shared)
    queue_lock: Mutex<()>,

    presentation: VulkanPresentation,

    allocator: ManuallyDrop<Mutex<Allocator>>,
    allocations: Mutex<FxHashMap<AllocationId, Allocation>>,
    next_allocation: AtomicU64,

    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanGraphicsDevice {
    /// Create a Vulkan 1.3 device able to present to `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: Config) -> Result<Self> {
        unsafe {
            // ========== INSTANCE ==========
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = std::ffi::CString::new(config.app_name.clone()).unwrap_or_default();
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Aurora")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!(SOURCE, "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to get required extensions: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {:?}", e))
                })?
                .to_vec();

            let validation = (config.enable_validation || cfg!(feature = "vulkan-validation"))
                && Self::validation_layer_available(&entry);

            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { vec![] };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            // ========== DEBUG MESSENGER ==========
            let debug_messenger = if validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                crate::debug::init_debug_config(crate::debug::DebugConfig::from(&config));

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(crate::debug::severity_flags(config.debug_severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                let messenger = debug_utils
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| {
                        engine_error!(SOURCE, "Failed to create debug messenger: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                    })?;
                Some((debug_utils, messenger))
            } else {
                None
            };

            // ========== SURFACE ==========
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!(SOURCE, "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // ========== PHYSICAL DEVICE ==========
            let (physical_device, families) = Self::pick_physical_device(
                &instance,
                &surface_loader,
                surface,
                config.prefer_dedicated_transfer_queue,
            )?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown GPU".to_string());

            // ========== LOGICAL DEVICE ==========
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(families.graphics)
                .queue_priorities(&queue_priorities)];
            if families.transfer != families.graphics {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(families.transfer)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut vulkan13_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = QueueInfo {
                family_index: families.graphics,
                queue: QueueHandle(device.get_device_queue(families.graphics, 0).as_raw()),
            };
            let transfer_queue = QueueInfo {
                family_index: families.transfer,
                queue: QueueHandle(device.get_device_queue(families.transfer, 0).as_raw()),
            };

            // ========== ALLOCATOR ==========
            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
            let presentation = VulkanPresentation::new(surface_loader, swapchain_loader, surface, physical_device);

            engine_info!(
                SOURCE,
                "Vulkan device '{}' ready (graphics family {}, transfer family {}, validation {})",
                device_name,
                families.graphics,
                families.transfer,
                if validation { "on" } else { "off" }
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                device_name,
                graphics_queue,
                transfer_queue,
                queue_lock: Mutex::new(()),
                presentation,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                allocations: Mutex::new(FxHashMap::default()),
                next_allocation: AtomicU64::new(1),
                debug_messenger,
            })
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Allocations currently held by engine objects
    pub fn live_allocation_count(&self) -> usize {
        lock(&self.allocations).len()
    }

    fn validation_layer_available(entry: &ash::Entry) -> bool {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().map(|name| name == VALIDATION_LAYER).unwrap_or(false));
        if !available {
            engine_warn!(SOURCE, "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        available
    }

    /// First suitable device, discrete GPUs preferred
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        prefer_dedicated_transfer: bool,
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
            engine_error!(SOURCE, "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

        let mut candidates: Vec<(vk::PhysicalDevice, QueueFamilies, bool)> = physical_devices
            .into_iter()
            .filter_map(|physical_device| {
                let properties = instance.get_physical_device_properties(physical_device);
                if properties.api_version < vk::API_VERSION_1_3 {
                    return None;
                }
                let family_properties = instance.get_physical_device_queue_family_properties(physical_device);
                let families = select_queue_families(
                    &family_properties,
                    |family| {
                        surface_loader
                            .get_physical_device_surface_support(physical_device, family, surface)
                            .unwrap_or(false)
                    },
                    prefer_dedicated_transfer,
                )?;
                let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
                Some((physical_device, families, discrete))
            })
            .collect();

        candidates.sort_by_key(|(_, _, discrete)| !*discrete);
        candidates
            .into_iter()
            .next()
            .map(|(physical_device, families, _)| (physical_device, families))
            .ok_or_else(|| {
                engine_error!(SOURCE, "No Vulkan 1.3 GPU with graphics and present support found");
                Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
            })
    }

    fn register_allocation(&self, allocation: Allocation) -> AllocationId {
        let id = AllocationId(self.next_allocation.fetch_add(1, Ordering::Relaxed));
        lock(&self.allocations).insert(id, allocation);
        id
    }

    fn free_allocation(&self, allocation: Allocation) {
        if let Err(e) = lock(&*self.allocator).free(allocation) {
            engine_error!(SOURCE, "Failed to free allocation: {:?}", e);
        }
    }

    fn release_allocation(&self, id: AllocationId) {
        match lock(&self.allocations).remove(&id) {
            Some(allocation) => self.free_allocation(allocation),
            None => engine_warn!(SOURCE, "Release of unknown allocation {}", id.0),
        }
    }

    unsafe fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        lock(&*self.allocator)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(SOURCE, "Allocation '{}' failed ({:.2} MB): {}", name, size_mb, e);
                allocation_error(&e)
            })
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== QUEUES =====

    fn graphics_queue(&self) -> QueueInfo {
        self.graphics_queue
    }

    fn transfer_queue(&self) -> QueueInfo {
        self.transfer_queue
    }

    // ===== MEMORY =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferAllocation> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create buffer '{}': {:?}", desc.name, e))?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let location = memory_location(desc.memory);
            let allocation = match self.allocate(&desc.name, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.free_allocation(allocation);
                self.device.destroy_buffer(buffer, None);
                return Err(engine_err!(SOURCE, "Failed to bind buffer memory '{}': {:?}", desc.name, e));
            }

            let mapped = match location {
                MemoryLocation::GpuOnly => None,
                _ => match allocation.mapped_ptr() {
                    Some(ptr) => Some(MappedPtr::new(ptr.cast::<u8>())),
                    None => {
                        self.free_allocation(allocation);
                        self.device.destroy_buffer(buffer, None);
                        return Err(engine_err!(SOURCE, "Host-visible buffer '{}' is not mapped", desc.name));
                    }
                },
            };

            let allocation = self.register_allocation(allocation);
            engine_debug!(SOURCE, "Buffer '{}' created ({} bytes, {:?})", desc.name, desc.size, location);

            Ok(BufferAllocation {
                buffer: BufferHandle(buffer.as_raw()),
                allocation,
                mapped,
            })
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle, allocation: AllocationId) {
        unsafe {
            self.device.destroy_buffer(vk::Buffer::from_raw(buffer.0), None);
        }
        self.release_allocation(allocation);
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageAllocation> {
        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(texture_format_to_vk(desc.format))
                .extent(vk::Extent3D { width: desc.extent.width, height: desc.extent.height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self
                .device
                .create_image(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create image: {:?}", e))?;

            let requirements = self.device.get_image_memory_requirements(image);
            let allocation = match self.allocate("image", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                self.free_allocation(allocation);
                self.device.destroy_image(image, None);
                return Err(engine_err!(SOURCE, "Failed to bind image memory: {:?}", e));
            }

            Ok(ImageAllocation {
                image: ImageHandle(image.as_raw()),
                allocation: self.register_allocation(allocation),
            })
        }
    }

    fn destroy_image(&self, image: ImageHandle, allocation: AllocationId) {
        unsafe {
            self.device.destroy_image(vk::Image::from_raw(image.0), None);
        }
        self.release_allocation(allocation);
    }

    fn create_image_view(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        aspect: ImageAspect,
    ) -> Result<ImageViewHandle> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk::Image::from_raw(image.0))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(texture_format_to_vk(format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: image_aspect_to_vk(aspect),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.device.create_image_view(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create image view: {:?}", e))?;
        Ok(ImageViewHandle(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe { self.device.destroy_image_view(vk::ImageView::from_raw(view.0), None) }
    }

    // ===== SHADERS & PIPELINES =====

    fn create_shader_module(&self, spirv: &[u32]) -> Result<ShaderModuleHandle> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(spirv);
        let module = unsafe { self.device.create_shader_module(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create shader module: {:?}", e))?;
        Ok(ShaderModuleHandle(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe { self.device.destroy_shader_module(vk::ShaderModule::from_raw(module.0), None) }
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(shader_stages_to_vk(binding.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor set layout: {:?}", e))?;
        Ok(DescriptorSetLayoutHandle(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe {
            self.device
                .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(layout.0), None)
        }
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<(PipelineHandle, PipelineLayoutHandle)> {
        let (pipeline, layout) = unsafe { crate::vulkan_pipeline::create_graphics_pipeline(&self.device, desc)? };
        Ok((PipelineHandle(pipeline.as_raw()), PipelineLayoutHandle(layout.as_raw())))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle, layout: PipelineLayoutHandle) {
        unsafe {
            self.device.destroy_pipeline(vk::Pipeline::from_raw(pipeline.0), None);
            self.device
                .destroy_pipeline_layout(vk::PipelineLayout::from_raw(layout.0), None);
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .filter(|size| size.count > 0)
            .map(|size| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(size.descriptor_type),
                descriptor_count: size.count,
            })
            .collect();

        if pool_sizes.is_empty() || max_sets == 0 {
            return Err(Error::InvalidResource("Descriptor pool with no capacity".to_string()));
        }

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { self.device.create_descriptor_pool(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))?;
        Ok(DescriptorPoolHandle(pool.as_raw()))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe {
            self.device
                .destroy_descriptor_pool(vk::DescriptorPool::from_raw(pool.0), None)
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let layouts = [vk::DescriptorSetLayout::from_raw(layout.0)];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk::DescriptorPool::from_raw(pool.0))
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(|e| engine_err!(SOURCE, "Failed to allocate descriptor set: {:?}", e))?;
        sets.first()
            .map(|set| DescriptorSetHandle(set.as_raw()))
            .ok_or_else(|| engine_err!(SOURCE, "Driver returned no descriptor set"))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) {
        enum Info {
            Buffer([vk::DescriptorBufferInfo; 1]),
            Image(vk::DescriptorType, [vk::DescriptorImageInfo; 1]),
        }

        let infos: Vec<Info> = writes
            .iter()
            .map(|write| match write.resource {
                DescriptorResource::UniformBuffer { buffer, offset, range } => Info::Buffer([vk::DescriptorBufferInfo {
                    buffer: vk::Buffer::from_raw(buffer.0),
                    offset,
                    range,
                }]),
                DescriptorResource::SampledImage { view } => Info::Image(
                    vk::DescriptorType::SAMPLED_IMAGE,
                    [vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: vk::ImageView::from_raw(view.0),
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    }],
                ),
                DescriptorResource::Sampler { sampler } => Info::Image(
                    vk::DescriptorType::SAMPLER,
                    [vk::DescriptorImageInfo {
                        sampler: vk::Sampler::from_raw(sampler.0),
                        image_view: vk::ImageView::null(),
                        image_layout: vk::ImageLayout::UNDEFINED,
                    }],
                ),
            })
            .collect();

        let dst_set = vk::DescriptorSet::from_raw(set.0);
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&infos)
            .map(|(write, info)| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(dst_set)
                    .dst_binding(write.binding)
                    .dst_array_element(0);
                match info {
                    Info::Buffer(buffer_info) => base
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(buffer_info),
                    Info::Image(ty, image_info) => base.descriptor_type(*ty).image_info(image_info),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) }
    }

    fn create_sampler(&self) -> Result<SamplerHandle> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.device.create_sampler(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create sampler: {:?}", e))?;
        Ok(SamplerHandle(sampler.as_raw()))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe { self.device.destroy_sampler(vk::Sampler::from_raw(sampler.0), None) }
    }

    // ===== COMMANDS =====

    fn create_command_pool(&self, queue_family: u32) -> Result<CommandPoolHandle> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { self.device.create_command_pool(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create command pool: {:?}", e))?;
        Ok(CommandPoolHandle(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe { self.device.destroy_command_pool(vk::CommandPool::from_raw(pool.0), None) }
    }

    fn reset_command_pool(&self, pool: CommandPoolHandle) -> Result<()> {
        unsafe {
            self.device
                .reset_command_pool(vk::CommandPool::from_raw(pool.0), vk::CommandPoolResetFlags::empty())
        }
        .map_err(|e| engine_err!(SOURCE, "Failed to reset command pool: {:?}", e))
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk::CommandPool::from_raw(pool.0))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| engine_err!(SOURCE, "Failed to allocate command buffer: {:?}", e))?;
        buffers
            .first()
            .map(|cb| CommandBufferHandle(cb.as_raw()))
            .ok_or_else(|| engine_err!(SOURCE, "Driver returned no command buffer"))
    }

    fn record_commands(&self, command_buffer: CommandBufferHandle, commands: &[Command]) -> Result<()> {
        unsafe {
            crate::vulkan_command::record(&self.device, vk::CommandBuffer::from_raw(command_buffer.0), commands)
        }
    }

    fn queue_submit(&self, queue: QueueHandle, submit: &SubmitInfo) -> Result<()> {
        let wait_semaphores: Vec<vk::Semaphore> = submit
            .waits
            .iter()
            .map(|wait| vk::Semaphore::from_raw(wait.semaphore.0))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = submit
            .waits
            .iter()
            .map(|wait| semaphore_wait_stage(wait.stage))
            .collect();
        let command_buffers: Vec<vk::CommandBuffer> = submit
            .command_buffers
            .iter()
            .map(|cb| vk::CommandBuffer::from_raw(cb.0))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = submit
            .signals
            .iter()
            .map(|semaphore| vk::Semaphore::from_raw(semaphore.0))
            .collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        let fence = submit
            .fence
            .map(|fence| vk::Fence::from_raw(fence.0))
            .unwrap_or_else(vk::Fence::null);

        let _queue = lock(&self.queue_lock);
        unsafe {
            self.device
                .queue_submit(vk::Queue::from_raw(queue.0), std::slice::from_ref(&submit_info), fence)
        }
        .map_err(|e| engine_err!(SOURCE, "Queue submit failed: {:?}", e))
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create fence: {:?}", e))?;
        Ok(FenceHandle(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device.destroy_fence(vk::Fence::from_raw(fence.0), None) }
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<FenceStatus> {
        let fences = [vk::Fence::from_raw(fence.0)];
        match unsafe { self.device.wait_for_fences(&fences, true, timeout_ns) } {
            Ok(()) => Ok(FenceStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceStatus::Timeout),
            Err(e) => Err(engine_err!(SOURCE, "Fence wait failed: {:?}", e)),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.device.reset_fences(&[vk::Fence::from_raw(fence.0)]) }
            .map_err(|e| engine_err!(SOURCE, "Failed to reset fence: {:?}", e))
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create semaphore: {:?}", e))?;
        Ok(SemaphoreHandle(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device.destroy_semaphore(vk::Semaphore::from_raw(semaphore.0), None) }
    }

    // ===== PRESENTATION =====

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        self.presentation.capabilities()
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(SwapchainHandle, Vec<ImageHandle>)> {
        let (swapchain, images) = self.presentation.create_swapchain(desc)?;
        Ok((
            SwapchainHandle(swapchain.as_raw()),
            images.iter().map(|image| ImageHandle(image.as_raw())).collect(),
        ))
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        self.presentation.destroy_swapchain(vk::SwapchainKHR::from_raw(swapchain.0));
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        timeout_ns: u64,
        signal_semaphore: Option<SemaphoreHandle>,
        signal_fence: Option<FenceHandle>,
    ) -> Result<AcquireResult> {
        self.presentation.acquire(
            vk::SwapchainKHR::from_raw(swapchain.0),
            timeout_ns,
            signal_semaphore.map(|s| vk::Semaphore::from_raw(s.0)).unwrap_or_else(vk::Semaphore::null),
            signal_fence.map(|f| vk::Fence::from_raw(f.0)).unwrap_or_else(vk::Fence::null),
        )
    }

    fn queue_present(
        &self,
        queue: QueueHandle,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentResult> {
        let waits: Vec<vk::Semaphore> = wait_semaphores
            .iter()
            .map(|semaphore| vk::Semaphore::from_raw(semaphore.0))
            .collect();
        let _queue = lock(&self.queue_lock);
        self.presentation.present(
            vk::Queue::from_raw(queue.0),
            vk::SwapchainKHR::from_raw(swapchain.0),
            image_index,
            &waits,
        )
    }

    fn wait_idle(&self) -> Result<()> {
        let _queue = lock(&self.queue_lock);
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| engine_err!(SOURCE, "Device wait idle failed: {:?}", e))
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Free allocations engine objects failed to release
            let leaked: Vec<Allocation> = self
                .allocations
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .drain()
                .map(|(_, allocation)| allocation)
                .collect();
            if !leaked.is_empty() {
                engine_warn!(SOURCE, "{} allocation(s) still alive at device drop", leaked.len());
            }
            for allocation in leaked {
                self.free_allocation(allocation);
            }

            // 2. Drop the allocator while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Surface
            self.presentation.destroy_surface();

            // 4. Stop routing validation messages, then destroy the messenger
            crate::debug::cleanup_debug_config();
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 5. Device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
