/// Window surface and swapchain entry points
///
/// Owns the surface for the device lifetime. Swapchain policy (image count,
/// format choice, extent clamping) lives in the engine's `Swapchain`; this
/// module only queries the surface and forwards the chosen parameters.

use aurora_engine::aurora::device::{
    AcquireResult, Extent2D, PresentResult, SurfaceCapabilities, SurfaceFormat, SwapchainDesc,
};
use aurora_engine::aurora::{Error, Result};
use aurora_engine::{engine_debug, engine_err, engine_error, engine_warn};
use ash::vk;

use crate::vulkan_format::*;

pub struct VulkanPresentation {
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
}

impl VulkanPresentation {
    pub fn new(
        surface_loader: ash::khr::surface::Instance,
        swapchain_loader: ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        Self { surface_loader, swapchain_loader, surface, physical_device }
    }

    pub fn capabilities(&self) -> Result<SurfaceCapabilities> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to get surface capabilities: {:?}", e))?;

            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(self.physical_device, self.surface)
                .map_err(|e| engine_err!("aurora::vulkan", "Failed to get surface formats: {:?}", e))?;

            Ok(SurfaceCapabilities {
                min_image_count: caps.min_image_count,
                max_image_count: caps.max_image_count,
                current_extent: vk_to_current_extent(caps.current_extent),
                min_extent: Extent2D::new(caps.min_image_extent.width, caps.min_image_extent.height),
                max_extent: Extent2D::new(caps.max_image_extent.width, caps.max_image_extent.height),
                formats: surface_formats_from_vk(&formats),
            })
        }
    }

    pub fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(desc.image_count)
                .image_format(texture_format_to_vk(desc.format))
                .image_color_space(color_space_to_vk(desc.color_space))
                .image_extent(extent_to_vk(desc.extent))
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode_to_vk(desc.present_mode))
                .clipped(true);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!("aurora::vulkan", "Failed to create swapchain: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
                })?;

            let images = match self.swapchain_loader.get_swapchain_images(swapchain) {
                Ok(images) => images,
                Err(e) => {
                    self.swapchain_loader.destroy_swapchain(swapchain, None);
                    engine_error!("aurora::vulkan", "Failed to get swapchain images: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e)));
                }
            };

            if images.len() as u32 != desc.image_count {
                engine_warn!(
                    "aurora::vulkan",
                    "Driver created {} swapchain images ({} requested)",
                    images.len(),
                    desc.image_count
                );
            }
            engine_debug!(
                "aurora::vulkan",
                "Swapchain created: {}x{}, {} images",
                desc.extent.width,
                desc.extent.height,
                images.len()
            );

            Ok((swapchain, images))
        }
    }

    pub fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe {
            self.swapchain_loader.destroy_swapchain(swapchain, None);
        }
    }

    pub fn acquire(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<AcquireResult> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(swapchain, timeout_ns, semaphore, fence)
        };
        acquire_result_from_vk(result)
    }

    pub fn present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentResult> {
        let swapchains = [swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);
        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        present_result_from_vk(result)
    }

    /// Destroy the surface (call after every swapchain is gone)
    pub fn destroy_surface(&self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Formats the engine has no name for are dropped
pub fn surface_formats_from_vk(formats: &[vk::SurfaceFormatKHR]) -> Vec<SurfaceFormat> {
    formats
        .iter()
        .filter_map(|f| {
            vk_to_texture_format(f.format).map(|format| SurfaceFormat {
                format,
                color_space: vk_to_color_space(f.color_space),
            })
        })
        .collect()
}

/// Timeouts and out-of-date are outcomes, not errors
pub fn acquire_result_from_vk(result: std::result::Result<(u32, bool), vk::Result>) -> Result<AcquireResult> {
    match result {
        Ok((index, false)) => Ok(AcquireResult::Success(index)),
        Ok((index, true)) => Ok(AcquireResult::Suboptimal(index)),
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireResult::Timeout),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
        Err(e) => Err(engine_err!("aurora::vulkan", "Failed to acquire swapchain image: {:?}", e)),
    }
}

pub fn present_result_from_vk(result: std::result::Result<bool, vk::Result>) -> Result<PresentResult> {
    match result {
        Ok(false) => Ok(PresentResult::Success),
        Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentResult::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
        Err(e) => Err(engine_err!("aurora::vulkan", "Failed to present swapchain image: {:?}", e)),
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
