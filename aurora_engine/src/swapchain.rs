/// Swapchain - presentable images for the window surface
///
/// Created once at startup with an exact image count; there is no resize
/// path yet, so an out-of-date surface is reported to the caller and the
/// frame is dropped.

use std::sync::Arc;

use crate::device_context::DeviceContext;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireResult, ColorSpace, Extent2D, FenceHandle, ImageAspect, ImageHandle, ImageViewHandle,
    PresentMode, PresentResult, QueueHandle, SemaphoreHandle, SwapchainDesc, SwapchainHandle,
    TextureFormat,
};
use crate::{engine_debug, engine_error, engine_info};

/// Color format every swapchain image uses
pub const SWAPCHAIN_FORMAT: TextureFormat = TextureFormat::B8G8R8A8_SRGB;

// ===== SURFACE EXTENT =====

/// Anything that knows the drawable size of the presentation surface
pub trait SurfaceExtentSource {
    fn drawable_extent(&self) -> Extent2D;
}

impl SurfaceExtentSource for winit::window::Window {
    fn drawable_extent(&self) -> Extent2D {
        let size = self.inner_size();
        Extent2D::new(size.width, size.height)
    }
}

impl SurfaceExtentSource for Extent2D {
    fn drawable_extent(&self) -> Extent2D {
        *self
    }
}

// ===== RESULTS =====

/// A presentable image; borrowed from the swapchain, never destroyed by the holder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    pub view: ImageViewHandle,
    pub image: ImageHandle,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(SwapchainImage),
    /// Usable, but the surface no longer matches exactly
    Suboptimal(SwapchainImage),
    Timeout,
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

// ===== SWAPCHAIN =====

pub struct Swapchain {
    context: Arc<DeviceContext>,
    handle: SwapchainHandle,
    images: Vec<ImageHandle>,
    views: Vec<ImageViewHandle>,
    format: TextureFormat,
    extent: Extent2D,
}

impl Swapchain {
    /// Create a FIFO swapchain with exactly `desired_image_count` images
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if the count is outside what the surface
    /// supports, or if the surface does not offer `B8G8R8A8_SRGB` with the
    /// sRGB non-linear color space.
    pub fn create(
        context: Arc<DeviceContext>,
        surface: &dyn SurfaceExtentSource,
        desired_image_count: u32,
    ) -> Result<Self> {
        let device = context.device();
        let caps = device.surface_capabilities()?;

        // ========== IMAGE COUNT ==========
        let above_max = caps.max_image_count != 0 && desired_image_count > caps.max_image_count;
        if desired_image_count < caps.min_image_count || above_max {
            let message = format!(
                "Swapchain image count {} outside supported range [{}, {}]",
                desired_image_count,
                caps.min_image_count,
                if caps.max_image_count == 0 { "unbounded".to_string() } else { caps.max_image_count.to_string() }
            );
            engine_error!("aurora::Swapchain", "{}", message);
            return Err(Error::InitializationFailed(message));
        }

        // ========== FORMAT ==========
        let supported = caps
            .formats
            .iter()
            .any(|f| f.format == SWAPCHAIN_FORMAT && f.color_space == ColorSpace::SrgbNonlinear);
        if !supported {
            let message = format!(
                "Surface does not offer {:?} with sRGB non-linear color space ({} formats offered)",
                SWAPCHAIN_FORMAT,
                caps.formats.len()
            );
            engine_error!("aurora::Swapchain", "{}", message);
            return Err(Error::InitializationFailed(message));
        }

        // ========== EXTENT ==========
        let extent = caps
            .current_extent
            .unwrap_or_else(|| surface.drawable_extent().clamp(caps.min_extent, caps.max_extent));

        let desc = SwapchainDesc {
            image_count: desired_image_count,
            format: SWAPCHAIN_FORMAT,
            color_space: ColorSpace::SrgbNonlinear,
            extent,
            present_mode: PresentMode::Fifo,
        };
        let (handle, images) = device.create_swapchain(&desc).map_err(|e| {
            engine_error!("aurora::Swapchain", "Failed to create swapchain: {}", e);
            e
        })?;

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            match device.create_image_view(image, SWAPCHAIN_FORMAT, ImageAspect::COLOR) {
                Ok(view) => views.push(view),
                Err(e) => {
                    engine_error!("aurora::Swapchain", "Failed to create swapchain image view: {}", e);
                    for view in views {
                        device.destroy_image_view(view);
                    }
                    device.destroy_swapchain(handle);
                    return Err(e);
                }
            }
        }

        engine_info!(
            "aurora::Swapchain",
            "Swapchain created ({} images, {}x{}, FIFO)",
            images.len(), extent.width, extent.height
        );

        Ok(Self { context, handle, images, views, format: SWAPCHAIN_FORMAT, extent })
    }

    /// Ask for the next presentable image
    ///
    /// A timeout or an out-of-date surface is an outcome, not an error.
    pub fn acquire_next_image(
        &self,
        timeout_ns: u64,
        signal_semaphore: Option<SemaphoreHandle>,
        signal_fence: Option<FenceHandle>,
    ) -> Result<AcquireOutcome> {
        let result = self
            .context
            .device()
            .acquire_next_image(self.handle, timeout_ns, signal_semaphore, signal_fence)?;

        Ok(match result {
            AcquireResult::Success(index) => AcquireOutcome::Acquired(self.image(index)?),
            AcquireResult::Suboptimal(index) => {
                engine_debug!("aurora::Swapchain", "Acquired image {} is suboptimal", index);
                AcquireOutcome::Suboptimal(self.image(index)?)
            }
            AcquireResult::Timeout => AcquireOutcome::Timeout,
            AcquireResult::OutOfDate => AcquireOutcome::OutOfDate,
        })
    }

    /// Queue `image` for presentation once `wait_semaphores` are signaled
    pub fn present(
        &self,
        queue: QueueHandle,
        image: SwapchainImage,
        wait_semaphores: &[SemaphoreHandle],
    ) -> Result<PresentOutcome> {
        let result = self
            .context
            .device()
            .queue_present(queue, self.handle, image.index, wait_semaphores)?;

        Ok(match result {
            PresentResult::Success => PresentOutcome::Presented,
            PresentResult::Suboptimal => PresentOutcome::Suboptimal,
            PresentResult::OutOfDate => PresentOutcome::OutOfDate,
        })
    }

    fn image(&self, index: u32) -> Result<SwapchainImage> {
        let i = index as usize;
        match (self.images.get(i), self.views.get(i)) {
            (Some(&image), Some(&view)) => Ok(SwapchainImage { view, image, index }),
            _ => Err(Error::InvalidResource(format!(
                "swapchain image index {} out of range ({} images)",
                index,
                self.images.len()
            ))),
        }
    }

    pub fn handle(&self) -> SwapchainHandle {
        self.handle
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("image_count", &self.images.len())
            .finish()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = self.context.device();
        for view in self.views.drain(..) {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.handle);
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
