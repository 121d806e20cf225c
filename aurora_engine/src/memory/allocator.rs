/// GpuAllocator - typed device memory for buffers and images
///
/// The allocator is a cheap handle onto shared state. Every [`Buffer`] and
/// [`Image`] keeps a clone, so the allocator and its device stay alive until
/// the last resource created from it is dropped.
///
/// Allocation is not thread-safe by contract: callers serialize creation and
/// destruction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::device_context::DeviceContext;
use crate::error::Result;
use crate::graphics_device::{
    AllocationId, BufferDesc, BufferHandle, BufferUsage, Extent2D, ImageAspect, ImageDesc,
    ImageHandle, ImageUsage, ImageViewHandle, MemoryProperty, TextureFormat,
};
use crate::{engine_debug, engine_error, engine_trace};
use super::buffer::Buffer;
use super::image::Image;

struct AllocatorInner {
    context: Arc<DeviceContext>,
    live_buffers: AtomicUsize,
    live_images: AtomicUsize,
}

#[derive(Clone)]
pub struct GpuAllocator {
    inner: Arc<AllocatorInner>,
}

impl GpuAllocator {
    pub fn new(context: Arc<DeviceContext>) -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                context,
                live_buffers: AtomicUsize::new(0),
                live_images: AtomicUsize::new(0),
            }),
        }
    }

    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.inner.context
    }

    /// Create a buffer bound to newly allocated memory
    ///
    /// Host-visible requests are mapped for the buffer's whole lifetime.
    ///
    /// # Errors
    ///
    /// `Error::OutOfMemory` (or a backend error) when no memory type satisfies
    /// `usage` + `memory`. Callers treat this as fatal for their setup path.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        memory: MemoryProperty,
        owner_queue_family: u32,
    ) -> Result<Buffer> {
        let desc = BufferDesc {
            name: format!("aurora buffer {:?}", usage),
            size,
            usage,
            memory,
            owner_queue_family,
        };

        let allocation = self.context().device().create_buffer(&desc).map_err(|e| {
            engine_error!(
                "aurora::GpuAllocator",
                "Failed to allocate {} byte buffer ({:?}, {:?}): {}",
                size, usage, memory, e
            );
            e
        })?;

        self.inner.live_buffers.fetch_add(1, Ordering::Relaxed);
        engine_trace!("aurora::GpuAllocator", "Buffer {:?} allocated ({} bytes)", allocation.buffer, size);

        Ok(Buffer::new(self.clone(), allocation, size, usage, owner_queue_family))
    }

    /// Create a 2D image and its default view
    pub fn create_image(
        &self,
        format: TextureFormat,
        aspect: ImageAspect,
        usage: ImageUsage,
        extent: Extent2D,
        owner_queue_family: u32,
    ) -> Result<Image> {
        let device = self.context().device();
        let desc = ImageDesc { format, usage, extent, owner_queue_family };

        let allocation = device.create_image(&desc).map_err(|e| {
            engine_error!(
                "aurora::GpuAllocator",
                "Failed to allocate {}x{} {:?} image: {}",
                extent.width, extent.height, format, e
            );
            e
        })?;

        let view = match device.create_image_view(allocation.image, format, aspect) {
            Ok(view) => view,
            Err(e) => {
                engine_error!("aurora::GpuAllocator", "Failed to create image view: {}", e);
                device.destroy_image(allocation.image, allocation.allocation);
                return Err(e);
            }
        };

        self.inner.live_images.fetch_add(1, Ordering::Relaxed);
        engine_debug!(
            "aurora::GpuAllocator",
            "Image {:?} allocated ({}x{} {:?})",
            allocation.image, extent.width, extent.height, format
        );

        Ok(Image::new(self.clone(), allocation, view, format, extent))
    }

    /// Buffers created by this allocator and not yet dropped
    pub fn live_buffers(&self) -> usize {
        self.inner.live_buffers.load(Ordering::Relaxed)
    }

    /// Images created by this allocator and not yet dropped
    pub fn live_images(&self) -> usize {
        self.inner.live_images.load(Ordering::Relaxed)
    }

    pub(super) fn free_buffer(&self, buffer: BufferHandle, allocation: AllocationId) {
        self.context().device().destroy_buffer(buffer, allocation);
        self.inner.live_buffers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(super) fn free_image(&self, view: ImageViewHandle, image: ImageHandle, allocation: AllocationId) {
        let device = self.context().device();
        device.destroy_image_view(view);
        device.destroy_image(image, allocation);
        self.inner.live_images.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
