/// Image - RAII owner of a device image, its view and its memory

use crate::graphics_device::{Extent2D, ImageAllocation, ImageHandle, ImageViewHandle, TextureFormat};
use super::allocator::GpuAllocator;

/// A 2D device image with its default view
///
/// Same single-ownership rule as [`Buffer`](super::Buffer). Dropping destroys
/// the view first, then the image, then returns the memory.
pub struct Image {
    allocator: GpuAllocator,
    allocation: ImageAllocation,
    view: ImageViewHandle,
    format: TextureFormat,
    extent: Extent2D,
}

impl Image {
    pub(super) fn new(
        allocator: GpuAllocator,
        allocation: ImageAllocation,
        view: ImageViewHandle,
        format: TextureFormat,
        extent: Extent2D,
    ) -> Self {
        Self { allocator, allocation, view, format, extent }
    }

    pub fn handle(&self) -> ImageHandle {
        self.allocation.image
    }

    pub fn view(&self) -> ImageViewHandle {
        self.view
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.allocator.free_image(self.view, self.allocation.image, self.allocation.allocation);
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("handle", &self.allocation.image)
            .field("view", &self.view)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .finish()
    }
}
