/// Buffer - RAII owner of a device buffer and its memory

use bytemuck::Pod;

use crate::error::{Error, Result};
use crate::graphics_device::{BufferAllocation, BufferHandle, BufferUsage, MappedPtr};
use super::allocator::GpuAllocator;

/// A device buffer bound to its allocation
///
/// Move-only: there is no `Clone`, and only the final owner's drop returns
/// the allocation to the [`GpuAllocator`]. A moved-from binding is never
/// dropped, so ownership can be handed between resource sets freely.
pub struct Buffer {
    allocator: GpuAllocator,
    allocation: BufferAllocation,
    size: u64,
    usage: BufferUsage,
    owner_queue_family: u32,
}

impl Buffer {
    pub(super) fn new(
        allocator: GpuAllocator,
        allocation: BufferAllocation,
        size: u64,
        usage: BufferUsage,
        owner_queue_family: u32,
    ) -> Self {
        Self { allocator, allocation, size, usage, owner_queue_family }
    }

    pub fn handle(&self) -> BufferHandle {
        self.allocation.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Queue family the buffer was created for
    pub fn owner_queue_family(&self) -> u32 {
        self.owner_queue_family
    }

    pub fn is_mapped(&self) -> bool {
        self.allocation.mapped.is_some()
    }

    /// Persistent host pointer, for host-visible buffers
    pub fn mapped_ptr(&self) -> Option<MappedPtr> {
        self.allocation.mapped
    }

    /// Copy `data` into the mapping at `offset`
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` if the buffer is not host-visible or the write
    /// would run past the end of the buffer.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let mapped = self.allocation.mapped.ok_or_else(|| {
            Error::InvalidResource(format!("buffer {:?} is not host-visible", self.allocation.buffer))
        })?;

        let end = offset.checked_add(data.len() as u64).filter(|&end| end <= self.size);
        if end.is_none() {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(), offset, self.size
            )));
        }

        // SAFETY: range checked above; the mapping lives as long as `self`
        // and `&mut self` excludes concurrent host access.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped.as_ptr().add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    /// Write one plain-old-data value at `offset`
    pub fn write_pod<T: Pod>(&mut self, offset: u64, value: &T) -> Result<()> {
        self.write(offset, bytemuck::bytes_of(value))
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.allocator.free_buffer(self.allocation.buffer, self.allocation.allocation);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.allocation.buffer)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
