//! Unit tests for GpuAllocator, Buffer and Image (mock device)

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::mock_context;
use crate::graphics_device::{BufferUsage, Extent2D, ImageAspect, ImageUsage, MemoryProperty, TextureFormat};
use crate::memory::{Buffer, GpuAllocator};

fn staging(allocator: &GpuAllocator, size: u64) -> Buffer {
    allocator
        .create_buffer(size, BufferUsage::TRANSFER_SRC, MemoryProperty::host_visible(), 1)
        .unwrap()
}

// ============================================================================
// BUFFER CREATION
// ============================================================================

#[test]
fn test_host_visible_buffer_is_mapped() {
    let (_device, _compiler, context) = mock_context();
    let allocator = GpuAllocator::new(context);
    let buffer = staging(&allocator, 256);

    assert!(buffer.is_mapped());
    assert_eq!(buffer.size(), 256);
    assert_eq!(buffer.owner_queue_family(), 1);
    assert_eq!(allocator.live_buffers(), 1);
}

#[test]
fn test_device_local_buffer_is_not_mapped() {
    let (_device, _compiler, context) = mock_context();
    let allocator = GpuAllocator::new(context);
    let mut buffer = allocator
        .create_buffer(64, BufferUsage::VERTEX | BufferUsage::TRANSFER_DST, MemoryProperty::DEVICE_LOCAL, 1)
        .unwrap();

    assert!(!buffer.is_mapped());
    assert!(matches!(buffer.write(0, &[1, 2, 3]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_allocation_failure_propagates() {
    let (device, _compiler, context) = mock_context();
    device.state().fail_buffer_creation = true;
    let allocator = GpuAllocator::new(context);

    let result = allocator.create_buffer(64, BufferUsage::VERTEX, MemoryProperty::DEVICE_LOCAL, 0);
    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert_eq!(allocator.live_buffers(), 0);
}

// ============================================================================
// MAPPED WRITES
// ============================================================================

#[test]
fn test_write_lands_in_mapped_memory() {
    let (device, _compiler, context) = mock_context();
    let allocator = GpuAllocator::new(context);
    let mut buffer = staging(&allocator, 8);

    buffer.write(2, &[7, 8, 9]).unwrap();
    buffer.write_pod(4, &0xAABBCCDDu32).unwrap();

    let contents = device.buffer_contents(buffer.handle()).unwrap();
    assert_eq!(&contents[..4], &[0, 0, 7, 8]);
    assert_eq!(&contents[4..], &0xAABBCCDDu32.to_ne_bytes());
}

#[test]
fn test_write_out_of_range_rejected() {
    let (_device, _compiler, context) = mock_context();
    let allocator = GpuAllocator::new(context);
    let mut buffer = staging(&allocator, 8);

    assert!(buffer.write(6, &[0; 3]).is_err());
    assert!(buffer.write(u64::MAX, &[0]).is_err());
    assert!(buffer.write(8, &[]).is_ok());
}

// ============================================================================
// MOVE-ONLY OWNERSHIP
// ============================================================================

#[test]
fn test_moved_buffer_destroyed_exactly_once() {
    let (device, _compiler, context) = mock_context();
    let allocator = GpuAllocator::new(context);

    let original = staging(&allocator, 32);
    let handle = original.handle();

    // Move into a new owner; the old binding is gone and never dropped
    let moved = original;
    assert_eq!(moved.handle(), handle);
    assert_eq!(device.destroyed("buffer"), 0);

    let mut owners = Vec::new();
    owners.push(moved);
    assert_eq!(device.destroyed("buffer"), 0);

    drop(owners);
    assert_eq!(device.destroyed("buffer"), 1);
    assert_eq!(device.destroyed("allocation"), 1);
    assert_eq!(allocator.live_buffers(), 0);
}

#[test]
fn test_buffer_keeps_allocator_alive() {
    let (device, _compiler, context) = mock_context();
    let buffer = {
        let allocator = GpuAllocator::new(context);
        staging(&allocator, 16)
    };
    // Allocator handle dropped; the buffer still returns its memory
    drop(buffer);
    assert_eq!(device.live("buffer"), 0);
    assert_eq!(device.live("allocation"), 0);
}

// ============================================================================
// IMAGES
// ============================================================================

#[test]
fn test_image_view_destroyed_before_image() {
    let (device, _compiler, context) = mock_context();
    let allocator = GpuAllocator::new(context);

    let image = allocator
        .create_image(
            TextureFormat::D32_FLOAT,
            ImageAspect::DEPTH,
            ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            Extent2D::new(800, 600),
            0,
        )
        .unwrap();
    assert_eq!(image.extent(), Extent2D::new(800, 600));
    assert_eq!(allocator.live_images(), 1);

    let moved = image;
    drop(moved);

    let order = device.state().destroy_order.clone();
    assert_eq!(order, vec!["image_view", "image", "allocation"]);
    assert_eq!(allocator.live_images(), 0);
}
