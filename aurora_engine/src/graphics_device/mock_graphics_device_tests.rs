//! Unit tests for the mock graphics device itself

use super::*;

fn host_buffer_desc(size: u64) -> BufferDesc {
    BufferDesc {
        name: "test".to_string(),
        size,
        usage: BufferUsage::TRANSFER_SRC,
        memory: MemoryProperty::host_visible(),
        owner_queue_family: 0,
    }
}

#[test]
fn test_mock_host_visible_buffer_is_mapped() {
    let device = MockGraphicsDevice::new();
    let alloc = device.create_buffer(&host_buffer_desc(16)).unwrap();
    assert!(alloc.mapped.is_some());
    assert_eq!(device.buffer_contents(alloc.buffer).unwrap().len(), 16);
    device.destroy_buffer(alloc.buffer, alloc.allocation);
    assert_eq!(device.live("buffer"), 0);
    assert_eq!(device.live("allocation"), 0);
}

#[test]
fn test_mock_device_local_buffer_is_not_mapped() {
    let device = MockGraphicsDevice::new();
    let mut desc = host_buffer_desc(64);
    desc.memory = MemoryProperty::DEVICE_LOCAL;
    let alloc = device.create_buffer(&desc).unwrap();
    assert!(alloc.mapped.is_none());
    device.destroy_buffer(alloc.buffer, alloc.allocation);
}

#[test]
#[should_panic(expected = "destroy of non-live buffer")]
fn test_mock_double_destroy_panics() {
    let device = MockGraphicsDevice::new();
    let alloc = device.create_buffer(&host_buffer_desc(4)).unwrap();
    device.destroy_buffer(alloc.buffer, alloc.allocation);
    device.destroy_buffer(alloc.buffer, alloc.allocation);
}

#[test]
fn test_mock_fence_signaled_by_submit() {
    let device = MockGraphicsDevice::new();
    let fence = device.create_fence(false).unwrap();
    assert_eq!(device.wait_for_fence(fence, 0).unwrap(), FenceStatus::Timeout);

    let pool = device.create_command_pool(0).unwrap();
    let cb = device.allocate_command_buffer(pool).unwrap();
    device.record_commands(cb, &[Command::DrawIndexed { index_count: 3 }]).unwrap();
    device
        .queue_submit(
            device.graphics_queue().queue,
            &SubmitInfo { waits: &[], command_buffers: &[cb], signals: &[], fence: Some(fence) },
        )
        .unwrap();

    assert_eq!(device.wait_for_fence(fence, 0).unwrap(), FenceStatus::Signaled);
    assert_eq!(device.submissions()[0].commands, vec![Command::DrawIndexed { index_count: 3 }]);
}

#[test]
fn test_mock_scripted_fence_timeout_consumed_once() {
    let device = MockGraphicsDevice::new();
    let fence = device.create_fence(true).unwrap();
    device.script_fence_waits([FenceStatus::Timeout]);
    assert_eq!(device.wait_for_fence(fence, 10).unwrap(), FenceStatus::Timeout);
    assert_eq!(device.wait_for_fence(fence, 10).unwrap(), FenceStatus::Signaled);
}

#[test]
fn test_mock_scripted_record_and_submit_failures() {
    let device = MockGraphicsDevice::new();
    let pool = device.create_command_pool(0).unwrap();
    let cb = device.allocate_command_buffer(pool).unwrap();
    let fence = device.create_fence(false).unwrap();
    let submit = SubmitInfo { waits: &[], command_buffers: &[cb], signals: &[], fence: Some(fence) };

    device.script_records([true]);
    assert!(device.record_commands(cb, &[]).is_err());
    // Nothing recorded, so submitting it is rejected too
    assert!(device.queue_submit(device.graphics_queue().queue, &submit).is_err());

    device.record_commands(cb, &[]).unwrap();
    device.script_submits([true]);
    assert!(device.queue_submit(device.graphics_queue().queue, &submit).is_err());
    assert_eq!(device.wait_for_fence(fence, 0).unwrap(), FenceStatus::Timeout);

    device.queue_submit(device.graphics_queue().queue, &submit).unwrap();
    assert_eq!(device.wait_for_fence(fence, 0).unwrap(), FenceStatus::Signaled);
    assert_eq!(device.submissions().len(), 1);
}

#[test]
fn test_mock_acquire_cycles_images() {
    let device = MockGraphicsDevice::new();
    let desc = SwapchainDesc {
        image_count: 2,
        format: TextureFormat::B8G8R8A8_SRGB,
        color_space: ColorSpace::SrgbNonlinear,
        extent: Extent2D::new(8, 8),
        present_mode: PresentMode::Fifo,
    };
    let (swapchain, images) = device.create_swapchain(&desc).unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(device.acquire_next_image(swapchain, 0, None, None).unwrap(), AcquireResult::Success(0));
    assert_eq!(device.acquire_next_image(swapchain, 0, None, None).unwrap(), AcquireResult::Success(1));
    assert_eq!(device.acquire_next_image(swapchain, 0, None, None).unwrap(), AcquireResult::Success(0));
    device.destroy_swapchain(swapchain);
}
