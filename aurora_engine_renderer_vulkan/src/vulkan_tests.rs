//! Unit tests for device-independent helpers of the Vulkan device

use super::*;

fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    }
}

// ============================================================================
// QUEUE FAMILY SELECTION TESTS
// ============================================================================

#[test]
fn test_dedicated_transfer_family_preferred() {
    let families = [
        family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        family(vk::QueueFlags::TRANSFER),
    ];
    let selected = select_queue_families(&families, |_| true, true).unwrap();
    assert_eq!(selected, QueueFamilies { graphics: 0, transfer: 2 });
}

#[test]
fn test_compute_transfer_family_as_fallback() {
    let families = [
        family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
    ];
    let selected = select_queue_families(&families, |_| true, true).unwrap();
    assert_eq!(selected.transfer, 1);
}

#[test]
fn test_shared_family_when_not_preferred() {
    let families = [
        family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        family(vk::QueueFlags::TRANSFER),
    ];
    let selected = select_queue_families(&families, |_| true, false).unwrap();
    assert_eq!(selected, QueueFamilies { graphics: 0, transfer: 0 });
}

#[test]
fn test_graphics_family_must_present() {
    let families = [
        family(vk::QueueFlags::GRAPHICS),
        family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
    ];
    let selected = select_queue_families(&families, |i| i == 1, true).unwrap();
    assert_eq!(selected.graphics, 1);
    assert_eq!(selected.transfer, 1);
}

#[test]
fn test_no_presentable_graphics_family() {
    let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
    assert!(select_queue_families(&families, |_| false, true).is_none());
}

#[test]
fn test_empty_families_skipped() {
    let mut empty = family(vk::QueueFlags::GRAPHICS);
    empty.queue_count = 0;
    let families = [empty, family(vk::QueueFlags::GRAPHICS)];
    assert_eq!(select_queue_families(&families, |_| true, false).unwrap().graphics, 1);
}

// ============================================================================
// MEMORY TESTS
// ============================================================================

#[test]
fn test_memory_location() {
    assert_eq!(memory_location(MemoryProperty::DEVICE_LOCAL), MemoryLocation::GpuOnly);
    assert_eq!(memory_location(MemoryProperty::host_visible()), MemoryLocation::CpuToGpu);
}

#[test]
fn test_allocation_errors() {
    assert!(matches!(allocation_error(&AllocationError::OutOfMemory), Error::OutOfMemory));
    assert!(matches!(allocation_error(&AllocationError::NoCompatibleMemoryTypeFound), Error::OutOfMemory));
    assert!(matches!(
        allocation_error(&AllocationError::Internal("boom".to_string())),
        Error::BackendError(_)
    ));
}

#[test]
fn test_semaphore_wait_stage_never_empty() {
    assert_eq!(semaphore_wait_stage(PipelineStage::empty()), vk::PipelineStageFlags::ALL_COMMANDS);
    assert_eq!(
        semaphore_wait_stage(PipelineStage::COLOR_ATTACHMENT_OUTPUT),
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
    );
}
