/// Unit tests for swapchain.rs (mock device)

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::mock_context;
use crate::graphics_device::*;
use crate::swapchain::{AcquireOutcome, PresentOutcome, Swapchain, SWAPCHAIN_FORMAT};

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_create_with_exact_count() {
    let (device, _compiler, context) = mock_context();
    let swapchain = Swapchain::create(context, &Extent2D::new(1024, 768), 3).unwrap();

    assert_eq!(swapchain.image_count(), 3);
    assert_eq!(swapchain.format(), SWAPCHAIN_FORMAT);
    // Surface reports a current extent, which wins over the window size
    assert_eq!(swapchain.extent(), Extent2D::new(800, 600));

    let desc = device.state().swapchain_descs[0];
    assert_eq!(desc.present_mode, PresentMode::Fifo);
    assert_eq!(desc.color_space, ColorSpace::SrgbNonlinear);
    assert_eq!(device.live("image_view"), 3);
}

#[test]
fn test_count_below_minimum_rejected() {
    let (device, _compiler, context) = mock_context();
    let err = Swapchain::create(context, &Extent2D::new(800, 600), 1).unwrap_err();
    assert!(matches!(err, Error::InitializationFailed(_)));
    assert_eq!(device.created("swapchain"), 0);
}

#[test]
fn test_count_above_maximum_rejected() {
    let (_device, _compiler, context) = mock_context();
    let err = Swapchain::create(context, &Extent2D::new(800, 600), 9).unwrap_err();
    assert!(matches!(err, Error::InitializationFailed(_)));
}

#[test]
fn test_unbounded_maximum_accepts_large_count() {
    let (device, _compiler, context) = mock_context();
    device.state().capabilities.max_image_count = 0;
    let swapchain = Swapchain::create(context, &Extent2D::new(800, 600), 16).unwrap();
    assert_eq!(swapchain.image_count(), 16);
}

#[test]
fn test_missing_srgb_format_rejected() {
    let (device, _compiler, context) = mock_context();
    device.state().capabilities.formats.retain(|f| f.format != TextureFormat::B8G8R8A8_SRGB);
    let err = Swapchain::create(context, &Extent2D::new(800, 600), 3).unwrap_err();
    assert!(matches!(err, Error::InitializationFailed(_)));
}

#[test]
fn test_extent_from_window_clamped_when_surface_undecided() {
    let (device, _compiler, context) = mock_context();
    {
        let mut state = device.state();
        state.capabilities.current_extent = None;
        state.capabilities.max_extent = Extent2D::new(1920, 1080);
    }
    let swapchain = Swapchain::create(context, &Extent2D::new(4000, 500), 2).unwrap();
    assert_eq!(swapchain.extent(), Extent2D::new(1920, 500));
}

// ============================================================================
// ACQUIRE / PRESENT
// ============================================================================

#[test]
fn test_acquire_outcomes() {
    let (device, _compiler, context) = mock_context();
    let swapchain = Swapchain::create(context, &Extent2D::new(800, 600), 3).unwrap();

    device.script_acquires([AcquireResult::Timeout, AcquireResult::OutOfDate, AcquireResult::Suboptimal(2)]);
    assert_eq!(swapchain.acquire_next_image(10, None, None).unwrap(), AcquireOutcome::Timeout);
    assert_eq!(swapchain.acquire_next_image(10, None, None).unwrap(), AcquireOutcome::OutOfDate);
    match swapchain.acquire_next_image(10, None, None).unwrap() {
        AcquireOutcome::Suboptimal(image) => assert_eq!(image.index, 2),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_acquired_image_carries_its_view() {
    let (_device, _compiler, context) = mock_context();
    let swapchain = Swapchain::create(context, &Extent2D::new(800, 600), 2).unwrap();

    let AcquireOutcome::Acquired(first) = swapchain.acquire_next_image(10, None, None).unwrap() else {
        panic!("expected an image");
    };
    let AcquireOutcome::Acquired(second) = swapchain.acquire_next_image(10, None, None).unwrap() else {
        panic!("expected an image");
    };
    assert_ne!(first.index, second.index);
    assert_ne!(first.view, second.view);
}

#[test]
fn test_present_outcomes() {
    let (device, _compiler, context) = mock_context();
    let queue = context.graphics().queue;
    let swapchain = Swapchain::create(context, &Extent2D::new(800, 600), 2).unwrap();
    let AcquireOutcome::Acquired(image) = swapchain.acquire_next_image(10, None, None).unwrap() else {
        panic!("expected an image");
    };

    device.script_presents([PresentResult::OutOfDate]);
    assert_eq!(swapchain.present(queue, image, &[]).unwrap(), PresentOutcome::OutOfDate);
    assert_eq!(swapchain.present(queue, image, &[]).unwrap(), PresentOutcome::Presented);
    assert_eq!(device.state().presents.len(), 2);
}

#[test]
fn test_views_destroyed_before_swapchain() {
    let (device, _compiler, context) = mock_context();
    let swapchain = Swapchain::create(context, &Extent2D::new(800, 600), 2).unwrap();
    drop(swapchain);

    let order = device.state().destroy_order.clone();
    assert_eq!(order, vec!["image_view", "image_view", "swapchain"]);
}
