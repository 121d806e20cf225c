/// Opaque driver object handles
///
/// Every object crossing the [`GraphicsDevice`](super::GraphicsDevice) boundary
/// is identified by a 64-bit handle. Handles carry no ownership; the owning
/// wrapper (Buffer, Image, Swapchain, ...) is responsible for destroying them.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// The null handle (never returned by a successful create)
            pub const NULL: Self = Self(0);

            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }
    };
}

define_handle!(
    /// Device queue
    QueueHandle
);
define_handle!(BufferHandle);
define_handle!(ImageHandle);
define_handle!(ImageViewHandle);
define_handle!(
    /// Token for a sub-allocation of device memory
    AllocationId
);
define_handle!(ShaderModuleHandle);
define_handle!(DescriptorSetLayoutHandle);
define_handle!(DescriptorPoolHandle);
define_handle!(DescriptorSetHandle);
define_handle!(SamplerHandle);
define_handle!(PipelineHandle);
define_handle!(PipelineLayoutHandle);
define_handle!(CommandPoolHandle);
define_handle!(CommandBufferHandle);
define_handle!(FenceHandle);
define_handle!(SemaphoreHandle);
define_handle!(SwapchainHandle);

/// Queue family index meaning "no ownership transfer"
pub const QUEUE_FAMILY_IGNORED: u32 = u32::MAX;

/// A device queue and the family it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueInfo {
    pub family_index: u32,
    pub queue: QueueHandle,
}
