/// Queue-family ownership transfer of a buffer range
///
/// Both halves of a transfer are built from one [`OwnershipTransfer`], so the
/// release recorded on the transfer queue and the acquire recorded on the
/// graphics queue always name the same buffer, range and family pair.

use crate::graphics_device::{
    AccessFlags, BufferBarrier, BufferHandle, PipelineStage, QUEUE_FAMILY_IGNORED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipTransfer {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
    pub src_family: u32,
    pub dst_family: u32,
    /// First use on the destination queue
    pub dst_stage: PipelineStage,
    pub dst_access: AccessFlags,
}

impl OwnershipTransfer {
    /// Hand a freshly copied range from `src_family` to `dst_family`
    ///
    /// With a shared family there is nothing to transfer: both barriers then
    /// carry `QUEUE_FAMILY_IGNORED` and act as plain memory barriers.
    pub fn new(
        buffer: BufferHandle,
        offset: u64,
        size: u64,
        src_family: u32,
        dst_family: u32,
        dst_stage: PipelineStage,
        dst_access: AccessFlags,
    ) -> Self {
        let (src_family, dst_family) = if src_family == dst_family {
            (QUEUE_FAMILY_IGNORED, QUEUE_FAMILY_IGNORED)
        } else {
            (src_family, dst_family)
        };
        Self { buffer, offset, size, src_family, dst_family, dst_stage, dst_access }
    }

    pub fn is_family_transfer(&self) -> bool {
        self.src_family != self.dst_family
    }

    /// Release half, recorded on the source queue after the copy
    pub fn release(&self) -> BufferBarrier {
        BufferBarrier {
            buffer: self.buffer,
            offset: self.offset,
            size: self.size,
            src_stage: PipelineStage::TRANSFER,
            dst_stage: PipelineStage::BOTTOM_OF_PIPE,
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::empty(),
            src_queue_family: self.src_family,
            dst_queue_family: self.dst_family,
        }
    }

    /// Acquire half, recorded on the destination queue before first use
    pub fn acquire(&self) -> BufferBarrier {
        BufferBarrier {
            buffer: self.buffer,
            offset: self.offset,
            size: self.size,
            src_stage: PipelineStage::TOP_OF_PIPE,
            dst_stage: self.dst_stage,
            src_access: AccessFlags::empty(),
            dst_access: self.dst_access,
            src_queue_family: self.src_family,
            dst_queue_family: self.dst_family,
        }
    }
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod tests;
